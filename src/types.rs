use std::fmt;

/// Exchange-assigned market identifier, e.g. `"INXD-24DEC31-T5000"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct MarketTicker(pub String);

impl MarketTicker {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MarketTicker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for MarketTicker {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for MarketTicker {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Process-local, monotonically increasing subscription id. Never reused.
#[repr(transparent)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct SubscriptionId(pub u64);

impl SubscriptionId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies one member of the connection pool. Stable across reconnects.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(pub u32);

impl ConnectionId {
    pub const fn new(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which side of the two-sided quote a message refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteSide {
    Yes,
    No,
}

impl fmt::Display for QuoteSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuoteSide::Yes => write!(f, "yes"),
            QuoteSide::No => write!(f, "no"),
        }
    }
}

/// A set of market tickers to subscribe to, or every market on the exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickerScope {
    Markets(Vec<MarketTicker>),
    AllMarkets,
}

impl TickerScope {
    pub fn is_empty(&self) -> bool {
        matches!(self, TickerScope::Markets(tickers) if tickers.is_empty())
    }
}
