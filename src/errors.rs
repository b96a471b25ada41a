use thiserror::Error;

pub type Result<T> = std::result::Result<T, StreamError>;

/// Error taxonomy for the streaming subsystem (spec §7).
///
/// `ConfigMissing` and `SigningFailed` are fatal at startup. `AuthRejected` is non-retryable
/// and escalates to process exit. Every other variant is recovered locally by the component
/// that raises it (a market desync, a stale delta, a single connection's reconnect loop) and
/// never tears down unrelated state.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("configuration missing: {0}")]
    ConfigMissing(String),

    #[error("request signing failed: {0}")]
    SigningFailed(String),

    #[error("failed to connect: {0}")]
    ConnectFailed(String),

    #[error("authentication rejected: {0}")]
    AuthRejected(String),

    #[error("protocol error on {market}: {reason}")]
    ProtocolError { market: String, reason: String },

    #[error("sequence gap on {market}: expected {expected}, got {actual}")]
    SequenceGap {
        market: String,
        expected: i64,
        actual: i64,
    },

    #[error("stale delta on {market}: seq {seq} <= last_seq {last_seq}")]
    StaleDelta {
        market: String,
        seq: i64,
        last_seq: i64,
    },

    #[error("timeout waiting for {0}")]
    Timeout(String),

    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    #[error(transparent)]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl StreamError {
    pub fn protocol(market: impl Into<String>, reason: impl Into<String>) -> Self {
        StreamError::ProtocolError {
            market: market.into(),
            reason: reason.into(),
        }
    }
}
