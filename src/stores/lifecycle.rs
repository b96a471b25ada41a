use crate::errors::{Result, StreamError};
use crate::types::QuoteSide;

/// Latest `market_lifecycle` state for a single market.
///
/// Grounded in `original_source/packages/kalshi/src/kalshi/models/lifecycle.py`. The transition
/// from `is_deactivated=false, result=None` to `is_deactivated=true, result=Some(_)` is one-way:
/// once `result` is set the market is terminal, and any update attempting to regress it (clear
/// the result, or reactivate the market) is rejected rather than silently applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lifecycle {
    pub is_deactivated: bool,
    pub open_ts: i64,
    pub close_ts: i64,
    pub determination_ts: Option<i64>,
    pub settled_ts: Option<i64>,
    pub result: Option<QuoteSide>,
}

impl Lifecycle {
    /// An empty lifecycle is considered deactivated for downstream trading logic.
    pub fn empty() -> Self {
        Self {
            is_deactivated: true,
            open_ts: 0,
            close_ts: 0,
            determination_ts: None,
            settled_ts: None,
            result: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.result.is_some()
    }

    /// Applies a `market_lifecycle` message, falling back field-by-field to the prior value
    /// for absent fields. Returns `ProtocolError` if the market is already terminal and the
    /// update would clear `result` or reactivate the market.
    pub fn update(
        &mut self,
        market: &str,
        is_deactivated: Option<bool>,
        open_ts: Option<i64>,
        close_ts: Option<i64>,
        determination_ts: Option<i64>,
        settled_ts: Option<i64>,
        result: Option<QuoteSide>,
    ) -> Result<()> {
        if self.is_terminal() && is_deactivated == Some(false) {
            return Err(StreamError::protocol(
                market,
                "market_lifecycle update would regress a terminal market",
            ));
        }

        self.is_deactivated = is_deactivated.unwrap_or(self.is_deactivated);
        self.open_ts = open_ts.unwrap_or(self.open_ts);
        self.close_ts = close_ts.unwrap_or(self.close_ts);
        if determination_ts.is_some() {
            self.determination_ts = determination_ts;
        }
        if settled_ts.is_some() {
            self.settled_ts = settled_ts;
        }
        if result.is_some() {
            self.result = result;
        }

        Ok(())
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_lifecycle_is_deactivated_and_not_terminal() {
        let lifecycle = Lifecycle::empty();
        assert!(lifecycle.is_deactivated);
        assert!(!lifecycle.is_terminal());
    }

    #[test]
    fn update_is_field_fallback() {
        let mut lifecycle = Lifecycle::empty();
        lifecycle
            .update("T", Some(false), Some(1_000), Some(2_000), None, None, None)
            .unwrap();
        lifecycle.update("T", None, None, Some(2_500), None, None, None).unwrap();

        assert!(!lifecycle.is_deactivated);
        assert_eq!(lifecycle.open_ts, 1_000);
        assert_eq!(lifecycle.close_ts, 2_500);
    }

    #[test]
    fn result_transition_is_terminal() {
        let mut lifecycle = Lifecycle::empty();
        lifecycle
            .update("T", Some(false), Some(1_000), Some(2_000), None, None, None)
            .unwrap();
        lifecycle
            .update(
                "T",
                Some(true),
                None,
                None,
                Some(2_100),
                Some(2_200),
                Some(QuoteSide::Yes),
            )
            .unwrap();

        assert!(lifecycle.is_terminal());
        assert_eq!(lifecycle.result, Some(QuoteSide::Yes));
    }

    #[test]
    fn reactivating_a_terminal_market_is_rejected() {
        let mut lifecycle = Lifecycle::empty();
        lifecycle
            .update(
                "T",
                Some(true),
                Some(1_000),
                Some(2_000),
                Some(2_100),
                Some(2_200),
                Some(QuoteSide::Yes),
            )
            .unwrap();

        let err = lifecycle.update("T", Some(false), None, None, None, None, None);
        assert!(matches!(err, Err(StreamError::ProtocolError { .. })));
        assert!(lifecycle.is_terminal());
    }
}
