use crate::types::QuoteSide;

/// Latest `trade` state for a single market.
///
/// Grounded in `original_source/packages/common/src/common/models/trade.py` and the handler in
/// `original_source/packages/kalshi/src/kalshi/ws/handlers/trades.py`, which adopts the
/// four-field shape `(ts, taker_side, yes_price, no_price, count)` per the spec's resolution
/// of that Open Question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trade {
    pub ts: i64,
    pub taker_side: QuoteSide,
    pub yes_price: i32,
    pub no_price: i32,
    pub count: i64,
}

impl Trade {
    pub fn empty() -> Self {
        Self {
            ts: 0,
            taker_side: QuoteSide::Yes,
            yes_price: 0,
            no_price: 0,
            count: 0,
        }
    }

    /// Applies a `trade` message, falling back field-by-field to the prior value when a field
    /// is missing from the wire payload.
    pub fn update(
        &mut self,
        ts: Option<i64>,
        taker_side: Option<QuoteSide>,
        yes_price: Option<i32>,
        no_price: Option<i32>,
        count: Option<i64>,
    ) {
        self.ts = ts.unwrap_or(self.ts);
        self.taker_side = taker_side.unwrap_or(self.taker_side);
        self.yes_price = yes_price.unwrap_or(self.yes_price);
        self.no_price = no_price.unwrap_or(self.no_price);
        self.count = count.unwrap_or(self.count);
    }
}

impl Default for Trade {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_falls_back_to_prior_value_for_missing_fields() {
        let mut trade = Trade::empty();
        trade.update(Some(100), Some(QuoteSide::Yes), Some(60), Some(40), Some(5));
        trade.update(Some(101), None, None, None, Some(3));

        assert_eq!(trade.ts, 101);
        assert_eq!(trade.taker_side, QuoteSide::Yes);
        assert_eq!(trade.yes_price, 60);
        assert_eq!(trade.no_price, 40);
        assert_eq!(trade.count, 3);
    }
}
