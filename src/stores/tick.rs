/// Latest `ticker` state for a single market.
///
/// Grounded in `original_source/packages/common/src/common/models/tick.py`'s `Tick.update`:
/// every field is written unconditionally from the inbound message, with the caller
/// responsible for substituting the prior value when a field is absent on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tick {
    pub ts: i64,
    pub price: i32,
    pub bid: i32,
    pub ask: i32,
    pub volume: i64,
    pub open_interest: i64,
    pub dollar_volume: i64,
    pub dollar_open_interest: i64,
}

impl Tick {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Applies a `ticker` message, falling back field-by-field to the prior value when a
    /// field is missing from the wire payload.
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        ts: Option<i64>,
        price: Option<i32>,
        bid: Option<i32>,
        ask: Option<i32>,
        volume: Option<i64>,
        open_interest: Option<i64>,
        dollar_volume: Option<i64>,
        dollar_open_interest: Option<i64>,
    ) {
        self.ts = ts.unwrap_or(self.ts);
        self.price = price.unwrap_or(self.price);
        self.bid = bid.unwrap_or(self.bid);
        self.ask = ask.unwrap_or(self.ask);
        self.volume = volume.unwrap_or(self.volume);
        self.open_interest = open_interest.unwrap_or(self.open_interest);
        self.dollar_volume = dollar_volume.unwrap_or(self.dollar_volume);
        self.dollar_open_interest = dollar_open_interest.unwrap_or(self.dollar_open_interest);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_overwrites_present_fields_only() {
        let mut tick = Tick {
            ts: 1,
            price: 50,
            bid: 49,
            ask: 51,
            volume: 100,
            open_interest: 10,
            dollar_volume: 5000,
            dollar_open_interest: 500,
        };

        tick.update(Some(2), None, Some(48), None, None, None, None, None);

        assert_eq!(tick.ts, 2);
        assert_eq!(tick.price, 50);
        assert_eq!(tick.bid, 48);
        assert_eq!(tick.ask, 51);
        assert_eq!(tick.volume, 100);
    }

    #[test]
    fn empty_tick_is_all_zero() {
        assert_eq!(Tick::empty(), Tick::default());
    }
}
