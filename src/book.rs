//! Book Engine (spec §4.6): per-market, single-sided "YES-perspective" order book
//! reconstruction from two-sided snapshot+delta updates, with sequence-number discipline.
//!
//! Grounded in `original_source/packages/common/src/common/models/orderbook.py` (`Orderbook`)
//! and `original_source/packages/kalshi/src/kalshi/ws/handlers/orderbooks.py` (the YES/NO to
//! single-sided mapping). The original tolerates missing/out-of-order `seq`; per spec §9's Open
//! Question resolution we adopt the stricter mandated behavior instead.

use crate::errors::{Result, StreamError};
use crate::types::QuoteSide;

/// One price level: `price` is integer cents in `1..=99`, `quantity` is the resting size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Level {
    pub price: i32,
    pub quantity: i64,
}

impl Level {
    pub fn new(price: i32, quantity: i64) -> Self {
        Self { price, quantity }
    }
}

/// A signed incremental change to a single price level on one side of the wire protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delta {
    pub price: i32,
    pub delta: i64,
}

/// Raw `(price, quantity)` pairs as they arrive on the wire, before YES-perspective translation.
pub type RawLevel = (i32, i64);

/// A synthesized single-sided order book for one market.
///
/// Bids are sorted descending by price, asks ascending; both are price-unique with
/// `quantity > 0` at every stored level. `last_seq` never decreases across successfully applied
/// updates. `desynced` is set when a sequence gap or protocol violation is detected; downstream
/// consumers should treat the book as unreliable until the next full snapshot clears it.
#[derive(Debug, Clone, Default)]
pub struct Orderbook {
    bids: Vec<Level>,
    asks: Vec<Level>,
    last_seq: i64,
    has_seq: bool,
    desynced: bool,
}

impl Orderbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bids(&self) -> &[Level] {
        &self.bids
    }

    pub fn asks(&self) -> &[Level] {
        &self.asks
    }

    pub fn last_seq(&self) -> i64 {
        self.last_seq
    }

    pub fn desynced(&self) -> bool {
        self.desynced
    }

    /// Applies a full snapshot: `{ seq, yes: [[price, qty], ...], no: [[price, qty], ...] }`.
    /// YES quotes become bids as-is; NO quotes at price `p` become synthetic YES asks at
    /// `100 - p`. Clears `desynced`.
    pub fn apply_snapshot(
        &mut self,
        market: &str,
        seq: Option<i64>,
        yes: &[RawLevel],
        no: &[RawLevel],
    ) -> Result<()> {
        let seq = seq.ok_or_else(|| {
            StreamError::protocol(market, "orderbook_snapshot missing 'seq'")
        })?;

        let mut bids: Vec<Level> = yes
            .iter()
            .map(|&(price, quantity)| Level::new(price, quantity))
            .collect();
        let mut asks: Vec<Level> = no
            .iter()
            .map(|&(price, quantity)| Level::new(100 - price, quantity))
            .collect();

        sort_bids(&mut bids);
        sort_asks(&mut asks);
        check_crossed(market, &bids, &asks)?;

        self.bids = bids;
        self.asks = asks;
        self.last_seq = seq;
        self.has_seq = true;
        self.desynced = false;
        Ok(())
    }

    /// Applies a single delta: `{ seq, price, delta, side }`.
    ///
    /// Stale deltas (`seq <= last_seq`) are dropped silently. A gap (`seq > last_seq + 1`)
    /// marks the book desynced and returns `SequenceGap` so the caller can request a fresh
    /// snapshot; the book is left unmodified. A delta against a missing level with
    /// `delta <= 0` is a protocol error.
    pub fn apply_delta(
        &mut self,
        market: &str,
        seq: Option<i64>,
        side: QuoteSide,
        raw_price: i32,
        delta: i64,
    ) -> Result<()> {
        let seq = seq.ok_or_else(|| StreamError::protocol(market, "orderbook_delta missing 'seq'"))?;

        if self.has_seq && seq <= self.last_seq {
            return Err(StreamError::StaleDelta {
                market: market.to_string(),
                seq,
                last_seq: self.last_seq,
            });
        }

        if self.has_seq && seq > self.last_seq + 1 {
            self.desynced = true;
            return Err(StreamError::SequenceGap {
                market: market.to_string(),
                expected: self.last_seq + 1,
                actual: seq,
            });
        }

        let (price, levels, ascending) = match side {
            QuoteSide::Yes => (raw_price, &mut self.bids, false),
            QuoteSide::No => (100 - raw_price, &mut self.asks, true),
        };

        apply_delta_to_side(market, levels, Delta { price, delta })?;
        if ascending {
            sort_asks(levels);
        } else {
            sort_bids(levels);
        }

        check_crossed(market, &self.bids, &self.asks)?;

        self.last_seq = seq;
        self.has_seq = true;
        self.desynced = false;
        Ok(())
    }

    pub fn best_bid(&self) -> Option<Level> {
        self.bids.first().copied()
    }

    pub fn best_ask(&self) -> Option<Level> {
        self.asks.first().copied()
    }

    /// `best_ask.price - best_bid.price`, if both sides are non-empty.
    pub fn spread(&self) -> Option<i32> {
        let (bid, ask) = (self.best_bid()?, self.best_ask()?);
        Some(ask.price - bid.price)
    }

    /// `(best_ask.price + best_bid.price) / 2`, if both sides are non-empty.
    pub fn mid(&self) -> Option<f64> {
        let (bid, ask) = (self.best_bid()?, self.best_ask()?);
        Some((ask.price as f64 + bid.price as f64) / 2.0)
    }

    /// Quantity-weighted mid price:
    /// `ask.price * bid.qty / (ask.qty + bid.qty) + bid.price * ask.qty / (ask.qty + bid.qty)`.
    pub fn micro(&self) -> Option<f64> {
        let (bid, ask) = (self.best_bid()?, self.best_ask()?);
        let denom = (ask.quantity + bid.quantity) as f64;
        if denom == 0.0 {
            return None;
        }
        Some(
            ask.price as f64 * bid.quantity as f64 / denom
                + bid.price as f64 * ask.quantity as f64 / denom,
        )
    }
}

fn apply_delta_to_side(market: &str, levels: &mut Vec<Level>, delta: Delta) -> Result<()> {
    if let Some(pos) = levels.iter().position(|level| level.price == delta.price) {
        let new_quantity = levels[pos].quantity + delta.delta;
        if new_quantity > 0 {
            levels[pos].quantity = new_quantity;
        } else {
            levels.remove(pos);
        }
    } else if delta.delta > 0 {
        levels.push(Level::new(delta.price, delta.delta));
    } else {
        return Err(StreamError::protocol(
            market,
            format!(
                "non-positive delta {} at missing price {}",
                delta.delta, delta.price
            ),
        ));
    }
    Ok(())
}

fn sort_bids(levels: &mut [Level]) {
    levels.sort_by(|a, b| b.price.cmp(&a.price));
}

fn sort_asks(levels: &mut [Level]) {
    levels.sort_by(|a, b| a.price.cmp(&b.price));
}

fn check_crossed(market: &str, bids: &[Level], asks: &[Level]) -> Result<()> {
    if let (Some(bid), Some(ask)) = (bids.first(), asks.first()) {
        if bid.price > ask.price {
            return Err(StreamError::protocol(
                market,
                format!(
                    "crossed book: best_bid {} > best_ask {}",
                    bid.price, ask.price
                ),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_ingest_translates_and_sorts() {
        // Scenario 1 from spec §8.
        let mut book = Orderbook::new();
        book.apply_snapshot(
            "T",
            Some(10),
            &[(40, 5), (41, 3)],
            &[(55, 2), (56, 4)],
        )
        .unwrap();

        assert_eq!(book.bids(), &[Level::new(41, 3), Level::new(40, 5)]);
        assert_eq!(book.asks(), &[Level::new(44, 4), Level::new(45, 2)]);
        assert_eq!(book.last_seq(), 10);
    }

    fn seeded_book() -> Orderbook {
        let mut book = Orderbook::new();
        book.apply_snapshot("T", Some(10), &[(40, 5), (41, 3)], &[(55, 2), (56, 4)])
            .unwrap();
        book
    }

    #[test]
    fn delta_adds_new_yes_level() {
        // Scenario 2.
        let mut book = seeded_book();
        book.apply_delta("T", Some(11), QuoteSide::Yes, 42, 7).unwrap();
        assert_eq!(
            book.bids(),
            &[Level::new(42, 7), Level::new(41, 3), Level::new(40, 5)]
        );
        assert_eq!(book.last_seq(), 11);
    }

    #[test]
    fn delta_removes_no_level() {
        // Scenario 3: NO delta at price 55, delta -2 removes the synthetic YES ask at 45.
        let mut book = seeded_book();
        book.apply_delta("T", Some(11), QuoteSide::No, 55, -2).unwrap();
        assert_eq!(book.asks(), &[Level::new(44, 4)]);
        assert_eq!(book.last_seq(), 11);
    }

    #[test]
    fn stale_delta_is_dropped() {
        // Scenario 4.
        let mut book = seeded_book();
        let err = book.apply_delta("T", Some(9), QuoteSide::Yes, 40, 1);
        assert!(matches!(err, Err(StreamError::StaleDelta { .. })));
        assert_eq!(book.last_seq(), 10);
        assert_eq!(book.bids(), &[Level::new(41, 3), Level::new(40, 5)]);
    }

    #[test]
    fn sequence_gap_marks_desynced_and_leaves_book_unchanged() {
        // Scenario 5.
        let mut book = seeded_book();
        let err = book.apply_delta("T", Some(15), QuoteSide::Yes, 40, 1);
        assert!(matches!(err, Err(StreamError::SequenceGap { .. })));
        assert!(book.desynced());
        assert_eq!(book.last_seq(), 10);
        assert_eq!(book.bids(), &[Level::new(41, 3), Level::new(40, 5)]);
    }

    #[test]
    fn delta_to_zero_quantity_removes_level() {
        let mut book = seeded_book();
        book.apply_delta("T", Some(11), QuoteSide::Yes, 40, -5).unwrap();
        assert_eq!(book.bids(), &[Level::new(41, 3)]);
    }

    #[test]
    fn positive_delta_against_missing_price_inserts_level() {
        let mut book = seeded_book();
        book.apply_delta("T", Some(11), QuoteSide::Yes, 30, 2).unwrap();
        assert!(book.bids().iter().any(|l| l.price == 30 && l.quantity == 2));
    }

    #[test]
    fn non_positive_delta_against_missing_price_is_protocol_error() {
        let mut book = seeded_book();
        let err = book.apply_delta("T", Some(11), QuoteSide::Yes, 30, -2);
        assert!(matches!(err, Err(StreamError::ProtocolError { .. })));
    }

    #[test]
    fn no_side_delta_at_price_100_maps_to_yes_ask_at_zero() {
        let mut book = Orderbook::new();
        book.apply_snapshot("T", Some(1), &[], &[]).unwrap();
        book.apply_delta("T", Some(2), QuoteSide::No, 100, 5).unwrap();
        assert_eq!(book.asks(), &[Level::new(0, 5)]);
    }

    #[test]
    fn no_side_delta_at_price_zero_maps_to_yes_ask_at_100() {
        let mut book = Orderbook::new();
        book.apply_snapshot("T", Some(1), &[], &[]).unwrap();
        book.apply_delta("T", Some(2), QuoteSide::No, 0, 5).unwrap();
        assert_eq!(book.asks(), &[Level::new(100, 5)]);
    }

    #[test]
    fn add_then_remove_same_quantity_is_idempotent() {
        let mut book = seeded_book();
        let before = book.bids().to_vec();
        book.apply_delta("T", Some(11), QuoteSide::Yes, 40, 9).unwrap();
        book.apply_delta("T", Some(12), QuoteSide::Yes, 40, -9).unwrap();
        assert_eq!(book.bids(), before.as_slice());
    }

    #[test]
    fn derived_quantities_match_scenario_one() {
        let book = seeded_book();
        assert_eq!(book.spread(), Some(3));
        assert_eq!(book.mid(), Some(42.5));
        let micro = book.micro().unwrap();
        // ask(44,4), bid(41,3): 44*3/7 + 41*4/7
        assert!((micro - (44.0 * 3.0 / 7.0 + 41.0 * 4.0 / 7.0)).abs() < 1e-9);
    }

    #[test]
    fn best_bid_never_exceeds_best_ask_invariant() {
        let book = seeded_book();
        if let (Some(bid), Some(ask)) = (book.best_bid(), book.best_ask()) {
            assert!(bid.price <= ask.price);
        }
    }

    #[test]
    fn crossed_snapshot_is_rejected() {
        let mut book = Orderbook::new();
        let err = book.apply_snapshot("T", Some(1), &[(60, 1)], &[(50, 1)]);
        // NO(50) -> YES ask 50; YES bid 60 > 50 is crossed.
        assert!(matches!(err, Err(StreamError::ProtocolError { .. })));
    }
}
