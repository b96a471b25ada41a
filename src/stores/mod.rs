//! Per-market latest-value stores (spec §4.7): `Tick`, `Trade`, and `Lifecycle`, each updated
//! in place from inbound wire messages with last-value-wins, field-level-fallback semantics.
//!
//! Grounded in `original_source/packages/common/src/common/models/{tick,trade}.py` and
//! `original_source/packages/kalshi/src/kalshi/models/lifecycle.py`.

mod lifecycle;
mod tick;
mod trade;

pub use lifecycle::Lifecycle;
pub use tick::Tick;
pub use trade::Trade;
