//! Real-time market-data streaming client for the Kalshi exchange: a latency-ranked
//! WebSocket connection pool, subscription state machine, YES-perspective order-book
//! reconstruction, and RSA-PSS request signing.

pub mod book;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod errors;
pub mod pool;
pub mod rest;
pub mod signer;
pub mod stores;
pub mod subscription;
pub mod supervisor;
pub mod types;
pub mod wire;

pub use book::Orderbook;
pub use config::{AuthContext, Config, ConfigPaths};
pub use dispatcher::Dispatcher;
pub use errors::{Result, StreamError};
pub use pool::ConnectionPool;
pub use rest::RestClient;
pub use signer::Signer;
pub use subscription::SubscriptionManager;
pub use supervisor::Supervisor;
pub use types::{ConnectionId, MarketTicker, QuoteSide, SubscriptionId, TickerScope};
