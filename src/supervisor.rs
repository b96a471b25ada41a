//! Stream Supervisor (spec §4.8): bootstraps the pool, installs subscriptions from the active
//! configuration, and drives the reconnect/config-refresh/status-poll loops.
//!
//! Grounded in `original_source/packages/kalshi/src/kalshi/stream.py` (`KalshiStream`) for the
//! boot sequence, `original_source/packages/common/src/common/state.py` (`State.refresh`) for
//! the 900s config-refresh cadence, and `original_source/packages/kalshi/src/kalshi/models/
//! status.py` (`KalshiStatus._poll_status_`) for the 60s exchange-status poll.

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::{Mutex, Notify};
use tracing::{error, info, warn};

use crate::config::{AuthContext, Config, ConfigPaths};
use crate::connection::AuthHeader;
use crate::dispatcher::{DispatchAction, Dispatcher};
use crate::errors::Result;
use crate::pool::ConnectionPool;
use crate::rest::RestClient;
use crate::signer::WS_AUTH_PATH;
use crate::subscription::SubscriptionManager;
use crate::types::TickerScope;
use crate::wire::IncomingFrame;

/// Channels subscribed at bootstrap, per the original stream's `_channels_`.
const BOOT_CHANNELS: &[&str] = &["orderbook_delta", "ticker", "trade", "market_lifecycle"];

const STATUS_POLL_INTERVAL: Duration = Duration::from_secs(60);
const N_POOL_CONNECTIONS: u32 = 5;

pub struct Supervisor {
    config_paths: ConfigPaths,
    config: Mutex<Config>,
    auth: AuthContext,
    rest: RestClient,
    pool: Arc<ConnectionPool>,
    subscriptions: Mutex<SubscriptionManager>,
    dispatcher: Mutex<Dispatcher>,
    shutdown: Arc<Notify>,
}

impl Supervisor {
    pub async fn bootstrap(config_paths: ConfigPaths) -> Result<Self> {
        let config = Config::load(&config_paths.config_path, &config_paths.tickers_path)?;
        let auth = AuthContext::from_env()?;
        let rest = RestClient::new(config.rest_base_url.clone(), auth.signer.clone());

        rest.login(&auth.email, &auth.password).await?;

        let ws_headers = signed_ws_headers(&auth)?;
        let uri: tokio_tungstenite::tungstenite::http::Uri = config.ws_uri.parse().map_err(|err| {
            crate::errors::StreamError::ConfigMissing(format!("invalid ws_uri: {err}"))
        })?;
        let pool = Arc::new(ConnectionPool::new(uri, ws_headers, N_POOL_CONNECTIONS));

        Ok(Self {
            config_paths,
            config: Mutex::new(config),
            auth,
            rest,
            pool,
            subscriptions: Mutex::new(SubscriptionManager::new()),
            dispatcher: Mutex::new(Dispatcher::new()),
            shutdown: Arc::new(Notify::new()),
        })
    }

    /// Opens the pool, waits for election, and installs the boot-time subscription.
    pub async fn boot(&self) -> Result<()> {
        self.pool.start().await?;

        let pool = Arc::clone(&self.pool);
        tokio::spawn(async move { pool.monitor().await });

        self.pool.elect().await?;

        let tickers = self.config.lock().await.tickers.clone();
        let scope = if tickers.is_empty() {
            TickerScope::AllMarkets
        } else {
            TickerScope::Markets(tickers)
        };

        let channels: Vec<String> = BOOT_CHANNELS.iter().map(|s| s.to_string()).collect();
        let (_id, command) = self
            .subscriptions
            .lock()
            .await
            .add_subscription(channels, scope, now());
        self.pool.send_on_active(command.to_string()).await?;

        info!("supervisor boot complete");
        Ok(())
    }

    /// Runs the config-refresh loop, status-poll loop, inbound message loop, and reconnect-replay
    /// loop concurrently until shutdown is requested.
    pub async fn run(&self) -> Result<()> {
        tokio::select! {
            result = self.config_refresh_loop() => result,
            result = self.status_poll_loop() => result,
            result = self.inbound_loop() => result,
            result = self.reconnect_loop() => result,
            () = self.shutdown.notified() => Ok(()),
        }
    }

    /// Drains decoded text frames off the pool's connections, decodes each as an `IncomingFrame`,
    /// and hands it to `handle_frame`. Runs until the pool's inbound channel closes.
    async fn inbound_loop(&self) -> Result<()> {
        while let Some(frame) = self.pool.recv_inbound().await {
            match serde_json::from_str::<IncomingFrame>(&frame.text) {
                Ok(decoded) => {
                    if let Err(err) = self.handle_frame(decoded).await {
                        error!(%err, connection_id = %frame.connection_id, "error handling inbound frame");
                    }
                }
                Err(err) => {
                    warn!(%err, connection_id = %frame.connection_id, text = %frame.text, "failed to decode inbound frame");
                }
            }
        }
        Ok(())
    }

    /// Replays every active subscription onto a connection once it reconnects, but only when
    /// that connection is the currently-elected active one.
    async fn reconnect_loop(&self) -> Result<()> {
        while let Some(event) = self.pool.recv_reconnect_event().await {
            if self.pool.active_connection() != Some(event.connection_id) {
                continue;
            }

            let commands = self.subscriptions.lock().await.resubscribe_all(now());
            for command in commands {
                if let Err(err) = self.pool.send_on_active(command.to_string()).await {
                    error!(%err, connection_id = %event.connection_id, "failed to resend subscription after reconnect");
                }
            }
            info!(connection_id = %event.connection_id, "resubscribed active connection after reconnect");
        }
        Ok(())
    }

    async fn config_refresh_loop(&self) -> Result<()> {
        loop {
            tokio::time::sleep(crate::config::REFRESH_PERIOD).await;

            let fresh = match Config::load(&self.config_paths.config_path, &self.config_paths.tickers_path) {
                Ok(fresh) => fresh,
                Err(err) => {
                    warn!(%err, "config refresh failed, keeping prior configuration");
                    continue;
                }
            };

            let mut config = self.config.lock().await;
            let new_tickers: Vec<String> = fresh.tickers.iter().map(|t| t.as_str().to_string()).collect();
            *config = fresh;
            drop(config);

            self.apply_ticker_diff(new_tickers).await;
            info!("refreshed config and tickers");
        }
    }

    async fn apply_ticker_diff(&self, new_tickers: Vec<String>) {
        let mut subscriptions = self.subscriptions.lock().await;
        let ids: Vec<_> = subscriptions.active_subscriptions().map(|s| s.id).collect();
        for id in ids {
            let commands = subscriptions.update_tickers(id, new_tickers.clone(), now());
            for command in commands {
                if let Err(err) = self.pool.send_on_active(command.to_string()).await {
                    error!(%err, "failed to send ticker diff");
                }
            }
        }
    }

    async fn status_poll_loop(&self) -> Result<()> {
        loop {
            match self.rest.exchange_status().await {
                Ok(status) => info!(status = ?status.status(), "exchange status"),
                Err(err) => error!(%err, "error polling exchange status"),
            }
            tokio::time::sleep(STATUS_POLL_INTERVAL).await;
        }
    }

    /// Processes one decoded inbound frame, routing dispatcher-requested outbound sends and
    /// resnapshot requests back onto the active connection.
    pub async fn handle_frame(&self, frame: IncomingFrame) -> Result<()> {
        let action = {
            let mut dispatcher = self.dispatcher.lock().await;
            let mut subscriptions = self.subscriptions.lock().await;
            dispatcher.dispatch(frame, &mut subscriptions, now())
        };

        match action {
            DispatchAction::None => {}
            DispatchAction::Send(command) => {
                self.pool.send_on_active(command.to_string()).await?;
            }
            DispatchAction::RequestSnapshot(market) => {
                warn!(%market, "book desynced, resnapshot requested");
            }
        }
        Ok(())
    }

    /// Stops status polling, unsubscribes everything, and signals every loop to exit.
    pub async fn shutdown(&self) {
        let ids: Vec<_> = {
            let subscriptions = self.subscriptions.lock().await;
            subscriptions.active_subscriptions().map(|s| s.id).collect()
        };
        if !ids.is_empty() {
            let mut subscriptions = self.subscriptions.lock().await;
            let (_, command) = subscriptions.unsubscribe(&ids);
            if let Some(command) = command {
                let _ = self.pool.send_on_active(command.to_string()).await;
            }
        }

        self.pool.request_shutdown();
        self.shutdown.notify_waiters();
        info!("supervisor shutdown complete");
    }
}

fn signed_ws_headers(auth: &AuthContext) -> Result<Vec<AuthHeader>> {
    let headers = auth.signer.sign("GET", WS_AUTH_PATH)?;
    Ok(vec![
        AuthHeader { name: "KALSHI-ACCESS-KEY", value: headers.access_key },
        AuthHeader { name: "KALSHI-ACCESS-SIGNATURE", value: headers.signature },
        AuthHeader { name: "KALSHI-ACCESS-TIMESTAMP", value: headers.timestamp_ms.to_string() },
    ])
}

fn now() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}
