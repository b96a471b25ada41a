//! Connection Pool (spec §4.3): maintains `n_connections` concurrent authenticated WebSockets,
//! measures per-connection latency by periodic application-level pings, and elects the
//! lowest-latency connection as active.
//!
//! Grounded in `original_source/packages/kalshi/src/kalshi/ws/pool.py` (`WsPool`) for the
//! warm-up connection, randomized id assignment, independent per-connection pingers, and
//! latency-based election; the ring-buffer latency window follows the
//! `AllocRingBuffer`/`ringbuffer` idiom in `examples/feothyuth-lr/src/avellaneda/volatility.rs`.
//! The read half of each socket is split off (`futures_util::StreamExt::split`) into a dedicated
//! reader task that owns it for the connection's whole lifetime: application frames are handed
//! to `recv_inbound`, and a `Pong` is routed back to whichever pinger is waiting over a
//! `tokio::sync::watch` channel, instead of the pinger reading the stream directly and
//! discarding whatever else arrives during the ping window.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use rand::seq::SliceRandom;
use ringbuffer::{AllocRingBuffer, RingBuffer, RingBufferExt, RingBufferRead, RingBufferWrite};
use tokio::sync::{mpsc, watch, Mutex, Notify, RwLock};
use tokio_tungstenite::tungstenite::http::Uri;
use tokio_tungstenite::tungstenite::Message;
use tracing::{error, info, warn};

use crate::connection::{self, AuthHeader, WsSocket};
use crate::errors::{Result, StreamError};
use crate::types::ConnectionId;

pub const DEQUE_MAXLEN: usize = 10;
pub const PING_INTERVAL: Duration = Duration::from_secs(10);
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);
pub const WARMUP_TIME_SECS: Duration = Duration::from_secs(100);

/// One text frame received on a pool connection, tagged with the connection it arrived on.
#[derive(Debug, Clone)]
pub struct InboundFrame {
    pub connection_id: ConnectionId,
    pub text: String,
}

/// Emitted whenever a connection is (re)established, so the caller can replay subscriptions.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectEvent {
    pub connection_id: ConnectionId,
}

struct PooledConnection {
    write: Mutex<SplitSink<WsSocket, Message>>,
    latencies: Mutex<AllocRingBuffer<Duration>>,
    usage_count: AtomicU64,
    pong: watch::Sender<Instant>,
}

impl PooledConnection {
    fn new(write: SplitSink<WsSocket, Message>) -> Self {
        let (pong, _) = watch::channel(Instant::now());
        Self {
            write: Mutex::new(write),
            latencies: Mutex::new(AllocRingBuffer::with_capacity(DEQUE_MAXLEN.next_power_of_two())),
            usage_count: AtomicU64::new(0),
            pong,
        }
    }

    async fn record_latency(&self, latency: Duration) {
        let mut latencies = self.latencies.lock().await;
        latencies.push(latency);
        while latencies.len() > DEQUE_MAXLEN {
            let _ = latencies.dequeue();
        }
    }

    async fn mean_latency(&self) -> Option<Duration> {
        let latencies = self.latencies.lock().await;
        if latencies.is_empty() {
            return None;
        }
        let total: Duration = latencies.iter().sum();
        Some(total / latencies.len() as u32)
    }
}

/// Maintains `n_connections` authenticated WebSockets to `uri` and elects a primary by latency.
///
/// `connections` and `active` are each single-writer: only the pool's own `start`/`monitor`/
/// `reconnect` tasks mutate them. External callers only read `active_connection`, send through
/// `send_on_active`, and drain `recv_inbound`/`recv_reconnect_event`.
pub struct ConnectionPool {
    uri: Uri,
    headers: Vec<AuthHeader>,
    n_connections: u32,
    connections: RwLock<HashMap<ConnectionId, Arc<PooledConnection>>>,
    active: RwLock<Option<ConnectionId>>,
    shutdown: Arc<Notify>,
    inbound_tx: mpsc::UnboundedSender<InboundFrame>,
    inbound_rx: Mutex<mpsc::UnboundedReceiver<InboundFrame>>,
    reconnect_tx: mpsc::UnboundedSender<ReconnectEvent>,
    reconnect_rx: Mutex<mpsc::UnboundedReceiver<ReconnectEvent>>,
    /// Set to the id of a just-reconnected active connection; cleared (and election re-run) once
    /// that connection produces its first post-reconnect latency sample.
    reelect_pending: Mutex<Option<ConnectionId>>,
}

impl ConnectionPool {
    pub fn new(uri: Uri, headers: Vec<AuthHeader>, n_connections: u32) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (reconnect_tx, reconnect_rx) = mpsc::unbounded_channel();
        Self {
            uri,
            headers,
            n_connections,
            connections: RwLock::new(HashMap::new()),
            active: RwLock::new(None),
            shutdown: Arc::new(Notify::new()),
            inbound_tx,
            inbound_rx: Mutex::new(inbound_rx),
            reconnect_tx,
            reconnect_rx: Mutex::new(reconnect_rx),
            reelect_pending: Mutex::new(None),
        }
    }

    pub fn active_connection(&self) -> Option<ConnectionId> {
        self.active.try_read().ok().and_then(|guard| *guard)
    }

    pub fn shutdown_token(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Waits for the next decoded inbound frame from any pooled connection. Single-consumer:
    /// intended to be polled from one supervisor task only.
    pub async fn recv_inbound(&self) -> Option<InboundFrame> {
        self.inbound_rx.lock().await.recv().await
    }

    /// Waits for the next connection-level reconnect event. Single-consumer, same as
    /// `recv_inbound`.
    pub async fn recv_reconnect_event(&self) -> Option<ReconnectEvent> {
        self.reconnect_rx.lock().await.recv().await
    }

    /// Opens a throwaway warm-up connection, then `n_connections` more in parallel, assigning
    /// ids in randomized order to remove ordering bias, and spawns a reader task per connection.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        info!("initializing warm-up connection to amortize TLS/DNS cold costs");
        let warmup = connection::open(&self.uri, &self.headers).await?;
        let (mut warmup_write, _) = warmup.split();
        let _ = warmup_write.close().await;

        let mut opens = Vec::with_capacity(self.n_connections as usize);
        for _ in 0..self.n_connections {
            opens.push(connection::open(&self.uri, &self.headers));
        }
        let opened = futures_util::future::join_all(opens).await;

        let mut ids: Vec<u32> = (1..=self.n_connections).collect();
        ids.shuffle(&mut rand::thread_rng());

        let mut readers = Vec::with_capacity(self.n_connections as usize);
        {
            let mut connections = self.connections.write().await;
            for (socket_result, id) in opened.into_iter().zip(ids) {
                let socket = socket_result?;
                let id = ConnectionId::new(id);
                let (write, read) = socket.split();
                connections.insert(id, Arc::new(PooledConnection::new(write)));
                readers.push((id, read));
                info!(connection_id = %id, "randomized connection created");
            }
        }

        for (id, read) in readers {
            self.spawn_reader(id, read);
        }

        Ok(())
    }

    /// Spawns an independent periodic pinger per connection. Runs until `shutdown_token` fires.
    pub async fn monitor(self: &Arc<Self>) {
        let ids: Vec<ConnectionId> = self.connections.read().await.keys().copied().collect();
        let mut tasks = Vec::with_capacity(ids.len());
        for id in ids {
            let pool = Arc::clone(self);
            tasks.push(tokio::spawn(async move { pool.ping_loop(id).await }));
        }
        futures_util::future::join_all(tasks).await;
    }

    async fn ping_loop(self: Arc<Self>, id: ConnectionId) {
        tokio::time::sleep(Duration::from_secs(1)).await;
        loop {
            tokio::select! {
                _ = self.shutdown.notified() => return,
                _ = tokio::time::sleep(PING_INTERVAL) => {}
            }

            match self.ping_connection(id).await {
                Ok(_) => self.maybe_reelect_after_sample(id).await,
                Err(err) => {
                    error!(connection_id = %id, %err, "ping failed, reconnecting");
                    if let Err(err) = self.reconnect(id).await {
                        error!(connection_id = %id, %err, "reconnect ultimately failed");
                        return;
                    }
                }
            }
        }
    }

    /// If `id` was flagged as needing re-election (it just recovered from a failure while
    /// active), and it now has a fresh sample, re-runs election immediately.
    async fn maybe_reelect_after_sample(&self, id: ConnectionId) {
        let mut pending = self.reelect_pending.lock().await;
        if *pending != Some(id) {
            return;
        }
        *pending = None;
        drop(pending);

        if let Err(err) = self.elect_now().await {
            warn!(connection_id = %id, %err, "re-election after recovery failed");
        }
    }

    async fn ping_connection(&self, id: ConnectionId) -> Result<Duration> {
        let connections = self.connections.read().await;
        let connection = connections
            .get(&id)
            .ok_or_else(|| StreamError::ConnectionClosed(format!("connection {id} not tracked")))?
            .clone();
        drop(connections);

        connection.usage_count.fetch_add(1, Ordering::Relaxed);

        let mut pong_rx = connection.pong.subscribe();
        let start = Instant::now();
        connection
            .write
            .lock()
            .await
            .send(Message::Ping(Vec::new()))
            .await
            .map_err(StreamError::from)?;

        let wait_for_pong = async {
            loop {
                if pong_rx.changed().await.is_err() {
                    return Err(StreamError::ConnectionClosed(format!(
                        "connection {id} closed during ping"
                    )));
                }
                let pong_at = *pong_rx.borrow();
                if pong_at >= start {
                    return Ok(pong_at.duration_since(start));
                }
            }
        };

        let latency = tokio::time::timeout(PING_INTERVAL, wait_for_pong)
            .await
            .map_err(|_| StreamError::Timeout(format!("pong from connection {id}")))??;

        connection.record_latency(latency).await;
        info!(connection_id = %id, ?latency, "measured latency");
        Ok(latency)
    }

    /// Spawns the dedicated reader task that owns `read` for the lifetime of the connection:
    /// text frames are forwarded to `recv_inbound`, pongs are routed to any waiting pinger, and
    /// server-initiated pings are answered directly. When the stream ends, triggers `reconnect`.
    fn spawn_reader(self: &Arc<Self>, id: ConnectionId, read: SplitStream<WsSocket>) {
        let pool = Arc::clone(self);
        tokio::spawn(async move { pool.read_loop(id, read).await });
    }

    async fn read_loop(self: Arc<Self>, id: ConnectionId, mut read: SplitStream<WsSocket>) {
        loop {
            tokio::select! {
                _ = self.shutdown.notified() => return,
                frame = read.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        let _ = self.inbound_tx.send(InboundFrame { connection_id: id, text });
                    }
                    Some(Ok(Message::Pong(_))) => {
                        if let Some(connection) = self.connections.read().await.get(&id) {
                            let _ = connection.pong.send(Instant::now());
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        if let Some(connection) = self.connections.read().await.get(&id).cloned() {
                            let _ = connection.write.lock().await.send(Message::Pong(payload)).await;
                        }
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(err)) => {
                        warn!(connection_id = %id, %err, "read error, reconnecting");
                        break;
                    }
                    None => {
                        warn!(connection_id = %id, "connection closed, reconnecting");
                        break;
                    }
                },
            }
        }

        if let Err(err) = self.reconnect(id).await {
            error!(connection_id = %id, %err, "reconnect after read failure ultimately failed");
        }
    }

    /// Closes and reopens `id`, retrying with fixed `RECONNECT_DELAY` until success. The id is
    /// preserved and its latency window cleared. Spawns a fresh reader, flags re-election if `id`
    /// was active, and emits a `ReconnectEvent` so the caller can replay subscriptions.
    pub async fn reconnect(self: &Arc<Self>, id: ConnectionId) -> Result<()> {
        loop {
            match connection::open(&self.uri, &self.headers).await {
                Ok(socket) => {
                    let (write, read) = socket.split();
                    {
                        let mut connections = self.connections.write().await;
                        connections.insert(id, Arc::new(PooledConnection::new(write)));
                    }
                    self.spawn_reader(id, read);

                    if self.active_connection() == Some(id) {
                        *self.reelect_pending.lock().await = Some(id);
                    }
                    let _ = self.reconnect_tx.send(ReconnectEvent { connection_id: id });

                    info!(connection_id = %id, "reconnection successful");
                    return Ok(());
                }
                Err(err) => {
                    warn!(connection_id = %id, %err, "reconnect failed, retrying");
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            }
        }
    }

    /// Waits out `WARMUP_TIME_SECS`, then elects the connection with the minimum mean RTT.
    /// Connections with no samples yet are treated as infinite latency.
    pub async fn elect(&self) -> Result<ConnectionId> {
        tokio::time::sleep(WARMUP_TIME_SECS).await;
        self.elect_now().await
    }

    /// Elects immediately from whatever samples currently exist. Exposed for tests and for
    /// re-election after a new healthy sample following an active-connection failure.
    pub async fn elect_now(&self) -> Result<ConnectionId> {
        let connections = self.connections.read().await;
        let mut means = HashMap::with_capacity(connections.len());
        for (id, connection) in connections.iter() {
            means.insert(*id, connection.mean_latency().await);
        }
        drop(connections);

        let id = elect_by_latency(&means)
            .ok_or_else(|| StreamError::ConnectFailed("no connections to elect from".into()))?;

        *self.active.write().await = Some(id);
        info!(connection_id = %id, "elected connection with minimum latency");
        Ok(id)
    }

    /// Sends a text frame on the active connection.
    pub async fn send_on_active(&self, text: String) -> Result<()> {
        let id = self
            .active_connection()
            .ok_or_else(|| StreamError::ConnectionClosed("no active connection elected".into()))?;
        let connections = self.connections.read().await;
        let connection = connections
            .get(&id)
            .ok_or_else(|| StreamError::ConnectionClosed(format!("connection {id} not tracked")))?
            .clone();
        drop(connections);

        connection
            .write
            .lock()
            .await
            .send(Message::Text(text))
            .await
            .map_err(StreamError::from)
    }

    pub fn request_shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}

/// Picks the id with the minimum mean latency. A connection with no samples yet (`None`) is
/// treated as infinite latency and loses to any connection with at least one sample.
fn elect_by_latency(means: &HashMap<ConnectionId, Option<Duration>>) -> Option<ConnectionId> {
    means
        .iter()
        .min_by_key(|(_, mean)| mean.unwrap_or(Duration::MAX))
        .map(|(id, _)| *id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn election_prefers_lower_mean_latency() {
        let mut means = HashMap::new();
        means.insert(ConnectionId::new(1), Some(Duration::from_millis(10)));
        means.insert(ConnectionId::new(2), Some(Duration::from_millis(100)));

        assert_eq!(elect_by_latency(&means), Some(ConnectionId::new(1)));
    }

    #[test]
    fn connection_with_no_samples_loses_to_any_with_a_sample() {
        let mut means = HashMap::new();
        means.insert(ConnectionId::new(1), None);
        means.insert(ConnectionId::new(2), Some(Duration::from_millis(500)));

        assert_eq!(elect_by_latency(&means), Some(ConnectionId::new(2)));
    }

    #[test]
    fn empty_pool_elects_nothing() {
        let means: HashMap<ConnectionId, Option<Duration>> = HashMap::new();
        assert_eq!(elect_by_latency(&means), None);
    }
}
