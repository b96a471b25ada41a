//! Subscription Manager (spec §4.4): tracks outstanding subscriptions by id, composes
//! subscribe/update/unsubscribe commands, and reconciles server-initiated state changes.
//!
//! Grounded in `original_source/packages/kalshi/src/kalshi/ws/client.py`
//! (`KalshiWsClient.add_subscription`/`update_subscription`/`unsubscribe`/
//! `_handle_forced_unsubscription_`/`resubscribe_all`) and the `Subscription` namedtuple in
//! `original_source/packages/kalshi/src/kalshi/ws/subscription.py`.

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use time::OffsetDateTime;

use crate::types::{SubscriptionId, TickerScope};
use crate::wire::{subscribe_command, unsubscribe_command, update_subscription_command};

/// Lifecycle state of a tracked subscription, per spec §4.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    PendingAck,
    Active,
    PendingUnsub,
}

#[derive(Debug, Clone)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub channels: Vec<String>,
    pub tickers: TickerScope,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub state: SubscriptionState,
}

impl Subscription {
    pub fn is_active(&self) -> bool {
        self.state == SubscriptionState::Active
    }
}

fn tickers_as_wire(tickers: &TickerScope) -> Option<Vec<String>> {
    match tickers {
        TickerScope::Markets(markets) => {
            Some(markets.iter().map(|ticker| ticker.as_str().to_string()).collect())
        }
        TickerScope::AllMarkets => None,
    }
}

/// An optimistic ticker add/remove command awaiting server acknowledgement, keyed by the wire
/// id of the command itself. If the server rejects it with an `error` frame echoing that id,
/// `rollback_ticker_update` restores `previous` and re-issues the inverse action.
#[derive(Debug, Clone)]
struct PendingTickerUpdate {
    subscription_id: SubscriptionId,
    action: &'static str,
    tickers: Vec<String>,
    previous: HashSet<String>,
}

/// Owns the full set of subscriptions for one WebSocket connection. A single-writer structure:
/// only the task that owns the active connection calls its mutating methods.
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    subscriptions: HashMap<SubscriptionId, Subscription>,
    pending_unsubscriptions: HashSet<SubscriptionId>,
    pending_updates: HashMap<SubscriptionId, PendingTickerUpdate>,
    next_id: u64,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&mut self) -> SubscriptionId {
        self.next_id += 1;
        SubscriptionId::new(self.next_id)
    }

    pub fn get(&self, id: SubscriptionId) -> Option<&Subscription> {
        self.subscriptions.get(&id)
    }

    pub fn active_subscriptions(&self) -> impl Iterator<Item = &Subscription> {
        self.subscriptions.values().filter(|sub| sub.is_active())
    }

    /// Allocates a new id in `PendingAck`, returning the id and the wire command to send.
    pub fn add_subscription(&mut self, channels: Vec<String>, tickers: TickerScope, now: OffsetDateTime) -> (SubscriptionId, Value) {
        let id = self.allocate_id();
        let command = subscribe_command(id, &channels, tickers_as_wire(&tickers).as_deref());

        self.subscriptions.insert(
            id,
            Subscription {
                id,
                channels,
                tickers,
                created_at: now,
                updated_at: now,
                state: SubscriptionState::PendingAck,
            },
        );

        (id, command)
    }

    /// Transitions a `subscribed` acknowledgement: `PendingAck` → `Active`.
    pub fn confirm(&mut self, id: SubscriptionId, now: OffsetDateTime) {
        if let Some(subscription) = self.subscriptions.get_mut(&id) {
            subscription.state = SubscriptionState::Active;
            subscription.updated_at = now;
        }
    }

    /// Computes `add = new − current`, `remove = current − new`, and returns the wire commands
    /// to send (additions before deletions). Updates local ticker state optimistically.
    pub fn update_tickers(
        &mut self,
        id: SubscriptionId,
        new_tickers: Vec<String>,
        now: OffsetDateTime,
    ) -> Vec<Value> {
        let Some(subscription) = self.subscriptions.get_mut(&id) else {
            return Vec::new();
        };

        let current: HashSet<String> = match &subscription.tickers {
            TickerScope::Markets(markets) => {
                markets.iter().map(|t| t.as_str().to_string()).collect()
            }
            TickerScope::AllMarkets => HashSet::new(),
        };
        let new: HashSet<String> = new_tickers.iter().cloned().collect();

        let to_add: Vec<String> = new.difference(&current).cloned().collect();
        let to_remove: Vec<String> = current.difference(&new).cloned().collect();

        let mut commands = Vec::new();
        if !to_add.is_empty() {
            self.next_id += 1;
            let command_id = SubscriptionId::new(self.next_id);
            commands.push(update_subscription_command(command_id, id, &to_add, "add_markets"));
            self.pending_updates.insert(
                command_id,
                PendingTickerUpdate {
                    subscription_id: id,
                    action: "add_markets",
                    tickers: to_add.clone(),
                    previous: current.clone(),
                },
            );
        }
        if !to_remove.is_empty() {
            self.next_id += 1;
            let command_id = SubscriptionId::new(self.next_id);
            commands.push(update_subscription_command(command_id, id, &to_remove, "delete_markets"));
            self.pending_updates.insert(
                command_id,
                PendingTickerUpdate {
                    subscription_id: id,
                    action: "delete_markets",
                    tickers: to_remove.clone(),
                    previous: current.clone(),
                },
            );
        }

        subscription.tickers =
            TickerScope::Markets(new_tickers.into_iter().map(Into::into).collect());
        subscription.updated_at = now;

        commands
    }

    /// Rolls back an optimistically-applied ticker diff rejected by the server: restores the
    /// subscription's ticker set to what it was before the diff and returns the inverse wire
    /// command (`add_markets` ↔ `delete_markets`) to undo it server-side. Returns `None` if
    /// `command_id` does not correspond to a tracked pending update.
    pub fn rollback_ticker_update(&mut self, command_id: SubscriptionId, now: OffsetDateTime) -> Option<Value> {
        let pending = self.pending_updates.remove(&command_id)?;
        let subscription = self.subscriptions.get_mut(&pending.subscription_id)?;

        subscription.tickers =
            TickerScope::Markets(pending.previous.iter().cloned().map(Into::into).collect());
        subscription.updated_at = now;

        let inverse_action = match pending.action {
            "add_markets" => "delete_markets",
            _ => "add_markets",
        };

        self.next_id += 1;
        Some(update_subscription_command(
            SubscriptionId::new(self.next_id),
            pending.subscription_id,
            &pending.tickers,
            inverse_action,
        ))
    }

    /// Marks `ids` as `PendingUnsub` and returns the single `unsubscribe` wire command for the
    /// valid subset. Ids not currently tracked are silently ignored.
    pub fn unsubscribe(&mut self, ids: &[SubscriptionId]) -> (Vec<SubscriptionId>, Option<Value>) {
        let valid: Vec<SubscriptionId> = ids
            .iter()
            .copied()
            .filter(|id| self.subscriptions.contains_key(id))
            .collect();

        if valid.is_empty() {
            return (Vec::new(), None);
        }

        for id in &valid {
            self.pending_unsubscriptions.insert(*id);
            if let Some(subscription) = self.subscriptions.get_mut(id) {
                subscription.state = SubscriptionState::PendingUnsub;
            }
        }

        let command = unsubscribe_command(&valid);
        (valid, Some(command))
    }

    /// Completes an `unsubscribed` acknowledgement for an id that was pending removal.
    pub fn confirm_unsubscribe(&mut self, id: SubscriptionId) {
        self.pending_unsubscriptions.remove(&id);
        self.subscriptions.remove(&id);
    }

    /// Reconciles a server-initiated `unsubscribed` frame. If `id` was awaiting removal, clears
    /// the pending marker. Otherwise the unsubscribe was forced: re-subscribes with the same
    /// channel set under a fresh id, abandoning the old one, and returns the new id + command.
    pub fn handle_unsubscribed(
        &mut self,
        id: SubscriptionId,
        now: OffsetDateTime,
    ) -> Option<(SubscriptionId, Value)> {
        if self.pending_unsubscriptions.remove(&id) {
            self.subscriptions.remove(&id);
            return None;
        }

        let subscription = self.subscriptions.remove(&id)?;
        Some(self.add_subscription(subscription.channels, subscription.tickers, now))
    }

    /// Replays every `Active` subscription on a freshly (re)established socket, preserving
    /// `created_at` and bumping `updated_at`.
    pub fn resubscribe_all(&mut self, now: OffsetDateTime) -> Vec<Value> {
        let mut commands = Vec::new();
        for subscription in self.subscriptions.values_mut() {
            if subscription.state != SubscriptionState::Active {
                continue;
            }
            let tickers = tickers_as_wire(&subscription.tickers);
            commands.push(subscribe_command(
                subscription.id,
                &subscription.channels,
                tickers.as_deref(),
            ));
            subscription.updated_at = now;
        }
        commands
    }
}
