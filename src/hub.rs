//! Realtime channel hub and per-session channel binding.
//!
//! DESIGN
//! ======
//! The hub is the in-process stand-in for the hosted publish/subscribe
//! transport: named channels fan events out to per-subscriber bounded mpsc
//! queues with best-effort `try_send`. Publishes exclude the originating
//! subscriber — a sender's own view comes from its optimistic append, so
//! echoing back to self would duplicate it.
//!
//! The binding wraps one subscription for one session and owns the
//! `Disconnected → Connecting → Connected` state machine. Transitions into
//! `Connected` happen only on subscription acknowledgement from the hub,
//! never on local intent. Release is guaranteed: `close()` on the normal
//! path, `Drop` on every other exit path.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::message::ChatEvent;

pub const DEFAULT_CHANNEL_QUEUE_CAPACITY: usize = 256;

// =============================================================================
// CHANNEL NAMING
// =============================================================================

/// Derive the broadcast channel name for a participant pair: ids sorted
/// lexically and joined with `_`, so both sessions compute the same name
/// without exchanging it out of band.
#[must_use]
pub fn channel_name(user_a: Uuid, user_b: Uuid) -> String {
    let a = user_a.to_string();
    let b = user_b.to_string();
    if a <= b { format!("{a}_{b}") } else { format!("{b}_{a}") }
}

// =============================================================================
// HUB
// =============================================================================

/// Named-channel broadcast hub. Subscribers are keyed by a per-subscription
/// id so a publish can exclude its originator.
pub struct ChannelHub {
    channels: RwLock<HashMap<String, HashMap<Uuid, mpsc::Sender<ChatEvent>>>>,
    queue_capacity: usize,
}

impl ChannelHub {
    #[must_use]
    pub fn new(queue_capacity: usize) -> Self {
        Self { channels: RwLock::new(HashMap::new()), queue_capacity }
    }

    /// Subscribe to a channel. Returning is the transport acknowledgement:
    /// once the subscriber id and receiver are handed back, delivery to this
    /// subscriber is active.
    pub fn subscribe(&self, channel: &str) -> (Uuid, mpsc::Receiver<ChatEvent>) {
        let subscriber = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(self.queue_capacity);

        let mut channels = self.channels.write().unwrap_or_else(PoisonError::into_inner);
        channels.entry(channel.to_string()).or_default().insert(subscriber, tx);
        info!(%subscriber, channel, "hub: subscribed");

        (subscriber, rx)
    }

    /// Remove a subscriber. Empty channels are evicted so the map does not
    /// accumulate one entry per pair ever seen.
    pub fn unsubscribe(&self, channel: &str, subscriber: Uuid) {
        let mut channels = self.channels.write().unwrap_or_else(PoisonError::into_inner);
        let Some(subscribers) = channels.get_mut(channel) else {
            return;
        };
        subscribers.remove(&subscriber);
        info!(%subscriber, channel, remaining = subscribers.len(), "hub: unsubscribed");
        if subscribers.is_empty() {
            channels.remove(channel);
        }
    }

    /// Publish an event to every subscriber on a channel except the
    /// originator. Returns the number of queues the event reached.
    pub fn publish(&self, channel: &str, event: &ChatEvent, exclude: Option<Uuid>) -> usize {
        let channels = self.channels.read().unwrap_or_else(PoisonError::into_inner);
        let Some(subscribers) = channels.get(channel) else {
            return 0;
        };

        let mut delivered = 0;
        for (subscriber, tx) in subscribers {
            if exclude == Some(*subscriber) {
                continue;
            }
            // Best-effort: a subscriber with a full queue is skipped.
            match tx.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => warn!(%subscriber, channel, error = %e, "hub: delivery skipped"),
            }
        }
        delivered
    }

    pub fn subscriber_count(&self, channel: &str) -> usize {
        let channels = self.channels.read().unwrap_or_else(PoisonError::into_inner);
        channels.get(channel).map_or(0, HashMap::len)
    }
}

impl Default for ChannelHub {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_QUEUE_CAPACITY)
    }
}

// =============================================================================
// BINDING
// =============================================================================

/// Subscription lifecycle of one session's channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
}

/// One session's handle on its conversation channel.
pub struct ChannelBinding {
    hub: Arc<ChannelHub>,
    channel: String,
    state: ChannelState,
    subscriber: Option<Uuid>,
}

impl ChannelBinding {
    #[must_use]
    pub fn new(hub: Arc<ChannelHub>, user_a: Uuid, user_b: Uuid) -> Self {
        Self { hub, channel: channel_name(user_a, user_b), state: ChannelState::Disconnected, subscriber: None }
    }

    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    #[must_use]
    pub fn state(&self) -> ChannelState {
        self.state
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state == ChannelState::Connected
    }

    /// Open the subscription and return the inbound event receiver.
    /// Reconnecting releases the previous subscription first.
    pub fn connect(&mut self) -> mpsc::Receiver<ChatEvent> {
        self.release();
        self.state = ChannelState::Connecting;
        let (subscriber, rx) = self.hub.subscribe(&self.channel);
        self.subscriber = Some(subscriber);
        self.state = ChannelState::Connected;
        rx
    }

    /// Publish an event to the channel peers. While not connected this is a
    /// silent drop from the broadcast path; the caller's optimistic copy is
    /// unaffected. Returns whether the event was handed to the transport.
    pub fn send(&self, event: &ChatEvent) -> bool {
        if !self.is_connected() {
            debug!(channel = %self.channel, state = ?self.state, "binding: send dropped while not connected");
            return false;
        }
        self.hub.publish(&self.channel, event, self.subscriber);
        true
    }

    /// Tear down the subscription so the hub frees the channel slot.
    pub fn close(&mut self) {
        self.release();
        self.state = ChannelState::Disconnected;
    }

    fn release(&mut self) {
        if let Some(subscriber) = self.subscriber.take() {
            self.hub.unsubscribe(&self.channel, subscriber);
        }
    }
}

impl Drop for ChannelBinding {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
#[path = "hub_test.rs"]
mod tests;
