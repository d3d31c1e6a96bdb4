//! Per-room fan-out of registry events to joined connections.
//!
//! Every subscriber owns a bounded `tokio::sync::mpsc` queue drained by its
//! connection task. Publishing never waits: when a queue is full or its
//! receiver is gone, the event is dropped for that subscriber only. There is
//! no resend, so a subscriber that drops events keeps a stale mirror until it
//! reconnects.

use std::collections::BTreeMap;
use std::sync::Arc;

use proximity_common::Update;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Sending half of a connection's outbound queue.
pub type Outbox = mpsc::Sender<Arc<Update>>;

/// Receiving half, drained by the connection task.
pub type Inbox = mpsc::Receiver<Arc<Update>>;

/// Create a bounded outbound queue for one connection.
pub fn outbox(capacity: usize) -> (Outbox, Inbox) {
    mpsc::channel(capacity.max(1))
}

/// Token returned by [`UpdateBroadcaster::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

/// Outcome of one [`UpdateBroadcaster::publish`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub dropped: usize,
}

/// Subscriber set for one room.
#[derive(Default)]
pub struct UpdateBroadcaster {
    subscribers: BTreeMap<SubscriptionId, Outbox>,
    next_id: u64,
}

impl UpdateBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, outbox: Outbox) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.subscribers.insert(id, outbox);
        id
    }

    /// Returns `false` if the token was already unsubscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Deliver `update` to every subscriber, in subscription order.
    pub fn publish(&self, update: Update) -> PublishReport {
        let update = Arc::new(update);
        let mut report = PublishReport::default();
        for (&id, outbox) in &self.subscribers {
            if deliver(id, outbox, update.clone()) {
                report.delivered += 1;
            } else {
                report.dropped += 1;
            }
        }
        report
    }

    /// Deliver `update` to a single subscriber. Returns `false` if it was
    /// dropped or the subscriber is unknown.
    pub fn send_to(&self, id: SubscriptionId, update: Update) -> bool {
        match self.subscribers.get(&id) {
            Some(outbox) => deliver(id, outbox, Arc::new(update)),
            None => false,
        }
    }
}

fn deliver(id: SubscriptionId, outbox: &Outbox, update: Arc<Update>) -> bool {
    match outbox.try_send(update) {
        Ok(()) => true,
        Err(TrySendError::Full(update)) => {
            tracing::warn!(
                subscription = id.0,
                peer_id = %update.peer_id(),
                "dropping room event for slow subscriber"
            );
            false
        }
        Err(TrySendError::Closed(_)) => {
            tracing::debug!(subscription = id.0, "subscriber queue closed");
            false
        }
    }
}
