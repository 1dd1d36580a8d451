//! Subscription types for store change notifications.

use crate::types::ChangeSet;
use crossbeam_channel::{Receiver, RecvError, RecvTimeoutError, TryRecvError};
use parking_lot::Mutex;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default queue depth for [`Delivery::Queued`] subscribers.
pub const DEFAULT_BUFFER_SIZE: usize = 1000;

/// How notifications reach a subscriber that has not caught up yet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// Every change set is queued separately. A subscriber whose queue is
    /// full is dropped.
    Queued { buffer_size: usize },
    /// Pending change sets are merged into one. Nothing is ever dropped and
    /// the subscriber sees at most one outstanding notification.
    Coalesced,
}

/// Configuration for a change subscription.
#[derive(Clone, Debug)]
pub struct SubscriptionConfig {
    /// Default: queued, 1000 notifications.
    pub delivery: Delivery,
}

impl SubscriptionConfig {
    pub fn queued(buffer_size: usize) -> Self {
        Self {
            delivery: Delivery::Queued { buffer_size },
        }
    }

    pub fn coalesced() -> Self {
        Self {
            delivery: Delivery::Coalesced,
        }
    }
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self::queued(DEFAULT_BUFFER_SIZE)
    }
}

/// Unique identifier for a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

/// Slot shared between the feed and a coalesced subscriber.
pub(crate) type PendingChanges<Id> = Arc<Mutex<Option<ChangeSet<Id>>>>;

pub(crate) enum Inbox<Id: Eq + Hash> {
    Queued(Receiver<ChangeSet<Id>>),
    Coalesced {
        signal: Receiver<()>,
        pending: PendingChanges<Id>,
    },
}

/// Receiving end of a change subscription.
///
/// The channel disconnects once the subscription is removed from its feed:
/// on unsubscribe, on overflow, or when the store is torn down. Queued
/// notifications are still delivered before the disconnect is reported.
pub struct ChangeSubscription<Id: Eq + Hash> {
    pub(crate) id: SubscriptionId,
    pub(crate) inbox: Inbox<Id>,
}

impl<Id: Eq + Hash> ChangeSubscription<Id> {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Receive the next change set (blocking).
    pub fn recv(&self) -> Result<ChangeSet<Id>, RecvError> {
        match &self.inbox {
            Inbox::Queued(receiver) => receiver.recv(),
            Inbox::Coalesced { signal, pending } => loop {
                signal.recv()?;
                if let Some(changes) = pending.lock().take() {
                    return Ok(changes);
                }
            },
        }
    }

    /// Try to receive a change set (non-blocking).
    pub fn try_recv(&self) -> Result<ChangeSet<Id>, TryRecvError> {
        match &self.inbox {
            Inbox::Queued(receiver) => receiver.try_recv(),
            Inbox::Coalesced { signal, pending } => loop {
                signal.try_recv()?;
                if let Some(changes) = pending.lock().take() {
                    return Ok(changes);
                }
            },
        }
    }

    /// Receive with timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<ChangeSet<Id>, RecvTimeoutError> {
        match &self.inbox {
            Inbox::Queued(receiver) => receiver.recv_timeout(timeout),
            Inbox::Coalesced { signal, pending } => {
                let deadline = Instant::now() + timeout;
                loop {
                    signal.recv_deadline(deadline)?;
                    if let Some(changes) = pending.lock().take() {
                        return Ok(changes);
                    }
                }
            }
        }
    }
}
