//! Change feed for broadcasting store notifications.

use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use super::types::{
    ChangeSubscription, Delivery, Inbox, PendingChanges, SubscriptionConfig, SubscriptionId,
};
use crate::types::ChangeSet;

/// Outcome of offering a change set to one subscriber.
enum Offer {
    Delivered,
    Overflow,
    Disconnected,
}

enum Outbox<Id: Eq + Hash> {
    Queued(Sender<ChangeSet<Id>>),
    Coalesced {
        signal: Sender<()>,
        pending: PendingChanges<Id>,
    },
}

impl<Id: Clone + Eq + Hash> Outbox<Id> {
    /// Never blocks. A coalesced outbox folds into its pending slot first and
    /// then raises the signal; a signal that is already raised is enough.
    fn offer(&self, changes: &ChangeSet<Id>) -> Offer {
        match self {
            Outbox::Queued(sender) => match sender.try_send(changes.clone()) {
                Ok(()) => Offer::Delivered,
                Err(TrySendError::Full(_)) => Offer::Overflow,
                Err(TrySendError::Disconnected(_)) => Offer::Disconnected,
            },
            Outbox::Coalesced { signal, pending } => {
                {
                    let mut slot = pending.lock();
                    match slot.as_mut() {
                        Some(existing) => existing.merge(changes.clone()),
                        None => *slot = Some(changes.clone()),
                    }
                }
                match signal.try_send(()) {
                    Ok(()) | Err(TrySendError::Full(())) => Offer::Delivered,
                    Err(TrySendError::Disconnected(())) => Offer::Disconnected,
                }
            }
        }
    }
}

/// Fan-out of change notifications to independent subscribers.
///
/// Each subscriber has its own channel, so a slow consumer never delays
/// another one or the publisher. Dropping the feed (or calling
/// [`ChangeFeed::close`]) disconnects every subscriber.
pub struct ChangeFeed<Id: Eq + Hash> {
    /// Active subscribers by ID.
    subscribers: RwLock<HashMap<SubscriptionId, Outbox<Id>>>,
    /// Counter for generating subscription IDs.
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl<Id: Clone + Eq + Hash> ChangeFeed<Id> {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        }
    }

    /// Create a new subscription that sees every change published from now on.
    ///
    /// Subscribing to a closed feed returns an already-disconnected handle.
    pub fn subscribe(&self, config: SubscriptionConfig) -> ChangeSubscription<Id> {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));

        let (outbox, inbox) = match config.delivery {
            Delivery::Queued { buffer_size } => {
                let (sender, receiver) = bounded(buffer_size.max(1));
                (Outbox::Queued(sender), Inbox::Queued(receiver))
            }
            Delivery::Coalesced => {
                let (signal_tx, signal_rx) = bounded(1);
                let pending: PendingChanges<Id> = Arc::new(Mutex::new(None));
                (
                    Outbox::Coalesced {
                        signal: signal_tx,
                        pending: Arc::clone(&pending),
                    },
                    Inbox::Coalesced {
                        signal: signal_rx,
                        pending,
                    },
                )
            }
        };

        let mut subs = self.subscribers.write();
        // Checked under the lock so a concurrent close cannot miss this entry.
        if !self.is_closed() {
            subs.insert(id, outbox);
        }

        ChangeSubscription { id, inbox }
    }

    /// Unsubscribe and clean up. Returns false if the subscription was
    /// already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.write().remove(&id).is_some()
    }

    /// Get subscription count.
    pub fn subscription_count(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Publish a change set to every subscriber.
    ///
    /// Empty change sets are not published. Subscribers that have gone away
    /// or overflowed their queue are removed.
    pub fn publish(&self, changes: &ChangeSet<Id>) {
        if changes.is_empty() || self.is_closed() {
            return;
        }

        let mut to_remove = Vec::new();

        {
            let subs = self.subscribers.read();
            for (id, outbox) in subs.iter() {
                match outbox.offer(changes) {
                    Offer::Delivered => {}
                    Offer::Overflow => {
                        warn!(subscription = id.0, "dropping slow change subscriber");
                        to_remove.push(*id);
                    }
                    Offer::Disconnected => to_remove.push(*id),
                }
            }
        }

        if !to_remove.is_empty() {
            let mut subs = self.subscribers.write();
            for id in to_remove {
                subs.remove(&id);
            }
        }
    }

    /// Disconnect every subscriber and refuse new ones. Idempotent.
    pub fn close(&self) {
        let mut subs = self.subscribers.write();
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!(subscribers = subs.len(), "closing change feed");
        }
        subs.clear();
    }
}

impl<Id: Clone + Eq + Hash> Default for ChangeFeed<Id> {
    fn default() -> Self {
        Self::new()
    }
}
