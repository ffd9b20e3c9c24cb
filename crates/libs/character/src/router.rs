//! Demultiplexes the shared inbound event channel.
//!
//! Every pending action holds one [`Subscription`] covering the event kinds
//! its correlator cares about. Closing (or dropping) the subscription removes
//! exactly that registration, so a resolved action can never observe events
//! meant for a later one.

use log::debug;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

use crate::protocol::{EventKind, InboundEvent};

type SubscriptionId = u64;

#[derive(Default)]
struct RouterInner {
    next_id: SubscriptionId,
    subscribers: HashMap<EventKind, Vec<(SubscriptionId, mpsc::UnboundedSender<InboundEvent>)>>,
}

/// A cheap, cloneable handle to the shared router.
#[derive(Clone, Default)]
pub struct EventRouter {
    inner: Arc<Mutex<RouterInner>>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RouterInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers one subscription receiving every event of the given kinds.
    pub fn subscribe(&self, kinds: &[EventKind]) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;

        let mut registered = Vec::with_capacity(kinds.len());
        for kind in kinds {
            if registered.contains(kind) {
                continue;
            }
            inner
                .subscribers
                .entry(*kind)
                .or_default()
                .push((id, tx.clone()));
            registered.push(*kind);
        }

        Subscription {
            id,
            kinds: registered,
            router: self.clone(),
            receiver: rx,
            active: true,
        }
    }

    /// Delivers an event to every subscription registered for its kind.
    /// Returns the number of subscriptions it reached.
    pub fn publish(&self, event: &InboundEvent) -> usize {
        let inner = self.lock();
        let Some(subscribers) = inner.subscribers.get(&event.kind()) else {
            return 0;
        };
        subscribers
            .iter()
            .filter(|(_, tx)| tx.send(event.clone()).is_ok())
            .count()
    }

    /// The number of live (subscription, kind) registrations.
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.values().map(Vec::len).sum()
    }

    fn unsubscribe(&self, id: SubscriptionId, kinds: &[EventKind]) -> usize {
        let mut inner = self.lock();
        let mut removed = 0;
        for kind in kinds {
            if let Some(subscribers) = inner.subscribers.get_mut(kind) {
                let before = subscribers.len();
                subscribers.retain(|(subscriber, _)| *subscriber != id);
                removed += before - subscribers.len();
                if subscribers.is_empty() {
                    inner.subscribers.remove(kind);
                }
            }
        }
        removed
    }
}

/// The set of observers registered for one pending action.
pub struct Subscription {
    id: SubscriptionId,
    kinds: Vec<EventKind>,
    router: EventRouter,
    receiver: mpsc::UnboundedReceiver<InboundEvent>,
    active: bool,
}

impl Subscription {
    /// Waits for the next routed event. Returns `None` once closed and drained.
    pub async fn recv(&mut self) -> Option<InboundEvent> {
        self.receiver.recv().await
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Removes every registration of this subscription. Only the first call
    /// does anything; it returns `false` afterwards.
    pub fn close(&mut self) -> bool {
        if !self.active {
            return false;
        }
        self.active = false;
        let removed = self.router.unsubscribe(self.id, &self.kinds);
        self.receiver.close();
        debug!("Subscription {} closed ({} registrations removed)", self.id, removed);
        true
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}
