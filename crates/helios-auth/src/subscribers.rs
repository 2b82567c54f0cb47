//! Callback registry for auth-state and token-change notifications.

use std::sync::{Arc, Mutex};

type Callback<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Stable handle returned by a subscription, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId {
    slot: usize,
}

/// Ordered callback registry.
///
/// Slots are append-only: unsubscribing blanks the slot in place and the
/// list is never compacted, so a notification pass iterating by slot
/// index is never corrupted by concurrent removal. Each delivery
/// re-reads its slot immediately before invoking, which makes
/// unsubscription from within an earlier callback effective for the
/// in-flight pass.
pub(crate) struct Registry<T> {
    slots: Mutex<Vec<Option<Callback<T>>>>,
}

impl<T: Clone> Registry<T> {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self, callback: impl Fn(T) + Send + Sync + 'static) -> SubscriptionId {
        let mut slots = self.slots.lock().expect("registry lock poisoned");
        slots.push(Some(Arc::new(callback)));
        SubscriptionId {
            slot: slots.len() - 1,
        }
    }

    /// Blank the slot. Returns false if it was already blank.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut slots = self.slots.lock().expect("registry lock poisoned");
        match slots.get_mut(id.slot) {
            Some(slot) => slot.take().is_some(),
            None => false,
        }
    }

    /// Deliver `value` to every occupied slot in subscription order.
    ///
    /// Callbacks run outside the registry lock; subscriptions added
    /// during delivery are not called until the next pass.
    pub fn notify(&self, value: T) {
        let len = self.slots.lock().expect("registry lock poisoned").len();
        for slot in 0..len {
            let callback = {
                let slots = self.slots.lock().expect("registry lock poisoned");
                slots.get(slot).and_then(|s| s.clone())
            };
            if let Some(callback) = callback {
                callback(value.clone());
            }
        }
    }
}
