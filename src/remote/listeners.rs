// SPDX-License-Identifier: MPL-2.0

//! Change-notification plumbing shared by the store and auth implementations.
//!
//! Each registered callback lives in its own slot. Dispatch holds the slot's
//! lock while the callback runs and cancellation takes the same lock, so once
//! [`Subscription::cancel`] returns the callback is never entered again. The
//! flip side: a callback must not cancel its own subscription.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

type Callback<T> = Box<dyn Fn(&T) + Send + Sync>;

struct Slot<T> {
    active: Mutex<bool>,
    callback: Callback<T>,
}

type SlotMap<T> = HashMap<String, Vec<(u64, Arc<Slot<T>>)>>;

/// Callbacks keyed by topic (a document path, or a fixed key for auth).
pub struct ListenerRegistry<T> {
    slots: Arc<Mutex<SlotMap<T>>>,
    next_id: AtomicU64,
}

impl<T: 'static> ListenerRegistry<T> {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn register(
        &self,
        key: &str,
        callback: impl Fn(&T) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let slot = Arc::new(Slot {
            active: Mutex::new(true),
            callback: Box::new(callback),
        });

        self.slots
            .lock()
            .expect("listener lock poisoned")
            .entry(key.to_string())
            .or_default()
            .push((id, Arc::clone(&slot)));

        let registry: Weak<Mutex<SlotMap<T>>> = Arc::downgrade(&self.slots);
        let key = key.to_string();

        Subscription::new(move || {
            *slot.active.lock().expect("listener slot poisoned") = false;

            if let Some(slots) = registry.upgrade() {
                let mut slots = slots.lock().expect("listener lock poisoned");
                if let Some(list) = slots.get_mut(&key) {
                    list.retain(|(slot_id, _)| *slot_id != id);
                    if list.is_empty() {
                        slots.remove(&key);
                    }
                }
            }
        })
    }

    /// Invoke every active callback registered under `key`.
    pub fn notify(&self, key: &str, value: &T) {
        // Snapshot the slots so callbacks run without the registry lock held.
        let slots: Vec<Arc<Slot<T>>> = {
            let map = self.slots.lock().expect("listener lock poisoned");
            map.get(key)
                .map(|list| list.iter().map(|(_, slot)| Arc::clone(slot)).collect())
                .unwrap_or_default()
        };

        for slot in slots {
            let active = slot.active.lock().expect("listener slot poisoned");
            if *active {
                (slot.callback)(value);
            }
        }
    }

    pub fn listener_count(&self, key: &str) -> usize {
        self.slots
            .lock()
            .expect("listener lock poisoned")
            .get(key)
            .map_or(0, Vec::len)
    }
}

impl<T: 'static> Default for ListenerRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Cancellation handle for a registered callback. Dropping it cancels.
#[must_use = "dropping a Subscription cancels it immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Stop delivery. Synchronous and idempotent.
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_notify_reaches_matching_key_only() {
        let registry = ListenerRegistry::<u32>::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        let _sub = registry.register("progress/a", move |v| {
            counter.fetch_add(*v as usize, Ordering::SeqCst);
        });

        registry.notify("progress/a", &3);
        registry.notify("progress/b", &100);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_cancel_stops_delivery() {
        let registry = ListenerRegistry::<u32>::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        let mut sub = registry.register("k", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        registry.notify("k", &1);
        sub.cancel();
        assert!(!sub.is_active());
        registry.notify("k", &1);

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(registry.listener_count("k"), 0);
    }

    #[test]
    fn test_drop_cancels() {
        let registry = ListenerRegistry::<u32>::new();
        let hits = Arc::new(AtomicUsize::new(0));

        {
            let counter = Arc::clone(&hits);
            let _sub = registry.register("k", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
            assert_eq!(registry.listener_count("k"), 1);
        }

        registry.notify("k", &1);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_cancel_outlives_registry() {
        let registry = ListenerRegistry::<u32>::new();
        let mut sub = registry.register("k", |_| {});
        drop(registry);
        sub.cancel();
        assert!(!sub.is_active());
    }
}
