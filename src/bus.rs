// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Observer registry for realtime updates
//!
//! Handlers are plain synchronous callbacks keyed by a caller-chosen id.
//! [`EventBus::publish`] snapshots the registry, releases the lock and then
//! calls every handler in turn, so a handler may subscribe, unsubscribe or
//! read the cache without deadlocking. A handler that panics is logged and
//! skipped; the remaining handlers still receive the update.

use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use tracing::{debug, error};

use crate::types::RealtimeUpdate;

/// Callback invoked for every published update
pub type UpdateHandler = Arc<dyn Fn(&RealtimeUpdate) + Send + Sync>;

struct Registration {
    token: u64,
    handler: UpdateHandler,
}

/// Registry of update handlers keyed by subscriber id
#[derive(Default)]
pub struct EventBus {
    handlers: RwLock<HashMap<String, Registration>>,
    next_token: AtomicU64,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers `handler` under `id`
    ///
    /// Registering an id that is already present replaces its handler; the
    /// earlier [`Subscription`] then no longer controls the entry.
    pub fn subscribe<F>(self: &Arc<Self>, id: impl Into<String>, handler: F) -> Subscription
    where
        F: Fn(&RealtimeUpdate) + Send + Sync + 'static,
    {
        let id = id.into();
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);

        let replaced = self
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                id.clone(),
                Registration {
                    token,
                    handler: Arc::new(handler),
                },
            )
            .is_some();

        debug!(subscriber = %id, replaced, "Subscriber registered");

        Subscription {
            id,
            token,
            bus: Arc::downgrade(self),
            active: AtomicBool::new(true),
        }
    }

    fn remove(&self, id: &str, token: u64) -> bool {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        match handlers.get(id) {
            Some(registration) if registration.token == token => {
                handlers.remove(id);
                true
            }
            _ => false,
        }
    }

    /// Delivers `update` to every handler, returning how many ran to completion
    pub fn publish(&self, update: &RealtimeUpdate) -> usize {
        let snapshot: Vec<(String, UpdateHandler)> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, registration)| (id.clone(), Arc::clone(&registration.handler)))
            .collect();

        let mut delivered = 0;
        for (id, handler) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| handler(update))) {
                Ok(()) => delivered += 1,
                Err(panic) => {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "non-string panic payload".to_string());
                    error!(
                        subscriber = %id,
                        kind = %update.kind(),
                        panic = %message,
                        "Subscriber panicked while handling update"
                    );
                }
            }
        }
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Drops every handler
    pub fn clear(&self) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Handle returned by [`EventBus::subscribe`]
///
/// Dropping the handle does not unsubscribe; call
/// [`unsubscribe`](Self::unsubscribe), which is safe to call any number of
/// times.
#[derive(Debug)]
pub struct Subscription {
    id: String,
    token: u64,
    bus: Weak<EventBus>,
    active: AtomicBool,
}

impl Subscription {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Removes the handler; later calls are no-ops
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(bus) = self.bus.upgrade() {
            if bus.remove(&self.id, self.token) {
                debug!(subscriber = %self.id, "Subscriber removed");
            }
        }
    }

    /// Whether [`unsubscribe`](Self::unsubscribe) has not been called yet
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UpdateEvent;
    use std::sync::Mutex;

    fn update() -> RealtimeUpdate {
        RealtimeUpdate::now(UpdateEvent::ScheduledUpdate(vec![]))
    }

    #[test]
    fn test_publish_reaches_every_subscriber() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for id in ["a", "b"] {
            let seen = Arc::clone(&seen);
            bus.subscribe(id, move |u| seen.lock().unwrap().push((id, u.kind())));
        }

        assert_eq!(bus.publish(&update()), 2);
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let bus = EventBus::new();
        let sub = bus.subscribe("a", |_| {});

        sub.unsubscribe();
        sub.unsubscribe();

        assert!(!sub.is_active());
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.publish(&update()), 0);
    }

    #[test]
    fn test_stale_handle_does_not_remove_replacement() {
        let bus = EventBus::new();
        let old = bus.subscribe("page", |_| {});
        let _new = bus.subscribe("page", |_| {});

        old.unsubscribe();
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn test_panicking_handler_is_isolated() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicU64::new(0));

        bus.subscribe("bad", |_| panic!("boom"));
        let counter = Arc::clone(&hits);
        bus.subscribe("good", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(bus.publish(&update()), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_handler_can_unsubscribe_itself() {
        let bus = EventBus::new();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let inner = Arc::clone(&slot);
        let sub = bus.subscribe("once", move |_| {
            if let Some(sub) = inner.lock().unwrap().as_ref() {
                sub.unsubscribe();
            }
        });
        *slot.lock().unwrap() = Some(sub);

        bus.publish(&update());
        assert_eq!(bus.subscriber_count(), 0);
    }
}
