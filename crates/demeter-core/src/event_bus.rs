//! In-process publish/subscribe for orchestrator events
//!
//! The bus invokes listeners synchronously, in registration order, on the
//! publisher's thread. Dispatch is serialized: all listeners registered
//! for one event observe its publishes in publish order. A listener that
//! fails is logged and skipped; the remaining listeners still run.
//!
//! Listeners may subscribe and unsubscribe freely from inside a callback,
//! but must not publish on the bus that is dispatching to them.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tracing::warn;

use crate::error::Result;
use crate::events::{Event, EventName};
use crate::log::LogEntry;

/// Proof of a registration, consumed by `unsubscribe`.
///
/// Handles are scoped to the bus that issued them.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "dropping the handle leaves the listener registered"]
pub struct SubscriptionHandle {
    id: u64,
}

/// Which events a listener wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSelector {
    /// Only events with this name
    Named(EventName),
    /// Every event
    Any,
}

impl EventSelector {
    fn matches(&self, name: EventName) -> bool {
        match self {
            EventSelector::Named(selected) => *selected == name,
            EventSelector::Any => true,
        }
    }
}

type EventListener = Arc<dyn Fn(&Event) -> Result<()> + Send + Sync>;

struct EventRegistration {
    id: u64,
    selector: EventSelector,
    listener: EventListener,
}

#[derive(Default)]
struct EventRegistry {
    next_id: u64,
    listeners: Vec<EventRegistration>,
}

/// Publish/subscribe bus for [`Event`] values.
///
/// Each orchestrator instance owns one bus; the server and the buffered
/// stream hold references to it.
#[derive(Default)]
pub struct EventBus {
    registry: Mutex<EventRegistry>,
    dispatch: Mutex<()>,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for the selected events.
    pub fn subscribe<F>(&self, selector: EventSelector, listener: F) -> SubscriptionHandle
    where
        F: Fn(&Event) -> Result<()> + Send + Sync + 'static,
    {
        let mut registry = self.lock_registry();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.listeners.push(EventRegistration {
            id,
            selector,
            listener: Arc::new(listener),
        });
        SubscriptionHandle { id }
    }

    /// Remove the registration behind `handle`.
    ///
    /// Unknown handles (already removed) are ignored.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) {
        let mut registry = self.lock_registry();
        registry.listeners.retain(|reg| reg.id != handle.id);
    }

    /// Publish an event, stamping it with the current time.
    ///
    /// Returns the number of listeners invoked. Publishing with no
    /// listeners is a no-op.
    pub fn publish(&self, name: EventName, payload: Value) -> usize {
        self.publish_event(Event::new(name, payload))
    }

    /// Publish an already-constructed event, preserving its timestamp.
    ///
    /// Used when relaying events received from another process.
    pub fn publish_event(&self, event: Event) -> usize {
        let _dispatch = self
            .dispatch
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let matching: Vec<EventListener> = {
            let registry = self.lock_registry();
            registry
                .listeners
                .iter()
                .filter(|reg| reg.selector.matches(event.name))
                .map(|reg| Arc::clone(&reg.listener))
                .collect()
        };

        for listener in &matching {
            if let Err(e) = listener(&event) {
                warn!(event = %event.name, error = %e, "event listener failed");
            }
        }
        matching.len()
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.lock_registry().listeners.len()
    }

    fn lock_registry(&self) -> MutexGuard<'_, EventRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

type LogListener = Arc<dyn Fn(&LogEntry) -> Result<()> + Send + Sync>;

struct LogRegistration {
    id: u64,
    listener: LogListener,
}

#[derive(Default)]
struct LogRegistry {
    next_id: u64,
    listeners: Vec<LogRegistration>,
}

/// Publish/subscribe bus for [`LogEntry`] emissions.
///
/// Same dispatch contract as [`EventBus`], without name selection: every
/// listener sees every entry.
#[derive(Default)]
pub struct LogBus {
    registry: Mutex<LogRegistry>,
    dispatch: Mutex<()>,
}

impl LogBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for every emitted entry.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionHandle
    where
        F: Fn(&LogEntry) -> Result<()> + Send + Sync + 'static,
    {
        let mut registry = self.lock_registry();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.listeners.push(LogRegistration {
            id,
            listener: Arc::new(listener),
        });
        SubscriptionHandle { id }
    }

    /// Remove the registration behind `handle`.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) {
        let mut registry = self.lock_registry();
        registry.listeners.retain(|reg| reg.id != handle.id);
    }

    /// Emit an entry to every listener, in registration order.
    ///
    /// Returns the number of listeners invoked.
    pub fn emit(&self, entry: LogEntry) -> usize {
        let _dispatch = self
            .dispatch
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let listeners: Vec<LogListener> = {
            let registry = self.lock_registry();
            registry
                .listeners
                .iter()
                .map(|reg| Arc::clone(&reg.listener))
                .collect()
        };

        for listener in &listeners {
            if let Err(e) = listener(&entry) {
                warn!(key = %entry.key, error = %e, "log listener failed");
            }
        }
        listeners.len()
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.lock_registry().listeners.len()
    }

    fn lock_registry(&self) -> MutexGuard<'_, LogRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
