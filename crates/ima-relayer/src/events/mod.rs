// Named-event dispatch shared by relayer components
//
// A dispatcher keeps an ordered list of `(event type, listener)` registrations
// and invokes the matching ones synchronously when an event is dispatched.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tracing::warn;

/// Event fired once when a dispatcher is disposed
pub const DISPOSE_EVENT: &str = "dispose";

static NEXT_DISPATCHER_ID: AtomicU64 = AtomicU64::new(1);

/// Listener callable. The first argument is the dispatcher that invoked it.
///
/// Registration identity is the `Arc` allocation: registering the same `Arc`
/// twice for one event type is a no-op, a fresh closure is a new listener.
pub type Listener =
    Arc<dyn Fn(&EventDispatcher, &DispatchedEvent) -> anyhow::Result<()> + Send + Sync>;

/// Wrap a closure into a shareable [`Listener`]
pub fn listener<F>(f: F) -> Listener
where
    F: Fn(&EventDispatcher, &DispatchedEvent) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Handle for a single registration, usable for removal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Event envelope: a type name plus an opaque payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchedEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub detail: Value,
}

impl DispatchedEvent {
    pub fn new(event_type: impl Into<String>, detail: Value) -> Self {
        Self {
            event_type: event_type.into(),
            detail,
        }
    }

    /// Event with a `null` detail
    pub fn bare(event_type: impl Into<String>) -> Self {
        Self::new(event_type, Value::Null)
    }
}

/// A listener returned an error while an event was being dispatched
#[derive(Debug, Error)]
#[error("listener for '{event_type}' event failed: {error}")]
pub struct DispatchError {
    pub event_type: String,
    pub error: anyhow::Error,
}

impl DispatchError {
    /// The error returned by the listener
    pub fn into_inner(self) -> anyhow::Error {
        self.error
    }
}

#[derive(Clone)]
struct Registration {
    id: ListenerId,
    event_type: String,
    listener: Listener,
    once: bool,
}

fn same_listener(a: &Listener, b: &Listener) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// Synchronous publish/subscribe primitive with a one-shot disposal lifecycle
pub struct EventDispatcher {
    id: u64,
    registrations: Mutex<Vec<Registration>>,
    next_listener_id: AtomicU64,
    disposing: AtomicBool,
    disposed: AtomicBool,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self {
            id: NEXT_DISPATCHER_ID.fetch_add(1, Ordering::Relaxed),
            registrations: Mutex::new(Vec::new()),
            next_listener_id: AtomicU64::new(1),
            disposing: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        }
    }

    /// Process-unique identifier, carried as `ref` in the dispose event
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_disposing(&self) -> bool {
        self.disposing.load(Ordering::SeqCst)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn registrations(&self) -> MutexGuard<'_, Vec<Registration>> {
        // A panicking listener never holds this lock, so the list is intact
        self.registrations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn register(&self, event_type: &str, listener: Listener, once: bool) -> ListenerId {
        let mut registrations = self.registrations();
        if let Some(existing) = registrations
            .iter()
            .find(|r| r.event_type == event_type && same_listener(&r.listener, &listener))
        {
            return existing.id;
        }

        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::Relaxed));
        if self.is_disposed() {
            warn!(
                "Ignoring '{}' listener registration on disposed dispatcher {}",
                event_type, self.id
            );
            return id;
        }

        registrations.push(Registration {
            id,
            event_type: event_type.to_string(),
            listener,
            once,
        });
        id
    }

    /// Register `listener` for `event_type`. Registering an identical pair
    /// again returns the existing handle.
    pub fn add_event_listener(&self, event_type: &str, listener: Listener) -> ListenerId {
        self.register(event_type, listener, false)
    }

    pub fn on(&self, event_type: &str, listener: Listener) -> ListenerId {
        self.add_event_listener(event_type, listener)
    }

    /// Register a listener that is removed right after its first invocation
    pub fn once(&self, event_type: &str, listener: Listener) -> ListenerId {
        self.register(event_type, listener, true)
    }

    /// Remove the registration of `listener` for `event_type`, or every
    /// registration for `event_type` when `listener` is `None`
    pub fn remove_event_listener(&self, event_type: &str, listener: Option<&Listener>) -> &Self {
        self.registrations().retain(|r| {
            let matches = r.event_type == event_type
                && listener.map_or(true, |l| same_listener(&r.listener, l));
            !matches
        });
        self
    }

    pub fn off(&self, event_type: &str, listener: Option<&Listener>) -> &Self {
        self.remove_event_listener(event_type, listener)
    }

    /// Remove a registration by its handle
    pub fn remove_listener(&self, id: ListenerId) -> &Self {
        self.registrations().retain(|r| r.id != id);
        self
    }

    pub fn remove_all_event_listeners(&self) -> &Self {
        self.registrations().clear();
        self
    }

    pub fn off_all(&self) -> &Self {
        self.remove_all_event_listeners()
    }

    pub fn has_event_listener(&self, event_type: &str, listener: &Listener) -> bool {
        self.registrations()
            .iter()
            .any(|r| r.event_type == event_type && same_listener(&r.listener, listener))
    }

    pub fn listener_count(&self) -> usize {
        self.registrations().len()
    }

    /// Invoke every listener registered for `event.event_type`, in
    /// registration order. The first listener error stops the pass.
    ///
    /// Listeners run against a snapshot of the registrations taken before the
    /// first call, with the lock released, so they may add or remove
    /// registrations (including their own) while the event is in flight.
    pub fn dispatch_event(&self, event: &DispatchedEvent) -> Result<(), DispatchError> {
        let matching: Vec<Registration> = self
            .registrations()
            .iter()
            .filter(|r| r.event_type == event.event_type)
            .cloned()
            .collect();

        for registration in matching {
            let outcome = (registration.listener)(self, event);
            if registration.once {
                self.remove_listener(registration.id);
            }
            outcome.map_err(|error| DispatchError {
                event_type: event.event_type.clone(),
                error,
            })?;
        }
        Ok(())
    }

    /// Fire `"dispose"` once, then drop every listener. Later calls do nothing.
    pub fn dispose(&self) -> Result<(), DispatchError> {
        self.disposing.store(true, Ordering::SeqCst);
        if self.disposed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let event = DispatchedEvent::new(DISPOSE_EVENT, json!({ "ref": self.id }));
        let outcome = self.dispatch_event(&event);
        self.remove_all_event_listeners();
        outcome
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("id", &self.id)
            .field("listeners", &self.listener_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
