//! Event sources and listener subscriptions.
//!
//! The system under test is reached through an [`EventSource`]: anything
//! that accepts a listener and hands back a [`Subscription`]. [`EventHub`]
//! is the in-process implementation used by drivers and tests; listeners are
//! kept in a set keyed by `Rc` identity, so one callback is registered at
//! most once.

use crate::event::{self, Details};
use crate::result::{ExpectError, ExpectResult};
use serde_json::Value;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::warn;

/// Callback receiving `(event_name, details)`
pub type Listener = Rc<RefCell<dyn FnMut(&str, &Details)>>;

/// Wrap a closure as a [`Listener`]
pub fn listener<F>(callback: F) -> Listener
where
    F: FnMut(&str, &Details) + 'static,
{
    Rc::new(RefCell::new(callback))
}

/// Anything that delivers events to registered listeners
pub trait EventSource {
    /// Register `listener`; it stays registered until the returned
    /// subscription is released or dropped.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::DuplicateListener`] if `listener` is already
    /// registered.
    fn add_listener(&self, listener: Listener) -> ExpectResult<Subscription>;
}

// =============================================================================
// SUBSCRIPTION
// =============================================================================

/// Scoped registration; releases the listener on [`Self::unsubscribe`] or drop
pub struct Subscription {
    release: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Create a subscription that runs `release` exactly once
    #[must_use]
    pub fn new(release: impl FnOnce() + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Release the listener now
    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    /// Whether the listener is still registered through this handle
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.release.is_some()
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

// =============================================================================
// EVENT HUB
// =============================================================================

#[derive(Default)]
struct HubState {
    listeners: Vec<Listener>,
    dispatched: u64,
}

/// In-process event source with explicit listener management
#[derive(Clone, Default)]
pub struct EventHub {
    state: Rc<RefCell<HubState>>,
}

impl fmt::Debug for EventHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("EventHub")
            .field("listeners", &state.listeners.len())
            .field("dispatched", &state.dispatched)
            .finish()
    }
}

impl EventHub {
    /// Create an empty hub
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::DuplicateListener`] if already registered.
    pub fn add(&self, listener: Listener) -> ExpectResult<()> {
        if self.has_listener(&listener) {
            return Err(ExpectError::DuplicateListener);
        }
        self.state.borrow_mut().listeners.push(listener);
        Ok(())
    }

    /// Unregister a listener.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::UnknownListener`] if it is not registered.
    pub fn remove(&self, listener: &Listener) -> ExpectResult<()> {
        remove_from(&self.state, listener)
    }

    /// Whether `listener` is registered
    #[must_use]
    pub fn has_listener(&self, listener: &Listener) -> bool {
        self.state
            .borrow()
            .listeners
            .iter()
            .any(|l| Rc::ptr_eq(l, listener))
    }

    /// Number of registered listeners
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.state.borrow().listeners.len()
    }

    /// Number of events dispatched so far
    #[must_use]
    pub fn dispatched(&self) -> u64 {
        self.state.borrow().dispatched
    }

    /// Deliver an event to every registered listener; returns how many were
    /// called. Listeners removed during dispatch are skipped if not yet
    /// called.
    pub fn emit(&self, event_name: &str, details: &Details) -> usize {
        let snapshot = {
            let mut state = self.state.borrow_mut();
            state.dispatched += 1;
            state.listeners.clone()
        };
        let mut called = 0;
        for listener in &snapshot {
            if !self.has_listener(listener) {
                continue;
            }
            match listener.try_borrow_mut() {
                Ok(mut callback) => {
                    (&mut *callback)(event_name, details);
                    called += 1;
                }
                Err(_) => warn!(event = event_name, "listener re-entered during dispatch; skipped"),
            }
        }
        called
    }

    /// Deliver an event whose details are given as a JSON object.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `details` is not an object.
    pub fn emit_json(&self, event_name: &str, details: Value) -> ExpectResult<usize> {
        let details = event::details(details)?;
        Ok(self.emit(event_name, &details))
    }
}

fn remove_from(state: &RefCell<HubState>, listener: &Listener) -> ExpectResult<()> {
    let mut state = state.borrow_mut();
    let position = state
        .listeners
        .iter()
        .position(|l| Rc::ptr_eq(l, listener))
        .ok_or(ExpectError::UnknownListener)?;
    let _ = state.listeners.remove(position);
    Ok(())
}

impl EventSource for EventHub {
    fn add_listener(&self, listener: Listener) -> ExpectResult<Subscription> {
        self.add(Rc::clone(&listener))?;
        let state: Weak<RefCell<HubState>> = Rc::downgrade(&self.state);
        Ok(Subscription::new(move || {
            if let Some(state) = state.upgrade() {
                // Already removed through `EventHub::remove` is fine.
                let _ = remove_from(&state, &listener);
            }
        }))
    }
}
