//! Name-keyed routing of platform input to windows.
//!
//! Platform callbacks only know the name a window was registered under, so a
//! process-wide table maps that name to the window's [`EventSink`]. Each
//! window additionally owns an [`EventRoutes`] table of user handlers keyed by
//! key character or event kind; events without a handler leave the window's
//! event state untouched.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use once_cell::sync::Lazy;

use super::input::{EventKind, InputEvent};
use crate::error::{EaselError, Result};

/// Receiver side of the routing table, implemented by windows
pub trait EventSink: Send + Sync {
    /// Update the input snapshot and run any registered handlers
    fn dispatch(&self, event: &InputEvent);

    /// The platform closed the window (e.g. the user clicked close)
    fn platform_closed(&self);
}

static WINDOWS: Lazy<DashMap<String, Arc<dyn EventSink>>> = Lazy::new(DashMap::new);
static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// Fresh `easel-<n>` name, unique within the process
pub fn next_name() -> String {
    loop {
        let name = format!("easel-{}", NEXT_ID.fetch_add(1, Ordering::Relaxed));
        if !WINDOWS.contains_key(&name) {
            return name;
        }
    }
}

/// Register `sink` under `name`; fails if the name is taken
pub fn register(name: &str, sink: Arc<dyn EventSink>) -> Result<()> {
    match WINDOWS.entry(name.to_string()) {
        Entry::Occupied(_) => Err(EaselError::NameTaken(name.to_string())),
        Entry::Vacant(slot) => {
            slot.insert(sink);
            Ok(())
        }
    }
}

/// Remove the entry for `name` only if it still belongs to `owner`.
///
/// `owner` is the address of the registered sink, so a closed window cannot
/// evict a newer window that reused its name.
pub(crate) fn unregister_owned(name: &str, owner: *const ()) -> bool {
    WINDOWS
        .remove_if(name, |_, sink| Arc::as_ptr(sink) as *const () == owner)
        .is_some()
}

pub fn is_registered(name: &str) -> bool {
    WINDOWS.contains_key(name)
}

pub fn registered_names() -> Vec<String> {
    WINDOWS.iter().map(|entry| entry.key().clone()).collect()
}

/// Sink registered under `name`, cloned out so no table lock is held while
/// it runs
pub fn lookup(name: &str) -> Option<Arc<dyn EventSink>> {
    WINDOWS.get(name).map(|entry| Arc::clone(entry.value()))
}

/// Deliver `event` to the window registered as `name`.
/// Returns `false` when no such window exists.
pub fn dispatch(name: &str, event: &InputEvent) -> bool {
    match lookup(name) {
        Some(sink) => {
            sink.dispatch(event);
            true
        }
        None => false,
    }
}

/// Forward a platform close to the window registered as `name`
pub fn close(name: &str) -> bool {
    match lookup(name) {
        Some(sink) => {
            sink.platform_closed();
            true
        }
        None => false,
    }
}

/// Dispatch key for user event handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// Key press producing this character
    Char(char),
    /// Any event of this kind
    Event(EventKind),
}

impl Route {
    /// Routes an event triggers, in dispatch order
    pub fn for_event(event: &InputEvent) -> impl Iterator<Item = Route> {
        let by_char = match event {
            InputEvent::KeyPressed(key) => key.ch.map(Route::Char),
            _ => None,
        };
        by_char
            .into_iter()
            .chain(std::iter::once(Route::Event(event.kind())))
    }
}

/// Handler producing the next event state from an event and the current one
pub type EventHandler<S> = Arc<dyn Fn(&InputEvent, &S) -> S + Send + Sync>;

/// Per-window handler table. Missing routes are no-ops.
pub struct EventRoutes<S> {
    handlers: DashMap<Route, EventHandler<S>>,
}

impl<S> Default for EventRoutes<S> {
    fn default() -> Self {
        Self {
            handlers: DashMap::new(),
        }
    }
}

impl<S> EventRoutes<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, route: Route, handler: EventHandler<S>) {
        self.handlers.insert(route, handler);
    }

    pub fn remove(&self, route: Route) -> bool {
        self.handlers.remove(&route).is_some()
    }

    pub fn contains(&self, route: Route) -> bool {
        self.handlers.contains_key(&route)
    }

    fn handler(&self, route: Route) -> Option<EventHandler<S>> {
        self.handlers.get(&route).map(|h| Arc::clone(h.value()))
    }

    /// Run every handler the event routes to, threading `state` through them
    pub fn apply(&self, event: &InputEvent, state: &mut S) {
        for route in Route::for_event(event) {
            if let Some(handler) = self.handler(route) {
                *state = handler(event, state);
            }
        }
    }
}
