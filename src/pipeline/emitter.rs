//! Observer registry
//!
//! Each stage and each pipeline owns one `EventEmitter`. Listeners are keyed by
//! [`EventKind`] and invoked synchronously, in registration order, inside the
//! emitting call. There is no global bus: bubbling from a stage to its
//! pipeline is an explicit listener that re-emits on the pipeline's registry.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::types::{Event, EventKind};

/// Callback invoked for each matching event.
pub type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

#[derive(Default)]
pub struct EventEmitter {
    listeners: RwLock<HashMap<EventKind, Vec<Listener>>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for one event kind.
    pub fn on<F>(&self, kind: EventKind, listener: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(kind)
            .or_default()
            .push(Arc::new(listener));
    }

    /// Deliver `event` to every listener of its kind. Returns how many ran.
    ///
    /// The listener list is snapshotted first, so a listener registering
    /// another listener does not deadlock; the new one sees the next event.
    pub fn emit(&self, event: &Event) -> usize {
        let listeners: Vec<Listener> = {
            let map = self
                .listeners
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            match map.get(&event.kind()) {
                Some(list) => list.clone(),
                None => return 0,
            }
        };

        for listener in &listeners {
            listener(event);
        }
        listeners.len()
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .map_or(0, Vec::len)
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let map = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let counts: HashMap<&EventKind, usize> = map.iter().map(|(k, v)| (k, v.len())).collect();
        f.debug_struct("EventEmitter")
            .field("listeners", &counts)
            .finish()
    }
}
