//! In-process publish/subscribe event bus
//!
//! All components communicate exclusively through events, never through
//! direct calls on each other. Publication is a pure synchronous fan-out:
//! no queueing, no deferral, and a panicking handler never stops its
//! siblings or the publisher.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use numvox_foundation::AppState;
use numvox_tts::VoiceDescriptor;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::settings::Settings;

/// User-initiated playback commands, the engine's inbound surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Pause,
    Resume,
    Stop,
    /// Routes to pause/resume/start depending on current state; the single
    /// control behind the primary user-facing button.
    Toggle,
}

/// Immutable catalog-changed payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct VoiceSnapshot {
    pub voices: Vec<VoiceDescriptor>,
    /// Deduplicated, uppercased, sorted base language codes plus "ALL"
    pub languages: Vec<String>,
}

/// Closed event enumeration: one case per event, each with its own typed
/// payload.
#[derive(Debug, Clone)]
pub enum Event {
    Command(Command),
    StateChanged(AppState),
    SettingsChanged(Settings),
    VoicesChanged(VoiceSnapshot),
    SpeechStarted { text: String },
    SpeechEnded,
    CellHighlighted { cell: usize },
    OverlayShown { value: String },
    OverlayHidden,
    CursorMoved { index: usize },
    RepeatsRemaining { remaining: u32 },
    SequenceFinished,
    VisibilityChanged { visible: bool },
}

/// Payload-free discriminant, used as the subscription key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Command,
    StateChanged,
    SettingsChanged,
    VoicesChanged,
    SpeechStarted,
    SpeechEnded,
    CellHighlighted,
    OverlayShown,
    OverlayHidden,
    CursorMoved,
    RepeatsRemaining,
    SequenceFinished,
    VisibilityChanged,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Command(_) => EventKind::Command,
            Event::StateChanged(_) => EventKind::StateChanged,
            Event::SettingsChanged(_) => EventKind::SettingsChanged,
            Event::VoicesChanged(_) => EventKind::VoicesChanged,
            Event::SpeechStarted { .. } => EventKind::SpeechStarted,
            Event::SpeechEnded => EventKind::SpeechEnded,
            Event::CellHighlighted { .. } => EventKind::CellHighlighted,
            Event::OverlayShown { .. } => EventKind::OverlayShown,
            Event::OverlayHidden => EventKind::OverlayHidden,
            Event::CursorMoved { .. } => EventKind::CursorMoved,
            Event::RepeatsRemaining { .. } => EventKind::RepeatsRemaining,
            Event::SequenceFinished => EventKind::SequenceFinished,
            Event::VisibilityChanged { .. } => EventKind::VisibilityChanged,
        }
    }
}

type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

/// Handle for removing a subscription. Dropping it leaves the handler
/// installed; call [`Subscription::unsubscribe`] to remove it.
pub struct Subscription {
    handlers: Arc<RwLock<HashMap<EventKind, Vec<(u64, Handler)>>>>,
    kind: EventKind,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(self) {
        let mut handlers = self.handlers.write();
        if let Some(list) = handlers.get_mut(&self.kind) {
            list.retain(|(id, _)| *id != self.id);
        }
    }
}

#[derive(Default)]
pub struct EventBus {
    handlers: Arc<RwLock<HashMap<EventKind, Vec<(u64, Handler)>>>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one event kind. Multiple handlers per kind
    /// are supported; handlers must not rely on invocation order.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.handlers
            .write()
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));
        Subscription {
            handlers: Arc::clone(&self.handlers),
            kind,
            id,
        }
    }

    /// Invoke all current subscribers synchronously, each in isolation.
    ///
    /// The handler list is snapshotted before invocation so handlers may
    /// publish or subscribe re-entrantly without deadlocking.
    pub fn publish(&self, event: Event) {
        let snapshot: Vec<Handler> = {
            let handlers = self.handlers.read();
            handlers
                .get(&event.kind())
                .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
                .unwrap_or_default()
        };

        for handler in snapshot {
            if catch_unwind(AssertUnwindSafe(|| handler(&event))).is_err() {
                warn!(kind = ?event.kind(), "event handler panicked");
            }
        }
    }
}
