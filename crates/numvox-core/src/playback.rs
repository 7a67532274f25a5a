//! Playback engine: state machine and sequencing loop
//!
//! Turns the currently selected grid cells into a timed, interruptible,
//! repeatable audio rendering. Commands arrive as bus events; progress
//! leaves as bus events; renderers are never called directly.
//!
//! Every spawned sequencing loop carries a generation token and re-checks
//! it (together with the application state) after each suspension point, so
//! a stale loop can never mutate the cursor once it stops being the live
//! one. At most one loop is logically live at a time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use numvox_foundation::AppState;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::events::{Command, Event, EventBus, EventKind, Subscription};
use crate::settings::SettingsStore;
use crate::speaker::{SpeakOptions, Speaker};

/// One pending value to be spoken, paired with its originating grid cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    pub value: String,
    pub cell: usize,
}

impl QueueItem {
    pub fn new(value: impl Into<String>, cell: usize) -> Self {
        Self {
            value: value.into(),
            cell,
        }
    }
}

/// Where play queues come from: the currently selected cells of whatever
/// renders the grid. The engine rebuilds the queue from this exactly once
/// per `start`.
pub trait QueueSource: Send + Sync {
    fn selected_items(&self) -> Vec<QueueItem>;
}

struct Session {
    queue: Vec<QueueItem>,
    cursor: usize,
    repeats_remaining: u32,
}

enum Step {
    Finish,
    Wrapped { remaining: u32 },
    Blank,
    Speak { item: QueueItem, index: usize },
}

pub struct PlaybackEngine {
    bus: Arc<EventBus>,
    settings: Arc<SettingsStore>,
    speaker: Arc<Speaker>,
    source: Arc<dyn QueueSource>,
    session: Mutex<Session>,
    generation: AtomicU64,
}

impl PlaybackEngine {
    pub fn new(
        bus: Arc<EventBus>,
        settings: Arc<SettingsStore>,
        speaker: Arc<Speaker>,
        source: Arc<dyn QueueSource>,
    ) -> Arc<Self> {
        Arc::new(Self {
            bus,
            settings,
            speaker,
            source,
            session: Mutex::new(Session {
                queue: Vec::new(),
                cursor: 0,
                repeats_remaining: 1,
            }),
            generation: AtomicU64::new(0),
        })
    }

    /// Subscribe the engine to command events. The returned subscription
    /// keeps the engine attached for as long as the caller holds it.
    pub fn attach(self: &Arc<Self>) -> Subscription {
        let engine = Arc::clone(self);
        self.bus.subscribe(EventKind::Command, move |event| {
            if let Event::Command(command) = event {
                engine.handle(*command);
            }
        })
    }

    /// Route one command through the state machine.
    pub fn handle(self: &Arc<Self>, command: Command) {
        match command {
            Command::Start => self.start(),
            Command::Pause => self.pause(),
            Command::Resume => self.resume(),
            Command::Stop => self.stop(),
            Command::Toggle => match self.settings.app_state() {
                AppState::Playing => self.pause(),
                AppState::Paused => self.resume(),
                AppState::Ready => self.start(),
            },
        }
    }

    /// Current cursor position (for observers and tests).
    pub fn cursor(&self) -> usize {
        self.session.lock().cursor
    }

    pub fn repeats_remaining(&self) -> u32 {
        self.session.lock().repeats_remaining
    }

    fn start(self: &Arc<Self>) {
        if self.settings.app_state() != AppState::Ready {
            debug!("start ignored outside ready state");
            return;
        }
        let repeats = self.settings.settings().effective_repeats();
        let queue = self.source.selected_items();
        info!(items = queue.len(), repeats, "starting playback session");
        {
            let mut session = self.session.lock();
            session.queue = queue;
            session.cursor = 0;
            session.repeats_remaining = repeats;
        }
        self.settings.set_app_state(AppState::Playing);
        self.bus
            .publish(Event::RepeatsRemaining { remaining: repeats });
        self.spawn_loop();
    }

    fn pause(&self) {
        if self.settings.app_state() != AppState::Playing {
            debug!("pause ignored outside playing state");
            return;
        }
        // Flip state first so the interrupted loop fails its liveness check
        // as soon as the render resolves, then cut the render off. Cursor
        // and queue are preserved untouched.
        self.settings.set_app_state(AppState::Paused);
        self.speaker.cancel();
        self.bus.publish(Event::OverlayHidden);
    }

    fn resume(self: &Arc<Self>) {
        if self.settings.app_state() != AppState::Paused {
            debug!("resume ignored outside paused state");
            return;
        }
        self.settings.set_app_state(AppState::Playing);
        self.spawn_loop();
    }

    fn stop(&self) {
        if self.settings.app_state() == AppState::Ready {
            debug!("stop ignored in ready state");
            return;
        }
        let repeats = self.settings.settings().effective_repeats();
        {
            let mut session = self.session.lock();
            // Fence out any loop still unwinding before the reset lands;
            // loops check the generation under this same lock.
            self.generation.fetch_add(1, Ordering::SeqCst);
            session.queue.clear();
            session.cursor = 0;
            session.repeats_remaining = repeats;
        }
        self.speaker.cancel();
        self.settings.set_app_state(AppState::Ready);
        self.bus
            .publish(Event::RepeatsRemaining { remaining: repeats });
        self.bus.publish(Event::OverlayHidden);
    }

    fn spawn_loop(self: &Arc<Self>) -> JoinHandle<()> {
        let token = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let engine = Arc::clone(self);
        tokio::spawn(async move { engine.run_loop(token).await })
    }

    /// Is this loop instance still the one allowed to make progress?
    fn is_live(&self, token: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == token
            && self.settings.app_state() == AppState::Playing
    }

    async fn run_loop(self: Arc<Self>, token: u64) {
        debug!(token, "sequencing loop entered");
        loop {
            let step = {
                let mut session = self.session.lock();
                if !self.is_live(token) {
                    debug!(token, "sequencing loop superseded, exiting");
                    return;
                }
                if session.queue.is_empty() {
                    Step::Finish
                } else if session.cursor >= session.queue.len() {
                    if session.repeats_remaining > 1 {
                        session.repeats_remaining -= 1;
                        session.cursor = 0;
                        Step::Wrapped {
                            remaining: session.repeats_remaining,
                        }
                    } else {
                        Step::Finish
                    }
                } else {
                    let index = session.cursor;
                    let item = session.queue[index].clone();
                    if item.value.trim().is_empty() {
                        // Skipped, but still consumes a delay slot below
                        session.cursor += 1;
                        Step::Blank
                    } else {
                        Step::Speak { item, index }
                    }
                }
            };

            let settings = self.settings.settings();
            let delay = Duration::from_millis(settings.delay_ms);

            match step {
                Step::Finish => {
                    self.finish(token);
                    return;
                }
                Step::Wrapped { remaining } => {
                    self.bus.publish(Event::RepeatsRemaining { remaining });
                }
                Step::Blank => {
                    tokio::time::sleep(delay).await;
                }
                Step::Speak { item, index } => {
                    self.bus.publish(Event::CellHighlighted { cell: item.cell });
                    self.bus.publish(Event::CursorMoved { index });
                    if settings.fullscreen_overlay {
                        self.bus.publish(Event::OverlayShown {
                            value: item.value.clone(),
                        });
                    }

                    // Cancelled and failed renders count as completed for
                    // sequencing; the liveness check is the sole guard
                    // against acting on a stale playing assumption.
                    let _ = self.speaker.speak(&item.value, SpeakOptions::default()).await;

                    {
                        let mut session = self.session.lock();
                        if !self.is_live(token) {
                            debug!(token, "loop no longer live after render");
                            return;
                        }
                        session.cursor += 1;
                    }
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    fn finish(&self, token: u64) {
        let repeats = self.settings.settings().effective_repeats();
        {
            let mut session = self.session.lock();
            if !self.is_live(token) {
                return;
            }
            session.queue.clear();
            session.cursor = 0;
            session.repeats_remaining = repeats;
        }
        info!("playback sequence finished");
        self.bus.publish(Event::SequenceFinished);
        self.settings.set_app_state(AppState::Ready);
        self.bus
            .publish(Event::RepeatsRemaining { remaining: repeats });
        self.bus.publish(Event::OverlayHidden);
    }
}
