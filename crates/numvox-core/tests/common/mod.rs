//! Shared test support: a scripted in-memory TTS engine, a fixed queue
//! source, and a full wiring of the core components.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use numvox_core::{
    CatalogConfig, Event, EventBus, EventKind, MemoryStore, PlaybackEngine, QueueItem,
    QueueSource, Settings, SettingsStore, Speaker, Subscription, VoiceCatalog,
};
use numvox_tts::{SpeechOutcome, SpeechRequest, TtsEngine, TtsResult, VoiceDescriptor};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, mpsc, Notify};

/// In-memory engine with scriptable voices and an optional gate that holds
/// renders open until the test releases or cancels them.
pub struct ScriptedEngine {
    voices: RwLock<Vec<VoiceDescriptor>>,
    spoken: Mutex<Vec<String>>,
    requests: Mutex<Vec<SpeechRequest>>,
    started_tx: mpsc::UnboundedSender<String>,
    gated: AtomicBool,
    release: Notify,
    voices_tx: broadcast::Sender<()>,
    /// When set, the first priming request populates `prime_voices`
    prime_voices: Mutex<Vec<VoiceDescriptor>>,
}

impl ScriptedEngine {
    pub fn new(voices: Vec<VoiceDescriptor>) -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
        let (started_tx, started_rx) = mpsc::unbounded_channel();
        let (voices_tx, _) = broadcast::channel(8);
        let engine = Arc::new(Self {
            voices: RwLock::new(voices),
            spoken: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
            started_tx,
            gated: AtomicBool::new(false),
            release: Notify::new(),
            voices_tx,
            prime_voices: Mutex::new(Vec::new()),
        });
        (engine, started_rx)
    }

    pub fn set_gated(&self, gated: bool) {
        self.gated.store(gated, Ordering::SeqCst);
    }

    pub fn release_one(&self) {
        self.release.notify_one();
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().clone()
    }

    pub fn requests(&self) -> Vec<SpeechRequest> {
        self.requests.lock().clone()
    }

    pub fn set_voices(&self, voices: Vec<VoiceDescriptor>) {
        *self.voices.write() = voices;
    }

    pub fn voices_on_prime(&self, voices: Vec<VoiceDescriptor>) {
        *self.prime_voices.lock() = voices;
    }

    pub fn trigger_voices_changed(&self) {
        let _ = self.voices_tx.send(());
    }
}

#[async_trait]
impl TtsEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn voices(&self) -> TtsResult<Vec<VoiceDescriptor>> {
        Ok(self.voices.read().clone())
    }

    async fn speak(&self, request: SpeechRequest) -> TtsResult<SpeechOutcome> {
        if request.is_priming() {
            let primed = std::mem::take(&mut *self.prime_voices.lock());
            if !primed.is_empty() {
                self.set_voices(primed);
            }
            return Ok(SpeechOutcome::Completed);
        }

        let text = request.text.clone();
        self.spoken.lock().push(text.clone());
        self.requests.lock().push(request);
        let _ = self.started_tx.send(text);

        if self.gated.load(Ordering::SeqCst) {
            self.release.notified().await;
        }
        Ok(SpeechOutcome::Completed)
    }

    async fn cancel(&self) -> TtsResult<()> {
        Ok(())
    }

    fn voices_changed(&self) -> broadcast::Receiver<()> {
        self.voices_tx.subscribe()
    }
}

/// Queue source backed by a fixed cell list.
pub struct FixedSource {
    items: Vec<QueueItem>,
}

impl FixedSource {
    pub fn new(values: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            items: values
                .iter()
                .enumerate()
                .map(|(cell, value)| QueueItem::new(*value, cell))
                .collect(),
        })
    }
}

impl QueueSource for FixedSource {
    fn selected_items(&self) -> Vec<QueueItem> {
        self.items.clone()
    }
}

/// Fully wired core, talking to a scripted engine over a real bus.
pub struct Rig {
    pub bus: Arc<EventBus>,
    pub store: Arc<SettingsStore>,
    pub engine: Arc<ScriptedEngine>,
    pub catalog: Arc<VoiceCatalog>,
    pub playback: Arc<PlaybackEngine>,
    pub started_rx: mpsc::UnboundedReceiver<String>,
    _attach: Subscription,
}

pub fn default_voices() -> Vec<VoiceDescriptor> {
    vec![
        VoiceDescriptor::new("Google US English", "en-US"),
        VoiceDescriptor::new("Google Nederlands", "nl-NL"),
    ]
}

pub async fn rig(settings: Settings, values: &[&str]) -> Rig {
    rig_with_voices(settings, values, default_voices()).await
}

pub async fn rig_with_voices(
    settings: Settings,
    values: &[&str],
    voices: Vec<VoiceDescriptor>,
) -> Rig {
    let bus = Arc::new(EventBus::new());
    let kv = Arc::new(MemoryStore::new());
    let store = Arc::new(SettingsStore::new(Arc::clone(&bus), kv, settings));
    let (engine, started_rx) = ScriptedEngine::new(voices);
    let catalog = Arc::new(VoiceCatalog::new(
        Arc::clone(&bus),
        engine.clone(),
        CatalogConfig::default(),
    ));
    catalog.refresh().await;
    let speaker = Arc::new(Speaker::new(
        Arc::clone(&bus),
        engine.clone(),
        Arc::clone(&catalog),
        Arc::clone(&store),
        None,
    ));
    let source = FixedSource::new(values);
    let playback = PlaybackEngine::new(
        Arc::clone(&bus),
        Arc::clone(&store),
        speaker,
        source,
    );
    let attach = playback.attach();
    Rig {
        bus,
        store,
        engine,
        catalog,
        playback,
        started_rx,
        _attach: attach,
    }
}

const ALL_KINDS: &[EventKind] = &[
    EventKind::Command,
    EventKind::StateChanged,
    EventKind::SettingsChanged,
    EventKind::VoicesChanged,
    EventKind::SpeechStarted,
    EventKind::SpeechEnded,
    EventKind::CellHighlighted,
    EventKind::OverlayShown,
    EventKind::OverlayHidden,
    EventKind::CursorMoved,
    EventKind::RepeatsRemaining,
    EventKind::SequenceFinished,
    EventKind::VisibilityChanged,
];

/// Mirror every bus event into a channel for assertion.
pub fn record_all(bus: &Arc<EventBus>) -> (mpsc::UnboundedReceiver<Event>, Vec<Subscription>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let subs = ALL_KINDS
        .iter()
        .map(|kind| {
            let tx = tx.clone();
            bus.subscribe(*kind, move |event| {
                let _ = tx.send(event.clone());
            })
        })
        .collect();
    (rx, subs)
}

/// Drain recorded events until one of the given kind arrives (inclusive).
pub async fn wait_for(
    rx: &mut mpsc::UnboundedReceiver<Event>,
    kind: EventKind,
) -> Vec<Event> {
    let mut seen = Vec::new();
    let deadline = tokio::time::timeout(Duration::from_secs(60), async {
        while let Some(event) = rx.recv().await {
            let found = event.kind() == kind;
            seen.push(event);
            if found {
                break;
            }
        }
    });
    deadline.await.expect("event did not arrive in time");
    seen
}
