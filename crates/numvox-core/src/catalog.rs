//! Voice catalog: engine voices republished as immutable snapshots
//!
//! Collects the engine's voice list, derives the set of available base
//! language codes, and publishes both whenever the engine reports a change.
//! First-load warm-up is handled with a bounded priming policy: some
//! engines only populate their list after being poked with a zero-length
//! utterance.

use std::sync::Arc;
use std::time::Duration;

use numvox_tts::{SpeechRequest, TtsEngine, VoiceDescriptor};
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::events::{Event, EventBus, VoiceSnapshot};

/// Warm-up retry policy. Bounded and explicit rather than a magic
/// retry-until-available loop.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Priming attempts when the first refresh comes back empty
    pub prime_attempts: u32,
    /// Fixed delay between a priming utterance and the re-refresh
    pub prime_delay: Duration,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            prime_attempts: 2,
            prime_delay: Duration::from_millis(250),
        }
    }
}

pub struct VoiceCatalog {
    bus: Arc<EventBus>,
    engine: Arc<dyn TtsEngine>,
    config: CatalogConfig,
    snapshot: RwLock<VoiceSnapshot>,
}

impl VoiceCatalog {
    pub fn new(bus: Arc<EventBus>, engine: Arc<dyn TtsEngine>, config: CatalogConfig) -> Self {
        Self {
            bus,
            engine,
            config,
            snapshot: RwLock::new(VoiceSnapshot::default()),
        }
    }

    /// Current snapshot (voices plus derived language list).
    pub fn snapshot(&self) -> VoiceSnapshot {
        self.snapshot.read().clone()
    }

    pub fn voices(&self) -> Vec<VoiceDescriptor> {
        self.snapshot.read().voices.clone()
    }

    /// Re-read the engine's voice list and publish the new snapshot.
    ///
    /// An engine error degrades to an empty list; catalog unavailability is
    /// never fatal, downstream falls back to the engine default voice.
    pub async fn refresh(&self) {
        let voices = match self.engine.voices().await {
            Ok(voices) => voices,
            Err(e) => {
                warn!("Voice enumeration failed, catalog stays empty: {}", e);
                Vec::new()
            }
        };
        let languages = derive_languages(&voices);
        let snapshot = VoiceSnapshot { voices, languages };
        debug!(
            voices = snapshot.voices.len(),
            languages = snapshot.languages.len(),
            "voice catalog refreshed"
        );
        *self.snapshot.write() = snapshot.clone();
        self.bus.publish(Event::VoicesChanged(snapshot));
    }

    /// Refresh, priming the engine a bounded number of times if the list is
    /// still empty (common on first load before async engine warm-up).
    pub async fn ensure_loaded(&self) {
        self.refresh().await;
        let mut attempts = self.config.prime_attempts;
        while self.snapshot.read().voices.is_empty() && attempts > 0 {
            attempts -= 1;
            debug!(attempts_left = attempts, "priming speech engine for voices");
            if let Err(e) = self.engine.speak(SpeechRequest::priming()).await {
                warn!("Priming utterance failed: {}", e);
            }
            tokio::time::sleep(self.config.prime_delay).await;
            self.refresh().await;
        }
    }

    /// Follow the engine's voices-changed notifications, refreshing the
    /// snapshot per signal. Ends when the engine drops its notifier.
    pub fn spawn_watcher(self: &Arc<Self>) -> JoinHandle<()> {
        let catalog = Arc::clone(self);
        let mut rx = self.engine.voices_changed();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(()) => catalog.refresh().await,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {
                        catalog.refresh().await;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

/// Deduplicated, uppercased, sorted base language codes, with a synthetic
/// "ALL" entry for the unfiltered voice list.
fn derive_languages(voices: &[VoiceDescriptor]) -> Vec<String> {
    let mut languages: Vec<String> = voices
        .iter()
        .map(|v| v.base_lang().to_uppercase())
        .filter(|l| !l.is_empty())
        .collect();
    languages.sort();
    languages.dedup();
    if !languages.iter().any(|l| l == "ALL") {
        languages.push("ALL".to_string());
    }
    languages
}
