//! Assembly of the numvox runtime
//!
//! Builds the bus, settings store, voice catalog, speaker, playback engine
//! and wake lock, loads persisted settings, and warms the voice catalog.

use std::path::PathBuf;
use std::sync::Arc;

use numvox_core::{
    CatalogConfig, EventBus, JsonFileStore, PlaybackEngine, Settings, SettingsStore, Speaker,
    Subscription, VoiceCatalog, WakeLock,
};
use numvox_tts::TtsEngine;
use numvox_tts_espeak::EspeakEngine;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::grid::NumberGrid;
use crate::inhibit::InhibitBackend;

#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    /// Backing file for the persistent key-value settings store
    pub settings_path: PathBuf,
    /// Optional JSON defaults file merged over the built-in defaults
    pub defaults_path: Option<PathBuf>,
    /// Ambient system language, a late voice-selection fallback
    pub system_language: Option<String>,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            settings_path: PathBuf::from("numvox-settings.json"),
            defaults_path: None,
            system_language: std::env::var("LANG")
                .ok()
                .map(|lang| lang.split('.').next().unwrap_or("").to_string())
                .filter(|lang| !lang.is_empty()),
        }
    }
}

/// Handle to the assembled application.
pub struct AppRuntime {
    pub bus: Arc<EventBus>,
    pub store: Arc<SettingsStore>,
    pub catalog: Arc<VoiceCatalog>,
    pub grid: Arc<NumberGrid>,
    pub playback: Arc<PlaybackEngine>,
    wake_lock: WakeLock,
    watcher: JoinHandle<()>,
    _attach: Subscription,
}

impl AppRuntime {
    pub async fn start(options: RuntimeOptions) -> Self {
        let bus = Arc::new(EventBus::new());

        let defaults = match &options.defaults_path {
            Some(path) => Settings::load_defaults_file(path),
            None => Settings::default(),
        };
        let kv = Arc::new(JsonFileStore::new(&options.settings_path));
        let store = Arc::new(SettingsStore::new(Arc::clone(&bus), kv, defaults));
        store.load_persisted();

        let engine: Arc<dyn TtsEngine> = Arc::new(EspeakEngine::new());
        if !engine.is_available().await {
            // Not fatal: playback degrades to silence, everything else works
            warn!("espeak not found; speech will be unavailable");
        }

        let catalog = Arc::new(VoiceCatalog::new(
            Arc::clone(&bus),
            Arc::clone(&engine),
            CatalogConfig::default(),
        ));
        catalog.ensure_loaded().await;
        let watcher = catalog.spawn_watcher();

        let speaker = Arc::new(Speaker::new(
            Arc::clone(&bus),
            engine,
            Arc::clone(&catalog),
            Arc::clone(&store),
            options.system_language.clone(),
        ));

        let grid = NumberGrid::new(Arc::clone(&store));
        grid.fill_random();

        let playback = PlaybackEngine::new(
            Arc::clone(&bus),
            Arc::clone(&store),
            speaker,
            Arc::clone(&grid) as Arc<dyn numvox_core::QueueSource>,
        );
        let attach = playback.attach();

        let wake_lock = WakeLock::spawn(&bus, InhibitBackend::new());

        info!("numvox runtime assembled");
        Self {
            bus,
            store,
            catalog,
            grid,
            playback,
            wake_lock,
            watcher,
            _attach: attach,
        }
    }

    pub fn shutdown(self) {
        info!("shutting down numvox runtime");
        self.watcher.abort();
        self.wake_lock.shutdown();
    }
}
