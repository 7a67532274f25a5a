//! Settings model, persistence and application state ownership
//!
//! The store is the single owner of user-configurable settings and of the
//! ready/playing/paused application state. Settings mutate only through
//! explicit update calls and are persisted after every mutation; the
//! in-memory copy stays authoritative regardless of persistence success.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use numvox_foundation::{transition_allowed, AppState, StoreError};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::events::{Event, EventBus};

/// Fixed key under which the settings object is persisted.
pub const SETTINGS_KEY: &str = "numvox-settings";

/// User-configurable settings.
///
/// Every field carries a serde default so a partial or stale persisted
/// payload merges cleanly over the built-ins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// UI language code
    pub interface_language: String,
    /// Digits per generated grid value, bounds the random fill range
    pub digit_length: u32,
    /// How many leading grid cells are selected for playback
    pub count: u32,
    /// Full passes over the selected cells; 0 and 1 behave identically
    pub repeat: u32,
    /// Speech rate multiplier
    pub rate: f32,
    /// Voice pitch
    pub pitch: f32,
    /// Volume in [0, 1]
    pub volume: f32,
    /// Pause after each spoken item, in milliseconds
    pub delay_ms: u64,
    /// Voice-selection hint and voice list filter, e.g. "nl-NL"
    pub language_code: String,
    /// Preferred voice display name, best-effort
    pub voice_name: String,
    /// Whether to show the large-number overlay during playback
    pub fullscreen_overlay: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            interface_language: "en".to_string(),
            digit_length: 2,
            count: 10,
            repeat: 1,
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
            delay_ms: 1000,
            language_code: "nl-NL".to_string(),
            voice_name: "Google Nederlands".to_string(),
            fullscreen_overlay: false,
        }
    }
}

impl Settings {
    /// Effective number of passes: repeat 0 and 1 are both a single pass.
    pub fn effective_repeats(&self) -> u32 {
        self.repeat.max(1)
    }

    /// Load defaults from an optional JSON file, merged over the built-ins.
    ///
    /// A missing or malformed file is logged and the built-ins stand;
    /// configuration problems are never surfaced as failures.
    pub fn load_defaults_file(path: &std::path::Path) -> Self {
        let built_in = Settings::default();
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Defaults file {:?} unavailable, using built-ins: {}", path, e);
                return built_in;
            }
        };
        match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(value) => merge_over_defaults(&built_in, value),
            Err(e) => {
                warn!("Defaults file {:?} malformed, using built-ins: {}", path, e);
                built_in
            }
        }
    }
}

/// Partial settings update; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct SettingsPatch {
    pub interface_language: Option<String>,
    pub digit_length: Option<u32>,
    pub count: Option<u32>,
    pub repeat: Option<u32>,
    pub rate: Option<f32>,
    pub pitch: Option<f32>,
    pub volume: Option<f32>,
    pub delay_ms: Option<u64>,
    pub language_code: Option<String>,
    pub voice_name: Option<String>,
    pub fullscreen_overlay: Option<bool>,
}

impl SettingsPatch {
    fn apply(self, settings: &mut Settings) {
        if let Some(v) = self.interface_language {
            settings.interface_language = v;
        }
        if let Some(v) = self.digit_length {
            settings.digit_length = v;
        }
        if let Some(v) = self.count {
            settings.count = v;
        }
        if let Some(v) = self.repeat {
            settings.repeat = v;
        }
        if let Some(v) = self.rate {
            settings.rate = v;
        }
        if let Some(v) = self.pitch {
            settings.pitch = v;
        }
        if let Some(v) = self.volume {
            settings.volume = v;
        }
        if let Some(v) = self.delay_ms {
            settings.delay_ms = v;
        }
        if let Some(v) = self.language_code {
            settings.language_code = v;
        }
        if let Some(v) = self.voice_name {
            settings.voice_name = v;
        }
        if let Some(v) = self.fullscreen_overlay {
            settings.fullscreen_overlay = v;
        }
    }
}

/// External key-value persistence boundary.
///
/// Absence or corruption of a value is "no persisted settings", never an
/// application failure.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Single-file JSON object store (one key-value map per file).
pub struct JsonFileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles on the backing file
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn read_map(&self) -> Result<HashMap<String, String>, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_map(&self, map: &HashMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(map)?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock();
        Ok(self.read_map()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock();
        let mut map = self.read_map()?;
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock();
        let mut map = self.read_map()?;
        map.remove(key);
        self.write_map(&map)
    }
}

/// In-memory store for tests and storage-less environments.
#[derive(Default)]
pub struct MemoryStore {
    map: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.map.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.map.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.map.lock().remove(key);
        Ok(())
    }
}

/// Shallow-merge a persisted JSON object over defaults, key by key.
/// Unknown keys are dropped, missing keys keep their default.
fn merge_over_defaults(defaults: &Settings, overlay: serde_json::Value) -> Settings {
    let mut base = match serde_json::to_value(defaults) {
        Ok(serde_json::Value::Object(map)) => map,
        _ => return defaults.clone(),
    };
    if let serde_json::Value::Object(overlay) = overlay {
        for (key, value) in overlay {
            if base.contains_key(&key) {
                base.insert(key, value);
            }
        }
    }
    match serde_json::from_value(serde_json::Value::Object(base)) {
        Ok(settings) => settings,
        Err(e) => {
            warn!("Persisted settings rejected, using defaults: {}", e);
            defaults.clone()
        }
    }
}

struct Inner {
    settings: Settings,
    app_state: AppState,
}

/// Owner of current settings and application state.
pub struct SettingsStore {
    bus: Arc<EventBus>,
    store: Arc<dyn KeyValueStore>,
    defaults: Settings,
    inner: RwLock<Inner>,
}

impl SettingsStore {
    pub fn new(bus: Arc<EventBus>, store: Arc<dyn KeyValueStore>, defaults: Settings) -> Self {
        Self {
            bus,
            store,
            inner: RwLock::new(Inner {
                settings: defaults.clone(),
                app_state: AppState::Ready,
            }),
            defaults,
        }
    }

    /// Current settings snapshot.
    pub fn settings(&self) -> Settings {
        self.inner.read().settings.clone()
    }

    pub fn app_state(&self) -> AppState {
        self.inner.read().app_state
    }

    /// Read the external store once at startup and merge over defaults.
    pub fn load_persisted(&self) {
        let raw = match self.store.get(SETTINGS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("No persisted settings, using defaults");
                return;
            }
            Err(e) => {
                warn!("Settings load failed, using defaults: {}", e);
                return;
            }
        };
        let merged = match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(value) => merge_over_defaults(&self.defaults, value),
            Err(e) => {
                warn!("Persisted settings corrupt, using defaults: {}", e);
                return;
            }
        };
        self.inner.write().settings = merged.clone();
        self.bus.publish(Event::SettingsChanged(merged));
    }

    /// Shallow-merge a patch, persist, and emit the full new snapshot.
    pub fn update(&self, patch: SettingsPatch) {
        let snapshot = {
            let mut inner = self.inner.write();
            patch.apply(&mut inner.settings);
            inner.settings.clone()
        };
        self.persist(&snapshot);
        self.bus.publish(Event::SettingsChanged(snapshot));
    }

    /// Replace settings wholesale with the configured defaults.
    pub fn reset(&self) {
        let snapshot = {
            let mut inner = self.inner.write();
            inner.settings = self.defaults.clone();
            inner.settings.clone()
        };
        self.persist(&snapshot);
        self.bus.publish(Event::SettingsChanged(snapshot));
    }

    /// Transition application state, emitting `StateChanged` only on an
    /// actual change. Redundant sets are silent no-ops so subscribers never
    /// see event storms. Only the playback engine calls this.
    pub fn set_app_state(&self, state: AppState) {
        {
            let mut inner = self.inner.write();
            if inner.app_state == state {
                return;
            }
            if !transition_allowed(inner.app_state, state) {
                warn!("Unexpected state transition: {} -> {}", inner.app_state, state);
            }
            info!("State transition: {} -> {}", inner.app_state, state);
            inner.app_state = state;
        }
        self.bus.publish(Event::StateChanged(state));
    }

    fn persist(&self, settings: &Settings) {
        let raw = match serde_json::to_string(settings) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Settings serialization failed, keeping in-memory only: {}", e);
                return;
            }
        };
        if let Err(e) = self.store.set(SETTINGS_KEY, &raw) {
            warn!("Settings persistence failed, keeping in-memory only: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_memory() -> (Arc<SettingsStore>, Arc<MemoryStore>, Arc<EventBus>) {
        let bus = Arc::new(EventBus::new());
        let kv = Arc::new(MemoryStore::new());
        let store = Arc::new(SettingsStore::new(
            Arc::clone(&bus),
            kv.clone() as Arc<dyn KeyValueStore>,
            Settings::default(),
        ));
        (store, kv, bus)
    }

    #[test]
    fn update_persists_and_reloads() {
        let (store, kv, bus) = store_with_memory();
        store.update(SettingsPatch {
            delay_ms: Some(250),
            ..Default::default()
        });

        // Simulated reload: a fresh store over the same backing map
        let reloaded = SettingsStore::new(bus, kv as Arc<dyn KeyValueStore>, Settings::default());
        reloaded.load_persisted();
        assert_eq!(reloaded.settings().delay_ms, 250);
    }

    #[test]
    fn partial_persisted_payload_merges_over_defaults() {
        let (store, kv, _bus) = store_with_memory();
        kv.set(SETTINGS_KEY, r#"{"count": 3, "mystery_key": true}"#)
            .unwrap();
        store.load_persisted();
        let s = store.settings();
        assert_eq!(s.count, 3);
        assert_eq!(s.delay_ms, Settings::default().delay_ms);
    }

    #[test]
    fn corrupt_persisted_payload_keeps_defaults() {
        let (store, kv, _bus) = store_with_memory();
        kv.set(SETTINGS_KEY, "{not json").unwrap();
        store.load_persisted();
        assert_eq!(store.settings(), Settings::default());
    }

    #[test]
    fn redundant_state_set_emits_nothing() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let (store, _kv, bus) = store_with_memory();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let _sub = bus.subscribe(crate::events::EventKind::StateChanged, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        store.set_app_state(AppState::Ready); // already ready
        assert_eq!(count.load(Ordering::SeqCst), 0);
        store.set_app_state(AppState::Playing);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        store.set_app_state(AppState::Playing);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reset_restores_defaults() {
        let (store, _kv, _bus) = store_with_memory();
        store.update(SettingsPatch {
            count: Some(99),
            voice_name: Some("other".into()),
            ..Default::default()
        });
        store.reset();
        assert_eq!(store.settings(), Settings::default());
    }

    #[test]
    fn effective_repeats_floor_is_one() {
        let mut s = Settings::default();
        s.repeat = 0;
        assert_eq!(s.effective_repeats(), 1);
        s.repeat = 3;
        assert_eq!(s.effective_repeats(), 3);
    }

    #[test]
    fn json_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("settings.json"));
        assert!(store.get("missing").unwrap().is_none());
        store.set("a", "1").unwrap();
        store.set("b", "2").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));
        store.remove("a").unwrap();
        assert!(store.get("a").unwrap().is_none());
        assert_eq!(store.get("b").unwrap().as_deref(), Some("2"));
    }
}
