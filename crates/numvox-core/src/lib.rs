//! Core playback machinery for numvox
//!
//! Everything here talks through the [`events::EventBus`]: the settings
//! store owns configuration and application state, the voice catalog
//! republishes engine voices as immutable snapshots, the speaker renders
//! one text at a time, and the playback engine drives the
//! ready/playing/paused state machine and the per-item sequencing loop.

pub mod catalog;
pub mod events;
pub mod playback;
pub mod settings;
pub mod speaker;
pub mod wakelock;

pub use catalog::{CatalogConfig, VoiceCatalog};
pub use events::{Command, Event, EventBus, EventKind, Subscription, VoiceSnapshot};
pub use playback::{PlaybackEngine, QueueItem, QueueSource};
pub use settings::{
    JsonFileStore, KeyValueStore, MemoryStore, Settings, SettingsPatch, SettingsStore,
};
pub use speaker::{SpeakOptions, Speaker, VoicePreference};
pub use wakelock::{WakeLock, WakeLockBackend};
