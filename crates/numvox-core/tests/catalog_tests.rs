//! Voice catalog integration tests: warm-up priming and change tracking.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::ScriptedEngine;
use numvox_core::{CatalogConfig, EventBus, VoiceCatalog};
use numvox_tts::VoiceDescriptor;

fn catalog_with(engine: Arc<ScriptedEngine>, config: CatalogConfig) -> Arc<VoiceCatalog> {
    let bus = Arc::new(EventBus::new());
    Arc::new(VoiceCatalog::new(bus, engine, config))
}

#[tokio::test(start_paused = true)]
async fn ensure_loaded_primes_a_lazy_engine() {
    let (engine, _rx) = ScriptedEngine::new(Vec::new());
    engine.voices_on_prime(vec![VoiceDescriptor::new("Google Nederlands", "nl-NL")]);
    let catalog = catalog_with(engine, CatalogConfig::default());

    catalog.ensure_loaded().await;

    let snapshot = catalog.snapshot();
    assert_eq!(snapshot.voices.len(), 1);
    assert_eq!(snapshot.languages, vec!["NL", "ALL"]);
}

#[tokio::test(start_paused = true)]
async fn ensure_loaded_gives_up_after_bounded_attempts() {
    let (engine, _rx) = ScriptedEngine::new(Vec::new());
    let catalog = catalog_with(
        engine,
        CatalogConfig {
            prime_attempts: 3,
            prime_delay: Duration::from_millis(250),
        },
    );

    let before = tokio::time::Instant::now();
    catalog.ensure_loaded().await;

    // Three bounded priming delays, then graceful degradation
    assert_eq!(before.elapsed(), Duration::from_millis(750));
    assert!(catalog.snapshot().voices.is_empty());
    assert_eq!(catalog.snapshot().languages, vec!["ALL"]);
}

#[tokio::test(start_paused = true)]
async fn watcher_refreshes_on_engine_notifications() {
    let (engine, _rx) = ScriptedEngine::new(vec![VoiceDescriptor::new("Anna", "de-DE")]);
    let catalog = catalog_with(engine.clone(), CatalogConfig::default());
    catalog.refresh().await;
    assert_eq!(catalog.snapshot().voices.len(), 1);

    let watcher = catalog.spawn_watcher();

    engine.set_voices(vec![
        VoiceDescriptor::new("Anna", "de-DE"),
        VoiceDescriptor::new("Google Nederlands", "nl-NL"),
    ]);
    engine.trigger_voices_changed();
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }

    let snapshot = catalog.snapshot();
    assert_eq!(snapshot.voices.len(), 2);
    assert_eq!(snapshot.languages, vec!["DE", "NL", "ALL"]);
    watcher.abort();
}
