//! Speaker: stateless-between-calls wrapper rendering one text to audio
//!
//! Selects a voice through the fallback heuristic, validates rate, pitch
//! and volume independently, and resolves when rendering completes, fails
//! or is cancelled. Callers never see an error: speech failures are
//! normalized into [`SpeechOutcome`] so the sequencing loop always
//! advances.

use std::sync::Arc;

use numvox_tts::{base_subtag, SpeechOutcome, SpeechRequest, TtsEngine, VoiceDescriptor};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::catalog::VoiceCatalog;
use crate::events::{Event, EventBus};
use crate::settings::SettingsStore;

/// Call-specific overrides, merged over current settings.
#[derive(Debug, Clone)]
pub struct SpeakOptions {
    pub voice_name: Option<String>,
    pub language_code: Option<String>,
    pub rate: Option<f32>,
    pub pitch: Option<f32>,
    pub volume: Option<f32>,
    /// Cancel any in-flight render before starting (default: yes)
    pub interrupt: bool,
}

impl Default for SpeakOptions {
    fn default() -> Self {
        Self {
            voice_name: None,
            language_code: None,
            rate: None,
            pitch: None,
            volume: None,
            interrupt: true,
        }
    }
}

/// Inputs to the voice-selection heuristic.
#[derive(Debug, Clone, Default)]
pub struct VoicePreference {
    pub voice_name: Option<String>,
    pub language_code: Option<String>,
    pub system_language: Option<String>,
}

impl VoicePreference {
    fn normalized(voice_name: &str, language_code: &str, system_language: Option<&str>) -> Self {
        let non_blank = |s: &str| {
            let t = s.trim();
            (!t.is_empty()).then(|| t.to_string())
        };
        Self {
            voice_name: non_blank(voice_name),
            language_code: non_blank(language_code),
            system_language: system_language.and_then(non_blank),
        }
    }
}

/// Voice selection heuristic, applied in order, first match wins.
///
/// An explicit voice choice always beats a language-only hint, and any
/// match beats falling through to the engine's undifferentiated default:
/// 1. exact preferred-name match
/// 2. case-insensitive substring match on the preferred name
/// 3. exact match on the full preferred language tag
/// 4. base-subtag match of the preferred language tag
/// 5. base-subtag match of the ambient system language
/// 6. first available voice
/// 7. none (engine default; language tag still applied as a hint)
pub fn select_voice<'a>(
    voices: &'a [VoiceDescriptor],
    prefs: &VoicePreference,
) -> Option<&'a VoiceDescriptor> {
    if voices.is_empty() {
        return None;
    }

    if let Some(name) = &prefs.voice_name {
        if let Some(exact) = voices.iter().find(|v| &v.name == name) {
            return Some(exact);
        }
        let lowered = name.to_lowercase();
        if let Some(partial) = voices
            .iter()
            .find(|v| v.name.to_lowercase().contains(&lowered))
        {
            return Some(partial);
        }
    }

    if let Some(lang) = &prefs.language_code {
        let lowered = lang.to_lowercase();
        if let Some(full) = voices.iter().find(|v| v.lang.to_lowercase() == lowered) {
            return Some(full);
        }
        let base = base_subtag(&lowered);
        if !base.is_empty() {
            if let Some(by_base) = voices
                .iter()
                .find(|v| v.base_lang().to_lowercase() == base)
            {
                return Some(by_base);
            }
        }
    }

    if let Some(system) = &prefs.system_language {
        let base = base_subtag(system).to_lowercase();
        if !base.is_empty() {
            if let Some(by_system) = voices
                .iter()
                .find(|v| v.base_lang().to_lowercase() == base)
            {
                return Some(by_system);
            }
        }
    }

    voices.first()
}

/// Validated speech rate: finite and positive, else neutral 1.0.
fn effective_rate(value: f32) -> f32 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        1.0
    }
}

/// Validated pitch: finite and positive, else neutral 1.0.
fn effective_pitch(value: f32) -> f32 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        1.0
    }
}

/// Validated volume: finite and within [0, 1], else full 1.0.
fn effective_volume(value: f32) -> f32 {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        value
    } else {
        1.0
    }
}

pub struct Speaker {
    bus: Arc<EventBus>,
    engine: Arc<dyn TtsEngine>,
    catalog: Arc<VoiceCatalog>,
    settings: Arc<SettingsStore>,
    /// Token for the render currently in flight; swapped per `speak` call
    render_token: Mutex<CancellationToken>,
    system_language: Option<String>,
}

impl Speaker {
    pub fn new(
        bus: Arc<EventBus>,
        engine: Arc<dyn TtsEngine>,
        catalog: Arc<VoiceCatalog>,
        settings: Arc<SettingsStore>,
        system_language: Option<String>,
    ) -> Self {
        Self {
            bus,
            engine,
            catalog,
            settings,
            render_token: Mutex::new(CancellationToken::new()),
            system_language,
        }
    }

    /// Render one piece of text and wait for it to finish.
    ///
    /// All terminal paths resolve: engine errors become
    /// [`SpeechOutcome::Failed`], cancellation becomes
    /// [`SpeechOutcome::Cancelled`]. Callers need no error branches for
    /// normal speech failures.
    pub async fn speak(&self, text: &str, opts: SpeakOptions) -> SpeechOutcome {
        if text.trim().is_empty() {
            return SpeechOutcome::Completed;
        }
        if opts.interrupt {
            self.cancel();
        }

        let settings = self.settings.settings();
        let prefs = VoicePreference::normalized(
            opts.voice_name.as_deref().unwrap_or(&settings.voice_name),
            opts.language_code
                .as_deref()
                .unwrap_or(&settings.language_code),
            self.system_language.as_deref(),
        );
        let voices = self.catalog.voices();
        let voice = select_voice(&voices, &prefs).cloned();
        if voice.is_none() {
            debug!("no voice matched, falling through to engine default");
        }

        let mut request = SpeechRequest::new(text);
        request.voice = voice;
        request.language = prefs.language_code.clone();
        request.rate = effective_rate(opts.rate.unwrap_or(settings.rate));
        request.pitch = effective_pitch(opts.pitch.unwrap_or(settings.pitch));
        request.volume = effective_volume(opts.volume.unwrap_or(settings.volume));
        let speech_id = request.speech_id;

        // Fresh token per render, swapped in before anything observable
        // happens. Cancellation is level-triggered: a cancel landing between
        // the swap and the first poll of the select still lands.
        let token = {
            let mut current = self.render_token.lock();
            *current = CancellationToken::new();
            current.clone()
        };

        self.bus.publish(Event::SpeechStarted {
            text: text.to_string(),
        });

        let outcome = tokio::select! {
            result = self.engine.speak(request) => match result {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(speech_id, "speech render failed: {}", e);
                    SpeechOutcome::Failed(e.to_string())
                }
            },
            () = token.cancelled() => {
                if let Err(e) = self.engine.cancel().await {
                    warn!(speech_id, "engine cancel failed: {}", e);
                }
                SpeechOutcome::Cancelled
            }
        };

        if let SpeechOutcome::Failed(reason) = &outcome {
            warn!(speech_id, "render ended in failure: {}", reason);
        }
        self.bus.publish(Event::SpeechEnded);
        outcome
    }

    /// Cancel any in-flight render. Synchronous and idempotent; the awaited
    /// `speak` future resolves with [`SpeechOutcome::Cancelled`]. A cancel
    /// with no render in flight only retires the stale token and never
    /// affects a later `speak`.
    pub fn cancel(&self) {
        self.render_token.lock().cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<VoiceDescriptor> {
        vec![
            VoiceDescriptor::new("Google US English", "en-US"),
            VoiceDescriptor::new("Google Nederlands", "nl-NL"),
            VoiceDescriptor::new("Vlaams", "nl-BE"),
            VoiceDescriptor::new("Anna", "de-DE"),
        ]
    }

    fn prefs(
        voice_name: Option<&str>,
        language_code: Option<&str>,
        system_language: Option<&str>,
    ) -> VoicePreference {
        VoicePreference {
            voice_name: voice_name.map(String::from),
            language_code: language_code.map(String::from),
            system_language: system_language.map(String::from),
        }
    }

    #[test]
    fn exact_name_wins() {
        let voices = catalog();
        let chosen = select_voice(&voices, &prefs(Some("Google Nederlands"), Some("de-DE"), None));
        assert_eq!(chosen.unwrap().name, "Google Nederlands");
    }

    #[test]
    fn substring_name_match_is_case_insensitive() {
        let voices = catalog();
        let chosen = select_voice(&voices, &prefs(Some("nederlands"), None, None));
        assert_eq!(chosen.unwrap().name, "Google Nederlands");
    }

    #[test]
    fn full_language_tag_match() {
        let voices = catalog();
        let chosen = select_voice(&voices, &prefs(Some("Nonexistent Voice"), Some("nl-BE"), None));
        assert_eq!(chosen.unwrap().name, "Vlaams");
    }

    #[test]
    fn base_subtag_match_ignores_region() {
        let voices = catalog();
        let chosen = select_voice(&voices, &prefs(None, Some("nl-XX"), None));
        assert_eq!(chosen.unwrap().lang, "nl-NL");
    }

    #[test]
    fn system_language_fallback() {
        let voices = catalog();
        let chosen = select_voice(&voices, &prefs(None, Some("zz-ZZ"), Some("de-AT")));
        assert_eq!(chosen.unwrap().name, "Anna");
    }

    #[test]
    fn system_language_compares_whole_base_subtags() {
        // "nld" is a different language than "nl"; a prefix comparison
        // would wrongly prefer it here.
        let voices = vec![
            VoiceDescriptor::new("Fallback", "en-US"),
            VoiceDescriptor::new("Oldtongue", "nld-BE"),
            VoiceDescriptor::new("Vlaams", "nl-BE"),
        ];
        let chosen = select_voice(&voices, &prefs(None, None, Some("nl-NL")));
        assert_eq!(chosen.unwrap().name, "Vlaams");
    }

    #[test]
    fn first_voice_fallback() {
        let voices = catalog();
        let chosen = select_voice(&voices, &prefs(None, Some("zz"), Some("xx")));
        assert_eq!(chosen.unwrap().name, "Google US English");
    }

    #[test]
    fn empty_catalog_selects_nothing() {
        assert!(select_voice(&[], &prefs(Some("any"), Some("nl-NL"), None)).is_none());
    }

    #[test]
    fn selection_is_deterministic() {
        let voices = catalog();
        let p = prefs(Some("Goog"), Some("nl-NL"), Some("en"));
        let a = select_voice(&voices, &p).cloned();
        let b = select_voice(&voices, &p).cloned();
        assert_eq!(a, b);
    }

    #[test]
    fn knob_validation_falls_back_to_neutral() {
        assert_eq!(effective_rate(f32::NAN), 1.0);
        assert_eq!(effective_rate(-2.0), 1.0);
        assert_eq!(effective_rate(1.5), 1.5);
        assert_eq!(effective_pitch(0.0), 1.0);
        assert_eq!(effective_pitch(2.0), 2.0);
        assert_eq!(effective_volume(1.5), 1.0);
        assert_eq!(effective_volume(f32::INFINITY), 1.0);
        assert_eq!(effective_volume(0.25), 0.25);
    }

    #[test]
    fn blank_preferences_are_dropped() {
        let p = VoicePreference::normalized("  ", "", Some("nl-NL"));
        assert!(p.voice_name.is_none());
        assert!(p.language_code.is_none());
        assert_eq!(p.system_language.as_deref(), Some("nl-NL"));
    }
}
