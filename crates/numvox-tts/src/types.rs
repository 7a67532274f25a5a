//! Core types for text-to-speech functionality

use serde::{Deserialize, Serialize};

/// Lightweight, immutable projection of an engine-reported voice.
///
/// Engines keep their live voice handles to themselves; only descriptors
/// cross the event boundary, so no non-serializable resource ever leaks
/// into subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceDescriptor {
    /// Human-readable voice name (also the best-effort selection key)
    pub name: String,
    /// Language tag (e.g. "nl-NL", "en")
    pub lang: String,
}

impl VoiceDescriptor {
    pub fn new(name: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lang: lang.into(),
        }
    }

    /// Base language subtag, ignoring region ("nl" from "nl-NL").
    pub fn base_lang(&self) -> &str {
        base_subtag(&self.lang)
    }
}

/// Primary language portion of a tag, before any `-` or `_` separator.
pub fn base_subtag(tag: &str) -> &str {
    tag.split(['-', '_']).next().unwrap_or("")
}

/// One render request handed to an engine.
#[derive(Debug, Clone)]
pub struct SpeechRequest {
    /// Unique request ID, for log correlation
    pub speech_id: u64,
    /// Text to render; empty text is a priming request (see below)
    pub text: String,
    /// Resolved voice, if the selection heuristic found one
    pub voice: Option<VoiceDescriptor>,
    /// Language hint applied even when no voice was resolved
    pub language: Option<String>,
    /// Speech rate multiplier (validated, > 0)
    pub rate: f32,
    /// Voice pitch (validated, > 0)
    pub pitch: f32,
    /// Volume (validated, in [0, 1])
    pub volume: f32,
}

impl SpeechRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            speech_id: crate::next_speech_id(),
            text: text.into(),
            voice: None,
            language: None,
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
        }
    }

    /// Zero-length utterance issued solely to force a lazy engine to
    /// populate its voice list.
    pub fn priming() -> Self {
        Self::new("")
    }

    pub fn is_priming(&self) -> bool {
        self.text.is_empty()
    }
}

/// Terminal result of a render.
///
/// Failures are data, not errors: the sequencing loop treats all three
/// variants as "this item is done" and advances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechOutcome {
    /// Render ran to completion
    Completed,
    /// Render was cut off by an explicit cancel
    Cancelled,
    /// Engine reported an error; carried for logging only
    Failed(String),
}
