//! Text-to-speech abstraction layer for numvox
//!
//! This crate provides the foundational types and trait for text-to-speech
//! functionality: voice descriptors, speech requests/outcomes, and the
//! engine trait that concrete backends (espeak, scripted test engines)
//! implement.

use std::sync::atomic::{AtomicU64, Ordering};

pub mod engine;
pub mod error;
pub mod types;

pub use engine::TtsEngine;
pub use error::{TtsError, TtsResult};
pub use types::{base_subtag, SpeechOutcome, SpeechRequest, VoiceDescriptor};

/// Generates unique speech request IDs
static SPEECH_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generate a unique speech request ID
pub fn next_speech_id() -> u64 {
    SPEECH_ID_COUNTER.fetch_add(1, Ordering::SeqCst)
}
