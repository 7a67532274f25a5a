//! Error types for TTS functionality

use thiserror::Error;

/// TTS error types
#[derive(Error, Debug)]
pub enum TtsError {
    /// Engine is not available or not installed
    #[error("TTS engine not available: {0}")]
    EngineNotAvailable(String),

    /// Voice not found or not supported
    #[error("Voice not found: {0}")]
    VoiceNotFound(String),

    /// Synthesis failed
    #[error("Synthesis failed: {0}")]
    SynthesisError(String),

    /// IO error (process spawning, pipe handling, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Engine-specific error
    #[error("Engine error ({engine}): {message}")]
    EngineSpecific { engine: String, message: String },
}

/// Result type for TTS operations
pub type TtsResult<T> = Result<T, TtsError>;
