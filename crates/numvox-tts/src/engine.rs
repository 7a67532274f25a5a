//! TTS engine abstraction

use crate::error::TtsResult;
use crate::types::{SpeechOutcome, SpeechRequest, VoiceDescriptor};
use async_trait::async_trait;
use tokio::sync::broadcast;

/// Core TTS engine interface
///
/// Implementations provide specific TTS functionality (espeak, scripted
/// test engines, etc.). The contract mirrors the three capabilities the
/// playback layer consumes: enumerate voices, render-and-wait, and cancel
/// in flight.
#[async_trait]
pub trait TtsEngine: Send + Sync {
    /// Engine name/identifier
    fn name(&self) -> &str;

    /// Check if the engine is usable on this system
    async fn is_available(&self) -> bool;

    /// Enumerate currently known voices.
    ///
    /// May legitimately return an empty list before the engine has warmed
    /// up; callers retry via the catalog's priming policy.
    async fn voices(&self) -> TtsResult<Vec<VoiceDescriptor>>;

    /// Render one request and resolve when playback ends.
    ///
    /// Engine-level failures during rendering should be reported as
    /// `SpeechOutcome::Failed` rather than `Err` where possible; `Err` is
    /// reserved for the engine being unusable at all.
    async fn speak(&self, request: SpeechRequest) -> TtsResult<SpeechOutcome>;

    /// Cancel any in-flight render. Must be idempotent.
    async fn cancel(&self) -> TtsResult<()>;

    /// Notifications that the voice set changed (device voice installs,
    /// async warm-up). Engines without change tracking keep the default,
    /// which yields a receiver that never fires.
    fn voices_changed(&self) -> broadcast::Receiver<()> {
        let (tx, rx) = broadcast::channel(1);
        drop(tx);
        rx
    }
}
