//! eSpeak TTS engine implementation for numvox
//!
//! Drives the `espeak`/`espeak-ng` binary as a child process: one process
//! per render, playing straight to the audio device, killed on cancel.

use async_trait::async_trait;
use numvox_tts::{SpeechOutcome, SpeechRequest, TtsEngine, TtsError, TtsResult, VoiceDescriptor};
use regex::Regex;
use tokio::process::Command;
use tokio::sync::Notify;
use tracing::{debug, warn};


pub struct EspeakEngine {
    cancel_notify: Notify,
}

impl Default for EspeakEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl EspeakEngine {
    pub fn new() -> Self {
        Self {
            cancel_notify: Notify::new(),
        }
    }

    /// Get the espeak command name (espeak or espeak-ng)
    async fn espeak_command() -> Option<&'static str> {
        if Command::new("espeak").arg("--version").output().await.is_ok() {
            Some("espeak")
        } else if Command::new("espeak-ng")
            .arg("--version")
            .output()
            .await
            .is_ok()
        {
            Some("espeak-ng")
        } else {
            None
        }
    }

    /// Build espeak arguments for one request.
    ///
    /// Our knobs are multipliers/fractions; espeak wants words-per-minute,
    /// pitch 0-99 and amplitude 0-200.
    fn build_args(request: &SpeechRequest) -> Vec<String> {
        let mut args = Vec::new();

        let voice_key = request
            .voice
            .as_ref()
            .map(|v| v.lang.to_lowercase())
            .or_else(|| request.language.as_ref().map(|l| l.to_lowercase()));
        if let Some(key) = voice_key {
            args.push("-v".to_string());
            args.push(key);
        }

        let wpm = ((175.0 * request.rate) as u32).clamp(80, 450);
        args.push("-s".to_string());
        args.push(wpm.to_string());

        let pitch = ((request.pitch * 50.0) as u32).min(99);
        args.push("-p".to_string());
        args.push(pitch.to_string());

        let amplitude = ((request.volume * 100.0) as u32).min(200);
        args.push("-a".to_string());
        args.push(amplitude.to_string());

        args.push(request.text.clone());
        args
    }
}

/// Parse `espeak --voices` output into descriptors.
///
/// Format: Pty Language Age/Gender VoiceName File Other
/// Example: ` 5  nl             M  dutch                nl`
pub fn parse_voice_list(output: &str) -> Vec<VoiceDescriptor> {
    let voice_regex = Regex::new(r"^\s*(\d+)\s+([\w-]+)\s+([MF\+-]?)\s+([\w\-_]+)\s+")
        .expect("static regex");

    let mut voices = Vec::new();
    for line in output.lines().skip(1) {
        if let Some(captures) = voice_regex.captures(line) {
            let language = captures.get(2).map_or("", |m| m.as_str());
            let name = captures.get(4).map_or("", |m| m.as_str());
            if language.is_empty() || name.is_empty() {
                continue;
            }
            voices.push(VoiceDescriptor::new(name, language));
        }
    }
    voices
}

#[async_trait]
impl TtsEngine for EspeakEngine {
    fn name(&self) -> &str {
        "eSpeak"
    }

    async fn is_available(&self) -> bool {
        Self::espeak_command().await.is_some()
    }

    async fn voices(&self) -> TtsResult<Vec<VoiceDescriptor>> {
        let cmd = match Self::espeak_command().await {
            Some(cmd) => cmd,
            // Voice warm-up may be retried by the catalog; an empty list is
            // a legal answer, a missing binary is not.
            None => {
                return Err(TtsError::EngineNotAvailable(
                    "espeak/espeak-ng not found".to_string(),
                ))
            }
        };

        let output = Command::new(cmd).arg("--voices").output().await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let voices = parse_voice_list(&stdout);
        debug!("Loaded {} espeak voices", voices.len());
        Ok(voices)
    }

    async fn speak(&self, request: SpeechRequest) -> TtsResult<SpeechOutcome> {
        // espeak has no lazy voice list; priming is a no-op here.
        if request.is_priming() {
            debug!(speech_id = request.speech_id, "priming request, nothing to do");
            return Ok(SpeechOutcome::Completed);
        }

        let cmd = Self::espeak_command()
            .await
            .ok_or_else(|| TtsError::EngineNotAvailable("espeak command not found".to_string()))?;
        let args = Self::build_args(&request);
        debug!(speech_id = request.speech_id, "running espeak: {} {:?}", cmd, args);

        let mut child = Command::new(cmd).args(&args).spawn()?;
        let cancelled = self.cancel_notify.notified();
        tokio::pin!(cancelled);

        tokio::select! {
            status = child.wait() => match status {
                Ok(status) if status.success() => Ok(SpeechOutcome::Completed),
                Ok(status) => {
                    warn!(speech_id = request.speech_id, "espeak exited with {}", status);
                    Ok(SpeechOutcome::Failed(format!("espeak exited with {status}")))
                }
                Err(e) => {
                    warn!(speech_id = request.speech_id, "espeak wait failed: {}", e);
                    Ok(SpeechOutcome::Failed(format!("process wait failed: {e}")))
                }
            },
            _ = &mut cancelled => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                debug!(speech_id = request.speech_id, "espeak render cancelled");
                Ok(SpeechOutcome::Cancelled)
            }
        }
    }

    async fn cancel(&self) -> TtsResult<()> {
        self.cancel_notify.notify_waiters();
        Ok(())
    }
}
