use serde::{Deserialize, Serialize};

/// Playback application state.
///
/// `Ready` is both the initial and the terminal state: a completed or
/// stopped session always lands back here. Only the playback engine may
/// drive transitions (through the settings store), everything else observes
/// them via `StateChanged` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppState {
    Ready,
    Playing,
    Paused,
}

impl AppState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppState::Ready => "ready",
            AppState::Playing => "playing",
            AppState::Paused => "paused",
        }
    }
}

impl std::fmt::Display for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validate a state machine edge.
///
/// start: Ready -> Playing, pause: Playing -> Paused,
/// resume: Paused -> Playing, stop/finish: Playing|Paused -> Ready.
pub fn transition_allowed(from: AppState, to: AppState) -> bool {
    matches!(
        (from, to),
        (AppState::Ready, AppState::Playing)
            | (AppState::Playing, AppState::Paused)
            | (AppState::Paused, AppState::Playing)
            | (AppState::Playing, AppState::Ready)
            | (AppState::Paused, AppState::Ready)
    )
}
