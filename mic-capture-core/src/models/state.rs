use serde::{Deserialize, Serialize};

/// Capture session state machine.
///
/// State transitions:
/// ```text
/// stopped → starting → recording → stopping → stopped
///              ↓                       ↑
///           stopped          (fatal worker error)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Stopped,
    Starting,
    Recording,
    Stopping,
}

impl SessionState {
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, Self::Recording)
    }

    /// Whether the device handle and worker may exist in this state.
    pub fn holds_resources(&self) -> bool {
        !self.is_stopped()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Recording => "recording",
            Self::Stopping => "stopping",
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Stopped
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
