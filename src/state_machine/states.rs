use serde::{Deserialize, Serialize};
use std::fmt;

/// Conversation state definitions. Closed set, fixed at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Initial state; the session is not in the middle of any workflow.
    Idle,
    /// A decode was requested; the user is picking an algorithm.
    ChoosingAlgorithm,
    /// An algorithm was chosen; waiting for the carrier image upload.
    AwaitingSource,
    /// An encode was requested; waiting for the carrier image upload.
    Encoding,
}

impl SessionState {
    /// Check if this is the resting state between workflows.
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::ChoosingAlgorithm => write!(f, "choosing_algorithm"),
            Self::AwaitingSource => write!(f, "awaiting_source"),
            Self::Encoding => write!(f, "encoding"),
        }
    }
}

impl std::str::FromStr for SessionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(Self::Idle),
            "choosing_algorithm" => Ok(Self::ChoosingAlgorithm),
            "awaiting_source" => Ok(Self::AwaitingSource),
            "encoding" => Ok(Self::Encoding),
            _ => Err(format!("Invalid session state: {s}")),
        }
    }
}

/// New sessions start idle.
impl Default for SessionState {
    fn default() -> Self {
        Self::Idle
    }
}
