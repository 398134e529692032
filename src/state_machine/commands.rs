use serde::{Deserialize, Serialize};
use std::fmt;

/// Trigger kinds recognized by the conversation machine. Closed set.
///
/// `Unrecognized` is the parser's total-function fallback for text that
/// matches no command. It never appears in the transition table, so the
/// permission stage always demotes it to `Help`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Start,
    Help,
    Encode,
    Decode,
    ChooseAlgorithm,
    UploadSource,
    Unrecognized,
}

impl Command {
    /// All commands the parser will attempt to match against text input.
    pub const PARSEABLE: [Command; 6] = [
        Self::Start,
        Self::Help,
        Self::Encode,
        Self::Decode,
        Self::ChooseAlgorithm,
        Self::UploadSource,
    ];
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Help => write!(f, "help"),
            Self::Encode => write!(f, "encode"),
            Self::Decode => write!(f, "decode"),
            Self::ChooseAlgorithm => write!(f, "choose_algorithm"),
            Self::UploadSource => write!(f, "upload_source"),
            Self::Unrecognized => write!(f, "unrecognized"),
        }
    }
}

impl std::str::FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(Self::Start),
            "help" => Ok(Self::Help),
            "encode" => Ok(Self::Encode),
            "decode" => Ok(Self::Decode),
            "choose_algorithm" => Ok(Self::ChooseAlgorithm),
            "upload_source" => Ok(Self::UploadSource),
            "unrecognized" => Ok(Self::Unrecognized),
            _ => Err(format!("Invalid command: {s}")),
        }
    }
}
