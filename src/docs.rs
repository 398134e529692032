//! Usage text generation from the set of currently permitted commands.

use crate::state_machine::{Command, SessionState};
use std::collections::HashMap;

const COMMAND_DOC_FORMAT_PREFIX: char = '/';

/// Renders the help/usage text sent by the `SendUsage` entry effect.
///
/// Descriptions cover a strict subset of commands; a permitted command
/// without a description is omitted from the output rather than rendered
/// with a placeholder. State preambles are likewise optional.
pub struct DocBuilder {
    command_docs: HashMap<Command, &'static str>,
    state_docs: HashMap<SessionState, &'static str>,
}

impl DocBuilder {
    pub fn new() -> Self {
        let command_docs = HashMap::from([
            (Command::Start, "reset the conversation and show this message"),
            (Command::Help, "list what you can do right now"),
            (Command::Encode, "hide a text payload inside an image"),
            (Command::Decode, "extract a hidden payload from an image"),
        ]);
        let state_docs = HashMap::from([
            (SessionState::Idle, "Nothing in progress."),
            (
                SessionState::ChoosingAlgorithm,
                "Pick an algorithm from the keyboard below.",
            ),
            (SessionState::AwaitingSource, "Send the carrier image."),
            (SessionState::Encoding, "Send the carrier image."),
        ]);
        Self {
            command_docs,
            state_docs,
        }
    }

    /// One line per documented permitted command, formatted
    /// `/<command> : <description>`, preceded by the state preamble when one
    /// exists.
    pub fn build(&self, state: SessionState, permitted: &[Command]) -> String {
        let commands = permitted
            .iter()
            .filter_map(|command| {
                self.command_docs
                    .get(command)
                    .map(|doc| format!("{COMMAND_DOC_FORMAT_PREFIX}{command} : {doc}"))
            })
            .collect::<Vec<_>>()
            .join("\n");

        match self.state_docs.get(&state) {
            Some(preamble) if !commands.is_empty() => format!("{preamble}\n{commands}"),
            Some(preamble) => (*preamble).to_string(),
            None => commands,
        }
    }
}

impl Default for DocBuilder {
    fn default() -> Self {
        Self::new()
    }
}
