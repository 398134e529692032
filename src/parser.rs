//! # Command Parser
//!
//! Resolves raw inbound events into machine triggers. The parser is a total
//! function in two stages:
//!
//! 1. **Syntax**: attachments resolve to `UploadSource` unconditionally;
//!    callbacks resolve to the command embedded in their correlation
//!    payload; text is matched by first token, case-insensitively, with the
//!    command prefix stripped. Anything else is `Unrecognized`.
//! 2. **Permission**: a syntactically valid command the current state
//!    cannot fire is demoted to `Help`, so the machine never receives a
//!    structurally invalid trigger.
//!
//! Parse failure is a value, never an error.

use crate::events::InboundEvent;
use crate::state_machine::{Command, SessionState, TransitionTable};
use crate::store::CallbackCorrelation;
use std::sync::Arc;

pub struct CommandParser {
    prefix: char,
    table: Arc<TransitionTable>,
}

impl CommandParser {
    pub fn new(prefix: char, table: Arc<TransitionTable>) -> Self {
        Self { prefix, table }
    }

    /// Resolve an event to the trigger the machine will actually receive,
    /// given the session's just-restored state.
    pub fn resolve(&self, event: &InboundEvent, state: SessionState) -> Command {
        let candidate = match event {
            InboundEvent::Text { text, .. } => self.parse_text(text),
            InboundEvent::Attachment { .. } => Command::UploadSource,
            InboundEvent::Callback { data, .. } => Self::parse_callback(data),
            // Non-conversational events never reach the machine; mapping
            // them to Help keeps this function total.
            InboundEvent::AuxiliaryQuery { .. } | InboundEvent::TransportError { .. } => {
                Command::Help
            }
        };

        if self.table.can_fire(state, candidate) {
            candidate
        } else {
            Command::Help
        }
    }

    /// Syntax stage for text input. Total: unmatched input yields
    /// [`Command::Unrecognized`].
    pub fn parse_text(&self, text: &str) -> Command {
        let Some(token) = text.split_whitespace().next() else {
            return Command::Unrecognized;
        };
        let token = token.strip_prefix(self.prefix).unwrap_or(token);
        let token = token.to_lowercase();

        Command::PARSEABLE
            .into_iter()
            .find(|command| command.to_string() == token)
            .unwrap_or(Command::Unrecognized)
    }

    /// Syntax stage for interaction callbacks: the correlation payload
    /// attached to the pressed element names the command. A payload that
    /// does not decode falls back to `ChooseAlgorithm`, the only command
    /// ever offered through a keyboard.
    fn parse_callback(data: &str) -> Command {
        serde_json::from_str::<CallbackCorrelation>(data)
            .map(|callback| callback.command)
            .unwrap_or(Command::ChooseAlgorithm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn parser() -> CommandParser {
        CommandParser::new('/', Arc::new(TransitionTable::conversation()))
    }

    #[test]
    fn test_parse_text_commands() {
        let parser = parser();
        assert_eq!(parser.parse_text("/start"), Command::Start);
        assert_eq!(parser.parse_text("/DECODE now please"), Command::Decode);
        assert_eq!(parser.parse_text("help"), Command::Help);
        assert_eq!(parser.parse_text("  /encode trailing"), Command::Encode);
    }

    #[test]
    fn test_parse_text_unmatched() {
        let parser = parser();
        assert_eq!(parser.parse_text(""), Command::Unrecognized);
        assert_eq!(parser.parse_text("   "), Command::Unrecognized);
        assert_eq!(parser.parse_text("/zzz"), Command::Unrecognized);
        assert_eq!(parser.parse_text("//start"), Command::Unrecognized);
    }

    #[test]
    fn test_attachment_resolves_to_upload() {
        let parser = parser();
        let event = InboundEvent::Attachment {
            session_key: "42".into(),
            blob: vec![1, 2, 3],
            caption: None,
        };
        assert_eq!(
            parser.resolve(&event, SessionState::AwaitingSource),
            Command::UploadSource
        );
        // Permission stage: uploads are meaningless while idle.
        assert_eq!(parser.resolve(&event, SessionState::Idle), Command::Help);
    }

    #[test]
    fn test_callback_carries_command() {
        let parser = parser();
        let correlation = CallbackCorrelation::new(Command::ChooseAlgorithm, Some("lsb".into()));
        let event = InboundEvent::Callback {
            session_key: "42".into(),
            interaction_id: "i1".into(),
            data: serde_json::to_string(&correlation).unwrap(),
        };
        assert_eq!(
            parser.resolve(&event, SessionState::ChoosingAlgorithm),
            Command::ChooseAlgorithm
        );
    }

    #[test]
    fn test_corrupt_callback_demoted_by_permission() {
        let parser = parser();
        let event = InboundEvent::Callback {
            session_key: "42".into(),
            interaction_id: "i1".into(),
            data: "{not json".into(),
        };
        // Syntax fallback is ChooseAlgorithm, which idle cannot fire.
        assert_eq!(parser.resolve(&event, SessionState::Idle), Command::Help);
    }

    #[test]
    fn test_impermissible_text_demoted_to_help() {
        let parser = parser();
        let event = InboundEvent::Text {
            session_key: "42".into(),
            text: "/decode".into(),
        };
        assert_eq!(
            parser.resolve(&event, SessionState::AwaitingSource),
            Command::Help
        );
    }

    proptest! {
        /// Parser totality: any input yields some command, and resolution
        /// against any state yields a fireable trigger.
        #[test]
        fn prop_parse_text_total(text in ".*") {
            let parser = parser();
            let _ = parser.parse_text(&text);
        }

        #[test]
        fn prop_resolved_command_always_fireable(text in ".*") {
            let parser = parser();
            let table = TransitionTable::conversation();
            for state in [
                SessionState::Idle,
                SessionState::ChoosingAlgorithm,
                SessionState::AwaitingSource,
                SessionState::Encoding,
            ] {
                let event = InboundEvent::Text {
                    session_key: "42".into(),
                    text: text.clone(),
                };
                let resolved = parser.resolve(&event, state);
                prop_assert!(table.can_fire(state, resolved));
            }
        }
    }
}
