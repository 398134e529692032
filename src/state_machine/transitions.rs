//! Declarative transition table for the conversation machine.
//!
//! The table is an explicit, immutable map from `(SessionState, Command)` to
//! a target state and a named entry effect. It is assembled once at startup,
//! validated, and shared; per-event evaluation is a stateless lookup with no
//! side effects. A missing entry is a normal lookup miss, not an error, and
//! callers recover by firing `Help`.

use super::{Command, SessionState};
use crate::error::{EngineError, EngineResult};
use std::collections::HashMap;

/// Names the side-effecting entry action bound to a transition. Execution
/// is the session manager's job; the table only declares the binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Render permitted commands and send the usage text.
    SendUsage,
    /// Offer the algorithm choice keyboard.
    SendChoiceList,
    /// Ask the user to upload a carrier image.
    RequestUpload,
    /// Run the extraction workflow on the uploaded carrier.
    PerformDecode,
    /// Run the embedding workflow on the uploaded carrier.
    PerformEncode,
    /// Commit the state change without any entry action.
    None,
}

/// One entry of the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: SessionState,
    pub effect: Effect,
}

/// Immutable map of guarded transitions, built once per process.
#[derive(Debug)]
pub struct TransitionTable {
    entries: HashMap<(SessionState, Command), Transition>,
}

impl TransitionTable {
    pub fn builder() -> TransitionTableBuilder {
        TransitionTableBuilder {
            entries: Vec::new(),
        }
    }

    /// The conversation table for the steganography bot.
    ///
    /// `Help` is a reentry everywhere; `Start` returns every state to
    /// `Idle` (reentering it when already there), always re-sending usage.
    pub fn conversation() -> Self {
        let all = [
            SessionState::Idle,
            SessionState::ChoosingAlgorithm,
            SessionState::AwaitingSource,
            SessionState::Encoding,
        ];

        let mut builder = Self::builder()
            .permit_reentry(SessionState::Idle, Command::Start, Effect::SendUsage)
            .permit(
                SessionState::Idle,
                Command::Decode,
                SessionState::ChoosingAlgorithm,
                Effect::SendChoiceList,
            )
            .permit(
                SessionState::Idle,
                Command::Encode,
                SessionState::Encoding,
                Effect::RequestUpload,
            )
            .permit(
                SessionState::ChoosingAlgorithm,
                Command::ChooseAlgorithm,
                SessionState::AwaitingSource,
                Effect::RequestUpload,
            )
            .permit(
                SessionState::AwaitingSource,
                Command::UploadSource,
                SessionState::Idle,
                Effect::PerformDecode,
            )
            .permit(
                SessionState::Encoding,
                Command::UploadSource,
                SessionState::Idle,
                Effect::PerformEncode,
            );

        for state in all {
            builder = builder.permit_reentry(state, Command::Help, Effect::SendUsage);
            if !state.is_idle() {
                builder = builder.permit(state, Command::Start, SessionState::Idle, Effect::SendUsage);
            }
        }

        builder
            .build()
            .expect("built-in conversation table is valid")
    }

    /// Stateless step evaluation: the transition for `(state, command)`, if
    /// one is registered. Query-only; committing the state change and
    /// running the effect belong to the caller.
    pub fn step(&self, state: SessionState, command: Command) -> Option<&Transition> {
        self.entries.get(&(state, command))
    }

    /// Whether a transition exists for `(state, command)`. Side-effect free.
    pub fn can_fire(&self, state: SessionState, command: Command) -> bool {
        self.entries.contains_key(&(state, command))
    }

    /// Commands with a registered transition out of `state`, sorted for
    /// stable usage output.
    pub fn permitted_commands(&self, state: SessionState) -> Vec<Command> {
        let mut commands: Vec<Command> = self
            .entries
            .keys()
            .filter(|(from, _)| *from == state)
            .map(|(_, command)| *command)
            .collect();
        commands.sort();
        commands
    }
}

/// Accumulates entries and validates them into a [`TransitionTable`].
pub struct TransitionTableBuilder {
    entries: Vec<(SessionState, Command, Transition)>,
}

impl TransitionTableBuilder {
    /// Register a transition to a different state.
    pub fn permit(
        mut self,
        from: SessionState,
        command: Command,
        next: SessionState,
        effect: Effect,
    ) -> Self {
        self.entries.push((from, command, Transition { next, effect }));
        self
    }

    /// Register a transition whose target equals its source, for commands
    /// that must stay actionable without changing context.
    pub fn permit_reentry(self, state: SessionState, command: Command, effect: Effect) -> Self {
        self.permit(state, command, state, effect)
    }

    /// Validate and freeze the table.
    ///
    /// Rejected: entries triggered by `Unrecognized`, contradictory
    /// duplicate `(from, command)` registrations, and target states with no
    /// outgoing transitions of their own (dead ends the machine could never
    /// leave).
    pub fn build(self) -> EngineResult<TransitionTable> {
        let mut entries: HashMap<(SessionState, Command), Transition> = HashMap::new();

        for (from, command, transition) in self.entries {
            if command == Command::Unrecognized {
                return Err(EngineError::configuration(
                    "transition_table",
                    format!("{from} cannot be triggered by the unrecognized fallback"),
                ));
            }
            if let Some(existing) = entries.insert((from, command), transition) {
                if existing != transition {
                    return Err(EngineError::configuration(
                        "transition_table",
                        format!("contradictory entries for ({from}, {command})"),
                    ));
                }
            }
        }

        let sources: std::collections::HashSet<SessionState> =
            entries.keys().map(|(from, _)| *from).collect();
        for ((from, command), transition) in &entries {
            if !sources.contains(&transition.next) {
                return Err(EngineError::configuration(
                    "transition_table",
                    format!(
                        "({from}, {command}) targets {}, which has no outgoing transitions",
                        transition.next
                    ),
                ));
            }
        }

        Ok(TransitionTable { entries })
    }
}
