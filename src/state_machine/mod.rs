// State machine module for conversation orchestration
//
// Replaces the fluent, exception-driven machine configuration of typical
// state machine libraries with an explicit immutable transition map and a
// stateless step function evaluated per event.

pub mod commands;
pub mod states;
pub mod transitions;

// Re-export main types for convenient access
pub use commands::Command;
pub use states::SessionState;
pub use transitions::{Effect, Transition, TransitionTable, TransitionTableBuilder};
