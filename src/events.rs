//! # Inbound Events and the Event Source Seam
//!
//! Inbound interactions arrive as a tagged union, so the dispatch pipeline
//! stays type-safe end to end and handlers never need runtime downcasting.
//! Outbound primitives are grouped behind the [`EventSource`] trait, which
//! the hosting process implements against its real transport and injects at
//! engine construction time.

use crate::error::EngineResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One inbound interaction from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// A plain text message, possibly a `/command`.
    Text { session_key: String, text: String },
    /// A message carrying a binary attachment (e.g. a carrier image).
    Attachment {
        session_key: String,
        blob: Vec<u8>,
        caption: Option<String>,
    },
    /// The user pressed an interactive element; `data` echoes the payload
    /// that was attached to it when offered.
    Callback {
        session_key: String,
        interaction_id: String,
        data: String,
    },
    /// An auxiliary query (e.g. an inline lookup) outside the conversation
    /// flow. Acknowledged but never fed to the state machine.
    AuxiliaryQuery { session_key: String, query: String },
    /// The transport reported a receive error.
    TransportError { code: i32, message: String },
}

impl InboundEvent {
    /// The session key this event belongs to, if it is session-scoped.
    pub fn session_key(&self) -> Option<&str> {
        match self {
            Self::Text { session_key, .. }
            | Self::Attachment { session_key, .. }
            | Self::Callback { session_key, .. }
            | Self::AuxiliaryQuery { session_key, .. } => Some(session_key),
            Self::TransportError { .. } => None,
        }
    }

    /// Short tag used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Attachment { .. } => "attachment",
            Self::Callback { .. } => "callback",
            Self::AuxiliaryQuery { .. } => "auxiliary_query",
            Self::TransportError { .. } => "transport_error",
        }
    }
}

/// One selectable button in a choice keyboard. `payload` is echoed back
/// verbatim in the resulting [`InboundEvent::Callback`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub label: String,
    pub payload: String,
}

impl Choice {
    pub fn new(label: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            payload: payload.into(),
        }
    }
}

/// Arrange choices into rows of at most `columns` buttons each.
pub fn layout_choices(choices: Vec<Choice>, columns: usize) -> Vec<Vec<Choice>> {
    let columns = columns.max(1);
    let mut rows = Vec::with_capacity(choices.len().div_ceil(columns));
    let mut iter = choices.into_iter().peekable();
    while iter.peek().is_some() {
        rows.push(iter.by_ref().take(columns).collect());
    }
    rows
}

/// Outbound primitives exposed by the transport. Entry effects call these;
/// nothing else in the engine touches the network.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn send_text(&self, destination: &str, text: &str) -> EngineResult<()>;

    async fn send_attachment(
        &self,
        destination: &str,
        blob: &[u8],
        caption: &str,
    ) -> EngineResult<()>;

    /// Acknowledge an interactive element press, optionally with a toast.
    async fn acknowledge_interaction(
        &self,
        interaction_id: &str,
        text: Option<&str>,
    ) -> EngineResult<()>;

    async fn send_typing_indicator(&self, destination: &str) -> EngineResult<()>;

    /// Send a prompt with an inline choice keyboard laid out in rows.
    async fn send_choice_keyboard(
        &self,
        destination: &str,
        prompt: &str,
        keyboard: &[Vec<Choice>],
    ) -> EngineResult<()>;
}
