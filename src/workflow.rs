//! # Domain Workflow
//!
//! Entry effects delegate their actual work to the [`Workflow`] trait: the
//! engine decides *when* a choice list, upload prompt, decode or encode
//! happens, the workflow decides *how*. [`StegoWorkflow`] is the default
//! implementation, driving the injected event source and an encoder
//! registry. Real embedding algorithms live behind the [`Encoder`] trait;
//! the bundled [`XorCarrierEncoder`] is a reference stub so the workflow is
//! exercisable without one.

use crate::error::{EngineError, EngineResult};
use crate::events::{layout_choices, Choice, EventSource};
use crate::state_machine::Command;
use crate::store::CallbackCorrelation;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

const PROMPT_CHOOSE: &str = "Choose an algorithm:";
const PROMPT_UPLOAD: &str = "Upload the carrier image.";
const LABEL_GUESS: &str = "Guess for me";
const MSG_DECODING: &str = "Decoding...";
const MSG_ENCODING: &str = "Encoding...";
const MSG_NOTHING_EMBEDDED: &str = "Nothing is embedded in this image.";
const MSG_ENCODE_FAILED: &str = "Could not embed the payload into this image.";
const DEFAULT_EMBED_TEXT: &str = "hello from stegbot";

/// Domain actions bound to the machine's entry effects.
#[async_trait]
pub trait Workflow: Send + Sync {
    /// Offer the list of available algorithms as interactive choices.
    async fn send_choice_list(&self, target: &str) -> EngineResult<()>;

    /// Ask the user for the carrier image, acknowledging the interaction
    /// that got us here when there is one.
    async fn request_upload(&self, target: &str, interaction_id: Option<&str>) -> EngineResult<()>;

    /// Extract a hidden payload from the uploaded carrier.
    async fn perform_decode(
        &self,
        target: &str,
        carrier: &[u8],
        algorithm: Option<&str>,
    ) -> EngineResult<()>;

    /// Embed a payload into the uploaded carrier and send the result back.
    async fn perform_encode(
        &self,
        target: &str,
        carrier: &[u8],
        payload: Option<&str>,
    ) -> EngineResult<()>;

    /// Deliver usage text produced by the doc builder.
    async fn send_usage(&self, target: &str, doc: &str) -> EngineResult<()>;
}

/// A steganographic embedding/extraction capability, addressed by name.
pub trait Encoder: Send + Sync {
    fn name(&self) -> &str;
    fn encode(&self, payload: &str, carrier: &[u8]) -> EngineResult<Vec<u8>>;
    fn decode(&self, carrier: &[u8]) -> EngineResult<Option<String>>;
}

/// Immutable set of registered encoders, keyed by name.
pub struct EncoderRegistry {
    encoders: Vec<Arc<dyn Encoder>>,
}

impl EncoderRegistry {
    pub fn new(encoders: Vec<Arc<dyn Encoder>>) -> Self {
        Self { encoders }
    }

    pub fn names(&self) -> Vec<&str> {
        self.encoders.iter().map(|e| e.name()).collect()
    }

    /// Resolve by name, falling back to the first registered encoder when
    /// no name is given or the name is unknown.
    pub fn resolve(&self, name: Option<&str>) -> Option<Arc<dyn Encoder>> {
        match name {
            Some(name) => self
                .encoders
                .iter()
                .find(|e| e.name() == name)
                .or(self.encoders.first())
                .cloned(),
            None => self.encoders.first().cloned(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.encoders.is_empty()
    }
}

/// Default workflow wired to an event source and encoder registry.
pub struct StegoWorkflow {
    source: Arc<dyn EventSource>,
    encoders: Arc<EncoderRegistry>,
    choice_columns: usize,
}

impl StegoWorkflow {
    pub fn new(
        source: Arc<dyn EventSource>,
        encoders: Arc<EncoderRegistry>,
        choice_columns: usize,
    ) -> Self {
        Self {
            source,
            encoders,
            choice_columns,
        }
    }

    fn resolve_encoder(&self, name: Option<&str>) -> EngineResult<Arc<dyn Encoder>> {
        self.encoders
            .resolve(name)
            .ok_or_else(|| EngineError::workflow("resolve_encoder", "no encoders registered"))
    }
}

#[async_trait]
impl Workflow for StegoWorkflow {
    async fn send_choice_list(&self, target: &str) -> EngineResult<()> {
        let mut choices = Vec::new();
        for name in self.encoders.names() {
            let correlation =
                CallbackCorrelation::new(Command::ChooseAlgorithm, Some(name.to_string()));
            choices.push(Choice::new(name, serde_json::to_string(&correlation)?));
        }

        let mut keyboard = layout_choices(choices, self.choice_columns);
        // Trailing full-width row: let the bot pick the algorithm.
        let guess = CallbackCorrelation::new(Command::ChooseAlgorithm, None);
        keyboard.push(vec![Choice::new(LABEL_GUESS, serde_json::to_string(&guess)?)]);

        self.source
            .send_choice_keyboard(target, PROMPT_CHOOSE, &keyboard)
            .await
    }

    async fn request_upload(&self, target: &str, interaction_id: Option<&str>) -> EngineResult<()> {
        if let Some(id) = interaction_id {
            self.source
                .acknowledge_interaction(id, Some(PROMPT_UPLOAD))
                .await?;
        }
        self.source.send_text(target, PROMPT_UPLOAD).await
    }

    async fn perform_decode(
        &self,
        target: &str,
        carrier: &[u8],
        algorithm: Option<&str>,
    ) -> EngineResult<()> {
        self.source.send_text(target, MSG_DECODING).await?;
        self.source.send_typing_indicator(target).await?;

        let encoder = self.resolve_encoder(algorithm)?;
        let decoded = encoder.decode(carrier)?;
        info!(
            algorithm = encoder.name(),
            found = decoded.is_some(),
            "decode finished"
        );

        let text = decoded.as_deref().unwrap_or(MSG_NOTHING_EMBEDDED);
        self.source.send_text(target, text).await
    }

    async fn perform_encode(
        &self,
        target: &str,
        carrier: &[u8],
        payload: Option<&str>,
    ) -> EngineResult<()> {
        self.source.send_text(target, MSG_ENCODING).await?;
        self.source.send_typing_indicator(target).await?;

        let encoder = self.resolve_encoder(None)?;
        let payload = payload.unwrap_or(DEFAULT_EMBED_TEXT);

        match encoder.encode(payload, carrier) {
            Ok(output) => {
                self.source
                    .send_attachment(target, &output, payload)
                    .await
            }
            Err(e) => {
                // An unembeddable carrier is user-visible feedback, not an
                // engine failure.
                info!(algorithm = encoder.name(), error = %e, "encode rejected carrier");
                self.source.send_text(target, MSG_ENCODE_FAILED).await
            }
        }
    }

    async fn send_usage(&self, target: &str, doc: &str) -> EngineResult<()> {
        self.source.send_text(target, doc).await
    }
}

/// Reference encoder: appends the payload XOR a fixed key after a marker.
/// Stands in for real embedding algorithms in tests and demos.
pub struct XorCarrierEncoder;

impl XorCarrierEncoder {
    const MARKER: &'static [u8] = b"\x00STG1\x00";
    const KEY: u8 = 0x5A;
}

impl Encoder for XorCarrierEncoder {
    fn name(&self) -> &str {
        "xor_carrier"
    }

    fn encode(&self, payload: &str, carrier: &[u8]) -> EngineResult<Vec<u8>> {
        if carrier.is_empty() {
            return Err(EngineError::encoder(self.name(), "carrier is empty"));
        }
        let mut output = Vec::with_capacity(carrier.len() + Self::MARKER.len() + payload.len());
        output.extend_from_slice(carrier);
        output.extend_from_slice(Self::MARKER);
        output.extend(payload.bytes().map(|b| b ^ Self::KEY));
        Ok(output)
    }

    fn decode(&self, carrier: &[u8]) -> EngineResult<Option<String>> {
        let Some(at) = carrier
            .windows(Self::MARKER.len())
            .position(|window| window == Self::MARKER)
        else {
            return Ok(None);
        };

        let hidden: Vec<u8> = carrier[at + Self::MARKER.len()..]
            .iter()
            .map(|b| b ^ Self::KEY)
            .collect();
        match String::from_utf8(hidden) {
            Ok(payload) if !payload.is_empty() => Ok(Some(payload)),
            _ => Ok(None),
        }
    }
}
