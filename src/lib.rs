//! # Stegbot Core
//!
//! Session orchestration engine for a multi-step conversational bot. Each
//! user's progress through the workflow survives process restarts and is
//! processed off the event-ingestion path.
//!
//! ## Architecture
//!
//! Inbound events flow through a bounded task queue into a single worker
//! loop. Every dequeued event is handled by the session manager: restore
//! the persisted snapshot, parse the event into a command against the
//! restored state, fire the matching transition from an immutable table,
//! run its entry effect, persist the result. One worker serializes all
//! firing, so no per-session locking is needed; the price is that a slow
//! entry effect stalls the whole pipeline.
//!
//! ## Module Organization
//!
//! - [`state_machine`] - States, commands, and the declarative transition table
//! - [`session`] - Restore/parse/fire/persist orchestration per event
//! - [`queue`] / [`worker`] - Bounded dispatch pipeline with failure isolation
//! - [`parser`] - Total command resolution with permission demotion
//! - [`docs`] - Usage text from permitted commands
//! - [`store`] - Snapshot serialization and the session store seam
//! - [`events`] - Inbound event union and outbound transport seam
//! - [`workflow`] - Domain action seam, default implementation, encoders
//! - [`engine`] - Composition root with explicit start/stop lifecycle
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stegbot_core::config::EngineConfig;
//! use stegbot_core::engine::SessionEngine;
//! use stegbot_core::events::InboundEvent;
//! use stegbot_core::store::InMemorySessionStore;
//! use stegbot_core::workflow::{EncoderRegistry, StegoWorkflow, XorCarrierEncoder};
//!
//! # async fn example(source: Arc<dyn stegbot_core::events::EventSource>) -> stegbot_core::error::EngineResult<()> {
//! let config = EngineConfig::from_env()?;
//! let encoders = Arc::new(EncoderRegistry::new(vec![Arc::new(XorCarrierEncoder)]));
//! let workflow = Arc::new(StegoWorkflow::new(source, encoders, config.choice_columns));
//! let engine = SessionEngine::new(config, Arc::new(InMemorySessionStore::new()), workflow);
//!
//! engine.start();
//! engine
//!     .ingest(InboundEvent::Text {
//!         session_key: "42".into(),
//!         text: "/start".into(),
//!     })
//!     .await?;
//! engine.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod docs;
pub mod engine;
pub mod error;
pub mod events;
pub mod logging;
pub mod parser;
pub mod queue;
pub mod session;
pub mod state_machine;
pub mod store;
pub mod worker;
pub mod workflow;

pub use config::EngineConfig;
pub use engine::SessionEngine;
pub use error::{EngineError, EngineResult};
pub use events::{Choice, EventSource, InboundEvent};
pub use session::SessionManager;
pub use state_machine::{Command, Effect, SessionState, Transition, TransitionTable};
pub use store::{CallbackCorrelation, InMemorySessionStore, SessionStore, Snapshot};
pub use worker::{ShutdownHandle, ShutdownSignal, WorkerLoop};
pub use workflow::{Encoder, EncoderRegistry, StegoWorkflow, Workflow, XorCarrierEncoder};
