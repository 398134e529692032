//! # Session Store and Snapshots
//!
//! A session's progress lives outside the process as a serialized snapshot,
//! keyed by session key. The engine reads the snapshot at the start of each
//! event and writes it back at the end; between events the store owns it.
//!
//! Decoding is deliberately lenient: the persisted value may be the full
//! JSON record or just the bare state name (the original deployment stored
//! only the latter), and anything absent or malformed deterministically
//! decodes to the default snapshot. Corruption therefore costs a session its
//! progress, never its availability.

use crate::error::{EngineError, EngineResult};
use crate::state_machine::{Command, SessionState};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ephemeral payload attached to an offered choice and echoed back when the
/// user selects it. Created by an entry effect, consumed by the next
/// matching event, discarded after use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackCorrelation {
    pub id: Uuid,
    pub command: Command,
    /// Auxiliary data, e.g. the chosen algorithm name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl CallbackCorrelation {
    pub fn new(command: Command, data: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            command,
            data,
        }
    }
}

/// Persisted representation of one session between events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Snapshot {
    pub state: SessionState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback: Option<CallbackCorrelation>,
}

impl Snapshot {
    pub fn new(state: SessionState) -> Self {
        Self {
            state,
            callback: None,
        }
    }

    /// Serialize for persistence.
    pub fn encode(&self) -> EngineResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Rebuild a snapshot from whatever the store returned.
    ///
    /// Accepts the JSON record, a bare state name, or garbage; the last
    /// decodes to `Snapshot::default()`. Never fails.
    pub fn decode(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::default();
        };

        if let Ok(snapshot) = serde_json::from_str::<Snapshot>(raw) {
            return snapshot;
        }

        raw.trim()
            .parse::<SessionState>()
            .map(Self::new)
            .unwrap_or_default()
    }
}

/// External key-value store holding session snapshots.
///
/// Get/set only; the engine performs an unsynchronized read-modify-write
/// per event (see the session module docs for the known same-key gap).
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, key: &str) -> EngineResult<Option<String>>;
    async fn set(&self, key: &str, value: String) -> EngineResult<()>;
}

/// In-process store used as the default backend and in tests.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    entries: DashMap<String, String>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, key: &str) -> EngineResult<Option<String>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn set(&self, key: &str, value: String) -> EngineResult<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }
}

/// A store whose reads and writes always fail; test double for the
/// error-logging paths.
#[cfg(test)]
pub(crate) struct FailingSessionStore;

#[cfg(test)]
#[async_trait]
impl SessionStore for FailingSessionStore {
    async fn get(&self, key: &str) -> EngineResult<Option<String>> {
        Err(EngineError::store("get", format!("unreachable for {key}")))
    }

    async fn set(&self, key: &str, _value: String) -> EngineResult<()> {
        Err(EngineError::store("set", format!("unreachable for {key}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_round_trip() {
        let snapshot = Snapshot {
            state: SessionState::AwaitingSource,
            callback: Some(CallbackCorrelation::new(
                Command::ChooseAlgorithm,
                Some("lsb".to_string()),
            )),
        };

        let encoded = snapshot.encode().unwrap();
        assert_eq!(Snapshot::decode(Some(&encoded)), snapshot);
    }

    #[test]
    fn test_decode_bare_state_name() {
        let snapshot = Snapshot::decode(Some("choosing_algorithm"));
        assert_eq!(snapshot.state, SessionState::ChoosingAlgorithm);
        assert!(snapshot.callback.is_none());
    }

    #[test]
    fn test_decode_corrupt_input_yields_default() {
        for raw in [Some("{\"state\": \"no_such\"}"), Some("%%%"), Some(""), None] {
            let snapshot = Snapshot::decode(raw);
            assert_eq!(snapshot, Snapshot::default());
        }
    }

    #[tokio::test]
    async fn test_in_memory_store_round_trip() {
        let store = InMemorySessionStore::new();
        assert!(store.get("42").await.unwrap().is_none());

        store.set("42", "idle".to_string()).await.unwrap();
        assert_eq!(store.get("42").await.unwrap().as_deref(), Some("idle"));
        assert_eq!(store.len(), 1);
    }
}
