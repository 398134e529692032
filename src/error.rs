//! # Engine Error Types
//!
//! Structured error handling for the session orchestration engine using
//! thiserror instead of `Box<dyn Error>` patterns.
//!
//! Most "failures" in this engine (unrecognized commands, missing
//! transitions, corrupt snapshots) are normal control flow and never
//! surface through these types. `EngineError` covers the genuinely
//! fallible edges: the session store, outbound transport calls, domain
//! workflow actions, and queue lifecycle.

use thiserror::Error;

/// Error types for session orchestration operations
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Session store error: {operation}: {message}")]
    Store { operation: String, message: String },

    #[error("Workflow action failed: {action}: {message}")]
    Workflow { action: String, message: String },

    #[error("Transport send failed: {primitive}: {message}")]
    Transport { primitive: String, message: String },

    #[error("Encoder error: {algorithm}: {message}")]
    Encoder { algorithm: String, message: String },

    #[error("Task queue is closed")]
    QueueClosed,

    #[error("Task queue is full")]
    QueueFull,

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Configuration error: {setting}: {message}")]
    Configuration { setting: String, message: String },

    #[error("Internal engine error: {message}")]
    Internal { message: String },
}

impl EngineError {
    /// Create a session store error
    pub fn store(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Store {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a workflow action error
    pub fn workflow(action: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Workflow {
            action: action.into(),
            message: message.into(),
        }
    }

    /// Create a transport error
    pub fn transport(primitive: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            primitive: primitive.into(),
            message: message.into(),
        }
    }

    /// Create an encoder error
    pub fn encoder(algorithm: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Encoder {
            algorithm: algorithm.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(setting: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            setting: setting.into(),
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let store_err = EngineError::store("get", "connection refused");
        assert!(matches!(store_err, EngineError::Store { .. }));

        let wf_err = EngineError::workflow("perform_decode", "download failed");
        assert!(matches!(wf_err, EngineError::Workflow { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = EngineError::store("set", "timeout");
        let display = format!("{err}");
        assert!(display.contains("Session store error"));
        assert!(display.contains("set"));
        assert!(display.contains("timeout"));
    }

    #[test]
    fn test_serde_json_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{broken").unwrap_err();
        let engine_err: EngineError = json_err.into();
        assert!(matches!(engine_err, EngineError::Serialization { .. }));
    }
}
