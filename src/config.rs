//! Engine configuration with environment variable overrides.

use crate::error::{EngineError, EngineResult};

/// Tunables for the session orchestration engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Capacity of the bounded task queue; producers suspend when full.
    pub queue_capacity: usize,
    /// Leading character stripped from the first token of text commands.
    pub command_prefix: char,
    /// Number of columns in the choice keyboard layout.
    pub choice_columns: usize,
    /// Prefix prepended to session keys in the session store.
    pub session_namespace: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            command_prefix: '/',
            choice_columns: 2,
            session_namespace: "session".to_string(),
        }
    }
}

impl EngineConfig {
    /// Build a configuration from defaults plus `STEGBOT_*` environment
    /// overrides.
    pub fn from_env() -> EngineResult<Self> {
        let mut config = Self::default();

        if let Ok(capacity) = std::env::var("STEGBOT_QUEUE_CAPACITY") {
            config.queue_capacity = capacity.parse().map_err(|e| {
                EngineError::configuration("queue_capacity", format!("invalid value: {e}"))
            })?;
            if config.queue_capacity == 0 {
                return Err(EngineError::configuration(
                    "queue_capacity",
                    "must be at least 1",
                ));
            }
        }

        if let Ok(prefix) = std::env::var("STEGBOT_COMMAND_PREFIX") {
            let mut chars = prefix.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => config.command_prefix = c,
                _ => {
                    return Err(EngineError::configuration(
                        "command_prefix",
                        "must be a single character",
                    ))
                }
            }
        }

        if let Ok(columns) = std::env::var("STEGBOT_CHOICE_COLUMNS") {
            config.choice_columns = columns.parse().map_err(|e| {
                EngineError::configuration("choice_columns", format!("invalid value: {e}"))
            })?;
        }

        if let Ok(namespace) = std::env::var("STEGBOT_SESSION_NAMESPACE") {
            config.session_namespace = namespace;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.queue_capacity, 64);
        assert_eq!(config.command_prefix, '/');
        assert_eq!(config.choice_columns, 2);
        assert_eq!(config.session_namespace, "session");
    }
}
