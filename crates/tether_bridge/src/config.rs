//! Interpreter settings

use crate::error::BridgeError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Guest runtime settings applied at [`Interpreter::init`](crate::Interpreter::init).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    /// Upper bound on guest heap bytes (unlimited when `None`).
    pub memory_limit: Option<usize>,
    /// Upper bound on guest stack bytes.
    pub max_stack_size: Option<usize>,
    /// Allocation volume that triggers the guest cycle collector.
    pub gc_threshold: Option<usize>,
    /// Guest global exposing the host API (`Host.context()`, `Host.type()`, ...).
    pub namespace: String,
}

impl InterpreterConfig {
    pub fn from_json(text: &str) -> Result<Self, BridgeError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, BridgeError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            memory_limit: None,
            max_stack_size: None,
            gc_threshold: None,
            namespace: "Host".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = InterpreterConfig::from_json(r#"{ "memory_limit": 1048576 }"#).unwrap();
        assert_eq!(config.memory_limit, Some(1 << 20));
        assert_eq!(config.namespace, "Host");
        assert_eq!(config.max_stack_size, None);
    }

    #[test]
    fn test_malformed_json_is_config_error() {
        let err = InterpreterConfig::from_json("{ namespace: ").unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = InterpreterConfig::load(Path::new("/nonexistent/tether.json")).unwrap_err();
        assert!(matches!(err, BridgeError::Io(_)));
    }
}
