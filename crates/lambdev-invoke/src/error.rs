//! Invocation error types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Result type alias for entry point loading.
pub type InvokeResult<T> = Result<T, InvokeError>;

/// Errors raised while resolving an entry point.
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("no handler registered for {0}")]
    NotFound(String),

    #[error("handler module not found: {}", .0.display())]
    ModuleNotFound(PathBuf),

    #[error("failed to inspect handler module {}: {source}", .path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// An error reported by (or on behalf of) a handler.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct HandlerError {
    pub message: String,
    /// The raw error value when the handler reported a structured error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: None,
        }
    }

    /// Interpret an arbitrary JSON error value.
    ///
    /// Strings become the message. Objects use their `message` or
    /// `errorMessage` field and are kept as `detail`.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::String(message) => Self::new(message),
            Value::Object(map) => {
                let message = ["message", "errorMessage"]
                    .iter()
                    .find_map(|k| map.get(*k).and_then(Value::as_str))
                    .map(str::to_string)
                    .unwrap_or_else(|| serde_json::to_string(&map).unwrap_or_default());
                Self {
                    message,
                    detail: Some(Value::Object(map)),
                }
            }
            other => Self::new(other.to_string()),
        }
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<InvokeError> for HandlerError {
    fn from(err: InvokeError) -> Self {
        Self::new(err.to_string())
    }
}
