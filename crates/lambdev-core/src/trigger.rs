//! Trigger descriptor resolution.
//!
//! A function's `events` list is heterogeneous: bare strings (`alexaSkill`),
//! single-key objects (`{ http: "GET /items/{id}" }`) or shapes this tool does
//! not know about. Resolution classifies each entry and silently drops the
//! kinds that have no local endpoint (queues, schedules, ...).

use serde_json::Value;
use tracing::debug;

/// Trigger kinds that have a local endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerKind {
    Skill,
    Http,
}

impl TriggerKind {
    /// Map an event key from the service descriptor to a kind.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "alexaSkill" => Some(TriggerKind::Skill),
            "http" => Some(TriggerKind::Http),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::Skill => "alexaSkill",
            TriggerKind::Http => "http",
        }
    }
}

/// Declared method and resource path of an HTTP trigger.
///
/// Either part may be empty when the declaration is incomplete; the endpoint
/// factory rejects such triggers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpTriggerConfig {
    pub method: String,
    pub path: String,
}

impl HttpTriggerConfig {
    /// Parse the shorthand `"METHOD /path"` or the `{ method, path }` form.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(shorthand) => {
                let mut parts = shorthand.split_whitespace();
                Self {
                    method: parts.next().unwrap_or_default().to_string(),
                    path: parts.next().unwrap_or_default().to_string(),
                }
            }
            Value::Object(map) => {
                let field = |name: &str| {
                    map.get(name)
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .trim()
                        .to_string()
                };
                Self {
                    method: field("method"),
                    path: field("path"),
                }
            }
            _ => Self::default(),
        }
    }
}

/// A classified trigger entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerDescriptor {
    Skill,
    Http(HttpTriggerConfig),
}

impl TriggerDescriptor {
    pub fn kind(&self) -> TriggerKind {
        match self {
            TriggerDescriptor::Skill => TriggerKind::Skill,
            TriggerDescriptor::Http(_) => TriggerKind::Http,
        }
    }

    /// Classify one raw entry. Returns `None` for unrecognized shapes and kinds.
    pub fn classify(raw: &Value) -> Option<Self> {
        let (key, config) = match raw {
            Value::String(key) => (key.as_str(), &Value::Null),
            Value::Object(map) => {
                let (key, config) = map.iter().next()?;
                (key.as_str(), config)
            }
            _ => return None,
        };
        match TriggerKind::from_key(key)? {
            TriggerKind::Skill => Some(TriggerDescriptor::Skill),
            TriggerKind::Http => Some(TriggerDescriptor::Http(HttpTriggerConfig::from_value(
                config,
            ))),
        }
    }
}

/// Resolve raw trigger entries, preserving order and dropping unknown kinds.
pub fn resolve_triggers(raw: &[Value]) -> Vec<TriggerDescriptor> {
    raw.iter()
        .filter_map(|entry| {
            let descriptor = TriggerDescriptor::classify(entry);
            if descriptor.is_none() {
                debug!(%entry, "ignoring unsupported trigger");
            }
            descriptor
        })
        .collect()
}
