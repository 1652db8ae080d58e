//! lambdev-core — configuration and resolution shared by the lambdev crates.
//!
//! - [`config`]: service descriptor parsing into [`FunctionDescriptor`]s
//! - [`trigger`]: classification of raw trigger entries
//! - [`env`]: layered per-invocation environment

pub mod config;
pub mod env;
pub mod error;
pub mod trigger;

pub use config::{EntryPoint, FunctionDescriptor, ServiceConfig};
pub use env::{EnvMap, EnvironmentResolver};
pub use error::{ConfigError, ConfigResult};
pub use trigger::{HttpTriggerConfig, TriggerDescriptor, TriggerKind, resolve_triggers};
