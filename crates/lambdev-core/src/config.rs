//! Service descriptor parser.
//!
//! Reads a `serverless.yml` (or `serverless.json` / `.toml`) descriptor and
//! produces the [`FunctionDescriptor`]s the dev server binds at startup.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::env::EnvMap;
use crate::error::{ConfigError, ConfigResult};
use crate::trigger::{TriggerDescriptor, resolve_triggers};

/// Plugin whose presence moves handler modules into the bundler output.
const WEBPACK_PLUGIN: &str = "serverless-webpack";
const WEBPACK_OUTPUT_DIR: &str = ".webpack/service";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub service: Option<String>,
    pub plugins: Option<PluginsConfig>,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub functions: IndexMap<String, FunctionConfig>,
    pub custom: Option<CustomConfig>,
}

/// `plugins` is either a plain list or the `{ localPath, modules }` form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PluginsConfig {
    List(Vec<String>),
    Modules {
        #[serde(default)]
        modules: Vec<String>,
    },
}

impl PluginsConfig {
    pub fn contains(&self, name: &str) -> bool {
        let modules = match self {
            PluginsConfig::List(list) => list,
            PluginsConfig::Modules { modules } => modules,
        };
        modules.iter().any(|m| m == name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: Option<String>,
    pub runtime: Option<String>,
    #[serde(default, deserialize_with = "env_values")]
    pub environment: EnvMap,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionConfig {
    pub handler: String,
    #[serde(default, deserialize_with = "env_values")]
    pub environment: EnvMap,
    /// Raw trigger entries, kept untyped until trigger resolution.
    #[serde(default)]
    pub events: Vec<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomConfig {
    #[serde(rename = "localDevStaticFolder")]
    pub local_dev_static_folder: Option<PathBuf>,
}

/// Accepts string, number and boolean values; `null` maps to an empty map.
fn env_values<'de, D>(deserializer: D) -> Result<EnvMap, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let raw: Option<IndexMap<String, Value>> = Option::deserialize(deserializer)?;
    let mut env = EnvMap::new();
    for (key, value) in raw.unwrap_or_default() {
        let value = match value {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Null => String::new(),
            other => {
                return Err(D::Error::custom(format!(
                    "environment variable {key} must be a scalar, got {other}"
                )));
            }
        };
        env.insert(key, value);
    }
    Ok(env)
}

/// Where a function's code lives: the configured `<module>.<symbol>` handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    /// Module locator as written in the descriptor (e.g. `src/handler`).
    pub module: String,
    /// Exported symbol name within the module.
    pub symbol: String,
    /// Module locator resolved against the service directory.
    pub module_path: PathBuf,
}

impl EntryPoint {
    /// Split a handler string at its last `.` and resolve the module against `base_dir`.
    pub fn parse(function: &str, handler: &str, base_dir: &Path) -> ConfigResult<Self> {
        let invalid = || ConfigError::InvalidHandler {
            function: function.to_string(),
            handler: handler.to_string(),
        };
        let (module, symbol) = handler.rsplit_once('.').ok_or_else(invalid)?;
        if module.is_empty() || symbol.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            module: module.to_string(),
            symbol: symbol.to_string(),
            module_path: base_dir.join(module),
        })
    }

    /// Registry key for in-process handlers: `<module>.<symbol>`.
    pub fn key(&self) -> String {
        format!("{}.{}", self.module, self.symbol)
    }
}

/// One configured function, immutable after startup.
#[derive(Debug, Clone)]
pub struct FunctionDescriptor {
    pub name: String,
    pub entry_point: EntryPoint,
    /// Provider environment overlaid with the function's own environment.
    pub environment: EnvMap,
    pub events: Vec<Value>,
}

impl FunctionDescriptor {
    /// Recognized triggers of this function, in declaration order.
    pub fn triggers(&self) -> Vec<TriggerDescriptor> {
        resolve_triggers(&self.events)
    }
}

impl ServiceConfig {
    /// Load a descriptor, picking the parser from the file extension.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yml") | Some("yaml") => Self::from_yaml_str(&content),
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some("toml") => Ok(toml::from_str(&content)?),
            _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Directory handler modules are resolved against.
    pub fn handler_base_dir(&self, service_path: &Path) -> PathBuf {
        let bundled = self
            .plugins
            .as_ref()
            .is_some_and(|p| p.contains(WEBPACK_PLUGIN));
        if bundled {
            service_path.join(WEBPACK_OUTPUT_DIR)
        } else {
            service_path.to_path_buf()
        }
    }

    /// Build descriptors for every configured function, in declaration order.
    ///
    /// A function whose handler string can't be split is logged and skipped;
    /// the rest of the service still loads.
    pub fn functions(&self, service_path: &Path) -> Vec<FunctionDescriptor> {
        let base_dir = self.handler_base_dir(service_path);
        self.functions
            .iter()
            .filter_map(|(name, func)| {
                let entry_point = EntryPoint::parse(name, &func.handler, &base_dir)
                    .map_err(|e| warn!(function = %name, error = %e, "skipping function"))
                    .ok()?;
                let mut environment = self.provider.environment.clone();
                environment.extend(func.environment.clone());
                Some(FunctionDescriptor {
                    name: name.clone(),
                    entry_point,
                    environment,
                    events: func.events.clone(),
                })
            })
            .collect()
    }

    /// Static asset folder from `custom.localDevStaticFolder`, if configured.
    pub fn static_folder(&self, service_path: &Path) -> Option<PathBuf> {
        self.custom
            .as_ref()
            .and_then(|c| c.local_dev_static_folder.as_ref())
            .map(|folder| service_path.join(folder))
    }
}
