//! Effective environment resolution.
//!
//! Every invocation sees a freshly layered environment, lowest precedence
//! first:
//!
//! 1. the process environment captured at startup
//! 2. the function's declared environment (plus the `IS_LOCAL` marker)
//! 3. caller overrides (`--env KEY=VALUE`)
//! 4. local override files, re-read on every invocation
//!
//! The result is handed to the handler explicitly; the process environment
//! is never modified.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::warn;

pub type EnvMap = HashMap<String, String>;

/// Marker variable every local invocation observes.
pub const LOCAL_MARKER: &str = "IS_LOCAL";
pub const LOCAL_MARKER_VALUE: &str = "true";

/// Local override files, lowest priority first.
pub const LOCAL_ENV_FILES: [&str; 3] = [".env.local", ".local.env", "local.env"];

/// Merge the four tiers. Later tiers overwrite same-named keys.
pub fn layer(base: &EnvMap, declared: &EnvMap, caller: &EnvMap, files: &[EnvMap]) -> EnvMap {
    let mut env = base.clone();
    env.extend(declared.iter().map(|(k, v)| (k.clone(), v.clone())));
    env.insert(LOCAL_MARKER.to_string(), LOCAL_MARKER_VALUE.to_string());
    env.extend(caller.iter().map(|(k, v)| (k.clone(), v.clone())));
    for file in files {
        env.extend(file.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    env
}

/// Parse newline-delimited `KEY=VALUE` pairs.
///
/// Blank lines and `#` comments are skipped, an `export ` prefix is allowed,
/// and matching quotes are stripped (`\n` is expanded inside double quotes).
/// Malformed lines are skipped with a warning.
pub fn parse_env_file(content: &str) -> EnvMap {
    let mut env = EnvMap::new();
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            warn!(line = idx + 1, "skipping env line without '='");
            continue;
        };
        let key = key.trim();
        if key.is_empty() || key.contains(char::is_whitespace) {
            warn!(line = idx + 1, key, "skipping env line with invalid key");
            continue;
        }
        env.insert(key.to_string(), unquote(value.trim()));
    }
    env
}

fn unquote(value: &str) -> String {
    let quoted = |q: char| value.len() >= 2 && value.starts_with(q) && value.ends_with(q);
    if quoted('"') {
        value[1..value.len() - 1].replace("\\n", "\n")
    } else if quoted('\'') {
        value[1..value.len() - 1].to_string()
    } else {
        value.to_string()
    }
}

/// Load whichever local override files exist in `dir`, lowest priority first.
///
/// Missing files contribute nothing. Unreadable files are logged and skipped.
pub fn load_local_env_files(dir: &Path) -> Vec<EnvMap> {
    LOCAL_ENV_FILES
        .iter()
        .filter_map(|name| {
            let path = dir.join(name);
            match std::fs::read_to_string(&path) {
                Ok(content) => Some(parse_env_file(&content)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to read env file");
                    None
                }
            }
        })
        .collect()
}

/// Snapshot of the current process environment. Non-unicode entries are dropped.
pub fn process_snapshot() -> EnvMap {
    std::env::vars_os()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
        .collect()
}

/// Computes the effective environment for each invocation.
#[derive(Debug, Clone)]
pub struct EnvironmentResolver {
    snapshot: EnvMap,
    caller: EnvMap,
    working_dir: PathBuf,
}

impl EnvironmentResolver {
    pub fn new(snapshot: EnvMap, caller: EnvMap, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            snapshot,
            caller,
            working_dir: working_dir.into(),
        }
    }

    /// Capture the process environment and the current directory now.
    pub fn from_process(caller: EnvMap) -> std::io::Result<Self> {
        Ok(Self::new(process_snapshot(), caller, std::env::current_dir()?))
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Layer all tiers for a function with the given declared environment.
    pub fn resolve(&self, declared: &EnvMap) -> EnvMap {
        let files = load_local_env_files(&self.working_dir);
        layer(&self.snapshot, declared, &self.caller, &files)
    }
}
