//! Out-of-process handlers.
//!
//! The module locator of an entry point names an executable. Each
//! invocation spawns it fresh with:
//!
//! - the symbol as its first argument
//! - a cleared environment replaced by the effective environment
//! - a single JSON line on stdin: `{"event": ..., "context": {...}}`
//!
//! The process settles the invocation by printing one JSON line on stdout:
//!
//! ```text
//! {"succeed": <value>}
//! {"fail": <error>}
//! {"callback": [<error>, <result>]}
//! ```
//!
//! Any other stdout line is logged as handler output. Stderr is inherited.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use lambdev_core::EntryPoint;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::context::{Callback, Context};
use crate::error::{HandlerError, InvokeError, InvokeResult};
use crate::handler::{Handler, handler_fn};
use crate::loader::EntryPointLoader;

/// Suffixes tried when the module locator has no file of its own.
const SCRIPT_EXTENSIONS: [&str; 4] = ["sh", "py", "js", "rb"];

/// Completion line written by a handler process.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Signal {
    Succeed(Value),
    Fail(Value),
    Callback(Vec<Value>),
}

/// Loads entry points as executables, re-resolved on every invocation.
#[derive(Debug, Clone, Default)]
pub struct ProcessLoader;

impl ProcessLoader {
    pub fn new() -> Self {
        Self
    }
}

impl EntryPointLoader for ProcessLoader {
    fn load(&self, entry: &EntryPoint) -> InvokeResult<Handler> {
        let program = resolve_program(&entry.module_path)?;
        let symbol = entry.symbol.clone();
        debug!(program = %program.display(), %symbol, "resolved handler executable");
        Ok(handler_fn(move |event, context, callback| {
            run(program.clone(), symbol.clone(), event, context, callback)
        }))
    }
}

/// Find the executable for a module locator: the path itself, then the
/// path with a known script suffix appended.
fn resolve_program(module_path: &Path) -> InvokeResult<PathBuf> {
    let mut candidates = vec![module_path.to_path_buf()];
    candidates.extend(SCRIPT_EXTENSIONS.iter().map(|ext| {
        let mut name = OsString::from(module_path.as_os_str());
        name.push(".");
        name.push(ext);
        PathBuf::from(name)
    }));

    for candidate in candidates {
        match std::fs::metadata(&candidate) {
            Ok(meta) if meta.is_file() => return Ok(candidate),
            Ok(_) => continue,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(source) => {
                return Err(InvokeError::Load {
                    path: candidate,
                    source,
                });
            }
        }
    }
    Err(InvokeError::ModuleNotFound(module_path.to_path_buf()))
}

async fn run(program: PathBuf, symbol: String, event: Value, context: Context, callback: Callback) {
    let spawned = Command::new(&program)
        .arg(&symbol)
        .env_clear()
        .envs(context.env())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn();
    let mut child = match spawned {
        Ok(child) => child,
        Err(e) => {
            context.fail(format!("failed to spawn {}: {e}", program.display()));
            return;
        }
    };

    if let Some(mut stdin) = child.stdin.take() {
        let envelope = json!({
            "event": event,
            "context": {
                "functionName": context.function_name(),
                "awsRequestId": context.aws_request_id(),
            },
        });
        let mut payload = envelope.to_string();
        payload.push('\n');
        // Written concurrently so a chatty handler can't deadlock on stdout.
        tokio::spawn(async move {
            if let Err(e) = stdin.write_all(payload.as_bytes()).await {
                debug!(error = %e, "handler process closed stdin early");
            }
        });
    }

    if let Some(stdout) = child.stdout.take() {
        let mut lines = BufReader::new(stdout).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => handle_line(&line, &context, &callback),
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "failed to read handler output");
                    break;
                }
            }
        }
    }

    let status = child.wait().await;
    if context.is_settled() {
        return;
    }
    let error = match status {
        Ok(status) => HandlerError::new(format!(
            "handler process exited ({status}) without signaling completion"
        )),
        Err(e) => HandlerError::new(format!("failed to wait for handler process: {e}")),
    };
    context.fail(error);
}

fn handle_line(line: &str, context: &Context, callback: &Callback) {
    match serde_json::from_str::<Signal>(line) {
        Ok(Signal::Succeed(value)) => {
            context.succeed(value);
        }
        Ok(Signal::Fail(error)) => {
            context.fail(HandlerError::from_value(error));
        }
        Ok(Signal::Callback(args)) => {
            let mut args = args.into_iter();
            let error = args.next().unwrap_or_default();
            let result = args.next().unwrap_or_default();
            callback.call_value(error, result);
        }
        Err(_) => info!(function = context.function_name(), "{line}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_lines_parse() {
        assert!(matches!(
            serde_json::from_str::<Signal>(r#"{"succeed":{"a":1}}"#),
            Ok(Signal::Succeed(_))
        ));
        assert!(matches!(
            serde_json::from_str::<Signal>(r#"{"fail":"boom"}"#),
            Ok(Signal::Fail(_))
        ));
        assert!(matches!(
            serde_json::from_str::<Signal>(r#"{"callback":[null,1]}"#),
            Ok(Signal::Callback(args)) if args.len() == 2
        ));
        assert!(matches!(
            serde_json::from_str::<Signal>(r#"{"succeed":null}"#),
            Ok(Signal::Succeed(Value::Null))
        ));
    }

    #[test]
    fn plain_output_is_not_a_signal() {
        assert!(serde_json::from_str::<Signal>("hello from handler").is_err());
        assert!(serde_json::from_str::<Signal>(r#"{"log":"x"}"#).is_err());
    }

    #[test]
    fn resolve_program_tries_script_suffixes() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("handler.sh");
        std::fs::write(&script, "#!/bin/sh\n").unwrap();

        let resolved = resolve_program(&dir.path().join("handler")).unwrap();
        assert_eq!(resolved, script);
    }

    #[test]
    fn resolve_program_missing_module() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            resolve_program(&dir.path().join("nope")),
            Err(InvokeError::ModuleNotFound(_))
        ));
    }

    #[test]
    fn resolve_program_skips_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("handler")).unwrap();
        assert!(resolve_program(&dir.path().join("handler")).is_err());
    }
}
