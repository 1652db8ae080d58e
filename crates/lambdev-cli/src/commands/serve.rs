//! `lambdev serve` — load a service descriptor and serve its triggers.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Args;
use lambdev_core::{EnvMap, EnvironmentResolver, ServiceConfig};
use lambdev_invoke::{Executor, ProcessLoader};
use lambdev_trigger::DevServer;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Args)]
pub struct ServeArgs {
    /// Service descriptor (`.yml`, `.yaml`, `.json` or `.toml`).
    #[arg(short, long, default_value = "serverless.yml")]
    config: PathBuf,

    /// Port to listen on.
    #[arg(short, long, default_value_t = 5005)]
    port: u16,

    /// Environment override for every handler. Repeatable.
    #[arg(short, long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
    env: Vec<(String, String)>,

    /// Folder served under `/static`; overrides `custom.localDevStaticFolder`.
    #[arg(long)]
    static_folder: Option<PathBuf>,
}

/// Run the `lambdev serve` command until Ctrl-C.
pub async fn serve(args: ServeArgs) -> Result<()> {
    let config = ServiceConfig::from_file(&args.config)
        .with_context(|| format!("failed to load {}", args.config.display()))?;
    let service_dir = service_dir(&args.config);
    let functions = config.functions(service_dir);
    info!(
        service = config.service.as_deref().unwrap_or("unnamed"),
        functions = functions.len(),
        "loaded service descriptor"
    );

    let executor = Arc::new(executor());

    let caller: EnvMap = args.env.into_iter().collect();
    let env = EnvironmentResolver::from_process(caller)
        .context("failed to capture process environment")?;

    let static_folder = args
        .static_folder
        .or_else(|| config.static_folder(service_dir));

    let server = DevServer::new(functions, executor, Arc::new(env)).with_static_folder(static_folder);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown signal received");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                warn!(error = %e, "failed to install Ctrl-C handler");
                // Keep the sender alive so the server isn't told to stop.
                std::future::pending::<()>().await;
            }
        }
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    server.serve(addr, shutdown_rx).await
}

/// Every handler runs as an executable resolved from its module path.
fn executor() -> Executor {
    Executor::new(Arc::new(ProcessLoader::new()))
}

/// Directory handler paths and the static folder are resolved against.
fn service_dir(config: &Path) -> &Path {
    config
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
}

fn parse_env_pair(raw: &str) -> Result<(String, String)> {
    let Some((key, value)) = raw.split_once('=') else {
        bail!("expected KEY=VALUE, got {raw:?}");
    };
    if key.trim().is_empty() {
        bail!("empty variable name in {raw:?}");
    }
    Ok((key.trim().to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_pairs() {
        assert_eq!(
            parse_env_pair("STAGE=dev").unwrap(),
            ("STAGE".to_string(), "dev".to_string())
        );
        assert_eq!(
            parse_env_pair("EMPTY=").unwrap(),
            ("EMPTY".to_string(), String::new())
        );
        assert_eq!(
            parse_env_pair("URL=a=b").unwrap(),
            ("URL".to_string(), "a=b".to_string())
        );
        assert!(parse_env_pair("=x").is_err());
        assert!(parse_env_pair("novalue").is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn executor_runs_executable_handlers() {
        use std::os::unix::fs::PermissionsExt;

        use lambdev_invoke::Outcome;
        use serde_json::json;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("handler.sh");
        std::fs::write(
            &script,
            "#!/bin/sh\nread -r _\nprintf '{\"succeed\":\"%s\"}\\n' \"$1\"\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let config =
            ServiceConfig::from_yaml_str("functions:\n  Hello:\n    handler: handler.hello\n").unwrap();
        let functions = config.functions(dir.path());
        let outcome = executor()
            .invoke(&functions[0], json!({}), EnvMap::new())
            .await;
        assert_eq!(outcome, Outcome::Success(json!("hello")));
    }

    #[test]
    fn service_dir_of_bare_file_is_cwd() {
        assert_eq!(service_dir(Path::new("serverless.yml")), Path::new("."));
        assert_eq!(
            service_dir(Path::new("svc/serverless.yml")),
            Path::new("svc")
        );
    }
}
