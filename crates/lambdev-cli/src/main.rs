//! lambdev — run serverless function handlers behind a local HTTP server.
//!
//! # Usage
//!
//! ```text
//! lambdev serve --config serverless.yml --port 5005 --env STAGE=dev
//! ```

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(
    name = "lambdev",
    about = "Local dev server for serverless function handlers",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve every Alexa-Skill and HTTP trigger of a service.
    ///
    /// Skill triggers answer `POST /alexa-skill/<function>`, HTTP triggers
    /// answer `<METHOD> /http/<path>`.
    Serve(commands::serve::ServeArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::from_default_env().add_directive("lambdev=info".parse()?);
    if cli.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    match cli.command {
        Commands::Serve(args) => commands::serve::serve(args).await,
    }
}
