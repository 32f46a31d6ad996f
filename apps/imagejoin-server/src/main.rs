//! imagejoin Server
//!
//! Serves a single-page browser tool that merges uploaded JPEG and PNG
//! images into one PDF:
//!
//! - Upload, reorder and clear images per browser session
//! - Convert with optional title metadata and compression
//! - Download the result as `<filename>.pdf`
//!
//! ## Architecture
//!
//! Sessions live in memory and are addressed by an id in the URL path.
//! All PDF work happens in `imagejoin-core` on the blocking thread pool.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod error;
mod page;
mod state;

use state::AppState;

/// Command-line arguments for the imagejoin server
#[derive(Parser, Debug)]
#[command(name = "imagejoin-server")]
#[command(about = "Browser tool for merging images into a single PDF")]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "IMAGEJOIN_PORT", default_value = "3000")]
    port: u16,

    /// Host address to bind to
    #[arg(long, env = "IMAGEJOIN_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Maximum upload request size in megabytes
    #[arg(long, env = "IMAGEJOIN_MAX_UPLOAD_MB", default_value = "200")]
    max_upload_mb: usize,

    /// Minutes of inactivity before a session is discarded
    #[arg(long, env = "IMAGEJOIN_SESSION_IDLE_MINUTES", default_value = "60")]
    session_idle_minutes: u64,

    /// Maximum number of live sessions; the least recently used is dropped first
    #[arg(long, env = "IMAGEJOIN_MAX_SESSIONS", default_value = "1000")]
    max_sessions: usize,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// Shared state sized from the command line
    fn app_state(&self) -> anyhow::Result<AppState> {
        let idle_secs = self
            .session_idle_minutes
            .checked_mul(60)
            .context("--session-idle-minutes is too large")?;
        let max_upload_bytes = self
            .max_upload_mb
            .checked_mul(1024 * 1024)
            .context("--max-upload-mb is too large")?;
        anyhow::ensure!(self.max_sessions > 0, "--max-sessions must be at least 1");

        Ok(AppState::new(
            Duration::from_secs(idle_secs),
            self.max_sessions,
            max_upload_bytes,
        ))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting imagejoin server on {}:{}", args.host, args.port);

    let app = api::router(args.app_state()?);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);
    info!("Upload limit: {} MB", args.max_upload_mb);
    info!(
        "Session idle timeout: {} min, at most {} sessions",
        args.session_idle_minutes, args.max_sessions
    );

    axum::serve(listener, app).await?;

    Ok(())
}
