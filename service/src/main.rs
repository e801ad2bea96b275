#![deny(
    clippy::expect_used,
    clippy::panic,
    clippy::print_stdout,
    clippy::todo,
    clippy::unimplemented,
    clippy::unwrap_used
)]

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use clap::Parser;
use helmfront::{
    api,
    app::{build_app, API_PREFIX},
    config::Config,
    HeaderPipeline,
};
use tracing_subscriber::EnvFilter;

/// Serve static files and the delegated API behind the security header pipeline.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to the YAML configuration file (missing file falls back to defaults).
    #[arg(long, default_value = "config.yaml")]
    config: String,
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl-C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();

    // Load and validate configuration first (fail-fast)
    let config = Config::load_from(&args.config)
        .with_context(|| format!("loading configuration from {}", args.config))?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.logging.level)?)
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "helmfront starting up");

    let pipeline = HeaderPipeline::from_config(&config.security_headers)?;
    if pipeline.is_empty() {
        tracing::info!("Security headers disabled");
    } else {
        for step in pipeline.steps() {
            tracing::info!(step = step.name(), condition = ?step.condition(), "header step enabled");
        }
    }

    if config.hsts_conflict() {
        tracing::warn!(
            "hosting.hsts_disabled is set while the pipeline forces Strict-Transport-Security; \
             the host-level flag does not change response headers"
        );
    }

    let api = api::router(&config.cors);
    let app = build_app(&config.static_files, api, Arc::new(pipeline));

    let host: std::net::IpAddr = config.server.host.parse()?;
    let addr = SocketAddr::new(host, config.server.port);
    tracing::info!(
        public_dir = %config.static_files.public_dir,
        index_file = %config.static_files.index_file,
        api_prefix = API_PREFIX,
        "Your app is listening on http://{}",
        addr
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
