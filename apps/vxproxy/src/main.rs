use std::error::Error;

use clap::Parser;
use tracing::info;
use vxproxy_common::GlobalConfigPatch;

mod cli;

use crate::cli::Cli;

#[tokio::main]
async fn main() {
    if let Ok(path) = dotenvy::dotenv() {
        eprintln!("loaded {}", path.display());
    }
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("vxproxy failed: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();

    let mut patch = GlobalConfigPatch::from_env(|name| std::env::var(name).ok())?;
    patch.overlay(cli.into_patch());
    let global = patch.into_config()?;

    let boot = vxproxy_core::bootstrap(global).await?;
    let bind = boot.global.bind_addr();
    let app = boot.core.router();

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!(addr = %bind, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("shutdown complete");
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("vxproxy=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!(signal = "SIGINT", "shutting down"),
        _ = terminate => info!(signal = "SIGTERM", "shutting down"),
    }
}
