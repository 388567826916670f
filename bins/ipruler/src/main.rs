//! ipruler - keep Linux policy routing in line with a declarative document.

mod http;
mod poll;
mod settings;

use std::future::IntoFuture;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use ipruler::{Engine, EngineOptions, NetlinkKernel, ScriptWriter};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::http::AppState;
use crate::settings::{Mode, Settings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::parse();

    // RUST_LOG wins over LOG_LEVEL
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(settings.log_level.to_lowercase())),
        )
        .init();

    info!(?settings, "starting ipruler");

    let kernel = NetlinkKernel::new().context("open rtnetlink socket")?;
    let engine = Arc::new(Engine::with_options(
        kernel,
        EngineOptions {
            dry_run: settings.dry_run,
        },
    ));
    let (fatal_tx, mut fatal_rx) = mpsc::channel(1);

    let driver = async {
        match settings.mode {
            Mode::Api => serve_api(&settings, Arc::clone(&engine), fatal_tx).await,
            Mode::ConfigBased => {
                let writer = settings
                    .enable_persistence
                    .then(|| ScriptWriter::new(&settings.persist_path, &settings.persist_lock_path));
                poll::config_file_loop(
                    Arc::clone(&engine),
                    settings.config_path.clone(),
                    settings.reload_interval(),
                    writer,
                )
                .await
            }
        }
    };

    let result = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received SIGINT, shutting down");
            Ok(())
        }
        res = driver => res,
        Some(err) = fatal_rx.recv() => Err(err),
    };

    if let Err(e) = &result {
        error!(error = %format!("{:#}", e), "fatal error");
    }
    result
}

/// Serve the HTTP API and re-apply the last document in the background.
async fn serve_api(
    settings: &Settings,
    engine: Arc<Engine<NetlinkKernel>>,
    fatal: mpsc::Sender<anyhow::Error>,
) -> anyhow::Result<()> {
    let addr = settings.listen_addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {}", addr))?;
    info!(%addr, "HTTP API listening");

    let app = http::router(AppState {
        engine: Arc::clone(&engine),
        fatal,
    });

    tokio::select! {
        res = axum::serve(listener, app).into_future() => res.context("HTTP server"),
        res = poll::reapply_loop(engine, settings.reload_interval()) => res,
    }
}
