//! Timer-driven drivers: background re-apply (api mode) and config-file
//! polling (config-based mode).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use ipruler::{Engine, Kernel, ScriptWriter};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

fn ticker(every: Duration) -> time::Interval {
    let mut ticker = time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Re-apply the last accepted document on every tick, repairing drift.
///
/// Returns only on a fatal error.
pub async fn reapply_loop<K: Kernel>(engine: Arc<Engine<K>>, every: Duration) -> anyhow::Result<()> {
    let mut ticker = ticker(every);
    loop {
        ticker.tick().await;
        match engine.reapply().await {
            Ok(Some(report)) => debug!(%report, "background sync"),
            Ok(None) => debug!("no document received yet"),
            Err(e) if e.is_fatal() => return Err(e).context("background sync"),
            Err(e) => warn!(error = %e, "background sync skipped"),
        }
    }
}

/// Read and apply `path` on every tick.
///
/// Returns only on a fatal error; an unreadable file is one.
pub async fn config_file_loop<K: Kernel>(
    engine: Arc<Engine<K>>,
    path: PathBuf,
    every: Duration,
    writer: Option<ScriptWriter>,
) -> anyhow::Result<()> {
    let mut ticker = ticker(every);
    let mut seen = None;
    loop {
        ticker.tick().await;
        sync_file(&engine, &path, &mut seen, writer.as_ref()).await?;
    }
}

/// One config-file tick. `seen` holds the bytes read on the previous tick.
async fn sync_file<K: Kernel>(
    engine: &Engine<K>,
    path: &Path,
    seen: &mut Option<Vec<u8>>,
    writer: Option<&ScriptWriter>,
) -> anyhow::Result<()> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("read {}", path.display()))?;

    if seen.as_deref() != Some(data.as_slice()) {
        info!(path = %path.display(), "detected changes in config");
        *seen = Some(data.clone());
    }

    match engine.apply(data).await {
        Ok(report) => debug!(%report, "config applied"),
        Err(e) if e.is_fatal() => return Err(e).context("apply config"),
        Err(e) => {
            warn!(error = %e, "config skipped");
            return Ok(());
        }
    }

    if let (Some(writer), Some(config)) = (writer, engine.current().await) {
        if let Err(e) = writer.write(&config, engine.kernel()).await {
            error!(error = %e, "persisting configuration failed");
        }
    }
    Ok(())
}
