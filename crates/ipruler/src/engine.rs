//! The lifecycle coordinator: one engine per process, shared by every
//! driver (HTTP handler, background poll, config-file poll).

use std::fmt;

use bytes::Bytes;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::desired::Config;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::kernel::Kernel;
use crate::reconcile::{PhaseReport, Reconciler};
use crate::resolve::Resolver;

/// Options for applying documents.
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    /// Don't actually make changes, just log what would be done.
    pub dry_run: bool,
}

/// Result of one reconcile cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub vlans: PhaseReport,
    pub routes: PhaseReport,
    pub rules: PhaseReport,
}

impl CycleReport {
    /// Number of adds and deletes made (or planned, in dry-run mode).
    pub fn changes(&self) -> usize {
        [self.vlans, self.routes, self.rules]
            .iter()
            .map(|p| p.added + p.deleted)
            .sum()
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "vlans {}, routes {}, rules {}",
            self.vlans, self.routes, self.rules
        )
    }
}

#[derive(Debug, Default)]
struct State {
    current: Option<Config>,
    previous: Option<Config>,
    last_applied: Option<Bytes>,
}

/// Owns the reconciliation context and serializes cycles.
pub struct Engine<K> {
    kernel: K,
    options: EngineOptions,
    state: Mutex<State>,
}

impl<K: Kernel> Engine<K> {
    pub fn new(kernel: K) -> Self {
        Self::with_options(kernel, EngineOptions::default())
    }

    pub fn with_options(kernel: K, options: EngineOptions) -> Self {
        Self {
            kernel,
            options,
            state: Mutex::new(State::default()),
        }
    }

    /// Get the kernel handle.
    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    /// Run one cycle for `data`.
    ///
    /// Returns [`Error::EmptyDocument`] without touching anything when the
    /// document declares nothing. Parse and resolve failures also leave the
    /// current and previous snapshots as they were.
    pub async fn apply(&self, data: impl Into<Bytes>) -> Result<CycleReport> {
        let mut state = self.state.lock().await;
        self.cycle(&mut state, data.into()).await
    }

    /// Re-run a cycle with the last document that was applied successfully.
    ///
    /// Returns `Ok(None)` when nothing has been applied yet.
    pub async fn reapply(&self) -> Result<Option<CycleReport>> {
        let mut state = self.state.lock().await;
        match state.last_applied.clone() {
            Some(data) => self.cycle(&mut state, data).await.map(Some),
            None => Ok(None),
        }
    }

    /// Snapshot of the current desired state.
    pub async fn current(&self) -> Option<Config> {
        self.state.lock().await.current.clone()
    }

    /// The last document applied successfully.
    pub async fn last_applied(&self) -> Option<Bytes> {
        self.state.lock().await.last_applied.clone()
    }

    #[instrument(level = "debug", skip_all, fields(bytes = data.len()))]
    async fn cycle(&self, state: &mut State, data: Bytes) -> Result<CycleReport> {
        let doc = Document::from_slice(&data)?;
        if doc.is_empty() {
            warn!("{}", Error::EmptyDocument);
            return Err(Error::EmptyDocument);
        }

        let resolver = Resolver::snapshot(&self.kernel).await?;
        let config = Config::build(&doc, &resolver)?;

        let report = self.reconcile(state, &doc, config).await?;
        if report.changes() > 0 {
            info!(%report, dry_run = self.options.dry_run, "cycle applied");
        }

        state.last_applied = Some(data);
        Ok(report)
    }

    async fn reconcile(
        &self,
        state: &mut State,
        doc: &Document,
        config: Config,
    ) -> Result<CycleReport> {
        let reconciler = Reconciler::new(&self.kernel).dry_run(self.options.dry_run);

        // Links first so routes can use them, routes before the rules that
        // point at their tables.
        let vlans = reconciler
            .run(
                &config.vlans,
                state.current.as_ref().map(|p| &p.vlans[..]),
                &config.settings.table_hard_sync,
            )
            .await?;

        // Routes on VLANs created above still carry placeholder indexes.
        let config = if config.has_planned_links() && !self.options.dry_run {
            let resolver = Resolver::snapshot(&self.kernel).await?;
            Config::build(doc, &resolver)?
        } else {
            config
        };

        state.previous = state.current.replace(config);
        let Some(current) = state.current.as_ref() else {
            return Ok(CycleReport::default());
        };
        let previous = state.previous.as_ref();
        let hard_sync = &current.settings.table_hard_sync;

        let routes = reconciler
            .run(&current.routes, previous.map(|p| &p.routes[..]), hard_sync)
            .await?;
        let rules = reconciler
            .run(&current.rules, previous.map(|p| &p.rules[..]), hard_sync)
            .await?;

        Ok(CycleReport {
            vlans,
            routes,
            rules,
        })
    }
}
