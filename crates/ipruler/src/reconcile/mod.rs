//! Diff desired state against the previous cycle and the live kernel, then
//! apply the difference.
//!
//! One algorithm serves every resource kind. A cycle for one kind runs
//! three phases:
//!
//! - **A, hard-sync purge**: in every hard-synced table, delete live
//!   resources that are not desired.
//! - **B, removed-declaration purge**: delete what the previous cycle
//!   desired and this one no longer does.
//! - **C, converge**: re-list live resources and add every desired one
//!   that is missing.
//!
//! "Already exists" on add and "not found" on delete are expected races
//! and only logged; any other kernel error aborts the cycle as
//! [`Error::Kernel`].

mod route;
mod rule;
mod vlan;

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::kernel::Kernel;
use crate::netlink;

/// A kind of kernel object the reconciler manages.
pub trait Resource: Clone + fmt::Display + Send + Sync + Sized {
    /// Name used in logs and error contexts.
    const KIND: &'static str;

    /// Whether phase A applies to this kind.
    const HARD_SYNC: bool = true;

    /// Equality used for every diff.
    fn matches(&self, other: &Self) -> bool;

    /// Routing table the resource lives in, if any.
    fn table(&self) -> Option<u32>;

    /// Whether phase A may delete this live resource when it is undeclared.
    fn purgeable(&self) -> bool {
        true
    }

    /// List live resources, optionally only those in `table`.
    fn list<K: Kernel>(
        kernel: &K,
        table: Option<u32>,
    ) -> impl Future<Output = netlink::Result<Vec<Self>>> + Send;

    fn add<K: Kernel>(&self, kernel: &K) -> impl Future<Output = netlink::Result<()>> + Send;

    fn delete<K: Kernel>(&self, kernel: &K) -> impl Future<Output = netlink::Result<()>> + Send;

    /// Runs after a successful add. Failure is fatal.
    fn after_add<K: Kernel>(&self, _kernel: &K) -> impl Future<Output = netlink::Result<()>> + Send {
        async { Ok(()) }
    }
}

/// What one kind's reconciliation did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseReport {
    /// Resources added (or that would be, in dry-run mode).
    pub added: usize,
    /// Resources deleted (or that would be, in dry-run mode).
    pub deleted: usize,
    /// Adds answered with "already exists".
    pub already_present: usize,
    /// Deletes answered with "not found".
    pub already_absent: usize,
}

impl PhaseReport {
    /// Check if nothing was changed.
    pub fn is_noop(&self) -> bool {
        self.added == 0 && self.deleted == 0
    }
}

impl fmt::Display for PhaseReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+{} -{}", self.added, self.deleted)
    }
}

/// Runs the three phases for one resource kind.
pub struct Reconciler<'k, K> {
    kernel: &'k K,
    dry_run: bool,
}

fn contains<R: Resource>(set: &[R], item: &R) -> bool {
    set.iter().any(|d| d.matches(item))
}

impl<'k, K: Kernel> Reconciler<'k, K> {
    pub fn new(kernel: &'k K) -> Self {
        Self {
            kernel,
            dry_run: false,
        }
    }

    /// Compute and log changes without making them.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Reconcile one kind.
    pub async fn run<R: Resource>(
        &self,
        desired: &[R],
        previous: Option<&[R]>,
        hard_sync: &BTreeSet<u32>,
    ) -> Result<PhaseReport> {
        let mut report = PhaseReport::default();
        let mut deleted: Vec<R> = Vec::new();

        // Phase A
        if R::HARD_SYNC {
            for &table in hard_sync {
                let live = R::list(self.kernel, Some(table))
                    .await
                    .map_err(|e| Error::kernel(format!("list {}s in table {}", R::KIND, table), e))?;

                let undeclared = live
                    .iter()
                    .filter(|l| l.purgeable() && !contains(desired, *l));
                for res in undeclared {
                    info!(kind = R::KIND, table, resource = %res, "not declared in hard-synced table");
                    self.delete(res, &mut report).await?;
                    deleted.push(res.clone());
                }
            }
        }

        // Phase B
        if let Some(previous) = previous {
            for res in previous.iter().filter(|p| !contains(desired, *p)) {
                if contains(&deleted, res) {
                    continue;
                }
                info!(kind = R::KIND, resource = %res, "no longer declared");
                self.delete(res, &mut report).await?;
            }
        }

        // Phase C
        let live = R::list(self.kernel, None)
            .await
            .map_err(|e| Error::kernel(format!("list {}s", R::KIND), e))?;

        for res in desired {
            if contains(&live, res) {
                debug!(kind = R::KIND, resource = %res, "present");
                continue;
            }
            self.add(res, &mut report).await?;
        }

        Ok(report)
    }

    async fn delete<R: Resource>(&self, res: &R, report: &mut PhaseReport) -> Result<()> {
        if self.dry_run {
            info!(kind = R::KIND, resource = %res, "would delete");
            report.deleted += 1;
            return Ok(());
        }

        match res.delete(self.kernel).await {
            Ok(()) => {
                info!(kind = R::KIND, resource = %res, "deleted");
                report.deleted += 1;
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                info!(kind = R::KIND, resource = %res, "already deleted");
                report.already_absent += 1;
                Ok(())
            }
            Err(e) => Err(Error::kernel(format!("delete {} {}", R::KIND, res), e)),
        }
    }

    async fn add<R: Resource>(&self, res: &R, report: &mut PhaseReport) -> Result<()> {
        if self.dry_run {
            info!(kind = R::KIND, resource = %res, "would add");
            report.added += 1;
            return Ok(());
        }

        match res.add(self.kernel).await {
            Ok(()) => {
                info!(kind = R::KIND, table = ?res.table(), resource = %res, "added");
                report.added += 1;
            }
            Err(e) if e.is_already_exists() => {
                debug!(kind = R::KIND, resource = %res, "already exists");
                report.already_present += 1;
                return Ok(());
            }
            Err(e) => return Err(Error::kernel(format!("add {} {}", R::KIND, res), e)),
        }

        res.after_add(self.kernel)
            .await
            .map_err(|e| Error::kernel(format!("finish {} {}", R::KIND, res), e))
    }
}
