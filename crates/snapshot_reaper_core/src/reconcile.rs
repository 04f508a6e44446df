use std::collections::HashMap;

use chrono::Utc;
use futures::future;
use futures::stream::{self, StreamExt};
use tokio::sync::watch;

use crate::active_volumes::collect_active_volumes;
use crate::config::ReaperConfig;
use crate::error::{ProviderDeleteError, ReconcileError};
use crate::inventory::collect_snapshot_inventory;
use crate::model::InstanceStateFilter;
use crate::plan::{plan_deletions, DeletionPlan};
use crate::provider::{ComputeProvider, DeleteOutcome};
use crate::summary::RunSummary;

#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    pub states: InstanceStateFilter,
    pub delete_concurrency: usize,
    pub dry_run: bool,
    /// Once the flag reads `true`, no further deletions are issued.
    pub cancel: Option<watch::Receiver<bool>>,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self::from(&ReaperConfig::default())
    }
}

impl From<&ReaperConfig> for ReconcileOptions {
    fn from(config: &ReaperConfig) -> Self {
        Self {
            states: config.states.clone(),
            delete_concurrency: config.delete_concurrency,
            dry_run: config.dry_run,
            cancel: None,
        }
    }
}

impl ReconcileOptions {
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|cancel| *cancel.borrow())
    }
}

/// Runs one collect-then-decide pass against a provider.
pub struct Reconciler<'a, P: ComputeProvider + ?Sized> {
    provider: &'a P,
    options: ReconcileOptions,
}

impl<'a, P: ComputeProvider + ?Sized> Reconciler<'a, P> {
    pub fn new(provider: &'a P, options: ReconcileOptions) -> Self {
        Self { provider, options }
    }

    /// Collects both inventories, then deletes every orphaned snapshot.
    ///
    /// Returns an error only when a collection step fails, in which case no
    /// deletion has been issued. Individual deletion failures are reported in
    /// the summary.
    pub async fn run(&self) -> Result<RunSummary, ReconcileError> {
        let started_at = Utc::now().to_rfc3339();

        let (active, inventory) = tokio::join!(
            collect_active_volumes(self.provider, &self.options.states),
            collect_snapshot_inventory(self.provider),
        );
        let active = active.map_err(ReconcileError::ActiveVolumes);
        let inventory = inventory.map_err(ReconcileError::SnapshotInventory);
        let (active, inventory) = match (active, inventory) {
            (Ok(active), Ok(inventory)) => (active, inventory),
            (Err(error), _) | (_, Err(error)) => {
                tracing::error!(
                    step = error.step(),
                    error = %error,
                    "reconciliation aborted before any deletion"
                );
                return Err(error);
            }
        };

        let plan = plan_deletions(&inventory, &active);
        let mut summary = RunSummary {
            dry_run: self.options.dry_run,
            started_at,
            finished_at: String::new(),
            active_volume_count: active.len(),
            snapshots_examined: inventory.len(),
            planned: plan.eligible.clone(),
            deleted: Vec::new(),
            already_deleted: Vec::new(),
            skipped_active: plan.protected.len(),
            skipped_unattributed: plan.unattributed.len(),
            failed: Vec::new(),
            not_attempted: Vec::new(),
            counts: Default::default(),
            plan_fingerprint: plan.fingerprint.clone(),
        };

        if self.options.dry_run {
            for snapshot_id in &plan.eligible {
                tracing::info!(snapshot_id = %snapshot_id, "dry run: would delete stale snapshot");
            }
        } else {
            self.execute(&plan, &mut summary).await;
        }

        summary.finished_at = Utc::now().to_rfc3339();
        summary.refresh_counts();

        tracing::info!(
            dry_run = summary.dry_run,
            deleted = summary.counts.deleted,
            skipped = summary.counts.skipped,
            failed = summary.counts.failed,
            not_attempted = summary.counts.not_attempted,
            plan_fingerprint = %summary.plan_fingerprint,
            "reconciliation finished"
        );
        if !summary.failed.is_empty() {
            tracing::warn!(failed = ?summary.failed_ids(), "some snapshots could not be deleted");
        }

        Ok(summary)
    }

    async fn execute(&self, plan: &DeletionPlan, summary: &mut RunSummary) {
        let provider = self.provider;
        let options = &self.options;

        let mut results: HashMap<&str, Result<DeleteOutcome, ProviderDeleteError>> =
            stream::iter(plan.eligible.iter())
                .take_while(|_| future::ready(!options.is_cancelled()))
                .map(move |snapshot_id| async move {
                    (
                        snapshot_id.as_str(),
                        provider.delete_snapshot(snapshot_id).await,
                    )
                })
                .buffer_unordered(options.delete_concurrency.max(1))
                .collect()
                .await;

        for snapshot_id in &plan.eligible {
            match results.remove(snapshot_id.as_str()) {
                Some(Ok(DeleteOutcome::Deleted)) => {
                    tracing::info!(snapshot_id = %snapshot_id, "deleted stale snapshot");
                    summary.deleted.push(snapshot_id.clone());
                }
                Some(Ok(DeleteOutcome::AlreadyDeleted)) => {
                    tracing::info!(snapshot_id = %snapshot_id, "stale snapshot already deleted");
                    summary.already_deleted.push(snapshot_id.clone());
                }
                Some(Err(error)) => {
                    tracing::warn!(
                        snapshot_id = %snapshot_id,
                        code = error.code.as_deref().unwrap_or("-"),
                        error = %error.message,
                        "failed to delete stale snapshot"
                    );
                    summary.failed.push(error.into());
                }
                None => summary.not_attempted.push(snapshot_id.clone()),
            }
        }

        if !summary.not_attempted.is_empty() {
            tracing::warn!(
                not_attempted = summary.not_attempted.len(),
                "run cancelled before all deletions were issued"
            );
        }
    }
}
