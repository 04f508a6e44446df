use serde::{Deserialize, Serialize};

use crate::error::ProviderDeleteError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeleteFailure {
    pub snapshot_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub message: String,
}

impl From<ProviderDeleteError> for DeleteFailure {
    fn from(error: ProviderDeleteError) -> Self {
        Self {
            snapshot_id: error.snapshot_id,
            code: error.code,
            message: error.message,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SummaryCounts {
    pub deleted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub not_attempted: usize,
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunSummary {
    pub dry_run: bool,
    pub started_at: String,
    pub finished_at: String,
    pub active_volume_count: usize,
    pub snapshots_examined: usize,
    /// Eligible snapshots, in inventory order.
    pub planned: Vec<String>,
    pub deleted: Vec<String>,
    pub already_deleted: Vec<String>,
    pub skipped_active: usize,
    pub skipped_unattributed: usize,
    pub failed: Vec<DeleteFailure>,
    /// Eligible snapshots left alone because the run was cancelled.
    pub not_attempted: Vec<String>,
    pub counts: SummaryCounts,
    pub plan_fingerprint: String,
}

impl RunSummary {
    pub fn deleted_count(&self) -> usize {
        self.deleted.len() + self.already_deleted.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped_active + self.skipped_unattributed
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn failed_ids(&self) -> Vec<&str> {
        self.failed
            .iter()
            .map(|failure| failure.snapshot_id.as_str())
            .collect()
    }

    /// Recomputes `counts` from the id lists.
    pub(crate) fn refresh_counts(&mut self) {
        self.counts = SummaryCounts {
            deleted: self.deleted_count(),
            skipped: self.skipped_count(),
            failed: self.failed_count(),
            not_attempted: self.not_attempted.len(),
        };
    }

    /// One-line human-readable summary.
    pub fn headline(&self) -> String {
        if self.dry_run {
            return format!(
                "Dry run: {} of {} snapshot(s) would be deleted, {} skipped",
                self.planned.len(),
                self.snapshots_examined,
                self.skipped_count(),
            );
        }

        let mut line = format!(
            "Deleted {} of {} snapshot(s), skipped {}, failed {}",
            self.deleted_count(),
            self.snapshots_examined,
            self.skipped_count(),
            self.failed_count(),
        );
        if !self.failed.is_empty() {
            line.push_str(&format!(" ({})", self.failed_ids().join(", ")));
        }
        if !self.not_attempted.is_empty() {
            line.push_str(&format!(
                "; {} not attempted before cancellation",
                self.not_attempted.len()
            ));
        }
        line
    }
}
