//! Provider-agnostic orphan snapshot reconciliation.
//!
//! This crate owns the collect-then-decide algorithm: materialise the set of
//! volumes attached to live instances, list the caller's snapshots, and delete
//! every snapshot whose source volume is no longer in that set. It
//! intentionally excludes AWS SDK and Lambda runtime concerns, which live in
//! `snapshot_reaper_lambda`.

pub mod active_volumes;
pub mod config;
pub mod error;
pub mod inventory;
pub mod model;
pub mod plan;
pub mod provider;
pub mod reconcile;
pub mod summary;

pub use active_volumes::{collect_active_volumes, ActiveVolumeSet};
pub use config::ReaperConfig;
pub use error::{ConfigError, ProviderDeleteError, ProviderQueryError, ReconcileError};
pub use inventory::collect_snapshot_inventory;
pub use model::{BlockDeviceMapping, Instance, InstanceState, InstanceStateFilter, Snapshot};
pub use plan::{plan_deletions, DeletionPlan};
pub use provider::{ComputeProvider, DeleteOutcome};
pub use reconcile::{ReconcileOptions, Reconciler};
pub use summary::{DeleteFailure, RunSummary, SummaryCounts};
