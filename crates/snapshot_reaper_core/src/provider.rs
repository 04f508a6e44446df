use async_trait::async_trait;

use crate::error::{ProviderDeleteError, ProviderQueryError};
use crate::model::{Instance, InstanceStateFilter, Snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The provider no longer knows the snapshot. Counts as success.
    AlreadyDeleted,
}

/// The three provider capabilities the reconciler consumes.
///
/// Implementations are constructed once per process and passed explicitly,
/// so tests can substitute in-memory providers.
#[async_trait]
pub trait ComputeProvider: Send + Sync {
    /// Lists instances in any of the given states, with their block-device
    /// mappings. Must return the complete inventory or fail.
    async fn list_instances(
        &self,
        states: &InstanceStateFilter,
    ) -> Result<Vec<Instance>, ProviderQueryError>;

    /// Lists every snapshot owned by the calling account ("self"). Never
    /// snapshots shared from other accounts.
    async fn list_owned_snapshots(&self) -> Result<Vec<Snapshot>, ProviderQueryError>;

    async fn delete_snapshot(&self, snapshot_id: &str)
        -> Result<DeleteOutcome, ProviderDeleteError>;
}
