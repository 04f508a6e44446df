use crate::error::ProviderQueryError;
use crate::model::Snapshot;
use crate::provider::ComputeProvider;

/// Lists every snapshot owned by the caller. An empty inventory is a valid
/// no-op run.
pub async fn collect_snapshot_inventory(
    provider: &(impl ComputeProvider + ?Sized),
) -> Result<Vec<Snapshot>, ProviderQueryError> {
    let snapshots = provider.list_owned_snapshots().await?;
    let unattributed = snapshots
        .iter()
        .filter(|snapshot| snapshot.source_volume_id().is_none())
        .count();

    tracing::info!(
        snapshots = snapshots.len(),
        unattributed,
        "snapshot inventory collected"
    );

    Ok(snapshots)
}
