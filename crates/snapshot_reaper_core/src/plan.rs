use std::collections::HashSet;

use sha2::{Digest, Sha256};

use crate::active_volumes::ActiveVolumeSet;
use crate::model::Snapshot;

/// Classification of an inventory against an active volume set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionPlan {
    /// Snapshots whose source volume is not attached to any live instance.
    pub eligible: Vec<String>,
    /// Snapshots whose source volume is still attached.
    pub protected: Vec<String>,
    /// Snapshots with no recorded source volume. Never deleted.
    pub unattributed: Vec<String>,
    pub fingerprint: String,
}

/// True when the snapshot names a source volume that is not active.
pub fn is_orphaned(snapshot: &Snapshot, active: &ActiveVolumeSet) -> bool {
    snapshot
        .source_volume_id()
        .is_some_and(|volume_id| !active.contains(volume_id))
}

/// Splits the inventory into eligible, protected and unattributed snapshots.
///
/// Each snapshot is evaluated exactly once against the already materialised
/// active set. Inventory order is preserved within each bucket and a
/// snapshot id listed twice is classified once.
pub fn plan_deletions(snapshots: &[Snapshot], active: &ActiveVolumeSet) -> DeletionPlan {
    let mut plan = DeletionPlan::default();
    let mut seen: HashSet<&str> = HashSet::with_capacity(snapshots.len());

    for snapshot in snapshots {
        if !seen.insert(snapshot.snapshot_id.as_str()) {
            continue;
        }
        tracing::debug!(
            snapshot_id = %snapshot.snapshot_id,
            volume_id = snapshot.volume_id.as_deref().unwrap_or("-"),
            "checking snapshot"
        );

        let bucket = match snapshot.source_volume_id() {
            None => &mut plan.unattributed,
            Some(_) if is_orphaned(snapshot, active) => &mut plan.eligible,
            Some(_) => &mut plan.protected,
        };
        bucket.push(snapshot.snapshot_id.clone());
    }

    plan.fingerprint = plan_fingerprint(&plan.eligible, active);
    plan
}

fn plan_fingerprint(eligible: &[String], active: &ActiveVolumeSet) -> String {
    let mut sorted_eligible: Vec<&str> = eligible.iter().map(String::as_str).collect();
    sorted_eligible.sort_unstable();

    let mut hasher = Sha256::new();
    for snapshot_id in sorted_eligible {
        hasher.update(snapshot_id.as_bytes());
        hasher.update(b"\n");
    }
    hasher.update(b"--\n");
    for volume_id in active.sorted() {
        hasher.update(volume_id.as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}
