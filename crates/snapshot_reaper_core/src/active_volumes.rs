use std::collections::HashSet;

use crate::error::ProviderQueryError;
use crate::model::{Instance, InstanceState, InstanceStateFilter};
use crate::provider::ComputeProvider;

/// Volume ids attached to live instances, recomputed on every run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveVolumeSet {
    volume_ids: HashSet<String>,
}

impl ActiveVolumeSet {
    /// Instances in an unrecognised state keep their volumes: a state that
    /// cannot be read is not evidence that the instance is gone.
    pub fn from_instances<'a>(
        instances: impl IntoIterator<Item = &'a Instance>,
        states: &InstanceStateFilter,
    ) -> Self {
        let volume_ids = instances
            .into_iter()
            .filter(|instance| is_live(instance, states))
            .flat_map(Instance::attached_volume_ids)
            .map(str::to_string)
            .collect();
        Self { volume_ids }
    }

    pub fn contains(&self, volume_id: &str) -> bool {
        self.volume_ids.contains(volume_id)
    }

    pub fn len(&self) -> usize {
        self.volume_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.volume_ids.is_empty()
    }

    pub fn sorted(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.volume_ids.iter().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl<S: Into<String>> FromIterator<S> for ActiveVolumeSet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self {
            volume_ids: iter.into_iter().map(Into::into).collect(),
        }
    }
}

fn is_live(instance: &Instance, states: &InstanceStateFilter) -> bool {
    if let InstanceState::Unknown(raw) = &instance.state {
        tracing::warn!(
            instance_id = instance.instance_id.as_deref().unwrap_or("-"),
            state = %raw,
            "instance state unknown, keeping its volumes active"
        );
        return true;
    }
    states.contains(&instance.state)
}

/// Collects the volumes attached to instances in `states`.
///
/// The provider is asked to filter by state and every returned instance is
/// checked again here, so a provider that ignores the filter cannot leak
/// terminated instances into the active set. Instances whose state is unknown
/// are kept.
pub async fn collect_active_volumes(
    provider: &(impl ComputeProvider + ?Sized),
    states: &InstanceStateFilter,
) -> Result<ActiveVolumeSet, ProviderQueryError> {
    let instances = provider.list_instances(states).await?;
    let active = ActiveVolumeSet::from_instances(&instances, states);

    tracing::info!(
        instances = instances.len(),
        active_volumes = active.len(),
        states = ?states.names(),
        "active volumes collected"
    );
    tracing::debug!(volume_ids = ?active.sorted(), "active volume ids");

    Ok(active)
}
