#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use snapshot_reaper_core::{
    BlockDeviceMapping, ComputeProvider, DeleteOutcome, Instance, InstanceState,
    InstanceStateFilter, ProviderDeleteError, ProviderQueryError, Snapshot,
};
use tokio::sync::watch;

pub fn instance(id: &str, state: InstanceState, volumes: &[&str]) -> Instance {
    Instance {
        instance_id: Some(id.to_string()),
        state,
        block_device_mappings: volumes
            .iter()
            .enumerate()
            .map(|(index, volume_id)| BlockDeviceMapping {
                device_name: Some(format!("/dev/sd{}", (b'a' + index as u8) as char)),
                volume_id: Some(volume_id.to_string()),
            })
            .collect(),
    }
}

pub fn snapshot(id: &str, volume_id: Option<&str>) -> Snapshot {
    Snapshot::new(id, volume_id)
}

/// In-memory provider that removes snapshots on delete, so repeated runs
/// observe the effects of earlier ones.
#[derive(Default)]
pub struct InMemoryProvider {
    instances: Vec<Instance>,
    snapshots: Mutex<Vec<Snapshot>>,
    delete_failures: HashMap<String, ProviderDeleteError>,
    instance_query_failure: Option<String>,
    snapshot_query_failure: Option<String>,
    honours_state_filter: bool,
    delete_delay: Option<Duration>,
    cancel_after_deletes: Option<(usize, watch::Sender<bool>)>,
    delete_calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl InMemoryProvider {
    pub fn new(instances: Vec<Instance>, snapshots: Vec<Snapshot>) -> Self {
        Self {
            instances,
            snapshots: Mutex::new(snapshots),
            honours_state_filter: true,
            ..Self::default()
        }
    }

    pub fn failing_delete(mut self, snapshot_id: &str, code: &str, message: &str) -> Self {
        self.delete_failures.insert(
            snapshot_id.to_string(),
            ProviderDeleteError::new(snapshot_id, message).with_code(code),
        );
        self
    }

    pub fn failing_instance_query(mut self, message: &str) -> Self {
        self.instance_query_failure = Some(message.to_string());
        self
    }

    pub fn failing_snapshot_query(mut self, message: &str) -> Self {
        self.snapshot_query_failure = Some(message.to_string());
        self
    }

    pub fn ignoring_state_filter(mut self) -> Self {
        self.honours_state_filter = false;
        self
    }

    pub fn with_delete_delay(mut self, delay: Duration) -> Self {
        self.delete_delay = Some(delay);
        self
    }

    pub fn cancelling_after(mut self, deletes: usize, cancel: watch::Sender<bool>) -> Self {
        self.cancel_after_deletes = Some((deletes, cancel));
        self
    }

    pub fn delete_calls(&self) -> Vec<String> {
        self.delete_calls.lock().expect("poisoned mutex").clone()
    }

    pub fn remaining_snapshot_ids(&self) -> Vec<String> {
        self.snapshots
            .lock()
            .expect("poisoned mutex")
            .iter()
            .map(|snapshot| snapshot.snapshot_id.clone())
            .collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ComputeProvider for InMemoryProvider {
    async fn list_instances(
        &self,
        states: &InstanceStateFilter,
    ) -> Result<Vec<Instance>, ProviderQueryError> {
        if let Some(message) = &self.instance_query_failure {
            return Err(ProviderQueryError::new("DescribeInstances", message.clone()));
        }

        Ok(self
            .instances
            .iter()
            .filter(|instance| !self.honours_state_filter || states.contains(&instance.state))
            .cloned()
            .collect())
    }

    async fn list_owned_snapshots(&self) -> Result<Vec<Snapshot>, ProviderQueryError> {
        if let Some(message) = &self.snapshot_query_failure {
            return Err(ProviderQueryError::new("DescribeSnapshots", message.clone()));
        }

        Ok(self.snapshots.lock().expect("poisoned mutex").clone())
    }

    async fn delete_snapshot(
        &self,
        snapshot_id: &str,
    ) -> Result<DeleteOutcome, ProviderDeleteError> {
        let calls = {
            let mut calls = self.delete_calls.lock().expect("poisoned mutex");
            calls.push(snapshot_id.to_string());
            calls.len()
        };

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if let Some(delay) = self.delete_delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some((threshold, cancel)) = &self.cancel_after_deletes {
            if calls >= *threshold {
                cancel.send_replace(true);
            }
        }

        if let Some(error) = self.delete_failures.get(snapshot_id) {
            return Err(error.clone());
        }

        let mut snapshots = self.snapshots.lock().expect("poisoned mutex");
        let before = snapshots.len();
        snapshots.retain(|snapshot| snapshot.snapshot_id != snapshot_id);
        if snapshots.len() == before {
            Ok(DeleteOutcome::AlreadyDeleted)
        } else {
            Ok(DeleteOutcome::Deleted)
        }
    }
}
