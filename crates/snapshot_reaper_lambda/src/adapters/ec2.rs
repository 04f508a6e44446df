use async_trait::async_trait;
use aws_sdk_ec2::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_ec2::primitives::DateTimeFormat;
use aws_sdk_ec2::types::Filter;
use snapshot_reaper_core::{
    BlockDeviceMapping, ComputeProvider, DeleteOutcome, Instance, InstanceState,
    InstanceStateFilter, ProviderDeleteError, ProviderQueryError, Snapshot,
};

pub const INSTANCE_STATE_FILTER_NAME: &str = "instance-state-name";
pub const OWNER_SELF: &str = "self";
pub const SNAPSHOT_NOT_FOUND_CODE: &str = "InvalidSnapshot.NotFound";

/// EC2-backed provider. Holds one SDK client for the life of the process.
#[derive(Debug, Clone)]
pub struct Ec2ComputeProvider {
    client: aws_sdk_ec2::Client,
}

impl Ec2ComputeProvider {
    pub fn new(client: aws_sdk_ec2::Client) -> Self {
        Self { client }
    }

    pub fn from_sdk_config(config: &aws_config::SdkConfig) -> Self {
        Self::new(aws_sdk_ec2::Client::new(config))
    }
}

#[async_trait]
impl ComputeProvider for Ec2ComputeProvider {
    async fn list_instances(
        &self,
        states: &InstanceStateFilter,
    ) -> Result<Vec<Instance>, ProviderQueryError> {
        let state_filter = Filter::builder()
            .name(INSTANCE_STATE_FILTER_NAME)
            .set_values(Some(states.names()))
            .build();

        let mut pages = self
            .client
            .describe_instances()
            .filters(state_filter)
            .into_paginator()
            .send();

        let mut instances = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|error| {
                ProviderQueryError::new(
                    "DescribeInstances",
                    DisplayErrorContext(&error).to_string(),
                )
            })?;
            for reservation in page.reservations() {
                instances.extend(reservation.instances().iter().map(instance_from_sdk));
            }
        }

        Ok(instances)
    }

    async fn list_owned_snapshots(&self) -> Result<Vec<Snapshot>, ProviderQueryError> {
        let mut pages = self
            .client
            .describe_snapshots()
            .owner_ids(OWNER_SELF)
            .into_paginator()
            .send();

        let mut snapshots = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|error| {
                ProviderQueryError::new(
                    "DescribeSnapshots",
                    DisplayErrorContext(&error).to_string(),
                )
            })?;
            snapshots.extend(page.snapshots().iter().filter_map(snapshot_from_sdk));
        }

        Ok(snapshots)
    }

    async fn delete_snapshot(
        &self,
        snapshot_id: &str,
    ) -> Result<DeleteOutcome, ProviderDeleteError> {
        match self
            .client
            .delete_snapshot()
            .snapshot_id(snapshot_id)
            .send()
            .await
        {
            Ok(_) => Ok(DeleteOutcome::Deleted),
            Err(error) => classify_delete_error(
                snapshot_id,
                error.code(),
                DisplayErrorContext(&error).to_string(),
            ),
        }
    }
}

/// Maps a failed `DeleteSnapshot` call. A snapshot the service no longer
/// knows about is treated as deleted so re-runs stay idempotent.
pub fn classify_delete_error(
    snapshot_id: &str,
    code: Option<&str>,
    message: String,
) -> Result<DeleteOutcome, ProviderDeleteError> {
    match code {
        Some(SNAPSHOT_NOT_FOUND_CODE) => Ok(DeleteOutcome::AlreadyDeleted),
        Some(code) => Err(ProviderDeleteError::new(snapshot_id, message).with_code(code)),
        None => Err(ProviderDeleteError::new(snapshot_id, message)),
    }
}

pub fn instance_from_sdk(instance: &aws_sdk_ec2::types::Instance) -> Instance {
    let state = instance
        .state()
        .and_then(|state| state.name())
        .map(|name| InstanceState::parse(name.as_str()))
        .unwrap_or_else(|| InstanceState::Unknown(String::new()));

    let block_device_mappings = instance
        .block_device_mappings()
        .iter()
        .map(|mapping| BlockDeviceMapping {
            device_name: mapping.device_name().map(str::to_string),
            volume_id: mapping
                .ebs()
                .and_then(|ebs| ebs.volume_id())
                .map(str::to_string),
        })
        .collect();

    Instance {
        instance_id: instance.instance_id().map(str::to_string),
        state,
        block_device_mappings,
    }
}

/// Returns `None` for records without a snapshot id, which cannot be acted on.
pub fn snapshot_from_sdk(snapshot: &aws_sdk_ec2::types::Snapshot) -> Option<Snapshot> {
    let Some(snapshot_id) = snapshot.snapshot_id().filter(|id| !id.is_empty()) else {
        tracing::warn!(
            volume_id = snapshot.volume_id().unwrap_or("-"),
            "skipping snapshot record without an id"
        );
        return None;
    };

    Some(Snapshot {
        snapshot_id: snapshot_id.to_string(),
        owner_id: snapshot.owner_id().map(str::to_string),
        volume_id: snapshot.volume_id().map(str::to_string),
        start_time: snapshot
            .start_time()
            .and_then(|started| started.fmt(DateTimeFormat::DateTime).ok()),
        description: snapshot.description().map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use aws_sdk_ec2::primitives::DateTime;
    use aws_sdk_ec2::types::{
        EbsInstanceBlockDevice, InstanceBlockDeviceMapping, InstanceState as SdkInstanceState,
        InstanceStateName,
    };

    use super::*;

    fn sdk_instance(state: Option<InstanceStateName>) -> aws_sdk_ec2::types::Instance {
        let mut builder = aws_sdk_ec2::types::Instance::builder()
            .instance_id("i-0abc")
            .block_device_mappings(
                InstanceBlockDeviceMapping::builder()
                    .device_name("/dev/xvda")
                    .ebs(EbsInstanceBlockDevice::builder().volume_id("vol-1").build())
                    .build(),
            )
            .block_device_mappings(
                InstanceBlockDeviceMapping::builder()
                    .device_name("/dev/sdb")
                    .build(),
            );
        if let Some(name) = state {
            builder = builder.state(SdkInstanceState::builder().name(name).build());
        }
        builder.build()
    }

    #[test]
    fn maps_instance_state_and_ebs_volumes() {
        let instance = instance_from_sdk(&sdk_instance(Some(InstanceStateName::Stopped)));

        assert_eq!(instance.instance_id.as_deref(), Some("i-0abc"));
        assert_eq!(instance.state, InstanceState::Stopped);
        assert_eq!(instance.block_device_mappings.len(), 2);
        assert_eq!(instance.attached_volume_ids().collect::<Vec<_>>(), vec!["vol-1"]);
    }

    #[test]
    fn instance_without_state_is_unknown() {
        let instance = instance_from_sdk(&sdk_instance(None));
        assert!(matches!(instance.state, InstanceState::Unknown(_)));
    }

    #[test]
    fn instance_without_mappings_maps_to_empty_list() {
        let instance = instance_from_sdk(
            &aws_sdk_ec2::types::Instance::builder()
                .instance_id("i-empty")
                .build(),
        );
        assert!(instance.block_device_mappings.is_empty());
    }

    #[test]
    fn maps_snapshot_fields() {
        let sdk_snapshot = aws_sdk_ec2::types::Snapshot::builder()
            .snapshot_id("snap-1")
            .volume_id("vol-9")
            .owner_id("123456789012")
            .description("nightly")
            .start_time(DateTime::from_secs(1_700_000_000))
            .build();

        let snapshot = snapshot_from_sdk(&sdk_snapshot).expect("snapshot should map");

        assert_eq!(snapshot.snapshot_id, "snap-1");
        assert_eq!(snapshot.source_volume_id(), Some("vol-9"));
        assert_eq!(snapshot.owner_id.as_deref(), Some("123456789012"));
        assert_eq!(snapshot.start_time.as_deref(), Some("2023-11-14T22:13:20Z"));
    }

    #[test]
    fn snapshot_without_volume_keeps_volume_absent() {
        let sdk_snapshot = aws_sdk_ec2::types::Snapshot::builder()
            .snapshot_id("snap-2")
            .build();

        let snapshot = snapshot_from_sdk(&sdk_snapshot).expect("snapshot should map");
        assert_eq!(snapshot.source_volume_id(), None);
    }

    #[test]
    fn snapshot_without_id_is_dropped() {
        let sdk_snapshot = aws_sdk_ec2::types::Snapshot::builder()
            .volume_id("vol-1")
            .build();
        assert!(snapshot_from_sdk(&sdk_snapshot).is_none());
    }

    #[test]
    fn not_found_delete_counts_as_already_deleted() {
        let outcome = classify_delete_error(
            "snap-1",
            Some(SNAPSHOT_NOT_FOUND_CODE),
            "The snapshot 'snap-1' does not exist.".to_string(),
        );
        assert_eq!(outcome, Ok(DeleteOutcome::AlreadyDeleted));
    }

    #[test]
    fn other_delete_errors_keep_their_code() {
        let error = classify_delete_error(
            "snap-1",
            Some("InvalidSnapshot.InUse"),
            "snapshot is in use by ami-123".to_string(),
        )
        .expect_err("in-use snapshot should fail");

        assert_eq!(error.snapshot_id, "snap-1");
        assert_eq!(error.code.as_deref(), Some("InvalidSnapshot.InUse"));

        let uncoded = classify_delete_error("snap-2", None, "timeout".to_string())
            .expect_err("transport error should fail");
        assert_eq!(uncoded.code, None);
    }
}
