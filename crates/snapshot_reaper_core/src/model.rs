use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Lifecycle state reported by the compute provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum InstanceState {
    Pending,
    Running,
    ShuttingDown,
    Stopping,
    Stopped,
    Terminated,
    Unknown(String),
}

impl InstanceState {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::ShuttingDown => "shutting-down",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Terminated => "terminated",
            Self::Unknown(raw) => raw,
        }
    }

    /// Parses a provider state name. Unrecognised names are kept verbatim.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Self::Pending,
            "running" => Self::Running,
            "shutting-down" | "shutting_down" => Self::ShuttingDown,
            "stopping" => Self::Stopping,
            "stopped" => Self::Stopped,
            "terminated" => Self::Terminated,
            _ => Self::Unknown(raw.trim().to_string()),
        }
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<InstanceState> for String {
    fn from(value: InstanceState) -> Self {
        value.as_str().to_string()
    }
}

impl From<String> for InstanceState {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

/// States whose attached volumes count as active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceStateFilter {
    states: Vec<InstanceState>,
}

impl InstanceStateFilter {
    pub fn new(states: impl IntoIterator<Item = InstanceState>) -> Result<Self, ConfigError> {
        let mut deduped: Vec<InstanceState> = Vec::new();
        for state in states {
            if let InstanceState::Unknown(raw) = &state {
                return Err(ConfigError::UnknownInstanceState(raw.clone()));
            }
            if !deduped.contains(&state) {
                deduped.push(state);
            }
        }

        if deduped.is_empty() {
            return Err(ConfigError::EmptyStateFilter);
        }

        Ok(Self { states: deduped })
    }

    pub fn contains(&self, state: &InstanceState) -> bool {
        self.states.contains(state)
    }

    pub fn states(&self) -> &[InstanceState] {
        &self.states
    }

    pub fn names(&self) -> Vec<String> {
        self.states.iter().map(|state| state.as_str().to_string()).collect()
    }
}

impl Default for InstanceStateFilter {
    fn default() -> Self {
        Self {
            states: vec![InstanceState::Running, InstanceState::Stopped],
        }
    }
}

impl FromStr for InstanceStateFilter {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::new(
            raw.split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(InstanceState::parse),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDeviceMapping {
    pub device_name: Option<String>,
    /// Present only for network-backed volumes; ephemeral storage has none.
    pub volume_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub instance_id: Option<String>,
    pub state: InstanceState,
    #[serde(default)]
    pub block_device_mappings: Vec<BlockDeviceMapping>,
}

impl Instance {
    /// Volume ids of network-backed mappings. Empty ids are ignored.
    pub fn attached_volume_ids(&self) -> impl Iterator<Item = &str> {
        self.block_device_mappings
            .iter()
            .filter_map(|mapping| mapping.volume_id.as_deref())
            .filter(|volume_id| !volume_id.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub snapshot_id: String,
    pub owner_id: Option<String>,
    pub volume_id: Option<String>,
    pub start_time: Option<String>,
    pub description: Option<String>,
}

impl Snapshot {
    pub fn new(snapshot_id: impl Into<String>, volume_id: Option<&str>) -> Self {
        Self {
            snapshot_id: snapshot_id.into(),
            owner_id: None,
            volume_id: volume_id.map(str::to_string),
            start_time: None,
            description: None,
        }
    }

    /// The recorded source volume, treating an empty string as absent.
    pub fn source_volume_id(&self) -> Option<&str> {
        self.volume_id
            .as_deref()
            .map(str::trim)
            .filter(|volume_id| !volume_id.is_empty())
    }
}
