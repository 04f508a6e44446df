use thiserror::Error;

/// A listing call against the provider failed. Fatal to the run.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{operation} failed: {message}")]
pub struct ProviderQueryError {
    pub operation: &'static str,
    pub message: String,
}

impl ProviderQueryError {
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }
}

/// A single snapshot deletion failed. Recorded and reported, never fatal.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("failed to delete {snapshot_id}: {message}")]
pub struct ProviderDeleteError {
    pub snapshot_id: String,
    pub code: Option<String>,
    pub message: String,
}

impl ProviderDeleteError {
    pub fn new(snapshot_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            snapshot_id: snapshot_id.into(),
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("active volume collection failed: {0}")]
    ActiveVolumes(ProviderQueryError),
    #[error("snapshot inventory collection failed: {0}")]
    SnapshotInventory(ProviderQueryError),
}

impl ReconcileError {
    /// Name of the step that aborted the run.
    pub fn step(&self) -> &'static str {
        match self {
            Self::ActiveVolumes(_) => "active_volumes",
            Self::SnapshotInventory(_) => "snapshot_inventory",
        }
    }

    pub fn query_error(&self) -> &ProviderQueryError {
        match self {
            Self::ActiveVolumes(error) | Self::SnapshotInventory(error) => error,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("instance state filter cannot be empty")]
    EmptyStateFilter,
    #[error("unknown instance state '{0}'")]
    UnknownInstanceState(String),
    #[error("{key} must be {expected}, got '{value}'")]
    InvalidValue {
        key: &'static str,
        expected: &'static str,
        value: String,
    },
}
