use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use snapshot_reaper_core::config::parse_bool;
use snapshot_reaper_core::{
    ComputeProvider, ConfigError, ReaperConfig, ReconcileError, ReconcileOptions, Reconciler,
    RunSummary,
};
use thiserror::Error;
use tokio::sync::watch;

pub const DEADLINE_MARGIN_ENV: &str = "SNAPSHOT_REAPER_DEADLINE_MARGIN_MS";
pub const DEFAULT_DEADLINE_MARGIN: Duration = Duration::from_millis(5_000);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InvocationResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
    pub summary: RunSummary,
}

/// A failed invocation, naming the step that failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{step} failed with status {status_code}: {message}")]
pub struct InvocationFailure {
    pub step: &'static str,
    pub status_code: u16,
    pub message: String,
}

impl From<ReconcileError> for InvocationFailure {
    fn from(error: ReconcileError) -> Self {
        Self {
            step: error.step(),
            status_code: 502,
            message: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerOverrides {
    pub dry_run: Option<bool>,
}

/// Reads the optional `dry_run` override from a trigger payload. Anything else
/// in the payload (scheduler metadata, `detail`, ...) is ignored.
pub fn parse_trigger_overrides(event: &Value) -> Result<TriggerOverrides, InvocationFailure> {
    let Some(object) = event.as_object() else {
        return Ok(TriggerOverrides::default());
    };

    let dry_run = match object.get("dry_run") {
        None | Some(Value::Null) => None,
        Some(Value::Bool(value)) => Some(*value),
        Some(Value::String(raw)) => Some(parse_bool("dry_run", raw).map_err(trigger_failure)?),
        Some(other) => {
            return Err(InvocationFailure {
                step: "trigger",
                status_code: 400,
                message: format!("dry_run must be a boolean, got {other}"),
            })
        }
    };

    Ok(TriggerOverrides { dry_run })
}

fn trigger_failure(error: ConfigError) -> InvocationFailure {
    InvocationFailure {
        step: "trigger",
        status_code: 400,
        message: error.to_string(),
    }
}

/// Runs one reconciliation pass for a scheduled trigger.
///
/// Collection failures come back as `Err` so the host records a failed
/// invocation. Partial deletion failures still return status 200 with the
/// failures listed in the body and summary.
pub async fn handle_scheduled_event(
    event: Value,
    provider: &dyn ComputeProvider,
    config: &ReaperConfig,
    cancel: Option<watch::Receiver<bool>>,
) -> Result<InvocationResponse, InvocationFailure> {
    let overrides = parse_trigger_overrides(&event)?;

    let mut options = ReconcileOptions::from(config);
    if let Some(dry_run) = overrides.dry_run {
        options.dry_run = dry_run;
    }
    if let Some(cancel) = cancel {
        options = options.with_cancellation(cancel);
    }

    let summary = Reconciler::new(provider, options).run().await?;

    Ok(InvocationResponse {
        status_code: 200,
        body: summary.headline(),
        summary,
    })
}

pub fn deadline_margin_from_lookup(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Duration, ConfigError> {
    let Some(raw) = lookup(DEADLINE_MARGIN_ENV).filter(|raw| !raw.trim().is_empty()) else {
        return Ok(DEFAULT_DEADLINE_MARGIN);
    };

    raw.trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| ConfigError::InvalidValue {
            key: DEADLINE_MARGIN_ENV,
            expected: "a whole number of milliseconds",
            value: raw,
        })
}

/// Time left before deletions must stop, given the invocation deadline in
/// epoch milliseconds.
pub fn cancellation_budget(deadline_ms: u64, now_ms: u64, margin: Duration) -> Duration {
    let margin_ms = u64::try_from(margin.as_millis()).unwrap_or(u64::MAX);
    Duration::from_millis(deadline_ms.saturating_sub(now_ms).saturating_sub(margin_ms))
}
