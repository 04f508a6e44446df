use crate::error::ConfigError;
use crate::model::InstanceStateFilter;

pub const INSTANCE_STATES_ENV: &str = "SNAPSHOT_REAPER_INSTANCE_STATES";
pub const DELETE_CONCURRENCY_ENV: &str = "SNAPSHOT_REAPER_DELETE_CONCURRENCY";
pub const DRY_RUN_ENV: &str = "SNAPSHOT_REAPER_DRY_RUN";

pub const DEFAULT_DELETE_CONCURRENCY: usize = 4;
pub const MAX_DELETE_CONCURRENCY: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaperConfig {
    pub states: InstanceStateFilter,
    pub delete_concurrency: usize,
    pub dry_run: bool,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            states: InstanceStateFilter::default(),
            delete_concurrency: DEFAULT_DELETE_CONCURRENCY,
            dry_run: false,
        }
    }
}

impl ReaperConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from a key lookup. Unset or blank keys fall
    /// back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let value = |key: &str| lookup(key).filter(|raw| !raw.trim().is_empty());
        let mut config = Self::default();

        if let Some(raw) = value(INSTANCE_STATES_ENV) {
            config.states = raw.parse()?;
        }

        if let Some(raw) = value(DELETE_CONCURRENCY_ENV) {
            config.delete_concurrency = parse_concurrency(DELETE_CONCURRENCY_ENV, &raw)?;
        }

        if let Some(raw) = value(DRY_RUN_ENV) {
            config.dry_run = parse_bool(DRY_RUN_ENV, &raw)?;
        }

        Ok(config)
    }
}

pub fn parse_concurrency(key: &'static str, raw: &str) -> Result<usize, ConfigError> {
    match raw.trim().parse::<usize>() {
        Ok(value) if (1..=MAX_DELETE_CONCURRENCY).contains(&value) => Ok(value),
        _ => Err(ConfigError::InvalidValue {
            key,
            expected: "an integer between 1 and 32",
            value: raw.to_string(),
        }),
    }
}

pub fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            expected: "a boolean",
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::model::InstanceState;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| values.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = ReaperConfig::from_lookup(lookup(&[])).expect("defaults should load");
        assert_eq!(config, ReaperConfig::default());
        assert_eq!(config.delete_concurrency, 4);
        assert!(!config.dry_run);
    }

    #[test]
    fn reads_all_keys() {
        let config = ReaperConfig::from_lookup(lookup(&[
            (INSTANCE_STATES_ENV, "running,stopped,stopping"),
            (DELETE_CONCURRENCY_ENV, "8"),
            (DRY_RUN_ENV, "yes"),
        ]))
        .expect("config should load");

        assert!(config.states.contains(&InstanceState::Stopping));
        assert_eq!(config.delete_concurrency, 8);
        assert!(config.dry_run);
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = ReaperConfig::from_lookup(lookup(&[(INSTANCE_STATES_ENV, "  ")]))
            .expect("blank should fall back");
        assert_eq!(config.states, InstanceStateFilter::default());
    }

    #[test]
    fn rejects_out_of_range_concurrency() {
        for raw in ["0", "33", "four"] {
            let error = ReaperConfig::from_lookup(lookup(&[(DELETE_CONCURRENCY_ENV, raw)]))
                .expect_err("concurrency should be rejected");
            assert!(error.to_string().contains(DELETE_CONCURRENCY_ENV));
        }
    }

    #[test]
    fn rejects_unparseable_dry_run() {
        let error = ReaperConfig::from_lookup(lookup(&[(DRY_RUN_ENV, "maybe")]))
            .expect_err("dry run should be rejected");
        assert_eq!(
            error.to_string(),
            "SNAPSHOT_REAPER_DRY_RUN must be a boolean, got 'maybe'"
        );
    }
}
