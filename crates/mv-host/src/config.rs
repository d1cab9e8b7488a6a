use std::num::NonZeroUsize;
use std::str::FromStr;

use mv_kernel::{ExecOptions, PartitionFailure, PartitionOrder};

use crate::error::HostError;

pub const PARTITION_SIZE_VAR: &str = "MV_PARTITION_SIZE";
pub const MAX_CONCURRENCY_VAR: &str = "MV_MAX_CONCURRENCY";
pub const PARTITION_FAILURE_VAR: &str = "MV_PARTITION_FAILURE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    /// Records per partition for non-sequential views.
    pub partition_size: usize,
    /// Upper bound on partitions executing at the same time.
    pub max_concurrency: usize,
    /// What a failed partition does to a parallel collection run.
    pub on_partition_failure: PartitionFailure,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            partition_size: ExecOptions::default().partition_size,
            max_concurrency: std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(4),
            on_partition_failure: PartitionFailure::Abort,
        }
    }
}

impl HostConfig {
    /// Defaults overridden by `MV_*` environment variables; errors only on malformed values.
    pub fn from_env() -> Result<Self, HostError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`HostConfig::from_env`] with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, HostError> {
        let mut config = Self::default();
        if let Some(size) = parse_var::<usize>(&lookup, PARTITION_SIZE_VAR)? {
            config.partition_size = size.max(1);
        }
        if let Some(limit) = parse_var::<usize>(&lookup, MAX_CONCURRENCY_VAR)? {
            config.max_concurrency = limit.max(1);
        }
        if let Some(policy) = lookup(PARTITION_FAILURE_VAR) {
            config.on_partition_failure = match policy.trim().to_ascii_lowercase().as_str() {
                "abort" => PartitionFailure::Abort,
                "skip" => PartitionFailure::Skip,
                other => {
                    return Err(HostError::Config(format!(
                        "{PARTITION_FAILURE_VAR} must be abort or skip, got {other:?}"
                    )));
                }
            };
        }
        Ok(config)
    }

    /// Options for running the same views in-thread with [`mv_kernel::Executor`].
    pub fn exec_options(&self) -> ExecOptions {
        ExecOptions {
            partition_size: self.partition_size,
            partition_order: PartitionOrder::Input,
            on_partition_failure: self.on_partition_failure,
        }
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, HostError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|err| HostError::Config(format!("{key}={raw:?}: {err}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn unset_variables_keep_defaults() {
        let config = HostConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, HostConfig::default());
        assert!(config.max_concurrency >= 1);
    }

    #[test]
    fn variables_override_defaults() {
        let config = HostConfig::from_lookup(lookup(&[
            (PARTITION_SIZE_VAR, "16"),
            (MAX_CONCURRENCY_VAR, " 3 "),
            (PARTITION_FAILURE_VAR, "Skip"),
        ]))
        .unwrap();
        assert_eq!(config.partition_size, 16);
        assert_eq!(config.max_concurrency, 3);
        assert_eq!(config.on_partition_failure, PartitionFailure::Skip);
        assert_eq!(config.exec_options().partition_size, 16);
    }

    #[test]
    fn zero_sizes_are_clamped() {
        let config =
            HostConfig::from_lookup(lookup(&[(PARTITION_SIZE_VAR, "0"), (MAX_CONCURRENCY_VAR, "0")]))
                .unwrap();
        assert_eq!(config.partition_size, 1);
        assert_eq!(config.max_concurrency, 1);
    }

    #[test]
    fn malformed_values_are_rejected() {
        let err = HostConfig::from_lookup(lookup(&[(PARTITION_SIZE_VAR, "lots")])).unwrap_err();
        assert!(err.to_string().contains(PARTITION_SIZE_VAR));

        let err =
            HostConfig::from_lookup(lookup(&[(PARTITION_FAILURE_VAR, "retry")])).unwrap_err();
        assert!(matches!(err, HostError::Config(_)));
    }
}
