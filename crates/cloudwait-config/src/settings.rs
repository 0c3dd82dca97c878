use crate::error::{ConfigError, Result};
use cloudwait::{Backoff, NotFoundPolicy, SemaphoreRegistry, WaitSpec, capacity_from_env};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Resource operation a timeout belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Per-operation wall-clock budgets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Timeouts {
    #[serde(with = "humantime_serde")]
    pub create: Duration,
    #[serde(with = "humantime_serde")]
    pub read: Duration,
    #[serde(with = "humantime_serde")]
    pub update: Duration,
    #[serde(with = "humantime_serde")]
    pub delete: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        let twenty_minutes = Duration::from_secs(20 * 60);
        Self {
            create: twenty_minutes,
            read: twenty_minutes,
            update: twenty_minutes,
            delete: twenty_minutes,
        }
    }
}

impl Timeouts {
    pub fn get(&self, op: Operation) -> Duration {
        match op {
            Operation::Create => self.create,
            Operation::Read => self.read,
            Operation::Update => self.update,
            Operation::Delete => self.delete,
        }
    }
}

/// Tuning for read-after-write propagation waits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PropagationSettings {
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Matching reads required in a row
    pub continuous_target_occurrence: u32,

    #[serde(with = "humantime_serde")]
    pub min_poll_interval: Duration,

    /// Not-found reads tolerated in a row before giving up
    pub not_found_checks: u32,
}

impl Default for PropagationSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(2 * 60),
            continuous_target_occurrence: 5,
            min_poll_interval: Duration::from_secs(2),
            not_found_checks: cloudwait::DEFAULT_NOT_FOUND_CHECKS,
        }
    }
}

/// Backoff between attempts of a retried mutation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let backoff = Backoff::default();
        Self {
            initial_delay: backoff.initial_delay,
            max_delay: backoff.max_delay,
            multiplier: backoff.multiplier,
        }
    }
}

/// Top-level wait configuration
///
/// ```yaml
/// timeouts:
///   create: 10m
///   delete: 20m
/// propagation:
///   continuous_target_occurrence: 5
///   min_poll_interval: 2s
/// concurrency:
///   custom-key-store: 1
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WaitSettings {
    pub timeouts: Timeouts,
    pub propagation: PropagationSettings,
    pub retry: RetrySettings,

    /// Named concurrency gates and their capacities
    pub concurrency: BTreeMap<String, usize>,
}

impl WaitSettings {
    /// Parse and validate a YAML document
    pub fn from_yaml(content: &str) -> Result<Self> {
        let settings: WaitSettings = serde_yaml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let settings = Self::from_yaml(&content)?;
        tracing::debug!(path = %path.display(), "loaded wait settings");
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.propagation.continuous_target_occurrence == 0 {
            return Err(ConfigError::invalid(
                "propagation.continuous_target_occurrence",
                "must be at least 1",
            ));
        }
        if self.retry.initial_delay.is_zero() {
            return Err(ConfigError::invalid("retry.initial_delay", "must be longer than zero"));
        }
        if !self.retry.multiplier.is_finite() || self.retry.multiplier < 1.0 {
            return Err(ConfigError::invalid(
                "retry.multiplier",
                "must be a finite number >= 1.0",
            ));
        }
        if self.retry.max_delay < self.retry.initial_delay {
            return Err(ConfigError::invalid(
                "retry.max_delay",
                "must not be shorter than retry.initial_delay",
            ));
        }
        if let Some((name, _)) = self.concurrency.iter().find(|(_, capacity)| **capacity == 0) {
            return Err(ConfigError::invalid(
                format!("concurrency.{name}"),
                "capacity must be at least 1",
            ));
        }
        Ok(())
    }

    pub fn timeout(&self, op: Operation) -> Duration {
        self.timeouts.get(op)
    }

    /// `WaitSpec` for a state wait bounded by the operation's timeout
    ///
    /// Callers add their pending and target statuses.
    pub fn wait_spec(&self, op: Operation) -> WaitSpec {
        WaitSpec::new(self.timeout(op)).not_found(self.not_found_policy())
    }

    /// `WaitSpec` for a read-after-write propagation wait
    pub fn propagation_spec(&self) -> WaitSpec {
        WaitSpec::new(self.propagation.timeout)
            .continuous_target_occurrence(self.propagation.continuous_target_occurrence)
            .min_poll_interval(self.propagation.min_poll_interval)
            .not_found(self.not_found_policy())
    }

    pub fn backoff(&self) -> Backoff {
        Backoff {
            initial_delay: self.retry.initial_delay,
            max_delay: self.retry.max_delay,
            multiplier: self.retry.multiplier,
        }
    }

    /// Capacity for a named gate
    ///
    /// `CLOUDWAIT_CONCURRENCY_<NAME>` overrides the file, the file overrides
    /// `default`.
    pub fn concurrency_limit(&self, name: &str, default: usize) -> usize {
        let configured = self.concurrency.get(name).copied().unwrap_or(default);
        capacity_from_env(&concurrency_env_var(name), configured)
    }

    /// Gate for `name` from `registry`, created with the configured capacity
    pub fn gate(&self, registry: &SemaphoreRegistry, name: &str, default: usize) -> Arc<Semaphore> {
        registry.get_or_create(name, self.concurrency_limit(name, default))
    }

    fn not_found_policy(&self) -> NotFoundPolicy {
        NotFoundPolicy::Pending {
            max_checks: self.propagation.not_found_checks,
        }
    }
}

/// `custom-key-store` -> `CLOUDWAIT_CONCURRENCY_CUSTOM_KEY_STORE`
pub fn concurrency_env_var(name: &str) -> String {
    let suffix: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("CLOUDWAIT_CONCURRENCY_{suffix}")
}
