//! Process-wide configuration for the sync core

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::controller::RetryPolicy;
use crate::error::{Error, Result};

/// Settings shared by every sync in the process
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    /// Namespace history records are written to
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Append a history record after every patch
    #[serde(default)]
    pub record_history: bool,
    /// Retry budget for workload writes
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_namespace() -> String {
    "default".to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            record_history: false,
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_factor")]
    pub factor: u32,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Only retry optimistic-concurrency conflicts
    #[serde(default)]
    pub conflict_only: bool,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay_ms() -> u64 {
    10
}

fn default_factor() -> u32 {
    2
}

fn default_max_delay_ms() -> u64 {
    1000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            factor: default_factor(),
            max_delay_ms: default_max_delay_ms(),
            conflict_only: false,
        }
    }
}

impl SyncConfig {
    pub fn validate(&self) -> Result<()> {
        if self.namespace.trim().is_empty() {
            return Err(Error::ConfigError("namespace must not be empty".to_string()));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::ConfigError(
                "retry.maxAttempts must be at least 1".to_string(),
            ));
        }
        if self.retry.factor == 0 {
            return Err(Error::ConfigError(
                "retry.factor must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the retry policy described by `retry`
    pub fn retry_policy(&self) -> RetryPolicy {
        let policy = if self.retry.conflict_only {
            RetryPolicy::on_conflict()
        } else {
            RetryPolicy::default()
        };
        policy
            .with_max_attempts(self.retry.max_attempts)
            .with_backoff(
                Duration::from_millis(self.retry.initial_delay_ms),
                self.retry.factor,
                Duration::from_millis(self.retry.max_delay_ms),
            )
    }
}
