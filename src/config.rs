//! Configuration management

use std::path::PathBuf;
use std::time::Duration;

use crate::execution::ExecutionOptions;

/// Core configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// SQLite database path for the durable store
    pub db_path: PathBuf,

    /// Maximum subgoals executed concurrently (default 1, fully sequential)
    pub max_concurrent_steps: usize,

    /// Time budget per step attempt
    pub timeout_per_step: Duration,

    /// Re-attempts per subgoal before it is finalized as failed
    pub retry_count: usize,

    /// Keep scheduling subgoals after a failure
    pub continue_on_error: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("nexus.db"),
            max_concurrent_steps: 1,
            timeout_per_step: Duration::from_secs(30),
            retry_count: 1,
            continue_on_error: false,
        }
    }
}

impl CoreConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let db_path = std::env::var("NEXUS_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let max_concurrent_steps = std::env::var("NEXUS_MAX_CONCURRENT_STEPS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|&n: &usize| n >= 1)
            .unwrap_or(defaults.max_concurrent_steps);

        let timeout_per_step = std::env::var("NEXUS_STEP_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout_per_step);

        let retry_count = std::env::var("NEXUS_RETRY_COUNT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.retry_count);

        let continue_on_error = std::env::var("NEXUS_CONTINUE_ON_ERROR")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(defaults.continue_on_error);

        Self {
            db_path,
            max_concurrent_steps,
            timeout_per_step,
            retry_count,
            continue_on_error,
        }
    }

    /// Execution options derived from this configuration.
    pub fn execution_options(&self) -> ExecutionOptions {
        ExecutionOptions {
            max_concurrent_steps: self.max_concurrent_steps,
            timeout_per_step: self.timeout_per_step,
            retry_count: self.retry_count,
            continue_on_error: self.continue_on_error,
            ..ExecutionOptions::default()
        }
    }
}
