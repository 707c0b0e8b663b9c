mod cluster;
mod database;
mod logging;

pub use cluster::ClusterConfig;
pub use database::DatabaseConfig;
pub use logging::LoggingConfig;

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{CohortError, Result};

/// Root configuration for cohort.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CohortConfig {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Cluster configuration.
    #[serde(default)]
    pub cluster: ClusterConfig,

    /// Settings for the `stop` and `ensure` commands.
    #[serde(default)]
    pub control: ControlConfig,

    /// Settings for processes started with `member`.
    #[serde(default)]
    pub member: MemberConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl CohortConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| CohortError::Config(format!("Failed to read config file: {}", e)))?;

        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let content = substitute_env_vars(content)?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| CohortError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise fall back to defaults.
    ///
    /// An empty `database.url` is filled from `DATABASE_URL` in both cases.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            Self::from_file(path)?
        } else {
            tracing::debug!("No config file at {}, using defaults", path.display());
            Self::default()
        };

        if config.database.url.is_empty() {
            if let Ok(url) = std::env::var("DATABASE_URL") {
                config.database.url = url;
            }
        }

        Ok(config)
    }

    /// Check values that serde defaults cannot rule out.
    pub fn validate(&self) -> Result<()> {
        if self.control.max_attempts == 0 {
            return Err(CohortError::Config(
                "control.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.control.poll_interval_ms == 0 {
            return Err(CohortError::Config(
                "control.poll_interval_ms must be positive".to_string(),
            ));
        }
        if self.cluster.heartbeat_interval_secs == 0 {
            return Err(CohortError::Config(
                "cluster.heartbeat_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.cluster.dead_threshold_secs <= self.cluster.heartbeat_interval_secs {
            return Err(CohortError::Config(format!(
                "cluster.dead_threshold_secs ({}) must exceed heartbeat_interval_secs ({})",
                self.cluster.dead_threshold_secs, self.cluster.heartbeat_interval_secs
            )));
        }
        if self.cluster.channel.is_empty() {
            return Err(CohortError::Config(
                "cluster.channel must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Settings for the control commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Service used to broadcast remote commands.
    #[serde(default = "default_invocation_service")]
    pub invocation_service: String,

    /// Service `ensure` waits for.
    #[serde(default = "default_required_service")]
    pub required_service: String,

    /// Attempt budget for `ensure`.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Pause between attempts in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Wait after broadcasting a stop, before the residual check (seconds).
    #[serde(default = "default_settle_delay")]
    pub settle_delay_secs: u64,

    /// Grace period a member waits before terminating (seconds).
    #[serde(default = "default_terminate_delay")]
    pub terminate_delay_secs: u64,
}

impl ControlConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }

    pub fn terminate_delay(&self) -> Duration {
        Duration::from_secs(self.terminate_delay_secs)
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            invocation_service: default_invocation_service(),
            required_service: default_required_service(),
            max_attempts: default_max_attempts(),
            poll_interval_ms: default_poll_interval(),
            settle_delay_secs: default_settle_delay(),
            terminate_delay_secs: default_terminate_delay(),
        }
    }
}

fn default_invocation_service() -> String {
    "InvocationService".to_string()
}

fn default_required_service() -> String {
    "DistributedCache".to_string()
}

fn default_max_attempts() -> u32 {
    30
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_settle_delay() -> u64 {
    10
}

fn default_terminate_delay() -> u64 {
    2
}

/// Settings for member processes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberConfig {
    /// Services the member advertises.
    #[serde(default = "default_services")]
    pub services: Vec<String>,
}

impl Default for MemberConfig {
    fn default() -> Self {
        Self {
            services: default_services(),
        }
    }
}

fn default_services() -> Vec<String> {
    vec![default_invocation_service(), default_required_service()]
}

/// Substitute environment variables in the format ${VAR_NAME}.
fn substitute_env_vars(content: &str) -> Result<String> {
    let mut result = content.to_string();
    let re = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| CohortError::Internal(e.to_string()))?;

    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        if let Ok(value) = std::env::var(var_name) {
            result = result.replace(&cap[0], &value);
        }
    }

    Ok(result)
}
