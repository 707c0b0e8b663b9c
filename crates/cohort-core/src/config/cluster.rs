use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Cluster configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Cluster name. Members of other clusters sharing the database are invisible.
    #[serde(default = "default_cluster_name")]
    pub name: String,

    /// NOTIFY channel carrying broadcast invocations.
    #[serde(default = "default_channel")]
    pub channel: String,

    /// Heartbeat interval in seconds.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,

    /// Members whose last heartbeat is older than this are not counted (seconds).
    #[serde(default = "default_dead_threshold")]
    pub dead_threshold_secs: u64,
}

impl ClusterConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn dead_threshold(&self) -> Duration {
        Duration::from_secs(self.dead_threshold_secs)
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            name: default_cluster_name(),
            channel: default_channel(),
            heartbeat_interval_secs: default_heartbeat_interval(),
            dead_threshold_secs: default_dead_threshold(),
        }
    }
}

fn default_cluster_name() -> String {
    "default".to_string()
}

fn default_channel() -> String {
    "cohort_invocations".to_string()
}

fn default_heartbeat_interval() -> u64 {
    5
}

fn default_dead_threshold() -> u64 {
    15
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cluster_config() {
        let config = ClusterConfig::default();
        assert_eq!(config.name, "default");
        assert_eq!(config.channel, "cohort_invocations");
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(5));
        assert_eq!(config.dead_threshold(), Duration::from_secs(15));
    }

    #[test]
    fn test_parse_cluster_config() {
        let toml = r#"
            name = "staging"
            dead_threshold_secs = 30
        "#;

        let config: ClusterConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.name, "staging");
        assert_eq!(config.dead_threshold_secs, 30);
        assert_eq!(config.heartbeat_interval_secs, 5);
    }
}
