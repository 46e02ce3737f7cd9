//! Configuration management for Deadbolt.

use serde::{Deserialize, Serialize};

/// Main configuration for the throttling core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadboltConfig {
    /// Throttle tuning
    #[serde(default)]
    pub throttle: ThrottleConfig,

    /// Path to a limit policy file
    pub policy_path: Option<String>,
}

impl Default for DeadboltConfig {
    fn default() -> Self {
        Self {
            throttle: ThrottleConfig::default(),
            policy_path: None,
        }
    }
}

/// Tuning for the attempt-recording path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottleConfig {
    /// How long a `hit` call may wait for the per-key lock, in seconds
    #[serde(default = "default_lock_wait")]
    pub lock_wait_secs: u64,

    /// Expiry on the per-key lock itself, so a crashed holder cannot
    /// block progress indefinitely
    #[serde(default = "default_lock_ttl")]
    pub lock_ttl_secs: u64,

    /// Rolling window for counting lockouts toward a ban, in seconds
    #[serde(default = "default_lockout_count_ttl")]
    pub lockout_count_ttl_secs: u64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            lock_wait_secs: default_lock_wait(),
            lock_ttl_secs: default_lock_ttl(),
            lockout_count_ttl_secs: default_lockout_count_ttl(),
        }
    }
}

fn default_lock_wait() -> u64 {
    3
}

fn default_lock_ttl() -> u64 {
    5
}

fn default_lockout_count_ttl() -> u64 {
    86400
}

impl DeadboltConfig {
    /// Load configuration from a file path.
    pub fn from_file(path: &str) -> crate::error::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: DeadboltConfig = serde_yaml::from_str(&contents)
            .map_err(|e| crate::error::DeadboltError::Config(e.to_string()))?;
        Ok(config)
    }
}
