//! Limit policies and the policy registry.
//!
//! A limit type (e.g. "login") names a fixed set of throttling rules. The
//! registry is loaded once at startup; lookups for unregistered types fail
//! fast so misconfigured callers are caught early.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{DeadboltError, Result};

/// Throttling rules for a single limit type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitPolicy {
    /// Failed attempts allowed before a lockout
    pub max_attempts: u64,
    /// Seconds of inactivity after which attempts and lockouts expire
    pub decay_seconds: u64,
    /// Lockouts within the rolling window that escalate to a ban
    pub ban_threshold: u64,
    /// Ban duration in seconds
    pub ban_duration_seconds: u64,
}

impl LimitPolicy {
    /// The decay window as a duration.
    pub fn decay(&self) -> Duration {
        Duration::from_secs(self.decay_seconds)
    }

    /// The ban duration as a duration.
    pub fn ban_duration(&self) -> Duration {
        Duration::from_secs(self.ban_duration_seconds)
    }
}

/// Registry mapping limit type names to their policies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyRegistry {
    /// Map of limit type name to policy
    #[serde(default)]
    policies: HashMap<String, LimitPolicy>,
}

impl PolicyRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in registry with the default login policy.
    pub fn defaults() -> Self {
        Self::new().with_policy(
            "login",
            LimitPolicy {
                max_attempts: 5,
                decay_seconds: 300,
                ban_threshold: 3,
                ban_duration_seconds: 3600,
            },
        )
    }

    /// Add a policy under a limit type name.
    pub fn with_policy(mut self, limit_type: &str, policy: LimitPolicy) -> Self {
        self.policies.insert(limit_type.to_string(), policy);
        self
    }

    /// Load a registry from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading limit policies");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load a registry from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| DeadboltError::Config(format!("Failed to parse limit policies: {}", e)))
    }

    /// Resolve the policy for a limit type.
    ///
    /// Fails with [`DeadboltError::UnknownLimitType`] for unregistered
    /// types; there is no silent default.
    pub fn policy(&self, limit_type: &str) -> Result<&LimitPolicy> {
        self.policies
            .get(limit_type)
            .ok_or_else(|| DeadboltError::UnknownLimitType(limit_type.to_string()))
    }

    /// The number of registered limit types.
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// Whether the registry has no policies.
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_include_login() {
        let registry = PolicyRegistry::defaults();

        let policy = registry.policy("login").unwrap();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.decay_seconds, 300);
        assert_eq!(policy.ban_threshold, 3);
        assert_eq!(policy.ban_duration_seconds, 3600);
    }

    #[test]
    fn test_unknown_type_fails_fast() {
        let registry = PolicyRegistry::defaults();

        let err = registry.policy("password-reset").unwrap_err();
        assert!(matches!(err, DeadboltError::UnknownLimitType(ref t) if t == "password-reset"));
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
policies:
  login:
    max_attempts: 5
    decay_seconds: 300
    ban_threshold: 3
    ban_duration_seconds: 3600
  api_token:
    max_attempts: 10
    decay_seconds: 60
    ban_threshold: 5
    ban_duration_seconds: 7200
"#;
        let registry = PolicyRegistry::from_yaml(yaml).unwrap();
        assert_eq!(registry.len(), 2);

        let policy = registry.policy("api_token").unwrap();
        assert_eq!(policy.max_attempts, 10);
        assert_eq!(policy.decay_seconds, 60);
    }

    #[test]
    fn test_from_file() -> anyhow::Result<()> {
        let path = std::env::temp_dir().join("deadbolt-policy-test.yaml");
        std::fs::write(
            &path,
            "policies:\n  login:\n    max_attempts: 4\n    decay_seconds: 120\n    ban_threshold: 2\n    ban_duration_seconds: 600\n",
        )?;

        let registry = PolicyRegistry::from_file(&path)?;
        std::fs::remove_file(&path)?;

        assert_eq!(registry.policy("login")?.max_attempts, 4);
        assert_eq!(registry.policy("login")?.ban_duration_seconds, 600);
        Ok(())
    }

    #[test]
    fn test_parse_invalid_yaml() {
        let err = PolicyRegistry::from_yaml("policies: [not, a, map]").unwrap_err();
        assert!(matches!(err, DeadboltError::Config(_)));
    }

    #[test]
    fn test_duration_accessors() {
        let policy = LimitPolicy {
            max_attempts: 5,
            decay_seconds: 300,
            ban_threshold: 3,
            ban_duration_seconds: 3600,
        };

        assert_eq!(policy.decay(), Duration::from_secs(300));
        assert_eq!(policy.ban_duration(), Duration::from_secs(3600));
    }

    #[test]
    fn test_empty_registry() {
        let registry = PolicyRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.policy("login").is_err());
    }
}
