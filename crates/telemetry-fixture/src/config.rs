//! Fixture configuration.
//!
//! Configuration is loaded from environment variables, with a `from_vars`
//! twin so tests can supply values without touching the process environment.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default location of the mock backend deployment manifest.
pub const DEFAULT_MANIFEST_PATH: &str = "testdata/mock-telemetry/install.yaml";

/// Default upper bound on the readiness wait in seconds.
pub const DEFAULT_READINESS_TIMEOUT_SECONDS: u64 = 300;

/// Default kubectl binary.
pub const DEFAULT_KUBECTL: &str = "kubectl";

/// Configuration for provisioning a mock telemetry backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureConfig {
    /// Target cluster name. `None` selects the environment default.
    pub cluster: Option<String>,

    /// Deployment manifest applied into the new namespace.
    pub manifest_path: PathBuf,

    /// Upper bound on waiting for the backend pod to become ready.
    pub readiness_timeout: Duration,

    /// kubectl binary used by the kubectl-backed cluster.
    pub kubectl: String,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            cluster: None,
            manifest_path: PathBuf::from(DEFAULT_MANIFEST_PATH),
            readiness_timeout: Duration::from_secs(DEFAULT_READINESS_TIMEOUT_SECONDS),
            kubectl: DEFAULT_KUBECTL.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid readiness timeout configuration: {0}")]
    InvalidReadinessTimeout(String),

    #[error("Invalid value for {name}: must not be empty")]
    EmptyValue { name: String },
}

impl FixtureConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let cluster = match vars.get("TELEMETRY_FIXTURE_CLUSTER") {
            Some(value) if value.trim().is_empty() => None,
            Some(value) => Some(value.trim().to_string()),
            None => None,
        };

        let manifest_path = vars
            .get("TELEMETRY_FIXTURE_MANIFEST")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MANIFEST_PATH));

        let readiness_timeout = if let Some(value_str) =
            vars.get("TELEMETRY_FIXTURE_READINESS_TIMEOUT_SECONDS")
        {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidReadinessTimeout(format!(
                    "TELEMETRY_FIXTURE_READINESS_TIMEOUT_SECONDS must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidReadinessTimeout(
                    "TELEMETRY_FIXTURE_READINESS_TIMEOUT_SECONDS must be greater than 0".to_string(),
                ));
            }

            Duration::from_secs(value)
        } else {
            Duration::from_secs(DEFAULT_READINESS_TIMEOUT_SECONDS)
        };

        let kubectl = match vars.get("KUBECTL") {
            Some(value) if value.trim().is_empty() => {
                return Err(ConfigError::EmptyValue {
                    name: "KUBECTL".to_string(),
                })
            }
            Some(value) => value.clone(),
            None => DEFAULT_KUBECTL.to_string(),
        };

        Ok(Self {
            cluster,
            manifest_path,
            readiness_timeout,
            kubectl,
        })
    }

    /// Target a specific cluster instead of the environment default.
    #[must_use]
    pub fn with_cluster(mut self, cluster: impl Into<String>) -> Self {
        self.cluster = Some(cluster.into());
        self
    }

    /// Set the deployment manifest path.
    #[must_use]
    pub fn with_manifest_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.manifest_path = path.into();
        self
    }

    /// Set the readiness timeout.
    #[must_use]
    pub fn with_readiness_timeout(mut self, timeout: Duration) -> Self {
        self.readiness_timeout = timeout;
        self
    }
}
