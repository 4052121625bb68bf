//! Error types for cluster collaborators and the provisioning pipeline.
//!
//! Fetch errors live with the fetcher in [`crate::fetch`]; they are opaque by
//! contract and carry no stage information.

use std::path::PathBuf;
use thiserror::Error;

/// Errors reported by cluster collaborators (cluster, namespace, tunnel).
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("Unknown cluster: {0}")]
    UnknownCluster(String),

    #[error("No default cluster configured in the environment")]
    NoDefaultCluster,

    #[error("Failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("Unexpected output from `{command}`: {message}")]
    UnexpectedOutput { command: String, message: String },

    #[error("Timed out after {seconds}s waiting for {what}")]
    Timeout { what: String, seconds: u64 },

    #[error("Tunnel is not started")]
    TunnelNotStarted,

    #[error("{0}")]
    Other(String),
}

/// Errors returned by [`crate::MockTelemetryBackend::provision`].
///
/// Each variant identifies the failing stage. Readiness and tunnel failures
/// are passed through unmodified.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("Could not resolve target cluster: {0}")]
    ClusterResolution(#[source] ClusterError),

    #[error("Could not create {prefix} namespace for mock telemetry install: {source}")]
    NamespaceCreation {
        prefix: String,
        #[source]
        source: ClusterError,
    },

    #[error("Failed to read {}: {source}", path.display())]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to apply rendered {}: {source}", path.display())]
    ManifestApply {
        path: PathBuf,
        #[source]
        source: ClusterError,
    },

    #[error(transparent)]
    Readiness(ClusterError),

    #[error("Expected exactly one pod matching {selector}, found {found}")]
    UnexpectedPodCount { selector: String, found: usize },

    #[error(transparent)]
    Tunnel(ClusterError),
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_apply_message_contains_path_and_cause() {
        let err = ProvisionError::ManifestApply {
            path: PathBuf::from("/tmp/install.yaml"),
            source: ClusterError::Other("resource quota exceeded".to_string()),
        };

        let message = err.to_string();
        assert!(message.contains("/tmp/install.yaml"));
        assert!(message.contains("resource quota exceeded"));
    }

    #[test]
    fn test_readiness_error_is_unmodified() {
        let inner = ClusterError::Timeout {
            what: "pods app=x".to_string(),
            seconds: 3,
        };
        let expected = inner.to_string();

        assert_eq!(ProvisionError::Readiness(inner).to_string(), expected);
    }

    #[test]
    fn test_namespace_creation_names_prefix() {
        let err = ProvisionError::NamespaceCreation {
            prefix: "mock-telemetry".to_string(),
            source: ClusterError::Other("forbidden".to_string()),
        };

        assert_eq!(
            err.to_string(),
            "Could not create mock-telemetry namespace for mock telemetry install: forbidden"
        );
    }
}
