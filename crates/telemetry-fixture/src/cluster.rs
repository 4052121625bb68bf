//! Cluster collaborator contracts.
//!
//! The provisioner talks to the cluster only through these traits. The
//! kubectl-backed implementations live in [`crate::kubectl`]; tests use the
//! fakes in `fixture-test-utils`.

use crate::error::ClusterError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A pod discovered in a namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pod {
    pub name: String,
    pub namespace: String,
}

impl fmt::Display for Pod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Describes which pods a readiness wait should look at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodFetch {
    pub namespace: String,
    pub selector: String,
    /// The fetch reports an error until exactly one pod matches.
    pub single: bool,
}

/// A port-forward from a local endpoint to a port on a pod.
#[async_trait]
pub trait Tunnel: Send + Sync {
    /// Establish the forward. After this returns `Ok`, `address` is valid.
    async fn start(&self) -> Result<(), ClusterError>;

    /// Local `host:port` of the forward.
    fn address(&self) -> String;

    /// Stop forwarding. Stopping a tunnel that never started is a no-op.
    async fn close(&self) -> Result<(), ClusterError>;
}

/// Target cluster abstraction.
#[async_trait]
pub trait Cluster: Send + Sync {
    fn name(&self) -> &str;

    /// Apply manifest text into `namespace`.
    async fn apply_contents(&self, namespace: &str, contents: &str) -> Result<(), ClusterError>;

    /// Delete whatever `contents` describes from `namespace`.
    async fn delete_contents(&self, namespace: &str, contents: &str) -> Result<(), ClusterError>;

    fn new_single_pod_fetch(&self, namespace: &str, selector: &str) -> PodFetch {
        PodFetch {
            namespace: namespace.to_string(),
            selector: selector.to_string(),
            single: true,
        }
    }

    /// Block until every pod the fetch returns reports ready.
    async fn wait_until_pods_are_ready(&self, fetch: &PodFetch) -> Result<Vec<Pod>, ClusterError>;

    /// Create an unstarted port forwarder. A `local_port` of 0 picks an ephemeral port.
    async fn new_port_forwarder(
        &self,
        pod: &Pod,
        local_port: u16,
        remote_port: u16,
    ) -> Result<Arc<dyn Tunnel>, ClusterError>;
}

/// Namespace creation parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceConfig {
    pub prefix: String,
}

/// An isolated, uniquely named namespace.
#[async_trait]
pub trait Namespace: Send + Sync {
    fn name(&self) -> &str;

    async fn delete(&self) -> Result<(), ClusterError>;
}

/// Creates namespaces with unique names derived from a prefix.
#[async_trait]
pub trait NamespaceFactory: Send + Sync {
    async fn new_namespace(
        &self,
        config: &NamespaceConfig,
    ) -> Result<Arc<dyn Namespace>, ClusterError>;
}

/// The set of clusters a test run can target.
#[derive(Clone, Default)]
pub struct Environment {
    clusters: HashMap<String, Arc<dyn Cluster>>,
    default_cluster: Option<String>,
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.clusters.keys().collect();
        names.sort();
        f.debug_struct("Environment")
            .field("clusters", &names)
            .field("default_cluster", &self.default_cluster)
            .finish()
    }
}

impl Environment {
    /// Environment with a single cluster, which is also the default.
    pub fn single(cluster: Arc<dyn Cluster>) -> Self {
        Self::default().with_default_cluster(cluster)
    }

    /// Add a cluster. The first cluster added becomes the default.
    #[must_use]
    pub fn with_cluster(mut self, cluster: Arc<dyn Cluster>) -> Self {
        let name = cluster.name().to_string();
        if self.default_cluster.is_none() {
            self.default_cluster = Some(name.clone());
        }
        self.clusters.insert(name, cluster);
        self
    }

    /// Add a cluster and make it the default.
    #[must_use]
    pub fn with_default_cluster(mut self, cluster: Arc<dyn Cluster>) -> Self {
        let name = cluster.name().to_string();
        self.default_cluster = Some(name.clone());
        self.clusters.insert(name, cluster);
        self
    }

    /// Resolve `name`, or the default cluster when `name` is `None`.
    pub fn cluster_or_default(&self, name: Option<&str>) -> Result<Arc<dyn Cluster>, ClusterError> {
        let name = match name {
            Some(name) => name,
            None => self
                .default_cluster
                .as_deref()
                .ok_or(ClusterError::NoDefaultCluster)?,
        };

        self.clusters
            .get(name)
            .cloned()
            .ok_or_else(|| ClusterError::UnknownCluster(name.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    struct NamedCluster(&'static str);

    #[async_trait]
    impl Cluster for NamedCluster {
        fn name(&self) -> &str {
            self.0
        }

        async fn apply_contents(&self, _: &str, _: &str) -> Result<(), ClusterError> {
            Ok(())
        }

        async fn delete_contents(&self, _: &str, _: &str) -> Result<(), ClusterError> {
            Ok(())
        }

        async fn wait_until_pods_are_ready(&self, _: &PodFetch) -> Result<Vec<Pod>, ClusterError> {
            Ok(vec![])
        }

        async fn new_port_forwarder(
            &self,
            _: &Pod,
            _: u16,
            _: u16,
        ) -> Result<Arc<dyn Tunnel>, ClusterError> {
            Err(ClusterError::Other("unsupported".to_string()))
        }
    }

    #[test]
    fn test_first_cluster_becomes_default() {
        let env = Environment::default()
            .with_cluster(Arc::new(NamedCluster("primary")))
            .with_cluster(Arc::new(NamedCluster("remote")));

        assert_eq!(env.cluster_or_default(None).unwrap().name(), "primary");
        assert_eq!(
            env.cluster_or_default(Some("remote")).unwrap().name(),
            "remote"
        );
    }

    #[test]
    fn test_explicit_default_overrides() {
        let env = Environment::default()
            .with_cluster(Arc::new(NamedCluster("primary")))
            .with_default_cluster(Arc::new(NamedCluster("remote")));

        assert_eq!(env.cluster_or_default(None).unwrap().name(), "remote");
    }

    #[test]
    fn test_unknown_cluster() {
        let env = Environment::single(Arc::new(NamedCluster("primary")));

        let err = env.cluster_or_default(Some("missing")).err().unwrap();
        assert!(matches!(err, ClusterError::UnknownCluster(name) if name == "missing"));
    }

    #[test]
    fn test_empty_environment_has_no_default() {
        let err = Environment::default().cluster_or_default(None).err().unwrap();
        assert!(matches!(err, ClusterError::NoDefaultCluster));
    }

    #[test]
    fn test_single_pod_fetch_descriptor() {
        let fetch = NamedCluster("c").new_single_pod_fetch("ns-1", "app=x");
        assert_eq!(
            fetch,
            PodFetch {
                namespace: "ns-1".to_string(),
                selector: "app=x".to_string(),
                single: true,
            }
        );
    }
}
