//! Provisioning of the mock telemetry backend.
//!
//! [`MockTelemetryBackend::provision`] runs the whole deploy sequence:
//! namespace, manifest, readiness, tunnel. It only returns once the tunnel is
//! live, so every instance a caller holds can be fetched from. Anything
//! acquired along the way is recorded on a teardown stack that is registered
//! with the resource registry before the first fallible cluster call.

use crate::cluster::{Cluster, NamespaceConfig, Pod, Tunnel};
use crate::config::FixtureConfig;
use crate::context::{Resource, ResourceContext, ResourceId};
use crate::error::{ClusterError, ProvisionError};
use crate::fetch::{FetchError, TelemetryClient};
use crate::records::{LogEntry, TimeSeries};
use crate::teardown::{Acquired, TeardownStack};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Prefix of the namespace created for each deployment.
pub const NAMESPACE_PREFIX: &str = "mock-telemetry";

/// Label selector matching the backend pod.
pub const POD_SELECTOR: &str = "app=mock-telemetry";

/// Port the backend serves buffered telemetry on inside the pod.
pub const BACKEND_PORT: u16 = 8091;

/// The provisioned test double, as seen by tests.
#[async_trait]
pub trait TelemetryBackend: Send + Sync {
    /// Name of the namespace the backend was deployed into.
    fn namespace_name(&self) -> &str;

    async fn list_time_series(&self) -> Result<Vec<TimeSeries>, FetchError>;

    async fn list_log_entries(&self) -> Result<Vec<LogEntry>, FetchError>;
}

/// A deployed, reachable mock telemetry backend.
///
/// Cloning is cheap; clones share the same deployment and teardown.
#[derive(Clone)]
pub struct MockTelemetryBackend {
    id: ResourceId,
    namespace: String,
    cluster: Arc<dyn Cluster>,
    tunnel: Arc<dyn Tunnel>,
    client: TelemetryClient,
    teardown: Arc<TeardownStack>,
}

// A provisioned backend is both a telemetry oracle and a registry resource.
const _: fn() = || {
    fn assert_contract<T: TelemetryBackend + Resource + Clone + 'static>() {}
    assert_contract::<MockTelemetryBackend>();
};

impl std::fmt::Debug for MockTelemetryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTelemetryBackend")
            .field("id", &self.id)
            .field("namespace", &self.namespace)
            .field("cluster", &self.cluster.name())
            .field("address", &self.tunnel.address())
            .finish()
    }
}

impl MockTelemetryBackend {
    /// Deploy the backend and return once it is reachable through a tunnel.
    ///
    /// On failure everything acquired so far is torn down (best effort) and
    /// the error of the failing step is returned.
    pub async fn provision(
        ctx: &dyn ResourceContext,
        config: &FixtureConfig,
    ) -> Result<Self, ProvisionError> {
        info!(target: "fixture.ci", "=== BEGIN: Deploy mock telemetry backend ===");

        let cluster = match ctx
            .environment()
            .cluster_or_default(config.cluster.as_deref())
        {
            Ok(cluster) => cluster,
            Err(e) => {
                let e = ProvisionError::ClusterResolution(e);
                error!(target: "fixture.ci", error = %e, "=== FAILED: Deploy mock telemetry backend ===");
                return Err(e);
            }
        };

        let teardown = Arc::new(TeardownStack::default());
        let id = ctx.track_resource(teardown.clone());

        match Self::deploy(ctx, config, id, cluster, teardown.clone()).await {
            Ok(backend) => {
                info!(
                    target: "fixture.ci",
                    namespace = %backend.namespace,
                    address = %backend.address(),
                    "=== SUCCEEDED: Deploy mock telemetry backend ==="
                );
                Ok(backend)
            }
            Err(e) => {
                error!(target: "fixture.ci", error = %e, "=== FAILED: Deploy mock telemetry backend ===");
                teardown.unwind().await;
                Err(e)
            }
        }
    }

    async fn deploy(
        ctx: &dyn ResourceContext,
        config: &FixtureConfig,
        id: ResourceId,
        cluster: Arc<dyn Cluster>,
        teardown: Arc<TeardownStack>,
    ) -> Result<Self, ProvisionError> {
        let namespace = ctx
            .namespaces()
            .new_namespace(&NamespaceConfig {
                prefix: NAMESPACE_PREFIX.to_string(),
            })
            .await
            .map_err(|source| ProvisionError::NamespaceCreation {
                prefix: NAMESPACE_PREFIX.to_string(),
                source,
            })?;
        let ns_name = namespace.name().to_string();
        teardown.push(Acquired::Namespace(namespace)).await;
        debug!(target: "fixture.provision", resource = %id, namespace = %ns_name, "Namespace created");

        let manifest_path = &config.manifest_path;
        let contents = tokio::fs::read_to_string(manifest_path)
            .await
            .map_err(|source| ProvisionError::ManifestRead {
                path: manifest_path.clone(),
                source,
            })?;

        cluster
            .apply_contents(&ns_name, &contents)
            .await
            .map_err(|source| ProvisionError::ManifestApply {
                path: manifest_path.clone(),
                source,
            })?;
        teardown
            .push(Acquired::Manifest {
                cluster: cluster.clone(),
                namespace: ns_name.clone(),
                contents,
            })
            .await;
        debug!(
            target: "fixture.provision",
            namespace = %ns_name,
            manifest = %manifest_path.display(),
            "Manifest applied"
        );

        let fetch = cluster.new_single_pod_fetch(&ns_name, POD_SELECTOR);
        let pods = cluster
            .wait_until_pods_are_ready(&fetch)
            .await
            .map_err(ProvisionError::Readiness)?;
        let pod = single_pod(pods)?;
        debug!(target: "fixture.provision", pod = %pod, "Backend pod ready");

        let tunnel = cluster
            .new_port_forwarder(&pod, 0, BACKEND_PORT)
            .await
            .map_err(ProvisionError::Tunnel)?;
        tunnel.start().await.map_err(ProvisionError::Tunnel)?;
        teardown.push(Acquired::Tunnel(tunnel.clone())).await;

        let address = tunnel.address();
        debug!(target: "fixture.provision", address = %address, "Initialized mock telemetry port forwarder");

        let client = TelemetryClient::new(&address).map_err(|e| {
            ProvisionError::Tunnel(ClusterError::Other(format!(
                "failed to build HTTP client for {address}: {e}"
            )))
        })?;

        Ok(Self {
            id,
            namespace: ns_name,
            cluster,
            tunnel,
            client,
            teardown,
        })
    }

    /// Registry identity.
    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn namespace_name(&self) -> &str {
        &self.namespace
    }

    /// Name of the cluster the backend runs in.
    pub fn cluster_name(&self) -> &str {
        self.cluster.name()
    }

    /// Local `host:port` of the tunnel to the backend.
    pub fn address(&self) -> String {
        self.tunnel.address()
    }

    /// Buffered metric time series, normalized for comparison.
    pub async fn list_time_series(&self) -> Result<Vec<TimeSeries>, FetchError> {
        self.client.list_time_series().await
    }

    /// Buffered log entries, normalized for comparison.
    pub async fn list_log_entries(&self) -> Result<Vec<LogEntry>, FetchError> {
        self.client.list_log_entries().await
    }

    /// Stop the tunnel and remove the deployment and its namespace.
    ///
    /// Teardown failures are logged, not returned. Closing twice is a no-op.
    pub async fn close(&self) -> Result<(), ClusterError> {
        self.teardown.unwind().await;
        Ok(())
    }
}

/// The readiness wait must yield exactly one backend pod.
fn single_pod(pods: Vec<Pod>) -> Result<Pod, ProvisionError> {
    let found = pods.len();
    let mut pods = pods.into_iter();
    match (pods.next(), pods.next()) {
        (Some(pod), None) => Ok(pod),
        _ => Err(ProvisionError::UnexpectedPodCount {
            selector: POD_SELECTOR.to_string(),
            found,
        }),
    }
}

#[async_trait]
impl TelemetryBackend for MockTelemetryBackend {
    fn namespace_name(&self) -> &str {
        MockTelemetryBackend::namespace_name(self)
    }

    async fn list_time_series(&self) -> Result<Vec<TimeSeries>, FetchError> {
        MockTelemetryBackend::list_time_series(self).await
    }

    async fn list_log_entries(&self) -> Result<Vec<LogEntry>, FetchError> {
        MockTelemetryBackend::list_log_entries(self).await
    }
}

#[async_trait]
impl Resource for MockTelemetryBackend {
    async fn close(&self) -> Result<(), ClusterError> {
        MockTelemetryBackend::close(self).await
    }
}
