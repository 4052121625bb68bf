//! In-memory cluster collaborators.
//!
//! `FakeCluster` records every call it receives in a shared [`CallLog`] and
//! can be told to fail any provisioning step, so tests can assert ordering
//! and cleanup without a real cluster.
//!
//! # Example
//!
//! ```rust,ignore
//! use fixture_test_utils::FakeCluster;
//!
//! let cluster = FakeCluster::new("primary")
//!     .with_tunnel_address(server.address())
//!     .failing_apply("resource quota exceeded");
//! let ctx = cluster.context();
//! ```

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use telemetry_fixture::cluster::PodFetch;
use telemetry_fixture::{
    Cluster, ClusterError, Environment, FixtureContext, Namespace, NamespaceConfig,
    NamespaceFactory, Pod, Tunnel,
};

/// A collaborator call observed by the fakes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateNamespace { prefix: String },
    ApplyContents { namespace: String },
    DeleteContents { namespace: String },
    WaitUntilPodsAreReady { namespace: String, selector: String },
    NewPortForwarder { pod: String, local_port: u16, remote_port: u16 },
    StartTunnel,
    CloseTunnel,
    DeleteNamespace { name: String },
}

/// Shared, ordered record of collaborator calls.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    fn record(&self, call: Call) {
        self.0.lock().unwrap().push(call);
    }

    /// Snapshot of every call so far, oldest first.
    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    pub fn contains(&self, call: &Call) -> bool {
        self.0.lock().unwrap().contains(call)
    }

    /// True if any recorded call satisfies `pred`.
    pub fn any(&self, pred: impl Fn(&Call) -> bool) -> bool {
        self.0.lock().unwrap().iter().any(pred)
    }
}

/// Which step a [`FakeCluster`] should fail, and with what message.
#[derive(Debug, Clone, Default)]
struct Failures {
    namespace: Option<String>,
    apply: Option<String>,
    readiness: Option<String>,
    port_forward: Option<String>,
    tunnel_start: Option<String>,
    namespace_delete: Option<String>,
}

fn fail(message: &Option<String>) -> Result<(), ClusterError> {
    match message {
        Some(m) => Err(ClusterError::Other(m.clone())),
        None => Ok(()),
    }
}

/// Fake cluster with configurable failures.
#[derive(Debug, Clone)]
pub struct FakeCluster {
    name: String,
    log: CallLog,
    failures: Failures,
    ready_pods: usize,
    tunnel_address: String,
    manifests: Arc<Mutex<Vec<(String, String)>>>,
}

impl FakeCluster {
    /// A cluster where every step succeeds and one pod becomes ready.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            log: CallLog::default(),
            failures: Failures::default(),
            ready_pods: 1,
            tunnel_address: "127.0.0.1:1".to_string(),
            manifests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Address the fake tunnel reports once started.
    pub fn with_tunnel_address(mut self, address: impl Into<String>) -> Self {
        self.tunnel_address = address.into();
        self
    }

    /// Number of pods the readiness wait reports.
    pub fn with_ready_pods(mut self, count: usize) -> Self {
        self.ready_pods = count;
        self
    }

    pub fn failing_namespace_creation(mut self, message: &str) -> Self {
        self.failures.namespace = Some(message.to_string());
        self
    }

    pub fn failing_apply(mut self, message: &str) -> Self {
        self.failures.apply = Some(message.to_string());
        self
    }

    pub fn failing_readiness(mut self, message: &str) -> Self {
        self.failures.readiness = Some(message.to_string());
        self
    }

    pub fn failing_port_forward(mut self, message: &str) -> Self {
        self.failures.port_forward = Some(message.to_string());
        self
    }

    pub fn failing_tunnel_start(mut self, message: &str) -> Self {
        self.failures.tunnel_start = Some(message.to_string());
        self
    }

    pub fn failing_namespace_delete(mut self, message: &str) -> Self {
        self.failures.namespace_delete = Some(message.to_string());
        self
    }

    pub fn log(&self) -> &CallLog {
        &self.log
    }

    /// `(namespace, contents)` of every successful apply.
    pub fn applied_manifests(&self) -> Vec<(String, String)> {
        self.manifests.lock().unwrap().clone()
    }

    /// Namespace factory sharing this cluster's call log and failures.
    pub fn namespace_factory(&self) -> FakeNamespaceFactory {
        FakeNamespaceFactory {
            log: self.log.clone(),
            create_failure: self.failures.namespace.clone(),
            delete_failure: self.failures.namespace_delete.clone(),
            created: Arc::new(Mutex::new(0)),
        }
    }

    /// A fixture context whose only cluster is this one.
    pub fn context(&self) -> FixtureContext {
        FixtureContext::new(
            Environment::single(Arc::new(self.clone())),
            Arc::new(self.namespace_factory()),
        )
    }
}

#[async_trait]
impl Cluster for FakeCluster {
    fn name(&self) -> &str {
        &self.name
    }

    async fn apply_contents(&self, namespace: &str, contents: &str) -> Result<(), ClusterError> {
        self.log.record(Call::ApplyContents {
            namespace: namespace.to_string(),
        });
        fail(&self.failures.apply)?;
        self.manifests
            .lock()
            .unwrap()
            .push((namespace.to_string(), contents.to_string()));
        Ok(())
    }

    async fn delete_contents(&self, namespace: &str, _contents: &str) -> Result<(), ClusterError> {
        self.log.record(Call::DeleteContents {
            namespace: namespace.to_string(),
        });
        Ok(())
    }

    async fn wait_until_pods_are_ready(&self, fetch: &PodFetch) -> Result<Vec<Pod>, ClusterError> {
        self.log.record(Call::WaitUntilPodsAreReady {
            namespace: fetch.namespace.clone(),
            selector: fetch.selector.clone(),
        });
        fail(&self.failures.readiness)?;
        Ok((0..self.ready_pods)
            .map(|i| Pod {
                name: format!("mock-telemetry-{i}"),
                namespace: fetch.namespace.clone(),
            })
            .collect())
    }

    async fn new_port_forwarder(
        &self,
        pod: &Pod,
        local_port: u16,
        remote_port: u16,
    ) -> Result<Arc<dyn Tunnel>, ClusterError> {
        self.log.record(Call::NewPortForwarder {
            pod: pod.name.clone(),
            local_port,
            remote_port,
        });
        fail(&self.failures.port_forward)?;
        Ok(Arc::new(FakeTunnel {
            log: self.log.clone(),
            address: self.tunnel_address.clone(),
            start_failure: self.failures.tunnel_start.clone(),
            started: Mutex::new(false),
        }))
    }
}

/// Tunnel that reports a fixed address once started.
#[derive(Debug)]
pub struct FakeTunnel {
    log: CallLog,
    address: String,
    start_failure: Option<String>,
    started: Mutex<bool>,
}

#[async_trait]
impl Tunnel for FakeTunnel {
    async fn start(&self) -> Result<(), ClusterError> {
        self.log.record(Call::StartTunnel);
        fail(&self.start_failure)?;
        *self.started.lock().unwrap() = true;
        Ok(())
    }

    fn address(&self) -> String {
        if *self.started.lock().unwrap() {
            self.address.clone()
        } else {
            String::new()
        }
    }

    async fn close(&self) -> Result<(), ClusterError> {
        self.log.record(Call::CloseTunnel);
        *self.started.lock().unwrap() = false;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct FakeNamespaceFactory {
    log: CallLog,
    create_failure: Option<String>,
    delete_failure: Option<String>,
    created: Arc<Mutex<u32>>,
}

#[async_trait]
impl NamespaceFactory for FakeNamespaceFactory {
    async fn new_namespace(
        &self,
        config: &NamespaceConfig,
    ) -> Result<Arc<dyn Namespace>, ClusterError> {
        self.log.record(Call::CreateNamespace {
            prefix: config.prefix.clone(),
        });
        fail(&self.create_failure)?;

        let mut created = self.created.lock().unwrap();
        *created += 1;
        Ok(Arc::new(FakeNamespace {
            log: self.log.clone(),
            name: format!("{}-{:08x}", config.prefix, *created),
            delete_failure: self.delete_failure.clone(),
        }))
    }
}

#[derive(Debug)]
pub struct FakeNamespace {
    log: CallLog,
    name: String,
    delete_failure: Option<String>,
}

#[async_trait]
impl Namespace for FakeNamespace {
    fn name(&self) -> &str {
        &self.name
    }

    async fn delete(&self) -> Result<(), ClusterError> {
        self.log.record(Call::DeleteNamespace {
            name: self.name.clone(),
        });
        fail(&self.delete_failure)
    }
}
