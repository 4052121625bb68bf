//! kubectl-backed cluster collaborators.
//!
//! Everything here shells out to `kubectl`, optionally pinned to a kubeconfig
//! context. Manifests are piped on stdin so nothing is written to disk.

mod namespace;
mod port_forward;

pub use namespace::{KubectlNamespace, KubectlNamespaceFactory};
pub use port_forward::KubectlPortForwarder;

use crate::cluster::{Cluster, Environment, Pod, PodFetch, Tunnel};
use crate::config::FixtureConfig;
use crate::context::FixtureContext;
use crate::error::ClusterError;
use crate::eventual::{poll_until, Poll, PollError, DEFAULT_INITIAL_DELAY};
use async_trait::async_trait;
use serde::Deserialize;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Cluster name used when no kubeconfig context is pinned.
pub const DEFAULT_CLUSTER_NAME: &str = "default";

/// Invokes kubectl with an optional `--context`.
#[derive(Debug, Clone)]
pub struct Kubectl {
    binary: String,
    context: Option<String>,
}

impl Kubectl {
    pub fn new(binary: impl Into<String>, context: Option<String>) -> Self {
        Self {
            binary: binary.into(),
            context,
        }
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.binary);
        if let Some(context) = &self.context {
            cmd.arg("--context").arg(context);
        }
        cmd.args(args);
        cmd
    }

    fn describe(&self, args: &[&str]) -> String {
        let mut parts = vec![self.binary.as_str()];
        if let Some(context) = &self.context {
            parts.push("--context");
            parts.push(context);
        }
        parts.extend_from_slice(args);
        parts.join(" ")
    }

    /// Run to completion and return stdout. Non-zero exit is an error.
    pub async fn run(&self, args: &[&str], stdin: Option<&str>) -> Result<String, ClusterError> {
        let command = self.describe(args);
        debug!(target: "fixture.kubectl", command = %command, "Running kubectl");

        let mut child = self
            .command(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ClusterError::Spawn {
                command: command.clone(),
                source,
            })?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input.as_bytes())
                .await
                .map_err(|source| ClusterError::Spawn {
                    command: command.clone(),
                    source,
                })?;
            // Dropping the pipe closes stdin so kubectl sees EOF.
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|source| ClusterError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ClusterError::CommandFailed {
                command,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    pub(crate) fn spawn_streaming(&self, args: &[&str]) -> Result<tokio::process::Child, ClusterError> {
        let command = self.describe(args);
        debug!(target: "fixture.kubectl", command = %command, "Spawning kubectl");

        self.command(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ClusterError::Spawn { command, source })
    }
}

/// A cluster reached through kubectl.
#[derive(Debug, Clone)]
pub struct KubectlCluster {
    name: String,
    kubectl: Kubectl,
    readiness_timeout: Duration,
}

impl KubectlCluster {
    pub fn new(kubectl: Kubectl, name: impl Into<String>, readiness_timeout: Duration) -> Self {
        Self {
            name: name.into(),
            kubectl,
            readiness_timeout,
        }
    }

    /// Build from fixture configuration. The configured cluster, if any, is
    /// used as the kubeconfig context.
    pub fn from_config(config: &FixtureConfig) -> Self {
        let kubectl = Kubectl::new(config.kubectl.clone(), config.cluster.clone());
        let name = config
            .cluster
            .clone()
            .unwrap_or_else(|| DEFAULT_CLUSTER_NAME.to_string());
        Self::new(kubectl, name, config.readiness_timeout)
    }

    pub fn kubectl(&self) -> &Kubectl {
        &self.kubectl
    }

    async fn fetch_pods(&self, fetch: &PodFetch) -> Result<Vec<PodStatus>, ClusterError> {
        let args = [
            "get",
            "pods",
            "-n",
            fetch.namespace.as_str(),
            "-l",
            fetch.selector.as_str(),
            "-o",
            "json",
        ];
        let stdout = self.kubectl.run(&args, None).await?;
        let list: PodList =
            serde_json::from_str(&stdout).map_err(|e| ClusterError::UnexpectedOutput {
                command: self.kubectl.describe(&args),
                message: e.to_string(),
            })?;
        Ok(list.items)
    }

    async fn check_ready(&self, fetch: &PodFetch) -> Poll<Vec<Pod>, ClusterError> {
        let pods = match self.fetch_pods(fetch).await {
            Ok(pods) => pods,
            // kubectl may fail transiently while the API server settles.
            Err(e @ ClusterError::CommandFailed { .. }) => return Poll::Pending(e),
            Err(e) => return Poll::Failed(e),
        };

        if fetch.single && pods.len() != 1 {
            return Poll::Pending(ClusterError::Other(format!(
                "expected exactly one pod matching {} in {}, found {}",
                fetch.selector,
                fetch.namespace,
                pods.len()
            )));
        }

        if pods.is_empty() {
            return Poll::Pending(ClusterError::Other(format!(
                "no pods matching {} in {}",
                fetch.selector, fetch.namespace
            )));
        }

        if let Some(not_ready) = pods.iter().find(|p| !p.is_ready()) {
            return Poll::Pending(ClusterError::Other(format!(
                "pod {} is not ready (phase {})",
                not_ready.metadata.name,
                not_ready.status.phase.as_deref().unwrap_or("Unknown")
            )));
        }

        Poll::Ready(
            pods.into_iter()
                .map(|p| Pod {
                    name: p.metadata.name,
                    namespace: p.metadata.namespace.unwrap_or_else(|| fetch.namespace.clone()),
                })
                .collect(),
        )
    }
}

#[async_trait]
impl Cluster for KubectlCluster {
    fn name(&self) -> &str {
        &self.name
    }

    async fn apply_contents(&self, namespace: &str, contents: &str) -> Result<(), ClusterError> {
        self.kubectl
            .run(&["apply", "-n", namespace, "-f", "-"], Some(contents))
            .await
            .map(|_| ())
    }

    async fn delete_contents(&self, namespace: &str, contents: &str) -> Result<(), ClusterError> {
        self.kubectl
            .run(
                &["delete", "-n", namespace, "--ignore-not-found", "-f", "-"],
                Some(contents),
            )
            .await
            .map(|_| ())
    }

    #[instrument(skip_all, fields(namespace = %fetch.namespace, selector = %fetch.selector))]
    async fn wait_until_pods_are_ready(&self, fetch: &PodFetch) -> Result<Vec<Pod>, ClusterError> {
        poll_until(self.readiness_timeout, DEFAULT_INITIAL_DELAY, || {
            self.check_ready(fetch)
        })
        .await
        .map_err(|e| match e {
            PollError::TimedOut(last) => ClusterError::Timeout {
                what: format!(
                    "pods {} in {} to become ready ({last})",
                    fetch.selector, fetch.namespace
                ),
                seconds: self.readiness_timeout.as_secs(),
            },
            PollError::Failed(e) => e,
        })
    }

    async fn new_port_forwarder(
        &self,
        pod: &Pod,
        local_port: u16,
        remote_port: u16,
    ) -> Result<Arc<dyn Tunnel>, ClusterError> {
        Ok(Arc::new(KubectlPortForwarder::new(
            self.kubectl.clone(),
            pod.clone(),
            local_port,
            remote_port,
        )))
    }
}

/// Build a [`FixtureContext`] whose only cluster is reached through kubectl.
pub fn fixture_context(config: &FixtureConfig) -> FixtureContext {
    let cluster = KubectlCluster::from_config(config);
    let namespaces = KubectlNamespaceFactory::new(cluster.kubectl().clone());
    FixtureContext::new(
        Environment::single(Arc::new(cluster)),
        Arc::new(namespaces),
    )
}

#[derive(Debug, Deserialize)]
struct PodList {
    #[serde(default)]
    items: Vec<PodStatus>,
}

#[derive(Debug, Deserialize)]
struct PodStatus {
    metadata: PodMetadata,
    #[serde(default)]
    status: PodStatusDetail,
}

#[derive(Debug, Deserialize)]
struct PodMetadata {
    name: String,
    #[serde(default)]
    namespace: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PodStatusDetail {
    #[serde(default)]
    phase: Option<String>,
    #[serde(default)]
    conditions: Vec<PodCondition>,
}

#[derive(Debug, Deserialize)]
struct PodCondition {
    #[serde(rename = "type")]
    condition_type: String,
    status: String,
}

impl PodStatus {
    fn is_ready(&self) -> bool {
        self.status
            .conditions
            .iter()
            .any(|c| c.condition_type == "Ready" && c.status == "True")
    }
}
