//! `kubectl port-forward` as a [`Tunnel`].

use super::Kubectl;
use crate::cluster::{Pod, Tunnel};
use crate::error::ClusterError;
use async_trait::async_trait;
use std::sync::{Mutex as StdMutex, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Child;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// How long kubectl gets to report the forwarded port.
const START_TIMEOUT: Duration = Duration::from_secs(30);

const LOCAL_HOST: &str = "127.0.0.1";

/// Extract the local port from kubectl's `Forwarding from 127.0.0.1:PORT -> REMOTE` line.
pub(crate) fn parse_forwarding_line(line: &str) -> Option<u16> {
    let rest = line
        .trim()
        .strip_prefix("Forwarding from ")?
        .strip_prefix(LOCAL_HOST)?
        .strip_prefix(':')?;
    let port = rest.split_whitespace().next()?;
    port.parse().ok()
}

pub struct KubectlPortForwarder {
    kubectl: Kubectl,
    pod: Pod,
    local_port: u16,
    remote_port: u16,
    /// Set while the child is running; cleared on close.
    address: StdMutex<Option<String>>,
    child: Mutex<Option<Child>>,
}

impl KubectlPortForwarder {
    pub fn new(kubectl: Kubectl, pod: Pod, local_port: u16, remote_port: u16) -> Self {
        Self {
            kubectl,
            pod,
            local_port,
            remote_port,
            address: StdMutex::new(None),
            child: Mutex::new(None),
        }
    }

    fn command_args(&self) -> Vec<String> {
        vec![
            "port-forward".to_string(),
            "-n".to_string(),
            self.pod.namespace.clone(),
            format!("pod/{}", self.pod.name),
            format!("{}:{}", self.local_port, self.remote_port),
            "--address".to_string(),
            LOCAL_HOST.to_string(),
        ]
    }
}

#[async_trait]
impl Tunnel for KubectlPortForwarder {
    async fn start(&self) -> Result<(), ClusterError> {
        let mut guard = self.child.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        let args = self.command_args();
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let command = self.kubectl.describe(&arg_refs);
        let mut child = self.kubectl.spawn_streaming(&arg_refs)?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ClusterError::UnexpectedOutput {
                command: command.clone(),
                message: "stdout not captured".to_string(),
            })?;
        let mut lines = BufReader::new(stdout).lines();

        let port = tokio::time::timeout(START_TIMEOUT, async {
            while let Some(line) = lines.next_line().await? {
                debug!(target: "fixture.kubectl", line = %line, "port-forward output");
                if let Some(port) = parse_forwarding_line(&line) {
                    return Ok(Some(port));
                }
            }
            Ok::<_, std::io::Error>(None)
        })
        .await;

        let port = match port {
            Ok(Ok(Some(port))) => port,
            Ok(Ok(None)) => {
                let mut stderr = String::new();
                if let Some(mut pipe) = child.stderr.take() {
                    let _ = pipe.read_to_string(&mut stderr).await;
                }
                let status = match child.wait().await {
                    Ok(status) => status.to_string(),
                    Err(e) => e.to_string(),
                };
                return Err(ClusterError::CommandFailed {
                    command,
                    status,
                    stderr: stderr.trim().to_string(),
                });
            }
            Ok(Err(source)) => return Err(ClusterError::Spawn { command, source }),
            Err(_) => {
                return Err(ClusterError::Timeout {
                    what: format!("{command} to report its local port"),
                    seconds: START_TIMEOUT.as_secs(),
                })
            }
        };

        // kubectl logs every handled connection; keep both pipes drained.
        tokio::spawn(async move {
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(target: "fixture.kubectl", line = %line, "port-forward output");
            }
        });
        if let Some(stderr) = child.stderr.take() {
            let mut lines = BufReader::new(stderr).lines();
            tokio::spawn(async move {
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "fixture.kubectl", line = %line, "port-forward stderr");
                }
            });
        }

        let address = format!("{LOCAL_HOST}:{port}");
        info!(target: "fixture.kubectl", pod = %self.pod, address = %address, "Port-forward started");
        *self.address.lock().unwrap_or_else(PoisonError::into_inner) = Some(address);
        *guard = Some(child);
        Ok(())
    }

    fn address(&self) -> String {
        self.address
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .unwrap_or_default()
    }

    async fn close(&self) -> Result<(), ClusterError> {
        let Some(mut child) = self.child.lock().await.take() else {
            return Ok(());
        };
        self.address
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        child
            .kill()
            .await
            .map_err(|e| ClusterError::Other(format!("failed to stop port-forward: {e}")))?;

        info!(target: "fixture.kubectl", pod = %self.pod, "Port-forward stopped");
        Ok(())
    }
}
