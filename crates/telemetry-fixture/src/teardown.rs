//! Scoped acquisition for provisioning.
//!
//! Every external resource acquired while provisioning is pushed onto a
//! [`TeardownStack`]. Unwinding releases them newest first. Release failures
//! are logged and never returned, so the caller only ever sees the error that
//! caused the unwind.

use crate::cluster::{Cluster, Namespace, Tunnel};
use crate::context::Resource;
use crate::error::ClusterError;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// A resource acquired during provisioning.
pub(crate) enum Acquired {
    Namespace(Arc<dyn Namespace>),
    Manifest {
        cluster: Arc<dyn Cluster>,
        namespace: String,
        contents: String,
    },
    Tunnel(Arc<dyn Tunnel>),
}

impl Acquired {
    fn describe(&self) -> String {
        match self {
            Acquired::Namespace(ns) => format!("namespace {}", ns.name()),
            Acquired::Manifest { namespace, .. } => format!("manifest in {namespace}"),
            Acquired::Tunnel(tunnel) => format!("tunnel {}", tunnel.address()),
        }
    }

    async fn release(self) -> Result<(), ClusterError> {
        match self {
            Acquired::Namespace(ns) => ns.delete().await,
            Acquired::Manifest {
                cluster,
                namespace,
                contents,
            } => cluster.delete_contents(&namespace, &contents).await,
            Acquired::Tunnel(tunnel) => tunnel.close().await,
        }
    }
}

#[derive(Default)]
pub(crate) struct TeardownStack {
    acquired: Mutex<Vec<Acquired>>,
}

impl TeardownStack {
    pub(crate) async fn push(&self, acquired: Acquired) {
        self.acquired.lock().await.push(acquired);
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.acquired.lock().await.len()
    }

    /// Release everything acquired so far, newest first.
    pub(crate) async fn unwind(&self) {
        loop {
            let next = self.acquired.lock().await.pop();
            let Some(acquired) = next else {
                break;
            };

            let what = acquired.describe();
            match acquired.release().await {
                Ok(()) => debug!(target: "fixture.teardown", resource = %what, "Released"),
                Err(e) => {
                    warn!(target: "fixture.teardown", resource = %what, error = %e, "Release failed")
                }
            }
        }
    }
}

#[async_trait]
impl Resource for TeardownStack {
    async fn close(&self) -> Result<(), ClusterError> {
        self.unwind().await;
        Ok(())
    }
}
