//! Resource tracking for test fixtures.
//!
//! Fixtures register themselves with a [`ResourceContext`] so that teardown
//! can be driven by the surrounding test harness, newest resource first.

use crate::cluster::{Environment, NamespaceFactory};
use crate::error::ClusterError;
use async_trait::async_trait;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

/// Identity assigned by the registry when a resource is tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub u64);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Something the registry must close at teardown.
#[async_trait]
pub trait Resource: Send + Sync {
    async fn close(&self) -> Result<(), ClusterError>;
}

/// What a fixture needs from the surrounding test harness.
pub trait ResourceContext: Send + Sync {
    fn environment(&self) -> &Environment;

    fn namespaces(&self) -> Arc<dyn NamespaceFactory>;

    /// Register `resource` for teardown and return its identity.
    fn track_resource(&self, resource: Arc<dyn Resource>) -> ResourceId;
}

/// Default [`ResourceContext`]: an environment, a namespace factory and a
/// registry of tracked resources.
pub struct FixtureContext {
    environment: Environment,
    namespaces: Arc<dyn NamespaceFactory>,
    next_id: AtomicU64,
    resources: Mutex<Vec<(ResourceId, Arc<dyn Resource>)>>,
}

impl fmt::Debug for FixtureContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixtureContext")
            .field("environment", &self.environment)
            .field("tracked", &self.tracked_count())
            .finish()
    }
}

impl FixtureContext {
    pub fn new(environment: Environment, namespaces: Arc<dyn NamespaceFactory>) -> Self {
        Self {
            environment,
            namespaces,
            next_id: AtomicU64::new(1),
            resources: Mutex::new(Vec::new()),
        }
    }

    /// Number of resources registered and not yet torn down.
    pub fn tracked_count(&self) -> usize {
        self.resources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Close every tracked resource in reverse registration order.
    ///
    /// Close failures are logged and do not stop the remaining teardown.
    pub async fn teardown(&self) {
        loop {
            let next = self
                .resources
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop();

            let Some((id, resource)) = next else {
                break;
            };

            debug!(target: "fixture.teardown", resource = %id, "Closing tracked resource");
            if let Err(e) = resource.close().await {
                warn!(target: "fixture.teardown", resource = %id, error = %e, "Failed to close resource");
            }
        }
    }
}

impl ResourceContext for FixtureContext {
    fn environment(&self) -> &Environment {
        &self.environment
    }

    fn namespaces(&self) -> Arc<dyn NamespaceFactory> {
        Arc::clone(&self.namespaces)
    }

    fn track_resource(&self, resource: Arc<dyn Resource>) -> ResourceId {
        let id = ResourceId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.resources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, resource));
        id
    }
}
