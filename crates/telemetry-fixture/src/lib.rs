//! Mock Telemetry Backend Test Fixture
//!
//! Deploys a mock telemetry backend into a fresh namespace, waits for its pod
//! to become ready, opens a port-forward to it and fetches the metric time
//! series and log entries it has buffered. Fetched records are normalized so
//! tests can compare them against golden values.
//!
//! # Usage
//!
//! ```no_run
//! use telemetry_fixture::{kubectl, FixtureConfig, MockTelemetryBackend};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = FixtureConfig::from_env()?;
//! let ctx = kubectl::fixture_context(&config);
//!
//! let backend = MockTelemetryBackend::provision(&ctx, &config).await?;
//! let entries = backend.list_log_entries().await?;
//! assert!(entries.iter().all(|e| e.timestamp.is_none()));
//!
//! ctx.teardown().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - `cluster`: enables tests that need a live cluster and kubectl in PATH

pub mod backend;
pub mod cluster;
pub mod config;
pub mod context;
pub mod error;
pub mod eventual;
pub mod fetch;
pub mod kubectl;
pub mod logging;
pub mod normalize;
pub mod records;
mod teardown;

pub use backend::{
    MockTelemetryBackend, TelemetryBackend, BACKEND_PORT, NAMESPACE_PREFIX, POD_SELECTOR,
};
pub use cluster::{
    Cluster, Environment, Namespace, NamespaceConfig, NamespaceFactory, Pod, PodFetch, Tunnel,
};
pub use config::{ConfigError, FixtureConfig};
pub use context::{FixtureContext, Resource, ResourceContext, ResourceId};
pub use error::{ClusterError, ProvisionError};
pub use fetch::{FetchError, TelemetryClient};
pub use normalize::Normalize;
