//! Test utilities for the telemetry fixture
//!
//! This crate provides shared test utilities:
//! - In-memory cluster, tunnel and namespace fakes with a shared call log
//! - An HTTP server standing in for the deployed mock backend
//! - Record builders with realistic nondeterministic fields

pub mod fake_cluster;
pub mod fixtures;
pub mod server_harness;

pub use fake_cluster::{
    Call, CallLog, FakeCluster, FakeNamespace, FakeNamespaceFactory, FakeTunnel,
};
pub use server_harness::TestTelemetryServer;
