//! Namespaces created and deleted through kubectl.

use super::Kubectl;
use crate::cluster::{Namespace, NamespaceConfig, NamespaceFactory};
use crate::error::ClusterError;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Length of the random suffix appended to the namespace prefix.
const SUFFIX_LEN: usize = 8;

/// Unique namespace name for `prefix`.
pub(crate) fn unique_name(prefix: &str) -> String {
    let suffix: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(SUFFIX_LEN)
        .collect();
    format!("{prefix}-{suffix}")
}

#[derive(Debug, Clone)]
pub struct KubectlNamespaceFactory {
    kubectl: Kubectl,
}

impl KubectlNamespaceFactory {
    pub fn new(kubectl: Kubectl) -> Self {
        Self { kubectl }
    }
}

#[async_trait]
impl NamespaceFactory for KubectlNamespaceFactory {
    async fn new_namespace(
        &self,
        config: &NamespaceConfig,
    ) -> Result<Arc<dyn Namespace>, ClusterError> {
        let name = unique_name(&config.prefix);
        self.kubectl
            .run(&["create", "namespace", name.as_str()], None)
            .await?;

        info!(target: "fixture.kubectl", namespace = %name, "Created namespace");

        Ok(Arc::new(KubectlNamespace {
            kubectl: self.kubectl.clone(),
            name,
        }))
    }
}

#[derive(Debug)]
pub struct KubectlNamespace {
    kubectl: Kubectl,
    name: String,
}

#[async_trait]
impl Namespace for KubectlNamespace {
    fn name(&self) -> &str {
        &self.name
    }

    async fn delete(&self) -> Result<(), ClusterError> {
        self.kubectl
            .run(
                &[
                    "delete",
                    "namespace",
                    self.name.as_str(),
                    "--ignore-not-found",
                    "--wait=false",
                ],
                None,
            )
            .await?;

        info!(target: "fixture.kubectl", namespace = %self.name, "Deleted namespace");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_name_shape() {
        let name = unique_name("mock-telemetry");

        let suffix = name.strip_prefix("mock-telemetry-").unwrap();
        assert_eq!(suffix.len(), SUFFIX_LEN);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
        // DNS-1123 label limit
        assert!(name.len() <= 63);
    }

    #[test]
    fn test_unique_names_differ() {
        assert_ne!(unique_name("p"), unique_name("p"));
    }
}
