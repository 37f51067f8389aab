//! Access to the cluster's child resources and its cleanup marker.

use async_trait::async_trait;

use crate::error::Result;
use crate::naming::ClusterIdentity;
use crate::stack::{ChildResource, ResourceKind};

pub mod kubernetes;
#[cfg(test)]
pub mod memory;

pub use kubernetes::KubeStore;

/// Remote object store holding the children of every cluster.
///
/// All operations are keyed by kind, namespace and name. `delete` treats a
/// missing object as already deleted.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn get(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ChildResource>>;

    async fn list(
        &self,
        kind: ResourceKind,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<ChildResource>>;

    async fn create(&self, resource: &ChildResource) -> Result<ChildResource>;

    async fn replace(&self, resource: &ChildResource) -> Result<ChildResource>;

    async fn delete(&self, kind: ResourceKind, namespace: &str, name: &str) -> Result<()>;

    /// Attach the cleanup marker to the cluster object.
    async fn add_finalizer(&self, cluster: &ClusterIdentity) -> Result<()>;

    /// Detach the cleanup marker, letting the deletion of the cluster object
    /// complete.
    async fn remove_finalizer(&self, cluster: &ClusterIdentity) -> Result<()>;
}
