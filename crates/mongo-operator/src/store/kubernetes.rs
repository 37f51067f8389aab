use std::fmt::Debug;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Secret, Service};
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tracing::info;

use super::ResourceStore;
use crate::constants::{FIELD_MANAGER, FINALIZER};
use crate::crds::MongoCluster;
use crate::error::{is_kube_not_found, OperatorError, Result};
use crate::naming::ClusterIdentity;
use crate::stack::{ChildResource, ResourceKind};

/// `ResourceStore` backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    async fn patch_finalizers(
        &self,
        cluster: &ClusterIdentity,
        edit: impl FnOnce(&mut Vec<String>) -> bool,
    ) -> Result<()> {
        let api: Api<MongoCluster> = self.api(&cluster.namespace);
        let current = api.get(&cluster.name).await?;
        let mut finalizers = current.finalizers().to_vec();
        if !edit(&mut finalizers) {
            return Ok(());
        }

        // resourceVersion makes the merge patch fail on a concurrent edit
        // instead of clobbering someone else's finalizer.
        let patch = json!({
            "metadata": {
                "resourceVersion": current.resource_version(),
                "finalizers": finalizers,
            }
        });
        api.patch(
            &cluster.name,
            &PatchParams {
                field_manager: Some(FIELD_MANAGER.into()),
                ..Default::default()
            },
            &Patch::Merge(&patch),
        )
        .await?;
        Ok(())
    }
}

async fn get_opt<K>(api: Api<K>, name: &str) -> Result<Option<K>>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    Ok(api.get_opt(name).await?)
}

async fn list<K>(api: Api<K>, selector: &str) -> Result<Vec<K>>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    Ok(api.list(&ListParams::default().labels(selector)).await?.items)
}

async fn create<K>(api: Api<K>, resource: &K) -> Result<K>
where
    K: Resource + Clone + Serialize + DeserializeOwned + Debug,
{
    Ok(api.create(&PostParams::default(), resource).await?)
}

async fn replace<K>(api: Api<K>, resource: &K) -> Result<K>
where
    K: Resource + Clone + Serialize + DeserializeOwned + Debug,
{
    Ok(api
        .replace(&resource.name_any(), &PostParams::default(), resource)
        .await?)
}

async fn delete<K>(api: Api<K>, name: &str) -> Result<()>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    match api.delete(name, &DeleteParams::default()).await {
        Ok(_) => Ok(()),
        Err(e) if is_kube_not_found(&e) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn namespace_of(resource: &ChildResource) -> Result<String> {
    resource
        .namespace()
        .ok_or(OperatorError::MissingObjectKey(".metadata.namespace"))
}

#[async_trait]
impl ResourceStore for KubeStore {
    async fn get(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ChildResource>> {
        let found = match kind {
            ResourceKind::Secret => get_opt::<Secret>(self.api(namespace), name)
                .await?
                .map(ChildResource::Secret),
            ResourceKind::PersistentVolumeClaim => {
                get_opt::<PersistentVolumeClaim>(self.api(namespace), name)
                    .await?
                    .map(ChildResource::PersistentVolumeClaim)
            }
            ResourceKind::Deployment => get_opt::<Deployment>(self.api(namespace), name)
                .await?
                .map(ChildResource::Deployment),
            ResourceKind::Service => get_opt::<Service>(self.api(namespace), name)
                .await?
                .map(ChildResource::Service),
        };
        Ok(found)
    }

    async fn list(
        &self,
        kind: ResourceKind,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<ChildResource>> {
        let items = match kind {
            ResourceKind::Secret => list::<Secret>(self.api(namespace), label_selector)
                .await?
                .into_iter()
                .map(ChildResource::Secret)
                .collect(),
            ResourceKind::PersistentVolumeClaim => {
                list::<PersistentVolumeClaim>(self.api(namespace), label_selector)
                    .await?
                    .into_iter()
                    .map(ChildResource::PersistentVolumeClaim)
                    .collect()
            }
            ResourceKind::Deployment => list::<Deployment>(self.api(namespace), label_selector)
                .await?
                .into_iter()
                .map(ChildResource::Deployment)
                .collect(),
            ResourceKind::Service => list::<Service>(self.api(namespace), label_selector)
                .await?
                .into_iter()
                .map(ChildResource::Service)
                .collect(),
        };
        Ok(items)
    }

    async fn create(&self, resource: &ChildResource) -> Result<ChildResource> {
        let ns = namespace_of(resource)?;
        let created = match resource {
            ChildResource::Secret(r) => ChildResource::Secret(create(self.api(&ns), r).await?),
            ChildResource::PersistentVolumeClaim(r) => {
                ChildResource::PersistentVolumeClaim(create(self.api(&ns), r).await?)
            }
            ChildResource::Deployment(r) => {
                ChildResource::Deployment(create(self.api(&ns), r).await?)
            }
            ChildResource::Service(r) => ChildResource::Service(create(self.api(&ns), r).await?),
        };
        Ok(created)
    }

    async fn replace(&self, resource: &ChildResource) -> Result<ChildResource> {
        let ns = namespace_of(resource)?;
        let replaced = match resource {
            ChildResource::Secret(r) => ChildResource::Secret(replace(self.api(&ns), r).await?),
            ChildResource::PersistentVolumeClaim(r) => {
                ChildResource::PersistentVolumeClaim(replace(self.api(&ns), r).await?)
            }
            ChildResource::Deployment(r) => {
                ChildResource::Deployment(replace(self.api(&ns), r).await?)
            }
            ChildResource::Service(r) => {
                ChildResource::Service(replace(self.api(&ns), r).await?)
            }
        };
        Ok(replaced)
    }

    async fn delete(&self, kind: ResourceKind, namespace: &str, name: &str) -> Result<()> {
        match kind {
            ResourceKind::Secret => delete::<Secret>(self.api(namespace), name).await,
            ResourceKind::PersistentVolumeClaim => {
                delete::<PersistentVolumeClaim>(self.api(namespace), name).await
            }
            ResourceKind::Deployment => delete::<Deployment>(self.api(namespace), name).await,
            ResourceKind::Service => delete::<Service>(self.api(namespace), name).await,
        }
    }

    async fn add_finalizer(&self, cluster: &ClusterIdentity) -> Result<()> {
        info!(cluster = %cluster, finalizer = FINALIZER, "Adding finalizer");
        self.patch_finalizers(cluster, |finalizers| {
            if finalizers.iter().any(|f| f == FINALIZER) {
                return false;
            }
            finalizers.push(FINALIZER.to_string());
            true
        })
        .await
    }

    async fn remove_finalizer(&self, cluster: &ClusterIdentity) -> Result<()> {
        info!(cluster = %cluster, finalizer = FINALIZER, "Removing finalizer");
        self.patch_finalizers(cluster, |finalizers| {
            let before = finalizers.len();
            finalizers.retain(|f| f != FINALIZER);
            finalizers.len() != before
        })
        .await
    }
}
