//! In-memory `ResourceStore` for tests. Records every call, can fail chosen
//! calls, and fills in the fields an API server would default.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::DeploymentStrategy;

use super::ResourceStore;
use crate::error::{OperatorError, Result};
use crate::naming::ClusterIdentity;
use crate::stack::{ChildResource, ResourceKind};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Get(ResourceKind, String),
    List(ResourceKind),
    Create(ResourceKind, String),
    Replace(ResourceKind, String),
    Delete(ResourceKind, String),
    AddFinalizer(String),
    RemoveFinalizer(String),
}

impl Call {
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Call::Get(..) | Call::List(..))
    }
}

type Key = (ResourceKind, String, String);
type FailurePredicate = Box<dyn Fn(&Call) -> bool + Send + Sync>;

#[derive(Default)]
struct State {
    objects: BTreeMap<Key, ChildResource>,
    finalizers: BTreeSet<ClusterKey>,
    calls: Vec<Call>,
    next_version: u64,
}

type ClusterKey = (String, String);

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    failures: Mutex<Vec<FailurePredicate>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call matching `predicate` fail with a store error.
    pub fn fail_when(&self, predicate: impl Fn(&Call) -> bool + Send + Sync + 'static) {
        self.failures.lock().unwrap().push(Box::new(predicate));
    }

    pub fn clear_failures(&self) {
        self.failures.lock().unwrap().clear();
    }

    /// Insert an object as if it had been created out of band. Not recorded.
    pub fn seed(&self, child: ChildResource) {
        let mut state = self.state.lock().unwrap();
        let child = server_defaults(child, &mut state.next_version);
        let key = key_of(&child);
        state.objects.insert(key, child);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn objects(&self, kind: ResourceKind) -> Vec<ChildResource> {
        self.state
            .lock()
            .unwrap()
            .objects
            .iter()
            .filter(|((k, _, _), _)| *k == kind)
            .map(|(_, v)| v.clone())
            .collect()
    }

    pub fn object(&self, kind: ResourceKind, namespace: &str, name: &str) -> Option<ChildResource> {
        let key = (kind, namespace.to_string(), name.to_string());
        self.state.lock().unwrap().objects.get(&key).cloned()
    }

    pub fn set_finalizer(&self, cluster: &ClusterIdentity) {
        self.state
            .lock()
            .unwrap()
            .finalizers
            .insert(cluster_key(cluster));
    }

    pub fn has_finalizer(&self, cluster: &ClusterIdentity) -> bool {
        self.state
            .lock()
            .unwrap()
            .finalizers
            .contains(&cluster_key(cluster))
    }

    /// Record `call` and decide whether it should fail.
    fn enter(&self, call: Call) -> Result<()> {
        let failing = self.failures.lock().unwrap().iter().any(|p| p(&call));
        let description = format!("{call:?}");
        self.state.lock().unwrap().calls.push(call);
        if failing {
            return Err(OperatorError::Store(format!("injected failure on {description}")));
        }
        Ok(())
    }
}

fn cluster_key(cluster: &ClusterIdentity) -> ClusterKey {
    (cluster.namespace.clone(), cluster.name.clone())
}

fn key_of(child: &ChildResource) -> Key {
    (child.kind(), child.namespace().unwrap_or_default(), child.name())
}

fn matches_selector(child: &ChildResource, selector: &str) -> bool {
    let labels = child.labels();
    selector
        .split(',')
        .filter(|term| !term.is_empty())
        .all(|term| match term.split_once('=') {
            Some((k, v)) => labels.get(k).map(String::as_str) == Some(v),
            None => labels.contains_key(term),
        })
}

/// Mimic what the API server adds on write.
fn server_defaults(mut child: ChildResource, next_version: &mut u64) -> ChildResource {
    *next_version += 1;
    let version = next_version.to_string();
    match &mut child {
        ChildResource::Secret(s) => s.metadata.resource_version = Some(version),
        ChildResource::PersistentVolumeClaim(p) => {
            p.metadata.resource_version = Some(version);
            if let Some(spec) = p.spec.as_mut() {
                spec.volume_mode.get_or_insert_with(|| "Filesystem".into());
            }
        }
        ChildResource::Deployment(d) => {
            d.metadata.resource_version = Some(version);
            if let Some(spec) = d.spec.as_mut() {
                spec.revision_history_limit.get_or_insert(10);
                spec.strategy.get_or_insert_with(|| DeploymentStrategy {
                    type_: Some("RollingUpdate".into()),
                    ..Default::default()
                });
                if let Some(pod) = spec.template.spec.as_mut() {
                    pod.restart_policy.get_or_insert_with(|| "Always".into());
                    pod.dns_policy.get_or_insert_with(|| "ClusterFirst".into());
                    for container in &mut pod.containers {
                        container
                            .termination_message_path
                            .get_or_insert_with(|| "/dev/termination-log".into());
                        container
                            .image_pull_policy
                            .get_or_insert_with(|| "IfNotPresent".into());
                    }
                }
            }
        }
        ChildResource::Service(s) => {
            s.metadata.resource_version = Some(version);
            if let Some(spec) = s.spec.as_mut() {
                let ip = format!("10.96.0.{}", *next_version % 250);
                spec.cluster_ip.get_or_insert(ip);
                spec.session_affinity.get_or_insert_with(|| "None".into());
            }
        }
    }
    child
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn get(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ChildResource>> {
        self.enter(Call::Get(kind, name.to_string()))?;
        Ok(self.object(kind, namespace, name))
    }

    async fn list(
        &self,
        kind: ResourceKind,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<ChildResource>> {
        self.enter(Call::List(kind))?;
        Ok(self
            .objects(kind)
            .into_iter()
            .filter(|c| c.namespace().as_deref() == Some(namespace))
            .filter(|c| matches_selector(c, label_selector))
            .collect())
    }

    async fn create(&self, resource: &ChildResource) -> Result<ChildResource> {
        self.enter(Call::Create(resource.kind(), resource.name()))?;
        let mut state = self.state.lock().unwrap();
        let key = key_of(resource);
        if state.objects.contains_key(&key) {
            return Err(OperatorError::Store(format!(
                "{} {} already exists",
                resource.kind(),
                resource.name()
            )));
        }
        let stored = server_defaults(resource.clone(), &mut state.next_version);
        state.objects.insert(key, stored.clone());
        Ok(stored)
    }

    async fn replace(&self, resource: &ChildResource) -> Result<ChildResource> {
        self.enter(Call::Replace(resource.kind(), resource.name()))?;
        let mut state = self.state.lock().unwrap();
        let key = key_of(resource);
        if !state.objects.contains_key(&key) {
            return Err(OperatorError::NotFound {
                kind: resource.kind().as_str(),
                namespace: key.1,
                name: key.2,
            });
        }
        let stored = server_defaults(resource.clone(), &mut state.next_version);
        state.objects.insert(key, stored.clone());
        Ok(stored)
    }

    async fn delete(&self, kind: ResourceKind, namespace: &str, name: &str) -> Result<()> {
        self.enter(Call::Delete(kind, name.to_string()))?;
        let key = (kind, namespace.to_string(), name.to_string());
        self.state.lock().unwrap().objects.remove(&key);
        Ok(())
    }

    async fn add_finalizer(&self, cluster: &ClusterIdentity) -> Result<()> {
        self.enter(Call::AddFinalizer(cluster.name.clone()))?;
        self.set_finalizer(cluster);
        Ok(())
    }

    async fn remove_finalizer(&self, cluster: &ClusterIdentity) -> Result<()> {
        self.enter(Call::RemoveFinalizer(cluster.name.clone()))?;
        self.state
            .lock()
            .unwrap()
            .finalizers
            .remove(&cluster_key(cluster));
        Ok(())
    }
}
