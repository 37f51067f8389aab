//! Child resources of a cluster as a closed set of kinds, and the snapshot of
//! the ones currently live.

use std::collections::BTreeMap;
use std::fmt;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Secret, Service};
use kube::ResourceExt;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::crds::{CredentialSource, MongoClusterSpec};
use crate::drift;
use crate::error::{OperatorError, Result};
use crate::naming::ClusterIdentity;
use crate::resources;
use crate::store::ResourceStore;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceKind {
    Secret,
    PersistentVolumeClaim,
    Deployment,
    Service,
}

impl ResourceKind {
    /// Kinds created once per replica slot, in creation order.
    pub const PER_SLOT: [ResourceKind; 3] = [
        ResourceKind::PersistentVolumeClaim,
        ResourceKind::Deployment,
        ResourceKind::Service,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Secret => "Secret",
            ResourceKind::PersistentVolumeClaim => "PersistentVolumeClaim",
            ResourceKind::Deployment => "Deployment",
            ResourceKind::Service => "Service",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A child of a MongoCluster.
#[derive(Clone, Debug, PartialEq)]
pub enum ChildResource {
    Secret(Secret),
    PersistentVolumeClaim(PersistentVolumeClaim),
    Deployment(Deployment),
    Service(Service),
}

impl ChildResource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ChildResource::Secret(_) => ResourceKind::Secret,
            ChildResource::PersistentVolumeClaim(_) => ResourceKind::PersistentVolumeClaim,
            ChildResource::Deployment(_) => ResourceKind::Deployment,
            ChildResource::Service(_) => ResourceKind::Service,
        }
    }

    pub fn name(&self) -> String {
        match self {
            ChildResource::Secret(r) => r.name_any(),
            ChildResource::PersistentVolumeClaim(r) => r.name_any(),
            ChildResource::Deployment(r) => r.name_any(),
            ChildResource::Service(r) => r.name_any(),
        }
    }

    pub fn namespace(&self) -> Option<String> {
        match self {
            ChildResource::Secret(r) => r.namespace(),
            ChildResource::PersistentVolumeClaim(r) => r.namespace(),
            ChildResource::Deployment(r) => r.namespace(),
            ChildResource::Service(r) => r.namespace(),
        }
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        match self {
            ChildResource::Secret(r) => r.labels(),
            ChildResource::PersistentVolumeClaim(r) => r.labels(),
            ChildResource::Deployment(r) => r.labels(),
            ChildResource::Service(r) => r.labels(),
        }
    }

    /// The part of the object the operator owns and rewrites on update:
    /// `data` for secrets, the storage requests for claims, `spec` for
    /// everything else.
    fn projection(&self) -> Result<Value> {
        let value = match self {
            ChildResource::Secret(r) => serde_json::to_value(&r.data)?,
            ChildResource::PersistentVolumeClaim(r) => {
                let requests = r
                    .spec
                    .as_ref()
                    .and_then(|s| s.resources.as_ref())
                    .and_then(|res| res.requests.as_ref());
                let requests = serde_json::to_value(requests)?;
                json!({ "resources": { "requests": requests } })
            }
            ChildResource::Deployment(r) => serde_json::to_value(&r.spec)?,
            ChildResource::Service(r) => serde_json::to_value(&r.spec)?,
        };
        Ok(value)
    }

    /// Whether `observed` already carries everything `self` expects.
    pub fn is_satisfied_by(&self, observed: &ChildResource) -> Result<bool> {
        Ok(self.kind() == observed.kind()
            && drift::is_subset(&self.projection()?, &observed.projection()?))
    }

    /// Fields `self` sets differently from `observed` that the API server
    /// refuses to change after creation. Updates never touch them.
    pub fn immutable_drift(&self, observed: &ChildResource) -> Vec<&'static str> {
        let mut fields = Vec::new();
        let (ChildResource::PersistentVolumeClaim(expected), ChildResource::PersistentVolumeClaim(live)) =
            (self, observed)
        else {
            return fields;
        };
        let (Some(want), Some(have)) = (&expected.spec, &live.spec) else {
            return fields;
        };

        if want.storage_class_name.is_some() && want.storage_class_name != have.storage_class_name {
            fields.push("spec.storageClassName");
        }
        if want.access_modes.is_some() && want.access_modes != have.access_modes {
            fields.push("spec.accessModes");
        }
        fields
    }

    /// Copy the mutable fields of `self` onto `observed`, keeping identity and
    /// server-populated fields (resource version, cluster IPs) untouched.
    pub fn apply_onto(&self, observed: &ChildResource) -> Result<ChildResource> {
        let updated = match (self, observed.clone()) {
            (ChildResource::Secret(expected), ChildResource::Secret(mut live)) => {
                live.data = expected.data.clone();
                ChildResource::Secret(live)
            }
            (
                ChildResource::PersistentVolumeClaim(expected),
                ChildResource::PersistentVolumeClaim(mut live),
            ) => {
                let requests = expected
                    .spec
                    .as_ref()
                    .and_then(|s| s.resources.as_ref())
                    .and_then(|res| res.requests.clone());
                live.spec
                    .get_or_insert_with(Default::default)
                    .resources
                    .get_or_insert_with(Default::default)
                    .requests = requests;
                ChildResource::PersistentVolumeClaim(live)
            }
            (ChildResource::Deployment(expected), ChildResource::Deployment(mut live)) => {
                live.spec = expected.spec.clone();
                ChildResource::Deployment(live)
            }
            (ChildResource::Service(expected), ChildResource::Service(mut live)) => {
                let spec = live.spec.get_or_insert_with(Default::default);
                if let Some(want) = &expected.spec {
                    spec.type_ = want.type_.clone();
                    spec.ports = want.ports.clone();
                    spec.selector = want.selector.clone();
                }
                ChildResource::Service(live)
            }
            (expected, live) => {
                return Err(OperatorError::InvariantViolation(format!(
                    "cannot update {} {} from a {}",
                    live.kind(),
                    live.name(),
                    expected.kind()
                )))
            }
        };
        Ok(updated)
    }
}

/// Live children of one cluster, rebuilt from the store on every pass.
#[derive(Clone, Debug, Default)]
pub struct ObservedStack {
    pub deployments: Vec<Deployment>,
    pub services: Vec<Service>,
    pub pvcs: Vec<PersistentVolumeClaim>,
    pub secret: Option<Secret>,
}

fn upsert<K: ResourceExt>(items: &mut Vec<K>, item: K) {
    let name = item.name_any();
    match items.iter_mut().find(|i| i.name_any() == name) {
        Some(slot) => *slot = item,
        None => items.push(item),
    }
}

fn find<K: ResourceExt + Clone>(items: &[K], name: &str) -> Option<K> {
    items.iter().find(|i| i.name_any() == name).cloned()
}

fn remove<K: ResourceExt>(items: &mut Vec<K>, name: &str) -> bool {
    let before = items.len();
    items.retain(|i| i.name_any() != name);
    items.len() != before
}

impl ObservedStack {
    /// Record a freshly observed or applied child: replace by name, else append.
    pub fn record(&mut self, child: ChildResource) {
        match child {
            ChildResource::Secret(s) => self.secret = Some(s),
            ChildResource::PersistentVolumeClaim(p) => upsert(&mut self.pvcs, p),
            ChildResource::Deployment(d) => upsert(&mut self.deployments, d),
            ChildResource::Service(s) => upsert(&mut self.services, s),
        }
    }

    pub fn get(&self, kind: ResourceKind, name: &str) -> Option<ChildResource> {
        match kind {
            ResourceKind::Secret => self
                .secret
                .as_ref()
                .filter(|s| s.name_any() == name)
                .cloned()
                .map(ChildResource::Secret),
            ResourceKind::PersistentVolumeClaim => {
                find(&self.pvcs, name).map(ChildResource::PersistentVolumeClaim)
            }
            ResourceKind::Deployment => find(&self.deployments, name).map(ChildResource::Deployment),
            ResourceKind::Service => find(&self.services, name).map(ChildResource::Service),
        }
    }

    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.name_any() == name)
    }

    pub fn remove(&mut self, kind: ResourceKind, name: &str) -> bool {
        match kind {
            ResourceKind::Secret => {
                let matches = self.secret.as_ref().is_some_and(|s| s.name_any() == name);
                if matches {
                    self.secret = None;
                }
                matches
            }
            ResourceKind::PersistentVolumeClaim => remove(&mut self.pvcs, name),
            ResourceKind::Deployment => remove(&mut self.deployments, name),
            ResourceKind::Service => remove(&mut self.services, name),
        }
    }

    pub fn len(&self) -> usize {
        self.deployments.len() + self.services.len() + self.pvcs.len() + usize::from(self.secret.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every child in teardown order: traffic first, then compute, storage,
    /// and credentials last.
    pub fn teardown_order(&self) -> Vec<(ResourceKind, String)> {
        let services = self.services.iter().map(|s| (ResourceKind::Service, s.name_any()));
        let deployments = self
            .deployments
            .iter()
            .map(|d| (ResourceKind::Deployment, d.name_any()));
        let pvcs = self
            .pvcs
            .iter()
            .map(|p| (ResourceKind::PersistentVolumeClaim, p.name_any()));
        let secret = self
            .secret
            .iter()
            .map(|s| (ResourceKind::Secret, s.name_any()));
        services.chain(deployments).chain(pvcs).chain(secret).collect()
    }
}

/// Look up one child by name. Misses and lookup failures leave the snapshot
/// untouched.
async fn observe(
    store: &dyn ResourceStore,
    stack: &mut ObservedStack,
    identity: &ClusterIdentity,
    kind: ResourceKind,
    name: &str,
) {
    match store.get(kind, &identity.namespace, name).await {
        Ok(Some(child)) => stack.record(child),
        Ok(None) => debug!(cluster = %identity, %kind, name, "Child not found"),
        Err(e) => warn!(cluster = %identity, %kind, name, error = %e, "Child lookup failed"),
    }
}

/// Resolve the secret a cluster's credential source points at, as currently
/// stored. A referenced existing secret must exist.
async fn observe_secret(
    store: &dyn ResourceStore,
    identity: &ClusterIdentity,
    source: CredentialSource<'_>,
) -> Result<Option<Secret>> {
    let (name, required) = match source {
        CredentialSource::ExistingSecret(name) => (name.to_string(), true),
        CredentialSource::Password(_) | CredentialSource::Default => (identity.secret_name(), false),
    };

    match store.get(ResourceKind::Secret, &identity.namespace, &name).await? {
        Some(ChildResource::Secret(secret)) => Ok(Some(secret)),
        Some(other) => Err(OperatorError::InvariantViolation(format!(
            "store returned a {} for secret {name}",
            other.kind()
        ))),
        None if required => Err(OperatorError::NotFound {
            kind: "Secret",
            namespace: identity.namespace.clone(),
            name,
        }),
        None => {
            debug!(cluster = %identity, name, "Managed secret not found");
            Ok(None)
        }
    }
}

/// Build the snapshot of everything that exists for the cluster's current
/// spec. Only secret resolution errors are returned.
pub async fn collect(
    store: &dyn ResourceStore,
    identity: &ClusterIdentity,
    spec: &MongoClusterSpec,
) -> Result<ObservedStack> {
    let replicas = spec.replica_count()?;
    let source = spec.auth.source()?;

    let mut stack = ObservedStack {
        secret: observe_secret(store, identity, source).await?,
        ..Default::default()
    };

    for slot in 0..replicas {
        let name = identity.slot_name(slot);
        for kind in ResourceKind::PER_SLOT {
            observe(store, &mut stack, identity, kind, &name).await;
        }
    }

    Ok(stack)
}

/// Build the snapshot to tear down. Needs no credential source, so a broken
/// `auth` block never blocks deletion. Slot lookups are merged with
/// everything labelled for the cluster, which also catches slots left over
/// from an earlier, larger replica count.
///
/// Unlike `collect`, any lookup error is returned: a child missing from this
/// snapshot would outlive the finalizer.
pub async fn collect_for_teardown(
    store: &dyn ResourceStore,
    identity: &ClusterIdentity,
    replicas: u32,
) -> Result<ObservedStack> {
    let mut stack = ObservedStack::default();

    // Only the managed secret is looked up by name. A referenced existing
    // secret belongs to the user and is never deleted.
    let lookups = std::iter::once((ResourceKind::Secret, identity.secret_name())).chain(
        (0..replicas).flat_map(|slot| {
            let name = identity.slot_name(slot);
            ResourceKind::PER_SLOT.map(|kind| (kind, name.clone()))
        }),
    );
    for (kind, name) in lookups {
        match store.get(kind, &identity.namespace, &name).await? {
            Some(child) => stack.record(child),
            None => debug!(cluster = %identity, %kind, %name, "Child already gone"),
        }
    }

    let selector = resources::instance_selector(identity);
    for kind in ResourceKind::PER_SLOT {
        for child in store.list(kind, &identity.namespace, &selector).await? {
            stack.record(child);
        }
    }

    Ok(stack)
}
