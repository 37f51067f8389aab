//! Drives the children of one cluster to their expected state.

use tracing::{debug, info, warn};

use crate::crds::MongoClusterSpec;
use crate::error::Result;
use crate::metrics;
use crate::naming::ClusterIdentity;
use crate::resources::{
    self, deployment_builder, pvc_builder, secret_builder, service_builder,
};
use crate::stack::{ChildResource, ObservedStack, ResourceKind};
use crate::store::ResourceStore;

/// What one convergence pass did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConvergenceReport {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub pruned: usize,
}

impl ConvergenceReport {
    /// Whether the pass issued any write.
    pub fn changed(&self) -> bool {
        self.created + self.updated + self.pruned > 0
    }
}

/// Create, update or leave alone one child, then record the applied state
/// in `stack`.
async fn apply(
    store: &dyn ResourceStore,
    identity: &ClusterIdentity,
    stack: &mut ObservedStack,
    expected: ChildResource,
    report: &mut ConvergenceReport,
) -> Result<()> {
    let kind = expected.kind();
    let name = expected.name();

    let observed = stack.get(kind, &name);
    if let Some(observed) = &observed {
        for field in expected.immutable_drift(observed) {
            warn!(cluster = %identity, %kind, %name, field, "Immutable field differs from the spec, leaving it as is");
        }
    }

    let applied = match observed {
        None => {
            let created = store.create(&expected).await?;
            info!(cluster = %identity, %kind, %name, "Created");
            metrics::record_resource_operation(kind.as_str(), "create");
            report.created += 1;
            created
        }
        Some(observed) if expected.is_satisfied_by(&observed)? => {
            debug!(cluster = %identity, %kind, %name, "Up to date");
            report.unchanged += 1;
            return Ok(());
        }
        Some(observed) => {
            let replaced = store.replace(&expected.apply_onto(&observed)?).await?;
            info!(cluster = %identity, %kind, %name, "Updated");
            metrics::record_resource_operation(kind.as_str(), "update");
            report.updated += 1;
            replaced
        }
    };

    stack.record(applied);
    Ok(())
}

/// Converge the secret, then every slot's PVC, Deployment and Service, then
/// drop slots beyond the replica count.
pub async fn converge(
    store: &dyn ResourceStore,
    identity: &ClusterIdentity,
    spec: &MongoClusterSpec,
    stack: &mut ObservedStack,
) -> Result<ConvergenceReport> {
    let replicas = spec.replica_count()?;
    let mut report = ConvergenceReport::default();

    let secret =
        secret_builder::expected_secret(store, identity, spec.auth.source()?).await?;
    let secret_name = secret_builder::secret_name(&secret)?.to_string();
    apply(store, identity, stack, ChildResource::Secret(secret), &mut report).await?;

    for slot in 0..replicas {
        let pvc = pvc_builder::build_slot_pvc(identity, spec, slot)?;
        apply(store, identity, stack, ChildResource::PersistentVolumeClaim(pvc), &mut report)
            .await?;

        let deployment =
            deployment_builder::build_slot_deployment(identity, spec, slot, &secret_name)?;
        apply(store, identity, stack, ChildResource::Deployment(deployment), &mut report)
            .await?;

        let name = identity.slot_name(slot);
        let node_port = stack.service(&name).and_then(service_builder::node_port);
        let service = service_builder::build_slot_service(identity, slot, node_port);
        apply(store, identity, stack, ChildResource::Service(service), &mut report).await?;
    }

    report.pruned = prune(store, identity, replicas, stack).await?;
    Ok(report)
}

/// Delete Deployments and Services of slots `>= replicas`. Their PVCs are
/// kept so scaling back up finds the data again; teardown removes them.
async fn prune(
    store: &dyn ResourceStore,
    identity: &ClusterIdentity,
    replicas: u32,
    stack: &mut ObservedStack,
) -> Result<usize> {
    let selector = resources::instance_selector(identity);
    let mut pruned = 0;

    for kind in [ResourceKind::Deployment, ResourceKind::Service] {
        for child in store.list(kind, &identity.namespace, &selector).await? {
            let Some(slot) = resources::replica_id(Some(child.labels())) else {
                continue;
            };
            if slot < replicas {
                continue;
            }
            let name = child.name();
            store.delete(kind, &identity.namespace, &name).await?;
            info!(cluster = %identity, %kind, %name, slot, "Pruned replica beyond desired count");
            metrics::record_resource_operation(kind.as_str(), "delete");
            stack.remove(kind, &name);
            pruned += 1;
        }
    }

    Ok(pruned)
}

/// Delete every child in `stack`, traffic first and credentials last.
/// Stops at the first failure. Returns the number of deletions.
pub async fn teardown(
    store: &dyn ResourceStore,
    identity: &ClusterIdentity,
    stack: &ObservedStack,
) -> Result<usize> {
    let mut deleted = 0;
    for (kind, name) in stack.teardown_order() {
        store.delete(kind, &identity.namespace, &name).await?;
        info!(cluster = %identity, %kind, %name, "Deleted");
        metrics::record_resource_operation(kind.as_str(), "delete");
        deleted += 1;
    }
    Ok(deleted)
}
