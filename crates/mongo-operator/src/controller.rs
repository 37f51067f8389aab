use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Service};
use k8s_openapi::NamespaceResourceScope;
use kube::api::Api;
use kube::runtime::controller::{Action, Controller};
use kube::runtime::reflector::ObjectRef;
use kube::runtime::watcher;
use kube::{Client, Resource, ResourceExt};
use tracing::{debug, info, warn};

use crate::config::OperatorConfig;
use crate::constants::{labels, values};
use crate::crds::MongoCluster;
use crate::error::OperatorError;
use crate::lifecycle::{self, ReconcileOutcome};
use crate::metrics;
use crate::store::{KubeStore, ResourceStore};

/// Shared context for the MongoCluster reconciler.
pub struct Context {
    pub store: Arc<dyn ResourceStore>,
    pub config: OperatorConfig,
}

fn api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

/// Map a child back to the cluster named by its instance label.
fn owning_cluster<K: ResourceExt>(child: K) -> Option<ObjectRef<MongoCluster>> {
    let name = child.labels().get(labels::INSTANCE)?;
    let namespace = child.namespace()?;
    Some(ObjectRef::new(name).within(&namespace))
}

/// Run the MongoCluster controller until SIGTERM/SIGINT.
pub async fn run(client: Client, config: OperatorConfig) {
    let namespace = config.watch_namespace.clone();
    let ns = namespace.as_deref();

    let clusters: Api<MongoCluster> = api(&client, ns);
    let deployments: Api<Deployment> = api(&client, ns);
    let services: Api<Service> = api(&client, ns);
    let pvcs: Api<PersistentVolumeClaim> = api(&client, ns);

    let children = watcher::Config::default()
        .labels(&format!("{}={}", labels::MANAGED_BY, values::MANAGED_BY));

    let ctx = Arc::new(Context {
        store: Arc::new(KubeStore::new(client)),
        config,
    });

    info!(namespace = ns.unwrap_or("<all>"), "Starting MongoCluster controller");

    Controller::new(clusters, watcher::Config::default())
        .watches(deployments, children.clone(), owning_cluster)
        .watches(services, children.clone(), owning_cluster)
        .watches(pvcs, children, owning_cluster)
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            match res {
                Ok((obj, action)) => debug!(cluster = %obj, ?action, "Reconciled"),
                Err(e) => warn!(error = %e, "Reconciliation failed"),
            }
        })
        .await;

    info!("MongoCluster controller stopped");
}

async fn reconcile(
    cluster: Arc<MongoCluster>,
    ctx: Arc<Context>,
) -> Result<Action, OperatorError> {
    let started = Instant::now();
    let result = lifecycle::reconcile(ctx.store.as_ref(), &cluster).await;
    metrics::observe_reconcile_duration(started.elapsed().as_secs_f64());

    match result {
        Ok(outcome) => {
            metrics::record_reconciliation(outcome.phase(), "success");
            Ok(action_for(&outcome, &ctx.config))
        }
        Err(e) => {
            let phase = if cluster.metadata.deletion_timestamp.is_some() {
                "cleanup"
            } else {
                "apply"
            };
            metrics::record_reconciliation(phase, "error");
            Err(e)
        }
    }
}

fn action_for(outcome: &ReconcileOutcome, config: &OperatorConfig) -> Action {
    match outcome {
        ReconcileOutcome::Converged(_) => Action::requeue(config.requeue_interval()),
        ReconcileOutcome::MarkerAdded
        | ReconcileOutcome::TornDown { .. }
        | ReconcileOutcome::Finalized => Action::await_change(),
    }
}

/// Transient errors retry quickly, everything else backs off.
fn error_policy(cluster: Arc<MongoCluster>, error: &OperatorError, ctx: Arc<Context>) -> Action {
    warn!(
        cluster = %cluster.name_any(),
        transient = error.is_transient(),
        "Reconciliation error: {error}"
    );
    Action::requeue(ctx.config.error_requeue_interval(error.is_transient()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convergence::ConvergenceReport;
    use crate::resources::service_builder;
    use crate::naming::ClusterIdentity;
    use std::time::Duration;

    #[test]
    fn test_owning_cluster_from_labels() {
        let id = ClusterIdentity::new("orders", "prod");
        let svc = service_builder::build_slot_service(&id, 0, None);
        let obj = owning_cluster(svc).unwrap();
        assert_eq!(obj.name, "orders");
        assert_eq!(obj.namespace.as_deref(), Some("prod"));

        assert!(owning_cluster(Service::default()).is_none());
    }

    #[test]
    fn test_actions() {
        let config = OperatorConfig::default();
        assert_eq!(
            action_for(&ReconcileOutcome::Converged(ConvergenceReport::default()), &config),
            Action::requeue(Duration::from_secs(300))
        );
        assert_eq!(
            action_for(&ReconcileOutcome::MarkerAdded, &config),
            Action::await_change()
        );
        assert_eq!(
            action_for(&ReconcileOutcome::TornDown { deleted: 3 }, &config),
            Action::await_change()
        );
    }
}
