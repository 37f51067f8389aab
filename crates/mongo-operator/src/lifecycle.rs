//! Per-event lifecycle of a MongoCluster, gated by its cleanup finalizer.
//!
//! | deleting | finalizer | action                                  |
//! |----------|-----------|-----------------------------------------|
//! | no       | absent    | add the finalizer, nothing else         |
//! | no       | present   | collect and converge every slot         |
//! | yes      | present   | delete every child, then the finalizer  |
//! | yes      | absent    | nothing left to do                      |
//!
//! The finalizer is read and written through `ResourceStore` instead of
//! `kube::runtime::finalizer`, so the whole state machine, marker included,
//! runs against the in-memory store in tests.

use kube::ResourceExt;
use tracing::info;

use crate::constants::FINALIZER;
use crate::convergence::{self, ConvergenceReport};
use crate::crds::MongoCluster;
use crate::error::Result;
use crate::naming::ClusterIdentity;
use crate::stack;
use crate::store::ResourceStore;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The finalizer was attached; convergence runs on the next event.
    MarkerAdded,
    Converged(ConvergenceReport),
    /// Children were deleted and the finalizer removed.
    TornDown { deleted: usize },
    /// Deletion requested and no finalizer left.
    Finalized,
}

impl ReconcileOutcome {
    /// Short phase name for logs and metrics.
    pub fn phase(&self) -> &'static str {
        match self {
            ReconcileOutcome::MarkerAdded => "marker",
            ReconcileOutcome::Converged(_) => "apply",
            ReconcileOutcome::TornDown { .. } => "cleanup",
            ReconcileOutcome::Finalized => "finalized",
        }
    }
}

fn has_finalizer(cluster: &MongoCluster) -> bool {
    cluster.finalizers().iter().any(|f| f == FINALIZER)
}

pub async fn reconcile(store: &dyn ResourceStore, cluster: &MongoCluster) -> Result<ReconcileOutcome> {
    let identity = ClusterIdentity::from_resource(cluster)?;
    let deleting = cluster.metadata.deletion_timestamp.is_some();

    match (deleting, has_finalizer(cluster)) {
        (false, false) => {
            store.add_finalizer(&identity).await?;
            Ok(ReconcileOutcome::MarkerAdded)
        }
        (false, true) => {
            let mut observed = stack::collect(store, &identity, &cluster.spec).await?;
            let report =
                convergence::converge(store, &identity, &cluster.spec, &mut observed).await?;
            if report.changed() {
                info!(
                    cluster = %identity,
                    created = report.created,
                    updated = report.updated,
                    pruned = report.pruned,
                    "Converged"
                );
            }
            Ok(ReconcileOutcome::Converged(report))
        }
        (true, true) => {
            let replicas = u32::try_from(cluster.spec.replicas).unwrap_or(0);
            let observed = stack::collect_for_teardown(store, &identity, replicas).await?;
            let deleted = convergence::teardown(store, &identity, &observed).await?;
            store.remove_finalizer(&identity).await?;
            info!(cluster = %identity, deleted, "Cleanup complete");
            Ok(ReconcileOutcome::TornDown { deleted })
        }
        (true, false) => Ok(ReconcileOutcome::Finalized),
    }
}
