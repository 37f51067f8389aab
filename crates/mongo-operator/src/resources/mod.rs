//! Builders for the expected state of every child of a MongoCluster.

pub mod deployment_builder;
pub mod pvc_builder;
pub mod secret_builder;
pub mod service_builder;

use std::collections::BTreeMap;

use crate::constants::{labels, values};
use crate::naming::ClusterIdentity;

/// Labels shared by every child of a cluster.
fn common_labels(
    identity: &ClusterIdentity,
    app: &str,
    component: &str,
) -> BTreeMap<String, String> {
    BTreeMap::from([
        (labels::APP.into(), app.into()),
        (labels::NAME.into(), values::APP_NAME.into()),
        (labels::INSTANCE.into(), identity.name.clone()),
        (labels::COMPONENT.into(), component.into()),
        (labels::MANAGED_BY.into(), values::MANAGED_BY.into()),
    ])
}

/// Labels for the per-slot Deployment, PVC and Service.
pub fn slot_labels(identity: &ClusterIdentity, slot: u32) -> BTreeMap<String, String> {
    let mut slot_labels =
        common_labels(identity, &identity.slot_name(slot), values::COMPONENT_REPLICA);
    slot_labels.insert(labels::REPLICA_ID.into(), slot.to_string());
    slot_labels
}

/// Labels for the secret the operator manages.
pub fn credentials_labels(identity: &ClusterIdentity) -> BTreeMap<String, String> {
    common_labels(
        identity,
        &identity.secret_name(),
        values::COMPONENT_CREDENTIALS,
    )
}

/// Pod selector of a slot. Matches the `app` label only.
pub fn slot_selector(identity: &ClusterIdentity, slot: u32) -> BTreeMap<String, String> {
    BTreeMap::from([(labels::APP.into(), identity.slot_name(slot))])
}

/// Label selector matching every child the operator created for a cluster.
pub fn instance_selector(identity: &ClusterIdentity) -> String {
    format!(
        "{}={},{}={}",
        labels::INSTANCE,
        identity.name,
        labels::MANAGED_BY,
        values::MANAGED_BY
    )
}

/// The slot a child belongs to, read back from its labels.
pub fn replica_id(child_labels: Option<&BTreeMap<String, String>>) -> Option<u32> {
    child_labels?.get(labels::REPLICA_ID)?.parse().ok()
}
