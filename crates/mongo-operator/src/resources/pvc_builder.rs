use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    PersistentVolumeClaim, PersistentVolumeClaimSpec, ResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::crds::MongoClusterSpec;
use crate::error::Result;
use crate::naming::ClusterIdentity;
use crate::quantity;

/// Build the single-writer volume claim backing one replica's `/data`.
pub fn build_slot_pvc(
    identity: &ClusterIdentity,
    spec: &MongoClusterSpec,
    slot: u32,
) -> Result<PersistentVolumeClaim> {
    let size = quantity::parse("spec.storage.size", &spec.storage.size)?;
    let storage = BTreeMap::from([("storage".to_string(), size)]);

    Ok(PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(identity.slot_name(slot)),
            namespace: Some(identity.namespace.clone()),
            labels: Some(super::slot_labels(identity, slot)),
            ..Default::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".into()]),
            storage_class_name: Some(spec.storage.storage_class_name.clone()),
            resources: Some(ResourceRequirements {
                requests: Some(storage.clone()),
                limits: Some(storage),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    })
}
