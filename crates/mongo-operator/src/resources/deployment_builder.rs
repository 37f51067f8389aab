use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, EnvVarSource, PersistentVolumeClaimVolumeSource,
    PodSpec, PodTemplateSpec, ResourceRequirements, SecretKeySelector, SecretVolumeSource,
    Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};

use crate::constants::{mongo, ports};
use crate::crds::MongoClusterSpec;
use crate::error::Result;
use crate::naming::{self, ClusterIdentity};
use crate::quantity;

/// Build the single-pod Deployment running replica `slot`.
///
/// `secret_name` is the name of the resolved credentials secret. It is both
/// mounted and referenced by `MONGODB_PASSWORD`.
pub fn build_slot_deployment(
    identity: &ClusterIdentity,
    spec: &MongoClusterSpec,
    slot: u32,
    secret_name: &str,
) -> Result<Deployment> {
    let name = identity.slot_name(slot);
    let members = naming::encode_membership(&identity.name, spec.replica_count()?)?;

    let container = Container {
        name: mongo::CONTAINER_NAME.into(),
        image: Some(spec.image.clone()),
        command: Some(vec![mongo::COMMAND.into()]),
        args: Some(vec![mongo::ENTRYPOINT_SCRIPT.into()]),
        ports: Some(vec![ContainerPort {
            container_port: ports::MONGO,
            ..Default::default()
        }]),
        env: Some(replica_env(spec, slot, secret_name, members)),
        resources: Some(container_resources(spec)?),
        volume_mounts: Some(vec![
            VolumeMount {
                name: mongo::KEY_VOLUME_NAME.into(),
                mount_path: mongo::KEY_MOUNT_PATH.into(),
                read_only: Some(true),
                ..Default::default()
            },
            VolumeMount {
                name: mongo::STORAGE_VOLUME_NAME.into(),
                mount_path: mongo::STORAGE_MOUNT_PATH.into(),
                ..Default::default()
            },
        ]),
        ..Default::default()
    };

    let volumes = vec![
        Volume {
            name: mongo::KEY_VOLUME_NAME.into(),
            secret: Some(SecretVolumeSource {
                secret_name: Some(secret_name.into()),
                default_mode: Some(mongo::KEY_DEFAULT_MODE),
                ..Default::default()
            }),
            ..Default::default()
        },
        Volume {
            name: mongo::STORAGE_VOLUME_NAME.into(),
            persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                claim_name: name.clone(),
                ..Default::default()
            }),
            ..Default::default()
        },
    ];

    let selector = super::slot_selector(identity, slot);

    Ok(Deployment {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: Some(identity.namespace.clone()),
            labels: Some(super::slot_labels(identity, slot)),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(mongo::DEPLOYMENT_REPLICAS),
            selector: LabelSelector {
                match_labels: Some(selector),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(super::slot_labels(identity, slot)),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![container],
                    volumes: Some(volumes),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    })
}

fn env(name: &str, value: impl Into<String>) -> EnvVar {
    EnvVar {
        name: name.into(),
        value: Some(value.into()),
        ..Default::default()
    }
}

/// Environment contract of the replica image. Order matters for drift
/// detection.
fn replica_env(
    spec: &MongoClusterSpec,
    slot: u32,
    secret_name: &str,
    members: String,
) -> Vec<EnvVar> {
    vec![
        env("MONGODB_USERNAME", mongo::USERNAME),
        EnvVar {
            name: "MONGODB_PASSWORD".into(),
            value_from: Some(EnvVarSource {
                secret_key_ref: Some(SecretKeySelector {
                    name: Some(secret_name.into()),
                    key: mongo::PASSWORD_KEY.into(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        },
        env("MONGODB_DBNAME", spec.database_name.as_str()),
        env("MONGODB_ROLE", mongo::ROLE),
        env("CLUSTER_MEMBERS", members),
        env("MONGODB_REPLICA_ID", slot.to_string()),
        env("HOST", naming::replica_host(slot)),
        env("DEBIAN_FRONTEND", "noninteractive"),
        env("DEBCONF_NONINTERACTIVE_SEEN", "true"),
    ]
}

fn container_resources(spec: &MongoClusterSpec) -> Result<ResourceRequirements> {
    let cpu = &spec.resources.cpu;
    let memory = &spec.resources.memory;

    let requests = BTreeMap::from([
        ("cpu".to_string(), quantity::parse("spec.resources.cpu.request", &cpu.request)?),
        (
            "memory".to_string(),
            quantity::parse("spec.resources.memory.request", &memory.request)?,
        ),
    ]);
    let limits = BTreeMap::from([
        ("cpu".to_string(), quantity::parse("spec.resources.cpu.limit", &cpu.limit)?),
        (
            "memory".to_string(),
            quantity::parse("spec.resources.memory.limit", &memory.limit)?,
        ),
    ]);

    Ok(ResourceRequirements {
        requests: Some(requests),
        limits: Some(limits),
        ..Default::default()
    })
}
