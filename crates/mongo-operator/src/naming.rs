//! Deterministic names for the children of a MongoCluster, and the replica
//! membership list handed to every replica at bootstrap.

use std::fmt;

use kube::ResourceExt;
use serde::{Deserialize, Serialize};

use crate::constants::mongo;
use crate::crds::MongoCluster;
use crate::error::{OperatorError, Result};

/// The (name, namespace) pair all children of a cluster are keyed on.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ClusterIdentity {
    pub name: String,
    pub namespace: String,
}

impl ClusterIdentity {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    pub fn from_resource(cluster: &MongoCluster) -> Result<Self> {
        let name = cluster
            .metadata
            .name
            .clone()
            .ok_or(OperatorError::MissingObjectKey(".metadata.name"))?;
        let namespace = cluster
            .namespace()
            .ok_or(OperatorError::MissingObjectKey(".metadata.namespace"))?;
        Ok(Self { name, namespace })
    }

    /// Name of the per-slot Deployment, PVC and Service.
    pub fn slot_name(&self, slot: u32) -> String {
        resource_name(&self.name, &slot.to_string())
    }

    /// Name of the secret the operator manages when no existing one is referenced.
    ///
    /// Scoped by cluster name rather than a fixed `mongo-password`, so two
    /// clusters in one namespace never share credentials.
    pub fn secret_name(&self) -> String {
        resource_name(&self.name, mongo::SECRET_SUFFIX)
    }
}

impl fmt::Display for ClusterIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// `<prefix>-mongo-<suffix>`.
pub fn resource_name(prefix: &str, suffix: &str) -> String {
    format!("{prefix}-{}-{suffix}", mongo::RESOURCE_INFIX)
}

/// Hostname a replica announces for itself.
pub fn replica_host(slot: u32) -> String {
    format!("{}-{slot}", mongo::HOST_PREFIX)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMember {
    #[serde(rename = "Id")]
    pub id: u32,
    #[serde(rename = "Host")]
    pub host: String,
}

/// One member per slot, ids ascending from 0.
pub fn membership(cluster_name: &str, replicas: u32) -> Vec<ClusterMember> {
    (0..replicas)
        .map(|id| ClusterMember {
            id,
            host: resource_name(cluster_name, &id.to_string()),
        })
        .collect()
}

/// Compact JSON encoding injected as `CLUSTER_MEMBERS`.
pub fn encode_membership(cluster_name: &str, replicas: u32) -> Result<String> {
    Ok(serde_json::to_string(&membership(cluster_name, replicas))?)
}
