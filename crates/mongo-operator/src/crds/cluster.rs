use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{self, OperatorError};

/// Desired state of a replicated MongoDB cluster.
#[derive(CustomResource, Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "apps.esgi.fr",
    version = "v1beta1",
    kind = "MongoCluster",
    namespaced,
    shortname = "mgc",
    printcolumn = r#"{"name":"Replicas","type":"integer","jsonPath":".spec.replicas"}"#,
    printcolumn = r#"{"name":"Image","type":"string","jsonPath":".spec.image"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct MongoClusterSpec {
    /// Container image for every replica.
    #[serde(default = "super::defaults::image")]
    pub image: String,

    /// Number of replicas. Each replica owns one Deployment, PVC and Service.
    #[serde(default = "super::defaults::replicas")]
    pub replicas: i32,

    /// Database created on bootstrap.
    #[serde(rename = "database", default = "super::defaults::database")]
    pub database_name: String,

    /// Per-replica persistent storage.
    #[serde(default)]
    pub storage: StorageSpec,

    /// CPU and memory requests/limits of the mongo container.
    #[serde(default)]
    pub resources: ResourcesSpec,

    /// Credential source for the admin user.
    #[serde(default)]
    pub auth: AuthSpec,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StorageSpec {
    /// Size of each replica's volume claim (e.g. "1Gi").
    #[serde(default = "super::defaults::storage_size")]
    pub size: String,

    /// StorageClass forwarded to the claims as-is.
    #[serde(default = "super::defaults::storage_class")]
    pub storage_class_name: String,
}

impl Default for StorageSpec {
    fn default() -> Self {
        Self {
            size: super::defaults::storage_size(),
            storage_class_name: super::defaults::storage_class(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResourcesSpec {
    #[serde(default = "super::defaults::cpu")]
    pub cpu: RequestLimit,

    #[serde(default = "super::defaults::memory")]
    pub memory: RequestLimit,
}

impl Default for ResourcesSpec {
    fn default() -> Self {
        Self {
            cpu: super::defaults::cpu(),
            memory: super::defaults::memory(),
        }
    }
}

/// A request/limit pair of quantities.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RequestLimit {
    pub request: String,
    pub limit: String,
}

/// Exactly one of `password` / `existingSecret` is expected to be set.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthSpec {
    /// Plain admin password, stored by the operator in the cluster's secret.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Name of a pre-existing Secret with a `password` key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing_secret: Option<String>,
}

/// Where the admin password comes from, in precedence order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CredentialSource<'a> {
    ExistingSecret(&'a str),
    Password(&'a str),
    /// Neither is set: reuse the last generated secret or fall back to the
    /// built-in insecure password.
    Default,
}

impl AuthSpec {
    /// Resolve the credential source. Empty strings count as unset.
    pub fn source(&self) -> error::Result<CredentialSource<'_>> {
        let existing = self.existing_secret.as_deref().filter(|s| !s.is_empty());
        let password = self.password.as_deref().filter(|s| !s.is_empty());

        match (existing, password) {
            (Some(_), Some(_)) => Err(OperatorError::InvariantViolation(
                "auth.password and auth.existingSecret are mutually exclusive".into(),
            )),
            (Some(name), None) => Ok(CredentialSource::ExistingSecret(name)),
            (None, Some(password)) => Ok(CredentialSource::Password(password)),
            (None, None) => Ok(CredentialSource::Default),
        }
    }
}

impl MongoClusterSpec {
    /// Number of replica slots; negative counts are rejected.
    pub fn replica_count(&self) -> error::Result<u32> {
        u32::try_from(self.replicas).map_err(|_| {
            OperatorError::Validation(format!(
                "spec.replicas must be >= 0, got {}",
                self.replicas
            ))
        })
    }
}

impl Default for MongoClusterSpec {
    fn default() -> Self {
        Self {
            image: super::defaults::image(),
            replicas: super::defaults::replicas(),
            database_name: super::defaults::database(),
            storage: StorageSpec::default(),
            resources: ResourcesSpec::default(),
            auth: AuthSpec::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::CustomResourceExt;

    #[test]
    fn test_crd_generates_valid_schema() {
        let crd = MongoCluster::crd();
        let yaml = serde_yaml::to_string(&crd).expect("CRD should serialize to YAML");
        assert!(yaml.contains("MongoCluster"));
        assert!(yaml.contains("apps.esgi.fr"));
        assert!(yaml.contains("v1beta1"));
        assert!(yaml.contains("existingSecret"));
    }

    #[test]
    fn test_spec_defaults() {
        let spec: MongoClusterSpec = serde_json::from_str("{}").unwrap();
        assert_eq!(spec, MongoClusterSpec::default());
        assert_eq!(spec.replicas, 1);
        assert_eq!(spec.database_name, "mongo");
        assert_eq!(spec.storage.size, "1Gi");
        assert_eq!(spec.storage.storage_class_name, "standard");
        assert_eq!(spec.resources.cpu.limit, "1000m");
        assert_eq!(spec.resources.memory.request, "256Mi");
        assert_eq!(spec.auth.source().unwrap(), CredentialSource::Default);
    }

    #[test]
    fn test_partial_nested_defaults() {
        let spec: MongoClusterSpec = serde_json::from_str(
            r#"{"replicas": 3, "database": "orders", "storage": {"size": "5Gi"}}"#,
        )
        .unwrap();
        assert_eq!(spec.replicas, 3);
        assert_eq!(spec.database_name, "orders");
        assert_eq!(spec.storage.size, "5Gi");
        assert_eq!(spec.storage.storage_class_name, "standard");
    }

    #[test]
    fn test_credential_source_precedence() {
        let auth = AuthSpec {
            password: Some("s3cret".into()),
            existing_secret: None,
        };
        assert_eq!(auth.source().unwrap(), CredentialSource::Password("s3cret"));

        let auth = AuthSpec {
            password: Some(String::new()),
            existing_secret: Some("creds".into()),
        };
        assert_eq!(
            auth.source().unwrap(),
            CredentialSource::ExistingSecret("creds")
        );

        let auth = AuthSpec {
            password: Some("s3cret".into()),
            existing_secret: Some("creds".into()),
        };
        assert!(matches!(
            auth.source(),
            Err(OperatorError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_negative_replicas_rejected() {
        let spec = MongoClusterSpec {
            replicas: -1,
            ..Default::default()
        };
        assert!(matches!(
            spec.replica_count(),
            Err(OperatorError::Validation(_))
        ));
        let spec = MongoClusterSpec {
            replicas: 0,
            ..Default::default()
        };
        assert_eq!(spec.replica_count().unwrap(), 0);
    }
}
