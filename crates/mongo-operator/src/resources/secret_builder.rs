use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use tracing::warn;

use crate::constants::mongo;
use crate::crds::CredentialSource;
use crate::error::{OperatorError, Result};
use crate::naming::ClusterIdentity;
use crate::stack::{ChildResource, ResourceKind};
use crate::store::ResourceStore;

/// Build the operator-managed secret holding `password`.
pub fn build_secret(identity: &ClusterIdentity, password: &str) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(identity.secret_name()),
            namespace: Some(identity.namespace.clone()),
            labels: Some(super::credentials_labels(identity)),
            ..Default::default()
        },
        type_: Some("Opaque".into()),
        data: Some(BTreeMap::from([(
            mongo::PASSWORD_KEY.to_string(),
            ByteString(password.as_bytes().to_vec()),
        )])),
        ..Default::default()
    }
}

/// The secret the cluster should use, resolved in precedence order:
/// referenced existing secret, explicit password, the previously generated
/// default secret, and finally a fresh secret with the built-in password.
pub async fn expected_secret(
    store: &dyn ResourceStore,
    identity: &ClusterIdentity,
    source: CredentialSource<'_>,
) -> Result<Secret> {
    match source {
        CredentialSource::ExistingSecret(name) => {
            match store.get(ResourceKind::Secret, &identity.namespace, name).await? {
                Some(ChildResource::Secret(secret)) => Ok(secret),
                _ => Err(OperatorError::NotFound {
                    kind: "Secret",
                    namespace: identity.namespace.clone(),
                    name: name.to_string(),
                }),
            }
        }
        CredentialSource::Password(password) => Ok(build_secret(identity, password)),
        CredentialSource::Default => {
            let name = identity.secret_name();
            if let Some(ChildResource::Secret(secret)) = store
                .get(ResourceKind::Secret, &identity.namespace, &name)
                .await?
            {
                return Ok(secret);
            }
            warn!(
                cluster = %identity,
                secret = %name,
                "No credentials configured, using the built-in default password"
            );
            Ok(build_secret(identity, mongo::DEFAULT_PASSWORD))
        }
    }
}

/// Name of the secret pods should reference.
pub fn secret_name(secret: &Secret) -> Result<&str> {
    secret
        .metadata
        .name
        .as_deref()
        .ok_or(OperatorError::MissingObjectKey(".metadata.name"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::{Call, MemoryStore};

    fn password_of(secret: &Secret) -> String {
        let data = secret.data.as_ref().unwrap();
        String::from_utf8(data.get("password").unwrap().0.clone()).unwrap()
    }

    #[test]
    fn test_build_secret() {
        let id = ClusterIdentity::new("c", "default");
        let secret = build_secret(&id, "s3cret");
        assert_eq!(secret.metadata.name.as_deref(), Some("c-mongo-password"));
        assert_eq!(secret.type_.as_deref(), Some("Opaque"));
        assert_eq!(password_of(&secret), "s3cret");
        assert_eq!(secret_name(&secret).unwrap(), "c-mongo-password");
    }

    #[tokio::test]
    async fn test_password_source_never_looks_up() {
        let store = MemoryStore::new();
        let id = ClusterIdentity::new("c", "default");
        let secret = expected_secret(&store, &id, CredentialSource::Password("pw"))
            .await
            .unwrap();
        assert_eq!(password_of(&secret), "pw");
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_existing_secret_returned_verbatim() {
        let store = MemoryStore::new();
        let id = ClusterIdentity::new("c", "default");
        let mut existing = build_secret(&id, "from-user");
        existing.metadata.name = Some("user-creds".into());
        existing.metadata.labels = None;
        store.seed(ChildResource::Secret(existing));

        let secret = expected_secret(&store, &id, CredentialSource::ExistingSecret("user-creds"))
            .await
            .unwrap();
        assert_eq!(secret.metadata.name.as_deref(), Some("user-creds"));
        assert_eq!(password_of(&secret), "from-user");
        assert_eq!(
            store.calls(),
            vec![Call::Get(ResourceKind::Secret, "user-creds".into())]
        );
    }

    #[tokio::test]
    async fn test_missing_existing_secret_is_not_found() {
        let store = MemoryStore::new();
        let id = ClusterIdentity::new("c", "default");
        let err = expected_secret(&store, &id, CredentialSource::ExistingSecret("nope"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_default_reuses_previous_secret() {
        let store = MemoryStore::new();
        let id = ClusterIdentity::new("c", "default");

        let fresh = expected_secret(&store, &id, CredentialSource::Default)
            .await
            .unwrap();
        assert_eq!(password_of(&fresh), "mongo_pwd");

        store.seed(ChildResource::Secret(build_secret(&id, "rotated")));
        let reused = expected_secret(&store, &id, CredentialSource::Default)
            .await
            .unwrap();
        assert_eq!(password_of(&reused), "rotated");
    }
}
