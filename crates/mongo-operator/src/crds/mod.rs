pub mod cluster;
pub mod defaults;

pub use cluster::{
    AuthSpec, CredentialSource, MongoCluster, MongoClusterSpec, RequestLimit, ResourcesSpec,
    StorageSpec,
};
