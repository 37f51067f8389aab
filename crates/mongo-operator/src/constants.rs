/// Kubernetes label keys following the app.kubernetes.io convention.
pub mod labels {
    pub const NAME: &str = "app.kubernetes.io/name";
    pub const INSTANCE: &str = "app.kubernetes.io/instance";
    pub const COMPONENT: &str = "app.kubernetes.io/component";
    pub const MANAGED_BY: &str = "app.kubernetes.io/managed-by";

    /// Pod selector label, set to the owning resource's own name.
    pub const APP: &str = "app";

    /// Operator-specific labels.
    pub const REPLICA_ID: &str = "apps.esgi.fr/replica-id";
}

/// Label values.
pub mod values {
    pub const APP_NAME: &str = "mongodb";
    pub const MANAGED_BY: &str = "mongo-operator";
    pub const COMPONENT_REPLICA: &str = "replica";
    pub const COMPONENT_CREDENTIALS: &str = "credentials";
}

/// Cleanup marker gating deletion of a MongoCluster until its children are gone.
pub const FINALIZER: &str = "mongocluster.finalizers.esgi.fr";

/// CRD API group.
pub const API_GROUP: &str = "apps.esgi.fr";

/// Field manager used for patches issued by the operator.
pub const FIELD_MANAGER: &str = "mongo-operator";

/// Ports.
pub mod ports {
    pub const MONGO: i32 = 27017;

    /// Node ports are drawn from `[NODE_PORT_MIN, NODE_PORT_MAX)`.
    pub const NODE_PORT_MIN: i32 = 30000;
    pub const NODE_PORT_MAX: i32 = 32767;
}

/// Contract between the operator and the replica image.
pub mod mongo {
    pub const USERNAME: &str = "admin";
    pub const ROLE: &str = "root";
    pub const DEFAULT_PASSWORD: &str = "mongo_pwd";
    pub const HOST_PREFIX: &str = "mongo";
    pub const RESOURCE_INFIX: &str = "mongo";
    pub const SECRET_SUFFIX: &str = "password";
    pub const PASSWORD_KEY: &str = "password";

    pub const CONTAINER_NAME: &str = "mongo";
    pub const COMMAND: &str = "/bin/bash";
    pub const ENTRYPOINT_SCRIPT: &str = "/scripts/run.sh";

    pub const KEY_VOLUME_NAME: &str = "mongo-key";
    pub const KEY_MOUNT_PATH: &str = "/etc/secrets-volume/";
    /// Owner read-only.
    pub const KEY_DEFAULT_MODE: i32 = 0o400;

    pub const STORAGE_VOLUME_NAME: &str = "mongo-persistent-storage";
    pub const STORAGE_MOUNT_PATH: &str = "/data";

    /// Each Deployment runs exactly one mongod.
    pub const DEPLOYMENT_REPLICAS: i32 = 1;
}

/// Default resource values.
pub mod defaults {
    pub const IMAGE: &str = "paulb314/mongo:5.0.6";
    pub const REPLICAS: i32 = 1;
    pub const DATABASE: &str = "mongo";
    pub const STORAGE_SIZE: &str = "1Gi";
    pub const STORAGE_CLASS: &str = "standard";
    pub const CPU_REQUEST: &str = "100m";
    pub const CPU_LIMIT: &str = "1000m";
    pub const MEMORY_REQUEST: &str = "256Mi";
    pub const MEMORY_LIMIT: &str = "1Gi";

    /// Requeue intervals in seconds.
    pub const REQUEUE_SECS: u64 = 300;
    pub const REQUEUE_ERROR_SECS: u64 = 15;
    pub const REQUEUE_PERMANENT_ERROR_SECS: u64 = 300;
}
