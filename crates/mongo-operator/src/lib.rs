//! Kubernetes operator reconciling `MongoCluster` resources into per-replica
//! Deployments, PersistentVolumeClaims and Services sharing one credentials
//! Secret.

pub mod config;
pub mod constants;
pub mod controller;
pub mod convergence;
pub mod crds;
pub mod drift;
pub mod error;
pub mod lifecycle;
pub mod metrics;
pub mod naming;
pub mod quantity;
pub mod resources;
pub mod stack;
pub mod store;
pub mod telemetry;
