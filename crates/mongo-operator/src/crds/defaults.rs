//! Default functions for serde defaults in the MongoCluster spec.

use crate::constants::defaults;

use super::cluster::RequestLimit;

pub fn image() -> String {
    defaults::IMAGE.to_string()
}

pub fn replicas() -> i32 {
    defaults::REPLICAS
}

pub fn database() -> String {
    defaults::DATABASE.to_string()
}

pub fn storage_size() -> String {
    defaults::STORAGE_SIZE.to_string()
}

pub fn storage_class() -> String {
    defaults::STORAGE_CLASS.to_string()
}

pub fn cpu() -> RequestLimit {
    RequestLimit {
        request: defaults::CPU_REQUEST.to_string(),
        limit: defaults::CPU_LIMIT.to_string(),
    }
}

pub fn memory() -> RequestLimit {
    RequestLimit {
        request: defaults::MEMORY_REQUEST.to_string(),
        limit: defaults::MEMORY_LIMIT.to_string(),
    }
}
