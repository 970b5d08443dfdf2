use std::fmt;

use crate::FRAMEWORK_VERSION;

/// Replace path-like separators so a key is safe in every medium.
pub fn normalize_key(key: &str) -> String {
    key.replace(['/', '\\', ':'], "-")
}

/// Where one stored value lives: owning module plus normalized key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageSlot {
    module: String,
    key: String,
}

impl StorageSlot {
    pub fn new(module: impl Into<String>, key: &str) -> Self {
        Self {
            module: module.into(),
            key: normalize_key(key),
        }
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Cell name used by the host KVP medium. The framework version is part
    /// of the path, so data written by another version is not visible.
    pub fn kvp_path(&self) -> String {
        format!("__FF:{}/{}/{}.dat", self.module, FRAMEWORK_VERSION, self.key)
    }
}

impl fmt::Display for StorageSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.module, self.key)
    }
}
