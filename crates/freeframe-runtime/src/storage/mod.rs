//! Per-module persistence.
//!
//! Values are turned into bytes through [`BinarySerializable`]; a
//! [`StorageMedium`] moves those bytes without interpreting them. The
//! [`Storage`] facade is the only place that knows about fallbacks.

mod key;
mod kvp;
mod postgres;

pub use key::{StorageSlot, normalize_key};
pub use kvp::KvpStorage;
pub use postgres::PgStorage;

use std::sync::Arc;

use async_trait::async_trait;
use freeframe_protocol::{BinarySerializable, from_bytes, to_bytes};

use crate::error::{FrameworkError, Result};
use crate::host::KvpStore;
use crate::module::Module;

/// Byte-level backing store.
///
/// The `_async` forms default to the blocking ones for mediums without a
/// native async path.
#[async_trait]
pub trait StorageMedium: Send + Sync {
    /// `Ok(None)` when nothing is stored under `slot`.
    fn read(&self, slot: &StorageSlot) -> Result<Option<Vec<u8>>>;

    /// Insert or replace.
    fn write(&self, slot: &StorageSlot, payload: &[u8]) -> Result<()>;

    fn exists(&self, slot: &StorageSlot) -> Result<bool>;

    fn delete(&self, slot: &StorageSlot) -> Result<()>;

    async fn read_async(&self, slot: &StorageSlot) -> Result<Option<Vec<u8>>> {
        self.read(slot)
    }

    async fn write_async(&self, slot: &StorageSlot, payload: &[u8]) -> Result<()> {
        self.write(slot, payload)
    }

    async fn exists_async(&self, slot: &StorageSlot) -> Result<bool> {
        self.exists(slot)
    }

    async fn delete_async(&self, slot: &StorageSlot) -> Result<()> {
        self.delete(slot)
    }
}

// ============================================================================
// Typed facade
// ============================================================================

/// Typed access to a storage medium, namespaced by module name.
#[derive(Clone)]
pub struct Storage {
    medium: Arc<dyn StorageMedium>,
}

impl Storage {
    pub fn new(medium: Arc<dyn StorageMedium>) -> Self {
        Self { medium }
    }

    /// Storage over the host's key/value cells.
    pub fn kvp(store: Arc<dyn KvpStore>) -> Self {
        Self::new(Arc::new(KvpStorage::new(store)))
    }

    /// Bind the module name once, for use where no `&dyn Module` is at hand
    /// (constructors, subscription callbacks).
    pub fn scoped(&self, module: impl Into<String>) -> ModuleStorage {
        ModuleStorage {
            storage: self.clone(),
            module: module.into(),
        }
    }

    /// Fails with [`FrameworkError::NotFound`] when nothing is stored.
    pub fn load<T: BinarySerializable>(&self, module: &dyn Module, key: &str) -> Result<T> {
        self.load_slot(&StorageSlot::new(module.name(), key))
    }

    /// Like [`Storage::load`], but a missing value yields `fallback`. Any other
    /// failure still propagates.
    pub fn load_or<T: BinarySerializable>(
        &self,
        module: &dyn Module,
        key: &str,
        fallback: T,
    ) -> Result<T> {
        or_fallback(self.load(module, key), fallback)
    }

    pub fn save<T: BinarySerializable>(&self, module: &dyn Module, key: &str, value: &T) -> Result<()> {
        self.save_slot(&StorageSlot::new(module.name(), key), value)
    }

    pub fn exists(&self, module: &dyn Module, key: &str) -> Result<bool> {
        self.medium.exists(&StorageSlot::new(module.name(), key))
    }

    pub fn delete(&self, module: &dyn Module, key: &str) -> Result<()> {
        self.medium.delete(&StorageSlot::new(module.name(), key))
    }

    pub async fn load_async<T: BinarySerializable>(&self, module: &dyn Module, key: &str) -> Result<T> {
        self.load_slot_async(&StorageSlot::new(module.name(), key)).await
    }

    pub async fn load_or_async<T: BinarySerializable>(
        &self,
        module: &dyn Module,
        key: &str,
        fallback: T,
    ) -> Result<T> {
        or_fallback(self.load_async(module, key).await, fallback)
    }

    pub async fn save_async<T: BinarySerializable>(
        &self,
        module: &dyn Module,
        key: &str,
        value: &T,
    ) -> Result<()> {
        let payload = to_bytes(value);
        self.medium
            .write_async(&StorageSlot::new(module.name(), key), &payload)
            .await
    }

    pub async fn exists_async(&self, module: &dyn Module, key: &str) -> Result<bool> {
        self.medium
            .exists_async(&StorageSlot::new(module.name(), key))
            .await
    }

    pub async fn delete_async(&self, module: &dyn Module, key: &str) -> Result<()> {
        self.medium
            .delete_async(&StorageSlot::new(module.name(), key))
            .await
    }

    fn load_slot<T: BinarySerializable>(&self, slot: &StorageSlot) -> Result<T> {
        decode(slot, self.medium.read(slot)?)
    }

    async fn load_slot_async<T: BinarySerializable>(&self, slot: &StorageSlot) -> Result<T> {
        decode(slot, self.medium.read_async(slot).await?)
    }

    fn save_slot<T: BinarySerializable>(&self, slot: &StorageSlot, value: &T) -> Result<()> {
        self.medium.write(slot, &to_bytes(value))
    }
}

fn decode<T: BinarySerializable>(slot: &StorageSlot, payload: Option<Vec<u8>>) -> Result<T> {
    let payload = payload.ok_or_else(|| FrameworkError::NotFound {
        module: slot.module().to_string(),
        key: slot.key().to_string(),
    })?;
    Ok(from_bytes(payload)?)
}

fn or_fallback<T>(loaded: Result<T>, fallback: T) -> Result<T> {
    match loaded {
        Err(e) if e.is_not_found() => Ok(fallback),
        other => other,
    }
}

/// [`Storage`] with the module name already bound.
#[derive(Clone)]
pub struct ModuleStorage {
    storage: Storage,
    module: String,
}

impl ModuleStorage {
    pub fn module(&self) -> &str {
        &self.module
    }

    fn slot(&self, key: &str) -> StorageSlot {
        StorageSlot::new(self.module.clone(), key)
    }

    pub fn load<T: BinarySerializable>(&self, key: &str) -> Result<T> {
        self.storage.load_slot(&self.slot(key))
    }

    pub fn load_or<T: BinarySerializable>(&self, key: &str, fallback: T) -> Result<T> {
        or_fallback(self.load(key), fallback)
    }

    pub fn save<T: BinarySerializable>(&self, key: &str, value: &T) -> Result<()> {
        self.storage.save_slot(&self.slot(key), value)
    }

    pub fn exists(&self, key: &str) -> Result<bool> {
        self.storage.medium.exists(&self.slot(key))
    }

    pub fn delete(&self, key: &str) -> Result<()> {
        self.storage.medium.delete(&self.slot(key))
    }

    pub async fn load_async<T: BinarySerializable>(&self, key: &str) -> Result<T> {
        self.storage.load_slot_async(&self.slot(key)).await
    }

    pub async fn load_or_async<T: BinarySerializable>(&self, key: &str, fallback: T) -> Result<T> {
        or_fallback(self.load_async(key).await, fallback)
    }

    pub async fn save_async<T: BinarySerializable>(&self, key: &str, value: &T) -> Result<()> {
        let payload = to_bytes(value);
        self.storage
            .medium
            .write_async(&self.slot(key), &payload)
            .await
    }

    pub async fn exists_async(&self, key: &str) -> Result<bool> {
        self.storage.medium.exists_async(&self.slot(key)).await
    }

    pub async fn delete_async(&self, key: &str) -> Result<()> {
        self.storage.medium.delete_async(&self.slot(key)).await
    }
}
