use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use super::{StorageMedium, StorageSlot};
use crate::error::Result;
use crate::host::KvpStore;

/// Medium over the host's persistent string cells. Blobs are stored base64
/// encoded under [`StorageSlot::kvp_path`].
pub struct KvpStorage {
    store: Arc<dyn KvpStore>,
}

impl KvpStorage {
    pub fn new(store: Arc<dyn KvpStore>) -> Self {
        Self { store }
    }
}

impl StorageMedium for KvpStorage {
    fn read(&self, slot: &StorageSlot) -> Result<Option<Vec<u8>>> {
        match self.store.get_string(&slot.kvp_path()) {
            Some(cell) => Ok(Some(STANDARD.decode(cell)?)),
            None => Ok(None),
        }
    }

    fn write(&self, slot: &StorageSlot, payload: &[u8]) -> Result<()> {
        let path = slot.kvp_path();
        self.store.set_string(&path, STANDARD.encode(payload));
        tracing::trace!(path = %path, bytes = payload.len(), "kvp cell written");
        Ok(())
    }

    fn exists(&self, slot: &StorageSlot) -> Result<bool> {
        Ok(self.store.get_string(&slot.kvp_path()).is_some())
    }

    fn delete(&self, slot: &StorageSlot) -> Result<()> {
        let path = slot.kvp_path();
        if self.store.get_string(&path).is_some() {
            self.store.delete(&path);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FRAMEWORK_VERSION;
    use crate::host::MemoryHost;

    #[test]
    fn test_cell_path_and_base64_content() {
        let host = Arc::new(MemoryHost::new());
        let medium = KvpStorage::new(host.clone());
        let slot = StorageSlot::new("Garage", "cars/red");

        medium.write(&slot, &[1, 2, 3, 250]).unwrap();

        let cell = host
            .get_string(&format!("__FF:Garage/{}/cars-red.dat", FRAMEWORK_VERSION))
            .unwrap();
        assert_eq!(cell, "AQID+g==");
        assert_eq!(medium.read(&slot).unwrap(), Some(vec![1, 2, 3, 250]));
    }

    #[test]
    fn test_missing_cell_reads_none() {
        let medium = KvpStorage::new(Arc::new(MemoryHost::new()));
        let slot = StorageSlot::new("Garage", "cars");
        assert_eq!(medium.read(&slot).unwrap(), None);
        assert!(!medium.exists(&slot).unwrap());
    }

    #[test]
    fn test_delete_missing_cell_is_noop() {
        let host = Arc::new(MemoryHost::new());
        let medium = KvpStorage::new(host.clone());
        let slot = StorageSlot::new("Garage", "cars");

        medium.delete(&slot).unwrap();
        medium.write(&slot, b"x").unwrap();
        medium.delete(&slot).unwrap();

        assert_eq!(host.cell_count(), 0);
    }
}
