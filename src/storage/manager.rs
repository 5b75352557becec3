use super::base::{IntoStorageData, StorageBackend, StorageError, StorageItem};
use super::{factory::Storage, StorageCategory, StorageConfig};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use url::Url;

#[derive(Clone)]
pub struct StorageManager {
    storages: HashMap<StorageCategory, (Storage, Box<dyn StorageConfig>)>,
    default_storage: StorageCategory,
}

impl Default for StorageManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageManager {
    pub fn new() -> Self {
        Self {
            storages: HashMap::new(),
            default_storage: StorageCategory::default(),
        }
    }

    pub fn register_storage(
        mut self,
        category: StorageCategory,
        storage: Storage,
        destination: &str,
    ) -> Self {
        let config = storage.create_config(destination);
        self.storages.insert(category, (storage, config));
        self
    }

    pub fn set_default_storage(mut self, category: StorageCategory) -> Self {
        self.default_storage = category;
        self
    }

    /// Falls back to the default category when `category` has no storage.
    pub fn get_storage(
        &self,
        category: &StorageCategory,
    ) -> Option<&(Storage, Box<dyn StorageConfig>)> {
        self.storages
            .get(category)
            .or_else(|| self.get_default_storage())
    }

    pub fn get_default_storage(&self) -> Option<&(Storage, Box<dyn StorageConfig>)> {
        self.storages.get(&self.default_storage)
    }

    pub async fn store<T: Serialize + Send + Sync + 'static>(
        &self,
        category: &StorageCategory,
        id: String,
        url: Url,
        data: T,
        metadata: Option<Value>,
    ) -> Result<(), StorageError> {
        let (storage, config) = self.get_storage(category).ok_or_else(|| {
            StorageError::OperationError(format!("No storage registered for {:?}", category))
        })?;

        let item = StorageItem {
            id,
            url,
            timestamp: Utc::now(),
            data: data.into_storage_data(),
            metadata,
        };
        storage.store_serialized(item, config.as_ref()).await
    }
}
