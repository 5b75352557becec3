pub mod base;
pub mod disk;
pub mod factory;
pub mod manager;
pub mod types;

pub use base::{IntoStorageData, StorageBackend, StorageConfig, StorageError, StorageItem};
pub use disk::DiskStorage;
pub use factory::{create_storage, Storage, StorageType};
pub use manager::StorageManager;
pub use types::StorageCategory;
