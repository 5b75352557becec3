use super::base::{StorageBackend, StorageConfig, StorageError, StorageItem};
use async_trait::async_trait;
use erased_serde::Serialize as ErasedSerialize;
use log::debug;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

/// Writes every item as a pretty-printed JSON document under
/// `<base>/<destination>/<host>/`.
#[derive(Clone)]
pub struct DiskStorage {
    base_path: PathBuf,
}

impl DiskStorage {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self, StorageError> {
        let base_path = base_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

#[derive(Debug, Clone)]
pub struct DiskConfig {
    pub subfolder: Option<String>,
    pub filename_prefix: Option<String>,
}

impl StorageConfig for DiskConfig {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn clone_box(&self) -> Box<dyn StorageConfig> {
        Box::new(self.clone())
    }

    fn destination(&self) -> &str {
        self.subfolder.as_deref().unwrap_or("")
    }
}

impl From<std::io::Error> for StorageError {
    fn from(error: std::io::Error) -> Self {
        StorageError::OperationError(error.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(error: serde_json::Error) -> Self {
        StorageError::SerializationError(error.to_string())
    }
}

#[async_trait]
impl StorageBackend for DiskStorage {
    fn create_config(&self, destination: &str) -> Box<dyn StorageConfig> {
        Box::new(DiskConfig {
            subfolder: Some(destination.to_string()),
            filename_prefix: None,
        })
    }

    async fn store_serialized(
        &self,
        item: StorageItem<Box<dyn ErasedSerialize + Send + Sync>>,
        config: &dyn StorageConfig,
    ) -> Result<(), StorageError> {
        let config = config
            .as_any()
            .downcast_ref::<DiskConfig>()
            .ok_or_else(|| StorageError::OperationError("Invalid config type".to_string()))?;

        let mut path = self.base_path.clone();
        if let Some(ref subfolder) = config.subfolder {
            path = path.join(subfolder);
        }

        let timestamp = item.timestamp.format("%Y%m%d_%H%M%S");
        let host = item.url.host_str().unwrap_or("unknown");
        let prefix = config.filename_prefix.as_deref().unwrap_or("");
        let filename = format!(
            "{}{}_{}_{}.json",
            prefix,
            timestamp,
            item.id,
            Uuid::now_v7()
        );

        let dir = path.join(host);
        fs::create_dir_all(&dir).await?;
        let final_path = dir.join(filename);

        let json = serde_json::json!({
            "url": item.url.to_string(),
            "timestamp": item.timestamp,
            "data": item.data,
            "metadata": item.metadata,
            "id": item.id,
        });

        fs::write(&final_path, serde_json::to_string_pretty(&json)?).await?;
        debug!("Stored item {} at {}", item.id, final_path.display());
        Ok(())
    }
}
