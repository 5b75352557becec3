use async_trait::async_trait;
use futures::StreamExt;
use log::{debug, info, warn};
use parking_lot::Mutex;
use reqwest::{Client, Response};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tokio::time::sleep;
use url::Url;
use uuid::Uuid;

use super::ItemPipeline;
use crate::core::HostThrottle;
use crate::items::FirmwareRecord;
use crate::scrapers::http_scraper::DEFAULT_USER_AGENT;
use crate::storage::{StorageCategory, StorageManager};
use crate::{ScraperError, ScraperResult, StatsTracker};

/// Where a downloaded file lands, relative to the files store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilePathStrategy {
    /// Last segment of the download URL.
    #[default]
    UrlBasename,
    /// `ab/cd/<rest>` split of the content's SHA-256.
    ContentHash,
}

impl FilePathStrategy {
    pub fn file_path(&self, url: &Url, checksum: &str) -> PathBuf {
        match self {
            FilePathStrategy::UrlBasename => url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .filter(|name| !name.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| Self::hashed_path(checksum)),
            FilePathStrategy::ContentHash => Self::hashed_path(checksum),
        }
    }

    fn hashed_path(checksum: &str) -> PathBuf {
        [&checksum[..2], &checksum[2..4], &checksum[4..]]
            .iter()
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredFile {
    pub url: Url,
    pub path: String,
    pub checksum: String,
}

/// What gets persisted: the record plus the files fetched for it.
#[derive(Debug, Clone, Serialize)]
pub struct PersistedRecord {
    #[serde(flatten)]
    pub record: FirmwareRecord,
    pub files: Vec<StoredFile>,
}

/// Downloads every `file_urls` entry into the files store, then persists
/// the record through the storage manager.
///
/// Bodies are streamed to a `.part` file next to their final location, so
/// memory use stays flat regardless of archive size. Downloads from one host
/// run one at a time and share the crawler's politeness window.
pub struct FilesPipeline {
    client: Client,
    files_store: PathBuf,
    path_strategy: FilePathStrategy,
    max_file_size: Option<u64>,
    storage: StorageManager,
    stats: Arc<StatsTracker>,
    throttle: Arc<HostThrottle>,
    download_delay: Duration,
    host_slots: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl FilesPipeline {
    pub fn new<P: AsRef<Path>>(files_store: P, storage: StorageManager) -> ScraperResult<Self> {
        let files_store = files_store.as_ref().to_path_buf();
        std::fs::create_dir_all(&files_store)?;

        Ok(Self {
            client: Self::build_client(None)?,
            files_store,
            path_strategy: FilePathStrategy::default(),
            max_file_size: None,
            storage,
            stats: Arc::new(StatsTracker::new()),
            throttle: Arc::new(HostThrottle::new()),
            download_delay: Duration::ZERO,
            host_slots: Mutex::new(HashMap::new()),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> ScraperResult<Self> {
        self.client = Self::build_client(Some(timeout))?;
        Ok(self)
    }

    pub fn with_path_strategy(mut self, strategy: FilePathStrategy) -> Self {
        self.path_strategy = strategy;
        self
    }

    pub fn with_max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = Some(max_file_size);
        self
    }

    /// Gap between two downloads from the same host.
    pub fn with_download_delay(mut self, delay: Duration) -> Self {
        self.download_delay = delay;
        self
    }

    fn build_client(timeout: Option<Duration>) -> ScraperResult<Client> {
        let mut builder = Client::builder().user_agent(DEFAULT_USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(builder.build()?)
    }

    fn check_size(&self, url: &Url, size: u64) -> ScraperResult<()> {
        match self.max_file_size {
            Some(max) if size > max => Err(ScraperError::DownloadError {
                url: url.to_string(),
                reason: format!("{} bytes exceeds the {} byte limit", size, max),
            }),
            _ => Ok(()),
        }
    }

    fn host_slot(&self, host: &str) -> Arc<Semaphore> {
        let mut slots = self.host_slots.lock();
        Arc::clone(
            slots
                .entry(host.to_string())
                .or_insert_with(|| Arc::new(Semaphore::new(1))),
        )
    }

    async fn download(&self, url: &Url) -> ScraperResult<StoredFile> {
        let host = url.host_str().unwrap_or_default();
        let _slot = self
            .host_slot(host)
            .acquire_owned()
            .await
            .map_err(|e| ScraperError::DownloadError {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let wait = self.throttle.reserve(host, self.download_delay);
        if !wait.is_zero() {
            debug!("Waiting {:?} before downloading {}", wait, url);
            sleep(wait).await;
        }

        debug!("Downloading firmware file {}", url);
        let response = self
            .client
            .get(url.clone())
            .send()
            .await?
            .error_for_status()?;

        if let Some(length) = response.content_length() {
            self.check_size(url, length)?;
        }

        let partial = self.files_store.join(format!(".{}.part", Uuid::now_v7()));
        let stored = match self.stream_to(url, response, &partial).await {
            Ok((checksum, size)) => self.move_into_place(url, &partial, checksum, size).await,
            Err(e) => Err(e),
        };
        if stored.is_err() && fs::remove_file(&partial).await.is_ok() {
            debug!("Removed partial download {}", partial.display());
        }
        stored
    }

    /// Writes the body to `partial` chunk by chunk, hashing as it goes.
    async fn stream_to(
        &self,
        url: &Url,
        response: Response,
        partial: &Path,
    ) -> ScraperResult<(String, u64)> {
        let mut file = fs::File::create(partial).await?;
        let mut hasher = Sha256::new();
        let mut size = 0u64;

        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            size += chunk.len() as u64;
            self.check_size(url, size)?;
            hasher.update(&chunk);
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        Ok((hex::encode(hasher.finalize()), size))
    }

    async fn move_into_place(
        &self,
        url: &Url,
        partial: &Path,
        checksum: String,
        size: u64,
    ) -> ScraperResult<StoredFile> {
        let relative = self.path_strategy.file_path(url, &checksum);
        let target = self.files_store.join(&relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::rename(partial, &target).await?;

        self.stats.record_file_download(size as usize);
        info!("Stored {} ({} bytes) at {}", url, size, target.display());

        Ok(StoredFile {
            url: url.clone(),
            path: relative.to_string_lossy().into_owned(),
            checksum,
        })
    }
}

#[async_trait]
impl ItemPipeline for FilesPipeline {
    async fn process_item(&self, record: FirmwareRecord) -> ScraperResult<()> {
        let mut files = Vec::with_capacity(record.file_urls().len());
        for url in record.file_urls() {
            match self.download(url).await {
                Ok(file) => files.push(file),
                Err(e) => {
                    warn!("Failed to download {}: {}", url, e);
                    self.stats.increment_pipeline_errors();
                }
            }
        }

        let source = record.file_urls()[0].clone();
        let id = files
            .first()
            .map(|file| file.checksum[..16].to_string())
            .unwrap_or_else(|| hex::encode(&Sha256::digest(source.as_str())[..8]));

        let persisted = PersistedRecord { record, files };
        self.storage
            .store(&StorageCategory::Data, id, source, persisted, None)
            .await?;
        Ok(())
    }

    fn set_stats(&mut self, stats: Arc<StatsTracker>) {
        self.stats = stats;
    }

    fn set_throttle(&mut self, throttle: Arc<HostThrottle>) {
        self.throttle = throttle;
    }
}
