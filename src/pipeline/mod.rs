pub mod files;

pub use files::{FilePathStrategy, FilesPipeline, PersistedRecord, StoredFile};

use crate::core::HostThrottle;
use crate::items::FirmwareRecord;
use crate::{ScraperResult, StatsTracker};
use async_trait::async_trait;
use std::sync::Arc;

/// Downstream stage that receives every record a spider yields.
#[async_trait]
pub trait ItemPipeline: Send + Sync {
    async fn process_item(&self, record: FirmwareRecord) -> ScraperResult<()>;

    fn set_stats(&mut self, _stats: Arc<StatsTracker>) {}

    /// Hands the pipeline the crawler's per-host politeness window.
    fn set_throttle(&mut self, _throttle: Arc<HostThrottle>) {}
}
