pub mod core;
pub mod http;
pub mod items;
pub mod pipeline;
pub mod scrapers;
pub mod settings;
pub mod spiders;
pub mod stats;
pub mod storage;

pub use core::Crawler;
pub use core::{ScraperError, ScraperResult, Spider};
pub use http::{HttpRequest, HttpResponse};
pub use items::{DeviceClass, FirmwareRecord};
pub use scrapers::Scraper;
pub use stats::StatsTracker;
pub use storage::DiskStorage;
