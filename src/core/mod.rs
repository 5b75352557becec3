mod crawling;
mod errors;
pub mod retry;
pub mod spider;
mod throttle;

pub use crawling::Crawler;
pub use errors::{ScraperError, ScraperResult};
pub use spider::{ParseResult, Spider, SpiderCallback, SpiderConfig, SpiderResponse};
pub use throttle::HostThrottle;
