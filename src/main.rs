use anyhow::Context;
use clap::Parser;
use log::info;

use firmware_crawler::pipeline::FilesPipeline;
use firmware_crawler::scrapers::HttpScraper;
use firmware_crawler::settings::{Settings, SpiderName};
use firmware_crawler::spiders::{AsusSpider, AvmGplSpider, LinksysGplSpider};
use firmware_crawler::storage::{create_storage, StorageCategory, StorageManager, StorageType};
use firmware_crawler::{Crawler, Spider};

// GPL source archives run into the gigabytes
const GPL_MAX_FILE_SIZE: u64 = 2 * 1024 * 1024 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::parse();

    env_logger::builder()
        .filter_level(settings.log_level())
        .filter_module("selectors", log::LevelFilter::Warn)
        .filter_module("html5ever", log::LevelFilter::Error)
        .init();

    let storage = create_storage(StorageType::Disk {
        path: settings.records_dir.clone(),
    })
    .await
    .context("failed to open record storage")?;
    let storage_manager =
        StorageManager::new().register_storage(StorageCategory::Data, storage, "data");

    match settings.spider {
        SpiderName::Asus => run(&settings, storage_manager, AsusSpider::new()?).await,
        SpiderName::AvmGpl => run(&settings, storage_manager, AvmGplSpider::new()?).await,
        SpiderName::LinksysGpl => {
            let spider = LinksysGplSpider::new()?;
            let spider = if settings.no_whitelist {
                spider.with_whitelist(None)
            } else {
                spider
            };
            run(&settings, storage_manager, spider).await
        }
    }
}

async fn run<S: Spider + Send + Sync + 'static>(
    settings: &Settings,
    storage_manager: StorageManager,
    spider: S,
) -> anyhow::Result<()> {
    // file downloads keep the same per-host spacing as page fetches
    let mut pipeline = FilesPipeline::new(&settings.files_store, storage_manager)?
        .with_timeout(settings.download_timeout())?
        .with_path_strategy(settings.path_strategy.into())
        .with_download_delay(spider.config().download_delay);
    if settings.spider != SpiderName::Asus {
        pipeline = pipeline.with_max_file_size(GPL_MAX_FILE_SIZE);
    }

    let scraper = HttpScraper::new()?.with_timeout(settings.download_timeout())?;
    let crawler = Crawler::new(Box::new(scraper)).with_pipeline(pipeline);
    let crawler = with_renderer(crawler, settings);

    info!("Running spider {}", spider.name());
    crawler
        .run(spider)
        .await
        .context("crawl failed")
}

#[cfg(feature = "render")]
fn with_renderer(crawler: Crawler, settings: &Settings) -> Crawler {
    use firmware_crawler::scrapers::RenderScraper;

    let renderer = RenderScraper::new(settings.browser_path.clone(), settings.download_timeout());
    crawler.with_renderer(Box::new(renderer))
}

#[cfg(not(feature = "render"))]
fn with_renderer(crawler: Crawler, settings: &Settings) -> Crawler {
    if settings.browser_path.is_some() {
        log::warn!("Built without the render feature, ignoring browser path");
    }
    crawler
}
