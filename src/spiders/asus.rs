use async_trait::async_trait;
use chrono::NaiveDate;
use log::{debug, error, info};
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::BTreeSet;
use std::time::Duration;
use url::Url;

use super::html::{first_text, selector};
use crate::core::retry::{
    CategoryConfig, ContentRetryCondition, RetryCategory, RetryCondition, RetryConfig,
};
use crate::core::spider::{ParseResult, SpiderCallback, SpiderConfig, SpiderResponse};
use crate::items::{DeviceClass, FirmwareMeta, FirmwareRecord};
use crate::{HttpRequest, ScraperError, ScraperResult, Spider};

const VENDOR: &str = "asus";
const BASE_URL: &str = "https://www.asus.com/de/Networking-IoT-Servers/";
const CATEGORIES: [&str; 3] = ["WiFi-Routers", "Modem-Routers", "WiFi-6"];
const FIRMWARE_PATH: &str = "HelpDesk_BIOS/";
const RELEASE_DATE_FORMAT: &str = "%Y/%m/%d";
const BOT_CHALLENGE_PATTERN: &str = r"(?i)<title>\s*(access denied|attention required)|captcha";

/// Model-name prefix (lower-cased) to device class.
const DEVICE_DICTIONARY: [(&str, DeviceClass); 14] = [
    ("gt", DeviceClass::HomeRouter), // gaming
    ("rt", DeviceClass::HomeRouter),
    ("rp", DeviceClass::Repeater),
    ("ea", DeviceClass::AccessPoint),
    ("ly", DeviceClass::HomeRouter), // mesh
    ("bl", DeviceClass::HomeRouter), // mesh
    ("ds", DeviceClass::ModemRouter),
    ("pc", DeviceClass::PcieNetworkCard),
    ("us", DeviceClass::UsbNetworkCard),
    ("bt", DeviceClass::BluetoothAdapter),
    ("br", DeviceClass::BusinessRouter),
    ("es", DeviceClass::Server),
    ("rs", DeviceClass::Server),
    ("ro", DeviceClass::GamingRouter), // ROG Rapture
];

struct AsusSelectors {
    head_scripts: Selector,
    product_title: Selector,
    version: Selector,
    release_date: Selector,
    download_link: Selector,
}

impl AsusSelectors {
    fn new() -> ScraperResult<Self> {
        Ok(Self {
            head_scripts: selector("head script")?,
            product_title: selector(r#"h1[class*="productTitle"]"#)?,
            version: selector(r#"div[class*="ProductSupportDriverBIOS__version"]"#)?,
            release_date: selector(r#"div[class*="ProductSupportDriverBIOS__releaseDate"]"#)?,
            download_link: selector(
                r#"div[class*="ProductSupportDriverBIOS__contentRight"] a[href]"#,
            )?,
        })
    }
}

/// Crawls the ASUS networking catalogue. Listing pages embed the product
/// pages' canonical URLs in inline head scripts; each product's BIOS &
/// firmware tab is rendered client-side and carries the latest release.
pub struct AsusSpider {
    config: SpiderConfig,
    start_urls: Vec<Url>,
    url_pattern: Regex,
    selectors: AsusSelectors,
}

impl AsusSpider {
    pub fn new() -> ScraperResult<Self> {
        let start_urls = CATEGORIES
            .iter()
            .map(|category| Url::parse(&format!("{BASE_URL}{category}/All-series/filter/")))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            config: Self::default_config(),
            start_urls,
            url_pattern: Regex::new(r#""url": "(https://[\w\-./]+)""#)
                .map_err(|e| ScraperError::ExtractionError(e.to_string()))?,
            selectors: AsusSelectors::new()?,
        })
    }

    /// One request at a time with a one second gap. Pages that come back
    /// as a challenge instead of product content are fetched again after a
    /// longer pause.
    pub fn default_config() -> SpiderConfig {
        let mut retry = RetryConfig::firmware_defaults();
        retry.categories.insert(
            RetryCategory::BotDetection,
            CategoryConfig {
                max_retries: 2,
                initial_delay: Duration::from_secs(10),
                conditions: vec![RetryCondition::Content(ContentRetryCondition {
                    pattern: BOT_CHALLENGE_PATTERN.to_string(),
                    is_regex: true,
                })],
                ..CategoryConfig::default()
            },
        );

        SpiderConfig::default()
            .with_concurrency(1)
            .with_download_delay(Duration::from_secs(1))
            .with_retry(retry)
    }

    /// Canonical product URLs found in the listing's head scripts, with the
    /// firmware sub-path appended. Asset URLs that happen to match the
    /// pattern do not end in `/` and are dropped.
    pub fn firmware_page_urls(&self, document: &Html) -> Vec<Url> {
        let mut redirects = BTreeSet::new();
        for script in document.select(&self.selectors.head_scripts) {
            let body: String = script.text().collect();
            if !body.contains(r#""url""#) {
                continue;
            }
            redirects.extend(
                self.url_pattern
                    .captures_iter(&body)
                    .map(|caps| caps[1].to_string()),
            );
        }

        redirects
            .into_iter()
            .filter(|redirect| redirect.ends_with('/'))
            .filter_map(|redirect| match Url::parse(&format!("{redirect}{FIRMWARE_PATH}")) {
                Ok(url) => Some(url),
                Err(e) => {
                    debug!("Skipping unparsable product URL {}: {}", redirect, e);
                    None
                }
            })
            .collect()
    }

    /// Requests for every product firmware page on a listing. They go
    /// through the renderer, which the host throttle does not cover, so
    /// each carries its own random delay.
    pub fn discover_firmware_pages(&self, document: &Html, depth: usize) -> Vec<HttpRequest> {
        self.firmware_page_urls(document)
            .into_iter()
            .map(|url| {
                HttpRequest::new(url, SpiderCallback::ParseItem, depth + 1)
                    .with_render(true)
                    .with_delay(Self::render_delay())
            })
            .collect()
    }

    fn render_delay() -> Duration {
        Duration::from_secs_f64(0.5 + fastrand::f64() * 1.5)
    }

    /// `Ok(None)` when the page has no download link.
    pub fn parse_firmware(&self, document: &Html, url: &Url) -> ScraperResult<Option<FirmwareRecord>> {
        let meta = self.prepare_meta_data(document, url)?;
        Ok(meta.into_record())
    }

    fn prepare_meta_data(&self, document: &Html, url: &Url) -> ScraperResult<FirmwareMeta> {
        let device_name = self.extract_device_name(document);
        Ok(FirmwareMeta {
            vendor: VENDOR.to_string(),
            release_date: self.extract_release_date(document)?,
            firmware_version: self.extract_firmware_version(document),
            device_class: Self::extract_device_class(url.as_str(), device_name.as_deref()),
            file_urls: self.extract_file_url(document, url).map(|file_url| vec![file_url]),
            device_name,
        })
    }

    pub fn extract_device_name(&self, document: &Html) -> Option<String> {
        first_text(document, &self.selectors.product_title)
    }

    pub fn extract_firmware_version(&self, document: &Html) -> Option<String> {
        first_text(document, &self.selectors.version).map(|text| normalize_firmware_version(&text))
    }

    pub fn extract_release_date(&self, document: &Html) -> ScraperResult<Option<NaiveDate>> {
        first_text(document, &self.selectors.release_date)
            .map(|text| parse_release_date(&text))
            .transpose()
    }

    pub fn extract_device_class(url: &str, device_name: Option<&str>) -> Option<DeviceClass> {
        let prefix: Option<String> =
            device_name.map(|name| name.chars().take(2).collect::<String>().to_lowercase());
        if let Some(class) = prefix.as_deref().and_then(|prefix| {
            DEVICE_DICTIONARY
                .iter()
                .find(|(code, _)| *code == prefix)
                .map(|(_, class)| *class)
        }) {
            return Some(class);
        }
        if url.contains("Motherboards") {
            return Some(DeviceClass::Motherboard);
        }
        if url.contains("Commercial") {
            return Some(DeviceClass::Bios);
        }
        None
    }

    pub fn extract_file_url(&self, document: &Html, url: &Url) -> Option<Url> {
        let href = document
            .select(&self.selectors.download_link)
            .find_map(|link| link.value().attr("href"))?;
        match url.join(href.trim()) {
            Ok(file_url) => Some(file_url),
            Err(e) => {
                debug!("Ignoring download link {:?} on {}: {}", href, url, e);
                None
            }
        }
    }

    fn handle(&self, response: SpiderResponse, url: Url, depth: usize) -> ScraperResult<ParseResult> {
        let document = Html::parse_document(&response.response.decoded_body);
        match response.callback {
            SpiderCallback::Bootstrap => {
                let requests = self.discover_firmware_pages(&document, depth);
                info!("Found {} product firmware pages on {}", requests.len(), url);
                Ok(ParseResult::Continue(requests))
            }
            SpiderCallback::ParseItem => match self.parse_firmware(&document, &url)? {
                Some(record) => Ok(ParseResult::Yield {
                    items: vec![record],
                    requests: Vec::new(),
                }),
                None => {
                    debug!("No firmware download on {}, not a firmware page", url);
                    Ok(ParseResult::Skip)
                }
            },
            SpiderCallback::Custom(ref name) => {
                error!("Unhandled custom callback: {}", name);
                Ok(ParseResult::Skip)
            }
        }
    }
}

/// Drops the `Version` label and surrounding whitespace.
pub fn normalize_firmware_version(text: &str) -> String {
    text.replace("Version", "").trim().to_string()
}

/// `YYYY/MM/DD` to a date. Anything else is a [`ScraperError::MalformedDate`].
pub fn parse_release_date(text: &str) -> ScraperResult<NaiveDate> {
    let value = text.trim();
    NaiveDate::parse_from_str(value, RELEASE_DATE_FORMAT).map_err(|source| {
        ScraperError::MalformedDate {
            value: value.to_string(),
            source,
        }
    })
}

#[async_trait]
impl Spider for AsusSpider {
    fn name(&self) -> String {
        "asus".to_string()
    }

    fn start_urls(&self) -> Vec<Url> {
        self.start_urls.clone()
    }

    fn config(&self) -> &SpiderConfig {
        &self.config
    }

    fn set_config(&mut self, config: SpiderConfig) {
        self.config = config;
    }

    async fn parse(
        &self,
        spider_response: SpiderResponse,
        url: Url,
        depth: usize,
    ) -> ScraperResult<ParseResult> {
        self.handle(spider_response, url, depth)
    }
}
