use async_trait::async_trait;
use chrono::NaiveDate;
use log::{debug, error};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::html::selector;
use crate::core::retry::RetryConfig;
use crate::core::spider::{ParseResult, SpiderCallback, SpiderConfig, SpiderResponse};
use crate::items::{DeviceClass, FirmwareMeta, FirmwareRecord};
use crate::{HttpRequest, ScraperError, ScraperResult, Spider};

const VENDOR: &str = "AVM";
const START_URLS: [&str; 3] = [
    "https://osp.avm.de/fritzbox/",       // routers
    "https://osp.avm.de/fritzwlan/",      // wlan repeaters
    "https://osp.avm.de/fritzpowerline/", // powerline adapters
];
const LISTING_DATE_FORMAT: &str = "%d-%b-%Y";
const DEFAULT_VERSION: &str = "0.0";

/// One row of an autoindex listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingEntry {
    pub url: Url,
    pub date: Option<NaiveDate>,
    /// `None` for folders, which list `-` as their size.
    pub size: Option<u64>,
}

impl ListingEntry {
    pub fn is_file(&self) -> bool {
        self.size.is_some()
    }
}

/// Walks AVM's open-source portal and yields one record per GPL archive.
pub struct AvmGplSpider {
    config: SpiderConfig,
    links: Selector,
    archive_pattern: Regex,
    version_pattern: Regex,
}

impl AvmGplSpider {
    pub fn new() -> ScraperResult<Self> {
        let regex = |pattern: &str| {
            Regex::new(pattern).map_err(|e| ScraperError::ExtractionError(e.to_string()))
        };

        Ok(Self {
            config: Self::default_config(),
            links: selector("a[href]")?,
            archive_pattern: regex(r"\.(tar|gz|bz2)")?,
            version_pattern: regex(r"(\d{1,2}\.\d{2})")?,
        })
    }

    pub fn default_config() -> SpiderConfig {
        SpiderConfig::default()
            .with_handle_http_status(vec![404])
            .with_retry(RetryConfig::firmware_defaults())
    }

    /// Listing rows, skipping parent-directory links. Each link must be
    /// followed by a `<date> <time> <size>` text node.
    pub fn extract_entries(&self, document: &Html, page_url: &Url) -> Vec<ListingEntry> {
        document
            .select(&self.links)
            .filter_map(|link| {
                let href = link.value().attr("href")?;
                if href.contains("..") {
                    return None;
                }
                let url = page_url.join(href).ok()?;
                let info = following_text(link)?;
                Self::parse_link_info(url, &info)
            })
            .collect()
    }

    fn parse_link_info(url: Url, info: &str) -> Option<ListingEntry> {
        let parts: Vec<&str> = info.split_whitespace().collect();
        let [date, _time, size] = parts.as_slice() else {
            debug!("Unexpected listing info {:?} for {}", info, url);
            return None;
        };

        Some(ListingEntry {
            date: NaiveDate::parse_from_str(date, LISTING_DATE_FORMAT).ok(),
            size: size.parse().ok(),
            url,
        })
    }

    pub fn is_gpl_archive(&self, entry: &ListingEntry) -> bool {
        entry.is_file() && self.archive_pattern.is_match(entry.url.as_str())
    }

    pub fn prepare_record(&self, entry: &ListingEntry) -> Option<FirmwareRecord> {
        let device_name = entry
            .url
            .path_segments()
            .and_then(|segments| segments.last())
            .unwrap_or_default()
            .to_string();
        let firmware_version = self
            .version_pattern
            .captures(&device_name)
            .map(|caps| caps[1].to_string())
            .unwrap_or_else(|| DEFAULT_VERSION.to_string());

        FirmwareMeta {
            vendor: VENDOR.to_string(),
            device_class: map_device_class(&device_name),
            firmware_version: Some(firmware_version),
            release_date: entry.date,
            file_urls: Some(vec![entry.url.clone()]),
            device_name: Some(device_name),
        }
        .into_record()
    }

    fn handle(&self, response: SpiderResponse, url: Url, depth: usize) -> ScraperResult<ParseResult> {
        if let SpiderCallback::Custom(ref name) = response.callback {
            error!("Unhandled custom callback: {}", name);
            return Ok(ParseResult::Skip);
        }

        let document = Html::parse_document(&response.response.decoded_body);
        let (archives, folders): (Vec<_>, Vec<_>) = self
            .extract_entries(&document, &url)
            .into_iter()
            .filter(|entry| !entry.is_file() || self.is_gpl_archive(entry))
            .partition(ListingEntry::is_file);

        let items = archives
            .iter()
            .filter_map(|entry| self.prepare_record(entry))
            .collect();
        let requests = folders
            .into_iter()
            .map(|entry| HttpRequest::new(entry.url, SpiderCallback::Bootstrap, depth + 1))
            .collect();

        Ok(ParseResult::Yield { items, requests })
    }
}

fn following_text(link: ElementRef) -> Option<String> {
    let text = link.next_sibling()?.value().as_text()?;
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Device class from an archive name such as `FRITZBox_7590-07.29.tar.gz`.
pub fn map_device_class(device_name: &str) -> Option<DeviceClass> {
    let name = device_name.to_lowercase();
    if name.contains("powerline") {
        Some(DeviceClass::PowerlineAdapter)
    } else if name.contains("repeater") || name.contains("wlan") {
        Some(DeviceClass::Repeater)
    } else if name.contains("fritzbox") || name.contains("fritz.box") || name.contains("fritz_box") {
        Some(DeviceClass::ModemRouter)
    } else {
        None
    }
}

#[async_trait]
impl Spider for AvmGplSpider {
    fn name(&self) -> String {
        "avm_gpl".to_string()
    }

    fn start_urls(&self) -> Vec<Url> {
        START_URLS
            .iter()
            .filter_map(|url| Url::parse(url).ok())
            .collect()
    }

    fn allowed_domains(&self) -> Option<Vec<String>> {
        Some(vec!["osp.avm.de".to_string()])
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

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"<html><head><title>Index of /fritzbox/</title></head><body>
<h1>Index of /fritzbox/</h1><hr><pre><a href="../">../</a>
<a href="fritzbox-7590/">fritzbox-7590/</a>                                     07-Jan-2021 10:21                   -
<a href="FRITZBox_7590-07.21.tar.gz">FRITZBox_7590-07.21.tar.gz</a>                         12-Mar-2021 08:15           734003200
<a href="README.txt">README.txt</a>                                         01-Feb-2020 09:00                1024
<a href="source-notes">source-notes</a>                                     broken
</pre><hr></body></html>"#;

    fn page_url() -> Url {
        Url::parse("https://osp.avm.de/fritzbox/").unwrap()
    }

    #[test]
    fn test_extract_entries() {
        let spider = AvmGplSpider::new().unwrap();
        let document = Html::parse_document(LISTING);
        let entries = spider.extract_entries(&document, &page_url());

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].url.as_str(), "https://osp.avm.de/fritzbox/fritzbox-7590/");
        assert!(!entries[0].is_file());
        assert_eq!(entries[0].date, NaiveDate::from_ymd_opt(2021, 1, 7));

        assert_eq!(entries[1].size, Some(734003200));
        assert!(spider.is_gpl_archive(&entries[1]));
        assert!(!spider.is_gpl_archive(&entries[2]));
    }

    #[test]
    fn test_prepare_record() {
        let spider = AvmGplSpider::new().unwrap();
        let entry = ListingEntry {
            url: Url::parse("https://osp.avm.de/fritzbox/fritzbox-7590/FRITZBox_7590-07.21.tar.gz")
                .unwrap(),
            date: NaiveDate::from_ymd_opt(2021, 3, 12),
            size: Some(734003200),
        };

        let record = spider.prepare_record(&entry).unwrap();
        assert_eq!(record.vendor(), "AVM");
        assert_eq!(record.device_name(), Some("FRITZBox_7590-07.21.tar.gz"));
        assert_eq!(record.firmware_version(), Some("07.21"));
        assert_eq!(record.device_class(), Some(DeviceClass::ModemRouter));
        assert_eq!(record.release_date(), NaiveDate::from_ymd_opt(2021, 3, 12));
    }

    #[test]
    fn test_version_defaults_when_missing() {
        let spider = AvmGplSpider::new().unwrap();
        let entry = ListingEntry {
            url: Url::parse("https://osp.avm.de/fritzwlan/repeater-source.tar.bz2").unwrap(),
            date: None,
            size: Some(10),
        };

        let record = spider.prepare_record(&entry).unwrap();
        assert_eq!(record.firmware_version(), Some("0.0"));
        assert_eq!(record.device_class(), Some(DeviceClass::Repeater));
    }

    #[test]
    fn test_device_class_mapping() {
        assert_eq!(
            map_device_class("FRITZPowerline_1260E-07.29.tar.gz"),
            Some(DeviceClass::PowerlineAdapter)
        );
        assert_eq!(
            map_device_class("FRITZWLAN_Repeater_3000-07.27.tar.gz"),
            Some(DeviceClass::Repeater)
        );
        assert_eq!(map_device_class("dect_source.tar.gz"), None);
    }

    #[tokio::test]
    async fn test_parse_yields_archives_and_follows_folders() {
        use crate::http::{HttpResponse, ResponseType};
        use std::collections::HashMap;

        let spider = AvmGplSpider::new().unwrap();
        let request = HttpRequest::new(page_url(), SpiderCallback::Bootstrap, 0);
        let response = HttpResponse {
            url: page_url(),
            status: 200,
            headers: HashMap::new(),
            raw_body: LISTING.as_bytes().to_vec(),
            decoded_body: LISTING.to_string(),
            timestamp: chrono::Utc::now(),
            retry_count: 0,
            retry_history: HashMap::new(),
            meta: None,
            response_type: ResponseType::Html,
            from_request: Box::new(request),
        };

        let result = spider
            .parse(
                SpiderResponse {
                    response,
                    callback: SpiderCallback::Bootstrap,
                },
                page_url(),
                0,
            )
            .await
            .unwrap();

        match result {
            ParseResult::Yield { items, requests } => {
                assert_eq!(items.len(), 1);
                assert_eq!(items[0].firmware_version(), Some("07.21"));
                assert_eq!(requests.len(), 1);
                assert_eq!(requests[0].depth, 1);
                assert_eq!(requests[0].url.path(), "/fritzbox/fritzbox-7590/");
            }
            other => panic!("unexpected parse result: {:?}", other),
        }
    }
}
