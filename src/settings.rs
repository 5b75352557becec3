use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use crate::pipeline::FilePathStrategy;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpiderName {
    Asus,
    AvmGpl,
    LinksysGpl,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathStrategy {
    /// Keep the file name from the download URL
    Basename,
    /// Nest files under their SHA-256
    Hash,
}

impl From<PathStrategy> for FilePathStrategy {
    fn from(strategy: PathStrategy) -> Self {
        match strategy {
            PathStrategy::Basename => FilePathStrategy::UrlBasename,
            PathStrategy::Hash => FilePathStrategy::ContentHash,
        }
    }
}

/// Crawl vendor sites for firmware releases and download the images.
#[derive(Parser, Debug)]
#[command(name = "firmware-crawler")]
#[command(version)]
pub struct Settings {
    /// Spider to run
    #[arg(value_enum)]
    pub spider: SpiderName,

    /// Directory downloaded firmware files are written to
    #[arg(long, env = "FIRMWARE_FILES_STORE", default_value = "firmware_files/")]
    pub files_store: PathBuf,

    /// Directory firmware records are persisted to
    #[arg(long, env = "FIRMWARE_RECORDS_DIR", default_value = "data")]
    pub records_dir: String,

    /// Firmware download timeout in seconds
    #[arg(long, env = "FIRMWARE_DOWNLOAD_TIMEOUT", default_value_t = 320)]
    pub download_timeout: u64,

    /// Chromium executable used for rendered pages
    #[arg(long, env = "FIRMWARE_BROWSER_PATH")]
    pub browser_path: Option<PathBuf>,

    #[arg(long, value_enum, env = "FIRMWARE_PATH_STRATEGY", default_value = "basename")]
    pub path_strategy: PathStrategy,

    #[arg(long, env = "FIRMWARE_LOG_LEVEL", default_value = "debug")]
    pub log_level: String,

    /// Crawl every Linksys GPL row instead of the whitelist
    #[arg(long)]
    pub no_whitelist: bool,
}

impl Settings {
    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout)
    }

    /// Unknown levels fall back to `debug`.
    pub fn log_level(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Debug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::try_parse_from(["firmware-crawler", "asus"]).unwrap();

        assert_eq!(settings.spider, SpiderName::Asus);
        assert_eq!(settings.download_timeout(), Duration::from_secs(320));
        assert_eq!(settings.path_strategy, PathStrategy::Basename);
        assert_eq!(settings.log_level(), log::LevelFilter::Debug);
        assert!(!settings.no_whitelist);
    }

    #[test]
    fn test_flags_override_defaults() {
        let settings = Settings::try_parse_from([
            "firmware-crawler",
            "avm-gpl",
            "--path-strategy",
            "hash",
            "--download-timeout",
            "30",
            "--log-level",
            "warn",
        ])
        .unwrap();

        assert_eq!(settings.spider, SpiderName::AvmGpl);
        assert_eq!(
            FilePathStrategy::from(settings.path_strategy),
            FilePathStrategy::ContentHash
        );
        assert_eq!(settings.download_timeout, 30);
        assert_eq!(settings.log_level(), log::LevelFilter::Warn);
    }

    #[test]
    fn test_unknown_spider_is_rejected() {
        assert!(Settings::try_parse_from(["firmware-crawler", "netgear"]).is_err());
    }
}
