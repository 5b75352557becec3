//! Firmware records handed from spiders to the item pipeline.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use url::Url;

/// Coarse product category, inferred from a model-name prefix or a URL hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DeviceClass {
    #[serde(rename = "Router (Home)")]
    HomeRouter,
    #[serde(rename = "Repeater")]
    Repeater,
    #[serde(rename = "Access Point")]
    AccessPoint,
    #[serde(rename = "Router (Modem)")]
    ModemRouter,
    #[serde(rename = "PCIe-Networkcard")]
    PcieNetworkCard,
    #[serde(rename = "USB-Networkcard")]
    UsbNetworkCard,
    #[serde(rename = "Bluetooth-Adapter")]
    BluetoothAdapter,
    #[serde(rename = "Router (Business)")]
    BusinessRouter,
    #[serde(rename = "Server")]
    Server,
    #[serde(rename = "Router (Gaming)")]
    GamingRouter,
    #[serde(rename = "Motherboard")]
    Motherboard,
    #[serde(rename = "BIOS")]
    Bios,
    #[serde(rename = "Powerline-Adapter")]
    PowerlineAdapter,
}

impl DeviceClass {
    pub fn label(&self) -> &'static str {
        match self {
            DeviceClass::HomeRouter => "Router (Home)",
            DeviceClass::Repeater => "Repeater",
            DeviceClass::AccessPoint => "Access Point",
            DeviceClass::ModemRouter => "Router (Modem)",
            DeviceClass::PcieNetworkCard => "PCIe-Networkcard",
            DeviceClass::UsbNetworkCard => "USB-Networkcard",
            DeviceClass::BluetoothAdapter => "Bluetooth-Adapter",
            DeviceClass::BusinessRouter => "Router (Business)",
            DeviceClass::Server => "Server",
            DeviceClass::GamingRouter => "Router (Gaming)",
            DeviceClass::Motherboard => "Motherboard",
            DeviceClass::Bios => "BIOS",
            DeviceClass::PowerlineAdapter => "Powerline-Adapter",
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A firmware release as scraped from a vendor page.
///
/// Only [`FirmwareMeta::into_record`] builds one, so `file_urls` is never
/// empty. Records are read-only after assembly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FirmwareRecord {
    vendor: String,
    device_name: Option<String>,
    device_class: Option<DeviceClass>,
    firmware_version: Option<String>,
    release_date: Option<NaiveDate>,
    file_urls: Vec<Url>,
}

impl FirmwareRecord {
    pub fn vendor(&self) -> &str {
        &self.vendor
    }

    pub fn device_name(&self) -> Option<&str> {
        self.device_name.as_deref()
    }

    pub fn device_class(&self) -> Option<DeviceClass> {
        self.device_class
    }

    pub fn firmware_version(&self) -> Option<&str> {
        self.firmware_version.as_deref()
    }

    pub fn release_date(&self) -> Option<NaiveDate> {
        self.release_date
    }

    pub fn file_urls(&self) -> &[Url] {
        &self.file_urls
    }
}

/// Extraction result before assembly. Every field may be missing.
#[derive(Debug, Clone, Default)]
pub struct FirmwareMeta {
    pub vendor: String,
    pub device_name: Option<String>,
    pub device_class: Option<DeviceClass>,
    pub firmware_version: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub file_urls: Option<Vec<Url>>,
}

impl FirmwareMeta {
    pub fn new(vendor: &str) -> Self {
        Self {
            vendor: vendor.to_string(),
            ..Default::default()
        }
    }

    /// `None` when there is nothing to download: the page was not a
    /// firmware page after all.
    pub fn into_record(self) -> Option<FirmwareRecord> {
        let file_urls = self.file_urls.filter(|urls| !urls.is_empty())?;
        Some(FirmwareRecord {
            vendor: self.vendor,
            device_name: self.device_name,
            device_class: self.device_class,
            firmware_version: self.firmware_version,
            release_date: self.release_date,
            file_urls,
        })
    }
}
