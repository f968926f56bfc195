//! Firmware update workflow.
//!
//! Compares the running firmware against the vendor catalog, downloads and
//! uploads a newer image, then waits for the switch to come back with a
//! reset uptime.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::io::{Cursor, Read};
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::error::{DeviceError, Result, ScrapeError, TransportError};

use super::client::SwitchClient;
use super::scrape;
use super::transport::SwitchTransport;

/// Page showing the running firmware version.
pub const FIRMWARE_PAGE: &str = "/iss/specific/firmware.html";

/// Page showing the uptime.
pub const DASHBOARD_PAGE: &str = "/iss/specific/dashboard.html";

/// Firmware upload endpoint.
pub const UPLOAD_PATH: &str = "/iss/file/post/image1";

/// Vendor product catalog listing the latest downloads.
pub const CATALOG_URL: &str =
    "https://www.netgear.com/api/v2/product/getproductdetails?componentId=117073&publicationId=11";

/// Default time to wait for the reboot after an upload, in seconds.
pub const DEFAULT_REBOOT_WAIT_SECS: u64 = 600;

/// Delay between uptime polls while the switch reboots.
const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Timeout for catalog and image downloads.
const DOWNLOAD_TIMEOUT_SECS: u64 = 300;

/// Heading of the page the device returns after a successful upload.
const UPLOAD_OK_HEADING: &str = "FIRMWARE";

/// A four-part firmware version such as `1.0.5.4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FirmwareVersion([u32; 4]);

impl FirmwareVersion {
    /// Returns the numeric parts.
    #[must_use]
    pub const fn parts(self) -> [u32; 4] {
        self.0
    }
}

impl FromStr for FirmwareVersion {
    type Err = ScrapeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let invalid = || ScrapeError::invalid("firmware version", s);
        let mut parts = [0_u32; 4];
        let mut fields = s.trim().split('.');

        for part in &mut parts {
            *part = fields
                .next()
                .and_then(|f| f.parse().ok())
                .ok_or_else(invalid)?;
        }
        if fields.next().is_some() {
            return Err(invalid());
        }
        Ok(Self(parts))
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.0;
        write!(f, "{a}.{b}.{c}.{d}")
    }
}

impl Serialize for FirmwareVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Default, Deserialize)]
struct CatalogResponse {
    #[serde(default)]
    data: CatalogData,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogData {
    #[serde(rename = "typedComponent", default)]
    typed_component: TypedComponent,
}

#[derive(Debug, Default, Deserialize)]
struct TypedComponent {
    #[serde(rename = "downloadMap", default)]
    download_map: DownloadMap,
}

#[derive(Debug, Default, Deserialize)]
struct DownloadMap {
    #[serde(default)]
    latest: Vec<DownloadEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct DownloadEntry {
    #[serde(default)]
    content: DownloadContent,
}

#[derive(Debug, Default, Deserialize)]
struct DownloadContent {
    data: Option<DownloadData>,
}

#[derive(Debug, Default, Deserialize)]
struct DownloadData {
    #[serde(default)]
    title: String,
    url: Option<String>,
}

/// Latest firmware published in the vendor catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareRelease {
    /// Catalog entry title.
    pub title: String,
    /// Version parsed from the last word of the title.
    pub version: FirmwareVersion,
    /// Download URL of the zip archive.
    pub url: String,
}

/// Picks the first firmware entry from a catalog response.
///
/// # Errors
///
/// Returns an error if the JSON is invalid, no firmware entry exists, or
/// the entry has no URL or an unknown version format.
pub fn parse_catalog(json: &str) -> Result<FirmwareRelease> {
    let catalog: CatalogResponse = serde_json::from_str(json).map_err(|e| {
        TransportError::InvalidResponse {
            message: format!("Invalid firmware catalog: {e}"),
        }
    })?;

    let entry = catalog
        .data
        .typed_component
        .download_map
        .latest
        .into_iter()
        .filter_map(|entry| entry.content.data)
        .find(|data| data.title.to_lowercase().contains("firmware"))
        .ok_or_else(|| TransportError::InvalidResponse {
            message: String::from("No firmware listed in the vendor catalog"),
        })?;

    let version = entry
        .title
        .split_whitespace()
        .last()
        .unwrap_or_default()
        .parse::<FirmwareVersion>()?;

    let url = entry.url.ok_or_else(|| TransportError::InvalidResponse {
        message: format!("Catalog entry '{}' has no download URL", entry.title),
    })?;

    Ok(FirmwareRelease {
        title: entry.title,
        version,
        url,
    })
}

/// Extracts the single `.image` member of a firmware zip archive.
///
/// # Errors
///
/// Returns an error if the archive is invalid or does not contain exactly one image.
pub fn extract_image(archive: &[u8]) -> Result<(String, Vec<u8>)> {
    let invalid = |message: String| TransportError::InvalidResponse { message };

    let mut zip = zip::ZipArchive::new(Cursor::new(archive))
        .map_err(|e| invalid(format!("Invalid firmware archive: {e}")))?;

    let images: Vec<String> = zip
        .file_names()
        .filter(|name| name.to_lowercase().ends_with(".image"))
        .map(String::from)
        .collect();

    let [name] = images.as_slice() else {
        return Err(invalid(format!(
            "Expected one .image file in the firmware archive, found {}",
            images.len()
        ))
        .into());
    };

    let mut file = zip
        .by_name(name)
        .map_err(|e| invalid(format!("Failed to open {name}: {e}")))?;
    let mut image = Vec::new();
    file.read_to_end(&mut image)?;

    Ok((name.clone(), image))
}

/// Outcome of an update run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateCode {
    /// The running firmware is the latest.
    NoUpdate,
    /// A newer firmware exists but was not installed.
    UpdateAvailable,
    /// The newer firmware was installed.
    Updated,
}

impl fmt::Display for UpdateCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoUpdate => write!(f, "no_update"),
            Self::UpdateAvailable => write!(f, "update_available"),
            Self::Updated => write!(f, "updated"),
        }
    }
}

/// Report of an update run.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateReport {
    /// Outcome.
    pub code: UpdateCode,
    /// Human-readable outcome.
    pub message: String,
    /// Total run time in seconds.
    pub elapsed_secs: f64,
    /// Version running before the run.
    pub old_version: FirmwareVersion,
    /// Version running after the run (equal to `old_version` unless updated).
    pub new_version: FirmwareVersion,
    /// Latest version in the catalog.
    pub latest_version: FirmwareVersion,
}

/// Runs the firmware update against a logged-in client.
#[derive(Debug)]
pub struct FirmwareUpdater<'a> {
    client: &'a mut SwitchClient,
    http: reqwest::Client,
    catalog_url: String,
    reboot_wait: Duration,
    poll_interval: Duration,
}

impl<'a> FirmwareUpdater<'a> {
    /// Creates an updater using the vendor catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the download client cannot be created.
    pub fn new(client: &'a mut SwitchClient) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .build()
            .map_err(|e| TransportError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            http,
            catalog_url: String::from(CATALOG_URL),
            reboot_wait: Duration::from_secs(DEFAULT_REBOOT_WAIT_SECS),
            poll_interval: POLL_INTERVAL,
        })
    }

    /// Uses another catalog URL.
    #[must_use]
    pub fn with_catalog_url(mut self, url: impl Into<String>) -> Self {
        self.catalog_url = url.into();
        self
    }

    /// Sets how long to wait for the reboot.
    #[must_use]
    pub const fn with_reboot_wait(mut self, wait: Duration) -> Self {
        self.reboot_wait = wait;
        self
    }

    /// Sets the delay between uptime polls.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Reads the running firmware version.
    ///
    /// # Errors
    ///
    /// Returns an error if the page cannot be read or the version is malformed.
    pub async fn current_version(&self) -> Result<FirmwareVersion> {
        let page = self.client.get(FIRMWARE_PAGE).await?;
        Ok(scrape::extract_firmware_version(&page.body)?.parse::<FirmwareVersion>()?)
    }

    /// Fetches the latest release from the catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be fetched or parsed.
    pub async fn latest_release(&self) -> Result<FirmwareRelease> {
        debug!("Fetching firmware catalog {}", self.catalog_url);
        let body = self
            .http
            .get(&self.catalog_url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| TransportError::network(format!("Failed to fetch firmware catalog: {e}")))?
            .text()
            .await
            .map_err(|e| TransportError::network(format!("Failed to read firmware catalog: {e}")))?;
        parse_catalog(&body)
    }

    async fn uptime(&self) -> Result<Duration> {
        let page = self.client.get(DASHBOARD_PAGE).await?;
        Ok(scrape::extract_uptime(&page.body)?)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        info!("Downloading firmware from {url}");
        let bytes = self
            .http
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| TransportError::network(format!("Failed to download firmware: {e}")))?
            .bytes()
            .await
            .map_err(|e| TransportError::network(format!("Failed to read firmware download: {e}")))?;
        Ok(bytes.to_vec())
    }

    /// Checks for a newer firmware and installs it unless `check_only` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails or the switch does not come back in time.
    pub async fn run(&mut self, check_only: bool) -> Result<UpdateReport> {
        let started = Instant::now();

        let old_version = self.current_version().await?;
        let release = self.latest_release().await?;
        info!(
            "Running firmware {old_version}, latest is {}",
            release.version
        );

        let report = |code, message: String, new_version| UpdateReport {
            code,
            message,
            elapsed_secs: started.elapsed().as_secs_f64(),
            old_version,
            new_version,
            latest_version: release.version,
        };

        if old_version >= release.version {
            return Ok(report(
                UpdateCode::NoUpdate,
                String::from("No new updates"),
                old_version,
            ));
        }

        if check_only {
            return Ok(report(
                UpdateCode::UpdateAvailable,
                format!("Firmware {} is available", release.version),
                old_version,
            ));
        }

        let archive = self.download(&release.url).await?;
        let (file_name, image) = extract_image(&archive)?;

        let uptime_before = self.uptime().await?;
        let response = self
            .client
            .upload_firmware(UPLOAD_PATH, &file_name, image)
            .await?;
        let heading = scrape::extract_heading(&response.body);
        if !response.is_ok() || heading.as_deref() != Some(UPLOAD_OK_HEADING) {
            return Err(DeviceError::rejected(
                "Firmware upload",
                response.status,
                response.body,
            )
            .into());
        }

        info!("Firmware uploaded, waiting for the switch to reboot");
        self.wait_for_reboot(uptime_before).await?;

        let new_version = self.current_version().await?;
        Ok(report(
            UpdateCode::Updated,
            format!("Updated firmware from {old_version} to {new_version}"),
            new_version,
        ))
    }

    /// Polls until the uptime is lower than before the upload.
    async fn wait_for_reboot(&mut self, uptime_before: Duration) -> Result<()> {
        let deadline = Instant::now() + self.reboot_wait;

        loop {
            tokio::time::sleep(self.poll_interval).await;
            if Instant::now() > deadline {
                return Err(DeviceError::Timeout {
                    what: String::from("the switch to reboot after the firmware upload"),
                    secs: self.reboot_wait.as_secs(),
                }
                .into());
            }

            match self.poll_uptime().await {
                Ok(uptime) if uptime < uptime_before => {
                    info!("Switch rebooted (uptime {}s)", uptime.as_secs());
                    return Ok(());
                }
                Ok(_) => debug!("Switch has not rebooted yet"),
                Err(e) => debug!("Switch not reachable yet: {e}"),
            }
        }
    }

    async fn poll_uptime(&mut self) -> Result<Duration> {
        if !self.client.token_valid().await? {
            self.client.relogin().await?;
        }
        self.uptime().await
    }
}
