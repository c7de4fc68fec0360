// src/host.rs

//! Narrow interfaces to the hosting environment
//!
//! The repository core never discovers plugins, talks to the network or
//! decides permissions on its own. It consumes these traits, which are wired
//! up once in the composition root:
//!
//! - [`InstalledSource`] lists installed packages
//! - [`UpdateSource`] reports pending updates
//! - [`PackageDownloader`] fetches remote artifacts
//! - [`VendorNameProvider`] names the Composer vendor
//! - [`ReleaseAuthorizer`] answers capability questions
//! - [`ReleaseObserver`] receives archive and send notifications
//!
//! [`InventorySource`] reads a TOML inventory file standing in for the host's
//! plugin and theme scan.

use crate::auth::User;
use crate::error::{Error, Result};
use crate::package::builder::installed_slug;
use crate::package::{Package, PackageType, Release};
use crate::settings::SettingsStore;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Vendor used when none is configured
pub const DEFAULT_VENDOR: &str = "satispress";

/// Settings key holding the vendor name
pub const VENDOR_KEY: &str = "vendor";

/// Buffer size for streaming downloads (64 KB)
const DOWNLOAD_BUFFER_SIZE: usize = 64 * 1024;

/// An installed plugin or theme as the host reports it
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct InstalledRecord {
    pub name: String,
    /// Explicit slug; derived from `basename` or `directory` when absent
    pub slug: Option<String>,
    /// Plugin file relative to the plugins directory
    pub basename: Option<String>,
    pub author: String,
    pub author_url: String,
    pub description: String,
    pub homepage: String,
    pub directory: PathBuf,
    pub version: String,
    /// Pending update listed alongside the record; served by [`UpdateSource`]
    pub update: Option<PendingUpdate>,
}

/// Newer version the host knows how to fetch
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PendingUpdate {
    pub version: String,
    pub package_url: String,
}

/// Source of installed packages
pub trait InstalledSource: Send + Sync {
    fn installed(&self, package_type: PackageType) -> Result<Vec<InstalledRecord>>;
}

/// Source of host-reported pending updates
pub trait UpdateSource: Send + Sync {
    /// Pending updates of one package type, keyed by slug
    fn pending_updates(&self, package_type: PackageType) -> Result<HashMap<String, PendingUpdate>>;
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Inventory {
    plugin: Vec<InstalledRecord>,
    theme: Vec<InstalledRecord>,
}

/// Installed packages listed in a TOML inventory file
///
/// ```toml
/// [[plugin]]
/// name = "Acme"
/// basename = "acme/acme.php"
/// directory = "plugins/acme"
/// version = "1.0.0"
/// update = { version = "1.1.0", package_url = "https://example.com/acme.zip" }
///
/// [[theme]]
/// name = "Twenty Ten"
/// directory = "themes/twentyten"
/// version = "3.0"
/// ```
///
/// The file is re-read on every call. Relative directories resolve against
/// the directory containing the inventory.
#[derive(Debug, Clone)]
pub struct InventorySource {
    path: PathBuf,
}

impl InventorySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> Result<Inventory> {
        if !self.path.exists() {
            debug!("inventory {} does not exist, treating as empty", self.path.display());
            return Ok(Inventory::default());
        }

        let content = fs::read_to_string(&self.path)?;
        let mut inventory: Inventory = toml::from_str(&content)
            .map_err(|e| Error::Inventory(format!("{}: {e}", self.path.display())))?;

        let base = self.path.parent().unwrap_or(Path::new("."));
        for record in inventory.plugin.iter_mut().chain(inventory.theme.iter_mut()) {
            if record.directory.is_relative() {
                record.directory = base.join(&record.directory);
            }
        }

        Ok(inventory)
    }

    fn records(&self, package_type: PackageType) -> Result<Vec<InstalledRecord>> {
        let inventory = self.load()?;
        Ok(match package_type {
            PackageType::Plugin => inventory.plugin,
            PackageType::Theme => inventory.theme,
            PackageType::MuPlugin | PackageType::Dropin => Vec::new(),
        })
    }
}

impl InstalledSource for InventorySource {
    fn installed(&self, package_type: PackageType) -> Result<Vec<InstalledRecord>> {
        self.records(package_type)
    }
}

impl UpdateSource for InventorySource {
    fn pending_updates(&self, package_type: PackageType) -> Result<HashMap<String, PendingUpdate>> {
        let updates = self
            .records(package_type)?
            .into_iter()
            .filter_map(|record| {
                let slug = installed_slug(package_type, &record);
                record.update.map(|update| (slug, update))
            })
            .collect();
        Ok(updates)
    }
}

/// Fixed in-memory list of installed packages
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    plugins: Vec<InstalledRecord>,
    themes: Vec<InstalledRecord>,
}

impl StaticSource {
    pub fn new(plugins: Vec<InstalledRecord>, themes: Vec<InstalledRecord>) -> Self {
        Self { plugins, themes }
    }
}

impl InstalledSource for StaticSource {
    fn installed(&self, package_type: PackageType) -> Result<Vec<InstalledRecord>> {
        Ok(match package_type {
            PackageType::Plugin => self.plugins.clone(),
            PackageType::Theme => self.themes.clone(),
            PackageType::MuPlugin | PackageType::Dropin => Vec::new(),
        })
    }
}

/// Fetches a remote artifact into a temporary file
pub trait PackageDownloader: Send + Sync {
    fn download(&self, url: &str) -> Result<NamedTempFile>;
}

/// Blocking HTTP downloader
///
/// A client is built per download so it never outlives the blocking context
/// it runs in.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    timeout: Duration,
}

impl HttpDownloader {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn client(&self) -> Result<Client> {
        Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("satispress/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Download {
                url: String::new(),
                reason: format!("failed to create HTTP client: {e}"),
            })
    }
}

impl PackageDownloader for HttpDownloader {
    fn download(&self, url: &str) -> Result<NamedTempFile> {
        let download_error = |reason: String| Error::Download {
            url: url.to_string(),
            reason,
        };

        info!("Downloading package from {}", url);
        let client = self.client()?;
        let mut response = client
            .get(url)
            .send()
            .map_err(|e| download_error(e.to_string()))?;

        if !response.status().is_success() {
            return Err(download_error(format!("HTTP {}", response.status())));
        }

        let mut file = NamedTempFile::new()?;
        let mut buffer = vec![0u8; DOWNLOAD_BUFFER_SIZE];
        let mut written: u64 = 0;
        loop {
            let n = response
                .read(&mut buffer)
                .map_err(|e| download_error(format!("failed to read response: {e}")))?;
            if n == 0 {
                break;
            }
            file.write_all(&buffer[..n])?;
            written += n as u64;
        }
        file.flush()?;

        debug!("Downloaded {} bytes from {}", written, url);
        Ok(file)
    }
}

/// Supplies the Composer vendor name
pub trait VendorNameProvider: Send + Sync {
    fn vendor(&self) -> String;
}

/// Vendor name read from the settings store
pub struct SettingsVendor {
    settings: Arc<dyn SettingsStore>,
}

impl SettingsVendor {
    pub fn new(settings: Arc<dyn SettingsStore>) -> Self {
        Self { settings }
    }
}

impl VendorNameProvider for SettingsVendor {
    fn vendor(&self) -> String {
        self.settings
            .get(VENDOR_KEY)
            .ok()
            .flatten()
            .and_then(|value| value.as_str().map(str::trim).map(str::to_string))
            .filter(|vendor| !vendor.is_empty())
            .unwrap_or_else(|| DEFAULT_VENDOR.to_string())
    }
}

/// Capability checks consulted before exposing or serving a release
pub trait ReleaseAuthorizer: Send + Sync {
    fn can_view_release(&self, user: &User, package: &Package, release: &Release<'_>) -> bool;

    fn can_download(&self, user: &User, package: &Package, release: &Release<'_>) -> bool;
}

/// Extension points around the release lifecycle
pub trait ReleaseObserver: Send + Sync {
    /// A new artifact was moved into storage
    fn archived(&self, _release: &Release<'_>) {}

    /// An artifact is about to be sent to a client
    fn sending(&self, _release: &Release<'_>) {}
}
