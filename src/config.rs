// src/config.rs
//! Configuration file parsing
//!
//! Supports TOML configuration files with the following sections:
//! - [server] - Bind address, public URL, index cache TTL
//! - [storage] - Artifact root and scratch directory
//! - [archive] - Source exclusions and download timeout
//! - [repository] - Inventory and settings file locations
//! - [auth] - API keys

use crate::auth::ApiKey;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// TOML configuration file structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SatispressConfig {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub storage: StorageSection,

    #[serde(default)]
    pub archive: ArchiveSection,

    #[serde(default)]
    pub repository: RepositorySection,

    #[serde(default)]
    pub auth: AuthSection,
}

/// Server configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    /// Listen address
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Base URL clients use to reach this server; download URLs hang off it
    #[serde(default = "default_public_url")]
    pub public_url: String,

    /// How long a rendered packages.json stays valid (e.g., "12h")
    #[serde(default = "default_index_ttl")]
    pub index_ttl: String,

    /// Archive the installed release of every whitelisted package at startup
    #[serde(default)]
    pub archive_on_start: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            public_url: default_public_url(),
            index_ttl: default_index_ttl(),
            archive_on_start: false,
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_public_url() -> String {
    "http://127.0.0.1:8080/".to_string()
}

fn default_index_ttl() -> String {
    "12h".to_string()
}

/// Storage configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSection {
    /// Root directory for archived artifacts
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,

    /// Scratch directory for artifacts being built
    #[serde(default)]
    pub scratch: Option<PathBuf>,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            scratch: None,
        }
    }
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("/var/lib/satispress/packages")
}

/// Archive configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveSection {
    /// File and directory names left out of source archives
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,

    /// Timeout for downloading remote releases (e.g., "5m")
    #[serde(default = "default_download_timeout")]
    pub download_timeout: String,
}

impl Default for ArchiveSection {
    fn default() -> Self {
        Self {
            exclude: default_exclude(),
            download_timeout: default_download_timeout(),
        }
    }
}

fn default_exclude() -> Vec<String> {
    crate::archiver::DEFAULT_EXCLUSIONS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_download_timeout() -> String {
    "5m".to_string()
}

/// Repository configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct RepositorySection {
    /// TOML inventory of installed plugins and themes
    #[serde(default = "default_inventory")]
    pub inventory: PathBuf,

    /// JSON settings file holding the whitelist and vendor name
    #[serde(default = "default_settings")]
    pub settings: PathBuf,
}

impl Default for RepositorySection {
    fn default() -> Self {
        Self {
            inventory: default_inventory(),
            settings: default_settings(),
        }
    }
}

fn default_inventory() -> PathBuf {
    PathBuf::from("/etc/satispress/inventory.toml")
}

fn default_settings() -> PathBuf {
    PathBuf::from("/var/lib/satispress/settings.json")
}

/// Authentication configuration section
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthSection {
    #[serde(default)]
    pub api_keys: Vec<ApiKey>,
}

impl SatispressConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: SatispressConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Load from a file when given, otherwise use defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.bind_addr()?;
        self.public_url()?;
        self.index_ttl()?;
        self.download_timeout()?;

        if self.auth.api_keys.iter().any(|key| key.key.is_empty()) {
            anyhow::bail!("auth.api_keys entries must have a non-empty key");
        }

        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.server
            .bind
            .parse()
            .with_context(|| format!("Invalid server.bind address: {}", self.server.bind))
    }

    pub fn public_url(&self) -> Result<Url> {
        let url = Url::parse(&self.server.public_url)
            .with_context(|| format!("Invalid server.public_url: {}", self.server.public_url))?;
        if url.cannot_be_a_base() {
            anyhow::bail!("server.public_url must be a base URL, got {}", url);
        }
        Ok(url)
    }

    pub fn index_ttl(&self) -> Result<Duration> {
        parse_duration(&self.server.index_ttl).context("Invalid server.index_ttl")
    }

    pub fn download_timeout(&self) -> Result<Duration> {
        parse_duration(&self.archive.download_timeout).context("Invalid archive.download_timeout")
    }

    /// Convert to the internal ServerConfig structure
    #[cfg(feature = "server")]
    pub fn to_server_config(&self) -> Result<crate::server::ServerConfig> {
        Ok(crate::server::ServerConfig {
            bind_addr: self.bind_addr()?,
            index_ttl: self.index_ttl()?,
            archive_on_start: self.server.archive_on_start,
        })
    }

    /// Scratch directory, defaulting to `.scratch` under the storage root
    pub fn scratch_dir(&self) -> PathBuf {
        self.storage
            .scratch
            .clone()
            .unwrap_or_else(|| self.storage.root.join(".scratch"))
    }
}

/// Parse a duration string (e.g., "30s", "15m", "12h", "1d")
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim().to_lowercase();

    let (num_str, multiplier) = if let Some(num) = s.strip_suffix('d') {
        (num, 24 * 60 * 60)
    } else if let Some(num) = s.strip_suffix('h') {
        (num, 60 * 60)
    } else if let Some(num) = s.strip_suffix('m') {
        (num, 60)
    } else if let Some(num) = s.strip_suffix('s') {
        (num, 1)
    } else {
        (s.as_str(), 1)
    };

    let num: u64 = num_str
        .trim()
        .parse()
        .with_context(|| format!("Invalid duration number: {}", num_str))?;

    let secs = num
        .checked_mul(multiplier)
        .with_context(|| format!("Duration out of range: {}", s))?;

    Ok(Duration::from_secs(secs))
}
