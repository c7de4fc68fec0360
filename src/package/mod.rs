// src/package/mod.rs

//! Package and release entities
//!
//! A [`Package`] is a plugin or theme exposed through the repository. Packages
//! are assembled by the builders in [`builder`] and never mutated afterwards;
//! whenever the installed copy, the whitelist or the cached artifacts change,
//! a fresh instance is built.
//!
//! A [`Release`] is a cheap view pairing a package with one of its versions.
//! It borrows the package, so releases are created on demand and thrown away.

pub mod builder;
mod release;

pub use builder::{InstalledPackageBuilder, PackageBuilder, PluginBuilder, ThemeBuilder};
pub use release::{Release, version_from_file};

use crate::error::{Error, Result};
use crate::version::compare_versions;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Kind of WordPress package
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, AsRefStr, EnumIter,
    Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PackageType {
    Plugin,
    Theme,
    #[strum(serialize = "muplugin")]
    #[serde(rename = "muplugin")]
    MuPlugin,
    Dropin,
}

impl PackageType {
    /// Short name used in storage paths and download URLs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plugin => "plugin",
            Self::Theme => "theme",
            Self::MuPlugin => "muplugin",
            Self::Dropin => "dropin",
        }
    }

    /// Composer package type understood by `composer/installers`
    pub fn composer_type(&self) -> String {
        format!("wordpress-{}", self.as_str())
    }
}

/// One known version of a package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseEntry {
    pub version: String,
    /// Remote artifact location; set only when bytes must be downloaded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

impl ReleaseEntry {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            source_url: None,
        }
    }

    pub fn with_source_url(version: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            source_url: Some(source_url.into()),
        }
    }
}

/// Named package attributes usable in repository criteria
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Slug,
    Type,
    Basename,
}

/// A named, typed software unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Package {
    name: String,
    slug: String,
    #[serde(rename = "type")]
    package_type: PackageType,
    author: String,
    author_url: String,
    description: String,
    homepage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    basename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    directory: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    installed_version: Option<String>,
    /// Sorted newest first, unique by version
    releases: Vec<ReleaseEntry>,
}

impl Package {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn package_type(&self) -> PackageType {
        self.package_type
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn author_url(&self) -> &str {
        &self.author_url
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn homepage(&self) -> &str {
        &self.homepage
    }

    /// Plugin file relative to the plugins directory (`acme/acme.php`)
    pub fn basename(&self) -> Option<&str> {
        self.basename.as_deref()
    }

    pub fn is_installed(&self) -> bool {
        self.directory.is_some() && self.installed_version.is_some()
    }

    /// Absolute source directory of the installed copy
    pub fn directory(&self) -> Result<&Path> {
        self.directory.as_deref().ok_or_else(|| self.not_installed())
    }

    pub fn installed_version(&self) -> Result<&str> {
        self.installed_version
            .as_deref()
            .ok_or_else(|| self.not_installed())
    }

    pub fn has_releases(&self) -> bool {
        !self.releases.is_empty()
    }

    pub fn release_entries(&self) -> &[ReleaseEntry] {
        &self.releases
    }

    /// All releases, newest first
    pub fn releases(&self) -> impl Iterator<Item = Release<'_>> + '_ {
        self.releases.iter().map(|entry| Release::from_entry(self, entry))
    }

    pub fn has_release(&self, version: &str) -> bool {
        self.releases.iter().any(|entry| entry.version == version)
    }

    /// Look up a release by its raw version string
    pub fn get_release(&self, version: &str) -> Result<Release<'_>> {
        self.releases
            .iter()
            .find(|entry| entry.version == version)
            .map(|entry| Release::from_entry(self, entry))
            .ok_or_else(|| Error::InvalidRelease {
                slug: self.slug.clone(),
                version: version.to_string(),
            })
    }

    /// Newest release by version comparison
    pub fn get_latest_release(&self) -> Result<Release<'_>> {
        self.releases
            .first()
            .map(|entry| Release::from_entry(self, entry))
            .ok_or_else(|| Error::InvalidRelease {
                slug: self.slug.clone(),
                version: "latest".to_string(),
            })
    }

    pub fn latest_release(&self) -> Option<Release<'_>> {
        self.get_latest_release().ok()
    }

    /// Release matching the installed version
    pub fn installed_release(&self) -> Result<Release<'_>> {
        let version = self.installed_version()?;
        self.get_release(version)
    }

    /// Whether a release newer than the installed copy is known
    pub fn is_update_available(&self) -> bool {
        match (self.installed_version.as_deref(), self.releases.first()) {
            (Some(installed), Some(latest)) => {
                compare_versions(installed, &latest.version) == Ordering::Less
            }
            _ => false,
        }
    }

    /// Download URL of the newest release
    pub fn latest_download_url(&self, base_url: &url::Url) -> Option<String> {
        self.latest_release()
            .map(|release| release.download_url(base_url))
    }

    /// Value of a named field for criteria matching
    pub fn field(&self, field: Field) -> Option<String> {
        match field {
            Field::Slug => Some(self.slug.clone()),
            Field::Type => Some(self.package_type.as_str().to_string()),
            Field::Basename => self.basename.clone(),
        }
    }

    fn not_installed(&self) -> Error {
        Error::PackageNotInstalled {
            slug: self.slug.clone(),
        }
    }
}
