// src/package/release.rs

use super::{Package, PackageType, ReleaseEntry};
use url::Url;

/// One buildable, downloadable version of a package
///
/// Identity is `(type, slug, version)`. The version string is kept exactly as
/// the host reported it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release<'a> {
    package: &'a Package,
    version: String,
    source_url: Option<String>,
}

impl<'a> Release<'a> {
    pub fn new(package: &'a Package, version: impl Into<String>, source_url: Option<String>) -> Self {
        Self {
            package,
            version: version.into(),
            source_url: source_url.filter(|url| !url.is_empty()),
        }
    }

    pub(crate) fn from_entry(package: &'a Package, entry: &ReleaseEntry) -> Self {
        Self::new(package, entry.version.clone(), entry.source_url.clone())
    }

    pub fn package(&self) -> &'a Package {
        self.package
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Remote location to fetch the artifact from, if any
    pub fn source_url(&self) -> Option<&str> {
        self.source_url.as_deref()
    }

    pub fn package_type(&self) -> PackageType {
        self.package.package_type()
    }

    pub fn slug(&self) -> &'a str {
        self.package.slug()
    }

    /// Artifact file name: `{slug}-{version}.zip`
    pub fn file(&self) -> String {
        format!("{}-{}.zip", self.package.slug(), self.version)
    }

    /// Storage path relative to the storage root: `{type}/{slug}/{file}`
    pub fn file_path(&self) -> String {
        format!(
            "{}/{}/{}",
            self.package_type().as_str(),
            self.package.slug(),
            self.file()
        )
    }

    /// Whether this is the version currently installed on the host
    pub fn is_installed_version(&self) -> bool {
        self.package
            .installed_version()
            .is_ok_and(|installed| installed == self.version)
    }

    /// Public download URL: `{base}/satispress/{type}/{slug}/{version}`
    pub fn download_url(&self, base_url: &Url) -> String {
        let mut url = base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend([
                "satispress",
                self.package_type().as_str(),
                self.package.slug(),
                self.version.as_str(),
            ]);
        }
        url.to_string()
    }
}

/// Recover the version from an artifact file name produced by [`Release::file`]
pub fn version_from_file<'f>(slug: &str, file_name: &'f str) -> Option<&'f str> {
    file_name
        .strip_prefix(slug)?
        .strip_prefix('-')?
        .strip_suffix(".zip")
        .filter(|version| !version.is_empty())
}
