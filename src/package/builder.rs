// src/package/builder.rs

//! Package builders
//!
//! Builders are the only code allowed to populate a [`Package`]. Fields are
//! accumulated here and the immutable value is produced by `build()`, which
//! also orders releases newest first.

use super::{Package, PackageType, ReleaseEntry};
use crate::error::Result;
use crate::host::{InstalledRecord, PendingUpdate};
use crate::release::ReleaseManager;
use crate::version::compare_versions;
use std::path::PathBuf;
use tracing::debug;

/// Builder for [`Package`]
#[derive(Debug, Clone)]
pub struct PackageBuilder {
    package_type: PackageType,
    name: String,
    slug: String,
    author: String,
    author_url: String,
    description: String,
    homepage: String,
    basename: Option<String>,
    directory: Option<PathBuf>,
    installed_version: Option<String>,
    releases: Vec<ReleaseEntry>,
}

impl PackageBuilder {
    pub fn new(package_type: PackageType) -> Self {
        Self {
            package_type,
            name: String::new(),
            slug: String::new(),
            author: String::new(),
            author_url: String::new(),
            description: String::new(),
            homepage: String::new(),
            basename: None,
            directory: None,
            installed_version: None,
            releases: Vec::new(),
        }
    }

    /// Copy every field and release from an existing package
    pub fn with_package(mut self, package: &Package) -> Self {
        self.package_type = package.package_type;
        self.name = package.name.clone();
        self.slug = package.slug.clone();
        self.author = package.author.clone();
        self.author_url = package.author_url.clone();
        self.description = package.description.clone();
        self.homepage = package.homepage.clone();
        self.basename = package.basename.clone();
        self.directory = package.directory.clone();
        self.installed_version = package.installed_version.clone();
        for entry in &package.releases {
            self = self.add_release(entry.clone());
        }
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = slug.into();
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn author_url(mut self, url: impl Into<String>) -> Self {
        self.author_url = url.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn homepage(mut self, homepage: impl Into<String>) -> Self {
        self.homepage = homepage.into();
        self
    }

    pub fn basename(mut self, basename: impl Into<String>) -> Self {
        self.basename = Some(basename.into());
        self
    }

    pub fn directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    pub fn installed_version(mut self, version: impl Into<String>) -> Self {
        self.installed_version = Some(version.into());
        self
    }

    /// Add a release, replacing any existing entry with the same version
    pub fn add_release(mut self, entry: ReleaseEntry) -> Self {
        match self.releases.iter_mut().find(|r| r.version == entry.version) {
            Some(existing) => *existing = entry,
            None => self.releases.push(entry),
        }
        self
    }

    fn has_release(&self, version: &str) -> bool {
        self.releases.iter().any(|r| r.version == version)
    }

    /// Add every version already archived in storage
    pub fn add_cached_releases(mut self, manager: &ReleaseManager) -> Result<Self> {
        for version in manager.cached_versions(self.package_type, &self.slug)? {
            if !self.has_release(&version) {
                self = self.add_release(ReleaseEntry::new(version));
            }
        }
        Ok(self)
    }

    pub fn build(mut self) -> Package {
        self.releases
            .sort_by(|a, b| compare_versions(&b.version, &a.version));

        Package {
            name: self.name,
            slug: self.slug,
            package_type: self.package_type,
            author: self.author,
            author_url: self.author_url,
            description: self.description,
            homepage: self.homepage,
            basename: self.basename,
            directory: self.directory,
            installed_version: self.installed_version,
            releases: self.releases,
        }
    }
}

/// Builder for packages installed on the host
///
/// Merges three release sources: archived artifacts, the installed version,
/// and a pending update the host knows about.
#[derive(Debug, Clone)]
pub struct InstalledPackageBuilder {
    inner: PackageBuilder,
    pending_update: Option<PendingUpdate>,
}

impl InstalledPackageBuilder {
    pub fn new(package_type: PackageType) -> Self {
        Self {
            inner: PackageBuilder::new(package_type),
            pending_update: None,
        }
    }

    /// Populate scalar fields from a host record
    pub fn from_record(package_type: PackageType, slug: impl Into<String>, record: &InstalledRecord) -> Self {
        let mut inner = PackageBuilder::new(package_type)
            .name(&record.name)
            .slug(slug)
            .author(&record.author)
            .author_url(&record.author_url)
            .description(&record.description)
            .homepage(&record.homepage)
            .directory(&record.directory)
            .installed_version(&record.version);
        if let Some(basename) = &record.basename {
            inner = inner.basename(basename);
        }

        Self {
            inner,
            pending_update: None,
        }
    }

    pub fn with_package(mut self, package: &Package) -> Self {
        self.inner = self.inner.with_package(package);
        self
    }

    pub fn pending_update(mut self, update: Option<PendingUpdate>) -> Self {
        self.pending_update = update;
        self
    }

    pub fn add_release(mut self, entry: ReleaseEntry) -> Self {
        self.inner = self.inner.add_release(entry);
        self
    }

    /// Merge archived, installed, and pending-update releases
    pub fn add_cached_releases(mut self, manager: &ReleaseManager) -> Result<Self> {
        self.inner = self.inner.add_cached_releases(manager)?;

        if let Some(installed) = self.inner.installed_version.clone()
            && !self.inner.has_release(&installed)
        {
            self.inner = self.inner.add_release(ReleaseEntry::new(installed));
        }

        if let Some(update) = self.pending_update.take() {
            debug!(
                slug = %self.inner.slug,
                version = %update.version,
                "adding pending update release"
            );
            self.inner = self
                .inner
                .add_release(ReleaseEntry::with_source_url(update.version, update.package_url));
        }

        Ok(self)
    }

    pub fn build(self) -> Package {
        self.inner.build()
    }
}

/// Builds plugin packages from host records
pub struct PluginBuilder;

impl PluginBuilder {
    /// Start a builder for an installed plugin
    pub fn from_installed(record: &InstalledRecord) -> InstalledPackageBuilder {
        let slug = installed_slug(PackageType::Plugin, record);
        InstalledPackageBuilder::from_record(PackageType::Plugin, slug, record)
    }
}

/// Builds theme packages from host records
pub struct ThemeBuilder;

impl ThemeBuilder {
    /// Start a builder for an installed theme
    pub fn from_installed(record: &InstalledRecord) -> InstalledPackageBuilder {
        let slug = installed_slug(PackageType::Theme, record);
        InstalledPackageBuilder::from_record(PackageType::Theme, slug, record)
    }
}

/// Slug of an installed record
///
/// An explicit slug wins. Plugins otherwise derive it from their basename and
/// themes from their directory name.
pub fn installed_slug(package_type: PackageType, record: &InstalledRecord) -> String {
    if let Some(slug) = record.slug.as_deref().filter(|slug| !slug.is_empty()) {
        return slug.to_string();
    }

    match (package_type, record.basename.as_deref()) {
        (PackageType::Plugin, Some(basename)) => slug_from_basename(basename),
        _ => record
            .directory
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default(),
    }
}

/// Derive a plugin slug from its basename
///
/// `acme/acme.php` → `acme`; single-file plugins drop the `.php` extension.
pub fn slug_from_basename(basename: &str) -> String {
    match basename.split_once('/') {
        Some((directory, _)) => directory.to_string(),
        None => basename.trim_end_matches(".php").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archiver::Archiver;
    use crate::storage::LocalStorage;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn record(version: &str) -> InstalledRecord {
        InstalledRecord {
            name: "Acme".to_string(),
            basename: Some("acme/acme.php".to_string()),
            directory: PathBuf::from("/srv/wp/plugins/acme"),
            version: version.to_string(),
            ..Default::default()
        }
    }

    fn manager(root: &TempDir) -> ReleaseManager {
        let storage = Arc::new(LocalStorage::new(root.path().join("packages")));
        let archiver = Archiver::new(root.path().join("scratch"));
        ReleaseManager::new(storage, Arc::new(archiver))
    }

    #[test]
    fn test_slug_from_basename() {
        assert_eq!(slug_from_basename("acme/acme.php"), "acme");
        assert_eq!(slug_from_basename("hello.php"), "hello");
    }

    #[test]
    fn test_add_release_replaces_same_version() {
        let package = PackageBuilder::new(PackageType::Plugin)
            .slug("acme")
            .add_release(ReleaseEntry::new("1.0.0"))
            .add_release(ReleaseEntry::with_source_url("1.0.0", "https://example.com/a.zip"))
            .build();
        assert_eq!(package.release_entries().len(), 1);
        assert_eq!(
            package.get_release("1.0.0").unwrap().source_url(),
            Some("https://example.com/a.zip")
        );
    }

    #[test]
    fn test_with_package_copies_everything() {
        let original = PluginBuilder::from_installed(&record("1.0.0"))
            .add_release(ReleaseEntry::new("0.9.0"))
            .build();
        let copy = PackageBuilder::new(PackageType::Theme)
            .with_package(&original)
            .build();
        assert_eq!(copy, original);
    }

    #[test]
    fn test_installed_builder_merges_sources() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("packages/plugin/acme");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("acme-0.8.0.zip"), b"zip").unwrap();
        std::fs::write(dir.join("acme-1.0.0.zip"), b"zip").unwrap();

        let update = PendingUpdate {
            version: "1.1.0".to_string(),
            package_url: "https://example.com/acme-1.1.0.zip".to_string(),
        };

        let package = PluginBuilder::from_installed(&record("1.0.0"))
            .pending_update(Some(update))
            .add_cached_releases(&manager(&temp))
            .unwrap()
            .build();

        let versions: Vec<_> = package.releases().map(|r| r.version().to_string()).collect();
        assert_eq!(versions, ["1.1.0", "1.0.0", "0.8.0"]);
        assert_eq!(package.slug(), "acme");
        assert_eq!(package.basename(), Some("acme/acme.php"));
        assert!(package.get_release("1.0.0").unwrap().source_url().is_none());
        assert!(package.get_release("1.1.0").unwrap().source_url().is_some());
    }

    #[test]
    fn test_installed_version_synthesized_without_cache() {
        let temp = TempDir::new().unwrap();
        let package = PluginBuilder::from_installed(&record("2.0.0"))
            .add_cached_releases(&manager(&temp))
            .unwrap()
            .build();
        assert_eq!(package.installed_release().unwrap().version(), "2.0.0");
    }

    #[test]
    fn test_theme_slug_from_directory() {
        let theme = InstalledRecord {
            name: "Twenty Ten".to_string(),
            directory: PathBuf::from("/srv/wp/themes/twentyten"),
            version: "3.0".to_string(),
            ..Default::default()
        };
        let package = ThemeBuilder::from_installed(&theme).build();
        assert_eq!(package.slug(), "twentyten");
        assert_eq!(package.package_type(), PackageType::Theme);
    }
}
