// src/app.rs
//! Composition root
//!
//! Wires storage, archiver, release manager and the repository stack from a
//! [`SatispressConfig`]. Both the HTTP server and the CLI work through an
//! [`App`].

use crate::archiver::Archiver;
use crate::auth::{CapabilityAuthorizer, User};
use crate::composer::{ComposerIndex, ComposerRepositoryTransformer};
use crate::config::SatispressConfig;
use crate::error::Result;
use crate::host::{
    HttpDownloader, InventorySource, ReleaseAuthorizer, ReleaseObserver, SettingsVendor, VendorNameProvider,
};
use crate::package::{Package, PackageType};
use crate::release::{PackageArchiver, ReleaseManager};
use crate::repository::{
    CachedRepository, ComposerRepository, Criteria, InstalledPlugins, InstalledThemes, MultiRepository,
    PackageRepository, Whitelist, WhitelistSettings,
};
use crate::settings::{JsonFileSettings, SettingsStore};
use crate::storage::LocalStorage;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Long-lived services shared by every request
pub struct App {
    pub settings: Arc<dyn SettingsStore>,
    pub manager: Arc<ReleaseManager>,
    pub installed: Arc<dyn PackageRepository>,
    pub whitelist: WhitelistSettings,
    pub vendor: Arc<dyn VendorNameProvider>,
    pub authorizer: Arc<dyn ReleaseAuthorizer>,
    pub public_url: Url,
}

impl App {
    /// Build every service from configuration
    pub fn from_config(
        config: &SatispressConfig,
        observers: Vec<Arc<dyn ReleaseObserver>>,
    ) -> anyhow::Result<Self> {
        let downloader = HttpDownloader::new(config.download_timeout()?);
        let archiver = Archiver::new(config.scratch_dir())
            .with_exclusions(config.archive.exclude.clone())
            .with_downloader(Arc::new(downloader));
        let storage = LocalStorage::new(&config.storage.root);

        let mut manager = ReleaseManager::new(Arc::new(storage), Arc::new(archiver));
        for observer in observers {
            manager = manager.with_observer(observer);
        }
        let manager = Arc::new(manager);

        let inventory = Arc::new(InventorySource::new(&config.repository.inventory));
        let installed: Arc<dyn PackageRepository> = Arc::new(MultiRepository::new(vec![
            Arc::new(InstalledPlugins::new(inventory.clone(), manager.clone()).with_updates(inventory.clone())),
            Arc::new(InstalledThemes::new(inventory.clone(), manager.clone()).with_updates(inventory)),
        ]));

        let settings: Arc<dyn SettingsStore> = Arc::new(JsonFileSettings::new(&config.repository.settings));

        debug!(
            storage = %config.storage.root.display(),
            inventory = %config.repository.inventory.display(),
            "Services wired"
        );

        Ok(Self {
            whitelist: WhitelistSettings::new(settings.clone()),
            vendor: Arc::new(SettingsVendor::new(settings.clone())),
            settings,
            manager,
            installed,
            authorizer: Arc::new(CapabilityAuthorizer),
            public_url: config.public_url()?,
        })
    }

    /// Whitelisted installed packages, memoized for the lifetime of the value
    pub fn whitelisted(&self) -> Arc<dyn PackageRepository> {
        let whitelist = Whitelist::new(self.installed.clone(), self.whitelist.clone());
        Arc::new(CachedRepository::new(Arc::new(whitelist)))
    }

    /// Packages as published to Composer clients
    pub fn published(&self) -> Arc<dyn PackageRepository> {
        Arc::new(ComposerRepository::new(self.whitelisted(), self.vendor.clone()))
    }

    /// Published package by type and slug
    pub fn find_package(&self, package_type: PackageType, slug: &str) -> Result<Option<Package>> {
        self.published().first_where(&Criteria::package(package_type, slug))
    }

    pub fn transformer(&self) -> ComposerRepositoryTransformer {
        ComposerRepositoryTransformer::new(self.manager.clone(), self.authorizer.clone(), self.public_url.clone())
    }

    /// `packages.json` contents visible to a user
    pub fn index(&self, user: &User) -> Result<ComposerIndex> {
        self.transformer().transform(self.published().as_ref(), user)
    }

    /// Archiver over every whitelisted package
    pub fn package_archiver(&self) -> PackageArchiver {
        PackageArchiver::new(self.whitelisted(), self.manager.clone())
    }
}
