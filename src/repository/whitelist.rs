// src/repository/whitelist.rs

//! Whitelisted packages
//!
//! Only packages the site owner has opted in are published. Plugins are
//! identified by basename (`acme/acme.php`), themes by directory slug.

use super::PackageRepository;
use crate::error::Result;
use crate::package::{Package, PackageType};
use crate::settings::SettingsStore;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Settings key listing whitelisted plugin basenames
pub const PLUGINS_KEY: &str = "plugins";

/// Settings key listing whitelisted theme slugs
pub const THEMES_KEY: &str = "themes";

/// Whitelist persisted in the settings store
#[derive(Clone)]
pub struct WhitelistSettings {
    settings: Arc<dyn SettingsStore>,
}

impl WhitelistSettings {
    pub fn new(settings: Arc<dyn SettingsStore>) -> Self {
        Self { settings }
    }

    fn key(package_type: PackageType) -> Option<&'static str> {
        match package_type {
            PackageType::Plugin => Some(PLUGINS_KEY),
            PackageType::Theme => Some(THEMES_KEY),
            PackageType::MuPlugin | PackageType::Dropin => None,
        }
    }

    /// Identifiers whitelisted for a package type
    pub fn entries(&self, package_type: PackageType) -> Result<Vec<String>> {
        match Self::key(package_type) {
            Some(key) => self.settings.get_string_list(key),
            None => Ok(Vec::new()),
        }
    }

    /// Add an identifier; returns whether the list changed
    pub fn add(&self, package_type: PackageType, id: &str) -> Result<bool> {
        let Some(key) = Self::key(package_type) else {
            return Ok(false);
        };

        let mut entries = self.settings.get_string_list(key)?;
        if entries.iter().any(|entry| entry == id) {
            return Ok(false);
        }

        entries.push(id.to_string());
        entries.sort();
        self.store(key, entries)?;
        info!("Whitelisted {} {}", package_type, id);
        Ok(true)
    }

    /// Remove an identifier; returns whether the list changed
    pub fn remove(&self, package_type: PackageType, id: &str) -> Result<bool> {
        let Some(key) = Self::key(package_type) else {
            return Ok(false);
        };

        let mut entries = self.settings.get_string_list(key)?;
        let before = entries.len();
        entries.retain(|entry| entry != id);
        if entries.len() == before {
            return Ok(false);
        }

        self.store(key, entries)?;
        info!("Removed {} {} from whitelist", package_type, id);
        Ok(true)
    }

    fn store(&self, key: &str, entries: Vec<String>) -> Result<()> {
        let value = Value::Array(entries.into_iter().map(Value::String).collect());
        self.settings.set(key, value)
    }

    /// Identifier a package is whitelisted under
    pub fn identifier(package: &Package) -> Option<&str> {
        match package.package_type() {
            PackageType::Plugin => package.basename(),
            _ => Some(package.slug()),
        }
    }
}

/// Installed packages restricted to the whitelist
pub struct Whitelist {
    installed: Arc<dyn PackageRepository>,
    whitelist: WhitelistSettings,
}

impl Whitelist {
    pub fn new(installed: Arc<dyn PackageRepository>, whitelist: WhitelistSettings) -> Self {
        Self { installed, whitelist }
    }
}

impl PackageRepository for Whitelist {
    fn all(&self) -> Result<Vec<Package>> {
        let plugins: HashSet<String> = self.whitelist.entries(PackageType::Plugin)?.into_iter().collect();
        let themes: HashSet<String> = self.whitelist.entries(PackageType::Theme)?.into_iter().collect();

        let packages: Vec<Package> = self
            .installed
            .all()?
            .into_iter()
            .filter(|package| {
                let allowed = match package.package_type() {
                    PackageType::Plugin => &plugins,
                    PackageType::Theme => &themes,
                    PackageType::MuPlugin | PackageType::Dropin => return false,
                };
                WhitelistSettings::identifier(package).is_some_and(|id| allowed.contains(id))
            })
            .collect();

        debug!(
            "Whitelist matched {} of {} entries",
            packages.len(),
            plugins.len() + themes.len()
        );
        Ok(packages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::PackageBuilder;
    use crate::repository::test_support::FixedRepository;
    use crate::settings::MemorySettings;

    fn installed() -> Arc<dyn PackageRepository> {
        Arc::new(FixedRepository(vec![
            PackageBuilder::new(PackageType::Plugin)
                .slug("acme")
                .basename("acme/acme.php")
                .build(),
            PackageBuilder::new(PackageType::Plugin)
                .slug("hello")
                .basename("hello.php")
                .build(),
            PackageBuilder::new(PackageType::Theme).slug("twentyten").build(),
        ]))
    }

    fn settings() -> WhitelistSettings {
        WhitelistSettings::new(Arc::new(MemorySettings::default()))
    }

    #[test]
    fn test_add_and_remove() {
        let whitelist = settings();
        assert!(whitelist.add(PackageType::Plugin, "acme/acme.php").unwrap());
        assert!(!whitelist.add(PackageType::Plugin, "acme/acme.php").unwrap());
        assert!(whitelist.add(PackageType::Theme, "twentyten").unwrap());
        assert_eq!(whitelist.entries(PackageType::Plugin).unwrap(), ["acme/acme.php"]);

        assert!(whitelist.remove(PackageType::Plugin, "acme/acme.php").unwrap());
        assert!(!whitelist.remove(PackageType::Plugin, "acme/acme.php").unwrap());
        assert!(whitelist.entries(PackageType::Plugin).unwrap().is_empty());
        assert!(!whitelist.add(PackageType::Dropin, "db.php").unwrap());
    }

    #[test]
    fn test_whitelist_filters_installed() {
        let whitelist = settings();
        whitelist.add(PackageType::Plugin, "acme/acme.php").unwrap();
        whitelist.add(PackageType::Theme, "twentyten").unwrap();

        let repo = Whitelist::new(installed(), whitelist);
        let packages = repo.all().unwrap();
        let slugs: Vec<_> = packages.iter().map(|p| p.slug()).collect();
        assert_eq!(slugs, ["acme", "twentyten"]);
    }

    #[test]
    fn test_stale_entries_are_skipped() {
        let whitelist = settings();
        whitelist.add(PackageType::Plugin, "acme/acme.php").unwrap();

        let repo = Whitelist::new(Arc::new(FixedRepository(Vec::new())), whitelist);
        assert!(repo.all().unwrap().is_empty());
    }

    #[test]
    fn test_theme_slug_does_not_match_plugin() {
        let whitelist = settings();
        whitelist.add(PackageType::Plugin, "twentyten").unwrap();

        let repo = Whitelist::new(installed(), whitelist);
        assert!(repo.all().unwrap().is_empty());
    }
}
