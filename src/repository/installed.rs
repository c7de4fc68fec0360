// src/repository/installed.rs

//! Installed packages on the host
//!
//! These leaf repositories rebuild their package list from the host on every
//! call. Wrap them in a [`super::CachedRepository`] when a request needs the
//! list more than once.

use super::{Criteria, PackageRepository, sort_packages};
use crate::error::Result;
use crate::host::{InstalledRecord, InstalledSource, UpdateSource};
use crate::package::builder::installed_slug;
use crate::package::{Field, InstalledPackageBuilder, Package, PackageType, PluginBuilder, ThemeBuilder};
use crate::release::ReleaseManager;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

struct InstalledScan {
    source: Arc<dyn InstalledSource>,
    updates: Option<Arc<dyn UpdateSource>>,
    manager: Arc<ReleaseManager>,
}

impl InstalledScan {
    fn packages(
        &self,
        package_type: PackageType,
        start: fn(&InstalledRecord) -> InstalledPackageBuilder,
    ) -> Result<Vec<Package>> {
        let records = self.source.installed(package_type)?;
        let mut updates = match &self.updates {
            Some(source) => source.pending_updates(package_type)?,
            None => HashMap::new(),
        };
        let mut packages = Vec::with_capacity(records.len());

        for record in &records {
            let update = updates.remove(&installed_slug(package_type, record));
            let builder = start(record).pending_update(update);
            packages.push(builder.add_cached_releases(&self.manager)?.build());
        }

        sort_packages(&mut packages);
        debug!("Scanned {} installed {}s", packages.len(), package_type);
        Ok(packages)
    }
}

/// Plugins installed on the host
pub struct InstalledPlugins {
    scan: InstalledScan,
}

impl InstalledPlugins {
    pub fn new(source: Arc<dyn InstalledSource>, manager: Arc<ReleaseManager>) -> Self {
        Self {
            scan: InstalledScan {
                source,
                updates: None,
                manager,
            },
        }
    }

    pub fn with_updates(mut self, updates: Arc<dyn UpdateSource>) -> Self {
        self.scan.updates = Some(updates);
        self
    }
}

/// Whether a slug criterion is really a plugin file path
fn looks_like_plugin_file(value: &str) -> bool {
    value.contains('/') || value.ends_with(".php")
}

impl PackageRepository for InstalledPlugins {
    fn all(&self) -> Result<Vec<Package>> {
        self.scan.packages(PackageType::Plugin, PluginBuilder::from_installed)
    }

    fn where_matches(&self, criteria: &Criteria) -> Result<Vec<Package>> {
        let mut criteria = criteria.clone();
        for (field, value) in criteria.conditions_mut() {
            if *field == Field::Slug && looks_like_plugin_file(value) {
                *field = Field::Basename;
            }
        }

        Ok(self
            .all()?
            .into_iter()
            .filter(|package| criteria.matches(package))
            .collect())
    }
}

/// Themes installed on the host
pub struct InstalledThemes {
    scan: InstalledScan,
}

impl InstalledThemes {
    pub fn new(source: Arc<dyn InstalledSource>, manager: Arc<ReleaseManager>) -> Self {
        Self {
            scan: InstalledScan {
                source,
                updates: None,
                manager,
            },
        }
    }

    pub fn with_updates(mut self, updates: Arc<dyn UpdateSource>) -> Self {
        self.scan.updates = Some(updates);
        self
    }
}

impl PackageRepository for InstalledThemes {
    fn all(&self) -> Result<Vec<Package>> {
        self.scan.packages(PackageType::Theme, ThemeBuilder::from_installed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archiver::Archiver;
    use crate::host::{PendingUpdate, StaticSource};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use crate::storage::LocalStorage;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn manager(temp: &TempDir) -> Arc<ReleaseManager> {
        let storage = Arc::new(LocalStorage::new(temp.path().join("packages")));
        let archiver = Arc::new(Archiver::new(temp.path().join("scratch")));
        Arc::new(ReleaseManager::new(storage, archiver))
    }

    fn source() -> Arc<StaticSource> {
        let plugin = |name: &str, basename: &str| InstalledRecord {
            name: name.to_string(),
            basename: Some(basename.to_string()),
            directory: PathBuf::from(format!("/srv/wp/plugins/{name}")),
            version: "1.0.0".to_string(),
            ..Default::default()
        };
        Arc::new(StaticSource::new(
            vec![plugin("zeta", "zeta/zeta.php"), plugin("acme", "acme/acme.php")],
            vec![InstalledRecord {
                name: "Twenty Ten".to_string(),
                directory: PathBuf::from("/srv/wp/themes/twentyten"),
                version: "3.0".to_string(),
                ..Default::default()
            }],
        ))
    }

    #[derive(Default)]
    struct OneUpdate {
        lookups: AtomicUsize,
    }

    impl UpdateSource for OneUpdate {
        fn pending_updates(&self, _package_type: PackageType) -> Result<HashMap<String, PendingUpdate>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            let update = PendingUpdate {
                version: "1.1.0".to_string(),
                package_url: "https://example.com/acme.zip".to_string(),
            };
            Ok(HashMap::from([("acme".to_string(), update)]))
        }
    }

    #[test]
    fn test_installed_plugins_sorted_with_installed_release() {
        let temp = TempDir::new().unwrap();
        let repo = InstalledPlugins::new(source(), manager(&temp));

        let packages = repo.all().unwrap();
        let slugs: Vec<_> = packages.iter().map(|p| p.slug()).collect();
        assert_eq!(slugs, ["acme", "zeta"]);
        assert_eq!(packages[0].installed_release().unwrap().version(), "1.0.0");
    }

    #[test]
    fn test_pending_updates_become_releases() {
        let temp = TempDir::new().unwrap();
        let repo = InstalledPlugins::new(source(), manager(&temp)).with_updates(Arc::new(OneUpdate::default()));

        let acme = repo
            .first_where(&Criteria::new().with(Field::Slug, "acme"))
            .unwrap()
            .unwrap();
        assert_eq!(acme.get_latest_release().unwrap().version(), "1.1.0");
        assert!(acme.is_update_available());
    }

    #[test]
    fn test_updates_looked_up_once_per_scan() {
        let temp = TempDir::new().unwrap();
        let updates = Arc::new(OneUpdate::default());
        let repo = InstalledPlugins::new(source(), manager(&temp)).with_updates(updates.clone());

        let packages = repo.all().unwrap();
        assert_eq!(packages.len(), 2);
        assert_eq!(updates.lookups.load(Ordering::SeqCst), 1);
        assert!(!packages[1].is_update_available());
    }

    #[test]
    fn test_plugin_file_criteria_match_basename() {
        let temp = TempDir::new().unwrap();
        let repo = InstalledPlugins::new(source(), manager(&temp));

        let found = repo
            .first_where(&Criteria::new().with(Field::Slug, "acme/acme.php"))
            .unwrap()
            .unwrap();
        assert_eq!(found.slug(), "acme");
        assert!(repo.contains(&Criteria::new().with(Field::Slug, "zeta")).unwrap());
    }

    #[test]
    fn test_installed_themes() {
        let temp = TempDir::new().unwrap();
        let repo = InstalledThemes::new(source(), manager(&temp));
        let themes = repo.all().unwrap();
        assert_eq!(themes.len(), 1);
        assert_eq!(themes[0].slug(), "twentyten");
        assert_eq!(themes[0].package_type(), PackageType::Theme);
    }
}
