// src/release/package_archiver.rs
//! Bulk archiving of installed packages
//!
//! Makes sure every published package has an artifact for the version
//! currently installed on the host, so the first Composer request does not
//! pay for building it. Failures are reported per package and never abort
//! the run.

use super::ReleaseManager;
use crate::error::Result;
use crate::package::Package;
use crate::repository::PackageRepository;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of an archiving run
#[derive(Debug, Clone, Default, Serialize)]
pub struct ArchiveReport {
    /// Releases archived by this run, as `type/slug/version`
    pub archived: Vec<String>,
    /// Releases already present in storage
    pub skipped: Vec<String>,
    /// Failures with their error messages
    pub failed: Vec<(String, String)>,
}

impl ArchiveReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Archives the installed release of every package in a repository
pub struct PackageArchiver {
    repository: Arc<dyn PackageRepository>,
    manager: Arc<ReleaseManager>,
}

impl PackageArchiver {
    pub fn new(repository: Arc<dyn PackageRepository>, manager: Arc<ReleaseManager>) -> Self {
        Self { repository, manager }
    }

    /// Run over every package in the repository
    pub fn archive_installed(&self) -> Result<ArchiveReport> {
        let packages = self.repository.all()?;
        info!("Archiving installed releases of {} packages", packages.len());

        let mut report = ArchiveReport::default();
        for package in &packages {
            self.archive_into(package, &mut report);
        }

        info!(
            "Archive run finished: {} archived, {} present, {} failed",
            report.archived.len(),
            report.skipped.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Archive the installed release of a single package
    pub fn archive_package(&self, package: &Package) -> ArchiveReport {
        let mut report = ArchiveReport::default();
        self.archive_into(package, &mut report);
        report
    }

    fn archive_into(&self, package: &Package, report: &mut ArchiveReport) {
        let release = match package.installed_release() {
            Ok(release) => release,
            Err(e) => {
                debug!(slug = package.slug(), "No installed release to archive: {}", e);
                return;
            }
        };

        let id = format!("{}/{}/{}", package.package_type(), package.slug(), release.version());
        if self.manager.exists(&release) {
            report.skipped.push(id);
            return;
        }

        match self.manager.archive(&release) {
            Ok(_) => report.archived.push(id),
            Err(e) => {
                warn!(
                    slug = package.slug(),
                    version = release.version(),
                    "Failed to archive release: {}",
                    e
                );
                report.failed.push((id, e.to_string()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archiver::Archiver;
    use crate::package::{PackageBuilder, PackageType, ReleaseEntry};
    use crate::repository::test_support::FixedRepository;
    use crate::storage::LocalStorage;
    use std::fs;
    use tempfile::TempDir;

    fn installed(temp: &TempDir, slug: &str, create_dir: bool) -> Package {
        let dir = temp.path().join("plugins").join(slug);
        if create_dir {
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join(format!("{slug}.php")), "<?php").unwrap();
        }
        PackageBuilder::new(PackageType::Plugin)
            .slug(slug)
            .basename(format!("{slug}/{slug}.php"))
            .directory(dir)
            .installed_version("1.0.0")
            .add_release(ReleaseEntry::new("1.0.0"))
            .build()
    }

    #[test]
    fn test_archive_installed_reports_each_package() {
        let temp = TempDir::new().unwrap();
        let packages = vec![
            installed(&temp, "acme", true),
            installed(&temp, "ghost", false),
            PackageBuilder::new(PackageType::Theme).slug("remote").build(),
        ];

        let storage = Arc::new(LocalStorage::new(temp.path().join("packages")));
        let archiver = Arc::new(Archiver::new(temp.path().join("scratch")));
        let manager = Arc::new(ReleaseManager::new(storage, archiver));
        let service = PackageArchiver::new(Arc::new(FixedRepository(packages)), manager.clone());

        let report = service.archive_installed().unwrap();
        assert_eq!(report.archived, ["plugin/acme/1.0.0"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "plugin/ghost/1.0.0");
        assert!(!report.is_success());

        let again = service.archive_installed().unwrap();
        assert!(again.archived.is_empty());
        assert_eq!(again.skipped, ["plugin/acme/1.0.0"]);
    }

    #[test]
    fn test_archive_single_package() {
        let temp = TempDir::new().unwrap();
        let acme = installed(&temp, "acme", true);

        let storage = Arc::new(LocalStorage::new(temp.path().join("packages")));
        let archiver = Arc::new(Archiver::new(temp.path().join("scratch")));
        let manager = Arc::new(ReleaseManager::new(storage, archiver));
        let service = PackageArchiver::new(Arc::new(FixedRepository(Vec::new())), manager.clone());

        let report = service.archive_package(&acme);
        assert_eq!(report.archived, ["plugin/acme/1.0.0"]);
        assert!(manager.exists(&acme.installed_release().unwrap()));
    }
}
