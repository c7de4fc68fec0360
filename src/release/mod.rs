// src/release/mod.rs

//! Release lifecycle
//!
//! [`ReleaseManager`] is the single path by which a release goes from
//! described to downloadable. A release is *archived* exactly when storage
//! holds a file at its `file_path`; nothing else records that state.
//!
//! `archive` is idempotent. The first call builds the artifact from one of
//! two sources (a remote source URL, or the installed copy when the versions
//! match), validates it, and moves it into storage. Later calls return
//! immediately. Within a process a per-release mutex keeps two requests from
//! building the same artifact; across processes the storage move tolerates an
//! already-present destination.

mod package_archiver;

pub use package_archiver::{ArchiveReport, PackageArchiver};

use crate::archiver::ArchiveSource;
use crate::error::{Error, Result};
use crate::hash::ChecksumAlgorithm;
use crate::host::ReleaseObserver;
use crate::package::{Package, PackageType, Release, version_from_file};
use crate::storage::{FileSender, Storage};
use crate::validator::{ArtifactValidator, default_validators};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Coordinates archiver, validators and storage
pub struct ReleaseManager {
    storage: Arc<dyn Storage>,
    archiver: Arc<dyn ArchiveSource>,
    validators: Vec<Box<dyn ArtifactValidator>>,
    observers: Vec<Arc<dyn ReleaseObserver>>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ReleaseManager {
    pub fn new(storage: Arc<dyn Storage>, archiver: Arc<dyn ArchiveSource>) -> Self {
        Self {
            storage,
            archiver,
            validators: default_validators(),
            observers: Vec::new(),
            locks: DashMap::new(),
        }
    }

    pub fn with_validators(mut self, validators: Vec<Box<dyn ArtifactValidator>>) -> Self {
        self.validators = validators;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ReleaseObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn exists(&self, release: &Release<'_>) -> bool {
        self.storage.exists(&release.file_path())
    }

    /// Versions with an artifact in storage, recovered from file names
    pub fn cached_versions(&self, package_type: PackageType, slug: &str) -> Result<Vec<String>> {
        let dir = format!("{}/{}", package_type.as_str(), slug);
        let versions = self
            .storage
            .list_files(&dir)?
            .iter()
            .filter_map(|file| version_from_file(slug, file))
            .map(str::to_string)
            .collect();
        Ok(versions)
    }

    /// Every archived release of a package, keyed by version
    pub fn all<'a>(&self, package: &'a Package) -> Result<BTreeMap<String, Release<'a>>> {
        let releases = self
            .cached_versions(package.package_type(), package.slug())?
            .into_iter()
            .map(|version| {
                let release = Release::new(package, version.clone(), None);
                (version, release)
            })
            .collect();
        Ok(releases)
    }

    /// Make sure the release's artifact exists in storage
    pub fn archive<'a>(&self, release: &Release<'a>) -> Result<Release<'a>> {
        let file_path = release.file_path();
        if self.storage.exists(&file_path) {
            return Ok(release.clone());
        }

        let lock = self.locks.entry(file_path.clone()).or_default().clone();
        let _guard = lock.lock();

        if self.storage.exists(&file_path) {
            debug!(file = %file_path, "Artifact built by a concurrent request");
            return Ok(release.clone());
        }

        let scratch = if release.source_url().is_some() {
            self.archiver.archive_from_url(release)?
        } else if release.is_installed_version() {
            self.archiver.archive_from_source(release)?
        } else {
            return Err(Error::ArchiveSourceUndetermined {
                slug: release.slug().to_string(),
                version: release.version().to_string(),
            });
        };

        if let Err(e) = self.validate(&scratch, release) {
            warn!(file = %file_path, "Discarding invalid artifact: {}", e);
            discard(&scratch);
            return Err(e);
        }

        if !self.storage.move_file(&scratch, &file_path) {
            discard(&scratch);
            return Err(Error::MoveToStorage { path: file_path });
        }

        info!(
            slug = release.slug(),
            version = release.version(),
            file = %file_path,
            "Archived release"
        );
        for observer in &self.observers {
            observer.archived(release);
        }

        Ok(release.clone())
    }

    fn validate(&self, path: &Path, release: &Release<'_>) -> Result<()> {
        self.validators
            .iter()
            .try_for_each(|validator| validator.validate(path, release))
    }

    /// Hex digest of the stored artifact
    pub fn checksum(&self, algorithm: ChecksumAlgorithm, release: &Release<'_>) -> Result<String> {
        let file_path = release.file_path();
        self.storage
            .checksum(algorithm, &file_path)?
            .ok_or(Error::FileNotFound { path: file_path })
    }

    /// Send the stored artifact to a client
    pub fn send(&self, release: &Release<'_>, sender: &mut dyn FileSender) -> Result<()> {
        for observer in &self.observers {
            observer.sending(release);
        }
        self.storage.send(&release.file_path(), sender)
    }
}

fn discard(scratch: &Path) {
    if let Err(e) = fs::remove_file(scratch) {
        debug!("Failed to remove scratch file {}: {}", scratch.display(), e);
    }
}
