// src/archiver.rs

//! Artifact production
//!
//! The archiver turns a release into a zip file in the scratch directory,
//! either by zipping the installed source or by downloading the release's
//! source URL. It never writes into storage; the release manager moves the
//! result there.

use crate::error::{Error, Result};
use crate::host::PackageDownloader;
use crate::package::{PackageType, Release};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;

/// Names left out of source archives by default
///
/// `.*` matches any dotfile or dot-directory.
pub const DEFAULT_EXCLUSIONS: &[&str] = &[".*", ".git", "node_modules", "tests", "coverage", "dist"];

/// Producer of scratch artifacts
pub trait ArchiveSource: Send + Sync {
    /// Zip the installed copy of the release's package
    fn archive_from_source(&self, release: &Release<'_>) -> Result<PathBuf>;

    /// Download the release's source URL
    fn archive_from_url(&self, release: &Release<'_>) -> Result<PathBuf>;
}

/// Builds artifacts in a scratch directory
pub struct Archiver {
    scratch_dir: PathBuf,
    exclusions: Vec<String>,
    downloader: Option<Arc<dyn PackageDownloader>>,
}

impl Archiver {
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            exclusions: DEFAULT_EXCLUSIONS.iter().map(|s| s.to_string()).collect(),
            downloader: None,
        }
    }

    /// Replace the exclusion list
    pub fn with_exclusions(mut self, exclusions: Vec<String>) -> Self {
        self.exclusions = exclusions;
        self
    }

    pub fn with_downloader(mut self, downloader: Arc<dyn PackageDownloader>) -> Self {
        self.downloader = Some(downloader);
        self
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    fn is_excluded(&self, name: &str) -> bool {
        self.exclusions.iter().any(|pattern| {
            if pattern == ".*" {
                name.starts_with('.')
            } else {
                pattern == name
            }
        })
    }

    /// Reserve a unique scratch path for a release
    fn scratch_path(&self, release: &Release<'_>) -> Result<PathBuf> {
        fs::create_dir_all(&self.scratch_dir).map_err(|source| Error::CreateTempDirectory {
            path: self.scratch_dir.clone(),
            source,
        })?;

        let prefix = format!("{}-", release.file().trim_end_matches(".zip"));
        let reserved = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".zip")
            .tempfile_in(&self.scratch_dir)
            .map_err(|source| Error::CreateTempDirectory {
                path: self.scratch_dir.clone(),
                source,
            })?;

        let (_file, path) = reserved.keep().map_err(|e| Error::CreateTempDirectory {
            path: self.scratch_dir.clone(),
            source: e.error,
        })?;
        Ok(path)
    }

    /// Files to include as `(absolute path, entry name)` pairs
    fn collect_entries(&self, release: &Release<'_>) -> Result<Vec<(PathBuf, String)>> {
        let package = release.package();
        let directory = package.directory()?;

        // Single-file plugins live directly in the plugins directory
        if package.package_type() == PackageType::Plugin
            && let Some(basename) = package.basename().filter(|b| !b.contains('/'))
        {
            let file = directory.join(basename);
            return Ok(if file.is_file() {
                vec![(file, basename.to_string())]
            } else {
                Vec::new()
            });
        }

        let root_name = directory
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| package.slug().to_string());

        let mut entries = Vec::new();
        let walker = WalkDir::new(directory)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0 || !self.is_excluded(&entry.file_name().to_string_lossy())
            });

        for entry in walker {
            let entry = entry.map_err(|e| Error::CreateZip {
                path: directory.to_path_buf(),
                reason: e.to_string(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(directory)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .replace('\\', "/");
            entries.push((entry.path().to_path_buf(), format!("{root_name}/{relative}")));
        }

        Ok(entries)
    }

    fn write_zip(&self, destination: &Path, entries: &[(PathBuf, String)]) -> Result<()> {
        let zip_error = |reason: String| Error::CreateZip {
            path: destination.to_path_buf(),
            reason,
        };

        let file = File::create(destination).map_err(|e| zip_error(e.to_string()))?;
        let mut zip = zip::ZipWriter::new(file);
        let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        for (path, name) in entries {
            zip.start_file(name.as_str(), options)
                .map_err(|e| zip_error(e.to_string()))?;
            let mut input = File::open(path).map_err(|e| zip_error(e.to_string()))?;
            io::copy(&mut input, &mut zip).map_err(|e| zip_error(e.to_string()))?;
        }

        zip.finish().map_err(|e| zip_error(e.to_string()))?;
        Ok(())
    }
}

impl ArchiveSource for Archiver {
    fn archive_from_source(&self, release: &Release<'_>) -> Result<PathBuf> {
        let entries = self.collect_entries(release)?;
        let destination = self.scratch_path(release)?;

        if entries.is_empty() {
            let _ = fs::remove_file(&destination);
            return Err(Error::CreateZip {
                path: destination,
                reason: "no files to archive".to_string(),
            });
        }

        if let Err(e) = self.write_zip(&destination, &entries) {
            let _ = fs::remove_file(&destination);
            return Err(e);
        }

        info!(
            slug = release.slug(),
            version = release.version(),
            files = entries.len(),
            "Archived installed source"
        );
        Ok(destination)
    }

    fn archive_from_url(&self, release: &Release<'_>) -> Result<PathBuf> {
        let url = release.source_url().ok_or_else(|| Error::ArchiveSourceUndetermined {
            slug: release.slug().to_string(),
            version: release.version().to_string(),
        })?;
        let downloader = self.downloader.as_ref().ok_or_else(|| Error::Download {
            url: url.to_string(),
            reason: "no downloader configured".to_string(),
        })?;

        let downloaded = downloader.download(url)?;
        let downloaded_path = downloaded.path().to_path_buf();
        let destination = self.scratch_path(release)?;

        // Rename first; copy when the temp file lives on another filesystem
        let moved = downloaded
            .persist(&destination)
            .map(|_| ())
            .or_else(|e| fs::copy(e.file.path(), &destination).map(|_| ()));

        if moved.is_err() {
            let _ = fs::remove_file(&destination);
            return Err(Error::RenameArtifact {
                from: downloaded_path,
                to: destination,
            });
        }

        debug!(
            slug = release.slug(),
            version = release.version(),
            "Downloaded artifact to {}",
            destination.display()
        );
        Ok(destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::{Package, PackageBuilder, ReleaseEntry};
    use std::io::{Read, Write};
    use tempfile::{NamedTempFile, TempDir};

    fn plugin_tree(root: &Path) -> PathBuf {
        let dir = root.join("plugins/acme");
        fs::create_dir_all(dir.join("includes")).unwrap();
        fs::create_dir_all(dir.join("node_modules/lodash")).unwrap();
        fs::create_dir_all(dir.join(".git")).unwrap();
        fs::write(dir.join("acme.php"), "<?php // Plugin Name: Acme").unwrap();
        fs::write(dir.join("includes/class-acme.php"), "<?php").unwrap();
        fs::write(dir.join("node_modules/lodash/index.js"), "x").unwrap();
        fs::write(dir.join(".git/HEAD"), "ref").unwrap();
        fs::write(dir.join(".editorconfig"), "root = true").unwrap();
        dir
    }

    fn package(directory: &Path, basename: &str) -> Package {
        PackageBuilder::new(PackageType::Plugin)
            .slug("acme")
            .basename(basename)
            .directory(directory)
            .installed_version("1.0.0")
            .add_release(ReleaseEntry::new("1.0.0"))
            .build()
    }

    fn entry_names(path: &Path) -> Vec<String> {
        let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
        let mut names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_archive_from_source_applies_exclusions() {
        let temp = TempDir::new().unwrap();
        let dir = plugin_tree(temp.path());
        let package = package(&dir, "acme/acme.php");
        let release = package.get_release("1.0.0").unwrap();

        let archiver = Archiver::new(temp.path().join("scratch"));
        let path = archiver.archive_from_source(&release).unwrap();

        assert!(path.starts_with(temp.path().join("scratch")));
        assert_eq!(entry_names(&path), ["acme/acme.php", "acme/includes/class-acme.php"]);
    }

    #[test]
    fn test_custom_exclusions() {
        let temp = TempDir::new().unwrap();
        let dir = plugin_tree(temp.path());
        let package = package(&dir, "acme/acme.php");
        let release = package.get_release("1.0.0").unwrap();

        let archiver = Archiver::new(temp.path().join("scratch")).with_exclusions(vec!["includes".to_string()]);
        let names = entry_names(&archiver.archive_from_source(&release).unwrap());
        assert!(names.contains(&"acme/.editorconfig".to_string()));
        assert!(names.contains(&"acme/node_modules/lodash/index.js".to_string()));
        assert!(!names.iter().any(|n| n.starts_with("acme/includes")));
    }

    #[test]
    fn test_single_file_plugin() {
        let temp = TempDir::new().unwrap();
        let plugins = temp.path().join("plugins");
        fs::create_dir_all(&plugins).unwrap();
        fs::write(plugins.join("hello.php"), "<?php").unwrap();
        fs::write(plugins.join("other.php"), "<?php").unwrap();

        let package = package(&plugins, "hello.php");
        let release = package.get_release("1.0.0").unwrap();
        let path = Archiver::new(temp.path().join("scratch"))
            .archive_from_source(&release)
            .unwrap();
        assert_eq!(entry_names(&path), ["hello.php"]);
    }

    #[test]
    fn test_empty_source_fails() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("plugins/empty");
        fs::create_dir_all(dir.join("tests")).unwrap();
        fs::write(dir.join("tests/test.php"), "<?php").unwrap();

        let package = package(&dir, "empty/empty.php");
        let release = package.get_release("1.0.0").unwrap();
        let scratch = temp.path().join("scratch");
        let err = Archiver::new(&scratch).archive_from_source(&release).unwrap_err();
        assert!(matches!(err, Error::CreateZip { .. }));
        assert_eq!(fs::read_dir(&scratch).unwrap().count(), 0);
    }

    #[test]
    fn test_uncreatable_scratch_dir() {
        let temp = TempDir::new().unwrap();
        let dir = plugin_tree(temp.path());
        let blocker = temp.path().join("blocker");
        fs::write(&blocker, "file, not a directory").unwrap();

        let package = package(&dir, "acme/acme.php");
        let release = package.get_release("1.0.0").unwrap();
        let err = Archiver::new(blocker.join("scratch"))
            .archive_from_source(&release)
            .unwrap_err();
        assert!(matches!(err, Error::CreateTempDirectory { .. }));
    }

    #[test]
    fn test_not_installed_package() {
        let package = PackageBuilder::new(PackageType::Plugin)
            .slug("ghost")
            .add_release(ReleaseEntry::new("1.0.0"))
            .build();
        let release = package.get_release("1.0.0").unwrap();
        let err = Archiver::new("/tmp").archive_from_source(&release).unwrap_err();
        assert!(matches!(err, Error::PackageNotInstalled { .. }));
    }

    struct FixedDownloader(Vec<u8>);

    impl PackageDownloader for FixedDownloader {
        fn download(&self, _url: &str) -> Result<NamedTempFile> {
            let mut file = NamedTempFile::new()?;
            file.write_all(&self.0)?;
            Ok(file)
        }
    }

    struct FailingDownloader;

    impl PackageDownloader for FailingDownloader {
        fn download(&self, url: &str) -> Result<NamedTempFile> {
            Err(Error::Download {
                url: url.to_string(),
                reason: "HTTP 404 Not Found".to_string(),
            })
        }
    }

    fn remote_package() -> Package {
        PackageBuilder::new(PackageType::Plugin)
            .slug("acme")
            .add_release(ReleaseEntry::with_source_url("1.1.0", "https://example.com/acme.zip"))
            .build()
    }

    #[test]
    fn test_archive_from_url() {
        let temp = TempDir::new().unwrap();
        let package = remote_package();
        let release = package.get_release("1.1.0").unwrap();

        let archiver = Archiver::new(temp.path().join("scratch"))
            .with_downloader(Arc::new(FixedDownloader(b"zip bytes".to_vec())));
        let path = archiver.archive_from_url(&release).unwrap();

        let mut content = String::new();
        File::open(&path).unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "zip bytes");
    }

    #[test]
    fn test_download_error_propagates() {
        let temp = TempDir::new().unwrap();
        let package = remote_package();
        let release = package.get_release("1.1.0").unwrap();

        let archiver = Archiver::new(temp.path().join("scratch")).with_downloader(Arc::new(FailingDownloader));
        let err = archiver.archive_from_url(&release).unwrap_err();
        assert!(matches!(err, Error::Download { ref reason, .. } if reason.contains("404")));
    }
}
