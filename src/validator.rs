// src/validator.rs

//! Artifact validation
//!
//! Validators run on a freshly built scratch artifact before it is moved into
//! storage. A failing artifact is discarded and never served.

use crate::error::{Error, Result};
use crate::package::Release;
use std::fs::File;
use std::path::Path;
use zip::ZipArchive;

/// Check applied to a built artifact
pub trait ArtifactValidator: Send + Sync {
    fn validate(&self, path: &Path, release: &Release<'_>) -> Result<()>;
}

fn invalid(path: &Path, reason: impl Into<String>) -> Error {
    Error::InvalidArtifact {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

fn open_archive(path: &Path) -> Result<ZipArchive<File>> {
    let file = File::open(path)?;
    ZipArchive::new(file).map_err(|e| invalid(path, format!("unreadable zip: {e}")))
}

/// Artifact must be a readable zip with at least one entry
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipValidator;

impl ArtifactValidator for ZipValidator {
    fn validate(&self, path: &Path, _release: &Release<'_>) -> Result<()> {
        let archive = open_archive(path)?;
        if archive.is_empty() {
            return Err(invalid(path, "archive is empty"));
        }
        Ok(())
    }
}

/// Rejects artifacts with a hidden or system directory at the top level
///
/// macOS archivers add `__MACOSX/`, and VCS checkouts leave `.git/` and
/// friends behind; Composer would extract them as the package root.
#[derive(Debug, Clone, Copy, Default)]
pub struct HiddenDirectoryValidator;

impl ArtifactValidator for HiddenDirectoryValidator {
    fn validate(&self, path: &Path, _release: &Release<'_>) -> Result<()> {
        let archive = open_archive(path)?;

        for name in archive.file_names() {
            let Some((top, _)) = name.split_once('/') else {
                continue;
            };
            if top == "__MACOSX" || top.starts_with('.') {
                return Err(invalid(path, format!("contains hidden directory '{top}'")));
            }
        }

        Ok(())
    }
}

/// Validators applied by default
pub fn default_validators() -> Vec<Box<dyn ArtifactValidator>> {
    vec![Box::new(ZipValidator), Box::new(HiddenDirectoryValidator)]
}
