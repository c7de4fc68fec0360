// src/error.rs

//! Error types shared by the repository core
//!
//! Each filesystem step of the archive pipeline has its own variant so logs
//! can pinpoint where a build failed. The HTTP boundary only needs to know
//! whether an error means "this artifact does not exist", which
//! [`Error::is_not_found`] answers.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for repository operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the version parser, package model, and release pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// Version string does not match any accepted grammar
    #[error("invalid version string \"{version}\"{detail}")]
    InvalidVersion { version: String, detail: String },

    /// Operation needs an installed package
    #[error("package '{slug}' is not installed")]
    PackageNotInstalled { slug: String },

    /// Requested version is not one of the package's releases
    #[error("invalid release version '{version}' for package '{slug}'")]
    InvalidRelease { slug: String, version: String },

    /// Neither a source URL nor the installed copy can produce the artifact
    #[error("archive source could not be determined for {slug} {version}")]
    ArchiveSourceUndetermined { slug: String, version: String },

    /// Scratch directory could not be created
    #[error("failed to create temporary directory {path}: {source}")]
    CreateTempDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Zip engine failed or wrote no files
    #[error("failed to create archive {path}: {reason}")]
    CreateZip { path: PathBuf, reason: String },

    /// Downloaded artifact could not be moved into the scratch location
    #[error("failed to rename artifact {from} to {to}")]
    RenameArtifact { from: PathBuf, to: PathBuf },

    /// Built artifact could not be moved into storage
    #[error("failed to move artifact into storage at {path}")]
    MoveToStorage { path: String },

    /// Remote package download failed
    #[error("download from {url} failed: {reason}")]
    Download { url: String, reason: String },

    /// Artifact is missing from storage
    #[error("file not found: {path}")]
    FileNotFound { path: String },

    /// Artifact failed validation and must not be served
    #[error("invalid package artifact {path}: {reason}")]
    InvalidArtifact { path: PathBuf, reason: String },

    /// Settings store read or write failed
    #[error("settings error: {0}")]
    Settings(String),

    /// Host inventory could not be read
    #[error("inventory error: {0}")]
    Inventory(String),

    /// IO error during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Build an invalid-version error without extra context
    pub fn invalid_version(version: impl Into<String>) -> Self {
        Self::InvalidVersion {
            version: version.into(),
            detail: String::new(),
        }
    }

    /// Whether the error means the artifact legitimately does not exist
    ///
    /// Unknown releases and undeterminable sources both map to 404 so clients
    /// cannot probe which versions exist. IO failures are not included.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::InvalidRelease { .. }
                | Self::ArchiveSourceUndetermined { .. }
                | Self::FileNotFound { .. }
        )
    }
}
