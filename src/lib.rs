// src/lib.rs

//! SatisPress
//!
//! Private Composer repository for installed WordPress plugins and themes.
//!
//! # Architecture
//!
//! - Storage-first: a release is archived exactly when its zip exists in storage
//! - Immutable packages: builders assemble [`Package`] values once
//! - Composable repositories: installed, whitelisted, cached and Composer views
//!   stack on the [`PackageRepository`] trait
//! - Narrow host interfaces: discovery, downloads, settings and permissions
//!   come in through traits in [`host`]

pub mod app;
pub mod archiver;
pub mod auth;
pub mod composer;
pub mod config;
mod error;
pub mod hash;
pub mod host;
pub mod package;
pub mod release;
pub mod repository;
pub mod settings;
pub mod storage;
pub mod validator;
pub mod version;

#[cfg(feature = "server")]
pub mod server;

pub use app::App;
pub use archiver::{ArchiveSource, Archiver};
pub use composer::{ComposerIndex, ComposerRepositoryTransformer};
pub use config::SatispressConfig;
pub use error::{Error, Result};
pub use hash::ChecksumAlgorithm;
pub use package::{Package, PackageBuilder, PackageType, Release};
pub use release::{ArchiveReport, PackageArchiver, ReleaseManager};
pub use repository::{Criteria, PackageRepository};
pub use storage::{LocalStorage, Storage};
pub use version::{Stability, VersionParser, compare_versions};
