// src/composer.rs

//! Composer repository wire format
//!
//! Turns a package repository into the `packages.json` document Composer
//! consumes. Only releases the user may view and whose artifact is present in
//! storage are listed.

use crate::auth::User;
use crate::error::{Error, Result};
use crate::hash::ChecksumAlgorithm;
use crate::host::ReleaseAuthorizer;
use crate::package::{Package, Release};
use crate::release::ReleaseManager;
use crate::repository::PackageRepository;
use crate::version::VersionParser;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

/// Installer every WordPress package requires
pub const INSTALLERS_PACKAGE: &str = "composer/installers";
pub const INSTALLERS_CONSTRAINT: &str = "^1.0";

/// Top-level `packages.json` document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComposerIndex {
    /// `vendor/slug` to version to metadata
    pub packages: BTreeMap<String, BTreeMap<String, ComposerVersion>>,
}

/// Metadata for one version of a package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposerVersion {
    pub name: String,
    pub version: String,
    pub version_normalized: String,
    pub dist: ComposerDist,
    pub require: BTreeMap<String, String>,
    #[serde(rename = "type")]
    pub package_type: String,
    pub authors: Vec<ComposerAuthor>,
    pub description: String,
    pub homepage: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposerDist {
    #[serde(rename = "type")]
    pub dist_type: String,
    pub url: String,
    pub shasum: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposerAuthor {
    pub name: String,
    pub homepage: String,
}

/// Builds a [`ComposerIndex`] for a user
pub struct ComposerRepositoryTransformer {
    parser: VersionParser,
    manager: Arc<ReleaseManager>,
    authorizer: Arc<dyn ReleaseAuthorizer>,
    base_url: Url,
}

impl ComposerRepositoryTransformer {
    pub fn new(manager: Arc<ReleaseManager>, authorizer: Arc<dyn ReleaseAuthorizer>, base_url: Url) -> Self {
        Self {
            parser: VersionParser::new(),
            manager,
            authorizer,
            base_url,
        }
    }

    /// Index of every visible, archived release in the repository
    ///
    /// Packages are expected to carry their Composer name already (see
    /// [`crate::repository::ComposerRepository`]).
    pub fn transform(&self, repository: &dyn PackageRepository, user: &User) -> Result<ComposerIndex> {
        let mut index = ComposerIndex::default();

        for package in repository.all()? {
            let versions = self.transform_package(&package, user)?;
            if versions.is_empty() {
                debug!(slug = package.slug(), "No visible releases, leaving package out");
                continue;
            }
            index.packages.insert(package.name().to_string(), versions);
        }

        Ok(index)
    }

    /// Versions of one package visible to the user
    pub fn transform_package(&self, package: &Package, user: &User) -> Result<BTreeMap<String, ComposerVersion>> {
        let mut versions = BTreeMap::new();

        for release in package.releases() {
            if !self.authorizer.can_view_release(user, package, &release) {
                continue;
            }

            let shasum = match self.manager.checksum(ChecksumAlgorithm::Sha1, &release) {
                Ok(shasum) => shasum,
                Err(Error::FileNotFound { path }) => {
                    warn!(
                        slug = package.slug(),
                        version = release.version(),
                        file = %path,
                        "Artifact missing, skipping release"
                    );
                    continue;
                }
                Err(e) => return Err(e),
            };

            let meta = self.version_meta(package, &release, shasum)?;
            versions.insert(release.version().to_string(), meta);
        }

        Ok(versions)
    }

    fn version_meta(&self, package: &Package, release: &Release<'_>, shasum: String) -> Result<ComposerVersion> {
        let version_normalized = self.parser.normalize(release.version())?;

        Ok(ComposerVersion {
            name: package.name().to_string(),
            version: release.version().to_string(),
            version_normalized,
            dist: ComposerDist {
                dist_type: "zip".to_string(),
                url: release.download_url(&self.base_url),
                shasum,
            },
            require: BTreeMap::from([(INSTALLERS_PACKAGE.to_string(), INSTALLERS_CONSTRAINT.to_string())]),
            package_type: package.package_type().composer_type(),
            authors: vec![ComposerAuthor {
                name: package.author().to_string(),
                homepage: package.author_url().to_string(),
            }],
            description: package.description().to_string(),
            homepage: package.homepage().to_string(),
        })
    }
}
