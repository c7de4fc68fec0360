// src/repository/composer.rs

//! Packages as Composer sees them
//!
//! Drops packages without releases and renames the rest to `vendor/slug`.

use super::PackageRepository;
use crate::error::Result;
use crate::host::VendorNameProvider;
use crate::package::{Package, PackageBuilder};
use std::sync::Arc;

pub struct ComposerRepository {
    inner: Arc<dyn PackageRepository>,
    vendor: Arc<dyn VendorNameProvider>,
}

impl ComposerRepository {
    pub fn new(inner: Arc<dyn PackageRepository>, vendor: Arc<dyn VendorNameProvider>) -> Self {
        Self { inner, vendor }
    }
}

impl PackageRepository for ComposerRepository {
    fn all(&self) -> Result<Vec<Package>> {
        let vendor = self.vendor.vendor();
        Ok(self
            .inner
            .all()?
            .iter()
            .filter(|package| package.has_releases())
            .map(|package| {
                PackageBuilder::new(package.package_type())
                    .with_package(package)
                    .name(format!("{}/{}", vendor, package.slug()))
                    .build()
            })
            .collect())
    }
}
