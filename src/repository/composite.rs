// src/repository/composite.rs

//! Repositories wrapping other repositories

use super::{PackageRepository, sort_packages};
use crate::error::Result;
use crate::package::Package;
use parking_lot::RwLock;
use std::sync::Arc;

/// Subset of a repository selected by a predicate
pub struct FilteredRepository {
    inner: Arc<dyn PackageRepository>,
    predicate: Box<dyn Fn(&Package) -> bool + Send + Sync>,
}

impl FilteredRepository {
    pub fn new(
        inner: Arc<dyn PackageRepository>,
        predicate: impl Fn(&Package) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner,
            predicate: Box::new(predicate),
        }
    }
}

impl PackageRepository for FilteredRepository {
    fn all(&self) -> Result<Vec<Package>> {
        Ok(self
            .inner
            .all()?
            .into_iter()
            .filter(|package| (self.predicate)(package))
            .collect())
    }
}

/// Concatenation of several repositories
///
/// No deduplication is done; inputs are expected to be disjoint.
pub struct MultiRepository {
    repositories: Vec<Arc<dyn PackageRepository>>,
}

impl MultiRepository {
    pub fn new(repositories: Vec<Arc<dyn PackageRepository>>) -> Self {
        Self { repositories }
    }
}

impl PackageRepository for MultiRepository {
    fn all(&self) -> Result<Vec<Package>> {
        let mut packages = Vec::new();
        for repository in &self.repositories {
            packages.extend(repository.all()?);
        }
        sort_packages(&mut packages);
        Ok(packages)
    }
}

/// Memoizes the first successful `all()` of the wrapped repository
pub struct CachedRepository {
    inner: Arc<dyn PackageRepository>,
    cache: RwLock<Option<Vec<Package>>>,
}

impl CachedRepository {
    pub fn new(inner: Arc<dyn PackageRepository>) -> Self {
        Self {
            inner,
            cache: RwLock::new(None),
        }
    }

    /// Forget the memoized list
    pub fn clear(&self) {
        *self.cache.write() = None;
    }
}

impl PackageRepository for CachedRepository {
    fn all(&self) -> Result<Vec<Package>> {
        if let Some(packages) = self.cache.read().as_ref() {
            return Ok(packages.clone());
        }

        let mut cache = self.cache.write();
        if let Some(packages) = cache.as_ref() {
            return Ok(packages.clone());
        }
        let packages = self.inner.all()?;
        *cache = Some(packages.clone());
        Ok(packages)
    }
}
