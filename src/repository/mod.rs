// src/repository/mod.rs

//! Composable package repositories
//!
//! A repository is a read-only collection of packages. Leaf repositories scan
//! the host on every call; the others wrap one or more repositories to filter,
//! merge, memoize or reshape what they return. Every repository answers
//! `all()` with packages ordered by type, then slug.
//!
//! Typical composition:
//!
//! ```text
//! ComposerRepository
//!   └─ CachedRepository
//!        └─ Whitelist
//!             └─ MultiRepository
//!                  ├─ InstalledPlugins
//!                  └─ InstalledThemes
//! ```

mod composer;
mod composite;
mod installed;
mod whitelist;

pub use composer::ComposerRepository;
pub use composite::{CachedRepository, FilteredRepository, MultiRepository};
pub use installed::{InstalledPlugins, InstalledThemes};
pub use whitelist::{Whitelist, WhitelistSettings};

use crate::error::Result;
use crate::package::{Field, Package, PackageType};

/// Exact-match conditions on package fields; all must hold
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Criteria {
    conditions: Vec<(Field, String)>,
}

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: Field, value: impl Into<String>) -> Self {
        self.conditions.push((field, value.into()));
        self
    }

    /// Criteria identifying a single package
    pub fn package(package_type: PackageType, slug: impl Into<String>) -> Self {
        Self::new()
            .with(Field::Type, package_type.as_str())
            .with(Field::Slug, slug)
    }

    pub fn conditions(&self) -> &[(Field, String)] {
        &self.conditions
    }

    pub fn conditions_mut(&mut self) -> &mut Vec<(Field, String)> {
        &mut self.conditions
    }

    pub fn matches(&self, package: &Package) -> bool {
        self.conditions
            .iter()
            .all(|(field, value)| package.field(*field).as_deref() == Some(value.as_str()))
    }
}

/// Read-only collection of packages
pub trait PackageRepository: Send + Sync {
    fn all(&self) -> Result<Vec<Package>>;

    /// Packages matching every condition
    fn where_matches(&self, criteria: &Criteria) -> Result<Vec<Package>> {
        Ok(self
            .all()?
            .into_iter()
            .filter(|package| criteria.matches(package))
            .collect())
    }

    fn first_where(&self, criteria: &Criteria) -> Result<Option<Package>> {
        Ok(self.where_matches(criteria)?.into_iter().next())
    }

    fn contains(&self, criteria: &Criteria) -> Result<bool> {
        Ok(self.first_where(criteria)?.is_some())
    }
}

/// Order packages by type, then slug
pub(crate) fn sort_packages(packages: &mut [Package]) {
    packages.sort_by(|a, b| {
        a.package_type()
            .cmp(&b.package_type())
            .then_with(|| a.slug().cmp(b.slug()))
    });
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_criteria_exact_match() {
        let repo = FixedRepository(vec![
            package(PackageType::Plugin, "acme", &["1.0.0"]),
            package(PackageType::Theme, "acme", &["2.0"]),
            package(PackageType::Plugin, "acme-extra", &[]),
        ]);

        let found = repo.where_matches(&Criteria::new().with(Field::Slug, "acme")).unwrap();
        assert_eq!(found.len(), 2);

        let theme = repo
            .first_where(&Criteria::package(PackageType::Theme, "acme"))
            .unwrap()
            .unwrap();
        assert_eq!(theme.package_type(), PackageType::Theme);

        assert!(!repo.contains(&Criteria::new().with(Field::Slug, "acm")).unwrap());
        assert!(repo.contains(&Criteria::new()).unwrap());
    }

    #[test]
    fn test_sort_packages() {
        let mut packages = vec![
            package(PackageType::Theme, "alpha", &[]),
            package(PackageType::Plugin, "zeta", &[]),
            package(PackageType::Plugin, "beta", &[]),
        ];
        sort_packages(&mut packages);
        let keys: Vec<_> = packages
            .iter()
            .map(|p| format!("{}/{}", p.package_type(), p.slug()))
            .collect();
        assert_eq!(keys, ["plugin/beta", "plugin/zeta", "theme/alpha"]);
    }
}
