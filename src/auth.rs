// src/auth.rs

//! Users, capabilities and API keys
//!
//! Clients authenticate with HTTP Basic auth where the user name is an API
//! key and the password is ignored. A key resolves to a [`User`] carrying the
//! capabilities granted in configuration.

use crate::host::ReleaseAuthorizer;
use crate::package::{Package, Release};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use strum_macros::{AsRefStr, Display, EnumString};

/// Permission a user may hold
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, AsRefStr,
    Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// See packages in `packages.json`
    ViewPackages,
    /// Download release artifacts
    DownloadPackages,
    /// Change the whitelist and vendor
    ManageOptions,
}

/// An authenticated principal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub name: String,
    pub capabilities: BTreeSet<Capability>,
}

impl User {
    pub fn new(name: impl Into<String>, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        Self {
            name: name.into(),
            capabilities: capabilities.into_iter().collect(),
        }
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// API key entry as configured
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKey {
    pub key: String,
    pub user: String,
    #[serde(default = "default_capabilities")]
    pub capabilities: Vec<Capability>,
}

fn default_capabilities() -> Vec<Capability> {
    vec![Capability::ViewPackages, Capability::DownloadPackages]
}

/// Lookup table from API key to user
#[derive(Debug, Clone, Default)]
pub struct ApiKeyRegistry {
    users: HashMap<String, User>,
}

impl ApiKeyRegistry {
    pub fn new(keys: &[ApiKey]) -> Self {
        let users = keys
            .iter()
            .filter(|entry| !entry.key.is_empty())
            .map(|entry| {
                let user = User::new(&entry.user, entry.capabilities.iter().copied());
                (entry.key.clone(), user)
            })
            .collect();
        Self { users }
    }

    pub fn authenticate(&self, key: &str) -> Option<&User> {
        self.users.get(key)
    }

    /// Resolve an `Authorization` header value
    pub fn authenticate_header(&self, header: &str) -> Option<&User> {
        let (key, _password) = parse_basic_credentials(header)?;
        self.authenticate(&key)
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

/// Decode `Basic <base64(user:password)>` credentials
pub fn parse_basic_credentials(header: &str) -> Option<(String, String)> {
    let (scheme, encoded) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, password) = decoded.split_once(':').unwrap_or((decoded.as_str(), ""));
    Some((user.to_string(), password.to_string()))
}

/// Authorizer backed by user capabilities
#[derive(Debug, Clone, Copy, Default)]
pub struct CapabilityAuthorizer;

impl ReleaseAuthorizer for CapabilityAuthorizer {
    fn can_view_release(&self, user: &User, _package: &Package, _release: &Release<'_>) -> bool {
        user.can(Capability::ViewPackages)
    }

    fn can_download(&self, user: &User, _package: &Package, _release: &Release<'_>) -> bool {
        user.can(Capability::DownloadPackages)
    }
}
