// src/version/mod.rs

//! Version normalization for Composer interoperability
//!
//! Plugin and theme headers carry free-form version strings. Composer's
//! resolver only understands its own normalized form (`1.2.0.0`,
//! `1.0.0.0-beta1`, `9999999-dev`, `dev-feature`), so [`VersionParser`]
//! reproduces Composer's normalization rules exactly:
//!
//! - `"1"` → `"1.0.0.0"`
//! - `"v2.5-beta.3"` → `"2.5.0.0-beta3"`
//! - `"master"`, `"dev-trunk"` → `"9999999-dev"`
//! - `"1.x-dev"` → `"1.9999999.9999999.9999999-dev"`
//! - `"dev-feature/x"` → `"dev-feature/x"`
//!
//! Raw strings are never normalized implicitly; releases keep the version the
//! host reported and normalization happens only when building the index.

mod compare;

pub use compare::compare_versions;

use crate::error::{Error, Result};
use regex::Regex;
use std::sync::LazyLock;
use strum_macros::{AsRefStr, Display, EnumString};

/// Optional stability suffix shared by the classical and date grammars
///
/// Captures: stability token, trailing digits, dev marker.
const MODIFIER: &str = r"[._-]?(?:(stable|beta|b|RC|alpha|a|patch|pl|p)((?:[.-]?\d+)*)?)?([.-]?dev)?";

/// Normalized form of every master-like branch
pub const MASTER_BRANCH: &str = "9999999-dev";

static ALIAS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^,\s]+) +as +([^,\s]+)$").unwrap());

static MASTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:dev-)?(?:master|trunk|default)$").unwrap());

static BUILD_METADATA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^,\s+]+)\+\S+$").unwrap());

static CLASSICAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)^v?(\d{{1,5}})(\.\d+)?(\.\d+)?(\.\d+)?{MODIFIER}$"
    ))
    .unwrap()
});

static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)^v?(\d{{4}}(?:[.:-]?\d{{2}}){{1,6}}(?:[.:-]?\d{{1,3}})?){MODIFIER}$"
    ))
    .unwrap()
});

static DEV_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(.*?)[.-]?dev$").unwrap());

static BRANCH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^v?(\d+)(\.(?:\d+|[xX*]))?(\.(?:\d+|[xX*]))?(\.(?:\d+|[xX*]))?$").unwrap()
});

static STABILITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i){MODIFIER}(?:\+.*)?$")).unwrap());

/// Release stability as Composer classifies it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
pub enum Stability {
    #[strum(serialize = "stable")]
    Stable,
    #[strum(serialize = "RC")]
    Rc,
    #[strum(serialize = "beta")]
    Beta,
    #[strum(serialize = "alpha")]
    Alpha,
    #[strum(serialize = "dev")]
    Dev,
}

/// Composer-compatible version parser
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionParser;

impl VersionParser {
    pub fn new() -> Self {
        Self
    }

    /// Normalize a version string into Composer's comparable form
    pub fn normalize(&self, version: &str) -> Result<String> {
        self.normalize_with_context(version, None)
    }

    /// Normalize a version string, reporting errors against `full_version`
    ///
    /// `full_version` is the untouched input (for example `"foo as 1.0"`) and
    /// is only used to explain which side of an alias is malformed.
    pub fn normalize_with_context(&self, version: &str, full_version: Option<&str>) -> Result<String> {
        let mut version = version.trim().to_string();
        let full_version = full_version.map(str::to_string).unwrap_or_else(|| version.clone());

        if let Some(caps) = ALIAS_RE.captures(&version) {
            version = caps[1].to_string();
        }

        if MASTER_RE.is_match(&version) {
            return Ok(MASTER_BRANCH.to_string());
        }

        if version.get(..4).is_some_and(|prefix| prefix.eq_ignore_ascii_case("dev-")) {
            return Ok(format!("dev-{}", &version[4..]));
        }

        if let Some(caps) = BUILD_METADATA_RE.captures(&version) {
            version = caps[1].to_string();
        }

        let matched = if let Some(caps) = CLASSICAL_RE.captures(&version) {
            let mut normalized = caps[1].to_string();
            for index in 2..=4 {
                match caps.get(index).map(|m| m.as_str()) {
                    Some(segment) if is_present(segment) => normalized.push_str(segment),
                    _ => normalized.push_str(".0"),
                }
            }
            Some((normalized, capture(&caps, 5), capture(&caps, 6), capture(&caps, 7)))
        } else if let Some(caps) = DATE_RE.captures(&version) {
            let normalized: String = caps[1]
                .chars()
                .map(|c| if c.is_ascii_digit() { c } else { '.' })
                .collect();
            Some((normalized, capture(&caps, 2), capture(&caps, 3), capture(&caps, 4)))
        } else {
            None
        };

        if let Some((mut normalized, stability, digits, dev)) = matched {
            if is_present(stability) {
                if stability == "stable" {
                    return Ok(normalized);
                }
                normalized.push('-');
                normalized.push_str(&expand_stability(stability));
                if is_present(digits) {
                    normalized.push_str(digits.trim_start_matches(['.', '-']));
                }
            }
            if is_present(dev) {
                normalized.push_str("-dev");
            }
            return Ok(normalized);
        }

        if let Some(caps) = DEV_SUFFIX_RE.captures(&version)
            && let Ok(branch) = self.normalize_branch(&caps[1])
        {
            return Ok(branch);
        }

        Err(Error::InvalidVersion {
            detail: alias_detail(&version, &full_version),
            version,
        })
    }

    /// Normalize a branch name into a dev version
    ///
    /// Numeric branches become wildcard versions (`1.x` → `1.9999999.9999999.9999999-dev`);
    /// anything else is prefixed with `dev-`.
    pub fn normalize_branch(&self, name: &str) -> Result<String> {
        let name = name.trim();

        if matches!(name, "master" | "trunk" | "default") {
            return self.normalize(name);
        }

        if let Some(caps) = BRANCH_RE.captures(name) {
            let mut version = String::new();
            for index in 1..5 {
                match caps.get(index) {
                    Some(m) => version.push_str(&m.as_str().replace(['*', 'X'], "x")),
                    None => version.push_str(".x"),
                }
            }
            return Ok(format!("{}-dev", version.replace('x', "9999999")));
        }

        Ok(format!("dev-{name}"))
    }

    /// Classify the stability of a raw or normalized version
    pub fn parse_stability(&self, version: &str) -> Stability {
        let version = match version.find('#') {
            Some(pos) if pos + 1 < version.len() => &version[..pos],
            _ => version,
        };

        if version.starts_with("dev-") || version.ends_with("-dev") {
            return Stability::Dev;
        }

        let lowered = version.to_lowercase();
        let Some(caps) = STABILITY_RE.captures(&lowered) else {
            return Stability::Stable;
        };

        if is_present(capture(&caps, 3)) {
            return Stability::Dev;
        }

        match capture(&caps, 1) {
            "beta" | "b" => Stability::Beta,
            "alpha" | "a" => Stability::Alpha,
            "rc" => Stability::Rc,
            _ => Stability::Stable,
        }
    }
}

/// Capture group text, empty when the group did not participate
fn capture<'h>(caps: &regex::Captures<'h>, index: usize) -> &'h str {
    caps.get(index).map(|m| m.as_str()).unwrap_or("")
}

/// Composer treats an empty match and a bare "0" alike as absent
fn is_present(segment: &str) -> bool {
    !segment.is_empty() && segment != "0"
}

fn expand_stability(stability: &str) -> String {
    let lowered = stability.to_lowercase();
    match lowered.as_str() {
        "a" => "alpha".to_string(),
        "b" => "beta".to_string(),
        "p" | "pl" => "patch".to_string(),
        "rc" => "RC".to_string(),
        _ => lowered,
    }
}

fn alias_detail(version: &str, full_version: &str) -> String {
    let escaped = regex::escape(version);
    let alias_target = Regex::new(&format!(" +as +{escaped}$"));
    let alias_source = Regex::new(&format!("^{escaped} +as +"));

    if alias_target.is_ok_and(|re| re.is_match(full_version)) {
        format!(" in \"{full_version}\", the alias must be an exact version")
    } else if alias_source.is_ok_and(|re| re.is_match(full_version)) {
        format!(
            " in \"{full_version}\", the alias source must be an exact version, \
             if it is a branch name you should prefix it with dev-"
        )
    } else {
        String::new()
    }
}
