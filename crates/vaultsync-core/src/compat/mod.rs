//! Vault schema version compatibility.
//!
//! A vault is safe to read and write when its major version equals the major
//! version of the newest schema this client knows. Unknown minor/patch
//! versions within that major line are assumed to behave like the newest
//! known revision.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Schema versions this client understands, oldest first, with their
/// operational revision numbers.
pub const KNOWN_VERSIONS: &[(&str, u32)] = &[("1.0.0", 1), ("1.1.0", 2), ("1.2.0", 3)];

/// Version marker written into vaults created by this client.
pub const CURRENT_SCHEMA_VERSION: &str = "1.2.0";

/// Outcome of a compatibility check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityResult {
    /// The version string as found in the vault
    pub version: String,
    pub is_compatible: bool,
    pub is_known_version: bool,
    /// Revision whose semantics to assume; `None` when incompatible
    pub assumed_revision: Option<u32>,
}

/// A vault this client must neither merge nor overwrite.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("vault schema {version} is not supported by this client (supports {supported}.x); update required")]
pub struct IncompatibleVersion {
    pub version: String,
    pub supported: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Version {
    major: u64,
    minor: u64,
    patch: u64,
}

fn version_regex() -> &'static Regex {
    static VERSION: OnceLock<Regex> = OnceLock::new();
    VERSION.get_or_init(|| {
        Regex::new(r"^v?(\d+)\.(\d+)\.(\d+)(?:[-+][0-9A-Za-z.-]+)?$").expect("Invalid regex")
    })
}

fn parse_version(raw: &str) -> Option<Version> {
    let captures = version_regex().captures(raw.trim())?;
    Some(Version {
        major: captures[1].parse().ok()?,
        minor: captures[2].parse().ok()?,
        patch: captures[3].parse().ok()?,
    })
}

/// Check whether a vault with the given version marker may be read and written.
pub fn check(version: &str) -> CompatibilityResult {
    let incompatible = CompatibilityResult {
        version: version.to_string(),
        is_compatible: false,
        is_known_version: false,
        assumed_revision: None,
    };

    let Some(parsed) = parse_version(version) else {
        return incompatible;
    };
    let Some(&(newest, newest_revision)) = KNOWN_VERSIONS.last() else {
        return incompatible;
    };
    let Some(newest) = parse_version(newest) else {
        return incompatible;
    };

    if parsed.major != newest.major {
        return incompatible;
    }

    let known = KNOWN_VERSIONS
        .iter()
        .find(|(known, _)| parse_version(known) == Some(parsed))
        .map(|(_, revision)| *revision);

    CompatibilityResult {
        version: version.to_string(),
        is_compatible: true,
        is_known_version: known.is_some(),
        assumed_revision: Some(known.unwrap_or(newest_revision)),
    }
}

/// Like `check`, but turns an incompatible result into an error.
pub fn ensure_compatible(version: &str) -> Result<CompatibilityResult, IncompatibleVersion> {
    let result = check(version);
    if result.is_compatible {
        if !result.is_known_version {
            tracing::debug!(
                version,
                assumed_revision = result.assumed_revision,
                "Unrecognized vault version within supported major line"
            );
        }
        Ok(result)
    } else {
        let supported = KNOWN_VERSIONS
            .last()
            .and_then(|(newest, _)| parse_version(newest))
            .map_or_else(|| "?".to_string(), |newest| newest.major.to_string());
        Err(IncompatibleVersion {
            version: version.to_string(),
            supported,
        })
    }
}
