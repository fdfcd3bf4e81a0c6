//! Torch version parsing and constraint construction.
//!
//! A dotted version such as `2.7.0` becomes the half-open range
//! `>=2.7.0,<2.8.0`. Only the minor component is interpreted numerically;
//! the major component and the original minor text are emitted verbatim.

use crate::env::{BuildEnv, TORCH_PATCH_VERSION, TORCH_VERSION};
use crate::error::ConfigurationError;

/// Major version used by the legacy pre-release fallback.
pub const LEGACY_TORCH_MAJOR: &str = "2";

/// Default `TORCH_MINOR_VERSION` for the legacy fallback.
pub const DEFAULT_LEGACY_TORCH_MINOR: &str = "6";

/// Default `TORCH_PATCH_VERSION` for the legacy fallback.
pub const DEFAULT_LEGACY_TORCH_PATCH: &str = "0";

/// A dotted version with at least `MAJOR.MINOR`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionSpec {
    pub major: String,
    pub minor: String,
    pub patch: Option<String>,
    next_minor: String,
}

impl VersionSpec {
    /// Parse `raw` into its components.
    ///
    /// Returns `Ok(None)` when the string has fewer than two dot-separated
    /// parts; what to do with such a version is the caller's policy.
    pub fn parse(raw: &str) -> Result<Option<Self>, ConfigurationError> {
        let parts: Vec<&str> = raw.split('.').collect();
        if parts.len() < 2 {
            return Ok(None);
        }

        let minor = parts[1];
        let Some(next_minor) = increment_integer(minor) else {
            return Err(ConfigurationError::InvalidVersion {
                value: raw.to_string(),
                reason: format!("minor component '{minor}' is not an integer"),
            });
        };

        Ok(Some(Self {
            major: parts[0].to_string(),
            minor: minor.to_string(),
            patch: parts.get(2).map(|p| p.to_string()),
            next_minor,
        }))
    }

    /// The `[major.minor.0, major.(minor+1).0)` compatibility range.
    pub fn compat_range(&self) -> TorchConstraint {
        TorchConstraint::Range {
            low: format!("{}.{}.0", self.major, self.minor),
            high: format!("{}.{}.0", self.major, self.next_minor),
        }
    }
}

/// Add one to a decimal integer of any size.
///
/// Accepts surrounding whitespace and a leading sign. Returns `None` when
/// `raw` is not an integer. Leading zeros are dropped from the result.
fn increment_integer(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let digits = digits.trim_start_matches('0');
    if !negative {
        return Some(add_one(digits));
    }
    if digits.is_empty() {
        return Some("1".to_string());
    }
    // -n + 1 == -(n - 1)
    let smaller = sub_one(digits);
    if smaller == "0" {
        Some(smaller)
    } else {
        Some(format!("-{smaller}"))
    }
}

/// `digits + 1` for ASCII digits without leading zeros (empty means zero).
fn add_one(digits: &str) -> String {
    let mut out: Vec<u8> = digits.bytes().collect();
    for b in out.iter_mut().rev() {
        if *b == b'9' {
            *b = b'0';
        } else {
            *b += 1;
            return out.into_iter().map(char::from).collect();
        }
    }
    std::iter::once('1')
        .chain(out.into_iter().map(char::from))
        .collect()
}

/// `digits - 1` for a positive ASCII integer without leading zeros.
fn sub_one(digits: &str) -> String {
    let mut out: Vec<u8> = digits.bytes().collect();
    for b in out.iter_mut().rev() {
        if *b == b'0' {
            *b = b'9';
        } else {
            *b -= 1;
            break;
        }
    }
    let result: String = out.into_iter().map(char::from).collect();
    match result.trim_start_matches('0') {
        "" => "0".to_string(),
        rest => rest.to_string(),
    }
}

/// The requirement written in place of the bare `"torch"` dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TorchConstraint {
    /// `torch>={low},<{high}` from a release version.
    Range { low: String, high: String },
    /// `torch=={version}` for a version without a minor component.
    ExactPin(String),
    /// `torch>={low},<{high}` synthesized from the legacy minor/patch variables.
    DevRange { low: String, high: String },
}

impl TorchConstraint {
    /// The dependency specifier, without surrounding quotes.
    pub fn requirement(&self) -> String {
        match self {
            TorchConstraint::Range { low, high } | TorchConstraint::DevRange { low, high } => {
                format!("torch>={low},<{high}")
            }
            TorchConstraint::ExactPin(version) => format!("torch=={version}"),
        }
    }
}

impl std::fmt::Display for TorchConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.requirement())
    }
}

/// What to do when `TORCH_VERSION` is unset or empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingTorchPolicy {
    Require,
    LegacyFallback,
}

/// What to do when `TORCH_VERSION` has fewer than two components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortVersionPolicy {
    ExactPin,
    Reject,
}

/// Everything needed to turn the environment into a [`TorchConstraint`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorchPolicy {
    pub missing: MissingTorchPolicy,
    pub short_version: ShortVersionPolicy,
    pub legacy_minor: String,
    pub legacy_patch: String,
}

impl Default for TorchPolicy {
    fn default() -> Self {
        Self {
            missing: MissingTorchPolicy::Require,
            short_version: ShortVersionPolicy::ExactPin,
            legacy_minor: DEFAULT_LEGACY_TORCH_MINOR.to_string(),
            legacy_patch: DEFAULT_LEGACY_TORCH_PATCH.to_string(),
        }
    }
}

/// Resolve the torch constraint from the build environment.
pub fn resolve_torch_constraint(
    env: &BuildEnv,
    policy: &TorchPolicy,
) -> Result<TorchConstraint, ConfigurationError> {
    match env.torch_version() {
        Some(raw) => constraint_from_version(raw, policy.short_version),
        None => match policy.missing {
            MissingTorchPolicy::Require => Err(ConfigurationError::MissingVariable {
                name: TORCH_VERSION,
            }),
            MissingTorchPolicy::LegacyFallback => {
                let minor = env
                    .torch_minor_version
                    .as_deref()
                    .unwrap_or(&policy.legacy_minor);
                let patch = env
                    .torch_patch_version
                    .as_deref()
                    .unwrap_or(&policy.legacy_patch);
                legacy_dev_range(minor, patch)
            }
        },
    }
}

/// Build a constraint from an explicit version string.
pub fn constraint_from_version(
    raw: &str,
    short_version: ShortVersionPolicy,
) -> Result<TorchConstraint, ConfigurationError> {
    match VersionSpec::parse(raw)? {
        Some(spec) => Ok(spec.compat_range()),
        None => match short_version {
            ShortVersionPolicy::ExactPin => Ok(TorchConstraint::ExactPin(raw.to_string())),
            ShortVersionPolicy::Reject => Err(ConfigurationError::InvalidVersion {
                value: raw.to_string(),
                reason: "expected at least MAJOR.MINOR".to_string(),
            }),
        },
    }
}

/// `>=2.{minor}.{patch}.dev0,<2.{minor}.{patch+1}`.
pub fn legacy_dev_range(minor: &str, patch: &str) -> Result<TorchConstraint, ConfigurationError> {
    let Some(patch_next) = increment_integer(patch) else {
        return Err(ConfigurationError::InvalidNumber {
            name: TORCH_PATCH_VERSION,
            value: patch.to_string(),
        });
    };
    Ok(TorchConstraint::DevRange {
        low: format!("{LEGACY_TORCH_MAJOR}.{minor}.{patch}.dev0"),
        high: format!("{LEGACY_TORCH_MAJOR}.{minor}.{patch_next}"),
    })
}
