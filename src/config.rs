//! Profiles and the optional `update-pyproject.toml` config file.
//!
//! A profile is a named preset reproducing one historical flavour of the
//! tool. The presets disagree on defaults (CUDA 12.6 vs 12.8, required vs
//! optional `TORCH_VERSION`), so the defaults live with the profile and any
//! of them can be overridden from the config file or the command line.
//!
//! Precedence (highest wins):
//! 1. command-line flags
//! 2. fields from the config file
//! 3. the profile preset
//!
//! Empty or whitespace-only values at any layer fall through to the next.

use anyhow::{Context, Result, bail};
use clap::ValueEnum;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::channel::{CudaSource, CudaVersion};
use crate::version::{MissingTorchPolicy, ShortVersionPolicy, TorchPolicy};

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "update-pyproject.toml";

pub const DEFAULT_PYPROJECT_PATH: &str = "./pyproject.toml";

pub const DEFAULT_INDEX_PATH: &str = "./simpleindex.toml";

/// Named preset of policies and defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Optional TORCH_VERSION with a dev-range fallback, split CUDA variables, `/cu126/` anchor.
    Legacy,
    /// Required TORCH_VERSION, dotted CUDA_VERSION, `/cu128/` anchor.
    Strict,
    /// Single-file pin: required TORCH_VERSION and at least MAJOR.MINOR.
    Pin,
}

impl Profile {
    pub fn as_str(self) -> &'static str {
        match self {
            Profile::Legacy => "legacy",
            Profile::Strict => "strict",
            Profile::Pin => "pin",
        }
    }

    /// Whether this profile also rewrites the package index file.
    pub fn rewrites_index(self) -> bool {
        !matches!(self, Profile::Pin)
    }

    /// The preset configuration for this profile.
    pub fn preset(self) -> RewriteConfig {
        match self {
            Profile::Legacy => RewriteConfig {
                torch: TorchPolicy {
                    missing: MissingTorchPolicy::LegacyFallback,
                    short_version: ShortVersionPolicy::ExactPin,
                    ..TorchPolicy::default()
                },
                cuda_source: CudaSource::SplitComponents,
                cuda_default: CudaVersion::new("12", "6"),
                index_anchor: "/cu126/".to_string(),
            },
            Profile::Strict => RewriteConfig {
                torch: TorchPolicy {
                    missing: MissingTorchPolicy::Require,
                    short_version: ShortVersionPolicy::ExactPin,
                    ..TorchPolicy::default()
                },
                cuda_source: CudaSource::Dotted,
                cuda_default: CudaVersion::new("12", "8"),
                index_anchor: "/cu128/".to_string(),
            },
            Profile::Pin => RewriteConfig {
                torch: TorchPolicy {
                    missing: MissingTorchPolicy::Require,
                    short_version: ShortVersionPolicy::Reject,
                    ..TorchPolicy::default()
                },
                cuda_source: CudaSource::Dotted,
                cuda_default: CudaVersion::new("12", "8"),
                index_anchor: "/cu128/".to_string(),
            },
        }
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Explicit configuration record handed to the pure rewrite functions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteConfig {
    pub torch: TorchPolicy,
    pub cuda_source: CudaSource,
    pub cuda_default: CudaVersion,
    pub index_anchor: String,
}

/// On-disk overrides. Every field is optional.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// Profile used when `--profile` is not given.
    pub profile: Option<Profile>,
    /// Path of the package metadata file.
    pub pyproject: Option<String>,
    /// Path of the package index config file.
    pub index: Option<String>,
    /// Literal path segment to replace in the index file, e.g. `/cu128/`.
    pub index_anchor: Option<String>,
    /// CUDA version used when the environment does not name one, as `MAJOR.MINOR`.
    pub cuda_default: Option<String>,
    /// Legacy fallback default for `TORCH_MINOR_VERSION`.
    pub legacy_torch_minor: Option<String>,
    /// Legacy fallback default for `TORCH_PATCH_VERSION`.
    pub legacy_torch_patch: Option<String>,
}

impl FileConfig {
    /// Load the config file.
    ///
    /// An explicit path must exist. Without one, `./update-pyproject.toml`
    /// is read if present and defaults are returned otherwise. Parse errors
    /// are always hard failures.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => {
                let contents = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config file at {}", path.display()))?;
                Self::parse(&contents, path)
            }
            None => Self::load_from(Path::new(DEFAULT_CONFIG_FILE)),
        }
    }

    /// Load from a specific path. Returns defaults if the file does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::parse(&contents, path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => {
                Err(e).with_context(|| format!("failed to read config file at {}", path.display()))
            }
        }
    }

    fn parse(contents: &str, path: &Path) -> Result<Self> {
        toml::from_str(contents)
            .with_context(|| format!("failed to parse config file at {}", path.display()))
    }
}

/// Command-line overrides for a single invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub profile: Option<Profile>,
    pub pyproject: Option<PathBuf>,
    pub index: Option<PathBuf>,
    pub cuda_default: Option<String>,
    pub index_anchor: Option<String>,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub profile: Profile,
    pub rewrite: RewriteConfig,
    pub pyproject: PathBuf,
    pub index: PathBuf,
}

/// Merge overrides, file config and the profile preset.
///
/// `fallback_profile` applies when neither the command line nor the file
/// names a profile.
pub fn resolve(
    file: &FileConfig,
    overrides: &Overrides,
    fallback_profile: Profile,
) -> Result<ResolvedConfig> {
    let profile = overrides
        .profile
        .or(file.profile)
        .unwrap_or(fallback_profile);
    let mut rewrite = profile.preset();

    if let Some(anchor) = first_non_empty(&[
        overrides.index_anchor.as_deref(),
        file.index_anchor.as_deref(),
    ]) {
        rewrite.index_anchor = anchor;
    }

    // The CUDA default only matters to profiles that touch the index file.
    if profile.rewrites_index()
        && let Some(raw) = first_non_empty(&[
            overrides.cuda_default.as_deref(),
            file.cuda_default.as_deref(),
        ])
    {
        rewrite.cuda_default = parse_cuda_default(&raw)?;
    }

    if let Some(minor) = non_empty_trimmed(file.legacy_torch_minor.as_deref()) {
        rewrite.torch.legacy_minor = minor;
    }
    if let Some(patch) = non_empty_trimmed(file.legacy_torch_patch.as_deref()) {
        rewrite.torch.legacy_patch = patch;
    }

    let pyproject = overrides
        .pyproject
        .clone()
        .or_else(|| non_empty_trimmed(file.pyproject.as_deref()).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_PYPROJECT_PATH));
    let index = overrides
        .index
        .clone()
        .or_else(|| non_empty_trimmed(file.index.as_deref()).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_INDEX_PATH));

    Ok(ResolvedConfig {
        profile,
        rewrite,
        pyproject,
        index,
    })
}

/// Parse a `MAJOR.MINOR` default such as `12.8`.
fn parse_cuda_default(raw: &str) -> Result<CudaVersion> {
    match CudaVersion::parse_dotted(raw) {
        Some(v) if !v.major.is_empty() && !v.minor.is_empty() => Ok(v),
        _ => bail!("Invalid CUDA default '{raw}'. Expected MAJOR.MINOR, e.g. 12.8"),
    }
}

fn first_non_empty(values: &[Option<&str>]) -> Option<String> {
    values.iter().find_map(|v| non_empty_trimmed(*v))
}

/// Return the trimmed value if non-empty after trimming, otherwise `None`.
fn non_empty_trimmed(value: Option<&str>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // -----------------------------------------------------------------------
    // Presets
    // -----------------------------------------------------------------------

    #[test]
    fn legacy_preset_matches_cu126_defaults() {
        let cfg = Profile::Legacy.preset();
        assert_eq!(cfg.torch.missing, MissingTorchPolicy::LegacyFallback);
        assert_eq!(cfg.cuda_source, CudaSource::SplitComponents);
        assert_eq!(cfg.cuda_default, CudaVersion::new("12", "6"));
        assert_eq!(cfg.index_anchor, "/cu126/");
    }

    #[test]
    fn strict_preset_matches_cu128_defaults() {
        let cfg = Profile::Strict.preset();
        assert_eq!(cfg.torch.missing, MissingTorchPolicy::Require);
        assert_eq!(cfg.torch.short_version, ShortVersionPolicy::ExactPin);
        assert_eq!(cfg.cuda_source, CudaSource::Dotted);
        assert_eq!(cfg.cuda_default, CudaVersion::new("12", "8"));
        assert_eq!(cfg.index_anchor, "/cu128/");
    }

    #[test]
    fn pin_preset_rejects_short_versions() {
        let cfg = Profile::Pin.preset();
        assert_eq!(cfg.torch.short_version, ShortVersionPolicy::Reject);
        assert!(!Profile::Pin.rewrites_index());
        assert!(Profile::Strict.rewrites_index());
    }

    // -----------------------------------------------------------------------
    // File loading
    // -----------------------------------------------------------------------

    #[test]
    fn load_from_missing_file_returns_defaults() {
        let tmp = TempDir::new().unwrap();
        let cfg = FileConfig::load_from(&tmp.path().join(DEFAULT_CONFIG_FILE)).unwrap();
        assert_eq!(cfg, FileConfig::default());
    }

    #[test]
    fn load_explicit_missing_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nope.toml");
        let err = FileConfig::load(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }

    #[test]
    fn load_parses_all_fields() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(
            &path,
            r#"
profile = "legacy"
pyproject = "pkg/pyproject.toml"
index = "pkg/simpleindex.toml"
index_anchor = "/cu124/"
cuda_default = "12.4"
legacy_torch_minor = "5"
legacy_torch_patch = "1"
"#,
        )
        .unwrap();

        let cfg = FileConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.profile, Some(Profile::Legacy));
        assert_eq!(cfg.pyproject.as_deref(), Some("pkg/pyproject.toml"));
        assert_eq!(cfg.index_anchor.as_deref(), Some("/cu124/"));
        assert_eq!(cfg.cuda_default.as_deref(), Some("12.4"));
        assert_eq!(cfg.legacy_torch_patch.as_deref(), Some("1"));
    }

    #[test]
    fn load_malformed_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, "profile = \"sideways\"\n").unwrap();
        let err = FileConfig::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("failed to parse config file"));
    }

    // -----------------------------------------------------------------------
    // Layered resolution
    // -----------------------------------------------------------------------

    #[test]
    fn resolve_uses_fallback_profile_and_default_paths() {
        let resolved =
            resolve(&FileConfig::default(), &Overrides::default(), Profile::Strict).unwrap();
        assert_eq!(resolved.profile, Profile::Strict);
        assert_eq!(resolved.rewrite, Profile::Strict.preset());
        assert_eq!(resolved.pyproject, PathBuf::from(DEFAULT_PYPROJECT_PATH));
        assert_eq!(resolved.index, PathBuf::from(DEFAULT_INDEX_PATH));
    }

    #[test]
    fn file_profile_beats_fallback_and_flag_beats_file() {
        let file = FileConfig {
            profile: Some(Profile::Legacy),
            ..FileConfig::default()
        };
        let resolved = resolve(&file, &Overrides::default(), Profile::Strict).unwrap();
        assert_eq!(resolved.profile, Profile::Legacy);

        let overrides = Overrides {
            profile: Some(Profile::Strict),
            ..Overrides::default()
        };
        let resolved = resolve(&file, &overrides, Profile::Legacy).unwrap();
        assert_eq!(resolved.profile, Profile::Strict);
    }

    #[test]
    fn cuda_default_and_anchor_layering() {
        let file = FileConfig {
            cuda_default: Some("12.4".to_string()),
            index_anchor: Some("/cu124/".to_string()),
            ..FileConfig::default()
        };
        let resolved = resolve(&file, &Overrides::default(), Profile::Strict).unwrap();
        assert_eq!(resolved.rewrite.cuda_default, CudaVersion::new("12", "4"));
        assert_eq!(resolved.rewrite.index_anchor, "/cu124/");

        let overrides = Overrides {
            cuda_default: Some("13.0".to_string()),
            index_anchor: Some("/cu130/".to_string()),
            ..Overrides::default()
        };
        let resolved = resolve(&file, &overrides, Profile::Strict).unwrap();
        assert_eq!(resolved.rewrite.cuda_default, CudaVersion::new("13", "0"));
        assert_eq!(resolved.rewrite.index_anchor, "/cu130/");
    }

    #[test]
    fn whitespace_values_fall_through() {
        let file = FileConfig {
            index_anchor: Some("/cu118/".to_string()),
            pyproject: Some("   ".to_string()),
            ..FileConfig::default()
        };
        let overrides = Overrides {
            index_anchor: Some("  ".to_string()),
            ..Overrides::default()
        };
        let resolved = resolve(&file, &overrides, Profile::Strict).unwrap();
        assert_eq!(resolved.rewrite.index_anchor, "/cu118/");
        assert_eq!(resolved.pyproject, PathBuf::from(DEFAULT_PYPROJECT_PATH));
    }

    #[test]
    fn legacy_torch_defaults_come_from_file() {
        let file = FileConfig {
            legacy_torch_minor: Some("5".to_string()),
            legacy_torch_patch: Some("2".to_string()),
            ..FileConfig::default()
        };
        let resolved = resolve(&file, &Overrides::default(), Profile::Legacy).unwrap();
        assert_eq!(resolved.rewrite.torch.legacy_minor, "5");
        assert_eq!(resolved.rewrite.torch.legacy_patch, "2");
    }

    #[test]
    fn malformed_cuda_default_is_rejected() {
        for bad in ["12", "12.", ".8"] {
            let overrides = Overrides {
                cuda_default: Some(bad.to_string()),
                ..Overrides::default()
            };
            assert!(
                resolve(&FileConfig::default(), &overrides, Profile::Strict).is_err(),
                "'{bad}' should be rejected"
            );
        }
    }

    #[test]
    fn pin_profile_skips_cuda_default() {
        let file = FileConfig {
            cuda_default: Some("not-a-version".to_string()),
            ..FileConfig::default()
        };
        let resolved = resolve(&file, &Overrides::default(), Profile::Pin).unwrap();
        assert_eq!(resolved.rewrite.cuda_default, Profile::Pin.preset().cuda_default);

        assert!(resolve(&file, &Overrides::default(), Profile::Strict).is_err());
    }

    #[test]
    fn path_overrides_win() {
        let file = FileConfig {
            pyproject: Some("from-file/pyproject.toml".to_string()),
            index: Some("from-file/simpleindex.toml".to_string()),
            ..FileConfig::default()
        };
        let overrides = Overrides {
            pyproject: Some(PathBuf::from("cli/pyproject.toml")),
            ..Overrides::default()
        };
        let resolved = resolve(&file, &overrides, Profile::Strict).unwrap();
        assert_eq!(resolved.pyproject, PathBuf::from("cli/pyproject.toml"));
        assert_eq!(resolved.index, PathBuf::from("from-file/simpleindex.toml"));
    }
}
