//! Release channel and CUDA tag selection for the wheel index URL.

use crate::env::BuildEnv;

/// Release track of the torch wheels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Stable,
    Nightly,
    Test,
}

impl Channel {
    /// Path segments a non-stable channel puts in front of the CUDA tag.
    pub const PREFIXES: [&'static str; 2] = ["/nightly", "/test"];

    /// Map a `TORCH_IS_NIGHTLY` value to a channel.
    ///
    /// `1` and `nightly` select nightly, `test` selects test. Anything else,
    /// including unset and differently-cased values, is stable.
    pub fn from_flag(flag: Option<&str>) -> Self {
        match flag {
            Some("1") | Some("nightly") => Channel::Nightly,
            Some("test") => Channel::Test,
            _ => Channel::Stable,
        }
    }

    pub fn from_env(env: &BuildEnv) -> Self {
        Self::from_flag(env.torch_is_nightly.as_deref())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Stable => "stable",
            Channel::Nightly => "nightly",
            Channel::Test => "test",
        }
    }

    /// URL path prefix placed in front of the CUDA tag.
    fn path_prefix(self) -> &'static str {
        match self {
            Channel::Stable => "",
            Channel::Nightly => Self::PREFIXES[0],
            Channel::Test => Self::PREFIXES[1],
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CUDA toolkit version as two opaque strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CudaVersion {
    pub major: String,
    pub minor: String,
}

impl CudaVersion {
    pub fn new(major: impl Into<String>, minor: impl Into<String>) -> Self {
        Self {
            major: major.into(),
            minor: minor.into(),
        }
    }

    /// Split `MAJOR.MINOR[...]`. Returns `None` with fewer than two parts.
    pub fn parse_dotted(raw: &str) -> Option<Self> {
        let mut parts = raw.split('.');
        let major = parts.next()?;
        let minor = parts.next()?;
        Some(Self::new(major, minor))
    }

    /// Wheel index tag, e.g. `cu128`.
    pub fn tag(&self) -> String {
        format!("cu{}{}", self.major, self.minor)
    }

    /// Index path segment for `channel`, e.g. `/nightly/cu128/`.
    pub fn index_segment(&self, channel: Channel) -> String {
        format!("{}/{}/", channel.path_prefix(), self.tag())
    }
}

impl std::fmt::Display for CudaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Which variables describe the CUDA version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CudaSource {
    /// A single dotted `CUDA_VERSION`.
    Dotted,
    /// Separate `CUDA_MAJOR_VERSION` and `CUDA_MINOR_VERSION`.
    SplitComponents,
}

/// Resolve the CUDA version from the environment, falling back to `default`.
pub fn resolve_cuda_version(
    env: &BuildEnv,
    source: CudaSource,
    default: &CudaVersion,
) -> CudaVersion {
    match source {
        CudaSource::Dotted => env
            .cuda_version()
            .and_then(CudaVersion::parse_dotted)
            .unwrap_or_else(|| default.clone()),
        // Defaults apply only when a component is unset; an empty value is kept.
        CudaSource::SplitComponents => CudaVersion::new(
            env.cuda_major_version
                .clone()
                .unwrap_or_else(|| default.major.clone()),
            env.cuda_minor_version
                .clone()
                .unwrap_or_else(|| default.minor.clone()),
        ),
    }
}
