//! Snapshot of the build environment variables the rewriter reads.
//!
//! The snapshot is taken once at startup and passed by reference into the
//! resolution functions, so nothing below `main` touches `std::env`.

pub const TORCH_VERSION: &str = "TORCH_VERSION";
pub const TORCH_MINOR_VERSION: &str = "TORCH_MINOR_VERSION";
pub const TORCH_PATCH_VERSION: &str = "TORCH_PATCH_VERSION";
pub const CUDA_VERSION: &str = "CUDA_VERSION";
pub const CUDA_MAJOR_VERSION: &str = "CUDA_MAJOR_VERSION";
pub const CUDA_MINOR_VERSION: &str = "CUDA_MINOR_VERSION";
pub const TORCH_IS_NIGHTLY: &str = "TORCH_IS_NIGHTLY";

use std::convert::Infallible;

use crate::error::ConfigurationError;

/// Raw values as found in the environment. `None` means unset.
///
/// Empty strings are kept as-is here; whether an empty value counts as
/// "unset" is decided per variable by the resolvers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildEnv {
    pub torch_version: Option<String>,
    pub torch_minor_version: Option<String>,
    pub torch_patch_version: Option<String>,
    pub cuda_version: Option<String>,
    pub cuda_major_version: Option<String>,
    pub cuda_minor_version: Option<String>,
    pub torch_is_nightly: Option<String>,
}

impl BuildEnv {
    /// Capture the current process environment.
    ///
    /// A variable that is set but not valid UTF-8 is an error rather than
    /// being mistaken for unset.
    pub fn from_process() -> Result<Self, ConfigurationError> {
        Self::try_from_lookup(|name| match std::env::var_os(name) {
            None => Ok(None),
            Some(value) => value
                .into_string()
                .map(Some)
                .map_err(|_| ConfigurationError::NotUnicode { name }),
        })
    }

    /// Build a snapshot from explicit key/value pairs. Unknown keys are ignored.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let map: std::collections::HashMap<String, String> = pairs
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_string(), v.into()))
            .collect();
        let lookup = |key: &'static str| Ok::<_, Infallible>(map.get(key).cloned());
        match Self::try_from_lookup(lookup) {
            Ok(env) => env,
            Err(never) => match never {},
        }
    }

    fn try_from_lookup<E>(
        lookup: impl Fn(&'static str) -> Result<Option<String>, E>,
    ) -> Result<Self, E> {
        Ok(Self {
            torch_version: lookup(TORCH_VERSION)?,
            torch_minor_version: lookup(TORCH_MINOR_VERSION)?,
            torch_patch_version: lookup(TORCH_PATCH_VERSION)?,
            cuda_version: lookup(CUDA_VERSION)?,
            cuda_major_version: lookup(CUDA_MAJOR_VERSION)?,
            cuda_minor_version: lookup(CUDA_MINOR_VERSION)?,
            torch_is_nightly: lookup(TORCH_IS_NIGHTLY)?,
        })
    }

    /// `TORCH_VERSION` if set to a non-empty value.
    pub fn torch_version(&self) -> Option<&str> {
        non_empty(self.torch_version.as_deref())
    }

    /// `CUDA_VERSION` if set to a non-empty value.
    pub fn cuda_version(&self) -> Option<&str> {
        non_empty(self.cuda_version.as_deref())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
