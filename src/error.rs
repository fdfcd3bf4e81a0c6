//! Typed failure conditions that callers (and tests) need to tell apart.
//!
//! Everything else travels as a plain `anyhow::Error`. These types are wrapped
//! in `anyhow` too and can be recovered with `downcast_ref`.

use std::path::PathBuf;

/// The build environment does not describe a usable rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// A variable the active profile requires is unset or empty.
    MissingVariable { name: &'static str },
    /// A version string could not be turned into a constraint.
    InvalidVersion { value: String, reason: String },
    /// A variable that must hold an integer does not.
    InvalidNumber { name: &'static str, value: String },
    /// A variable is set but its value is not valid UTF-8.
    NotUnicode { name: &'static str },
}

impl std::fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigurationError::MissingVariable { name } => {
                write!(f, "{name} environment variable is required")
            }
            ConfigurationError::InvalidVersion { value, reason } => {
                write!(f, "invalid version format '{value}': {reason}")
            }
            ConfigurationError::InvalidNumber { name, value } => {
                write!(f, "{name} must be an integer, got '{value}'")
            }
            ConfigurationError::NotUnicode { name } => {
                write!(f, "{name} is set but is not valid UTF-8")
            }
        }
    }
}

impl std::error::Error for ConfigurationError {}

/// The file named on the command line does not exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetNotFound {
    pub path: PathBuf,
}

impl std::fmt::Display for TargetNotFound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} not found", self.path.display())
    }
}

impl std::error::Error for TargetNotFound {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_variable_names_the_variable() {
        let err = ConfigurationError::MissingVariable {
            name: "TORCH_VERSION",
        };
        assert_eq!(
            err.to_string(),
            "TORCH_VERSION environment variable is required"
        );
    }

    #[test]
    fn invalid_version_includes_value_and_reason() {
        let err = ConfigurationError::InvalidVersion {
            value: "3".to_string(),
            reason: "expected at least MAJOR.MINOR".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid version format '3': expected at least MAJOR.MINOR"
        );
    }

    #[test]
    fn errors_survive_a_round_trip_through_anyhow() {
        let err: anyhow::Error = ConfigurationError::InvalidNumber {
            name: "TORCH_PATCH_VERSION",
            value: "x".to_string(),
        }
        .into();
        let typed = err.downcast_ref::<ConfigurationError>();
        assert!(matches!(
            typed,
            Some(ConfigurationError::InvalidNumber {
                name: "TORCH_PATCH_VERSION",
                ..
            })
        ));
    }

    #[test]
    fn not_unicode_names_the_variable() {
        let err = ConfigurationError::NotUnicode {
            name: "TORCH_VERSION",
        };
        assert_eq!(err.to_string(), "TORCH_VERSION is set but is not valid UTF-8");
    }

    #[test]
    fn target_not_found_shows_path() {
        let err = TargetNotFound {
            path: PathBuf::from("./missing/pyproject.toml"),
        };
        assert_eq!(err.to_string(), "./missing/pyproject.toml not found");
    }
}
