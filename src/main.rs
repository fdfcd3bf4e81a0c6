use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process;

use update_pyproject::config::{self, FileConfig, Overrides, Profile, ResolvedConfig};
use update_pyproject::env::BuildEnv;
use update_pyproject::error::TargetNotFound;
use update_pyproject::output;
use update_pyproject::prepare::{RewritePlan, pin_file, prepare_files};

/// Pin torch in pyproject.toml and point simpleindex.toml at the matching CUDA wheels.
///
/// Reads TORCH_VERSION, CUDA_VERSION (or CUDA_MAJOR_VERSION / CUDA_MINOR_VERSION),
/// and TORCH_IS_NIGHTLY from the environment.
#[derive(Parser, Debug)]
#[command(
    name = "update-pyproject",
    version,
    about,
    after_help = "Examples:
  TORCH_VERSION=2.7.0 update-pyproject prepare
  TORCH_VERSION=2.8.0 CUDA_VERSION=12.9 TORCH_IS_NIGHTLY=1 update-pyproject prepare
  update-pyproject prepare --profile legacy
  TORCH_VERSION=2.7.1 update-pyproject pin path/to/pyproject.toml
  TORCH_VERSION=2.7.0 update-pyproject plan"
)]
struct Cli {
    /// Print resolved settings and replacement counts.
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Config file with default overrides (default: ./update-pyproject.toml if present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rewrite the torch constraint in pyproject.toml and the CUDA path in simpleindex.toml.
    Prepare {
        #[command(flatten)]
        args: PrepareArgs,
    },

    /// Pin torch in a single pyproject file. Requires TORCH_VERSION with at least MAJOR.MINOR.
    Pin {
        /// File to update.
        #[arg(default_value = config::DEFAULT_PYPROJECT_PATH)]
        target: PathBuf,
    },

    /// Show what `prepare` would write without touching any file.
    Plan {
        #[command(flatten)]
        args: PrepareArgs,
    },
}

#[derive(Args, Debug, Default)]
struct PrepareArgs {
    /// Preset of defaults and policies (default: strict).
    #[arg(long, value_enum)]
    profile: Option<Profile>,

    /// Path of the package metadata file.
    #[arg(long)]
    pyproject: Option<PathBuf>,

    /// Path of the package index config file.
    #[arg(long)]
    index: Option<PathBuf>,

    /// CUDA version used when the environment names none, as MAJOR.MINOR.
    #[arg(long)]
    cuda_default: Option<String>,

    /// Literal path segment to replace in the index file, e.g. /cu128/.
    #[arg(long)]
    anchor: Option<String>,
}

impl PrepareArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            profile: self.profile,
            pyproject: self.pyproject.clone(),
            index: self.index.clone(),
            cuda_default: self.cuda_default.clone(),
            index_anchor: self.anchor.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Subcommand dispatch
// ---------------------------------------------------------------------------

fn load_settings(
    config_path: Option<&Path>,
    overrides: &Overrides,
    fallback: Profile,
) -> Result<ResolvedConfig> {
    let file = FileConfig::load(config_path)?;
    config::resolve(&file, overrides, fallback)
}

/// The prepare subcommand: both files, environment-driven.
fn run_prepare(config_path: Option<&Path>, args: &PrepareArgs, env: &BuildEnv) -> Result<()> {
    let settings = load_settings(config_path, &args.overrides(), Profile::Strict)?;
    if !settings.profile.rewrites_index() {
        bail!(
            "the {} profile only rewrites one file; use `update-pyproject pin`",
            settings.profile
        );
    }

    // Resolve before opening anything so a bad environment writes nothing.
    let plan = RewritePlan::resolve(env, settings.profile, &settings.rewrite)?;

    output::with_stdout(|out| {
        out.detail(&format!("profile: {}", settings.profile));
        prepare_files(&settings.pyproject, &settings.index, &plan, out).map(|_| ())
    })
}

/// The pin subcommand: one file, strict version checks.
fn run_pin(config_path: Option<&Path>, target: PathBuf, env: &BuildEnv) -> Result<()> {
    // A missing target is reported before the environment is even looked at.
    if !target.is_file() {
        return Err(TargetNotFound { path: target }.into());
    }

    let overrides = Overrides {
        profile: Some(Profile::Pin),
        pyproject: Some(target),
        ..Overrides::default()
    };
    let settings = load_settings(config_path, &overrides, Profile::Pin)?;
    let plan = RewritePlan::resolve(env, settings.profile, &settings.rewrite)?;

    output::with_stdout(|out| pin_file(&settings.pyproject, &plan.constraint, out).map(|_| ()))
}

/// The plan subcommand: resolve and print, no I/O on the targets.
fn run_plan(config_path: Option<&Path>, args: &PrepareArgs, env: &BuildEnv) -> Result<()> {
    let settings = load_settings(config_path, &args.overrides(), Profile::Strict)?;
    let plan = RewritePlan::resolve(env, settings.profile, &settings.rewrite)?;

    output::with_stdout(|out| {
        out.line(&format!("pyproject: {}", settings.pyproject.display()));
        if settings.profile.rewrites_index() {
            out.line(&format!("index: {}", settings.index.display()));
        }
        plan.describe(out);
    });
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    let env = BuildEnv::from_process()?;

    match cli.command {
        Command::Prepare { args } => run_prepare(config_path, &args, &env),
        Command::Pin { target } => run_pin(config_path, target, &env),
        Command::Plan { args } => run_plan(config_path, &args, &env),
    }
}

fn main() {
    let cli = Cli::parse();
    output::set_verbose(cli.verbose);

    if let Err(e) = run(cli) {
        output::fail("error:", &format!("{e:#}"));
        process::exit(1);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn cli_parses_prepare_defaults() {
        let cli = Cli::parse_from(["update-pyproject", "prepare"]);
        match cli.command {
            Command::Prepare { args } => {
                assert_eq!(args.profile, None);
                assert_eq!(args.pyproject, None);
                assert_eq!(args.index, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(!cli.verbose);
        assert!(cli.config.is_none());
    }

    #[test]
    fn cli_parses_prepare_with_overrides() {
        let cli = Cli::parse_from([
            "update-pyproject",
            "prepare",
            "--profile",
            "legacy",
            "--pyproject",
            "a/pyproject.toml",
            "--index",
            "a/simpleindex.toml",
            "--cuda-default",
            "12.4",
            "--anchor",
            "/cu124/",
        ]);
        match cli.command {
            Command::Prepare { args } => {
                let overrides = args.overrides();
                assert_eq!(overrides.profile, Some(Profile::Legacy));
                assert_eq!(overrides.pyproject, Some(PathBuf::from("a/pyproject.toml")));
                assert_eq!(overrides.index, Some(PathBuf::from("a/simpleindex.toml")));
                assert_eq!(overrides.cuda_default.as_deref(), Some("12.4"));
                assert_eq!(overrides.index_anchor.as_deref(), Some("/cu124/"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn cli_parses_pin_with_default_target() {
        let cli = Cli::parse_from(["update-pyproject", "pin"]);
        match cli.command {
            Command::Pin { target } => {
                assert_eq!(target, PathBuf::from("./pyproject.toml"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn cli_parses_pin_with_target() {
        let cli = Cli::parse_from(["update-pyproject", "pin", "pkg/pyproject.toml"]);
        assert!(matches!(
            cli.command,
            Command::Pin { target } if target == PathBuf::from("pkg/pyproject.toml")
        ));
    }

    #[test]
    fn cli_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "update-pyproject",
            "plan",
            "--verbose",
            "--config",
            "cfg.toml",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("cfg.toml")));
    }

    #[test]
    fn cli_rejects_unknown_profile() {
        let result = Cli::try_parse_from(["update-pyproject", "prepare", "--profile", "beta"]);
        assert!(result.is_err());
    }

    #[test]
    fn prepare_refuses_pin_profile() {
        let tmp = TempDir::new().unwrap();
        let cfg = tmp.path().join("cfg.toml");
        std::fs::write(&cfg, "").unwrap();
        let args = PrepareArgs {
            profile: Some(Profile::Pin),
            ..PrepareArgs::default()
        };
        let env = BuildEnv::from_pairs([("TORCH_VERSION", "2.7.0")]);
        let err = run_prepare(Some(&cfg), &args, &env).unwrap_err();
        assert!(err.to_string().contains("use `update-pyproject pin`"));
    }

    #[test]
    fn pin_reports_missing_target_before_environment() {
        let tmp = TempDir::new().unwrap();
        let cfg = tmp.path().join("cfg.toml");
        std::fs::write(&cfg, "").unwrap();
        let target = tmp.path().join("absent.toml");

        let err = run_pin(Some(&cfg), target.clone(), &BuildEnv::default()).unwrap_err();
        let missing = err.downcast_ref::<TargetNotFound>().unwrap();
        assert_eq!(missing.path, target);
    }

    #[test]
    fn pin_ignores_cuda_default_in_config() {
        let tmp = TempDir::new().unwrap();
        let cfg = tmp.path().join("cfg.toml");
        let target = tmp.path().join("pyproject.toml");
        std::fs::write(&cfg, "cuda_default = \"nonsense\"\n").unwrap();
        std::fs::write(&target, "deps = [\"torch\"]\n").unwrap();

        let env = BuildEnv::from_pairs([("TORCH_VERSION", "2.7.1")]);
        run_pin(Some(&cfg), target.clone(), &env).unwrap();
        assert_eq!(
            std::fs::read_to_string(&target).unwrap(),
            "deps = [\"torch>=2.7.0,<2.8.0\"]\n"
        );
    }

    #[test]
    fn prepare_writes_nothing_without_torch_version() {
        let tmp = TempDir::new().unwrap();
        let cfg = tmp.path().join("cfg.toml");
        let pyproject = tmp.path().join("pyproject.toml");
        let index = tmp.path().join("simpleindex.toml");
        std::fs::write(&cfg, "").unwrap();
        std::fs::write(&pyproject, "deps = [\"torch\"]\n").unwrap();
        std::fs::write(&index, "to = \"/whl/cu128/\"\n").unwrap();

        let args = PrepareArgs {
            pyproject: Some(pyproject.clone()),
            index: Some(index.clone()),
            ..PrepareArgs::default()
        };
        let err = run_prepare(Some(&cfg), &args, &BuildEnv::default()).unwrap_err();
        assert!(err.to_string().contains("TORCH_VERSION"));
        assert_eq!(
            std::fs::read_to_string(&pyproject).unwrap(),
            "deps = [\"torch\"]\n"
        );
        assert_eq!(
            std::fs::read_to_string(&index).unwrap(),
            "to = \"/whl/cu128/\"\n"
        );
    }
}
