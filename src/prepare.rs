//! Read, rewrite and write the target files.
//!
//! All configuration is resolved into a [`RewritePlan`] before any file is
//! opened, so a configuration error never leaves a half-updated tree. An I/O
//! failure on the index file after `pyproject.toml` was written does leave
//! the two files out of step; nothing is rolled back.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::channel::{Channel, CudaVersion, resolve_cuda_version};
use crate::config::{Profile, RewriteConfig};
use crate::env::BuildEnv;
use crate::error::{ConfigurationError, TargetNotFound};
use crate::output::Reporter;
use crate::rewrite::{
    Rewrite, TORCH_PLACEHOLDER, rewrite_cuda_channel, rewrite_torch_constraint,
};
use crate::version::{TorchConstraint, resolve_torch_constraint};

/// How the index file will be rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPlan {
    pub anchor: String,
    pub cuda: CudaVersion,
    pub channel: Channel,
}

impl IndexPlan {
    pub fn replacement(&self) -> String {
        self.cuda.index_segment(self.channel)
    }
}

/// Everything one run will do, computed from the environment up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewritePlan {
    pub profile: Profile,
    pub constraint: TorchConstraint,
    /// `None` for profiles that only touch `pyproject.toml`.
    pub index: Option<IndexPlan>,
}

impl RewritePlan {
    pub fn resolve(
        env: &BuildEnv,
        profile: Profile,
        config: &RewriteConfig,
    ) -> Result<Self, ConfigurationError> {
        let constraint = resolve_torch_constraint(env, &config.torch)?;
        let index = profile.rewrites_index().then(|| IndexPlan {
            anchor: config.index_anchor.clone(),
            cuda: resolve_cuda_version(env, config.cuda_source, &config.cuda_default),
            channel: Channel::from_env(env),
        });
        Ok(Self {
            profile,
            constraint,
            index,
        })
    }

    /// Print the plan without touching any file.
    pub fn describe(&self, out: &mut Reporter<'_>) {
        out.line(&format!("profile: {}", self.profile));
        out.line(&format!(
            "{TORCH_PLACEHOLDER} -> \"{}\"",
            self.constraint.requirement()
        ));
        if let Some(index) = &self.index {
            out.line(&format!("channel: {}", index.channel));
            out.line(&format!("cuda: {} ({})", index.cuda, index.cuda.tag()));
            out.line(&format!("{} -> {}", index.anchor, index.replacement()));
        }
    }
}

/// Outcome for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub path: PathBuf,
    pub replacements: usize,
}

/// Read `path`, apply `transform`, and write the result back in place.
///
/// A transform that replaces nothing leaves the file untouched on disk.
pub fn rewrite_file(path: &Path, transform: impl FnOnce(&str) -> Rewrite) -> Result<FileReport> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let rewrite = transform(&text);
    if !rewrite.is_noop() {
        std::fs::write(path, &rewrite.text)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    Ok(FileReport {
        path: path.to_path_buf(),
        replacements: rewrite.replacements,
    })
}

/// Rewrite `pyproject.toml` and, when the plan includes one, the index file.
pub fn prepare_files(
    pyproject: &Path,
    index: &Path,
    plan: &RewritePlan,
    out: &mut Reporter<'_>,
) -> Result<Vec<FileReport>> {
    let requirement = plan.constraint.requirement();
    out.action("Updating", &pyproject.display().to_string());
    let report = rewrite_file(pyproject, |text| {
        rewrite_torch_constraint(text, &plan.constraint)
    })?;
    report_outcome(out, &report, TORCH_PLACEHOLDER, &format!("\"{requirement}\""));
    let mut reports = vec![report];

    if let Some(index_plan) = &plan.index {
        let replacement = index_plan.replacement();
        out.action("Updating", &index.display().to_string());
        out.detail(&format!(
            "channel {}, CUDA {}",
            index_plan.channel, index_plan.cuda
        ));
        let report = rewrite_file(index, |text| {
            rewrite_cuda_channel(text, &index_plan.anchor, &index_plan.cuda, index_plan.channel)
        })?;
        report_outcome(out, &report, &index_plan.anchor, &replacement);
        reports.push(report);
    }

    Ok(reports)
}

/// Pin torch in a single file. The file must exist.
pub fn pin_file(
    target: &Path,
    constraint: &TorchConstraint,
    out: &mut Reporter<'_>,
) -> Result<FileReport> {
    if !target.exists() {
        return Err(TargetNotFound {
            path: target.to_path_buf(),
        }
        .into());
    }

    out.action("Updating", &target.display().to_string());
    let report = rewrite_file(target, |text| rewrite_torch_constraint(text, constraint))?;
    report_outcome(
        out,
        &report,
        TORCH_PLACEHOLDER,
        &format!("\"{}\"", constraint.requirement()),
    );
    Ok(report)
}

fn report_outcome(out: &mut Reporter<'_>, report: &FileReport, anchor: &str, replacement: &str) {
    if report.replacements == 0 {
        out.note(&format!(
            "nothing to replace for {anchor} in {}; left unchanged",
            report.path.display()
        ));
    } else {
        out.success("Replaced", &format!("{anchor} with {replacement}"));
        out.detail(&format!("{} occurrence(s)", report.replacements));
    }
}
