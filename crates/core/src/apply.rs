use crate::config::RenameOptions;
use crate::planner::{plan_path, RenamePlan};
use crate::prompt::confirm_action;
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub const CONFIRM_MESSAGE: &str = "Do you want to continue? (Y/n): ";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RenameFailure {
    pub from: PathBuf,
    pub to: PathBuf,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct ApplyResult {
    pub applied: usize,
    pub failures: Vec<RenameFailure>,
}

#[derive(Debug, Clone)]
pub enum ApplyOutcome {
    Empty,
    DryRun,
    Cancelled,
    Applied(ApplyResult),
}

/// Prints the summary block shown before dry runs and confirmations.
pub fn write_summary<W: Write>(plan: &RenamePlan, output: &mut W) -> Result<()> {
    writeln!(output, "\n--- Summary ---")?;
    writeln!(output, "Path: {}", plan.root.display())?;
    writeln!(output, "Number of files to rename: {}", plan.len())?;
    Ok(())
}

pub fn write_dry_run<W: Write>(plan: &RenamePlan, output: &mut W) -> Result<()> {
    write_summary(plan, output)?;
    writeln!(output, "--- Dry run mode, will not rename the files ---")?;
    writeln!(output, "------------------------------------------------")?;
    for entry in plan.entries() {
        writeln!(
            output,
            "{} -> {}",
            plan_path(&plan.root, &entry.original).display(),
            plan_path(&plan.root, &entry.target).display()
        )?;
    }
    Ok(())
}

/// Dry-runs, or confirms and applies, `plan` according to `options`.
pub fn run_batch<R: BufRead, W: Write>(
    plan: &RenamePlan,
    options: &RenameOptions,
    input: &mut R,
    output: &mut W,
) -> Result<ApplyOutcome> {
    if plan.is_empty() {
        writeln!(output, "No files to rename!").context("failed to write report")?;
        return Ok(ApplyOutcome::Empty);
    }

    if options.dry_run {
        write_dry_run(plan, output).context("failed to write dry run report")?;
        return Ok(ApplyOutcome::DryRun);
    }

    if !options.yes {
        write_summary(plan, output).context("failed to write summary")?;
        if !confirm_action(input, output, CONFIRM_MESSAGE, true)? {
            writeln!(output, "Operation cancelled.").context("failed to write report")?;
            return Ok(ApplyOutcome::Cancelled);
        }
    }

    let result = apply_plan(plan);
    for failure in &result.failures {
        writeln!(
            output,
            "Failed to rename {} -> {}: {}",
            failure.from.display(),
            failure.to.display(),
            failure.message
        )
        .context("failed to write report")?;
    }
    writeln!(output, "Successfully renamed {} files", result.applied)
        .context("failed to write report")?;
    Ok(ApplyOutcome::Applied(result))
}

/// Renames every planned entry in original-name order. Sources are first
/// moved to temporary names so a target that is itself a planned source is
/// free by the time it is filled. A failed rename is recorded and the batch
/// moves on.
pub fn apply_plan(plan: &RenamePlan) -> ApplyResult {
    let mut result = ApplyResult::default();
    let entries = plan.entries();
    let sources: HashSet<&str> = entries.iter().map(|e| e.original.as_str()).collect();

    let mut staged = Vec::<StagedRename>::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let rename = StagedRename {
            original_path: plan_path(&plan.root, &entry.original),
            target_path: plan_path(&plan.root, &entry.target),
            temp_path: temp_path_for(&plan.root, &entry.original, index),
        };

        if !sources.contains(entry.target.as_str()) && path_exists(&rename.target_path) {
            record_failure(&mut result, &rename, anyhow::anyhow!("target already exists"));
            continue;
        }

        match fs::rename(&rename.original_path, &rename.temp_path).context("rename failed") {
            Ok(()) => staged.push(rename),
            Err(err) => record_failure(&mut result, &rename, err),
        }
    }

    for rename in &staged {
        match finish_rename(rename) {
            Ok(()) => result.applied += 1,
            Err(err) => record_failure(&mut result, rename, err),
        }
    }

    result
}

#[derive(Debug, Clone)]
struct StagedRename {
    original_path: PathBuf,
    target_path: PathBuf,
    temp_path: PathBuf,
}

/// Moves a staged file onto its target, or back to where it came from when
/// the target is still occupied (a planned source that failed to move).
fn finish_rename(rename: &StagedRename) -> Result<()> {
    let outcome = if path_exists(&rename.target_path) {
        Err(anyhow::anyhow!("target already exists"))
    } else {
        fs::rename(&rename.temp_path, &rename.target_path).context("rename failed")
    };

    if let Err(err) = outcome {
        if let Err(restore_err) = fs::rename(&rename.temp_path, &rename.original_path) {
            return Err(err.context(format!(
                "restoring the original name also failed ({}): {restore_err}",
                rename.temp_path.display()
            )));
        }
        return Err(err);
    }
    Ok(())
}

fn record_failure(result: &mut ApplyResult, rename: &StagedRename, err: anyhow::Error) {
    tracing::warn!(
        from = %rename.original_path.display(),
        to = %rename.target_path.display(),
        error = %err,
        "rename failed"
    );
    result.failures.push(RenameFailure {
        from: rename.original_path.clone(),
        to: rename.target_path.clone(),
        message: format!("{err:#}"),
    });
}

fn path_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

fn temp_path_for(root: &Path, original: &str, index: usize) -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    root.join(format!(".batch_renamer_tmp_{now}_{index}_{original}"))
}
