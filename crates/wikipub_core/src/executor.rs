//! Plan application against the cloned working copy.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{ErrorKind, Result, SyncError};
use crate::planner::SyncPlan;
use crate::snapshot::PAGE_EXTENSION;
use crate::vcs::WikiRepository;

/// How far a pass got. Lets a caller distinguish a clean pass from a partial
/// application; a pass that fails before any write surfaces as an error, not
/// a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Dry run: the plan was computed and reported, nothing was mutated.
    Preview,
    /// Empty plan; the remote already matches the local tree.
    NoChanges,
    /// Every operation applied, committed and pushed.
    Applied,
    /// Local writes and commit succeeded but the push did not reach the
    /// remote. The caller must retry with a fresh pass.
    PushFailed,
    /// A write failed mid-plan; nothing was committed.
    PartialApplication,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncIssue {
    pub identifier: String,
    pub kind: ErrorKind,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncPageResult {
    pub identifier: String,
    pub action: String,
    pub detail: Option<String>,
}

/// The one artifact that outlives a pass.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub success: bool,
    pub dry_run: bool,
    pub outcome: SyncOutcome,
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub pages: Vec<SyncPageResult>,
    pub warnings: Vec<String>,
    pub errors: Vec<SyncIssue>,
}

impl SyncReport {
    pub(crate) fn empty(dry_run: bool, outcome: SyncOutcome) -> Self {
        Self {
            success: true,
            dry_run,
            outcome,
            added: 0,
            updated: 0,
            deleted: 0,
            unchanged: 0,
            pages: Vec::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }
}

/// Serialize the plan into a report without touching the filesystem or the
/// network. The preview contract: zero mutation, counts only.
pub fn preview(plan: &SyncPlan) -> SyncReport {
    let mut report = SyncReport::empty(true, SyncOutcome::Preview);
    report.unchanged = plan.unchanged;
    if plan.is_empty() {
        report.outcome = SyncOutcome::NoChanges;
        return report;
    }

    for page in &plan.to_add {
        report.added += 1;
        report.pages.push(SyncPageResult {
            identifier: page.identifier.clone(),
            action: "would_add".to_string(),
            detail: None,
        });
    }
    for (page, _) in &plan.to_update {
        report.updated += 1;
        report.pages.push(SyncPageResult {
            identifier: page.identifier.clone(),
            action: "would_update".to_string(),
            detail: None,
        });
    }
    for page in &plan.to_delete {
        report.deleted += 1;
        report.pages.push(SyncPageResult {
            identifier: page.identifier.clone(),
            action: "would_delete".to_string(),
            detail: None,
        });
    }
    report
}

/// Apply the plan inside the working copy, then stage, commit once with a
/// count summary, and push.
///
/// A write failure mid-plan stops before commit and reports
/// `PartialApplication` with the completed counts. A commit or push failure
/// after all writes reports `PushFailed`; local working-copy files are not
/// rolled back and the caller retries with a fresh pass.
pub fn apply(plan: &SyncPlan, working_copy: &Path, vcs: &mut dyn WikiRepository) -> SyncReport {
    let mut report = SyncReport::empty(false, SyncOutcome::Applied);
    report.unchanged = plan.unchanged;
    if plan.is_empty() {
        report.outcome = SyncOutcome::NoChanges;
        return report;
    }

    let mut completed = 0usize;
    for page in &plan.to_add {
        if let Err(error) = write_page(working_copy, &page.identifier, &page.content) {
            return partial(report, completed, &page.identifier, &error);
        }
        completed += 1;
        report.added += 1;
        report.pages.push(SyncPageResult {
            identifier: page.identifier.clone(),
            action: "added".to_string(),
            detail: None,
        });
    }
    for (page, _) in &plan.to_update {
        if let Err(error) = write_page(working_copy, &page.identifier, &page.content) {
            return partial(report, completed, &page.identifier, &error);
        }
        completed += 1;
        report.updated += 1;
        report.pages.push(SyncPageResult {
            identifier: page.identifier.clone(),
            action: "updated".to_string(),
            detail: None,
        });
    }
    for page in &plan.to_delete {
        if let Err(error) = remove_page(working_copy, &page.identifier) {
            return partial(report, completed, &page.identifier, &error);
        }
        completed += 1;
        report.deleted += 1;
        report.pages.push(SyncPageResult {
            identifier: page.identifier.clone(),
            action: "deleted".to_string(),
            detail: None,
        });
    }

    let message = format!(
        "wikipub sync: {} added, {} updated, {} deleted",
        report.added, report.updated, report.deleted
    );
    let published = vcs
        .stage_all(working_copy)
        .and_then(|()| vcs.commit(working_copy, &message))
        .and_then(|()| vcs.push(working_copy));
    if let Err(error) = published {
        tracing::warn!("publish failed after local application: {error}");
        report.success = false;
        report.outcome = SyncOutcome::PushFailed;
        report.errors.push(SyncIssue {
            identifier: String::new(),
            kind: error.kind(),
            detail: error.to_string(),
        });
        return report;
    }

    report
}

fn partial(
    mut report: SyncReport,
    completed: usize,
    identifier: &str,
    error: &SyncError,
) -> SyncReport {
    let wrapped = SyncError::PartialApplication {
        completed,
        identifier: identifier.to_string(),
        detail: error.to_string(),
    };
    tracing::warn!("{wrapped}");
    report.success = false;
    report.outcome = SyncOutcome::PartialApplication;
    report.errors.push(SyncIssue {
        identifier: identifier.to_string(),
        kind: wrapped.kind(),
        detail: wrapped.to_string(),
    });
    report
}

fn page_path(working_copy: &Path, identifier: &str) -> PathBuf {
    working_copy.join(format!("{identifier}{PAGE_EXTENSION}"))
}

fn write_page(working_copy: &Path, identifier: &str, content: &str) -> Result<()> {
    let path = page_path(working_copy, identifier);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|error| SyncError::filesystem(parent, error))?;
    }
    fs::write(&path, content).map_err(|error| SyncError::filesystem(&path, error))
}

fn remove_page(working_copy: &Path, identifier: &str) -> Result<()> {
    let path = page_path(working_copy, identifier);
    fs::remove_file(&path).map_err(|error| SyncError::filesystem(&path, error))
}
