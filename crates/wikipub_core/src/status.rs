//! Progress artifact for status consumers.
//!
//! The orchestrator writes this at each stage transition and as its final
//! step; an editor integration or any other consumer re-reads it whenever it
//! likes. Writes are atomic (temp file + rename) so a reader never observes
//! a torn artifact.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

pub const STATUS_JSON_FILENAME: &str = "status.json";
pub const STATUS_TEXT_FILENAME: &str = "status.txt";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusArtifact {
    pub stage: String,
    pub percent: u8,
    pub dry_run: bool,
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub errors: Vec<String>,
    pub updated_at_unix: u64,
}

impl StatusArtifact {
    pub fn new(stage: &str, percent: u8, dry_run: bool) -> Self {
        Self {
            stage: stage.to_string(),
            percent,
            dry_run,
            added: 0,
            updated: 0,
            deleted: 0,
            unchanged: 0,
            errors: Vec::new(),
            updated_at_unix: unix_timestamp(),
        }
    }

    pub fn render_text(&self) -> String {
        let mut out = format!(
            "wikipub sync: {} ({}%){}\nadded: {}\nupdated: {}\ndeleted: {}\nunchanged: {}\n",
            self.stage,
            self.percent,
            if self.dry_run { " [dry run]" } else { "" },
            self.added,
            self.updated,
            self.deleted,
            self.unchanged,
        );
        if self.errors.is_empty() {
            out.push_str("errors: <none>\n");
        } else {
            out.push_str("errors:\n");
            for error in &self.errors {
                out.push_str(&format!("  - {error}\n"));
            }
        }
        out
    }
}

pub fn write_status(state_dir: &Path, artifact: &StatusArtifact) -> Result<()> {
    fs::create_dir_all(state_dir).map_err(|error| SyncError::filesystem(state_dir, error))?;

    let rendered_json = serde_json::to_string_pretty(artifact)
        .map_err(|error| SyncError::Config(format!("failed to serialize status: {error}")))?;
    write_atomic(&state_dir.join(STATUS_JSON_FILENAME), &rendered_json)?;
    write_atomic(&state_dir.join(STATUS_TEXT_FILENAME), &artifact.render_text())
}

/// Read back the last written status, `None` when no pass ever ran.
pub fn read_status(state_dir: &Path) -> Result<Option<StatusArtifact>> {
    let path = state_dir.join(STATUS_JSON_FILENAME);
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&path).map_err(|error| SyncError::filesystem(&path, error))?;
    let artifact = serde_json::from_str(&content)
        .map_err(|error| SyncError::Config(format!("corrupt status artifact: {error}")))?;
    Ok(Some(artifact))
}

fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let staged = staged_path(path);
    fs::write(&staged, content).map_err(|error| SyncError::filesystem(&staged, error))?;
    fs::rename(&staged, path).map_err(|error| SyncError::filesystem(path, error))
}

fn staged_path(path: &Path) -> PathBuf {
    let mut staged = path.as_os_str().to_os_string();
    staged.push(".tmp");
    PathBuf::from(staged)
}

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or(0)
}
