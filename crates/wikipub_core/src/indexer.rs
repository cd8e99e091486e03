//! Local documentation tree scanning.

use std::fs;
use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::error::{Result, SyncError};
use crate::mapper::MARKDOWN_EXTENSIONS;

/// One markdown document captured during a scan. Immutable snapshot for a
/// single sync pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFile {
    /// Path below the documentation root, `/`-separated.
    pub relative_path: String,
    pub content: String,
    pub content_digest: String,
}

#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Glob patterns (relative to the root) excluded from the scan.
    pub ignore_patterns: Vec<String>,
}

/// Result of scanning the documentation root: documents ordered by relative
/// path, plus warnings for individual files that could not be read.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub documents: Vec<DocumentFile>,
    pub warnings: Vec<String>,
}

/// Scan the documentation root for markdown documents.
///
/// A missing or unreadable root is fatal. An unreadable individual file is
/// skipped and recorded as a warning so one broken file does not abort the
/// whole pass. Re-scanning is always safe; nothing is mutated.
pub fn scan(root: &Path, options: &ScanOptions) -> Result<ScanOutcome> {
    let metadata = fs::metadata(root).map_err(|error| SyncError::filesystem(root, error))?;
    if !metadata.is_dir() {
        return Err(SyncError::filesystem(
            root,
            std::io::Error::new(
                std::io::ErrorKind::NotADirectory,
                "documentation root is not a directory",
            ),
        ));
    }

    let ignore = build_ignore_set(&options.ignore_patterns)?;
    let mut documents = Vec::new();
    let mut warnings = Vec::new();

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                let detail = format!("failed to walk below {}: {error}", root.display());
                tracing::warn!("{detail}");
                warnings.push(detail);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if !has_markdown_extension(path) {
            continue;
        }

        let relative = match path.strip_prefix(root) {
            Ok(relative) => normalize_separators(&relative.to_string_lossy()),
            Err(_) => continue,
        };
        if ignore.is_match(&relative) {
            continue;
        }

        match fs::read_to_string(path) {
            Ok(content) => {
                let content_digest = content_digest(&content);
                documents.push(DocumentFile {
                    relative_path: relative,
                    content,
                    content_digest,
                });
            }
            Err(error) => {
                let detail = format!("skipping unreadable file {relative}: {error}");
                tracing::warn!("{detail}");
                warnings.push(detail);
            }
        }
    }

    documents.sort_by(|left, right| left.relative_path.cmp(&right.relative_path));
    Ok(ScanOutcome {
        documents,
        warnings,
    })
}

/// Truncated hex SHA-256 over document content, the digest compared against
/// the remote snapshot.
pub fn content_digest(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    let mut output = String::with_capacity(16);
    for byte in digest.iter().take(8) {
        output.push_str(&format!("{byte:02x}"));
    }
    output
}

pub(crate) fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}

fn has_markdown_extension(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
        return false;
    };
    let lowered = name.to_ascii_lowercase();
    MARKDOWN_EXTENSIONS
        .iter()
        .any(|extension| lowered.ends_with(extension) && lowered.len() > extension.len())
}

fn build_ignore_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|error| SyncError::Config(format!("invalid ignore pattern {pattern:?}: {error}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|error| SyncError::Config(format!("failed to build ignore set: {error}")))
}
