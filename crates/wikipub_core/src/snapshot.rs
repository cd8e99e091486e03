//! Remote page snapshot, read once per pass from the cloned working copy.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use crate::error::{Result, SyncError};
use crate::indexer::{content_digest, normalize_separators};

/// Extension pages carry inside the wiki repository.
pub const PAGE_EXTENSION: &str = ".md";

/// One page currently present in the remote wiki. Read-only baseline for a
/// single sync pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePageSnapshot {
    pub identifier: String,
    pub content_digest: String,
}

/// Capture every page in the cloned working copy, keyed by identifier.
///
/// Any read failure here is fatal rather than a warning: a page missing from
/// the snapshot would be recomputed as a stale delete by the planner.
pub fn capture(working_copy: &Path) -> Result<BTreeMap<String, RemotePageSnapshot>> {
    let mut pages = BTreeMap::new();

    for entry in WalkDir::new(working_copy).follow_links(false) {
        let entry = entry.map_err(|error| {
            SyncError::filesystem(
                working_copy,
                error
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("walk failed")),
            )
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = match path.strip_prefix(working_copy) {
            Ok(relative) => normalize_separators(&relative.to_string_lossy()),
            Err(_) => continue,
        };
        if relative.starts_with(".git/") {
            continue;
        }
        let Some(identifier) = relative.strip_suffix(PAGE_EXTENSION) else {
            continue;
        };
        if identifier.is_empty() {
            continue;
        }

        let content =
            fs::read_to_string(path).map_err(|error| SyncError::filesystem(path, error))?;
        pages.insert(
            identifier.to_string(),
            RemotePageSnapshot {
                identifier: identifier.to_string(),
                content_digest: content_digest(&content),
            },
        );
    }

    Ok(pages)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::capture;
    use crate::indexer::content_digest;

    #[test]
    fn capture_reads_pages_and_skips_vcs_metadata() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path();
        fs::create_dir_all(root.join("Guide")).expect("guide dir");
        fs::create_dir_all(root.join(".git")).expect("git dir");
        fs::write(root.join("Home.md"), "# Home").expect("write home");
        fs::write(root.join("Guide/Getting-Started.md"), "# Start").expect("write page");
        fs::write(root.join(".git/config"), "[core]").expect("write git config");
        fs::write(root.join(".git/HEAD.md"), "ref").expect("write git md");

        let pages = capture(root).expect("capture");
        assert_eq!(pages.len(), 2);
        assert_eq!(
            pages.get("Home").map(|page| page.content_digest.as_str()),
            Some(content_digest("# Home").as_str())
        );
        assert!(pages.contains_key("Guide/Getting-Started"));
        assert!(!pages.keys().any(|key| key.contains(".git")));
    }

    #[test]
    fn capture_is_empty_for_fresh_wiki() {
        let temp = tempdir().expect("tempdir");
        let pages = capture(temp.path()).expect("capture");
        assert!(pages.is_empty());
    }
}
