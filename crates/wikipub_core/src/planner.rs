//! Change-set planning: local catalog versus remote snapshot.

use std::collections::BTreeMap;

use crate::error::{Result, SyncError};
use crate::indexer::DocumentFile;
use crate::mapper::map_path;
use crate::snapshot::RemotePageSnapshot;

/// A local document resolved to its wiki page identifier, ready to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedPage {
    pub identifier: String,
    pub relative_path: String,
    pub content: String,
    pub content_digest: String,
}

/// The categorized change set for one pass. Derived, consumed and discarded
/// within a single invocation; never persisted.
#[derive(Debug, Clone, Default)]
pub struct SyncPlan {
    pub to_add: Vec<PlannedPage>,
    pub to_update: Vec<(PlannedPage, RemotePageSnapshot)>,
    pub to_delete: Vec<RemotePageSnapshot>,
    /// Local documents whose remote digest already matches (excluded from
    /// the change set).
    pub unchanged: usize,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }

    pub fn operation_count(&self) -> usize {
        self.to_add.len() + self.to_update.len() + self.to_delete.len()
    }
}

/// Compare the local catalog against the remote snapshot.
///
/// Plan membership is fully determined by content: documents are keyed by
/// mapped identifier in a `BTreeMap`, so scan order never changes the plan.
/// Two local documents mapping to the same identifier fail fast with
/// `MappingCollision` before anything is applied.
pub fn plan(
    local_docs: &[DocumentFile],
    remote: &BTreeMap<String, RemotePageSnapshot>,
) -> Result<SyncPlan> {
    let mut mapped: BTreeMap<String, &DocumentFile> = BTreeMap::new();
    for document in local_docs {
        let identifier = map_path(&document.relative_path)?;
        if let Some(first) = mapped.get(&identifier) {
            return Err(SyncError::MappingCollision {
                identifier,
                first: first.relative_path.clone(),
                second: document.relative_path.clone(),
            });
        }
        mapped.insert(identifier, document);
    }

    let mut plan = SyncPlan::default();
    for (identifier, document) in &mapped {
        let page = PlannedPage {
            identifier: identifier.clone(),
            relative_path: document.relative_path.clone(),
            content: document.content.clone(),
            content_digest: document.content_digest.clone(),
        };
        match remote.get(identifier) {
            None => plan.to_add.push(page),
            Some(snapshot) if snapshot.content_digest != document.content_digest => {
                plan.to_update.push((page, snapshot.clone()));
            }
            Some(_) => plan.unchanged += 1,
        }
    }

    for (identifier, snapshot) in remote {
        if !mapped.contains_key(identifier) {
            plan.to_delete.push(snapshot.clone());
        }
    }

    Ok(plan)
}
