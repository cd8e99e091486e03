use std::io;
use std::path::PathBuf;

use serde::Serialize;

/// Result type for wikipub core operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors produced by the sync engine.
///
/// Mapping errors (`InvalidPath`, `MappingCollision`) abort a pass before any
/// mutation. `RemoteUnavailable` aborts before the working copy is touched.
/// `Push` and `PartialApplication` describe a pass that already wrote into
/// the working copy; the accompanying report carries the completed counts.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("unmappable path segment {segment:?} in {path}")]
    InvalidPath { segment: String, path: String },

    #[error("documents {first} and {second} both map to wiki page {identifier}")]
    MappingCollision {
        identifier: String,
        first: String,
        second: String,
    },

    #[error("filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("remote wiki unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("push failed after local changes were committed: {0}")]
    Push(String),

    #[error("plan application stopped after {completed} operations at {identifier}: {detail}")]
    PartialApplication {
        completed: usize,
        identifier: String,
        detail: String,
    },

    #[error("another sync pass holds the lock at {}", path.display())]
    ConcurrentPass { path: PathBuf },

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Serializable classification of a [`SyncError`], used inside reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidPath,
    MappingCollision,
    Filesystem,
    RemoteUnavailable,
    Push,
    PartialApplication,
    ConcurrentPass,
    Config,
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidPath { .. } => ErrorKind::InvalidPath,
            Self::MappingCollision { .. } => ErrorKind::MappingCollision,
            Self::Filesystem { .. } => ErrorKind::Filesystem,
            Self::RemoteUnavailable(_) => ErrorKind::RemoteUnavailable,
            Self::Push(_) => ErrorKind::Push,
            Self::PartialApplication { .. } => ErrorKind::PartialApplication,
            Self::ConcurrentPass { .. } => ErrorKind::ConcurrentPass,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    pub(crate) fn filesystem(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorKind, SyncError};

    #[test]
    fn kind_matches_variant() {
        let error = SyncError::InvalidPath {
            segment: "***".to_string(),
            path: "docs/***.md".to_string(),
        };
        assert_eq!(error.kind(), ErrorKind::InvalidPath);

        let error = SyncError::Push("connection reset".to_string());
        assert_eq!(error.kind(), ErrorKind::Push);
    }

    #[test]
    fn kind_serializes_snake_case() {
        let rendered = serde_json::to_string(&ErrorKind::MappingCollision).expect("serialize");
        assert_eq!(rendered, "\"mapping_collision\"");
    }
}
