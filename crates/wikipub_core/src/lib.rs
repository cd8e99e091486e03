//! Core library for wikipub: publish a local markdown documentation tree to
//! a project wiki backed by a git repository.
//!
//! The pipeline is deliberately stateless between passes: each pass maps
//! local paths to page identifiers, snapshots the remote wiki from a fresh
//! clone, computes a minimal plan, and applies it as a single commit.

pub mod config;
pub mod error;
pub mod executor;
pub mod host;
pub mod indexer;
pub mod mapper;
pub mod orchestrator;
pub mod planner;
pub mod snapshot;
pub mod status;
pub mod vcs;

pub use config::{WikiPubConfig, load_config};
pub use error::{ErrorKind, Result, SyncError};
pub use executor::{SyncOutcome, SyncReport};
pub use host::{HttpWikiHost, WikiHost, WikiHostConfig};
pub use indexer::{DocumentFile, ScanOptions, ScanOutcome};
pub use mapper::{map_directory_structure, map_path};
pub use orchestrator::{SyncOptions, SyncStage, WikiSyncOrchestrator};
pub use planner::{SyncPlan, plan};
pub use snapshot::RemotePageSnapshot;
pub use status::{StatusArtifact, read_status, write_status};
pub use vcs::{GitWikiRepository, WikiRepository};
