//! End-to-end sync workflow.
//!
//! One pass walks an explicit stage progression; every stage transition is
//! logged and mirrored into the status artifact so an external consumer can
//! follow along. The cloned working copy lives in a scoped temporary
//! directory that is removed on every exit path, and an advisory file lock
//! serializes passes against the same target: two concurrent passes would
//! each plan against a point-in-time snapshot and race each other's writes.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::config::WikiPubConfig;
use crate::error::{Result, SyncError};
use crate::executor::{self, SyncReport};
use crate::host::WikiHost;
use crate::indexer::{self, ScanOptions};
use crate::mapper::map_directory_structure;
use crate::planner;
use crate::snapshot;
use crate::status::{StatusArtifact, write_status};
use crate::vcs::WikiRepository;

pub const LOCK_FILENAME: &str = "sync.lock";

/// Options for one sync pass.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Compute and report the plan without mutating anything.
    pub dry_run: bool,
    /// Local directory tree containing the markdown documents.
    pub document_root: PathBuf,
    pub ignore_patterns: Vec<String>,
    pub landing_page_title: String,
}

impl SyncOptions {
    pub fn from_config(config: &WikiPubConfig, dry_run: bool) -> Self {
        Self {
            dry_run,
            document_root: PathBuf::from(config.docs_root()),
            ignore_patterns: config.docs.ignore.clone(),
            landing_page_title: config.landing_page_title().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    Init,
    CheckRemoteExists,
    Bootstrap,
    CloneWorkingCopy,
    Index,
    Plan,
    Preview,
    Execute,
    Complete,
    Failed,
}

impl SyncStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::CheckRemoteExists => "check-remote",
            Self::Bootstrap => "bootstrap",
            Self::CloneWorkingCopy => "clone",
            Self::Index => "index",
            Self::Plan => "plan",
            Self::Preview => "preview",
            Self::Execute => "execute",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }

    pub fn percent(self) -> u8 {
        match self {
            Self::Init => 0,
            Self::CheckRemoteExists => 10,
            Self::Bootstrap => 20,
            Self::CloneWorkingCopy => 30,
            Self::Index => 50,
            Self::Plan => 65,
            Self::Preview | Self::Execute => 80,
            Self::Complete | Self::Failed => 100,
        }
    }
}

pub struct WikiSyncOrchestrator<H: WikiHost, R: WikiRepository> {
    host: H,
    repository: R,
    state_dir: PathBuf,
}

impl<H: WikiHost, R: WikiRepository> WikiSyncOrchestrator<H, R> {
    pub fn new(host: H, repository: R, state_dir: PathBuf) -> Self {
        Self {
            host,
            repository,
            state_dir,
        }
    }

    /// Run one complete pass: check → bootstrap? → clone → index → plan →
    /// preview/execute. The status artifact is written as the final step on
    /// success and failure alike.
    pub fn sync(&mut self, options: &SyncOptions) -> Result<SyncReport> {
        fs::create_dir_all(&self.state_dir)
            .map_err(|error| SyncError::filesystem(&self.state_dir, error))?;
        let _lock = PassLock::acquire(&self.state_dir)?;

        self.transition(SyncStage::Init, options.dry_run)?;
        match self.run(options) {
            Ok(report) => {
                self.finish(&report, options.dry_run)?;
                Ok(report)
            }
            Err(error) => {
                let mut artifact = StatusArtifact::new(
                    SyncStage::Failed.as_str(),
                    SyncStage::Failed.percent(),
                    options.dry_run,
                );
                artifact.errors.push(error.to_string());
                // The original error outranks a status write failure.
                let _ = write_status(&self.state_dir, &artifact);
                Err(error)
            }
        }
    }

    fn run(&mut self, options: &SyncOptions) -> Result<SyncReport> {
        self.transition(SyncStage::CheckRemoteExists, options.dry_run)?;
        let wiki_missing = !self.host.wiki_exists()?;
        // A dry run never touches the remote store, so a missing wiki is
        // reported instead of bootstrapped.
        if wiki_missing && !options.dry_run {
            self.transition(SyncStage::Bootstrap, options.dry_run)?;
            self.host.bootstrap(
                &options.landing_page_title,
                &landing_page_content(&options.landing_page_title),
            )?;
        }

        self.transition(SyncStage::CloneWorkingCopy, options.dry_run)?;
        let working_copy = tempfile::Builder::new()
            .prefix("wikipub-")
            .tempdir()
            .map_err(|error| SyncError::filesystem("<tempdir>", error))?;
        self.repository.clone_to(working_copy.path())?;

        self.transition(SyncStage::Index, options.dry_run)?;
        let scan = indexer::scan(
            &options.document_root,
            &ScanOptions {
                ignore_patterns: options.ignore_patterns.clone(),
            },
        )?;
        // Fail fast on identifier collisions before any plan is computed.
        let structure = map_directory_structure(
            scan.documents.iter().map(|doc| doc.relative_path.as_str()),
        )?;
        tracing::info!(
            documents = scan.documents.len(),
            directories = structure.len(),
            "indexed documentation tree"
        );

        self.transition(SyncStage::Plan, options.dry_run)?;
        let remote = snapshot::capture(working_copy.path())?;
        let plan = planner::plan(&scan.documents, &remote)?;

        let mut report = if options.dry_run {
            self.transition(SyncStage::Preview, options.dry_run)?;
            executor::preview(&plan)
        } else {
            self.transition(SyncStage::Execute, options.dry_run)?;
            executor::apply(&plan, working_copy.path(), &mut self.repository)
        };
        if wiki_missing && options.dry_run {
            report.warnings.push(format!(
                "wiki does not exist; a real pass would bootstrap it with landing page {:?}",
                options.landing_page_title
            ));
        }
        report.warnings.extend(scan.warnings);
        Ok(report)
        // working_copy is dropped (and deleted) here on every path.
    }

    fn transition(&self, stage: SyncStage, dry_run: bool) -> Result<()> {
        tracing::info!(stage = stage.as_str(), percent = stage.percent(), "sync stage");
        write_status(
            &self.state_dir,
            &StatusArtifact::new(stage.as_str(), stage.percent(), dry_run),
        )
    }

    fn finish(&self, report: &SyncReport, dry_run: bool) -> Result<()> {
        let stage = if report.success {
            SyncStage::Complete
        } else {
            SyncStage::Failed
        };
        let mut artifact = StatusArtifact::new(stage.as_str(), stage.percent(), dry_run);
        artifact.added = report.added;
        artifact.updated = report.updated;
        artifact.deleted = report.deleted;
        artifact.unchanged = report.unchanged;
        artifact.errors = report
            .errors
            .iter()
            .map(|issue| issue.detail.clone())
            .collect();
        write_status(&self.state_dir, &artifact)
    }
}

fn landing_page_content(title: &str) -> String {
    format!("# {title}\n\nThis wiki is published from the project's documentation tree.\n")
}

/// Advisory lock serializing sync passes against one target.
#[derive(Debug)]
struct PassLock {
    file: File,
    path: PathBuf,
}

impl PassLock {
    fn acquire(state_dir: &Path) -> Result<Self> {
        let path = state_dir.join(LOCK_FILENAME);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|error| SyncError::filesystem(&path, error))?;
        file.try_lock_exclusive()
            .map_err(|_| SyncError::ConcurrentPass { path: path.clone() })?;
        Ok(Self { file, path })
    }
}

impl Drop for PassLock {
    fn drop(&mut self) {
        if let Err(error) = fs2::FileExt::unlock(&self.file) {
            tracing::warn!("failed to release pass lock {}: {error}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::rc::Rc;

    use tempfile::tempdir;
    use walkdir::WalkDir;

    use super::{PassLock, SyncOptions, WikiSyncOrchestrator};
    use crate::error::{Result, SyncError};
    use crate::executor::SyncOutcome;
    use crate::host::WikiHost;
    use crate::status::read_status;
    use crate::vcs::WikiRepository;

    #[derive(Debug)]
    struct FakeHost {
        exists: bool,
        unavailable: bool,
        bootstrapped: Vec<String>,
        requests: usize,
    }

    impl FakeHost {
        fn up(exists: bool) -> Self {
            Self {
                exists,
                unavailable: false,
                bootstrapped: Vec::new(),
                requests: 0,
            }
        }
    }

    impl WikiHost for FakeHost {
        fn wiki_exists(&mut self) -> Result<bool> {
            self.requests += 1;
            if self.unavailable {
                return Err(SyncError::RemoteUnavailable("connection refused".to_string()));
            }
            Ok(self.exists)
        }

        fn bootstrap(&mut self, landing_title: &str, _landing_content: &str) -> Result<()> {
            self.requests += 1;
            self.bootstrapped.push(landing_title.to_string());
            self.exists = true;
            Ok(())
        }

        fn request_count(&self) -> usize {
            self.requests
        }
    }

    /// In-memory wiki repository: clone materializes the page map, push reads
    /// the working copy back.
    #[derive(Debug, Default)]
    struct RemoteState {
        pages: BTreeMap<String, String>,
        pushes: usize,
    }

    #[derive(Debug, Clone)]
    struct FakeRepository {
        remote: Rc<RefCell<RemoteState>>,
        fail_push: bool,
    }

    impl FakeRepository {
        fn new(remote: Rc<RefCell<RemoteState>>) -> Self {
            Self {
                remote,
                fail_push: false,
            }
        }
    }

    impl WikiRepository for FakeRepository {
        fn clone_to(&mut self, destination: &Path) -> Result<()> {
            for (identifier, content) in &self.remote.borrow().pages {
                let path = destination.join(format!("{identifier}.md"));
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent).expect("create parent");
                }
                fs::write(path, content).expect("write page");
            }
            Ok(())
        }

        fn stage_all(&mut self, _working_copy: &Path) -> Result<()> {
            Ok(())
        }

        fn commit(&mut self, _working_copy: &Path, _message: &str) -> Result<()> {
            Ok(())
        }

        fn push(&mut self, working_copy: &Path) -> Result<()> {
            if self.fail_push {
                return Err(SyncError::Push("connection reset by peer".to_string()));
            }
            let mut remote = self.remote.borrow_mut();
            remote.pages.clear();
            for entry in WalkDir::new(working_copy) {
                let entry = entry.expect("walk");
                if !entry.file_type().is_file() {
                    continue;
                }
                let relative = entry
                    .path()
                    .strip_prefix(working_copy)
                    .expect("relative")
                    .to_string_lossy()
                    .replace('\\', "/");
                if let Some(identifier) = relative.strip_suffix(".md") {
                    let content = fs::read_to_string(entry.path()).expect("read page");
                    remote.pages.insert(identifier.to_string(), content);
                }
            }
            remote.pushes += 1;
            Ok(())
        }
    }

    fn options(document_root: PathBuf) -> SyncOptions {
        SyncOptions {
            dry_run: false,
            document_root,
            ignore_patterns: Vec::new(),
            landing_page_title: "Home".to_string(),
        }
    }

    fn seed_docs(root: &Path) {
        fs::create_dir_all(root.join("Guide")).expect("guide dir");
        fs::write(root.join("Home.md"), "# Home").expect("write home");
        fs::write(root.join("Guide/Getting_Started.md"), "# Start").expect("write start");
    }

    #[test]
    fn full_pass_publishes_and_second_pass_is_empty() {
        let temp = tempdir().expect("tempdir");
        let docs = temp.path().join("docs");
        seed_docs(&docs);

        let remote = Rc::new(RefCell::new(RemoteState::default()));
        let mut orchestrator = WikiSyncOrchestrator::new(
            FakeHost::up(true),
            FakeRepository::new(Rc::clone(&remote)),
            temp.path().join(".wikipub"),
        );

        let report = orchestrator.sync(&options(docs.clone())).expect("first pass");
        assert!(report.success);
        assert_eq!(report.outcome, SyncOutcome::Applied);
        assert_eq!(report.added, 2);
        {
            let remote = remote.borrow();
            assert_eq!(remote.pushes, 1);
            assert_eq!(
                remote.pages.get("Guide/Getting-Started").map(String::as_str),
                Some("# Start")
            );
            assert!(remote.pages.contains_key("Home"));
        }

        // An unchanged tree yields an empty plan on the second pass.
        let report = orchestrator.sync(&options(docs)).expect("second pass");
        assert_eq!(report.outcome, SyncOutcome::NoChanges);
        assert_eq!((report.added, report.updated, report.deleted), (0, 0, 0));
        assert_eq!(report.unchanged, 2);
        assert_eq!(remote.borrow().pushes, 1);

        let status = read_status(&temp.path().join(".wikipub"))
            .expect("read status")
            .expect("present");
        assert_eq!(status.stage, "complete");
        assert_eq!(status.percent, 100);
        assert_eq!(status.unchanged, 2);
    }

    #[test]
    fn bootstrap_runs_only_when_wiki_is_missing() {
        let temp = tempdir().expect("tempdir");
        let docs = temp.path().join("docs");
        seed_docs(&docs);

        let remote = Rc::new(RefCell::new(RemoteState::default()));
        let mut orchestrator = WikiSyncOrchestrator::new(
            FakeHost::up(false),
            FakeRepository::new(Rc::clone(&remote)),
            temp.path().join(".wikipub"),
        );
        orchestrator.sync(&options(docs.clone())).expect("pass");
        assert_eq!(orchestrator.host.bootstrapped, ["Home"]);

        orchestrator.sync(&options(docs)).expect("second pass");
        assert_eq!(orchestrator.host.bootstrapped.len(), 1);
    }

    #[test]
    fn dry_run_skips_bootstrap_when_wiki_is_missing() {
        let temp = tempdir().expect("tempdir");
        let docs = temp.path().join("docs");
        seed_docs(&docs);

        let remote = Rc::new(RefCell::new(RemoteState::default()));
        let mut orchestrator = WikiSyncOrchestrator::new(
            FakeHost::up(false),
            FakeRepository::new(Rc::clone(&remote)),
            temp.path().join(".wikipub"),
        );
        let mut opts = options(docs);
        opts.dry_run = true;
        let report = orchestrator.sync(&opts).expect("preview pass");

        assert!(orchestrator.host.bootstrapped.is_empty());
        assert_eq!(report.outcome, SyncOutcome::Preview);
        assert!(
            report
                .warnings
                .iter()
                .any(|warning| warning.contains("would bootstrap"))
        );
        assert_eq!(remote.borrow().pushes, 0);
        assert!(remote.borrow().pages.is_empty());
    }

    #[test]
    fn dry_run_mutates_neither_side() {
        let temp = tempdir().expect("tempdir");
        let docs = temp.path().join("docs");
        seed_docs(&docs);

        let remote = Rc::new(RefCell::new(RemoteState::default()));
        remote
            .borrow_mut()
            .pages
            .insert("Old".to_string(), "stale".to_string());

        let mut orchestrator = WikiSyncOrchestrator::new(
            FakeHost::up(true),
            FakeRepository::new(Rc::clone(&remote)),
            temp.path().join(".wikipub"),
        );
        let mut opts = options(docs.clone());
        opts.dry_run = true;
        let report = orchestrator.sync(&opts).expect("preview pass");

        assert!(report.dry_run);
        assert_eq!(report.outcome, SyncOutcome::Preview);
        assert_eq!((report.added, report.deleted), (2, 1));
        // Remote untouched, local tree untouched.
        assert_eq!(remote.borrow().pushes, 0);
        assert_eq!(
            remote.borrow().pages.get("Old").map(String::as_str),
            Some("stale")
        );
        assert_eq!(
            fs::read_to_string(docs.join("Home.md")).expect("read"),
            "# Home"
        );

        let status = read_status(&temp.path().join(".wikipub"))
            .expect("read status")
            .expect("present");
        assert!(status.dry_run);
    }

    #[test]
    fn unavailable_remote_aborts_before_any_mutation() {
        let temp = tempdir().expect("tempdir");
        let docs = temp.path().join("docs");
        seed_docs(&docs);

        let remote = Rc::new(RefCell::new(RemoteState::default()));
        let mut host = FakeHost::up(true);
        host.unavailable = true;
        let mut orchestrator = WikiSyncOrchestrator::new(
            host,
            FakeRepository::new(Rc::clone(&remote)),
            temp.path().join(".wikipub"),
        );

        let error = orchestrator.sync(&options(docs)).expect_err("must fail");
        assert!(matches!(error, SyncError::RemoteUnavailable(_)));
        assert_eq!(remote.borrow().pushes, 0);

        let status = read_status(&temp.path().join(".wikipub"))
            .expect("read status")
            .expect("present");
        assert_eq!(status.stage, "failed");
        assert!(!status.errors.is_empty());
    }

    #[test]
    fn push_failure_surfaces_as_partial_success() {
        let temp = tempdir().expect("tempdir");
        let docs = temp.path().join("docs");
        seed_docs(&docs);

        let remote = Rc::new(RefCell::new(RemoteState::default()));
        let mut repository = FakeRepository::new(Rc::clone(&remote));
        repository.fail_push = true;
        let mut orchestrator = WikiSyncOrchestrator::new(
            FakeHost::up(true),
            repository,
            temp.path().join(".wikipub"),
        );

        let report = orchestrator.sync(&options(docs)).expect("pass completes");
        assert!(!report.success);
        assert_eq!(report.outcome, SyncOutcome::PushFailed);
        assert_eq!(report.added, 2);
        assert_eq!(report.errors.len(), 1);

        let status = read_status(&temp.path().join(".wikipub"))
            .expect("read status")
            .expect("present");
        assert_eq!(status.stage, "failed");
        assert_eq!(status.added, 2);
    }

    #[test]
    fn colliding_documents_abort_before_planning() {
        let temp = tempdir().expect("tempdir");
        let docs = temp.path().join("docs");
        fs::create_dir_all(&docs).expect("docs dir");
        fs::write(docs.join("A_B.md"), "one").expect("write");
        fs::write(docs.join("A-B.md"), "two").expect("write");

        let remote = Rc::new(RefCell::new(RemoteState::default()));
        let mut orchestrator = WikiSyncOrchestrator::new(
            FakeHost::up(true),
            FakeRepository::new(Rc::clone(&remote)),
            temp.path().join(".wikipub"),
        );

        let error = orchestrator.sync(&options(docs)).expect_err("must fail");
        assert!(matches!(error, SyncError::MappingCollision { .. }));
        assert_eq!(remote.borrow().pushes, 0);
    }

    #[test]
    fn second_lock_holder_is_rejected() {
        let temp = tempdir().expect("tempdir");
        let state_dir = temp.path().join(".wikipub");
        fs::create_dir_all(&state_dir).expect("state dir");

        let _held = PassLock::acquire(&state_dir).expect("first lock");
        let error = PassLock::acquire(&state_dir).expect_err("must fail");
        assert!(matches!(error, SyncError::ConcurrentPass { .. }));
    }
}
