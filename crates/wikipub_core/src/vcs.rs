//! Version-control primitives for the wiki repository.
//!
//! Clone, stage, commit and push are treated as atomic black-box operations
//! behind [`WikiRepository`]; the executor and orchestrator never touch git
//! internals. The production implementation uses libgit2.

use std::env;
use std::path::Path;

use git2::build::RepoBuilder;
use git2::{Cred, FetchOptions, IndexAddOption, PushOptions, RemoteCallbacks, Repository, Signature};

use crate::error::{Result, SyncError};

/// Environment variable carrying the token used for clone/push auth.
pub const TOKEN_ENV_VAR: &str = "WIKIPUB_TOKEN";

pub trait WikiRepository {
    /// Materialize the remote wiki's current content at `destination`.
    fn clone_to(&mut self, destination: &Path) -> Result<()>;
    /// Stage every change in the working copy, including deletions.
    fn stage_all(&mut self, working_copy: &Path) -> Result<()>;
    fn commit(&mut self, working_copy: &Path, message: &str) -> Result<()>;
    fn push(&mut self, working_copy: &Path) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct GitWikiRepository {
    remote_url: String,
    branch: String,
    author_name: String,
    author_email: String,
    token: Option<String>,
}

impl GitWikiRepository {
    pub fn new(remote_url: &str, branch: &str) -> Self {
        Self {
            remote_url: remote_url.to_string(),
            branch: branch.to_string(),
            author_name: "wikipub".to_string(),
            author_email: "wikipub@localhost".to_string(),
            token: env::var(TOKEN_ENV_VAR)
                .ok()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty()),
        }
    }

    pub fn with_author(mut self, name: &str, email: &str) -> Self {
        self.author_name = name.to_string();
        self.author_email = email.to_string();
        self
    }

    fn callbacks(&self) -> RemoteCallbacks<'_> {
        let mut callbacks = RemoteCallbacks::new();
        let token = self.token.clone();
        callbacks.credentials(move |_url, username_from_url, _allowed| {
            let username = username_from_url.unwrap_or("git");
            match &token {
                Some(token) => Cred::userpass_plaintext(username, token),
                None => Cred::default(),
            }
        });
        callbacks
    }

    fn open(&self, working_copy: &Path) -> Result<Repository> {
        Repository::open(working_copy)
            .map_err(|error| SyncError::Push(format!("failed to open working copy: {}", error.message())))
    }

    fn signature(&self) -> Result<Signature<'static>> {
        Signature::now(&self.author_name, &self.author_email)
            .map_err(|error| SyncError::Push(format!("invalid commit signature: {}", error.message())))
    }
}

impl WikiRepository for GitWikiRepository {
    fn clone_to(&mut self, destination: &Path) -> Result<()> {
        let mut fetch = FetchOptions::new();
        fetch.remote_callbacks(self.callbacks());
        RepoBuilder::new()
            .branch(&self.branch)
            .fetch_options(fetch)
            .clone(&self.remote_url, destination)
            .map_err(|error| {
                SyncError::RemoteUnavailable(format!(
                    "failed to clone {}: {}",
                    self.remote_url,
                    error.message()
                ))
            })?;
        Ok(())
    }

    fn stage_all(&mut self, working_copy: &Path) -> Result<()> {
        let repository = self.open(working_copy)?;
        let mut index = repository
            .index()
            .map_err(|error| SyncError::Push(error.message().to_string()))?;
        index
            .add_all(["*"], IndexAddOption::DEFAULT, None)
            .map_err(|error| SyncError::Push(format!("failed to stage additions: {}", error.message())))?;
        index
            .update_all(["*"], None)
            .map_err(|error| SyncError::Push(format!("failed to stage deletions: {}", error.message())))?;
        index
            .write()
            .map_err(|error| SyncError::Push(format!("failed to write index: {}", error.message())))?;
        Ok(())
    }

    fn commit(&mut self, working_copy: &Path, message: &str) -> Result<()> {
        let repository = self.open(working_copy)?;
        let signature = self.signature()?;
        let mut index = repository
            .index()
            .map_err(|error| SyncError::Push(error.message().to_string()))?;
        let tree_id = index
            .write_tree()
            .map_err(|error| SyncError::Push(format!("failed to write tree: {}", error.message())))?;
        let tree = repository
            .find_tree(tree_id)
            .map_err(|error| SyncError::Push(error.message().to_string()))?;

        // A freshly bootstrapped wiki may have an unborn HEAD.
        let parent = match repository.head() {
            Ok(head) => Some(
                head.peel_to_commit()
                    .map_err(|error| SyncError::Push(error.message().to_string()))?,
            ),
            Err(_) => None,
        };
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();

        repository
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
            .map_err(|error| SyncError::Push(format!("commit failed: {}", error.message())))?;
        Ok(())
    }

    fn push(&mut self, working_copy: &Path) -> Result<()> {
        let repository = self.open(working_copy)?;
        let mut remote = repository
            .find_remote("origin")
            .map_err(|error| SyncError::Push(format!("origin not configured: {}", error.message())))?;

        let refspec = format!("refs/heads/{0}:refs/heads/{0}", self.branch);
        let mut options = PushOptions::new();
        options.remote_callbacks(self.callbacks());
        remote
            .push(&[refspec.as_str()], Some(&mut options))
            .map_err(|error| SyncError::Push(error.message().to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use git2::Repository;
    use tempfile::tempdir;

    use super::{GitWikiRepository, WikiRepository};
    use crate::error::SyncError;

    #[test]
    fn clone_of_unreachable_remote_reports_remote_unavailable() {
        let temp = tempdir().expect("tempdir");
        let mut vcs = GitWikiRepository::new(
            temp.path().join("missing-remote").to_string_lossy().as_ref(),
            "main",
        );
        let error = vcs
            .clone_to(&temp.path().join("working-copy"))
            .expect_err("must fail");
        assert!(matches!(error, SyncError::RemoteUnavailable(_)));
    }

    #[test]
    fn stage_and_commit_record_working_copy_changes() {
        let temp = tempdir().expect("tempdir");
        let working_copy = temp.path().join("wiki");
        Repository::init(&working_copy).expect("init");
        fs::write(working_copy.join("Home.md"), "# Home").expect("write page");

        let mut vcs = GitWikiRepository::new("unused", "main").with_author("tester", "t@example.org");
        vcs.stage_all(&working_copy).expect("stage");
        vcs.commit(&working_copy, "publish wiki: 1 added, 0 updated, 0 deleted")
            .expect("commit");

        let repository = Repository::open(&working_copy).expect("open");
        let head = repository.head().expect("head");
        let commit = head.peel_to_commit().expect("commit");
        assert!(commit.message().unwrap_or("").contains("1 added"));
        assert_eq!(commit.parent_count(), 0);
    }

    #[test]
    fn push_without_origin_reports_push_error() {
        let temp = tempdir().expect("tempdir");
        let working_copy = temp.path().join("wiki");
        Repository::init(&working_copy).expect("init");

        let mut vcs = GitWikiRepository::new("unused", "main");
        let error = vcs.push(&working_copy).expect_err("must fail");
        assert!(matches!(error, SyncError::Push(_)));
    }
}
