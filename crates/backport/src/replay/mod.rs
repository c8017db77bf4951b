//! Commit replay pipeline.
//!
//! Produces a backport branch for one (pull request, target branch) pair:
//! clone, check out the target, branch, set a clone-local identity,
//! cherry-pick each commit in order, rewrite the origin to an authenticated
//! URL in the clone only, and push. The first failing step ends the job.
//! The working directory is removed on every exit path.

pub mod git;
pub mod transcript;

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::credentials::Credentials;
use crate::error::ReplayError;
use git::GitRunner;
use transcript::{Recorder, Transcript};

/// Name of the branch pushed for a backport of `pr` onto `target_branch`.
#[must_use]
pub fn backport_branch_name(pr: u64, target_branch: &str) -> String {
    format!("backport-PR-{pr}-to-{target_branch}")
}

/// `origin` with `username:token@` inserted after an http(s) scheme.
///
/// Other origins (local paths, `file://`) are returned unchanged.
#[must_use]
pub fn authenticated_origin(origin: &str, credentials: &Credentials) -> String {
    for scheme in ["https://", "http://"] {
        if let Some(rest) = origin.strip_prefix(scheme) {
            return format!(
                "{scheme}{}:{}@{rest}",
                credentials.username, credentials.token
            );
        }
    }
    origin.to_string()
}

/// One attempt to backport a pull request onto a single branch.
#[derive(Debug, Clone)]
pub struct ReplayJob {
    pub owner: String,
    pub repo: String,
    pub source_pr: u64,
    pub target_branch: String,
    /// Commits to cherry-pick, in order.
    pub commits: Vec<String>,
    pub credentials: Credentials,
}

impl ReplayJob {
    #[must_use]
    pub fn backport_branch(&self) -> String {
        backport_branch_name(self.source_pr, &self.target_branch)
    }
}

/// What a replay produced: the transcript so far, and the pushed branch or
/// the error that stopped the job.
#[derive(Debug)]
pub struct ReplayOutput {
    pub transcript: Transcript,
    pub result: Result<String, ReplayError>,
}

/// Drives git through the fixed replay protocol.
#[derive(Clone)]
pub struct ReplayPipeline {
    git: Arc<dyn GitRunner>,
    origin: String,
}

impl ReplayPipeline {
    /// `origin` is the forge's HTTPS origin; repositories are cloned from
    /// `<origin>/<owner>/<repo>`.
    pub fn new(git: Arc<dyn GitRunner>, origin: impl Into<String>) -> Self {
        Self {
            git,
            origin: origin.into(),
        }
    }

    /// Run `job` to completion or first failure.
    pub async fn replay(&self, job: &ReplayJob) -> ReplayOutput {
        let workdir = match tempfile::Builder::new().prefix("git-worker-").tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                return ReplayOutput {
                    transcript: Transcript::new(),
                    result: Err(ReplayError::Workspace(e)),
                }
            }
        };

        info!(
            owner = %job.owner,
            repo = %job.repo,
            pr_number = job.source_pr,
            branch = %job.target_branch,
            dir = %workdir.path().display(),
            "Replaying commits"
        );

        let mut recorder = Recorder::new(self.git.as_ref(), vec![job.credentials.token.clone()]);
        let result = self.run_steps(&mut recorder, workdir.path(), job).await;

        if let Err(e) = workdir.close() {
            warn!(error = %e, "Failed to remove replay working directory");
        }

        ReplayOutput {
            transcript: recorder.into_transcript(),
            result,
        }
    }

    async fn run_steps(
        &self,
        recorder: &mut Recorder<'_>,
        workdir: &Path,
        job: &ReplayJob,
    ) -> Result<String, ReplayError> {
        let origin = self.origin.trim_end_matches('/');
        let clone_url = format!("{origin}/{}/{}", job.owner, job.repo);
        let rewrite_key = format!(
            "url.{}.insteadOf",
            authenticated_origin(origin, &job.credentials)
        );

        // The rewrite is passed on the command line so the token never lands
        // in the clone's stored remote URL.
        let clone_rewrite = format!("{rewrite_key}={origin}");
        recorder
            .git(workdir, &["-c", &clone_rewrite, "clone", &clone_url])
            .await?;

        let repo_dir = workdir.join(&job.repo);
        recorder
            .git(&repo_dir, &["checkout", &job.target_branch])
            .await?;

        let branch = job.backport_branch();
        recorder
            .git(&repo_dir, &["checkout", "-b", &branch])
            .await?;

        let email = format!("{}@users.noreply.github.com", job.credentials.username);
        recorder
            .git(&repo_dir, &["config", "user.email", &email])
            .await?;
        recorder
            .git(&repo_dir, &["config", "user.name", &job.credentials.username])
            .await?;

        for commit in &job.commits {
            info!(commit = %commit, branch = %branch, "Cherry-picking");
            recorder.git(&repo_dir, &["cherry-pick", commit]).await?;
        }

        recorder
            .git(&repo_dir, &["config", &rewrite_key, origin])
            .await?;

        info!(branch = %branch, "Pushing backport branch");
        recorder.git(&repo_dir, &["push", "origin", &branch]).await?;

        Ok(branch)
    }
}
