//! Merged pull request: replay onto every labelled branch.

use tracing::{error, info, warn};

use super::Backporter;
use crate::directive::branches_from_labels;
use crate::events::PullRequestEvent;
use crate::publisher::Publisher;
use crate::replay::{ReplayJob, ReplayOutput};

impl Backporter {
    pub(super) async fn handle_merged(&self, event: &PullRequestEvent) {
        let owner = event.repository.owner.login.as_str();
        let repo = event.repository.name.as_str();
        let pr_number = event.pull_request.number;

        info!(owner = %owner, repo = %repo, pr_number, "Pull request merged");

        let Some(credentials) = self.resolve_credentials().await else {
            return;
        };
        let Some(scm) = self.connect(&credentials) else {
            return;
        };

        let commits = match scm.list_commits(owner, repo, pr_number).await {
            Ok(commits) => commits,
            Err(e) => {
                error!(owner = %owner, repo = %repo, pr_number, error = %e, "Failed to list commits");
                return;
            }
        };

        let labels = match scm.pull_request_labels(owner, repo, pr_number).await {
            Ok(labels) => labels,
            Err(e) => {
                error!(owner = %owner, repo = %repo, pr_number, error = %e, "Failed to read labels");
                return;
            }
        };

        let branches = branches_from_labels(labels.iter().map(String::as_str));
        if branches.is_empty() {
            info!(owner = %owner, repo = %repo, pr_number, "No backport labels");
            return;
        }
        if commits.is_empty() {
            warn!(owner = %owner, repo = %repo, pr_number, "Pull request has no commits");
        }

        info!(
            owner = %owner,
            repo = %repo,
            pr_number,
            commits = ?commits,
            branches = ?branches,
            "Backporting"
        );

        let publisher = self.publisher(scm);
        for target_branch in branches {
            let job = ReplayJob {
                owner: owner.to_string(),
                repo: repo.to_string(),
                source_pr: pr_number,
                target_branch,
                commits: commits.clone(),
                credentials: credentials.clone(),
            };
            self.backport_to_branch(&publisher, &job).await;
        }
    }

    /// Replay one branch, open the pull request on success, and always post
    /// the transcript.
    async fn backport_to_branch(&self, publisher: &Publisher, job: &ReplayJob) {
        let ReplayOutput {
            mut transcript,
            result,
        } = self.pipeline.replay(job).await;

        match result {
            Ok(working_branch) => {
                match publisher
                    .publish_backport_pr(
                        &job.owner,
                        &job.repo,
                        job.source_pr,
                        &job.target_branch,
                        &working_branch,
                    )
                    .await
                {
                    Ok(created) => transcript.push_trailer(format!("Created PR {}", created.html_url)),
                    Err(e) => {
                        error!(
                            pr_number = job.source_pr,
                            branch = %job.target_branch,
                            error = %e,
                            "Failed to create backport pull request"
                        );
                        transcript.push_trailer(format!("Failed to create PR: {e}"));
                    }
                }
            }
            Err(e) => {
                error!(
                    pr_number = job.source_pr,
                    branch = %job.target_branch,
                    error = %e,
                    "Backport failed"
                );
            }
        }

        if let Err(e) = publisher
            .notify(&job.owner, &job.repo, job.source_pr, &transcript)
            .await
        {
            error!(
                pr_number = job.source_pr,
                branch = %job.target_branch,
                error = %e,
                "Failed to post backport transcript"
            );
        }
    }
}
