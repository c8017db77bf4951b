//! `/backport` comments: label the pull request for a later replay.

use std::collections::HashSet;

use tracing::{debug, error, info};

use super::Backporter;
use crate::directive::{parse_directives, resolve_directives};
use crate::events::CommentEvent;

impl Backporter {
    pub(super) async fn handle_comment(&self, comment: &CommentEvent) {
        if comment.action != "created" {
            debug!(action = %comment.action, "Ignoring comment action");
            return;
        }

        let directives = parse_directives(&comment.body);
        if directives.is_empty() {
            debug!(number = comment.number, "No backport directives in comment");
            return;
        }

        let owner = comment.repository.owner.login.as_str();
        let repo = comment.repository.name.as_str();
        let number = comment.number;

        info!(
            owner = %owner,
            repo = %repo,
            pr_number = number,
            directives = directives.len(),
            "Handling backport directives"
        );

        let Some(credentials) = self.resolve_credentials().await else {
            return;
        };
        let Some(scm) = self.connect(&credentials) else {
            return;
        };

        let branches: HashSet<String> = match scm.list_branches(owner, repo).await {
            Ok(branches) => branches.into_iter().collect(),
            Err(e) => {
                error!(owner = %owner, repo = %repo, error = %e, "Failed to list branches");
                return;
            }
        };

        let resolution = resolve_directives(&directives, &branches);
        let publisher = self.publisher(scm);

        for label in &resolution.labels_to_apply {
            if let Err(e) = publisher.apply_label(owner, repo, number, label).await {
                error!(pr_number = number, label = %label, error = %e, "Failed to apply label");
                return;
            }
        }

        if let Err(e) = publisher
            .report_diagnostics(owner, repo, number, &resolution.diagnostics)
            .await
        {
            error!(pr_number = number, error = %e, "Failed to post diagnostics");
        }
    }
}
