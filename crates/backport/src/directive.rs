//! `/backport <branch>` directive parsing and label resolution.
//!
//! Comment bodies are scanned line by line. A line is a directive when it
//! starts with `/backport`, followed by whitespace and a branch name. Each
//! directive becomes either a label (`Backport to <branch>`) or a diagnostic
//! when the branch does not exist. Order follows the comment, and repeated
//! directives are kept.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

/// Prefix of every label that records a backport target.
pub const LABEL_PREFIX: &str = "Backport to ";

static DIRECTIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/backport\s+(\S.*)$").unwrap());

/// One `/backport <branch>` request found in a comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackportDirective {
    /// The comment line the directive came from.
    pub source_line: String,
    /// Requested target branch, trimmed.
    pub target_branch: String,
}

/// Labels to apply and diagnostics to report for one comment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelResolution {
    pub labels_to_apply: Vec<String>,
    pub diagnostics: Vec<String>,
}

impl LabelResolution {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels_to_apply.is_empty() && self.diagnostics.is_empty()
    }
}

/// Extract every directive from a comment body, in order.
#[must_use]
pub fn parse_directives(body: &str) -> Vec<BackportDirective> {
    body.lines()
        .filter_map(|line| {
            let captures = DIRECTIVE.captures(line)?;
            let branch = captures.get(1)?.as_str().trim();
            Some(BackportDirective {
                source_line: line.to_string(),
                target_branch: branch.to_string(),
            })
        })
        .collect()
}

/// Label name recording `branch` as a backport target.
#[must_use]
pub fn label_for_branch(branch: &str) -> String {
    format!("{LABEL_PREFIX}{branch}")
}

/// Target branches encoded in a pull request's labels, in label order.
#[must_use]
pub fn branches_from_labels<'a, I>(labels: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    labels
        .into_iter()
        .filter_map(|label| label.strip_prefix(LABEL_PREFIX))
        .map(str::to_string)
        .collect()
}

/// Resolve already-parsed directives against the repository's branches.
#[must_use]
pub fn resolve_directives(
    directives: &[BackportDirective],
    known_branches: &HashSet<String>,
) -> LabelResolution {
    let mut resolution = LabelResolution::default();
    for directive in directives {
        if known_branches.contains(&directive.target_branch) {
            resolution
                .labels_to_apply
                .push(label_for_branch(&directive.target_branch));
        } else {
            resolution.diagnostics.push(format!(
                "Unable to locate branch {}",
                directive.target_branch
            ));
        }
    }
    resolution
}

/// Parse a comment body and resolve its directives against `known_branches`.
#[must_use]
pub fn resolve(body: &str, known_branches: &HashSet<String>) -> LabelResolution {
    resolve_directives(&parse_directives(body), known_branches)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn branches(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_single_known_branch() {
        let resolution = resolve("/backport 1.1.x", &branches(&["1.1.x", "1.2.x"]));
        assert_eq!(resolution.labels_to_apply, vec!["Backport to 1.1.x"]);
        assert!(resolution.diagnostics.is_empty());
    }

    #[test]
    fn test_unknown_branch_yields_diagnostic() {
        let resolution = resolve(
            "/backport 1.1.x\n/backport 1.2.x",
            &branches(&["1.1.x"]),
        );
        assert_eq!(resolution.labels_to_apply, vec!["Backport to 1.1.x"]);
        assert_eq!(resolution.diagnostics, vec!["Unable to locate branch 1.2.x"]);
    }

    #[test]
    fn test_no_directives_is_empty() {
        let body = "LGTM\n\nPlease backport this when you get a chance.\n/approve";
        let resolution = resolve(body, &branches(&["main"]));
        assert!(resolution.is_empty());
        assert!(parse_directives("").is_empty());
    }

    #[test]
    fn test_keyword_must_be_followed_by_whitespace_and_branch() {
        assert!(parse_directives("/backport").is_empty());
        assert!(parse_directives("/backport   ").is_empty());
        assert!(parse_directives("/backports 1.1.x").is_empty());
        assert!(parse_directives("  /backport 1.1.x").is_empty());
    }

    #[test]
    fn test_branch_name_is_trimmed() {
        let directives = parse_directives("/backport \t release-1.x  \r\nthanks");
        assert_eq!(directives.len(), 1);
        assert_eq!(directives[0].target_branch, "release-1.x");
        assert_eq!(directives[0].source_line, "/backport \t release-1.x  ");
    }

    #[test]
    fn test_membership_is_case_sensitive() {
        let resolution = resolve("/backport Release-1.x", &branches(&["release-1.x"]));
        assert!(resolution.labels_to_apply.is_empty());
        assert_eq!(
            resolution.diagnostics,
            vec!["Unable to locate branch Release-1.x"]
        );
    }

    #[test]
    fn test_order_and_duplicates_are_preserved() {
        let body = "/backport 1.2.x\nnoise\n/backport 1.1.x\n/backport 1.2.x\n/backport nope";
        let resolution = resolve(body, &branches(&["1.1.x", "1.2.x"]));
        assert_eq!(
            resolution.labels_to_apply,
            vec!["Backport to 1.2.x", "Backport to 1.1.x", "Backport to 1.2.x"]
        );
        assert_eq!(resolution.diagnostics, vec!["Unable to locate branch nope"]);
        assert_eq!(
            resolution.labels_to_apply.len() + resolution.diagnostics.len(),
            parse_directives(body).len()
        );
    }

    #[test]
    fn test_resolve_is_repeatable() {
        let body = "/backport 1.1.x\n/backport 2.0.x";
        let known = branches(&["1.1.x"]);
        assert_eq!(resolve(body, &known), resolve(body, &known));
    }

    #[test]
    fn test_branches_from_labels() {
        let labels = ["bug", "Backport to 1.1.x", "backport to 1.0.x", "Backport to main"];
        assert_eq!(
            branches_from_labels(labels.iter().copied()),
            vec!["1.1.x", "main"]
        );
    }
}
