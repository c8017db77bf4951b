//! Git operations using shell commands.
//!
//! Uses `tokio::process::Command` so each step can be bounded by a deadline
//! and killed when it expires.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

/// Combined output of one git invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitOutput {
    /// Exit code, `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    /// stdout followed by stderr.
    pub output: String,
}

impl GitOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Failure to obtain any output from git at all.
#[derive(Debug, Error)]
pub enum GitRunError {
    /// The process could not be started.
    #[error("failed to run git: {0}")]
    Spawn(#[source] std::io::Error),
    /// The process outlived its deadline and was killed.
    #[error("git did not finish within {0:?}")]
    Timeout(Duration),
}

/// Runs git subcommands inside a directory.
#[async_trait]
pub trait GitRunner: Send + Sync {
    /// Run `git <args>` with `dir` as the working directory.
    async fn run(&self, dir: &Path, args: &[String]) -> Result<GitOutput, GitRunError>;
}

/// [`GitRunner`] that spawns the `git` executable.
#[derive(Debug, Clone)]
pub struct ProcessGit {
    program: String,
    timeout: Duration,
}

impl ProcessGit {
    /// Create a runner that kills any git process running longer than `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            program: "git".to_string(),
            timeout,
        }
    }
}

#[async_trait]
impl GitRunner for ProcessGit {
    async fn run(&self, dir: &Path, args: &[String]) -> Result<GitOutput, GitRunError> {
        let child = Command::new(&self.program)
            .args(args)
            .current_dir(dir)
            // Never block on a credential prompt.
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(GitRunError::Spawn)?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| GitRunError::Timeout(self.timeout))?
            .map_err(GitRunError::Spawn)?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(GitOutput {
            code: output.status.code(),
            output: combined,
        })
    }
}
