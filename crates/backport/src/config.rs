//! Configuration for the backport service.

use std::env;
use std::time::Duration;

/// Where replay credentials come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialsSource {
    /// Basic-auth secrets in the pod's namespace.
    Kubernetes,
    /// `GIT_USERNAME` / `GIT_TOKEN` environment variables.
    Env,
}

impl CredentialsSource {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("env") {
            Self::Env
        } else {
            Self::Kubernetes
        }
    }
}

/// Backport webhook handler configuration.
#[derive(Clone)]
pub struct Config {
    /// HTTP server port.
    pub port: u16,
    /// Log verbosity used when `RUST_LOG` is unset.
    pub log_level: String,
    /// Emit JSON formatted logs.
    pub json_logs: bool,
    /// Webhook signing secret. Empty disables verification.
    pub webhook_secret: String,
    /// Forge HTTPS origin, e.g. `https://github.com`.
    pub git_host: String,
    /// Forge REST API base URL.
    pub api_url: String,
    /// Credential store to use for replay jobs.
    pub credentials_source: CredentialsSource,
    /// Deadline applied to every git process.
    pub step_timeout: Duration,
    /// Colour of newly created backport labels.
    pub label_color: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3000),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "debug".to_string()),
            json_logs: env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
            webhook_secret: hmac_token(),
            git_host: env::var("GIT_HOST")
                .ok()
                .filter(|s| !s.is_empty())
                .map_or_else(
                    || "https://github.com".to_string(),
                    |s| s.trim_end_matches('/').to_string(),
                ),
            api_url: env::var("GITHUB_API_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .map_or_else(
                    || "https://api.github.com".to_string(),
                    |s| s.trim_end_matches('/').to_string(),
                ),
            credentials_source: env::var("CREDENTIALS_SOURCE")
                .map(|v| CredentialsSource::parse(&v))
                .unwrap_or(CredentialsSource::Kubernetes),
            step_timeout: Duration::from_secs(
                env::var("GIT_STEP_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(600),
            ),
            label_color: env::var("BACKPORT_LABEL_COLOR")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "000000".to_string()),
        }
    }
}

/// Load the webhook signing secret.
///
/// `HMAC_TOKEN` wins; otherwise the file named by `HMAC_TOKEN_PATH` is read.
/// Returns an empty string when neither yields a value.
#[must_use]
pub fn hmac_token() -> String {
    let token = env::var("HMAC_TOKEN").unwrap_or_default();
    if !token.is_empty() {
        return token;
    }

    match env::var("HMAC_TOKEN_PATH") {
        Ok(path) if !path.is_empty() => match std::fs::read_to_string(&path) {
            Ok(contents) => contents.trim_end().to_string(),
            Err(e) => {
                tracing::error!(path = %path, error = %e, "Failed to read HMAC_TOKEN_PATH");
                String::new()
            }
        },
        _ => String::new(),
    }
}
