//! GitHub webhook bot that backports merged pull requests.
//!
//! This crate provides:
//! - `/backport <branch>` directive parsing and label resolution
//! - A git replay pipeline with an auditable transcript
//! - A GitHub REST client and the publisher that reports outcomes
//! - Forge credential lookup from Kubernetes secrets
//! - Webhook decoding, signature verification and the HTTP server

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)] // Most async operations talk to git or the forge

pub mod config;
pub mod credentials;
pub mod directive;
pub mod error;
pub mod events;
pub mod handlers;
pub mod publisher;
pub mod replay;
pub mod scm;
pub mod server;
pub mod webhooks;

pub use config::Config;
pub use credentials::{CredentialStore, Credentials};
pub use directive::{resolve, BackportDirective, LabelResolution, LABEL_PREFIX};
pub use events::WebhookEvent;
pub use handlers::Backporter;
pub use replay::{ReplayJob, ReplayPipeline};
pub use scm::{GitHubClient, ScmClient};
