//! Backport service binary.
//!
//! Standalone HTTP service receiving GitHub webhooks.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn, Level};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use backport::config::{Config, CredentialsSource};
use backport::credentials::{CredentialStore, KubeCredentialStore, StaticCredentialStore};
use backport::replay::git::ProcessGit;
use backport::scm::GitHubConnector;
use backport::server::{self, AppState};
use backport::{Backporter, ReplayPipeline};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::default();
    init_tracing(&config);

    info!("Starting backport service...");

    if config.webhook_secret.is_empty() {
        warn!("No HMAC_TOKEN configured - webhook signatures will not be verified");
    }

    let credentials: Arc<dyn CredentialStore> = match config.credentials_source {
        CredentialsSource::Kubernetes => {
            let store = KubeCredentialStore::try_default()
                .await
                .context("Failed to create Kubernetes credential store")?;
            info!("Using Kubernetes secrets for forge credentials");
            Arc::new(store)
        }
        CredentialsSource::Env => {
            let store = StaticCredentialStore::from_env()
                .context("GIT_USERNAME and GIT_TOKEN must be set when CREDENTIALS_SOURCE=env")?;
            info!("Using GIT_USERNAME/GIT_TOKEN for forge credentials");
            Arc::new(store)
        }
    };

    let pipeline = ReplayPipeline::new(
        Arc::new(ProcessGit::new(config.step_timeout)),
        config.git_host.clone(),
    );
    let backporter = Backporter::new(
        credentials,
        Arc::new(GitHubConnector::new(config.api_url.clone())),
        pipeline,
        config.git_host.clone(),
        config.label_color.clone(),
    );

    let state = AppState::new(backporter, &config.webhook_secret);
    let app = server::build_router(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    state.set_ready(true);
    info!(
        port = config.port,
        git_host = %config.git_host,
        api_url = %config.api_url,
        step_timeout = ?config.step_timeout,
        "Backport service listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

/// `RUST_LOG` wins; otherwise `LOG_LEVEL`, falling back to debug.
fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = config.log_level.parse::<Level>().unwrap_or(Level::DEBUG);
        EnvFilter::default().add_directive(LevelFilter::from_level(level).into())
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.json_logs {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully");
        },
        () = terminate => {
            info!("Received SIGTERM, shutting down gracefully");
        },
    }
}
