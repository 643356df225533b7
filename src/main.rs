use anyhow::Context;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use tokio::signal;
use tracing::{error, info, warn};

use pantry_api as api;

#[derive(Debug, Parser)]
#[command(name = "pantry-api", version, about = "Pantry inventory API")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Scan items once and send the expiry notification
    NotifyJob,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = api::config::load_config().context("failed to load configuration")?;
    api::config::init_tracing(&cfg.log_level, cfg.log_json, cfg.otel_export_endpoint());

    // MODE=notify_job selects the job when no subcommand is given, for schedulers
    // that can only set environment variables
    let command = cli
        .command
        .unwrap_or_else(|| command_for_mode(std::env::var("MODE").ok().as_deref()));

    let result = match command {
        Command::Serve => serve(cfg).await,
        Command::NotifyJob => {
            run_notify_job(&cfg).await;
            Ok(())
        }
    };
    api::config::shutdown_tracing();
    result
}

fn command_for_mode(mode: Option<&str>) -> Command {
    match mode {
        Some(mode) if mode.eq_ignore_ascii_case("notify_job") => Command::NotifyJob,
        _ => Command::Serve,
    }
}

async fn serve(cfg: api::config::AppConfig) -> anyhow::Result<()> {
    let repo = api::repositories::build_repository(&cfg)
        .await
        .context("failed to initialise storage backend")?;
    let app = api::app_router(api::AppState::new(repo), &cfg);

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", cfg.host, cfg.port))?;
    info!("pantry-api listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("pantry-api stopped");
    Ok(())
}

/// One expiry scan. Failures are logged and never retried.
async fn run_notify_job(cfg: &api::config::AppConfig) {
    info!("Starting expiry notification job");

    let repo = match api::repositories::build_repository(cfg).await {
        Ok(repo) => repo,
        Err(e) => {
            error!("Notify job could not open storage: {:#}", e);
            return;
        }
    };
    let notifier = match api::notifications::build_notifier(cfg) {
        Ok(notifier) => notifier,
        Err(e) => {
            error!("Notify job could not build notifier: {}", e);
            return;
        }
    };
    let recipients = api::auth::StaticRecipientDirectory::new(cfg.recipients());

    let scan = api::services::scan_and_notify(repo.as_ref(), notifier.as_ref(), &recipients);
    match tokio::time::timeout(cfg.notify_timeout(), scan).await {
        Ok(Ok(report)) => info!(
            expired = report.expired.len(),
            expiring_soon = report.expiring_soon.len(),
            "Notify job finished"
        ),
        Ok(Err(e)) => error!("Notify job failed: {}", e),
        Err(_) => {
            let err = api::errors::ServiceError::Timeout(format!(
                "notify job exceeded {}s",
                cfg.notify_timeout_secs
            ));
            error!("Notify job failed: {}", err);
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_selects_job_regardless_of_case() {
        for mode in ["notify_job", "NOTIFY_JOB", "Notify_Job"] {
            assert!(matches!(command_for_mode(Some(mode)), Command::NotifyJob), "{}", mode);
        }
        assert!(matches!(command_for_mode(Some("serve")), Command::Serve));
        assert!(matches!(command_for_mode(Some("")), Command::Serve));
        assert!(matches!(command_for_mode(None), Command::Serve));
    }
}
