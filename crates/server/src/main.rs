mod bootstrap;
mod handlers;
mod health;
mod notify;

use anyhow::Result;
use kampus_core::config::{AppConfig, LoadOptions};
use kampus_telegram::poller::{PollPolicy, UpdatePoller};

fn init_logging(config: &AppConfig) {
    use kampus_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.db_pool.clone(),
    )
    .await?;

    let poll_timeout_secs = app.config.telegram.poll_timeout_secs;
    let student_poller = UpdatePoller::new(
        app.student_api.clone(),
        app.student_handler.clone(),
        PollPolicy::default(),
        poll_timeout_secs,
        "student-bot",
    );
    let admin_poller = UpdatePoller::new(
        app.admin_api.clone(),
        app.admin_handler.clone(),
        PollPolicy::default(),
        poll_timeout_secs,
        "admin-bot",
    );

    let student_task = tokio::spawn(async move { student_poller.run().await });
    let admin_task = tokio::spawn(async move { admin_poller.run().await });

    tracing::info!(event_name = "system.server.started", "kampus-server started");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!(event_name = "system.server.stopping", "shutdown signal received");
        }
        result = student_task => {
            tracing::warn!(event_name = "system.server.student_runner_exited", ?result, "student bot runner exited");
        }
        result = admin_task => {
            tracing::warn!(event_name = "system.server.admin_runner_exited", ?result, "admin bot runner exited");
        }
    }

    Ok(())
}
