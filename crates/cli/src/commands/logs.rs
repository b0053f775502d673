use crate::commands::CommandResult;
use kampus_core::config::{AppConfig, LoadOptions};
use kampus_db::repositories::{ActivityLog, SqlActivityLog};
use kampus_db::{connect_with_settings, migrations};

pub fn run(limit: u32) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "logs",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "logs",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let log = SqlActivityLog::new(pool.clone());
        let entries =
            log.recent(limit).await.map_err(|error| ("activity_log", error.to_string(), 5u8))?;
        pool.close().await;
        Ok::<_, (&'static str, String, u8)>(entries)
    });

    match result {
        Ok(entries) if entries.is_empty() => {
            CommandResult::success("logs", "activity log is empty")
        }
        Ok(entries) => {
            let lines = entries
                .iter()
                .map(|entry| {
                    format!(
                        "{} user={} (@{}) action={} {}",
                        entry.recorded_at.format("%Y-%m-%d %H:%M:%S"),
                        entry.user_id,
                        entry.username,
                        entry.action,
                        entry.details,
                    )
                })
                .collect::<Vec<_>>();
            CommandResult::success("logs", lines.join("; "))
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("logs", error_class, message, exit_code)
        }
    }
}
