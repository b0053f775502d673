use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use kampus_core::config::{AppConfig, ConfigError, LoadOptions};
use kampus_core::policy::ExclusionPolicy;
use kampus_db::repositories::{SqlActivityLog, SqlAllowListStore};
use kampus_db::{connect_with_settings, migrations, DbPool};
use kampus_dialogue::Orchestrator;
use kampus_portal::HttpPortalClient;
use kampus_telegram::api::{HttpTelegramApi, TelegramApi, TelegramError};

use crate::handlers::{AdminBotHandler, StudentBotHandler};
use crate::notify::AdminNotifier;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub student_api: Arc<dyn TelegramApi>,
    pub admin_api: Arc<dyn TelegramApi>,
    pub student_handler: Arc<StudentBotHandler>,
    pub admin_handler: Arc<AdminBotHandler>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("telegram api client failed: {0}")]
    Telegram(#[from] TelegramError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let allow_list = Arc::new(SqlAllowListStore::new(db_pool.clone()));
    let activity = Arc::new(SqlActivityLog::new(db_pool.clone()));

    let student_api: Arc<dyn TelegramApi> = Arc::new(HttpTelegramApi::new(
        config.telegram.bot_token.clone(),
        config.telegram.poll_timeout_secs,
    )?);
    let admin_api: Arc<dyn TelegramApi> = Arc::new(HttpTelegramApi::new(
        config.telegram.admin_bot_token.clone(),
        config.telegram.poll_timeout_secs,
    )?);

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(HttpPortalClient::new(&config.portal)),
        allow_list.clone(),
        activity.clone(),
        ExclusionPolicy::new(&config.policy),
    ));

    let notifier = Arc::new(AdminNotifier::new(admin_api.clone(), config.telegram.admin_chat_id));

    let student_handler = Arc::new(StudentBotHandler::new(
        orchestrator,
        student_api.clone(),
        notifier,
        allow_list.clone(),
        activity.clone(),
        config.telegram.registration_token.clone(),
    ));
    let admin_handler = Arc::new(AdminBotHandler::new(
        admin_api.clone(),
        allow_list,
        activity,
        config.telegram.admin_chat_id,
    ));

    Ok(Application { config, db_pool, student_api, admin_api, student_handler, admin_handler })
}

#[cfg(test)]
mod tests {
    use kampus_core::config::{ConfigOverrides, LoadOptions};

    use crate::bootstrap::bootstrap;

    fn valid_overrides(database_url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                bot_token: Some("100:student".to_string()),
                admin_bot_token: Some("200:admin".to_string()),
                admin_chat_id: Some(500),
                registration_token: Some("invite-me".to_string()),
                portal_username: Some("svc-user".to_string()),
                portal_password: Some("svc-pass".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_without_required_tokens() {
        let result = bootstrap(LoadOptions {
            overrides: kampus_core::config::ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                bot_token: Some("missing-colon".to_string()),
                admin_bot_token: Some("200:admin".to_string()),
                admin_chat_id: Some(500),
                registration_token: Some("invite-me".to_string()),
                portal_username: Some("svc-user".to_string()),
                portal_password: Some("svc-pass".to_string()),
                ..Default::default()
            },
            ..LoadOptions::default()
        })
        .await;

        let message = result.err().expect("bootstrap should fail").to_string();
        assert!(message.contains("telegram.bot_token"));
    }

    #[tokio::test]
    async fn bootstrap_prepares_schema_and_stores() {
        let app = bootstrap(valid_overrides("sqlite::memory:?cache=shared"))
            .await
            .expect("bootstrap should succeed with valid overrides");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('allowed_users', 'activity_log')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("expected access tables to be available after bootstrap");
        assert_eq!(table_count, 2, "bootstrap should expose the access-control tables");

        app.db_pool.close().await;
    }
}
