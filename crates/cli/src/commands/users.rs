use crate::commands::CommandResult;
use kampus_core::config::{AppConfig, LoadOptions};
use kampus_db::repositories::{AllowListStore, SqlAllowListStore};
use kampus_db::{connect_with_settings, migrations, DbPool};

pub fn add(user_id: i64, username: Option<&str>) -> CommandResult {
    let username = username.map(str::to_owned);
    with_store("users.add", move |store| {
        Box::pin(async move {
            let inserted = store
                .add(user_id, username.as_deref())
                .await
                .map_err(|error| ("allow_list", error.to_string(), 5u8))?;
            Ok(if inserted {
                format!("user {user_id} added to the allow list")
            } else {
                format!("user {user_id} is already on the allow list")
            })
        })
    })
}

pub fn remove(user_id: i64) -> CommandResult {
    with_store("users.remove", move |store| {
        Box::pin(async move {
            let removed = store
                .remove(user_id)
                .await
                .map_err(|error| ("allow_list", error.to_string(), 5u8))?;
            Ok(if removed {
                format!("user {user_id} removed from the allow list")
            } else {
                format!("user {user_id} was not on the allow list")
            })
        })
    })
}

pub fn list() -> CommandResult {
    with_store("users.list", |store| {
        Box::pin(async move {
            let users =
                store.list().await.map_err(|error| ("allow_list", error.to_string(), 5u8))?;
            if users.is_empty() {
                return Ok("allow list is empty".to_string());
            }

            let lines = users
                .iter()
                .map(|user| {
                    format!(
                        "{} (@{}) added {}",
                        user.id,
                        user.username.as_deref().unwrap_or("unknown"),
                        user.added_at.format("%Y-%m-%d %H:%M:%S"),
                    )
                })
                .collect::<Vec<_>>();
            Ok(lines.join("; "))
        })
    })
}

type StoreFuture = std::pin::Pin<
    Box<dyn std::future::Future<Output = Result<String, (&'static str, String, u8)>>>,
>;

fn with_store<F>(command: &'static str, body: F) -> CommandResult
where
    F: FnOnce(SqlAllowListStore) -> StoreFuture,
{
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                command,
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
                command,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool: DbPool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let outcome = body(SqlAllowListStore::new(pool.clone())).await;
        pool.close().await;
        outcome
    });

    match result {
        Ok(message) => CommandResult::success(command, message),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure(command, error_class, message, exit_code)
        }
    }
}
