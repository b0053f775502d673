use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub telegram: TelegramConfig,
    pub portal: PortalConfig,
    pub policy: PolicyConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    pub admin_bot_token: SecretString,
    pub admin_chat_id: i64,
    pub registration_token: SecretString,
    pub poll_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct PortalConfig {
    pub web_base_url: String,
    pub api_base_url: String,
    pub username: SecretString,
    pub password: SecretString,
    pub timeout_secs: u64,
}

/// Protected-record policy. The defaults are the production values; tests
/// override them through `ConfigOverrides` or by building the struct directly.
#[derive(Clone, Debug)]
pub struct PolicyConfig {
    pub protected_terms: Vec<String>,
    pub privileged_user_id: i64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub bot_token: Option<String>,
    pub admin_bot_token: Option<String>,
    pub admin_chat_id: Option<i64>,
    pub registration_token: Option<String>,
    pub portal_web_base_url: Option<String>,
    pub portal_api_base_url: Option<String>,
    pub portal_username: Option<String>,
    pub portal_password: Option<String>,
    pub protected_terms: Option<Vec<String>>,
    pub privileged_user_id: Option<i64>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://kampus.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            telegram: TelegramConfig {
                bot_token: String::new().into(),
                admin_bot_token: String::new().into(),
                admin_chat_id: 0,
                registration_token: String::new().into(),
                poll_timeout_secs: 30,
            },
            portal: PortalConfig {
                web_base_url: "https://pddikti-admin.kemdikbud.go.id".to_string(),
                api_base_url: "https://api-pddikti-admin.kemdikbud.go.id".to_string(),
                username: String::new().into(),
                password: String::new().into(),
                timeout_secs: 60,
            },
            policy: PolicyConfig {
                protected_terms: vec![
                    "azmi ridho rinanta".to_string(),
                    "21523023".to_string(),
                    "universitas islam indonesia".to_string(),
                ],
                privileged_user_id: 5_705_926_766,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                health_check_port: 8000,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("kampus.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(telegram) = patch.telegram {
            if let Some(bot_token_value) = telegram.bot_token {
                self.telegram.bot_token = secret_value(bot_token_value);
            }
            if let Some(admin_bot_token_value) = telegram.admin_bot_token {
                self.telegram.admin_bot_token = secret_value(admin_bot_token_value);
            }
            if let Some(admin_chat_id) = telegram.admin_chat_id {
                self.telegram.admin_chat_id = admin_chat_id;
            }
            if let Some(registration_token_value) = telegram.registration_token {
                self.telegram.registration_token = secret_value(registration_token_value);
            }
            if let Some(poll_timeout_secs) = telegram.poll_timeout_secs {
                self.telegram.poll_timeout_secs = poll_timeout_secs;
            }
        }

        if let Some(portal) = patch.portal {
            if let Some(web_base_url) = portal.web_base_url {
                self.portal.web_base_url = web_base_url;
            }
            if let Some(api_base_url) = portal.api_base_url {
                self.portal.api_base_url = api_base_url;
            }
            if let Some(username_value) = portal.username {
                self.portal.username = secret_value(username_value);
            }
            if let Some(password_value) = portal.password {
                self.portal.password = secret_value(password_value);
            }
            if let Some(timeout_secs) = portal.timeout_secs {
                self.portal.timeout_secs = timeout_secs;
            }
        }

        if let Some(policy) = patch.policy {
            if let Some(protected_terms) = policy.protected_terms {
                self.policy.protected_terms = protected_terms;
            }
            if let Some(privileged_user_id) = policy.privileged_user_id {
                self.policy.privileged_user_id = privileged_user_id;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("KAMPUS_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("KAMPUS_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("KAMPUS_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("KAMPUS_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("KAMPUS_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("KAMPUS_TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = secret_value(value);
        }
        if let Some(value) = read_env("KAMPUS_TELEGRAM_ADMIN_BOT_TOKEN") {
            self.telegram.admin_bot_token = secret_value(value);
        }
        if let Some(value) = read_env("KAMPUS_TELEGRAM_ADMIN_CHAT_ID") {
            self.telegram.admin_chat_id = parse_i64("KAMPUS_TELEGRAM_ADMIN_CHAT_ID", &value)?;
        }
        if let Some(value) = read_env("KAMPUS_TELEGRAM_REGISTRATION_TOKEN") {
            self.telegram.registration_token = secret_value(value);
        }
        if let Some(value) = read_env("KAMPUS_TELEGRAM_POLL_TIMEOUT_SECS") {
            self.telegram.poll_timeout_secs =
                parse_u64("KAMPUS_TELEGRAM_POLL_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("KAMPUS_PORTAL_WEB_BASE_URL") {
            self.portal.web_base_url = value;
        }
        if let Some(value) = read_env("KAMPUS_PORTAL_API_BASE_URL") {
            self.portal.api_base_url = value;
        }
        if let Some(value) = read_env("KAMPUS_PORTAL_USERNAME") {
            self.portal.username = secret_value(value);
        }
        if let Some(value) = read_env("KAMPUS_PORTAL_PASSWORD") {
            self.portal.password = secret_value(value);
        }
        if let Some(value) = read_env("KAMPUS_PORTAL_TIMEOUT_SECS") {
            self.portal.timeout_secs = parse_u64("KAMPUS_PORTAL_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("KAMPUS_POLICY_PRIVILEGED_USER_ID") {
            self.policy.privileged_user_id = parse_i64("KAMPUS_POLICY_PRIVILEGED_USER_ID", &value)?;
        }

        if let Some(value) = read_env("KAMPUS_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("KAMPUS_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port = parse_u16("KAMPUS_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("KAMPUS_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("KAMPUS_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level = read_env("KAMPUS_LOGGING_LEVEL").or_else(|| read_env("KAMPUS_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("KAMPUS_LOGGING_FORMAT").or_else(|| read_env("KAMPUS_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(bot_token) = overrides.bot_token {
            self.telegram.bot_token = secret_value(bot_token);
        }
        if let Some(admin_bot_token) = overrides.admin_bot_token {
            self.telegram.admin_bot_token = secret_value(admin_bot_token);
        }
        if let Some(admin_chat_id) = overrides.admin_chat_id {
            self.telegram.admin_chat_id = admin_chat_id;
        }
        if let Some(registration_token) = overrides.registration_token {
            self.telegram.registration_token = secret_value(registration_token);
        }
        if let Some(web_base_url) = overrides.portal_web_base_url {
            self.portal.web_base_url = web_base_url;
        }
        if let Some(api_base_url) = overrides.portal_api_base_url {
            self.portal.api_base_url = api_base_url;
        }
        if let Some(username) = overrides.portal_username {
            self.portal.username = secret_value(username);
        }
        if let Some(password) = overrides.portal_password {
            self.portal.password = secret_value(password);
        }
        if let Some(protected_terms) = overrides.protected_terms {
            self.policy.protected_terms = protected_terms;
        }
        if let Some(privileged_user_id) = overrides.privileged_user_id {
            self.policy.privileged_user_id = privileged_user_id;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_telegram(&self.telegram)?;
        validate_portal(&self.portal)?;
        validate_policy(&self.policy)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("kampus.toml"), PathBuf::from("config/kampus.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_telegram(telegram: &TelegramConfig) -> Result<(), ConfigError> {
    let bot_token = telegram.bot_token.expose_secret();
    if bot_token.is_empty() {
        return Err(ConfigError::Validation(
            "telegram.bot_token is required. Create a bot with @BotFather and copy its token"
                .to_string(),
        ));
    }
    if !bot_token.contains(':') {
        return Err(ConfigError::Validation(
            "telegram.bot_token must look like `<bot_id>:<secret>` as issued by @BotFather"
                .to_string(),
        ));
    }

    let admin_bot_token = telegram.admin_bot_token.expose_secret();
    if admin_bot_token.is_empty() {
        return Err(ConfigError::Validation(
            "telegram.admin_bot_token is required. Create a second bot with @BotFather for the operator channel".to_string(),
        ));
    }
    if !admin_bot_token.contains(':') {
        return Err(ConfigError::Validation(
            "telegram.admin_bot_token must look like `<bot_id>:<secret>` as issued by @BotFather"
                .to_string(),
        ));
    }

    if telegram.admin_chat_id == 0 {
        return Err(ConfigError::Validation(
            "telegram.admin_chat_id is required (use the admin bot `/chatid` command to find it)"
                .to_string(),
        ));
    }

    if telegram.registration_token.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "telegram.registration_token is required for `/regist` self-registration".to_string(),
        ));
    }

    if telegram.poll_timeout_secs == 0 || telegram.poll_timeout_secs > 60 {
        return Err(ConfigError::Validation(
            "telegram.poll_timeout_secs must be in range 1..=60".to_string(),
        ));
    }

    Ok(())
}

fn validate_portal(portal: &PortalConfig) -> Result<(), ConfigError> {
    for (key, url) in
        [("portal.web_base_url", &portal.web_base_url), ("portal.api_base_url", &portal.api_base_url)]
    {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::Validation(format!(
                "{key} must start with http:// or https://"
            )));
        }
        if url.ends_with('/') {
            return Err(ConfigError::Validation(format!("{key} must not end with a slash")));
        }
    }

    if portal.username.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "portal.username is required (service account for the records portal)".to_string(),
        ));
    }
    if portal.password.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "portal.password is required (service account for the records portal)".to_string(),
        ));
    }

    if portal.timeout_secs == 0 || portal.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "portal.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_policy(policy: &PolicyConfig) -> Result<(), ConfigError> {
    if policy.protected_terms.iter().any(|term| term.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "policy.protected_terms must not contain empty entries".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_i64(key: &str, value: &str) -> Result<i64, ConfigError> {
    value.parse::<i64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    telegram: Option<TelegramPatch>,
    portal: Option<PortalPatch>,
    policy: Option<PolicyPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct TelegramPatch {
    bot_token: Option<String>,
    admin_bot_token: Option<String>,
    admin_chat_id: Option<i64>,
    registration_token: Option<String>,
    poll_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PortalPatch {
    web_base_url: Option<String>,
    api_base_url: Option<String>,
    username: Option<String>,
    password: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PolicyPatch {
    protected_terms: Option<Vec<String>>,
    privileged_user_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
