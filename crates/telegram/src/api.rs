use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::keyboard::OutboundMessage;

const BOT_API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("bot api transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("bot api returned status {0}")]
    Status(u16),
    #[error("bot api rejected the request: {description}")]
    Api { description: String },
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub photo: Option<serde_json::Value>,
    #[serde(default)]
    pub document: Option<serde_json::Value>,
    #[serde(default)]
    pub voice: Option<serde_json::Value>,
    #[serde(default)]
    pub video: Option<serde_json::Value>,
    #[serde(default)]
    pub sticker: Option<serde_json::Value>,
    #[serde(default)]
    pub location: Option<serde_json::Value>,
    #[serde(default)]
    pub contact: Option<serde_json::Value>,
    #[serde(default)]
    pub animation: Option<serde_json::Value>,
    #[serde(default)]
    pub audio: Option<serde_json::Value>,
}

impl Message {
    /// Human-readable one-liner used in admin notifications, covering the
    /// non-text message kinds the bot does not otherwise process.
    pub fn summary(&self) -> String {
        let caption = || self.caption.clone().unwrap_or_else(|| "no caption".to_string());
        if let Some(text) = &self.text {
            return text.clone();
        }
        if self.photo.is_some() {
            return format!("[Photo] {}", caption());
        }
        if self.document.is_some() {
            return "[Document]".to_string();
        }
        if self.voice.is_some() {
            return "[Voice Message]".to_string();
        }
        if self.video.is_some() {
            return format!("[Video] {}", caption());
        }
        if self.sticker.is_some() {
            return "[Sticker]".to_string();
        }
        if self.location.is_some() {
            return "[Location]".to_string();
        }
        if self.contact.is_some() {
            return "[Contact]".to_string();
        }
        if self.animation.is_some() {
            return "[Animation]".to_string();
        }
        if self.audio.is_some() {
            return "[Audio]".to_string();
        }
        "Unknown message".to_string()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
}

impl User {
    pub fn display_name(&self) -> String {
        self.username
            .clone()
            .or_else(|| self.first_name.clone())
            .unwrap_or_else(|| "Unknown".to_string())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

/// The outbound/inbound Bot API surface the runners need. Kept minimal so
/// tests can script it.
#[async_trait]
pub trait TelegramApi: Send + Sync {
    async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TelegramError>;

    async fn send_message(
        &self,
        chat_id: i64,
        message: &OutboundMessage,
    ) -> Result<(), TelegramError>;

    async fn answer_callback_query(&self, callback_query_id: &str) -> Result<(), TelegramError>;
}

pub struct HttpTelegramApi {
    base_url: String,
    token: SecretString,
    http: reqwest::Client,
}

impl HttpTelegramApi {
    pub fn new(token: SecretString, poll_timeout_secs: u64) -> Result<Self, TelegramError> {
        Self::with_base_url(BOT_API_BASE.to_string(), token, poll_timeout_secs)
    }

    pub fn with_base_url(
        base_url: String,
        token: SecretString,
        poll_timeout_secs: u64,
    ) -> Result<Self, TelegramError> {
        // The request timeout must outlive the long-poll hold time.
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(poll_timeout_secs + 15))
            .build()?;
        Ok(Self { base_url, token, http })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.base_url, self.token.expose_secret())
    }

    async fn call(&self, method: &str, body: serde_json::Value) -> Result<serde_json::Value, TelegramError> {
        let response = self.http.post(self.method_url(method)).json(&body).send().await?;
        let status = response.status();
        let envelope: ApiEnvelope = response
            .json()
            .await
            .map_err(|_| TelegramError::Status(status.as_u16()))?;

        if !envelope.ok {
            return Err(TelegramError::Api {
                description: envelope
                    .description
                    .unwrap_or_else(|| format!("status {}", status.as_u16())),
            });
        }

        Ok(envelope.result.unwrap_or(serde_json::Value::Null))
    }
}

#[async_trait]
impl TelegramApi for HttpTelegramApi {
    async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TelegramError> {
        let mut body = json!({
            "timeout": timeout_secs,
            "allowed_updates": ["message", "callback_query"],
        });
        if let Some(offset) = offset {
            body["offset"] = json!(offset);
        }

        let result = self.call("getUpdates", body).await?;
        serde_json::from_value(result)
            .map_err(|error| TelegramError::Api { description: error.to_string() })
    }

    async fn send_message(
        &self,
        chat_id: i64,
        message: &OutboundMessage,
    ) -> Result<(), TelegramError> {
        let mut body = json!({
            "chat_id": chat_id,
            "text": message.text,
        });
        if let Some(parse_mode) = &message.parse_mode {
            body["parse_mode"] = json!(parse_mode.as_str());
        }
        if let Some(keyboard) = &message.keyboard {
            body["reply_markup"] = serde_json::to_value(keyboard)
                .map_err(|error| TelegramError::Api { description: error.to_string() })?;
        }

        self.call("sendMessage", body).await.map(|_| ())
    }

    async fn answer_callback_query(&self, callback_query_id: &str) -> Result<(), TelegramError> {
        self.call("answerCallbackQuery", json!({ "callback_query_id": callback_query_id }))
            .await
            .map(|_| ())
    }
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    ok: bool,
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    description: Option<String>,
}
