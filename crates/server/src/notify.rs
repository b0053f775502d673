use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use kampus_telegram::api::TelegramApi;
use kampus_telegram::render;

/// Fans every student-bot interaction out to the operator chat through the
/// admin bot. Notification failures are logged and swallowed; the user-facing
/// flow must never depend on the operator channel being up.
pub struct AdminNotifier {
    api: Arc<dyn TelegramApi>,
    admin_chat_id: i64,
}

impl AdminNotifier {
    pub fn new(api: Arc<dyn TelegramApi>, admin_chat_id: i64) -> Self {
        Self { api, admin_chat_id }
    }

    pub async fn notify(&self, user_id: i64, username: &str, activity: &str) {
        let message = render::admin_notification(user_id, username, activity, Utc::now());
        if let Err(error) = self.api.send_message(self.admin_chat_id, &message).await {
            warn!(
                event_name = "egress.admin_notification_failed",
                user_id,
                error = %error,
                "failed to deliver admin notification"
            );
        }
    }
}
