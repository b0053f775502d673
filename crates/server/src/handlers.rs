use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, warn};

use kampus_db::repositories::{ActivityEntry, ActivityLog, AllowListStore};
use kampus_dialogue::{DialogueReply, Orchestrator, Requester};
use kampus_telegram::api::{CallbackQuery, Message, TelegramApi, Update};
use kampus_telegram::commands::{parse_callback, parse_command, BotCommand, CallbackAction};
use kampus_telegram::keyboard::OutboundMessage;
use kampus_telegram::poller::UpdateHandler;
use kampus_telegram::render;

use crate::notify::AdminNotifier;

/// Student-facing front-end: routes commands and button presses into the
/// dialogue orchestrator and renders its replies. Every inbound message also
/// produces one admin notification.
pub struct StudentBotHandler {
    orchestrator: Arc<Orchestrator>,
    api: Arc<dyn TelegramApi>,
    notifier: Arc<AdminNotifier>,
    allow_list: Arc<dyn AllowListStore>,
    activity: Arc<dyn ActivityLog>,
    registration_token: SecretString,
}

impl StudentBotHandler {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        api: Arc<dyn TelegramApi>,
        notifier: Arc<AdminNotifier>,
        allow_list: Arc<dyn AllowListStore>,
        activity: Arc<dyn ActivityLog>,
        registration_token: SecretString,
    ) -> Self {
        Self { orchestrator, api, notifier, allow_list, activity, registration_token }
    }

    async fn handle_message(&self, message: Message) {
        let Some(user) = message.from.clone() else {
            return;
        };
        let requester = Requester::new(user.id, user.display_name());
        let chat_id = message.chat.id;

        self.notifier.notify(requester.id, &requester.username, &message.summary()).await;

        let Some(text) = message.text.as_deref() else {
            return;
        };

        match parse_command(text) {
            Some(BotCommand::Start) => {
                self.send(chat_id, vec![render::usage_message()]).await;
            }
            Some(BotCommand::Search { query }) => {
                let reply = self.orchestrator.submit(&requester, &query).await;
                self.send(chat_id, render_reply(reply)).await;
            }
            Some(BotCommand::Register { token }) => {
                self.handle_registration(&requester, chat_id, &token).await;
            }
            Some(other) => {
                debug!(user_id = requester.id, command = ?other, "command not for this bot");
            }
            None => {
                // Plain text only matters while the user is being prompted
                // for a new query; anything else was already notified above.
                if let Some(reply) = self.orchestrator.free_text(&requester, text).await {
                    self.send(chat_id, render_reply(reply)).await;
                }
            }
        }
    }

    async fn handle_callback(&self, callback: CallbackQuery) {
        if let Err(error) = self.api.answer_callback_query(&callback.id).await {
            warn!(error = %error, "failed to answer callback query");
        }

        let requester = Requester::new(callback.from.id, callback.from.display_name());
        let chat_id =
            callback.message.as_ref().map(|message| message.chat.id).unwrap_or(requester.id);

        let Some(action) = callback.data.as_deref().and_then(parse_callback) else {
            debug!(user_id = requester.id, data = ?callback.data, "unrecognized callback payload");
            return;
        };

        let reply = match action {
            CallbackAction::SelectCandidate(index) => {
                self.orchestrator.select(&requester, index).await
            }
            CallbackAction::ViewFullDetail => self.orchestrator.view_full(&requester).await,
            CallbackAction::SearchAgain => self.orchestrator.search_again(&requester).await,
        };

        self.send(chat_id, render_reply(reply)).await;
    }

    async fn handle_registration(&self, requester: &Requester, chat_id: i64, token: &str) {
        if token.trim().is_empty() || token.trim() != self.registration_token.expose_secret() {
            self.send(chat_id, vec![render::registration_invalid_message()]).await;
            return;
        }

        match self.allow_list.add(requester.id, Some(&requester.username)).await {
            Ok(true) => {
                self.log(requester, "register", "self-registration").await;
                self.notifier
                    .notify(
                        requester.id,
                        &requester.username,
                        &format!("New user registration: {} (ID: {})", requester.username, requester.id),
                    )
                    .await;
                self.send(chat_id, vec![render::registration_success_message()]).await;
            }
            Ok(false) => {
                self.send(chat_id, vec![render::registration_duplicate_message()]).await;
            }
            Err(error) => {
                warn!(user_id = requester.id, error = %error, "registration write failed");
                self.send(chat_id, vec![render::search_failed_message()]).await;
            }
        }
    }

    async fn send(&self, chat_id: i64, messages: Vec<OutboundMessage>) {
        for message in messages {
            if let Err(error) = self.api.send_message(chat_id, &message).await {
                warn!(chat_id, error = %error, "failed to send reply");
            }
        }
    }

    async fn log(&self, requester: &Requester, action: &str, details: &str) {
        let entry = ActivityEntry {
            recorded_at: Utc::now(),
            user_id: requester.id,
            username: requester.username.clone(),
            action: action.to_string(),
            details: details.to_string(),
        };
        if let Err(error) = self.activity.record(entry).await {
            warn!(error = %error, "activity log write failed");
        }
    }
}

#[async_trait]
impl UpdateHandler for StudentBotHandler {
    async fn handle(&self, update: Update) {
        if let Some(message) = update.message {
            self.handle_message(message).await;
        } else if let Some(callback) = update.callback_query {
            self.handle_callback(callback).await;
        }
    }
}

fn render_reply(reply: DialogueReply) -> Vec<OutboundMessage> {
    match reply {
        DialogueReply::AccessDenied => vec![render::access_denied_message()],
        DialogueReply::QueryBlocked | DialogueReply::RecordBlocked => {
            vec![render::blocked_warning_message()]
        }
        DialogueReply::EmptyQuery => vec![render::empty_query_message()],
        DialogueReply::LoginFailed => vec![render::login_failed_message()],
        DialogueReply::SearchFailed => vec![render::search_failed_message()],
        DialogueReply::NoResults => vec![render::not_found_message()],
        DialogueReply::ResultList { labels } => vec![render::results_message(&labels)],
        DialogueReply::InvalidSelection | DialogueReply::StaleState => {
            vec![render::stale_state_message()]
        }
        DialogueReply::DetailUnavailable => vec![render::detail_failed_message()],
        DialogueReply::BriefDetail { detail } => vec![render::brief_detail_message(&detail)],
        DialogueReply::FullDetail { detail } => render::full_detail_messages(&detail),
        DialogueReply::PromptForQuery => vec![render::prompt_search_message()],
        DialogueReply::Superseded => Vec::new(),
    }
}

/// Operator-facing front-end: allow-list CRUD and log inspection, restricted
/// to the configured operator identity.
pub struct AdminBotHandler {
    api: Arc<dyn TelegramApi>,
    allow_list: Arc<dyn AllowListStore>,
    activity: Arc<dyn ActivityLog>,
    operator_id: i64,
}

impl AdminBotHandler {
    pub fn new(
        api: Arc<dyn TelegramApi>,
        allow_list: Arc<dyn AllowListStore>,
        activity: Arc<dyn ActivityLog>,
        operator_id: i64,
    ) -> Self {
        Self { api, allow_list, activity, operator_id }
    }

    async fn handle_message(&self, message: Message) {
        let Some(user) = message.from.clone() else {
            return;
        };
        let chat_id = message.chat.id;

        if user.id != self.operator_id {
            self.send(chat_id, render::access_denied_message()).await;
            return;
        }

        let requester = Requester::new(user.id, user.display_name());
        let Some(command) = message.text.as_deref().and_then(parse_command) else {
            return;
        };

        match command {
            BotCommand::Start => {
                self.send(chat_id, admin_help_message()).await;
            }
            BotCommand::AddUser { user_id, username } => {
                match self.allow_list.add(user_id, username.as_deref()).await {
                    Ok(true) => {
                        self.log(&requester, "add_user", &format!("added user {user_id}")).await;
                        self.send(
                            chat_id,
                            OutboundMessage::plain(format!(
                                "✅ Pengguna dengan ID {user_id} berhasil ditambahkan."
                            )),
                        )
                        .await;
                    }
                    Ok(false) => {
                        self.send(chat_id, OutboundMessage::plain("❌ Pengguna sudah terdaftar."))
                            .await;
                    }
                    Err(error) => {
                        warn!(error = %error, "allow-list add failed");
                        self.send(chat_id, store_error_message()).await;
                    }
                }
            }
            BotCommand::RemoveUser { user_id } => {
                match self.allow_list.remove(user_id).await {
                    Ok(true) => {
                        self.log(&requester, "remove_user", &format!("removed user {user_id}"))
                            .await;
                        self.send(
                            chat_id,
                            OutboundMessage::plain(format!(
                                "✅ Pengguna dengan ID {user_id} berhasil dihapus."
                            )),
                        )
                        .await;
                    }
                    Ok(false) => {
                        self.send(chat_id, OutboundMessage::plain("❌ Pengguna tidak ditemukan."))
                            .await;
                    }
                    Err(error) => {
                        warn!(error = %error, "allow-list remove failed");
                        self.send(chat_id, store_error_message()).await;
                    }
                }
            }
            BotCommand::ListUsers => match self.allow_list.list().await {
                Ok(users) if users.is_empty() => {
                    self.send(
                        chat_id,
                        OutboundMessage::plain("📝 Belum ada pengguna yang diizinkan."),
                    )
                    .await;
                }
                Ok(users) => {
                    let mut text = String::from("📋 *Daftar Pengguna yang Diizinkan:*\n\n");
                    for user in users {
                        text.push_str(&format!("• ID: `{}`\n", user.id));
                        text.push_str(&format!(
                            "  Username: @{}\n",
                            user.username.as_deref().unwrap_or("N/A")
                        ));
                        text.push_str(&format!(
                            "  Ditambahkan: {}\n\n",
                            user.added_at.format("%Y-%m-%d %H:%M:%S")
                        ));
                    }
                    self.send(chat_id, OutboundMessage::markdown(text)).await;
                }
                Err(error) => {
                    warn!(error = %error, "allow-list read failed");
                    self.send(chat_id, store_error_message()).await;
                }
            },
            BotCommand::Logs => match self.activity.recent(10).await {
                Ok(entries) if entries.is_empty() => {
                    self.send(chat_id, OutboundMessage::plain("📝 Belum ada log aktivitas."))
                        .await;
                }
                Ok(entries) => {
                    let mut text = String::from("📋 10 log aktivitas terakhir:\n\n");
                    for entry in entries {
                        text.push_str(&format!(
                            "Waktu: {}\nUser ID: {}\nUsername: {}\nAksi: {}\n",
                            entry.recorded_at.format("%Y-%m-%d %H:%M:%S"),
                            entry.user_id,
                            entry.username,
                            entry.action,
                        ));
                        if !entry.details.is_empty() {
                            text.push_str(&format!("Detail: {}\n", entry.details));
                        }
                        text.push_str("-------------------\n");
                    }
                    self.log(&requester, "view_logs", "viewed recent logs").await;
                    self.send(chat_id, OutboundMessage::plain(text)).await;
                }
                Err(error) => {
                    warn!(error = %error, "activity log read failed");
                    self.send(chat_id, store_error_message()).await;
                }
            },
            BotCommand::ChatId => {
                self.send(
                    chat_id,
                    OutboundMessage::markdown(format!("Your chat ID is: `{chat_id}`")),
                )
                .await;
            }
            BotCommand::Invalid { usage } => {
                self.send(chat_id, OutboundMessage::plain(format!("❌ Gunakan format: {usage}")))
                    .await;
            }
            other => {
                debug!(command = ?other, "command not for the admin bot");
            }
        }
    }

    async fn send(&self, chat_id: i64, message: OutboundMessage) {
        if let Err(error) = self.api.send_message(chat_id, &message).await {
            warn!(chat_id, error = %error, "failed to send admin reply");
        }
    }

    async fn log(&self, requester: &Requester, action: &str, details: &str) {
        let entry = ActivityEntry {
            recorded_at: Utc::now(),
            user_id: requester.id,
            username: requester.username.clone(),
            action: action.to_string(),
            details: details.to_string(),
        };
        if let Err(error) = self.activity.record(entry).await {
            warn!(error = %error, "activity log write failed");
        }
    }
}

#[async_trait]
impl UpdateHandler for AdminBotHandler {
    async fn handle(&self, update: Update) {
        if let Some(message) = update.message {
            self.handle_message(message).await;
        }
    }
}

fn admin_help_message() -> OutboundMessage {
    OutboundMessage::plain(
        "👋 Admin Bot\n\n\
         🔑 Perintah:\n\
         ➕ /add <user_id> [username] - Tambah pengguna\n\
         ❌ /remove <user_id> - Cabut akses\n\
         📋 /list - Daftar pengguna\n\
         📊 /logs - Log aktivitas terakhir\n\
         🆔 /chatid - ID chat ini",
    )
}

fn store_error_message() -> OutboundMessage {
    OutboundMessage::plain("❌ Terjadi kesalahan saat mengakses penyimpanan.")
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use secrecy::SecretString;

    use kampus_core::config::PolicyConfig;
    use kampus_core::policy::ExclusionPolicy;
    use kampus_core::student::{Candidate, StudentDetail};
    use kampus_db::repositories::{AllowListStore, InMemoryActivityLog, InMemoryAllowListStore};
    use kampus_dialogue::Orchestrator;
    use kampus_portal::{PortalClient, PortalError, PortalSession};
    use kampus_telegram::api::{CallbackQuery, Chat, Message, TelegramApi, TelegramError, Update, User};
    use kampus_telegram::keyboard::OutboundMessage;
    use kampus_telegram::poller::UpdateHandler;

    use super::{AdminBotHandler, StudentBotHandler};
    use crate::notify::AdminNotifier;

    const OPERATOR: i64 = 500;

    #[derive(Default)]
    struct CapturingApi {
        sent: Mutex<Vec<(i64, OutboundMessage)>>,
    }

    impl CapturingApi {
        fn sent(&self) -> Vec<(i64, OutboundMessage)> {
            self.sent.lock().expect("sent lock").clone()
        }

        fn texts_for(&self, chat_id: i64) -> Vec<String> {
            self.sent()
                .into_iter()
                .filter(|(chat, _)| *chat == chat_id)
                .map(|(_, message)| message.text)
                .collect()
        }
    }

    #[async_trait]
    impl TelegramApi for CapturingApi {
        async fn get_updates(
            &self,
            _offset: Option<i64>,
            _timeout_secs: u64,
        ) -> Result<Vec<Update>, TelegramError> {
            Ok(Vec::new())
        }

        async fn send_message(
            &self,
            chat_id: i64,
            message: &OutboundMessage,
        ) -> Result<(), TelegramError> {
            self.sent.lock().expect("sent lock").push((chat_id, message.clone()));
            Ok(())
        }

        async fn answer_callback_query(&self, _id: &str) -> Result<(), TelegramError> {
            Ok(())
        }
    }

    struct EmptyPortal;

    #[async_trait]
    impl PortalClient for EmptyPortal {
        async fn login(&self) -> Result<PortalSession, PortalError> {
            Ok(PortalSession::new(
                "u".to_string(),
                "o".to_string(),
                "t".to_string(),
                reqwest::Client::new(),
            ))
        }

        async fn search(
            &self,
            _keyword: &str,
            _session: &PortalSession,
        ) -> Result<Vec<Candidate>, PortalError> {
            Ok(Vec::new())
        }

        async fn detail(
            &self,
            _registration_ref: &str,
            _session: &PortalSession,
        ) -> Result<StudentDetail, PortalError> {
            Ok(StudentDetail::default())
        }
    }

    fn policy() -> ExclusionPolicy {
        ExclusionPolicy::new(&PolicyConfig {
            protected_terms: vec!["rahasia".to_string()],
            privileged_user_id: 999,
        })
    }

    struct StudentHarness {
        handler: StudentBotHandler,
        student_api: Arc<CapturingApi>,
        admin_api: Arc<CapturingApi>,
        allow_list: Arc<InMemoryAllowListStore>,
    }

    fn student_harness(allowed: &[i64]) -> StudentHarness {
        let student_api = Arc::new(CapturingApi::default());
        let admin_api = Arc::new(CapturingApi::default());
        let allow_list = Arc::new(InMemoryAllowListStore::with_users(allowed));
        let activity = Arc::new(InMemoryActivityLog::new());
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::new(EmptyPortal),
            allow_list.clone(),
            activity.clone(),
            policy(),
        ));
        let notifier = Arc::new(AdminNotifier::new(admin_api.clone(), OPERATOR));

        StudentHarness {
            handler: StudentBotHandler::new(
                orchestrator,
                student_api.clone(),
                notifier,
                allow_list.clone(),
                activity,
                SecretString::from("invite-me".to_string()),
            ),
            student_api,
            admin_api,
            allow_list,
        }
    }

    fn text_update(user_id: i64, text: &str) -> Update {
        Update {
            update_id: 1,
            message: Some(Message {
                message_id: 1,
                from: Some(User {
                    id: user_id,
                    username: Some("tester".to_string()),
                    first_name: None,
                }),
                chat: Chat { id: user_id },
                text: Some(text.to_string()),
                ..Message::default()
            }),
            callback_query: None,
        }
    }

    fn callback_update(user_id: i64, data: &str) -> Update {
        Update {
            update_id: 2,
            message: None,
            callback_query: Some(CallbackQuery {
                id: "cb".to_string(),
                from: User { id: user_id, username: Some("tester".to_string()), first_name: None },
                message: Some(Message {
                    message_id: 3,
                    from: None,
                    chat: Chat { id: user_id },
                    ..Message::default()
                }),
                data: Some(data.to_string()),
            }),
        }
    }

    #[tokio::test]
    async fn unlisted_user_gets_restriction_and_admin_is_notified() {
        let h = student_harness(&[]);

        h.handler.handle(text_update(42, "/cari Ahmad")).await;

        let replies = h.student_api.texts_for(42);
        assert!(replies.iter().any(|text| text.contains("Akses Terbatas")));
        let notifications = h.admin_api.texts_for(OPERATOR);
        assert_eq!(notifications.len(), 1);
        assert!(notifications[0].contains("/cari Ahmad"));
    }

    #[tokio::test]
    async fn start_replies_with_usage_without_allow_check() {
        let h = student_harness(&[]);
        h.handler.handle(text_update(42, "/start")).await;
        assert!(h.student_api.texts_for(42).iter().any(|text| text.contains("/cari")));
    }

    #[tokio::test]
    async fn registration_with_valid_token_adds_user() {
        let h = student_harness(&[]);

        h.handler.handle(text_update(42, "/regist invite-me")).await;

        assert!(h.allow_list.is_allowed(42).await.expect("is_allowed"));
        assert!(h
            .student_api
            .texts_for(42)
            .iter()
            .any(|text| text.contains("Registrasi berhasil")));
    }

    #[tokio::test]
    async fn registration_with_wrong_token_is_rejected() {
        let h = student_harness(&[]);

        h.handler.handle(text_update(42, "/regist wrong")).await;

        assert!(!h.allow_list.is_allowed(42).await.expect("is_allowed"));
        assert!(h
            .student_api
            .texts_for(42)
            .iter()
            .any(|text| text.contains("Token registrasi salah")));
    }

    #[tokio::test]
    async fn allowed_user_search_with_no_hits_reports_not_found() {
        let h = student_harness(&[42]);

        h.handler.handle(text_update(42, "/cari Nama Langka")).await;

        assert!(h
            .student_api
            .texts_for(42)
            .iter()
            .any(|text| text.contains("Tidak ada mahasiswa ditemukan")));
    }

    #[tokio::test]
    async fn stale_callback_reports_reset_hint() {
        let h = student_harness(&[42]);

        h.handler.handle(callback_update(42, "select.1")).await;

        assert!(h
            .student_api
            .texts_for(42)
            .iter()
            .any(|text| text.contains("Silakan cari ulang")));
    }

    fn admin_harness() -> (AdminBotHandler, Arc<CapturingApi>, Arc<InMemoryAllowListStore>) {
        let api = Arc::new(CapturingApi::default());
        let allow_list = Arc::new(InMemoryAllowListStore::new());
        let activity = Arc::new(InMemoryActivityLog::new());
        let handler =
            AdminBotHandler::new(api.clone(), allow_list.clone(), activity, OPERATOR);
        (handler, api, allow_list)
    }

    #[tokio::test]
    async fn non_operator_is_rejected_by_admin_bot() {
        let (handler, api, allow_list) = admin_harness();

        handler.handle(text_update(42, "/add 77")).await;

        assert!(!allow_list.is_allowed(77).await.expect("is_allowed"));
        assert!(api.texts_for(42).iter().any(|text| text.contains("Akses Terbatas")));
    }

    #[tokio::test]
    async fn operator_can_add_list_and_remove_users() {
        let (handler, api, allow_list) = admin_harness();

        handler.handle(text_update(OPERATOR, "/add 77 dina")).await;
        assert!(allow_list.is_allowed(77).await.expect("is_allowed"));

        handler.handle(text_update(OPERATOR, "/list")).await;
        assert!(api.texts_for(OPERATOR).iter().any(|text| text.contains("`77`")));

        handler.handle(text_update(OPERATOR, "/remove 77")).await;
        assert!(!allow_list.is_allowed(77).await.expect("is_allowed"));
    }

    #[tokio::test]
    async fn malformed_add_shows_usage() {
        let (handler, api, _) = admin_harness();
        handler.handle(text_update(OPERATOR, "/add banana")).await;
        assert!(api
            .texts_for(OPERATOR)
            .iter()
            .any(|text| text.contains("/add <user_id> [username]")));
    }
}
