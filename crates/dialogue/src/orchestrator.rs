use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use kampus_core::policy::ExclusionPolicy;
use kampus_core::student::StudentDetail;
use kampus_core::text::candidate_label;
use kampus_db::repositories::{ActivityEntry, ActivityLog, AllowListStore};
use kampus_portal::PortalClient;

use crate::state::{ConversationState, Phase};

/// The end user behind an inbound event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Requester {
    pub id: i64,
    pub username: String,
}

impl Requester {
    pub fn new(id: i64, username: impl Into<String>) -> Self {
        Self { id, username: username.into() }
    }
}

/// Every dialogue outcome, ready for rendering. The orchestrator never talks
/// to the chat transport itself.
#[derive(Clone, Debug, PartialEq)]
pub enum DialogueReply {
    AccessDenied,
    QueryBlocked,
    EmptyQuery,
    LoginFailed,
    SearchFailed,
    NoResults,
    ResultList { labels: Vec<String> },
    InvalidSelection,
    RecordBlocked,
    DetailUnavailable,
    BriefDetail { detail: StudentDetail },
    FullDetail { detail: StudentDetail },
    PromptForQuery,
    StaleState,
    /// A newer action superseded this one while it was in flight; nothing to
    /// show, the late result is discarded.
    Superseded,
}

/// Drives the per-user search dialogue:
/// Idle → AwaitingResults → ResultsShown → DetailShown, with an
/// AwaitingQuery detour behind "search again".
///
/// Policy checks run at every entry point: allow-list before anything else,
/// the query-text filter before any portal call, and the record filter both
/// before the detail fetch and again on the resolved record.
pub struct Orchestrator {
    portal: Arc<dyn PortalClient>,
    allow_list: Arc<dyn AllowListStore>,
    activity: Arc<dyn ActivityLog>,
    policy: ExclusionPolicy,
    conversations: Mutex<HashMap<i64, ConversationState>>,
}

impl Orchestrator {
    pub fn new(
        portal: Arc<dyn PortalClient>,
        allow_list: Arc<dyn AllowListStore>,
        activity: Arc<dyn ActivityLog>,
        policy: ExclusionPolicy,
    ) -> Self {
        Self { portal, allow_list, activity, policy, conversations: Mutex::new(HashMap::new()) }
    }

    /// Entry point for `/cari <query>` and for free text answering the
    /// "search again" prompt.
    pub async fn submit(&self, requester: &Requester, query: &str) -> DialogueReply {
        if !self.ensure_allowed(requester, "submit").await {
            return DialogueReply::AccessDenied;
        }

        let query = query.trim();
        if query.is_empty() {
            let mut conversations = self.conversations.lock().await;
            conversations.entry(requester.id).or_default().phase = Phase::AwaitingQuery;
            return DialogueReply::EmptyQuery;
        }

        if self.policy.check_query(query, requester.id).is_blocked() {
            warn!(user_id = requester.id, "query blocked by exclusion policy");
            self.log(requester, "query_blocked", query).await;
            return DialogueReply::QueryBlocked;
        }

        let generation = {
            let mut conversations = self.conversations.lock().await;
            let state = conversations.entry(requester.id).or_default();
            state.push_history(query);
            state.begin_search()
        };

        let session = match self.portal.login().await {
            Ok(session) => session,
            Err(error) => {
                warn!(user_id = requester.id, error = %error, "portal login failed");
                self.log(requester, "login_failed", query).await;
                let mut conversations = self.conversations.lock().await;
                let state = conversations.entry(requester.id).or_default();
                if !state.is_current(generation) {
                    return DialogueReply::Superseded;
                }
                state.phase = Phase::Idle;
                return DialogueReply::LoginFailed;
            }
        };

        let candidates = match self.portal.search(query, &session).await {
            Ok(candidates) => candidates,
            Err(error) => {
                warn!(user_id = requester.id, error = %error, "portal search failed");
                self.log(requester, "search_failed", query).await;
                let mut conversations = self.conversations.lock().await;
                let state = conversations.entry(requester.id).or_default();
                if !state.is_current(generation) {
                    return DialogueReply::Superseded;
                }
                state.phase = Phase::Idle;
                return DialogueReply::SearchFailed;
            }
        };

        let mut conversations = self.conversations.lock().await;
        let state = conversations.entry(requester.id).or_default();
        if !state.is_current(generation) {
            // A newer submit or reset won the race; this session is obsolete
            // and its transport closes when `session` drops here.
            return DialogueReply::Superseded;
        }

        if candidates.is_empty() {
            state.phase = Phase::Idle;
            drop(conversations);
            self.log(requester, "search_empty", query).await;
            return DialogueReply::NoResults;
        }

        let labels = candidates
            .iter()
            .enumerate()
            .map(|(position, candidate)| {
                candidate_label(position + 1, &candidate.name, &candidate.institution)
            })
            .collect::<Vec<_>>();

        info!(user_id = requester.id, results = candidates.len(), "search produced candidates");
        state.session = Some(session);
        state.results = candidates;
        state.phase = Phase::ResultsShown;
        drop(conversations);

        self.log(requester, "search", query).await;
        DialogueReply::ResultList { labels }
    }

    /// Selection of a 1-based entry from the last emitted result list.
    pub async fn select(&self, requester: &Requester, index: usize) -> DialogueReply {
        if !self.ensure_allowed(requester, "select").await {
            return DialogueReply::AccessDenied;
        }

        let (candidate, session, generation) = {
            let mut conversations = self.conversations.lock().await;
            let state = conversations.entry(requester.id).or_default();

            if !matches!(state.phase, Phase::ResultsShown | Phase::DetailShown)
                || state.results.is_empty()
            {
                return DialogueReply::StaleState;
            }
            if index == 0 || index > state.results.len() {
                return DialogueReply::InvalidSelection;
            }
            let Some(session) = state.session.clone() else {
                return DialogueReply::StaleState;
            };

            (state.results[index - 1].clone(), session, state.generation)
        };

        if self
            .policy
            .check_record(&candidate.name, &candidate.nim, &candidate.institution, requester.id)
            .is_blocked()
        {
            warn!(user_id = requester.id, "candidate blocked by exclusion policy");
            self.log(requester, "record_blocked", &candidate.nim).await;
            return DialogueReply::RecordBlocked;
        }

        let detail = match self.portal.detail(&candidate.registration_ref, &session).await {
            Ok(detail) => detail,
            Err(error) => {
                warn!(user_id = requester.id, error = %error, "portal detail fetch failed");
                self.log(requester, "detail_failed", &candidate.registration_ref).await;
                return DialogueReply::DetailUnavailable;
            }
        };

        // The resolved record can expose attributes the candidate row did
        // not; check again before anything is displayed or cached.
        if self
            .policy
            .check_record(
                &detail.general.name,
                &detail.general.nim,
                &detail.general.institution,
                requester.id,
            )
            .is_blocked()
        {
            warn!(user_id = requester.id, "resolved record blocked by exclusion policy");
            self.log(requester, "record_blocked", &detail.general.nim).await;
            return DialogueReply::RecordBlocked;
        }

        let mut conversations = self.conversations.lock().await;
        let state = conversations.entry(requester.id).or_default();
        if !state.is_current(generation) {
            return DialogueReply::Superseded;
        }
        state.detail = Some(detail.clone());
        state.phase = Phase::DetailShown;
        drop(conversations);

        self.log(requester, "detail", &candidate.registration_ref).await;
        DialogueReply::BriefDetail { detail }
    }

    /// "View full detail": re-emits the cached record, no portal call.
    pub async fn view_full(&self, requester: &Requester) -> DialogueReply {
        if !self.ensure_allowed(requester, "view_full").await {
            return DialogueReply::AccessDenied;
        }

        let detail = {
            let mut conversations = self.conversations.lock().await;
            let state = conversations.entry(requester.id).or_default();
            if state.phase != Phase::DetailShown {
                return DialogueReply::StaleState;
            }
            match &state.detail {
                Some(detail) => detail.clone(),
                None => return DialogueReply::StaleState,
            }
        };

        if self
            .policy
            .check_record(
                &detail.general.name,
                &detail.general.nim,
                &detail.general.institution,
                requester.id,
            )
            .is_blocked()
        {
            self.log(requester, "record_blocked", &detail.general.nim).await;
            return DialogueReply::RecordBlocked;
        }

        self.log(requester, "detail_full", &detail.general.nim).await;
        DialogueReply::FullDetail { detail }
    }

    /// "Search again": wholesale reset, then prompt for free text.
    pub async fn search_again(&self, requester: &Requester) -> DialogueReply {
        if !self.ensure_allowed(requester, "search_again").await {
            return DialogueReply::AccessDenied;
        }

        {
            let mut conversations = self.conversations.lock().await;
            conversations.entry(requester.id).or_default().reset_for_new_query();
        }

        self.log(requester, "search_again", "").await;
        DialogueReply::PromptForQuery
    }

    /// Plain text is only meaningful while the user is being prompted for a
    /// query; it then re-enters the submit path with the full check chain.
    /// Everything else is `None` and left to the caller (admin notification).
    pub async fn free_text(&self, requester: &Requester, text: &str) -> Option<DialogueReply> {
        let awaiting = {
            let conversations = self.conversations.lock().await;
            conversations
                .get(&requester.id)
                .map(|state| state.phase == Phase::AwaitingQuery)
                .unwrap_or(false)
        };

        if !awaiting {
            return None;
        }

        Some(self.submit(requester, text).await)
    }

    pub async fn search_history(&self, user_id: i64) -> Vec<String> {
        let conversations = self.conversations.lock().await;
        conversations
            .get(&user_id)
            .map(|state| state.history.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn phase(&self, user_id: i64) -> Phase {
        let conversations = self.conversations.lock().await;
        conversations.get(&user_id).map(|state| state.phase).unwrap_or_default()
    }

    /// Allow-list gate. Store errors deny: an unreadable allow list must
    /// never widen access.
    async fn ensure_allowed(&self, requester: &Requester, action: &str) -> bool {
        match self.allow_list.is_allowed(requester.id).await {
            Ok(true) => true,
            Ok(false) => {
                info!(user_id = requester.id, action, "access denied");
                self.log(requester, "access_denied", action).await;
                false
            }
            Err(error) => {
                warn!(user_id = requester.id, error = %error, "allow-list lookup failed; denying");
                self.log(requester, "access_denied", "allow-list unavailable").await;
                false
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

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::sync::Mutex as StdMutex;

    use tokio::sync::Notify;

    use kampus_core::config::PolicyConfig;
    use kampus_core::policy::ExclusionPolicy;
    use kampus_core::student::{Candidate, GeneralRecord, StudentDetail};
    use kampus_db::repositories::{InMemoryActivityLog, InMemoryAllowListStore};
    use kampus_portal::{PortalClient, PortalError, PortalSession};

    use super::{DialogueReply, Orchestrator, Requester};
    use crate::state::Phase;

    const PRIVILEGED: i64 = 999;

    fn policy() -> ExclusionPolicy {
        ExclusionPolicy::new(&PolicyConfig {
            protected_terms: vec![
                "budi protected".to_string(),
                "21523023".to_string(),
                "universitas tertutup".to_string(),
            ],
            privileged_user_id: PRIVILEGED,
        })
    }

    fn fake_session() -> PortalSession {
        PortalSession::new(
            "user-ref".to_string(),
            "org-ref".to_string(),
            "token".to_string(),
            reqwest::Client::new(),
        )
    }

    fn candidate(name: &str, nim: &str, institution: &str) -> Candidate {
        Candidate {
            name: name.to_string(),
            nim: nim.to_string(),
            institution: institution.to_string(),
            registration_ref: format!("reg-{nim}"),
        }
    }

    fn detail_for(candidate: &Candidate) -> StudentDetail {
        StudentDetail {
            general: GeneralRecord {
                name: candidate.name.clone(),
                nim: candidate.nim.clone(),
                institution: candidate.institution.clone(),
                ..GeneralRecord::default()
            },
            ..StudentDetail::default()
        }
    }

    #[derive(Default)]
    struct ScriptedPortal {
        login_failures: StdMutex<VecDeque<PortalError>>,
        search_results: StdMutex<VecDeque<Result<Vec<Candidate>, PortalError>>>,
        detail_results: StdMutex<VecDeque<Result<StudentDetail, PortalError>>>,
        login_calls: AtomicUsize,
        search_calls: AtomicUsize,
        detail_calls: AtomicUsize,
        search_gate: StdMutex<Option<Arc<Notify>>>,
    }

    impl ScriptedPortal {
        fn with_search(results: Vec<Candidate>) -> Self {
            let portal = Self::default();
            portal.search_results.lock().expect("lock").push_back(Ok(results));
            portal
        }

        fn push_search(&self, results: Vec<Candidate>) {
            self.search_results.lock().expect("lock").push_back(Ok(results));
        }

        fn push_detail(&self, detail: StudentDetail) {
            self.detail_results.lock().expect("lock").push_back(Ok(detail));
        }

        fn fail_next_login(&self) {
            self.login_failures.lock().expect("lock").push_back(PortalError::Login {
                step: kampus_portal::LoginStep::SignIn,
                reason: "unexpected status 403".to_string(),
            });
        }

        fn gate_next_search(&self) -> Arc<Notify> {
            let gate = Arc::new(Notify::new());
            *self.search_gate.lock().expect("lock") = Some(gate.clone());
            gate
        }
    }

    #[async_trait::async_trait]
    impl PortalClient for ScriptedPortal {
        async fn login(&self) -> Result<PortalSession, PortalError> {
            self.login_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(failure) = self.login_failures.lock().expect("lock").pop_front() {
                return Err(failure);
            }
            Ok(fake_session())
        }

        async fn search(
            &self,
            _keyword: &str,
            _session: &PortalSession,
        ) -> Result<Vec<Candidate>, PortalError> {
            self.search_calls.fetch_add(1, Ordering::SeqCst);
            let gate = self.search_gate.lock().expect("lock").take();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            self.search_results
                .lock()
                .expect("lock")
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }

        async fn detail(
            &self,
            _registration_ref: &str,
            _session: &PortalSession,
        ) -> Result<StudentDetail, PortalError> {
            self.detail_calls.fetch_add(1, Ordering::SeqCst);
            self.detail_results.lock().expect("lock").pop_front().unwrap_or_else(|| {
                Err(PortalError::Status { operation: "detail", status: 500 })
            })
        }
    }

    struct Harness {
        orchestrator: Arc<Orchestrator>,
        portal: Arc<ScriptedPortal>,
        activity: Arc<InMemoryActivityLog>,
    }

    fn harness(portal: ScriptedPortal, allowed: &[i64]) -> Harness {
        let portal = Arc::new(portal);
        let activity = Arc::new(InMemoryActivityLog::new());
        let orchestrator = Arc::new(Orchestrator::new(
            portal.clone(),
            Arc::new(InMemoryAllowListStore::with_users(allowed)),
            activity.clone(),
            policy(),
        ));
        Harness { orchestrator, portal, activity }
    }

    fn requester(id: i64) -> Requester {
        Requester::new(id, "tester")
    }

    #[tokio::test]
    async fn blocked_keyword_never_reaches_the_portal() {
        let h = harness(ScriptedPortal::default(), &[1]);

        let reply = h.orchestrator.submit(&requester(1), "cari Budi PROTECTED dong").await;

        assert_eq!(reply, DialogueReply::QueryBlocked);
        assert_eq!(h.portal.login_calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.portal.search_calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.orchestrator.phase(1).await, Phase::Idle);
        assert!(h.activity.actions().contains(&"query_blocked".to_string()));
    }

    #[tokio::test]
    async fn protected_identifier_query_is_blocked_for_ordinary_users() {
        let h = harness(ScriptedPortal::default(), &[1]);
        let reply = h.orchestrator.submit(&requester(1), "21523023").await;
        assert_eq!(reply, DialogueReply::QueryBlocked);
        assert_eq!(h.portal.login_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unlisted_user_is_rejected_before_any_network_call() {
        let h = harness(ScriptedPortal::default(), &[1]);

        let reply = h.orchestrator.submit(&requester(2), "anything").await;
        assert_eq!(reply, DialogueReply::AccessDenied);
        let reply = h.orchestrator.select(&requester(2), 1).await;
        assert_eq!(reply, DialogueReply::AccessDenied);

        assert_eq!(h.portal.login_calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.portal.detail_calls.load(Ordering::SeqCst), 0);
        assert!(h.activity.actions().iter().any(|action| action == "access_denied"));
    }

    #[tokio::test]
    async fn login_failure_reports_and_returns_to_idle_without_search() {
        let portal = ScriptedPortal::default();
        portal.fail_next_login();
        let h = harness(portal, &[1]);

        let reply = h.orchestrator.submit(&requester(1), "Ahmad Fauzi").await;

        assert_eq!(reply, DialogueReply::LoginFailed);
        assert_eq!(h.orchestrator.phase(1).await, Phase::Idle);
        assert_eq!(h.portal.search_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_search_reports_not_found_and_returns_to_idle() {
        let h = harness(ScriptedPortal::with_search(Vec::new()), &[1]);

        let reply = h.orchestrator.submit(&requester(1), "Nama Langka").await;

        assert_eq!(reply, DialogueReply::NoResults);
        assert_eq!(h.orchestrator.phase(1).await, Phase::Idle);
        assert!(h.activity.actions().contains(&"search_empty".to_string()));
    }

    #[tokio::test]
    async fn two_candidate_scenario_emits_expected_labels_and_detail() {
        let first = candidate("Ahmad Fauzi", "2020111", "Universitas Indonesia");
        let second = candidate("Ahmad Fauzi", "2020222", "Institut Tekn. B.");
        let portal = ScriptedPortal::with_search(vec![first, second.clone()]);
        portal.push_detail(detail_for(&second));
        let h = harness(portal, &[1]);

        let reply = h.orchestrator.submit(&requester(1), "Ahmad Fauzi").await;
        let DialogueReply::ResultList { labels } = reply else {
            panic!("expected result list, got {reply:?}");
        };
        assert_eq!(
            labels,
            vec![
                "1. Ahmad Fauzi (Univ. Indonesia)".to_string(),
                "2. Ahmad Fauzi (Inst. Tekn. B.)".to_string(),
            ]
        );

        let reply = h.orchestrator.select(&requester(1), 2).await;
        let DialogueReply::BriefDetail { detail } = reply else {
            panic!("expected brief detail, got {reply:?}");
        };
        assert_eq!(detail.general.nim, "2020222");
        assert_eq!(h.orchestrator.phase(1).await, Phase::DetailShown);
    }

    #[tokio::test]
    async fn selection_is_one_based_and_bounds_checked() {
        let portal =
            ScriptedPortal::with_search(vec![candidate("Siti", "1", "Universitas Indonesia")]);
        let h = harness(portal, &[1]);

        h.orchestrator.submit(&requester(1), "Siti").await;

        assert_eq!(h.orchestrator.select(&requester(1), 0).await, DialogueReply::InvalidSelection);
        assert_eq!(h.orchestrator.select(&requester(1), 2).await, DialogueReply::InvalidSelection);
        assert_eq!(h.orchestrator.phase(1).await, Phase::ResultsShown);
    }

    #[tokio::test]
    async fn protected_candidate_is_blocked_even_when_query_was_clean() {
        let protected = candidate("Budi Protected", "21523023", "Universitas Tertutup");
        let portal = ScriptedPortal::with_search(vec![protected]);
        let h = harness(portal, &[1]);

        h.orchestrator.submit(&requester(1), "budi").await;
        let reply = h.orchestrator.select(&requester(1), 1).await;

        assert_eq!(reply, DialogueReply::RecordBlocked);
        assert_eq!(h.portal.detail_calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.orchestrator.phase(1).await, Phase::ResultsShown);
    }

    #[tokio::test]
    async fn resolved_detail_is_rechecked_after_the_fetch() {
        // The candidate row looks harmless; the resolved record is protected.
        let masked = candidate("B. P.", "11111111", "Universitas Terbuka");
        let portal = ScriptedPortal::with_search(vec![masked.clone()]);
        portal.push_detail(StudentDetail {
            general: GeneralRecord {
                name: "Budi Protected".to_string(),
                nim: masked.nim.clone(),
                institution: masked.institution.clone(),
                ..GeneralRecord::default()
            },
            ..StudentDetail::default()
        });
        let h = harness(portal, &[1]);

        h.orchestrator.submit(&requester(1), "B. P.").await;
        let reply = h.orchestrator.select(&requester(1), 1).await;

        assert_eq!(reply, DialogueReply::RecordBlocked);
        assert_eq!(h.portal.detail_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn privileged_user_bypasses_exclusions() {
        let protected = candidate("Budi Protected", "21523023", "Universitas Tertutup");
        let portal = ScriptedPortal::with_search(vec![protected.clone()]);
        portal.push_detail(detail_for(&protected));
        let h = harness(portal, &[PRIVILEGED]);

        let reply = h.orchestrator.submit(&requester(PRIVILEGED), "budi protected").await;
        assert!(matches!(reply, DialogueReply::ResultList { .. }));

        let reply = h.orchestrator.select(&requester(PRIVILEGED), 1).await;
        assert!(matches!(reply, DialogueReply::BriefDetail { .. }));
    }

    #[tokio::test]
    async fn view_full_is_idempotent_and_makes_no_second_fetch() {
        let selected = candidate("Siti", "22", "Universitas Indonesia");
        let portal = ScriptedPortal::with_search(vec![selected.clone()]);
        portal.push_detail(detail_for(&selected));
        let h = harness(portal, &[1]);

        h.orchestrator.submit(&requester(1), "Siti").await;
        h.orchestrator.select(&requester(1), 1).await;

        let first = h.orchestrator.view_full(&requester(1)).await;
        let second = h.orchestrator.view_full(&requester(1)).await;

        assert_eq!(first, second);
        assert!(matches!(first, DialogueReply::FullDetail { .. }));
        assert_eq!(h.portal.detail_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_detail_keeps_results_available() {
        let selected = candidate("Siti", "22", "Universitas Indonesia");
        let portal = ScriptedPortal::with_search(vec![selected]);
        // No scripted detail: the fake reports status 500.
        let h = harness(portal, &[1]);

        h.orchestrator.submit(&requester(1), "Siti").await;
        let reply = h.orchestrator.select(&requester(1), 1).await;

        assert_eq!(reply, DialogueReply::DetailUnavailable);
        assert_eq!(h.orchestrator.phase(1).await, Phase::ResultsShown);

        // The list is still selectable.
        h.portal.push_detail(StudentDetail::default());
        let retry = h.orchestrator.select(&requester(1), 1).await;
        assert!(matches!(retry, DialogueReply::BriefDetail { .. }));
    }

    #[tokio::test]
    async fn search_again_resets_and_free_text_reenters_with_checks() {
        let selected = candidate("Siti", "22", "Universitas Indonesia");
        let portal = ScriptedPortal::with_search(vec![selected.clone()]);
        portal.push_detail(detail_for(&selected));
        let h = harness(portal, &[1]);

        h.orchestrator.submit(&requester(1), "Siti").await;
        h.orchestrator.select(&requester(1), 1).await;

        let reply = h.orchestrator.search_again(&requester(1)).await;
        assert_eq!(reply, DialogueReply::PromptForQuery);
        assert_eq!(h.orchestrator.phase(1).await, Phase::AwaitingQuery);

        // Free text while prompted goes through the same policy gate as
        // `/cari`: a protected term is still refused.
        let reply = h.orchestrator.free_text(&requester(1), "budi protected").await;
        assert_eq!(reply, Some(DialogueReply::QueryBlocked));

        // Unsolicited free text (not prompted) is not a query.
        let h2 = harness(ScriptedPortal::default(), &[1]);
        assert_eq!(h2.orchestrator.free_text(&requester(1), "halo").await, None);
    }

    #[tokio::test]
    async fn history_is_bounded_to_ten_most_recent() {
        let portal = ScriptedPortal::default();
        for _ in 0..12 {
            portal.push_search(Vec::new());
        }
        let h = harness(portal, &[1]);

        for index in 0..12 {
            h.orchestrator.submit(&requester(1), &format!("query-{index}")).await;
        }

        let history = h.orchestrator.search_history(1).await;
        assert_eq!(history.len(), 10);
        assert_eq!(history.first().map(String::as_str), Some("query-2"));
        assert_eq!(history.last().map(String::as_str), Some("query-11"));
    }

    #[tokio::test]
    async fn newer_reset_supersedes_an_in_flight_search() {
        let portal = ScriptedPortal::default();
        let gate = portal.gate_next_search();
        portal.push_search(vec![candidate("Siti", "22", "Universitas Indonesia")]);
        let h = harness(portal, &[1]);

        let orchestrator = h.orchestrator.clone();
        let in_flight =
            tokio::spawn(async move { orchestrator.submit(&requester(1), "Siti").await });

        // Let the submit reach the gated search, then reset underneath it.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        h.orchestrator.search_again(&requester(1)).await;
        gate.notify_one();

        let reply = in_flight.await.expect("task");
        assert_eq!(reply, DialogueReply::Superseded);
        assert_eq!(h.orchestrator.phase(1).await, Phase::AwaitingQuery);
        assert!(h.orchestrator.search_history(1).await.contains(&"Siti".to_string()));
    }
}
