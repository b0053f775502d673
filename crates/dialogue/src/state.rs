use std::collections::VecDeque;

use kampus_core::student::{Candidate, StudentDetail};
use kampus_portal::PortalSession;

pub const SEARCH_HISTORY_LIMIT: usize = 10;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    /// Login plus search in flight for this user.
    AwaitingResults,
    ResultsShown,
    DetailShown,
    /// "Search again" was pressed; the next plain-text message is the query.
    AwaitingQuery,
}

/// Everything the bot remembers about one end user, in memory only.
///
/// The cached detail is only ever written after the candidate it came from
/// passed the exclusion policy; the generation counter ties in-flight portal
/// work to the state that started it, so a newer search supersedes an older
/// one simply by bumping it.
#[derive(Debug, Default)]
pub struct ConversationState {
    pub phase: Phase,
    pub session: Option<PortalSession>,
    pub results: Vec<Candidate>,
    pub detail: Option<StudentDetail>,
    pub history: VecDeque<String>,
    pub generation: u64,
}

impl ConversationState {
    /// Starts a new search: discards the previous session (dropping it closes
    /// its transport), clears results and detail, and returns the generation
    /// that the upcoming login/search round must present to commit its
    /// outcome. The search history survives; it tracks the user, not the
    /// session.
    pub fn begin_search(&mut self) -> u64 {
        self.generation += 1;
        self.phase = Phase::AwaitingResults;
        self.session = None;
        self.results.clear();
        self.detail = None;
        self.generation
    }

    /// "Search again": full reset back to the free-text prompt.
    pub fn reset_for_new_query(&mut self) {
        self.generation += 1;
        self.phase = Phase::AwaitingQuery;
        self.session = None;
        self.results.clear();
        self.detail = None;
    }

    pub fn push_history(&mut self, query: &str) {
        self.history.push_back(query.to_owned());
        while self.history.len() > SEARCH_HISTORY_LIMIT {
            self.history.pop_front();
        }
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }
}
