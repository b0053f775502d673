use crate::config::PolicyConfig;

/// Why a query or record was blocked. The orchestrator maps each variant to
/// one user-visible warning and an activity-log action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExclusionMatch {
    QueryTerm { term: String },
    RecordName,
    RecordIdentifier,
    RecordInstitution,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PolicyDecision {
    Allow,
    Block(ExclusionMatch),
}

impl PolicyDecision {
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Block(_))
    }
}

/// Hard exclusion filter over protected records.
///
/// The query-text check catches obviously targeted searches early; the record
/// check runs again on every resolved candidate and detail because a search
/// can match protected records through attributes that never appear in the
/// query string (an identifier-only search, for example).
#[derive(Clone, Debug)]
pub struct ExclusionPolicy {
    protected_terms: Vec<String>,
    privileged_user_id: i64,
}

impl ExclusionPolicy {
    pub fn new(config: &PolicyConfig) -> Self {
        Self {
            protected_terms: config
                .protected_terms
                .iter()
                .map(|term| term.trim().to_lowercase())
                .filter(|term| !term.is_empty())
                .collect(),
            privileged_user_id: config.privileged_user_id,
        }
    }

    pub fn is_privileged(&self, user_id: i64) -> bool {
        user_id == self.privileged_user_id
    }

    /// Substring match against the raw query text, case-insensitive.
    pub fn check_query(&self, keyword: &str, user_id: i64) -> PolicyDecision {
        if self.is_privileged(user_id) {
            return PolicyDecision::Allow;
        }

        let keyword = keyword.to_lowercase();
        match self.protected_terms.iter().find(|term| keyword.contains(term.as_str())) {
            Some(term) => {
                PolicyDecision::Block(ExclusionMatch::QueryTerm { term: term.clone() })
            }
            None => PolicyDecision::Allow,
        }
    }

    /// Exact match against a resolved record's identifying attributes.
    pub fn check_record(
        &self,
        name: &str,
        identifier: &str,
        institution: &str,
        user_id: i64,
    ) -> PolicyDecision {
        if self.is_privileged(user_id) {
            return PolicyDecision::Allow;
        }

        let name = name.trim().to_lowercase();
        let institution = institution.trim().to_lowercase();
        for term in &self.protected_terms {
            if name == *term {
                return PolicyDecision::Block(ExclusionMatch::RecordName);
            }
            if identifier.trim() == term.as_str() {
                return PolicyDecision::Block(ExclusionMatch::RecordIdentifier);
            }
            if institution == *term {
                return PolicyDecision::Block(ExclusionMatch::RecordInstitution);
            }
        }

        PolicyDecision::Allow
    }
}
