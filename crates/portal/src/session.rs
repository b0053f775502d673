use chrono::{DateTime, Utc};

/// An authenticated portal session: the identifier pair and short-lived token
/// returned by login, bound to the HTTP transport the login handshake ran on
/// (the portal's handshake state lives in that transport's cookies).
///
/// A session is only ever constructed with all three credentials present;
/// partial login state never escapes the login flow. Each session is owned by
/// exactly one user's conversation and its transport is released on drop.
#[derive(Clone, Debug)]
pub struct PortalSession {
    user_ref: String,
    org_ref: String,
    auth_token: String,
    transport: reqwest::Client,
    created_at: DateTime<Utc>,
}

impl PortalSession {
    /// Normally only `PortalClient::login` constructs sessions; test doubles
    /// mint them directly with a throwaway transport.
    pub fn new(
        user_ref: String,
        org_ref: String,
        auth_token: String,
        transport: reqwest::Client,
    ) -> Self {
        Self { user_ref, org_ref, auth_token, transport, created_at: Utc::now() }
    }

    pub fn user_ref(&self) -> &str {
        &self.user_ref
    }

    pub fn org_ref(&self) -> &str {
        &self.org_ref
    }

    pub fn auth_token(&self) -> &str {
        &self.auth_token
    }

    pub fn transport(&self) -> &reqwest::Client {
        &self.transport
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
