use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use reqwest::header::{CONTENT_TYPE, ORIGIN, REFERER};
use secrecy::ExposeSecret;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument};

use kampus_core::config::PortalConfig;
use kampus_core::student::{Candidate, StudentDetail};

use crate::session::PortalSession;

const USER_AGENT: &str = "Mozilla/5.0";
const SEARCH_PAGE_SIZE: &str = "20";
const SEARCH_PAGE: &str = "0";
const ROLE_ID: &str = "3";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoginStep {
    Prime,
    SignIn,
    Verify,
    SelectRole,
    ConfirmRole,
}

impl LoginStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prime => "prime",
            Self::SignIn => "sign_in",
            Self::Verify => "verify",
            Self::SelectRole => "select_role",
            Self::ConfirmRole => "confirm_role",
        }
    }
}

impl std::fmt::Display for LoginStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum PortalError {
    #[error("login step `{step}` failed: {reason}")]
    Login { step: LoginStep, reason: String },
    #[error("portal returned status {status} for {operation}")]
    Status { operation: &'static str, status: u16 },
    #[error("portal response for {operation} was malformed: {reason}")]
    Malformed { operation: &'static str, reason: String },
    #[error("portal transport failure: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Read operations against the external student-records portal.
///
/// All three operations are safe to repeat; each one is a live network call
/// and nothing is cached here. Nothing retries either — a failed call is
/// reported to the caller, who decides whether a fresh user action should
/// attempt it again.
#[async_trait]
pub trait PortalClient: Send + Sync {
    async fn login(&self) -> Result<PortalSession, PortalError>;

    async fn search(
        &self,
        keyword: &str,
        session: &PortalSession,
    ) -> Result<Vec<Candidate>, PortalError>;

    async fn detail(
        &self,
        registration_ref: &str,
        session: &PortalSession,
    ) -> Result<StudentDetail, PortalError>;
}

/// The portal's real HTTP surface. The request shapes are dictated by the
/// portal's own sign-in flow and must not be changed: credentials travel
/// base64-encoded on sign-in but plain on role confirmation, and the auth
/// token is always a `pm` query parameter, never a header.
pub struct HttpPortalClient {
    web_base_url: String,
    api_base_url: String,
    username: String,
    password: String,
    timeout: Duration,
}

impl HttpPortalClient {
    pub fn new(config: &PortalConfig) -> Self {
        Self {
            web_base_url: config.web_base_url.clone(),
            api_base_url: config.api_base_url.clone(),
            username: config.username.expose_secret().to_owned(),
            password: config.password.expose_secret().to_owned(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// One transport per session. The sign-in handshake parks server-side
    /// state in cookies, so every login starts on a fresh cookie jar.
    fn build_transport(&self) -> Result<reqwest::Client, PortalError> {
        Ok(reqwest::Client::builder()
            .cookie_store(true)
            .user_agent(USER_AGENT)
            .timeout(self.timeout)
            .build()?)
    }

    fn web_url(&self, path: &str) -> String {
        format!("{}{path}", self.web_base_url)
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{path}", self.api_base_url)
    }
}

#[async_trait]
impl PortalClient for HttpPortalClient {
    #[instrument(skip(self))]
    async fn login(&self) -> Result<PortalSession, PortalError> {
        let transport = self.build_transport()?;

        // (a) Unauthenticated priming request; the portal seeds its handshake
        // cookies here. Response body and status are irrelevant.
        transport.get(self.web_url("/signin")).send().await?;
        debug!(step = %LoginStep::Prime, "portal login step completed");

        // (b) Credentialed sign-in. Credentials are base64-encoded on this
        // step only.
        let encoded_username = BASE64_STANDARD.encode(self.username.as_bytes());
        let encoded_password = BASE64_STANDARD.encode(self.password.as_bytes());
        let response = transport
            .post(self.api_url("/login/login"))
            .header(ORIGIN, &self.web_base_url)
            .header(REFERER, format!("{}/", self.web_base_url))
            .form(&[
                ("data[username]", encoded_username.as_str()),
                ("data[password]", encoded_password.as_str()),
                ("data[issso]", "false"),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(PortalError::Login {
                step: LoginStep::SignIn,
                reason: format!("unexpected status {}", response.status()),
            });
        }
        let envelope: SignInEnvelope = response.json().await.map_err(|error| {
            PortalError::Login { step: LoginStep::SignIn, reason: error.to_string() }
        })?;
        let user_ref = envelope.result.session_data.user_ref;
        let org_ref = envelope.result.session_data.org_ref;
        debug!(step = %LoginStep::SignIn, "portal login step completed");

        // (c) Verification read keyed by the user reference. Side-effecting
        // on the portal side; the response carries nothing we need.
        transport.get(self.api_url(&format!("/isverified/{user_ref}"))).send().await?;
        debug!(step = %LoginStep::Verify, "portal login step completed");

        // (d) Role selection.
        transport
            .post(self.api_url("/login/roles/1"))
            .query(&[("login", "adm")])
            .form(&[("data[i_iduser]", user_ref.as_str())])
            .send()
            .await?;
        debug!(step = %LoginStep::SelectRole, "portal login step completed");

        // (e) Role confirmation yields the short-lived auth token.
        let response = transport
            .post(self.api_url(&format!("/login/setlogin/{ROLE_ID}/{org_ref}")))
            .query(&[
                ("id_pengguna", user_ref.as_str()),
                ("id_unit", org_ref.as_str()),
                ("id_role", ROLE_ID),
            ])
            .form(&[
                ("data[i_username]", self.username.as_str()),
                ("data[i_iduser]", user_ref.as_str()),
                ("data[password]", self.password.as_str()),
                ("data[is_manual]", "true"),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(PortalError::Login {
                step: LoginStep::ConfirmRole,
                reason: format!("unexpected status {}", response.status()),
            });
        }
        let envelope: ConfirmRoleEnvelope = response.json().await.map_err(|error| {
            PortalError::Login { step: LoginStep::ConfirmRole, reason: error.to_string() }
        })?;
        debug!(step = %LoginStep::ConfirmRole, "portal login step completed");

        Ok(PortalSession::new(
            user_ref,
            org_ref,
            envelope.result.session_data.auth_token,
            transport,
        ))
    }

    #[instrument(skip(self, session))]
    async fn search(
        &self,
        keyword: &str,
        session: &PortalSession,
    ) -> Result<Vec<Candidate>, PortalError> {
        let response = session
            .transport()
            .post(self.api_url("/mahasiswa/result"))
            .query(&[
                ("limit", SEARCH_PAGE_SIZE),
                ("page", SEARCH_PAGE),
                ("id_pengguna", session.user_ref()),
                ("id_role", ROLE_ID),
                ("pm", session.auth_token()),
            ])
            .form(&[
                ("data[keyword]", keyword),
                ("data[id_sp]", ""),
                ("data[id_sms]", ""),
                ("data[vld]", "0"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PortalError::Status {
                operation: "search",
                status: response.status().as_u16(),
            });
        }

        let envelope: SearchEnvelope = response.json().await.map_err(|error| {
            PortalError::Malformed { operation: "search", reason: error.to_string() }
        })?;

        Ok(envelope.result.data)
    }

    #[instrument(skip(self, session))]
    async fn detail(
        &self,
        registration_ref: &str,
        session: &PortalSession,
    ) -> Result<StudentDetail, PortalError> {
        let response = session
            .transport()
            .get(self.api_url(&format!("/mahasiswa/detail/{registration_ref}")))
            .query(&[
                ("id_pengguna", session.user_ref()),
                ("id_unit", session.org_ref()),
                ("id_role", ROLE_ID),
                ("pm", session.auth_token()),
            ])
            .header(ORIGIN, &self.web_base_url)
            .header(REFERER, format!("{}/", self.web_base_url))
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PortalError::Status {
                operation: "detail",
                status: response.status().as_u16(),
            });
        }

        let envelope: DetailEnvelope = response.json().await.map_err(|error| {
            PortalError::Malformed { operation: "detail", reason: error.to_string() }
        })?;

        Ok(envelope.result)
    }
}

#[derive(Debug, Deserialize)]
struct SignInEnvelope {
    result: SignInResult,
}

#[derive(Debug, Deserialize)]
struct SignInResult {
    session_data: SignInSessionData,
}

#[derive(Debug, Deserialize)]
struct SignInSessionData {
    #[serde(rename = "i_iduser", deserialize_with = "opaque_id")]
    user_ref: String,
    #[serde(rename = "i_idunit", deserialize_with = "opaque_id")]
    org_ref: String,
}

#[derive(Debug, Deserialize)]
struct ConfirmRoleEnvelope {
    result: ConfirmRoleResult,
}

#[derive(Debug, Deserialize)]
struct ConfirmRoleResult {
    session_data: ConfirmRoleSessionData,
}

#[derive(Debug, Deserialize)]
struct ConfirmRoleSessionData {
    #[serde(rename = "pm")]
    auth_token: String,
}

#[derive(Debug, Default, Deserialize)]
struct SearchEnvelope {
    #[serde(default)]
    result: SearchResult,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResult {
    #[serde(default)]
    data: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct DetailEnvelope {
    result: StudentDetail,
}

/// The portal emits identifier fields as either strings or bare numbers.
fn opaque_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::String(text) => Ok(text),
        serde_json::Value::Number(number) => Ok(number.to_string()),
        other => Err(serde::de::Error::custom(format!("expected string or number, got {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfirmRoleEnvelope, DetailEnvelope, LoginStep, PortalError, SearchEnvelope, SignInEnvelope};

    #[test]
    fn sign_in_envelope_accepts_numeric_identifiers() {
        let envelope: SignInEnvelope = serde_json::from_str(
            r#"{"result": {"session_data": {"i_iduser": 4211, "i_idunit": "org-77"}}}"#,
        )
        .expect("sign-in envelope should parse");

        assert_eq!(envelope.result.session_data.user_ref, "4211");
        assert_eq!(envelope.result.session_data.org_ref, "org-77");
    }

    #[test]
    fn sign_in_envelope_without_session_data_is_rejected() {
        let parsed = serde_json::from_str::<SignInEnvelope>(r#"{"result": {}}"#);
        assert!(parsed.is_err(), "missing session_data must not produce a partial session");
    }

    #[test]
    fn confirm_role_envelope_extracts_token() {
        let envelope: ConfirmRoleEnvelope =
            serde_json::from_str(r#"{"result": {"session_data": {"pm": "tok-123"}}}"#)
                .expect("confirm envelope should parse");
        assert_eq!(envelope.result.session_data.auth_token, "tok-123");
    }

    #[test]
    fn search_envelope_defaults_to_empty_data() {
        let envelope: SearchEnvelope =
            serde_json::from_str(r#"{"result": {}}"#).expect("search envelope should parse");
        assert!(envelope.result.data.is_empty());

        let envelope: SearchEnvelope =
            serde_json::from_str(r#"{}"#).expect("empty search envelope should parse");
        assert!(envelope.result.data.is_empty());
    }

    #[test]
    fn detail_envelope_requires_result() {
        assert!(serde_json::from_str::<DetailEnvelope>(r#"{}"#).is_err());

        let envelope: DetailEnvelope = serde_json::from_str(
            r#"{"result": {"dataumum": {"nm_pd": "Ahmad Fauzi", "nipd": "1", "namapt": "UI"}}}"#,
        )
        .expect("detail envelope should parse");
        assert_eq!(envelope.result.general.name, "Ahmad Fauzi");
    }

    #[test]
    fn login_error_names_the_failing_step() {
        let error = PortalError::Login {
            step: LoginStep::ConfirmRole,
            reason: "unexpected status 403".to_string(),
        };
        assert_eq!(error.to_string(), "login step `confirm_role` failed: unexpected status 403");
    }
}
