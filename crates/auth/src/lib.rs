use http::HeaderMap;
use http::header;
use serde::Serialize;

mod local;
mod remote;

pub use local::{LocalConfig, LocalIdentity, LocalOperator, hash_password};
pub use remote::{RemoteConfig, RemoteIdentity};

pub const LOGIN_FAILED_MESSAGE: &str = "Login gagal";

/// An authenticated operator. Handed to protected handlers explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub user_id: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub access_token: String,
    /// Unix seconds; `None` when the provider does not say.
    pub expires_at: Option<u64>,
    #[serde(skip_serializing)]
    pub token_id: Option<String>,
}

/// Seconds since the Unix epoch, on the same clock token expiry uses.
pub fn unix_now() -> u64 {
    jsonwebtoken::get_current_timestamp()
}

impl Session {
    pub fn expires_in(&self, now: u64) -> Option<u64> {
        self.expires_at.map(|exp| exp.saturating_sub(now))
    }
}

#[derive(Debug, Clone)]
pub struct AuthError {
    pub code: &'static str,
    pub message: String,
}

impl AuthError {
    pub(crate) fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub(crate) fn login_failed() -> Self {
        Self::new("ERR_LOGIN_FAILED", LOGIN_FAILED_MESSAGE)
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::new("ERR_AUTH_INVALID", message)
    }

    pub(crate) fn unavailable(message: impl Into<String>) -> Self {
        Self::new("ERR_AUTH_UNAVAILABLE", message)
    }

    pub(crate) fn invalid_config(message: impl Into<String>) -> Self {
        Self::new("ERR_INVALID_CONFIG", message)
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for AuthError {}

/// Binary gate in front of every management operation: a request either
/// carries a live session or it does not.
#[derive(Clone)]
pub enum IdentityGate {
    Local(LocalIdentity),
    Remote(RemoteIdentity),
}

impl IdentityGate {
    pub fn mode(&self) -> &'static str {
        match self {
            IdentityGate::Local(_) => "local",
            IdentityGate::Remote(_) => "remote",
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AuthError::login_failed());
        }
        match self {
            IdentityGate::Local(gate) => gate.sign_in(email, password).await,
            IdentityGate::Remote(gate) => gate.sign_in(email, password).await,
        }
    }

    /// `Ok(None)` when the request carries no credentials at all.
    pub async fn current_session(&self, headers: &HeaderMap) -> Result<Option<Session>, AuthError> {
        let Some(token) = bearer_token(headers)? else {
            return Ok(None);
        };
        let session = match self {
            IdentityGate::Local(gate) => gate.session_for_token(&token).await?,
            IdentityGate::Remote(gate) => gate.session_for_token(&token).await?,
        };
        Ok(Some(session))
    }

    pub async fn sign_out(&self, session: &Session) -> Result<(), AuthError> {
        match self {
            IdentityGate::Local(gate) => gate.sign_out(session).await,
            IdentityGate::Remote(gate) => gate.sign_out(session).await,
        }
    }
}

impl From<LocalIdentity> for IdentityGate {
    fn from(value: LocalIdentity) -> Self {
        IdentityGate::Local(value)
    }
}

impl From<RemoteIdentity> for IdentityGate {
    fn from(value: RemoteIdentity) -> Self {
        IdentityGate::Remote(value)
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Result<Option<String>, AuthError> {
    let Some(authz) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
    else {
        return Ok(None);
    };

    let token = authz
        .strip_prefix("Bearer ")
        .or_else(|| authz.strip_prefix("bearer "))
        .ok_or_else(|| AuthError::invalid("Authorization must be a Bearer token"))?;

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::invalid("Bearer token is empty"));
    }

    Ok(Some(token.to_string()))
}
