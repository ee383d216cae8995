use std::time::Duration;

use jsonwebtoken::get_current_timestamp;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::{AuthError, Session};

#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
    user: UserResponse,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

/// Password sign-in against a GoTrue-compatible identity service.
#[derive(Clone)]
pub struct RemoteIdentity {
    base_url: String,
    api_key: String,
    http: reqwest::Client,
}

impl RemoteIdentity {
    pub fn new(config: RemoteConfig) -> Result<Self, AuthError> {
        let base_url = config.base_url.trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(AuthError::invalid_config(
                "identity url must start with http:// or https://",
            ));
        }
        if config.api_key.trim().is_empty() {
            return Err(AuthError::invalid_config(
                "identity api key must be non-empty",
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|_| AuthError::new("ERR_INTERNAL", "failed to initialize identity http client"))?;

        Ok(Self {
            base_url,
            api_key: config.api_key,
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub(crate) async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let response = self
            .http
            .post(self.url("/auth/v1/token?grant_type=password"))
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({ "email": email.trim(), "password": password }))
            .send()
            .await
            .map_err(|_| AuthError::unavailable("identity service unreachable"))?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(AuthError::login_failed());
            }
            _ => {
                return Err(AuthError::unavailable(
                    "identity service returned non-success status",
                ));
            }
        }

        let token = response
            .json::<TokenResponse>()
            .await
            .map_err(|_| AuthError::unavailable("failed to parse identity token response"))?;

        Ok(Session {
            user_id: token.user.id,
            email: token.user.email.unwrap_or_else(|| email.trim().to_string()),
            access_token: token.access_token,
            expires_at: token
                .expires_in
                .map(|secs| get_current_timestamp().saturating_add(secs)),
            token_id: None,
        })
    }

    pub(crate) async fn session_for_token(&self, token: &str) -> Result<Session, AuthError> {
        let response = self
            .http
            .get(self.url("/auth/v1/user"))
            .header("apikey", &self.api_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|_| AuthError::unavailable("identity service unreachable"))?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(AuthError::invalid("identity service rejected the token"));
            }
            _ => {
                return Err(AuthError::unavailable(
                    "identity service returned non-success status",
                ));
            }
        }

        let user = response
            .json::<UserResponse>()
            .await
            .map_err(|_| AuthError::unavailable("failed to parse identity user response"))?;

        Ok(Session {
            user_id: user.id,
            email: user.email.unwrap_or_default(),
            access_token: token.to_string(),
            expires_at: None,
            token_id: None,
        })
    }

    pub(crate) async fn sign_out(&self, session: &Session) -> Result<(), AuthError> {
        let response = self
            .http
            .post(self.url("/auth/v1/logout"))
            .header("apikey", &self.api_key)
            .bearer_auth(&session.access_token)
            .send()
            .await
            .map_err(|_| AuthError::unavailable("identity service unreachable"))?;

        // An already dead token is as signed out as it gets.
        let status = response.status();
        if status.is_success() || status == StatusCode::UNAUTHORIZED {
            return Ok(());
        }
        Err(AuthError::unavailable(
            "identity service returned non-success status",
        ))
    }
}
