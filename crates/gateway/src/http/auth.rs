use std::time::Instant;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::Json;
use axum::http::{HeaderMap, StatusCode};
use lai_auth::{Session, unix_now};
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use super::{
    ApiError, AppState, Authenticated, auth_error, extract_request_id, finish_span, invalid_params,
    json_error, observe,
};
use crate::metrics;
use crate::rate_limit::LoginRateLimiter;

#[derive(Deserialize)]
pub(super) struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
pub(super) struct LoginResponse {
    access_token: String,
    token_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_in: Option<u64>,
    user: Session,
}

#[derive(Debug, Serialize)]
pub(super) struct SessionResponse {
    user: Session,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_in: Option<u64>,
}

pub(super) async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    req: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let started = Instant::now();
    let request_id = extract_request_id(&headers);

    let span = tracing::info_span!(
        "auth.login",
        request_id = %request_id,
        auth_mode = state.identity.mode(),
        latency_ms = tracing::field::Empty,
        outcome = tracing::field::Empty,
    );

    let result = async {
        let Json(req) = req.map_err(|_| invalid_params("invalid JSON body"))?;

        let limiter_key = LoginRateLimiter::key_for(&req.email);
        if !state.login_limiter.allow(&limiter_key) {
            metrics::observe_login("rate_limited");
            return Err(json_error(
                StatusCode::TOO_MANY_REQUESTS,
                "ERR_RATE_LIMITED",
                "too many login attempts",
                true,
            ));
        }

        let session = state
            .identity
            .sign_in(&req.email, &req.password)
            .await
            .map_err(|err| {
                metrics::observe_login(if err.code == "ERR_LOGIN_FAILED" {
                    "failed"
                } else {
                    "error"
                });
                auth_error(err)
            })?;

        state.login_limiter.reset(&limiter_key);
        metrics::observe_login("ok");
        tracing::info!(user_id = %session.user_id, "auth.signed_in");

        Ok::<_, ApiError>(Json(LoginResponse {
            access_token: session.access_token.clone(),
            token_type: "bearer",
            expires_in: session.expires_in(unix_now()),
            user: session,
        }))
    }
    .instrument(span.clone())
    .await;

    span.in_scope(|| finish_span(started, &result));
    observe("/v1/auth/login", "POST", StatusCode::OK, started, &result);
    result
}

pub(super) async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    auth: Result<Authenticated, ApiError>,
) -> Result<StatusCode, ApiError> {
    let started = Instant::now();
    let request_id = extract_request_id(&headers);

    let span = tracing::info_span!(
        "auth.logout",
        request_id = %request_id,
        latency_ms = tracing::field::Empty,
        outcome = tracing::field::Empty,
    );

    let result = async {
        let Authenticated(session) = auth?;
        state
            .identity
            .sign_out(&session)
            .await
            .map_err(auth_error)?;
        tracing::info!(user_id = %session.user_id, "auth.signed_out");
        Ok::<_, ApiError>(StatusCode::NO_CONTENT)
    }
    .instrument(span.clone())
    .await;

    span.in_scope(|| finish_span(started, &result));
    observe(
        "/v1/auth/logout",
        "POST",
        StatusCode::NO_CONTENT,
        started,
        &result,
    );
    result
}

pub(super) async fn current_session(
    auth: Result<Authenticated, ApiError>,
) -> Result<Json<SessionResponse>, ApiError> {
    let started = Instant::now();
    let result = auth.map(|Authenticated(session)| {
        Json(SessionResponse {
            expires_in: session.expires_in(unix_now()),
            user: session,
        })
    });
    observe("/v1/auth/session", "GET", StatusCode::OK, started, &result);
    result
}
