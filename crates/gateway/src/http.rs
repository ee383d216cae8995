use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use lai_auth::{AuthError, IdentityGate, LocalIdentity, RemoteIdentity, Session};
use lai_contracts::VERIFICATION_PATH;
use lai_contracts::form::ValidationError;
use lai_store::{ReportStore, StoreError};
use serde::Serialize;
use ulid::Ulid;

use crate::config::{AuthConfig, GatewayConfig, StartupError, StoreConfig};
use crate::rate_limit::LoginRateLimiter;

mod auth;
mod reports;
mod verify;

pub(crate) const REQUEST_ID_HEADER: &str = "x-lai-request-id";

pub(crate) const SAVE_FAILED_MESSAGE: &str = "Gagal menyimpan data laporan";
pub(crate) const LOAD_FAILED_MESSAGE: &str = "Gagal mengambil data laporan";

#[derive(Clone)]
pub struct AppState {
    pub config: GatewayConfig,
    store: ReportStore,
    identity: IdentityGate,
    login_limiter: LoginRateLimiter,
}

pub(crate) type ApiError = (StatusCode, Json<ErrorResponse>);

pub async fn connect_store(config: &GatewayConfig) -> Result<ReportStore, StartupError> {
    match &config.store {
        StoreConfig::Postgres {
            db_url,
            max_connections,
        } => ReportStore::connect_postgres(
            db_url,
            *max_connections,
            Duration::from_millis(config.store_timeout_ms),
        )
        .await
        .map_err(|err| StartupError {
            code: "ERR_STORE_UNAVAILABLE",
            message: format!("failed to initialize report store: {}", err),
        }),
        StoreConfig::Memory => Ok(ReportStore::memory()),
    }
}

pub fn identity_gate(config: &GatewayConfig) -> Result<IdentityGate, StartupError> {
    let gate = match &config.auth {
        AuthConfig::Local(local) => LocalIdentity::new(local.clone()).map(IdentityGate::from),
        AuthConfig::Remote(remote) => RemoteIdentity::new(remote.clone()).map(IdentityGate::from),
    };
    gate.map_err(|err| StartupError {
        code: err.code,
        message: err.message,
    })
}

/// Builds the router around an already constructed store.
pub fn router_with_store(config: GatewayConfig, store: ReportStore) -> Result<Router, StartupError> {
    let identity = identity_gate(&config)?;
    let login_limiter = LoginRateLimiter::new(
        config.login_rate_limit_per_window,
        Duration::from_secs(config.login_rate_limit_window_secs.max(1)),
    );

    tracing::info!(
        store = store.backend(),
        auth_mode = identity.mode(),
        "gateway.state_ready"
    );

    let state = AppState {
        config,
        store,
        identity,
        login_limiter,
    };

    Ok(Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/v1/auth/login", post(auth::login))
        .route("/v1/auth/logout", post(auth::logout))
        .route("/v1/auth/session", get(auth::current_session))
        .route(
            "/v1/reports",
            get(reports::list_reports).post(reports::create_report),
        )
        .route(
            "/v1/reports/{id}",
            get(reports::get_report)
                .put(reports::update_report)
                .delete(reports::delete_report),
        )
        .route("/v1/reports/{id}/qr", get(reports::report_qr))
        .route(VERIFICATION_PATH, get(verify::verify_by_query))
        .route(
            &format!("{}/{{id}}", VERIFICATION_PATH),
            get(verify::verify_by_path),
        )
        .with_state(state))
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
struct ReadyzResponse {
    status: &'static str,
    checks: BTreeMap<&'static str, bool>,
}

async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let mut checks = BTreeMap::new();
    checks.insert("store", state.store.ping().await.is_ok());

    let all_ready = checks.values().all(|ok| *ok);
    let status = if all_ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadyzResponse {
            status: if all_ready { "ready" } else { "not_ready" },
            checks,
        }),
    )
}

async fn metrics() -> impl IntoResponse {
    match crate::metrics::render() {
        Ok((body, content_type)) => {
            let mut headers = HeaderMap::new();
            if let Ok(value) = HeaderValue::from_str(content_type.as_str()) {
                headers.insert(header::CONTENT_TYPE, value);
            }
            (headers, body).into_response()
        }
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

/// The signed-in operator, resolved before the handler body runs.
pub struct Authenticated(pub Session);

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match state.identity.current_session(&parts.headers).await {
            Ok(Some(session)) => Ok(Authenticated(session)),
            Ok(None) => Err(json_error(
                StatusCode::UNAUTHORIZED,
                "ERR_AUTH_REQUIRED",
                "login required",
                false,
            )),
            Err(err) => Err(auth_error(err)),
        }
    }
}

pub(crate) fn extract_request_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .and_then(sanitize_request_id)
        .unwrap_or_else(|| Ulid::new().to_string())
}

fn sanitize_request_id(raw: &str) -> Option<String> {
    const MAX_LEN: usize = 64;
    let out = raw
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'))
        .take(MAX_LEN)
        .collect::<String>();

    (!out.is_empty()).then_some(out)
}

/// Records the request metric for a finished handler.
pub(crate) fn observe<T>(
    route: &str,
    method: &str,
    success: StatusCode,
    started: Instant,
    result: &Result<T, ApiError>,
) {
    let status = match result {
        Ok(_) => success,
        Err((status, _)) => *status,
    };
    crate::metrics::observe_http_request(route, method, status.as_u16(), started.elapsed());
}

pub(crate) fn finish_span<T>(started: Instant, result: &Result<T, ApiError>) {
    let span = tracing::Span::current();
    span.record("latency_ms", started.elapsed().as_millis() as u64);
    match result {
        Ok(_) => span.record("outcome", "ok"),
        Err((_, Json(err))) => span.record("outcome", err.code.as_str()),
    };
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<&'static str>,
}

pub(crate) fn json_error(
    status: StatusCode,
    code: impl Into<String>,
    message: impl Into<String>,
    retryable: bool,
) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            code: code.into(),
            message: message.into(),
            retryable,
            field: None,
        }),
    )
}

pub(crate) fn validation_error(err: ValidationError) -> ApiError {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ErrorResponse {
            code: "ERR_VALIDATION".to_string(),
            message: err.message.to_string(),
            retryable: false,
            field: Some(err.field),
        }),
    )
}

pub(crate) fn store_error(err: &StoreError, message: &'static str) -> ApiError {
    tracing::warn!(error = %err, "gateway.store_failed");
    json_error(
        StatusCode::SERVICE_UNAVAILABLE,
        "ERR_STORE_UNAVAILABLE",
        message,
        true,
    )
}

pub(crate) fn not_found() -> ApiError {
    json_error(
        StatusCode::NOT_FOUND,
        "ERR_NOT_FOUND",
        crate::verification::NOT_FOUND_MESSAGE,
        false,
    )
}

pub(crate) fn invalid_params(message: impl Into<String>) -> ApiError {
    json_error(StatusCode::BAD_REQUEST, "ERR_INVALID_PARAMS", message, false)
}

pub(crate) fn auth_error(err: AuthError) -> ApiError {
    match err.code {
        "ERR_AUTH_UNAVAILABLE" => json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            err.code,
            err.message,
            true,
        ),
        "ERR_INTERNAL" | "ERR_INVALID_CONFIG" => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "ERR_INTERNAL",
            "identity gate failure",
            false,
        ),
        _ => json_error(StatusCode::UNAUTHORIZED, err.code, err.message, false),
    }
}
