use std::time::Instant;

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use lai_contracts::certificate::CertificateView;
use serde::Deserialize;
use tracing::Instrument;

use super::{ApiError, AppState, extract_request_id, finish_span, json_error, observe};
use crate::verification::{self, DisplayClock, VerificationError};

#[derive(Debug, Default, Deserialize)]
pub(super) struct VerifyQuery {
    #[serde(default)]
    code: Option<String>,
}

fn verification_error(err: VerificationError) -> ApiError {
    let status = match err {
        VerificationError::InvalidIdentifier => StatusCode::BAD_REQUEST,
        VerificationError::NotFound => StatusCode::NOT_FOUND,
    };
    json_error(status, err.code(), err.message(), false)
}

async fn resolve_code(
    state: &AppState,
    headers: &HeaderMap,
    route: &'static str,
    code: Option<&str>,
) -> Result<Json<CertificateView>, ApiError> {
    let started = Instant::now();
    let request_id = extract_request_id(headers);

    let span = tracing::info_span!(
        "verification.resolve",
        request_id = %request_id,
        report_id = code.unwrap_or_default(),
        latency_ms = tracing::field::Empty,
        outcome = tracing::field::Empty,
    );

    let clock = DisplayClock::now(state.config.display_zone);
    let result = verification::resolve(&state.store, code, &clock)
        .instrument(span.clone())
        .await
        .map(Json)
        .map_err(verification_error);

    span.in_scope(|| finish_span(started, &result));
    observe(route, "GET", StatusCode::OK, started, &result);
    result
}

pub(super) async fn verify_by_query(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<VerifyQuery>, QueryRejection>,
) -> Result<Json<CertificateView>, ApiError> {
    let code = query.ok().and_then(|Query(q)| q.code);
    resolve_code(&state, &headers, "/api/VerifikasiLai", code.as_deref()).await
}

pub(super) async fn verify_by_path(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<CertificateView>, ApiError> {
    resolve_code(&state, &headers, "/api/VerifikasiLai/{id}", Some(&id)).await
}
