use std::time::Instant;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use lai_contracts::filter::{ListFilter, YearFilter};
use lai_contracts::form::ReportForm;
use lai_contracts::verification_url;
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use super::{
    ApiError, AppState, Authenticated, LOAD_FAILED_MESSAGE, SAVE_FAILED_MESSAGE,
    extract_request_id, finish_span, invalid_params, json_error, not_found, observe, store_error,
    validation_error,
};
use crate::catalog::{
    self, CatalogError, CatalogView, DELETE_CONFIRMATION_PROMPT, DeleteConfirmation,
    QR_DOWNLOAD_FILENAME, ReportList, outcome,
};
use crate::metrics;

#[derive(Debug, Default, Deserialize)]
pub(super) struct ListQuery {
    #[serde(default)]
    search: Option<String>,
    #[serde(default)]
    year: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct DeleteQuery {
    #[serde(default)]
    confirm: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct SavedReport {
    id: String,
    no_lai: String,
    verification_url: String,
}

#[derive(Debug, Serialize)]
pub(super) struct EditForm {
    id: String,
    form: ReportForm,
    no_lai_preview: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub(super) struct QrPayload {
    id: String,
    verification_url: String,
    filename: &'static str,
}

fn parse_list_filter(query: ListQuery) -> Result<ListFilter, ApiError> {
    let year = match query.year.as_deref() {
        None => YearFilter::All,
        Some(raw) => YearFilter::parse(raw)
            .ok_or_else(|| invalid_params("year must be `all` or a four-digit year"))?,
    };
    Ok(ListFilter {
        search: query.search.unwrap_or_default(),
        year,
    })
}

fn delete_confirmation(
    query: Result<Query<DeleteQuery>, QueryRejection>,
) -> Result<DeleteConfirmation, ApiError> {
    let Query(query) = query.map_err(|_| invalid_params("invalid query string"))?;
    Ok(DeleteConfirmation::from_flag(is_confirmed(&query)))
}

fn is_confirmed(query: &DeleteQuery) -> bool {
    query
        .confirm
        .as_deref()
        .map(|v| v.trim())
        .is_some_and(|v| matches!(v, "1" | "true" | "yes"))
}

pub(super) async fn list_reports(
    State(state): State<AppState>,
    headers: HeaderMap,
    auth: Result<Authenticated, ApiError>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<CatalogView>, ApiError> {
    let started = Instant::now();
    let request_id = extract_request_id(&headers);

    let span = tracing::info_span!(
        "report.list",
        request_id = %request_id,
        rows = tracing::field::Empty,
        latency_ms = tracing::field::Empty,
        outcome = tracing::field::Empty,
    );

    let result = async {
        let Authenticated(_session) = auth?;
        let Query(query) = query.map_err(|_| invalid_params("invalid query string"))?;
        let filter = parse_list_filter(query)?;

        let list = ReportList::load(&state.store, state.config.display_zone)
            .await
            .map_err(|err| store_error(&err, LOAD_FAILED_MESSAGE))?;
        let view = list.view(&filter, &state.config.public_origin);
        tracing::Span::current().record("rows", view.rows.len() as u64);
        Ok::<_, ApiError>(Json(view))
    }
    .instrument(span.clone())
    .await;

    span.in_scope(|| finish_span(started, &result));
    observe("/v1/reports", "GET", StatusCode::OK, started, &result);
    result
}

pub(super) async fn create_report(
    State(state): State<AppState>,
    headers: HeaderMap,
    auth: Result<Authenticated, ApiError>,
    req: Result<Json<ReportForm>, JsonRejection>,
) -> Result<(StatusCode, Json<SavedReport>), ApiError> {
    let started = Instant::now();
    let request_id = extract_request_id(&headers);

    let span = tracing::info_span!(
        "report.create",
        request_id = %request_id,
        user_id = tracing::field::Empty,
        report_id = tracing::field::Empty,
        latency_ms = tracing::field::Empty,
        outcome = tracing::field::Empty,
    );

    let result = async {
        let Authenticated(session) = auth?;
        tracing::Span::current().record("user_id", session.user_id.as_str());
        let Json(form) = req.map_err(|_| invalid_params("invalid JSON body"))?;

        let report = form.into_new_report().map_err(validation_error)?;

        let inserted = state.store.insert(&report).await;
        metrics::observe_store_operation("insert", outcome(&inserted));
        let id = inserted.map_err(|err| store_error(&err, SAVE_FAILED_MESSAGE))?;
        tracing::Span::current().record("report_id", id.as_str());

        Ok::<_, ApiError>((
            StatusCode::CREATED,
            Json(SavedReport {
                verification_url: verification_url(&state.config.public_origin, &id),
                id,
                no_lai: report.no_lai,
            }),
        ))
    }
    .instrument(span.clone())
    .await;

    span.in_scope(|| finish_span(started, &result));
    observe("/v1/reports", "POST", StatusCode::CREATED, started, &result);
    result
}

pub(super) async fn get_report(
    State(state): State<AppState>,
    headers: HeaderMap,
    auth: Result<Authenticated, ApiError>,
    Path(id): Path<String>,
) -> Result<Json<EditForm>, ApiError> {
    let started = Instant::now();
    let request_id = extract_request_id(&headers);

    let span = tracing::info_span!(
        "report.edit_load",
        request_id = %request_id,
        report_id = %id,
        latency_ms = tracing::field::Empty,
        outcome = tracing::field::Empty,
    );

    let result = async {
        let Authenticated(_session) = auth?;

        let fetched = state.store.get_by_id(&id).await;
        metrics::observe_store_operation("get_by_id", outcome(&fetched));
        let report = fetched
            .map_err(|err| store_error(&err, LOAD_FAILED_MESSAGE))?
            .ok_or_else(not_found)?;

        let form = ReportForm::from_report(&report).map_err(|err| {
            tracing::warn!(error = %err, "report.record_malformed");
            json_error(
                StatusCode::UNPROCESSABLE_ENTITY,
                "ERR_RECORD_MALFORMED",
                err.to_string(),
                false,
            )
        })?;

        Ok::<_, ApiError>(Json(EditForm {
            no_lai_preview: form.no_lai_preview(),
            id: report.id,
            form,
            created_at: report.created_at,
        }))
    }
    .instrument(span.clone())
    .await;

    span.in_scope(|| finish_span(started, &result));
    observe("/v1/reports/{id}", "GET", StatusCode::OK, started, &result);
    result
}

pub(super) async fn update_report(
    State(state): State<AppState>,
    headers: HeaderMap,
    auth: Result<Authenticated, ApiError>,
    Path(id): Path<String>,
    req: Result<Json<ReportForm>, JsonRejection>,
) -> Result<Json<SavedReport>, ApiError> {
    let started = Instant::now();
    let request_id = extract_request_id(&headers);

    let span = tracing::info_span!(
        "report.update",
        request_id = %request_id,
        report_id = %id,
        user_id = tracing::field::Empty,
        latency_ms = tracing::field::Empty,
        outcome = tracing::field::Empty,
    );

    let result = async {
        let Authenticated(session) = auth?;
        tracing::Span::current().record("user_id", session.user_id.as_str());
        let Json(form) = req.map_err(|_| invalid_params("invalid JSON body"))?;

        let report = form.into_new_report().map_err(validation_error)?;

        let updated = state.store.update_by_id(&id, &report).await;
        metrics::observe_store_operation("update_by_id", outcome(&updated));
        if !updated.map_err(|err| store_error(&err, SAVE_FAILED_MESSAGE))? {
            return Err(not_found());
        }

        Ok::<_, ApiError>(Json(SavedReport {
            verification_url: verification_url(&state.config.public_origin, &id),
            id: id.clone(),
            no_lai: report.no_lai,
        }))
    }
    .instrument(span.clone())
    .await;

    span.in_scope(|| finish_span(started, &result));
    observe("/v1/reports/{id}", "PUT", StatusCode::OK, started, &result);
    result
}

pub(super) async fn delete_report(
    State(state): State<AppState>,
    headers: HeaderMap,
    auth: Result<Authenticated, ApiError>,
    Path(id): Path<String>,
    query: Result<Query<DeleteQuery>, QueryRejection>,
) -> Result<StatusCode, ApiError> {
    let started = Instant::now();
    let request_id = extract_request_id(&headers);

    let span = tracing::info_span!(
        "report.delete",
        request_id = %request_id,
        report_id = %id,
        user_id = tracing::field::Empty,
        latency_ms = tracing::field::Empty,
        outcome = tracing::field::Empty,
    );

    let result = async {
        let Authenticated(session) = auth?;
        tracing::Span::current().record("user_id", session.user_id.as_str());

        let confirmation = delete_confirmation(query)?;
        catalog::delete_report(&state.store, &id, confirmation)
            .await
            .map_err(|err| match err {
                CatalogError::ConfirmationRequired => json_error(
                    StatusCode::PRECONDITION_REQUIRED,
                    "ERR_CONFIRMATION_REQUIRED",
                    DELETE_CONFIRMATION_PROMPT,
                    false,
                ),
                CatalogError::Store(err) => store_error(&err, SAVE_FAILED_MESSAGE),
            })?;

        tracing::info!("report.deleted");
        Ok::<_, ApiError>(StatusCode::NO_CONTENT)
    }
    .instrument(span.clone())
    .await;

    span.in_scope(|| finish_span(started, &result));
    observe(
        "/v1/reports/{id}",
        "DELETE",
        StatusCode::NO_CONTENT,
        started,
        &result,
    );
    result
}

pub(super) async fn report_qr(
    State(state): State<AppState>,
    headers: HeaderMap,
    auth: Result<Authenticated, ApiError>,
    Path(id): Path<String>,
) -> Result<Json<QrPayload>, ApiError> {
    let started = Instant::now();
    let request_id = extract_request_id(&headers);

    let span = tracing::info_span!(
        "report.qr",
        request_id = %request_id,
        report_id = %id,
        latency_ms = tracing::field::Empty,
        outcome = tracing::field::Empty,
    );

    let result = async {
        let Authenticated(_session) = auth?;

        let fetched = state.store.get_by_id(&id).await;
        metrics::observe_store_operation("get_by_id", outcome(&fetched));
        let report = fetched
            .map_err(|err| store_error(&err, LOAD_FAILED_MESSAGE))?
            .ok_or_else(not_found)?;

        Ok::<_, ApiError>(Json(QrPayload {
            verification_url: verification_url(&state.config.public_origin, &report.id),
            id: report.id,
            filename: QR_DOWNLOAD_FILENAME,
        }))
    }
    .instrument(span.clone())
    .await;

    span.in_scope(|| finish_span(started, &result));
    observe("/v1/reports/{id}/qr", "GET", StatusCode::OK, started, &result);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_filter_defaults_to_everything() {
        let filter = parse_list_filter(ListQuery::default()).expect("valid");
        assert!(filter.is_unfiltered());

        let filter = parse_list_filter(ListQuery {
            search: Some("jasa".to_string()),
            year: Some("2024".to_string()),
        })
        .expect("valid");
        assert_eq!(filter.year, YearFilter::Year(2024));
        assert_eq!(filter.search, "jasa");
    }

    #[test]
    fn bad_year_is_rejected() {
        let (status, Json(body)) = parse_list_filter(ListQuery {
            search: None,
            year: Some("tahun lalu".to_string()),
        })
        .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.code, "ERR_INVALID_PARAMS");
    }

    #[test]
    fn only_explicit_confirmation_counts() {
        for (raw, expected) in [
            (None, false),
            (Some("false"), false),
            (Some(""), false),
            (Some("true"), true),
            (Some("1"), true),
        ] {
            let query = DeleteQuery {
                confirm: raw.map(str::to_string),
            };
            assert_eq!(is_confirmed(&query), expected, "{:?}", raw);
        }
    }

    #[test]
    fn malformed_delete_query_is_a_json_400() {
        let uri: axum::http::Uri = "/v1/reports/r1?confirm=true&confirm=false"
            .parse()
            .expect("valid uri");
        let (status, Json(body)) =
            delete_confirmation(Query::<DeleteQuery>::try_from_uri(&uri)).unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.code, "ERR_INVALID_PARAMS");
        assert_eq!(body.message, "invalid query string");

        let uri: axum::http::Uri = "/v1/reports/r1?confirm=yes"
            .parse()
            .expect("valid uri");
        let confirmation =
            delete_confirmation(Query::<DeleteQuery>::try_from_uri(&uri)).expect("valid query");
        assert_eq!(confirmation, DeleteConfirmation::Confirmed);
    }
}
