//! The report list as the management screen sees it: one full load, then
//! filtering and per-row actions over that in-memory set.

use chrono::FixedOffset;
use lai_contracts::filter::{self, ListFilter};
use lai_contracts::format::{format_periode, format_timestamp_date};
use lai_contracts::{ReportSummary, edit_path, verification_path, verification_url};
use lai_store::{ReportStore, StoreError};
use serde::Serialize;

use crate::metrics;

pub const DELETE_CONFIRMATION_PROMPT: &str =
    "Yakin ingin menghapus laporan audit ini? Data tidak dapat dikembalikan.";

pub const QR_DOWNLOAD_FILENAME: &str = "qr-laporan-audit.png";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteConfirmation {
    Confirmed,
    Unconfirmed,
}

impl DeleteConfirmation {
    pub fn from_flag(confirmed: bool) -> Self {
        if confirmed {
            DeleteConfirmation::Confirmed
        } else {
            DeleteConfirmation::Unconfirmed
        }
    }
}

#[derive(Debug)]
pub enum CatalogError {
    ConfirmationRequired,
    Store(StoreError),
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogError::ConfirmationRequired => f.write_str(DELETE_CONFIRMATION_PROMPT),
            CatalogError::Store(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for CatalogError {}

impl From<StoreError> for CatalogError {
    fn from(value: StoreError) -> Self {
        CatalogError::Store(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowActions {
    pub view_path: String,
    pub edit_path: String,
    pub qr_url: String,
}

impl RowActions {
    pub fn for_report(id: &str, public_origin: &str) -> Self {
        Self {
            view_path: verification_path(id),
            edit_path: edit_path(id),
            qr_url: verification_url(public_origin, id),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogRow {
    #[serde(flatten)]
    pub summary: ReportSummary,
    pub periode_display: String,
    pub created_at_display: String,
    pub actions: RowActions,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogView {
    pub filter: ListFilter,
    pub total: usize,
    pub rows: Vec<CatalogRow>,
    pub year_options: Vec<i32>,
    pub delete_prompt: &'static str,
}

/// Calls the store delete only for a confirmed request.
pub async fn delete_report(
    store: &ReportStore,
    id: &str,
    confirmation: DeleteConfirmation,
) -> Result<(), CatalogError> {
    if confirmation != DeleteConfirmation::Confirmed {
        return Err(CatalogError::ConfirmationRequired);
    }
    let result = store.delete_by_id(id).await;
    metrics::observe_store_operation("delete_by_id", outcome(&result));
    result?;
    Ok(())
}

pub(crate) fn outcome<T>(result: &Result<T, StoreError>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(StoreError::Timeout) => "timeout",
        Err(_) => "error",
    }
}

/// Every summary in the store, newest first, held for repeated filtering.
#[derive(Debug, Clone)]
pub struct ReportList {
    rows: Vec<ReportSummary>,
    zone: FixedOffset,
}

impl ReportList {
    pub async fn load(store: &ReportStore, zone: FixedOffset) -> Result<Self, StoreError> {
        let result = store.list_all().await;
        metrics::observe_store_operation("list_all", outcome(&result));
        Ok(Self {
            rows: result?,
            zone,
        })
    }

    pub fn from_rows(rows: Vec<ReportSummary>, zone: FixedOffset) -> Self {
        Self { rows, zone }
    }

    pub fn rows(&self) -> &[ReportSummary] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn filter(&self, filter: &ListFilter) -> Vec<&ReportSummary> {
        filter::apply(&self.rows, filter, self.zone)
    }

    pub fn year_options(&self) -> Vec<i32> {
        filter::year_options(&self.rows, self.zone)
    }

    pub fn view(&self, filter: &ListFilter, public_origin: &str) -> CatalogView {
        let rows = self
            .filter(filter)
            .into_iter()
            .map(|row| CatalogRow {
                summary: row.clone(),
                periode_display: format_periode(&row.periode),
                created_at_display: format_timestamp_date(row.created_at, self.zone),
                actions: RowActions::for_report(&row.id, public_origin),
            })
            .collect();

        CatalogView {
            filter: filter.clone(),
            total: self.rows.len(),
            rows,
            year_options: self.year_options(),
            delete_prompt: DELETE_CONFIRMATION_PROMPT,
        }
    }

    /// Deletes in the store, then drops the row locally without a reload.
    pub async fn delete(
        &mut self,
        store: &ReportStore,
        id: &str,
        confirmation: DeleteConfirmation,
    ) -> Result<(), CatalogError> {
        delete_report(store, id, confirmation).await?;
        self.rows.retain(|row| row.id != id);
        Ok(())
    }
}
