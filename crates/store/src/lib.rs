use std::time::Duration;

use lai_contracts::{AuditReport, NewAuditReport, ReportSummary};

mod memory;
mod postgres;

pub use memory::MemoryReportStore;
pub use postgres::{PgReportStore, migrate};

#[derive(Debug)]
pub enum StoreError {
    Timeout,
    Unavailable,
    Sqlx(sqlx::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Timeout => write!(f, "store operation timed out"),
            StoreError::Unavailable => write!(f, "store unavailable"),
            StoreError::Sqlx(err) => write!(f, "store sql error: {}", err),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(value: sqlx::Error) -> Self {
        StoreError::Sqlx(value)
    }
}

/// Record store for audit reports. Every operation stands alone: there is no
/// transaction spanning records and updates are last-write-wins.
#[derive(Clone)]
pub enum ReportStore {
    Postgres(PgReportStore),
    Memory(MemoryReportStore),
}

impl ReportStore {
    pub async fn connect_postgres(
        db_url: &str,
        max_connections: u32,
        op_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let store = PgReportStore::connect_and_migrate(db_url, max_connections, op_timeout).await?;
        Ok(ReportStore::Postgres(store))
    }

    pub fn memory() -> Self {
        ReportStore::Memory(MemoryReportStore::new())
    }

    /// Inserts a new report and returns the generated id.
    pub async fn insert(&self, report: &NewAuditReport) -> Result<String, StoreError> {
        match self {
            ReportStore::Postgres(store) => store.insert(report).await,
            ReportStore::Memory(store) => store.insert(report),
        }
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<AuditReport>, StoreError> {
        match self {
            ReportStore::Postgres(store) => store.get_by_id(id).await,
            ReportStore::Memory(store) => store.get_by_id(id),
        }
    }

    /// Every report's list projection, newest `created_at` first.
    pub async fn list_all(&self) -> Result<Vec<ReportSummary>, StoreError> {
        match self {
            ReportStore::Postgres(store) => store.list_all().await,
            ReportStore::Memory(store) => store.list_all(),
        }
    }

    /// Full replace. `Ok(false)` when no report has this id.
    pub async fn update_by_id(&self, id: &str, report: &NewAuditReport) -> Result<bool, StoreError> {
        match self {
            ReportStore::Postgres(store) => store.update_by_id(id, report).await,
            ReportStore::Memory(store) => store.update_by_id(id, report),
        }
    }

    pub async fn delete_by_id(&self, id: &str) -> Result<(), StoreError> {
        match self {
            ReportStore::Postgres(store) => store.delete_by_id(id).await,
            ReportStore::Memory(store) => store.delete_by_id(id),
        }
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        match self {
            ReportStore::Postgres(store) => store.ping().await,
            ReportStore::Memory(store) => store.ping(),
        }
    }

    pub fn backend(&self) -> &'static str {
        match self {
            ReportStore::Postgres(_) => "postgres",
            ReportStore::Memory(_) => "memory",
        }
    }

    pub async fn close(&self) {
        if let ReportStore::Postgres(store) = self {
            store.close().await;
        }
    }
}

impl From<MemoryReportStore> for ReportStore {
    fn from(value: MemoryReportStore) -> Self {
        ReportStore::Memory(value)
    }
}

impl From<PgReportStore> for ReportStore {
    fn from(value: PgReportStore) -> Self {
        ReportStore::Postgres(value)
    }
}
