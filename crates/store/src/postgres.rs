use std::time::Duration;

use lai_contracts::{AuditReport, NewAuditReport, ReportSummary};
use sqlx::Row;
use sqlx::postgres::{PgPoolOptions, PgRow};
use ulid::Ulid;

use crate::StoreError;

const REPORT_COLUMNS: &str = "id, nama_kap, nama_klien, periode, no_lai, tgl_lai, ap_penanggungjawab, opini, total_aset, laba_bersih, is_unverifiable, created_at, manual_created_at";

#[derive(Clone)]
pub struct PgReportStore {
    pool: sqlx::PgPool,
    op_timeout: Duration,
}

impl PgReportStore {
    pub async fn connect(
        db_url: &str,
        max_connections: u32,
        op_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = tokio::time::timeout(
            Duration::from_secs(2),
            PgPoolOptions::new()
                .max_connections(max_connections.max(1))
                .connect(db_url),
        )
        .await
        .map_err(|_| StoreError::Timeout)??;

        Ok(Self { pool, op_timeout })
    }

    pub async fn connect_and_migrate(
        db_url: &str,
        max_connections: u32,
        op_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let store = Self::connect(db_url, max_connections, op_timeout).await?;
        store.migrate().await?;
        Ok(store)
    }

    pub fn from_pool(pool: sqlx::PgPool, op_timeout: Duration) -> Self {
        Self { pool, op_timeout }
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        tokio::time::timeout(Duration::from_secs(10), migrate(&self.pool))
            .await
            .map_err(|_| StoreError::Timeout)??;
        Ok(())
    }

    pub async fn insert(&self, report: &NewAuditReport) -> Result<String, StoreError> {
        let id = Ulid::new().to_string();

        tokio::time::timeout(
            self.op_timeout,
            sqlx::query(
                "INSERT INTO audit_reports (id, nama_kap, nama_klien, periode, no_lai, tgl_lai, ap_penanggungjawab, opini, total_aset, laba_bersih, is_unverifiable, manual_created_at) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12)",
            )
            .bind(&id)
            .bind(&report.nama_kap)
            .bind(&report.nama_klien)
            .bind(&report.periode)
            .bind(&report.no_lai)
            .bind(report.tgl_lai)
            .bind(&report.ap_penanggungjawab)
            .bind(&report.opini)
            .bind(report.total_aset)
            .bind(report.laba_bersih)
            .bind(report.is_unverifiable)
            .bind(report.manual_created_at)
            .execute(&self.pool),
        )
        .await
        .map_err(|_| StoreError::Timeout)??;

        Ok(id)
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<AuditReport>, StoreError> {
        let query = format!("SELECT {} FROM audit_reports WHERE id = $1", REPORT_COLUMNS);
        let row = tokio::time::timeout(
            self.op_timeout,
            sqlx::query(&query).bind(id).fetch_optional(&self.pool),
        )
        .await
        .map_err(|_| StoreError::Timeout)??;

        row.as_ref().map(report_from_row).transpose()
    }

    pub async fn list_all(&self) -> Result<Vec<ReportSummary>, StoreError> {
        let rows = tokio::time::timeout(
            self.op_timeout,
            sqlx::query(
                "SELECT id, nama_kap, nama_klien, periode, no_lai, created_at FROM audit_reports ORDER BY created_at DESC, id DESC",
            )
            .fetch_all(&self.pool),
        )
        .await
        .map_err(|_| StoreError::Timeout)??;

        rows.iter().map(summary_from_row).collect()
    }

    pub async fn update_by_id(
        &self,
        id: &str,
        report: &NewAuditReport,
    ) -> Result<bool, StoreError> {
        let result = tokio::time::timeout(
            self.op_timeout,
            sqlx::query(
                "UPDATE audit_reports SET nama_kap = $1, nama_klien = $2, periode = $3, no_lai = $4, tgl_lai = $5, ap_penanggungjawab = $6, opini = $7, total_aset = $8, laba_bersih = $9, is_unverifiable = $10, manual_created_at = $11 WHERE id = $12",
            )
            .bind(&report.nama_kap)
            .bind(&report.nama_klien)
            .bind(&report.periode)
            .bind(&report.no_lai)
            .bind(report.tgl_lai)
            .bind(&report.ap_penanggungjawab)
            .bind(&report.opini)
            .bind(report.total_aset)
            .bind(report.laba_bersih)
            .bind(report.is_unverifiable)
            .bind(report.manual_created_at)
            .bind(id)
            .execute(&self.pool),
        )
        .await
        .map_err(|_| StoreError::Timeout)??;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_by_id(&self, id: &str) -> Result<(), StoreError> {
        tokio::time::timeout(
            self.op_timeout,
            sqlx::query("DELETE FROM audit_reports WHERE id = $1")
                .bind(id)
                .execute(&self.pool),
        )
        .await
        .map_err(|_| StoreError::Timeout)??;
        Ok(())
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        tokio::time::timeout(
            self.op_timeout,
            sqlx::query("SELECT 1").execute(&self.pool),
        )
        .await
        .map_err(|_| StoreError::Timeout)??;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn report_from_row(row: &PgRow) -> Result<AuditReport, StoreError> {
    Ok(AuditReport {
        id: row.try_get("id")?,
        nama_kap: row.try_get("nama_kap")?,
        nama_klien: row.try_get("nama_klien")?,
        periode: row.try_get("periode")?,
        no_lai: row.try_get("no_lai")?,
        tgl_lai: row.try_get("tgl_lai")?,
        ap_penanggungjawab: row.try_get("ap_penanggungjawab")?,
        opini: row.try_get("opini")?,
        total_aset: row.try_get("total_aset")?,
        laba_bersih: row.try_get("laba_bersih")?,
        is_unverifiable: row.try_get("is_unverifiable")?,
        created_at: row.try_get("created_at")?,
        manual_created_at: row.try_get("manual_created_at")?,
    })
}

fn summary_from_row(row: &PgRow) -> Result<ReportSummary, StoreError> {
    Ok(ReportSummary {
        id: row.try_get("id")?,
        nama_kap: row.try_get("nama_kap")?,
        nama_klien: row.try_get("nama_klien")?,
        periode: row.try_get("periode")?,
        no_lai: row.try_get("no_lai")?,
        created_at: row.try_get("created_at")?,
    })
}

pub async fn migrate(pool: &sqlx::PgPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
