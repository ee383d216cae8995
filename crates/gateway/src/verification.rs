use chrono::{DateTime, FixedOffset, Utc};
use lai_contracts::certificate::CertificateView;
use lai_store::ReportStore;

use crate::catalog::outcome;
use crate::metrics;

pub const INVALID_CODE_MESSAGE: &str = "Kode verifikasi tidak valid";
pub const NOT_FOUND_MESSAGE: &str = "Data laporan tidak ditemukan";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationError {
    InvalidIdentifier,
    NotFound,
}

impl VerificationError {
    pub fn code(self) -> &'static str {
        match self {
            VerificationError::InvalidIdentifier => "ERR_INVALID_CODE",
            VerificationError::NotFound => "ERR_NOT_FOUND",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            VerificationError::InvalidIdentifier => INVALID_CODE_MESSAGE,
            VerificationError::NotFound => NOT_FOUND_MESSAGE,
        }
    }
}

impl std::fmt::Display for VerificationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for VerificationError {}

/// Display zone plus the moment the page was viewed, captured once.
#[derive(Debug, Clone, Copy)]
pub struct DisplayClock {
    pub zone: FixedOffset,
    pub viewed_at: DateTime<Utc>,
}

impl DisplayClock {
    pub fn now(zone: FixedOffset) -> Self {
        Self {
            zone,
            viewed_at: Utc::now(),
        }
    }
}

/// Public lookup behind the QR code. Possession of the id is the only
/// credential.
pub async fn resolve(
    store: &ReportStore,
    code: Option<&str>,
    clock: &DisplayClock,
) -> Result<CertificateView, VerificationError> {
    let Some(id) = code.map(str::trim).filter(|c| !c.is_empty()) else {
        metrics::observe_verification("invalid_code");
        return Err(VerificationError::InvalidIdentifier);
    };

    let result = store.get_by_id(id).await;
    metrics::observe_store_operation("get_by_id", outcome(&result));

    let report = match result {
        Ok(Some(report)) => report,
        Ok(None) => {
            metrics::observe_verification("not_found");
            return Err(VerificationError::NotFound);
        }
        Err(err) => {
            tracing::warn!(report_id = %id, error = %err, "verification.store_failed");
            metrics::observe_verification("store_error");
            return Err(VerificationError::NotFound);
        }
    };

    metrics::observe_verification("found");
    Ok(CertificateView::render(&report, clock.zone, clock.viewed_at))
}
