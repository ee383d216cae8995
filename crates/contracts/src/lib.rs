use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub mod certificate;
pub mod filter;
pub mod form;
pub mod format;

pub const PERIODE_SEPARATOR: &str = " s.d. ";
pub const NO_LAI_SEPARATOR: char = '/';
pub const NO_LAI_SEGMENTS: usize = 8;

pub const VERIFICATION_PATH: &str = "/api/VerifikasiLai";
pub const VERIFICATION_QUERY_PARAM: &str = "code";

/// One row per registered LAI certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    pub id: String,
    pub nama_kap: String,
    pub nama_klien: String,
    pub periode: String,
    pub no_lai: String,
    pub tgl_lai: NaiveDate,
    pub ap_penanggungjawab: String,
    pub opini: String,
    pub total_aset: i64,
    pub laba_bersih: i64,
    pub is_unverifiable: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub manual_created_at: Option<DateTime<Utc>>,
}

impl AuditReport {
    /// Timestamp shown to readers; an operator override wins over the insert time.
    pub fn display_created_at(&self) -> DateTime<Utc> {
        self.manual_created_at.unwrap_or(self.created_at)
    }

    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            id: self.id.clone(),
            nama_kap: self.nama_kap.clone(),
            nama_klien: self.nama_klien.clone(),
            periode: self.periode.clone(),
            no_lai: self.no_lai.clone(),
            created_at: self.created_at,
        }
    }

    pub fn from_new(id: String, created_at: DateTime<Utc>, report: NewAuditReport) -> Self {
        Self {
            id,
            nama_kap: report.nama_kap,
            nama_klien: report.nama_klien,
            periode: report.periode,
            no_lai: report.no_lai,
            tgl_lai: report.tgl_lai,
            ap_penanggungjawab: report.ap_penanggungjawab,
            opini: report.opini,
            total_aset: report.total_aset,
            laba_bersih: report.laba_bersih,
            is_unverifiable: report.is_unverifiable,
            created_at,
            manual_created_at: report.manual_created_at,
        }
    }

    /// Full replace of every writable field. `id` and `created_at` are kept.
    pub fn apply_update(&mut self, report: NewAuditReport) {
        self.nama_kap = report.nama_kap;
        self.nama_klien = report.nama_klien;
        self.periode = report.periode;
        self.no_lai = report.no_lai;
        self.tgl_lai = report.tgl_lai;
        self.ap_penanggungjawab = report.ap_penanggungjawab;
        self.opini = report.opini;
        self.total_aset = report.total_aset;
        self.laba_bersih = report.laba_bersih;
        self.is_unverifiable = report.is_unverifiable;
        self.manual_created_at = report.manual_created_at;
    }
}

/// Write payload for insert and update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAuditReport {
    pub nama_kap: String,
    pub nama_klien: String,
    pub periode: String,
    pub no_lai: String,
    pub tgl_lai: NaiveDate,
    pub ap_penanggungjawab: String,
    pub opini: String,
    pub total_aset: i64,
    pub laba_bersih: i64,
    pub is_unverifiable: bool,
    #[serde(default)]
    pub manual_created_at: Option<DateTime<Utc>>,
}

/// List projection. Financial figures and the unverifiable flag stay out of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub id: String,
    pub nama_kap: String,
    pub nama_klien: String,
    pub periode: String,
    pub no_lai: String,
    pub created_at: DateTime<Utc>,
}

pub fn verification_path(id: &str) -> String {
    format!("{}?{}={}", VERIFICATION_PATH, VERIFICATION_QUERY_PARAM, id)
}

/// Fully qualified QR payload: `<origin>/api/VerifikasiLai?code=<id>`.
pub fn verification_url(origin: &str, id: &str) -> String {
    format!("{}{}", origin.trim_end_matches('/'), verification_path(id))
}

pub fn edit_path(id: &str) -> String {
    format!("/database/audit-reports/{}/edit", id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_new() -> NewAuditReport {
        NewAuditReport {
            nama_kap: "KAP Amir Abadi Jusuf, Aryanto, Mawar & Rekan".to_string(),
            nama_klien: "PT Jasa Marga (Persero) Tbk".to_string(),
            periode: "2023-01-01 s.d. 2023-12-31".to_string(),
            no_lai: "00877/2.1030/AU.1/06/0645-1/1/IX/2022".to_string(),
            tgl_lai: NaiveDate::from_ymd_opt(2024, 3, 15).expect("valid date"),
            ap_penanggungjawab: "Dedy Sukrisnadi".to_string(),
            opini: "WTP".to_string(),
            total_aset: 1_000_000,
            laba_bersih: -250_000,
            is_unverifiable: false,
            manual_created_at: None,
        }
    }

    #[test]
    fn verification_url_is_fully_qualified_and_ignores_trailing_slash() {
        assert_eq!(
            verification_url("https://lai.example.go.id/", "01HXYZ"),
            "https://lai.example.go.id/api/VerifikasiLai?code=01HXYZ"
        );
        assert_eq!(
            verification_url("https://lai.example.go.id", "01HXYZ"),
            "https://lai.example.go.id/api/VerifikasiLai?code=01HXYZ"
        );
    }

    #[test]
    fn display_created_at_prefers_manual_override() {
        let created_at = DateTime::parse_from_rfc3339("2024-05-01T03:00:00Z")
            .expect("valid timestamp")
            .with_timezone(&Utc);
        let manual = DateTime::parse_from_rfc3339("2022-01-10T00:00:00Z")
            .expect("valid timestamp")
            .with_timezone(&Utc);

        let mut report = AuditReport::from_new("id1".to_string(), created_at, sample_new());
        assert_eq!(report.display_created_at(), created_at);

        report.manual_created_at = Some(manual);
        assert_eq!(report.display_created_at(), manual);
    }

    #[test]
    fn apply_update_keeps_identity_and_insert_time() {
        let created_at = Utc::now();
        let mut report = AuditReport::from_new("id1".to_string(), created_at, sample_new());

        let mut changed = sample_new();
        changed.opini = "WDP".to_string();
        changed.is_unverifiable = true;
        report.apply_update(changed);

        assert_eq!(report.id, "id1");
        assert_eq!(report.created_at, created_at);
        assert_eq!(report.opini, "WDP");
        assert!(report.is_unverifiable);
    }

    #[test]
    fn summary_omits_financial_fields() {
        let report = AuditReport::from_new("id1".to_string(), Utc::now(), sample_new());
        let value = serde_json::to_value(report.summary()).expect("summary serializes");
        let obj = value.as_object().expect("summary is an object");

        assert!(obj.contains_key("no_lai"));
        assert!(!obj.contains_key("total_aset"));
        assert!(!obj.contains_key("laba_bersih"));
        assert!(!obj.contains_key("is_unverifiable"));
    }
}
