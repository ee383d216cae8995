//! Read-only certificate shown to whoever scans a report's QR code.

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;

use crate::AuditReport;
use crate::format::{
    display_or_dash, format_amount, format_date, format_generated_at, format_periode,
    format_timestamp_date,
};

pub const HEADER_LINES: [&str; 3] = [
    "Kementerian Keuangan Republik Indonesia",
    "Direktorat Jenderal Stabilitas dan Pengembangan Sektor Keuangan",
    "Direktorat Pembinaan dan Pengawasan Profesi Keuangan",
];

pub const OPENING: &str = "Laporan Auditor Independen telah terdaftar pada aplikasi Pelita di Direktorat Pembinaan dan Pengawasan Profesi Keuangan dengan informasi sebagai berikut:";

pub const FLAG_MARKER: &str = " *";

pub const UNVERIFIABLE_NOTE: &str = "Keterangan tanda (*): Angka tersebut tidak dapat dikonfirmasi kebenarannya karena PT. LINGGA JATI QAIREEN menolak untuk menyampaikan laporan keuangan auditan kepada DPPPK Kementerian Keuangan.";

pub const KAP_DISCLAIMER: &str = "Disclaimer: Semua informasi dalam QR Code dibuat oleh KAP yang bersangkutan. DPPPK tidak bertanggung jawab atas kesalahan informasi yang disampaikan KAP.";

pub const CONTACT: &str = "Untuk informasi lebih lanjut silakan hubungi (021) 3505112 atau email ke kemenkeu.prime@kemenkeu.go.id";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateRow {
    pub key: &'static str,
    pub label: &'static str,
    pub value: String,
    pub flagged: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateView {
    pub id: String,
    pub header: [&'static str; 3],
    pub opening: &'static str,
    pub rows: Vec<CertificateRow>,
    pub is_unverifiable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unverifiable_note: Option<&'static str>,
    pub disclaimer: &'static str,
    pub contact: &'static str,
    pub created_at: String,
    pub generated_at: String,
}

impl CertificateView {
    /// Renders `report` for display in `zone`; `viewed_at` is the one-shot
    /// "generated at" capture for the footer.
    pub fn render(report: &AuditReport, zone: FixedOffset, viewed_at: DateTime<Utc>) -> Self {
        let flagged = report.is_unverifiable;
        let money = |amount: i64| {
            let mut out = format_amount(amount);
            if flagged {
                out.push_str(FLAG_MARKER);
            }
            out
        };

        let row = |key, label, value: String| CertificateRow {
            key,
            label,
            value: display_or_dash(&value),
            flagged: false,
        };

        let rows = vec![
            row("nama_kap", "A. Nama KAP", report.nama_kap.clone()),
            row("nama_klien", "B. Nama Klien", report.nama_klien.clone()),
            row("periode", "C. Periode", format_periode(&report.periode)),
            row("no_lai", "D. No. LAI", report.no_lai.clone()),
            row("tgl_lai", "E. Tgl. LAI", format_date(report.tgl_lai)),
            row(
                "ap_penanggungjawab",
                "F. AP Penanggungjawab",
                report.ap_penanggungjawab.clone(),
            ),
            row("opini", "G. Opini", report.opini.clone()),
            CertificateRow {
                key: "total_aset",
                label: "H. Total Aset",
                value: money(report.total_aset),
                flagged,
            },
            CertificateRow {
                key: "laba_bersih",
                label: "I. Laba/Rugi Bersih",
                value: money(report.laba_bersih),
                flagged,
            },
        ];

        Self {
            id: report.id.clone(),
            header: HEADER_LINES,
            opening: OPENING,
            rows,
            is_unverifiable: flagged,
            unverifiable_note: flagged.then_some(UNVERIFIABLE_NOTE),
            disclaimer: KAP_DISCLAIMER,
            contact: CONTACT,
            created_at: format_timestamp_date(report.display_created_at(), zone),
            generated_at: format_generated_at(viewed_at, zone),
        }
    }

    pub fn value(&self, key: &str) -> Option<&str> {
        self.rows
            .iter()
            .find(|row| row.key == key)
            .map(|row| row.value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{default_display_zone, parse_timestamp};
    use chrono::NaiveDate;

    fn report(is_unverifiable: bool) -> AuditReport {
        AuditReport {
            id: "01J0AUDIT".to_string(),
            nama_kap: "KAP Amir Abadi Jusuf, Aryanto, Mawar & Rekan".to_string(),
            nama_klien: "PT Lingga Jati Qaireen".to_string(),
            periode: "2023-01-01 s.d. 2023-12-31".to_string(),
            no_lai: "00877/2.1030/AU.1/06/0645-1/1/IX/2022".to_string(),
            tgl_lai: NaiveDate::from_ymd_opt(2024, 3, 15).expect("valid date"),
            ap_penanggungjawab: "Dedy Sukrisnadi".to_string(),
            opini: "WTP".to_string(),
            total_aset: 1_000_000,
            laba_bersih: -2_500_000,
            is_unverifiable,
            created_at: parse_timestamp("2024-04-01T20:00:00Z").expect("valid timestamp"),
            manual_created_at: None,
        }
    }

    fn viewed_at() -> DateTime<Utc> {
        parse_timestamp("2026-10-16T07:05:09Z").expect("valid timestamp")
    }

    #[test]
    fn renders_every_row_with_display_formats() {
        let view = CertificateView::render(&report(false), default_display_zone(), viewed_at());

        assert_eq!(view.rows.len(), 9);
        assert_eq!(view.value("periode"), Some("01/01/2023 s.d. 31/12/2023"));
        assert_eq!(view.value("tgl_lai"), Some("15/03/2024"));
        assert_eq!(view.value("total_aset"), Some("IDR 1.000.000"));
        assert_eq!(view.value("laba_bersih"), Some("IDR -2.500.000"));
        assert_eq!(view.created_at, "02/04/2024");
        assert_eq!(view.generated_at, "16 Oktober 2026 pukul 14:05:09");
        assert_eq!(view.disclaimer, KAP_DISCLAIMER);
    }

    #[test]
    fn unverifiable_flags_both_amounts_and_adds_note() {
        let view = CertificateView::render(&report(true), default_display_zone(), viewed_at());

        assert_eq!(view.value("total_aset"), Some("IDR 1.000.000 *"));
        assert_eq!(view.value("laba_bersih"), Some("IDR -2.500.000 *"));
        assert_eq!(view.unverifiable_note, Some(UNVERIFIABLE_NOTE));
        assert!(
            view.rows
                .iter()
                .filter(|r| r.flagged)
                .all(|r| r.key == "total_aset" || r.key == "laba_bersih")
        );
        assert_eq!(view.rows.iter().filter(|r| r.flagged).count(), 2);
    }

    #[test]
    fn verified_report_has_neither_marker_nor_note() {
        let view = CertificateView::render(&report(false), default_display_zone(), viewed_at());

        assert!(view.rows.iter().all(|r| !r.flagged && !r.value.ends_with(FLAG_MARKER)));
        assert_eq!(view.unverifiable_note, None);

        let json = serde_json::to_value(&view).expect("view serializes");
        assert!(json.get("unverifiable_note").is_none());
    }

    #[test]
    fn manual_created_at_overrides_footer_date() {
        let mut report = report(false);
        report.manual_created_at = Some(parse_timestamp("2022-01-10T00:00:00Z").expect("valid"));
        let view = CertificateView::render(&report, default_display_zone(), viewed_at());
        assert_eq!(view.created_at, "10/01/2022");
    }

    #[test]
    fn blank_text_renders_as_dash_and_legacy_periode_verbatim() {
        let mut report = report(false);
        report.opini = "  ".to_string();
        report.periode = "Tahun buku 2023".to_string();
        let view = CertificateView::render(&report, default_display_zone(), viewed_at());
        assert_eq!(view.value("opini"), Some("-"));
        assert_eq!(view.value("periode"), Some("Tahun buku 2023"));
    }
}
