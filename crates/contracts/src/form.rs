use serde::{Deserialize, Serialize};

use crate::format::{coerce_amount, iso_date, parse_iso_date, parse_timestamp};
use crate::{AuditReport, NO_LAI_SEGMENTS, NO_LAI_SEPARATOR, NewAuditReport, PERIODE_SEPARATOR};

/// Structured upload/edit form exactly as the operator typed it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportForm {
    pub nama_kap: String,
    pub nama_klien: String,
    pub periode_awal: String,
    pub periode_akhir: String,
    pub no_lai_parts: [String; NO_LAI_SEGMENTS],
    pub tgl_lai: String,
    pub ap_penanggungjawab: String,
    pub opini: String,
    pub total_aset: String,
    pub laba_bersih: String,
    pub is_unverifiable: bool,
    pub manual_created_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: &'static str,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// A stored record whose composite strings do not have the shape this
/// system writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitError {
    Periode { value: String },
    NoLai { value: String, segments: usize },
}

impl std::fmt::Display for SplitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SplitError::Periode { value } => write!(
                f,
                "periode `{}` is not two ISO dates joined by `{}`",
                value,
                PERIODE_SEPARATOR.trim()
            ),
            SplitError::NoLai { value, segments } => write!(
                f,
                "no_lai `{}` has {} non-empty segments, expected {}",
                value, segments, NO_LAI_SEGMENTS
            ),
        }
    }
}

impl std::error::Error for SplitError {}

fn invalid(field: &'static str, message: &'static str) -> ValidationError {
    ValidationError { field, message }
}

fn require(value: &str, field: &'static str, message: &'static str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(invalid(field, message));
    }
    Ok(())
}

/// Checks the form rule by rule and stops at the first violation.
pub fn validate(form: &ReportForm) -> Result<(), ValidationError> {
    require(&form.nama_kap, "nama_kap", "Nama KAP wajib diisi")?;
    require(&form.nama_klien, "nama_klien", "Nama Klien wajib diisi")?;
    if form.periode_awal.trim().is_empty() || form.periode_akhir.trim().is_empty() {
        return Err(invalid("periode", "Periode audit wajib diisi lengkap"));
    }
    require(&form.tgl_lai, "tgl_lai", "Tanggal LAI wajib diisi")?;
    require(
        &form.ap_penanggungjawab,
        "ap_penanggungjawab",
        "AP Penanggung Jawab wajib diisi",
    )?;
    require(&form.opini, "opini", "Opini audit wajib diisi")?;
    require(&form.total_aset, "total_aset", "Total aset wajib diisi")?;
    require(&form.laba_bersih, "laba_bersih", "Laba/Rugi bersih wajib diisi")?;
    if form.no_lai_parts.iter().any(|p| p.trim().is_empty()) {
        return Err(invalid("no_lai", "Semua bagian Nomor LAI wajib diisi"));
    }

    // Shape rules. They only run once every required field is present.
    if form.no_lai_parts.iter().any(|p| p.contains(NO_LAI_SEPARATOR)) {
        return Err(invalid(
            "no_lai",
            "Bagian Nomor LAI tidak boleh mengandung '/'",
        ));
    }
    if parse_iso_date(&form.periode_awal).is_none() || parse_iso_date(&form.periode_akhir).is_none()
    {
        return Err(invalid("periode", "Format tanggal tidak valid"));
    }
    if parse_iso_date(&form.tgl_lai).is_none() {
        return Err(invalid("tgl_lai", "Format tanggal tidak valid"));
    }
    if let Some(raw) = form.manual_created_at_value()
        && parse_timestamp(raw).is_none()
    {
        return Err(invalid("manual_created_at", "Format tanggal tidak valid"));
    }
    if coerce_amount(&form.total_aset).is_none() {
        return Err(invalid("total_aset", "Nilai keuangan tidak valid"));
    }
    if coerce_amount(&form.laba_bersih).is_none() {
        return Err(invalid("laba_bersih", "Nilai keuangan tidak valid"));
    }

    Ok(())
}

pub fn join_periode(awal: &str, akhir: &str) -> String {
    format!("{}{}{}", awal.trim(), PERIODE_SEPARATOR, akhir.trim())
}

pub fn join_no_lai<S: AsRef<str>>(parts: &[S]) -> String {
    parts
        .iter()
        .map(|p| p.as_ref().trim())
        .collect::<Vec<_>>()
        .join(&NO_LAI_SEPARATOR.to_string())
}

/// Inverse of [`join_periode`]. Exactly one separator and two ISO dates.
pub fn split_periode(periode: &str) -> Result<(String, String), SplitError> {
    let err = || SplitError::Periode {
        value: periode.to_string(),
    };

    let (awal, akhir) = periode.split_once(PERIODE_SEPARATOR).ok_or_else(err)?;
    if akhir.contains(PERIODE_SEPARATOR) {
        return Err(err());
    }
    if parse_iso_date(awal).is_none() || parse_iso_date(akhir).is_none() {
        return Err(err());
    }

    Ok((awal.to_string(), akhir.to_string()))
}

/// Inverse of [`join_no_lai`]. Exactly eight non-empty segments.
pub fn split_no_lai(no_lai: &str) -> Result<[String; NO_LAI_SEGMENTS], SplitError> {
    let parts = no_lai.split(NO_LAI_SEPARATOR).collect::<Vec<_>>();
    let non_empty = parts.iter().filter(|p| !p.trim().is_empty()).count();

    if parts.len() != NO_LAI_SEGMENTS || non_empty != NO_LAI_SEGMENTS {
        return Err(SplitError::NoLai {
            value: no_lai.to_string(),
            segments: non_empty,
        });
    }

    Ok(std::array::from_fn(|idx| parts[idx].to_string()))
}

impl ReportForm {
    fn manual_created_at_value(&self) -> Option<&str> {
        self.manual_created_at
            .as_deref()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    /// Live preview of the LAI number while segments are still being typed.
    pub fn no_lai_preview(&self) -> String {
        self.no_lai_parts
            .iter()
            .filter(|p| !p.is_empty())
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(&NO_LAI_SEPARATOR.to_string())
    }

    /// Validates, then joins the composite fields and coerces the amounts.
    pub fn into_new_report(&self) -> Result<NewAuditReport, ValidationError> {
        validate(self)?;

        let awal = parse_iso_date(&self.periode_awal)
            .ok_or_else(|| invalid("periode", "Format tanggal tidak valid"))?;
        let akhir = parse_iso_date(&self.periode_akhir)
            .ok_or_else(|| invalid("periode", "Format tanggal tidak valid"))?;
        let tgl_lai = parse_iso_date(&self.tgl_lai)
            .ok_or_else(|| invalid("tgl_lai", "Format tanggal tidak valid"))?;
        let total_aset = coerce_amount(&self.total_aset)
            .ok_or_else(|| invalid("total_aset", "Nilai keuangan tidak valid"))?;
        let laba_bersih = coerce_amount(&self.laba_bersih)
            .ok_or_else(|| invalid("laba_bersih", "Nilai keuangan tidak valid"))?;
        let manual_created_at = match self.manual_created_at_value() {
            Some(raw) => Some(
                parse_timestamp(raw)
                    .ok_or_else(|| invalid("manual_created_at", "Format tanggal tidak valid"))?,
            ),
            None => None,
        };

        Ok(NewAuditReport {
            nama_kap: self.nama_kap.clone(),
            nama_klien: self.nama_klien.clone(),
            periode: join_periode(&iso_date(awal), &iso_date(akhir)),
            no_lai: join_no_lai(&self.no_lai_parts),
            tgl_lai,
            ap_penanggungjawab: self.ap_penanggungjawab.clone(),
            opini: self.opini.clone(),
            total_aset,
            laba_bersih,
            is_unverifiable: self.is_unverifiable,
            manual_created_at,
        })
    }

    /// Repopulates the structured fields from a stored record for editing.
    pub fn from_report(report: &AuditReport) -> Result<Self, SplitError> {
        let (periode_awal, periode_akhir) = split_periode(&report.periode)?;
        let no_lai_parts = split_no_lai(&report.no_lai)?;

        Ok(Self {
            nama_kap: report.nama_kap.clone(),
            nama_klien: report.nama_klien.clone(),
            periode_awal,
            periode_akhir,
            no_lai_parts,
            tgl_lai: iso_date(report.tgl_lai),
            ap_penanggungjawab: report.ap_penanggungjawab.clone(),
            opini: report.opini.clone(),
            total_aset: report.total_aset.to_string(),
            laba_bersih: report.laba_bersih.to_string(),
            is_unverifiable: report.is_unverifiable,
            manual_created_at: report.manual_created_at.map(|ts| ts.to_rfc3339()),
        })
    }
}
