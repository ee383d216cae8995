use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Offset, Timelike, Utc};

use crate::PERIODE_SEPARATOR;

pub const EMPTY_DISPLAY: &str = "-";
pub const CURRENCY_PREFIX: &str = "IDR ";

/// Western Indonesia Time, UTC+7.
pub const DEFAULT_DISPLAY_OFFSET_MINUTES: i32 = 7 * 60;

const MONTH_NAMES_ID: [&str; 12] = [
    "Januari",
    "Februari",
    "Maret",
    "April",
    "Mei",
    "Juni",
    "Juli",
    "Agustus",
    "September",
    "Oktober",
    "November",
    "Desember",
];

/// Renders the digits of `value` as `IDR 1.234.567`. Empty input renders as an
/// empty string so a cleared input field stays cleared.
pub fn format_rupiah(value: &str) -> String {
    let digits = parse_rupiah(value);
    if digits.is_empty() {
        return String::new();
    }
    format!("{}{}", CURRENCY_PREFIX, group_thousands(&digits))
}

/// Strips every non-digit character. Inverse of [`format_rupiah`] on digit strings.
pub fn parse_rupiah(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Display form of a stored amount, sign included.
pub fn format_amount(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let sign = if amount < 0 { "-" } else { "" };
    format!("{}{}{}", CURRENCY_PREFIX, sign, group_thousands(&digits))
}

/// Coerces operator input into whole rupiah. A `-` ahead of the first digit
/// makes the amount negative; separators and the currency prefix are ignored.
pub fn coerce_amount(value: &str) -> Option<i64> {
    let negative = value
        .chars()
        .find(|c| *c == '-' || c.is_ascii_digit())
        .is_some_and(|c| c == '-');

    let digits = parse_rupiah(value);
    if digits.is_empty() {
        return None;
    }

    let magnitude = digits.parse::<i64>().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (len - idx) % 3 == 0 {
            out.push('.');
        }
        out.push(ch);
    }
    out
}

pub fn display_zone(offset_minutes: i32) -> Option<FixedOffset> {
    FixedOffset::east_opt(offset_minutes.checked_mul(60)?)
}

pub fn default_display_zone() -> FixedOffset {
    display_zone(DEFAULT_DISPLAY_OFFSET_MINUTES).unwrap_or_else(|| Utc.fix())
}

pub fn parse_iso_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

pub fn iso_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// `dd/mm/yyyy`, zero padded.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

pub fn format_timestamp_date(ts: DateTime<Utc>, zone: FixedOffset) -> String {
    format_date(ts.with_timezone(&zone).date_naive())
}

/// Footer form: `16 Oktober 2026 pukul 14:05:09`.
pub fn format_generated_at(ts: DateTime<Utc>, zone: FixedOffset) -> String {
    let local = ts.with_timezone(&zone);
    format!(
        "{} {} {} pukul {:02}:{:02}:{:02}",
        local.day(),
        month_name_id(local.month()),
        local.year(),
        local.hour(),
        local.minute(),
        local.second()
    )
}

pub fn month_name_id(month: u32) -> &'static str {
    month
        .checked_sub(1)
        .and_then(|idx| MONTH_NAMES_ID.get(idx as usize))
        .copied()
        .unwrap_or(EMPTY_DISPLAY)
}

/// Best-effort display of a stored date string. Unparseable input is shown verbatim.
pub fn format_date_text(value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        return EMPTY_DISPLAY.to_string();
    }
    match parse_iso_date(value) {
        Some(date) => format_date(date),
        None => value.to_string(),
    }
}

/// `dd/mm/yyyy s.d. dd/mm/yyyy`. A stored value without the separator is shown as is.
pub fn format_periode(periode: &str) -> String {
    if periode.trim().is_empty() {
        return EMPTY_DISPLAY.to_string();
    }

    match periode.split_once(PERIODE_SEPARATOR) {
        Some((awal, akhir)) if !awal.trim().is_empty() && !akhir.trim().is_empty() => format!(
            "{}{}{}",
            format_date_text(awal),
            PERIODE_SEPARATOR,
            format_date_text(akhir)
        ),
        _ => periode.to_string(),
    }
}

pub fn display_or_dash(value: &str) -> String {
    if value.trim().is_empty() {
        EMPTY_DISPLAY.to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wib() -> FixedOffset {
        display_zone(DEFAULT_DISPLAY_OFFSET_MINUTES).expect("valid offset")
    }

    #[test]
    fn rupiah_groups_digits_with_dots() {
        assert_eq!(format_rupiah("1000000"), "IDR 1.000.000");
        assert_eq!(format_rupiah("999"), "IDR 999");
        assert_eq!(format_rupiah("1000"), "IDR 1.000");
        assert_eq!(format_rupiah(""), "");
    }

    #[test]
    fn rupiah_parse_inverts_format_for_digit_strings() {
        for digits in ["0", "7", "007", "1000", "12345678901234567890", "1000000"] {
            assert_eq!(parse_rupiah(&format_rupiah(digits)), digits);
        }
    }

    #[test]
    fn rupiah_format_is_idempotent_on_formatted_input() {
        assert_eq!(format_rupiah("IDR 1.000.000"), "IDR 1.000.000");
        assert_eq!(format_rupiah("IDR 1.000.0005"), "IDR 10.000.005");
    }

    #[test]
    fn amount_formatting_keeps_sign() {
        assert_eq!(format_amount(1_000_000), "IDR 1.000.000");
        assert_eq!(format_amount(-1_500_000), "IDR -1.500.000");
        assert_eq!(format_amount(0), "IDR 0");
        assert_eq!(format_amount(i64::MIN), "IDR -9.223.372.036.854.775.808");
    }

    #[test]
    fn coerce_amount_accepts_plain_formatted_and_negative_input() {
        assert_eq!(coerce_amount("1000000"), Some(1_000_000));
        assert_eq!(coerce_amount("IDR 1.000.000"), Some(1_000_000));
        assert_eq!(coerce_amount("-2500"), Some(-2500));
        assert_eq!(coerce_amount("IDR -2.500"), Some(-2500));
        assert_eq!(coerce_amount("0"), Some(0));
        assert_eq!(coerce_amount(""), None);
        assert_eq!(coerce_amount("abc"), None);
        assert_eq!(coerce_amount("99999999999999999999"), None);
    }

    #[test]
    fn dates_render_day_month_year() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).expect("valid date");
        assert_eq!(format_date(date), "05/03/2024");
        assert_eq!(format_date_text("2024-03-05"), "05/03/2024");
        assert_eq!(format_date_text(""), "-");
        assert_eq!(format_date_text("kemarin"), "kemarin");
    }

    #[test]
    fn periode_renders_both_boundaries_or_falls_back_to_raw() {
        assert_eq!(
            format_periode("2023-01-01 s.d. 2023-12-31"),
            "01/01/2023 s.d. 31/12/2023"
        );
        assert_eq!(format_periode("Tahun buku 2023"), "Tahun buku 2023");
        assert_eq!(format_periode(""), "-");
    }

    #[test]
    fn timestamps_use_display_zone() {
        let ts = parse_timestamp("2023-12-31T18:30:00Z").expect("valid timestamp");
        assert_eq!(format_timestamp_date(ts, wib()), "01/01/2024");
    }

    #[test]
    fn generated_at_uses_indonesian_month_and_24h_clock() {
        let ts = parse_timestamp("2026-10-16T07:05:09Z").expect("valid timestamp");
        assert_eq!(
            format_generated_at(ts, wib()),
            "16 Oktober 2026 pukul 14:05:09"
        );
    }

    #[test]
    fn month_names_cover_calendar() {
        assert_eq!(month_name_id(1), "Januari");
        assert_eq!(month_name_id(12), "Desember");
        assert_eq!(month_name_id(0), "-");
        assert_eq!(month_name_id(13), "-");
    }
}
