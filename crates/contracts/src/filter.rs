use chrono::{Datelike, FixedOffset};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::ReportSummary;

pub const YEAR_FILTER_ALL: &str = "all";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum YearFilter {
    #[default]
    All,
    Year(i32),
}

impl YearFilter {
    /// `all` or an empty value selects every year.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case(YEAR_FILTER_ALL) {
            return Some(YearFilter::All);
        }
        value.parse::<i32>().ok().map(YearFilter::Year)
    }

    pub fn matches(self, year: i32) -> bool {
        match self {
            YearFilter::All => true,
            YearFilter::Year(wanted) => wanted == year,
        }
    }
}

impl std::fmt::Display for YearFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            YearFilter::All => f.write_str(YEAR_FILTER_ALL),
            YearFilter::Year(year) => write!(f, "{}", year),
        }
    }
}

impl Serialize for YearFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for YearFilter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        YearFilter::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom("year must be `all` or a four-digit year"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListFilter {
    pub search: String,
    pub year: YearFilter,
}

impl ListFilter {
    pub fn is_unfiltered(&self) -> bool {
        self.search.is_empty() && self.year == YearFilter::All
    }
}

/// Year of `created_at` as seen in the display time zone.
pub fn created_year(row: &ReportSummary, zone: FixedOffset) -> i32 {
    row.created_at.with_timezone(&zone).year()
}

fn search_text(row: &ReportSummary) -> String {
    format!("{} {} {}", row.nama_klien, row.nama_kap, row.no_lai).to_lowercase()
}

pub fn matches(row: &ReportSummary, filter: &ListFilter, zone: FixedOffset) -> bool {
    let needle = filter.search.to_lowercase();
    search_text(row).contains(&needle) && filter.year.matches(created_year(row, zone))
}

/// Text AND year filter over an already loaded set. Input order is kept.
pub fn apply<'a>(
    rows: &'a [ReportSummary],
    filter: &ListFilter,
    zone: FixedOffset,
) -> Vec<&'a ReportSummary> {
    rows.iter().filter(|row| matches(row, filter, zone)).collect()
}

/// Distinct years of the loaded set, first appearance first.
pub fn year_options(rows: &[ReportSummary], zone: FixedOffset) -> Vec<i32> {
    let mut years = Vec::new();
    for row in rows {
        let year = created_year(row, zone);
        if !years.contains(&year) {
            years.push(year);
        }
    }
    years
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::default_display_zone;
    use chrono::{DateTime, Utc};

    fn ts(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw)
            .expect("valid timestamp")
            .with_timezone(&Utc)
    }

    fn row(id: &str, klien: &str, kap: &str, no_lai: &str, created_at: &str) -> ReportSummary {
        ReportSummary {
            id: id.to_string(),
            nama_kap: kap.to_string(),
            nama_klien: klien.to_string(),
            periode: "2023-01-01 s.d. 2023-12-31".to_string(),
            no_lai: no_lai.to_string(),
            created_at: ts(created_at),
        }
    }

    fn loaded() -> Vec<ReportSummary> {
        vec![
            row(
                "c",
                "PT Jasa Marga (Persero) Tbk",
                "KAP Amir Abadi Jusuf",
                "00877/2.1030/AU.1/06/0645-1/1/IX/2024",
                "2024-06-01T02:00:00Z",
            ),
            row(
                "b",
                "PT Lingga Jati Qaireen",
                "KAP Tanudiredja",
                "00100/2.0001/AU.2/01/0001-1/1/II/2023",
                "2023-12-31T18:30:00Z",
            ),
            row(
                "a",
                "CV Maju Terus",
                "KAP Amir Abadi Jusuf",
                "00042/2.0002/AU.1/03/0010-2/1/V/2023",
                "2023-03-01T00:00:00Z",
            ),
        ]
    }

    fn ids(rows: &[&ReportSummary]) -> Vec<String> {
        rows.iter().map(|r| r.id.clone()).collect()
    }

    #[test]
    fn empty_filter_returns_everything_in_order() {
        let rows = loaded();
        let out = apply(&rows, &ListFilter::default(), default_display_zone());
        assert_eq!(ids(&out), vec!["c", "b", "a"]);
    }

    #[test]
    fn search_is_case_insensitive_across_client_firm_and_lai() {
        let rows = loaded();
        let zone = default_display_zone();

        let by_client = ListFilter {
            search: "jasa MARGA".to_string(),
            ..ListFilter::default()
        };
        assert_eq!(ids(&apply(&rows, &by_client, zone)), vec!["c"]);

        let by_firm = ListFilter {
            search: "amir abadi".to_string(),
            ..ListFilter::default()
        };
        assert_eq!(ids(&apply(&rows, &by_firm, zone)), vec!["c", "a"]);

        let by_lai = ListFilter {
            search: "au.2/01".to_string(),
            ..ListFilter::default()
        };
        assert_eq!(ids(&apply(&rows, &by_lai, zone)), vec!["b"]);
    }

    #[test]
    fn search_without_match_is_empty() {
        let rows = loaded();
        let filter = ListFilter {
            search: "tidak ada".to_string(),
            ..ListFilter::default()
        };
        assert!(apply(&rows, &filter, default_display_zone()).is_empty());
    }

    #[test]
    fn year_uses_display_zone_and_combines_with_search() {
        let rows = loaded();
        let zone = default_display_zone();

        // 2023-12-31T18:30Z is already 2024 in UTC+7.
        let year_2024 = ListFilter {
            search: String::new(),
            year: YearFilter::Year(2024),
        };
        assert_eq!(ids(&apply(&rows, &year_2024, zone)), vec!["c", "b"]);

        let combined = ListFilter {
            search: "amir".to_string(),
            year: YearFilter::Year(2023),
        };
        assert_eq!(ids(&apply(&rows, &combined, zone)), vec!["a"]);
    }

    #[test]
    fn unknown_year_is_empty_regardless_of_search() {
        let rows = loaded();
        for search in ["", "amir", "zzz"] {
            let filter = ListFilter {
                search: search.to_string(),
                year: YearFilter::Year(1999),
            };
            assert!(apply(&rows, &filter, default_display_zone()).is_empty());
        }
    }

    #[test]
    fn year_options_are_distinct_in_first_appearance_order() {
        let rows = loaded();
        assert_eq!(year_options(&rows, default_display_zone()), vec![2024, 2023]);
        assert!(year_options(&[], default_display_zone()).is_empty());
    }

    #[test]
    fn single_row_matching_agrees_with_apply() {
        let rows = loaded();
        let filter = ListFilter {
            search: "lingga".to_string(),
            year: YearFilter::All,
        };
        let zone = default_display_zone();
        let via_apply = ids(&apply(&rows, &filter, zone));
        let via_matches = rows
            .iter()
            .filter(|r| matches(r, &filter, zone))
            .map(|r| r.id.clone())
            .collect::<Vec<_>>();
        assert_eq!(via_apply, via_matches);
    }

    #[test]
    fn year_filter_parses_sentinel_and_numbers() {
        assert_eq!(YearFilter::parse("all"), Some(YearFilter::All));
        assert_eq!(YearFilter::parse(""), Some(YearFilter::All));
        assert_eq!(YearFilter::parse("2023"), Some(YearFilter::Year(2023)));
        assert_eq!(YearFilter::parse("dua ribu"), None);
        assert_eq!(YearFilter::Year(2023).to_string(), "2023");

        let decoded: ListFilter =
            serde_json::from_value(serde_json::json!({"year": "2024"})).expect("valid filter");
        assert_eq!(decoded.year, YearFilter::Year(2024));
        assert_eq!(decoded.search, "");
    }
}
