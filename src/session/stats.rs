use anyhow::{bail, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsQuery {
    Today,
    Day(NaiveDate),
    Range { from: NaiveDate, to: NaiveDate },
}

fn ymd(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

impl StatsQuery {
    pub fn range(from: NaiveDate, to: NaiveDate) -> Result<Self> {
        if from > to {
            bail!("stats range is inverted: {} > {}", ymd(from), ymd(to));
        }
        Ok(StatsQuery::Range { from, to })
    }

    /// Query-string pairs appended to `{base}/stats`.
    pub fn params(&self) -> Vec<(&'static str, String)> {
        match self {
            StatsQuery::Today => Vec::new(),
            StatsQuery::Day(day) => vec![("day", ymd(*day))],
            StatsQuery::Range { from, to } => vec![("from", ymd(*from)), ("to", ymd(*to))],
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StatsQuery::Today => "today",
            StatsQuery::Day(_) => "day",
            StatsQuery::Range { .. } => "range",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayStats {
    pub day: String,
    #[serde(default)]
    pub hour_buckets: BTreeMap<String, u64>,
    #[serde(default)]
    pub total_visits: u64,
    #[serde(default)]
    pub total_duration_ms: f64,
    #[serde(default)]
    pub avg_duration_ms: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsReport {
    #[serde(default)]
    pub tz: String,
    #[serde(default)]
    pub days: Vec<DayStats>,
}

impl StatsReport {
    /// Stand-in shown when the backend cannot be reached.
    pub fn placeholder(day: NaiveDate) -> Self {
        let mut hour_buckets = BTreeMap::new();
        hour_buckets.insert("18".to_string(), 2);
        Self {
            tz: "UTC".to_string(),
            days: vec![DayStats {
                day: ymd(day),
                hour_buckets,
                total_visits: 42,
                total_duration_ms: 26_774.0,
                avg_duration_ms: 13_387.0,
            }],
        }
    }

    pub fn total_visits(&self) -> u64 {
        self.days.iter().map(|d| d.total_visits).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_query_params() {
        assert!(StatsQuery::Today.params().is_empty());
        assert_eq!(
            StatsQuery::Day(date("2025-03-09")).params(),
            vec![("day", "2025-03-09".to_string())]
        );
        let range = StatsQuery::range(date("2025-03-01"), date("2025-03-31")).unwrap();
        assert_eq!(
            range.params(),
            vec![("from", "2025-03-01".to_string()), ("to", "2025-03-31".to_string())]
        );
    }

    #[test]
    fn test_inverted_range_rejected() {
        assert!(StatsQuery::range(date("2025-04-02"), date("2025-04-01")).is_err());
        assert!(StatsQuery::range(date("2025-04-01"), date("2025-04-01")).is_ok());
    }

    #[test]
    fn test_report_parses_backend_shape() {
        let raw = r#"{"tz":"Asia/Jerusalem","days":[{"day":"2025-03-09","hourBuckets":{"9":3,"18":2},"totalVisits":5,"totalDurationMs":60000,"avgDurationMs":12000}]}"#;
        let report: StatsReport = serde_json::from_str(raw).unwrap();
        assert_eq!(report.tz, "Asia/Jerusalem");
        assert_eq!(report.days[0].hour_buckets.get("9"), Some(&3));
        assert_eq!(report.total_visits(), 5);
    }

    #[test]
    fn test_report_tolerates_missing_fields() {
        let report: StatsReport = serde_json::from_str(r#"{"days":[{"day":"2025-03-09"}]}"#).unwrap();
        assert_eq!(report.days[0].total_visits, 0);
        assert!(report.tz.is_empty());
    }

    #[test]
    fn test_fractional_durations_accepted() {
        let raw = r#"{"tz":"UTC","days":[{"day":"2025-03-09","totalVisits":2,"totalDurationMs":1500.5,"avgDurationMs":750.25}]}"#;
        let report: StatsReport = serde_json::from_str(raw).unwrap();
        assert_eq!(report.days[0].total_duration_ms, 1500.5);
        assert_eq!(report.total_visits(), 2);
    }

    #[test]
    fn test_placeholder_is_dated() {
        let p = StatsReport::placeholder(date("2025-05-01"));
        assert_eq!(p.days[0].day, "2025-05-01");
        assert_eq!(p.total_visits(), 42);
    }
}
