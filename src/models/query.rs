use chrono::NaiveDate;
use serde::Deserialize;

/// Query parameters for the /api/export routes
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportQuery {
    pub start_date: Option<String>, // YYYY-MM-DD format
    pub end_date: Option<String>,   // YYYY-MM-DD format
}

/// Inclusive date bounds; either side may be open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.is_none_or(|start| date >= start) && self.end.is_none_or(|end| date <= end)
    }

    /// An end before the start selects nothing
    pub fn is_empty(&self) -> bool {
        matches!((self.start, self.end), (Some(start), Some(end)) if end < start)
    }
}

fn parse_date_param(value: Option<&str>, param_name: &str) -> Result<Option<NaiveDate>, String> {
    match value {
        None => Ok(None),
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| {
                format!(
                    "Invalid {} format. Expected YYYY-MM-DD, got: {}",
                    param_name, raw
                )
            }),
    }
}

impl ExportQuery {
    /// Validates and parses both bounds, echoing the offending value on error
    pub fn date_range(&self) -> Result<DateRange, String> {
        Ok(DateRange {
            start: parse_date_param(self.start_date.as_deref(), "start_date")?,
            end: parse_date_param(self.end_date.as_deref(), "end_date")?,
        })
    }
}

/// Query parameters for GET /api/metrics/daily and GET /api/alerts
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<u64>,
}

/// Query parameters for GET /api/metrics/privacy and /api/metrics/pool-migration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DaysQuery {
    pub days: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parses_both_bounds() {
        let query = ExportQuery {
            start_date: Some("2024-01-01".to_string()),
            end_date: Some("2024-01-31".to_string()),
        };
        let range = query.date_range().unwrap();
        assert_eq!(range.start, Some(date(2024, 1, 1)));
        assert_eq!(range.end, Some(date(2024, 1, 31)));
        assert!(range.contains(date(2024, 1, 31)));
        assert!(!range.contains(date(2024, 2, 1)));
    }

    #[test]
    fn test_malformed_date_is_echoed() {
        let query = ExportQuery {
            start_date: None,
            end_date: Some("01/05/2024".to_string()),
        };
        let err = query.date_range().unwrap_err();
        assert_eq!(
            err,
            "Invalid end_date format. Expected YYYY-MM-DD, got: 01/05/2024"
        );
    }

    #[test]
    fn test_inverted_range_is_empty_not_error() {
        let query = ExportQuery {
            start_date: Some("2024-01-05".to_string()),
            end_date: Some("2024-01-01".to_string()),
        };
        let range = query.date_range().unwrap();
        assert!(range.is_empty());
        assert!(!range.contains(date(2024, 1, 3)));
    }

    #[test]
    fn test_open_range_contains_everything() {
        let range = ExportQuery::default().date_range().unwrap();
        assert!(!range.is_empty());
        assert!(range.contains(date(1999, 12, 31)));
    }
}
