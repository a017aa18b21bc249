use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::entities::alerts;

/// Alert severity, ordered low < medium < high
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }

    /// Status light used in summaries and Slack messages
    pub fn icon(&self) -> &'static str {
        match self {
            Severity::High => "🔴",
            Severity::Medium => "🟡",
            Severity::Low => "🟢",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            other => Err(format!(
                "Unknown severity '{}'. Expected low, medium or high",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub alert_type: String,
    pub severity: Severity,
    pub metric: String,
    pub current_value: f64,
    pub baseline_value: f64,
    pub delta_percent: f64,
    pub summary: String,
    pub explanation: String,
}

impl TryFrom<alerts::Model> for Alert {
    type Error = String;

    fn try_from(row: alerts::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            severity: row.severity.parse()?,
            id: row.id,
            timestamp: row.timestamp,
            alert_type: row.alert_type,
            metric: row.metric,
            current_value: row.current_value,
            baseline_value: row.baseline_value,
            delta_percent: row.delta_percent,
            summary: row.summary,
            explanation: row.explanation,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertFeed {
    pub alerts: Vec<Alert>,
}
