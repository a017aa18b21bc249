//! Application settings
//!
//! Loaded once at startup from the environment (after `.env` is read by
//! `dotenvy`) and handed to each component. Nothing reads the environment
//! after `Settings::from_env` returns.

use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::models::alert::Severity;

const DEFAULT_DATABASE_URL: &str = "sqlite://zcash_pulse.db?mode=rwc";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_ZCHAIN_API_URL: &str = "https://api.zcha.in/v2/mainnet";
const DEFAULT_COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";
const DEFAULT_REFRESH_INTERVAL_MINUTES: u64 = 5;
/// One week
const MAX_REFRESH_INTERVAL_MINUTES: u64 = 7 * 24 * 60;
const DEFAULT_BACKFILL_DAYS: u32 = 7;
const DEFAULT_ZSCORE_THRESHOLD: f64 = 2.5;
const DEFAULT_BASELINE_DAYS: usize = 30;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{key} has an invalid value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Webhook targets and the minimum severity worth sending
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationSettings {
    pub discord_webhook_url: Option<String>,
    pub slack_webhook_url: Option<String>,
    pub min_severity: Severity,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            discord_webhook_url: None,
            slack_webhook_url: None,
            min_severity: Severity::Medium,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnomalySettings {
    pub enabled: bool,
    /// Threshold for the whole-series outlier scan
    pub zscore_threshold: f64,
    /// Trailing rows used as the statistical baseline
    pub baseline_days: usize,
}

impl Default for AnomalySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            zscore_threshold: DEFAULT_ZSCORE_THRESHOLD,
            baseline_days: DEFAULT_BASELINE_DAYS,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub database_url: String,
    pub bind_addr: String,
    pub zchain_api_url: String,
    pub coingecko_api_url: String,
    pub coingecko_api_key: Option<String>,
    pub refresh_interval: Duration,
    /// When false, the refresh job loads the bundled sample dataset only
    pub enable_live_data: bool,
    /// Days fetched when the store is empty
    pub backfill_days: u32,
    pub notifications: NotificationSettings,
    pub anomaly: AnomalySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            zchain_api_url: DEFAULT_ZCHAIN_API_URL.to_string(),
            coingecko_api_url: DEFAULT_COINGECKO_API_URL.to_string(),
            coingecko_api_key: None,
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_INTERVAL_MINUTES * 60),
            enable_live_data: true,
            backfill_days: DEFAULT_BACKFILL_DAYS,
            notifications: NotificationSettings::default(),
            anomaly: AnomalySettings::default(),
        }
    }
}

fn parse_value<T: std::str::FromStr>(key: &'static str, raw: String) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
        key,
        reason: e.to_string(),
        value: raw,
    })
}

fn parse_flag(key: &'static str, raw: String) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: raw,
            reason: "expected true or false".to_string(),
        }),
    }
}

impl Settings {
    /// Reads settings from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds settings from any key lookup; unset or blank keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut settings = Settings::default();

        if let Some(url) = get("DATABASE_URL") {
            settings.database_url = url;
        }
        if let Some(addr) = get("BIND_ADDR") {
            settings.bind_addr = addr;
        }
        if let Some(url) = get("ZCHAIN_API_URL") {
            settings.zchain_api_url = url;
        }
        if let Some(url) = get("COINGECKO_API_URL") {
            settings.coingecko_api_url = url;
        }
        settings.coingecko_api_key = get("COINGECKO_API_KEY");

        if let Some(raw) = get("REFRESH_INTERVAL_MINUTES") {
            let minutes: u64 = parse_value("REFRESH_INTERVAL_MINUTES", raw.clone())?;
            if minutes == 0 {
                return Err(ConfigError::Invalid {
                    key: "REFRESH_INTERVAL_MINUTES",
                    value: raw,
                    reason: "must be at least 1".to_string(),
                });
            }
            let seconds = minutes
                .checked_mul(60)
                .filter(|_| minutes <= MAX_REFRESH_INTERVAL_MINUTES)
                .ok_or_else(|| ConfigError::Invalid {
                    key: "REFRESH_INTERVAL_MINUTES",
                    value: raw.clone(),
                    reason: format!("must be at most {}", MAX_REFRESH_INTERVAL_MINUTES),
                })?;
            settings.refresh_interval = Duration::from_secs(seconds);
        }
        if let Some(raw) = get("ENABLE_LIVE_DATA") {
            settings.enable_live_data = parse_flag("ENABLE_LIVE_DATA", raw)?;
        }
        if let Some(raw) = get("BACKFILL_DAYS") {
            settings.backfill_days = parse_value("BACKFILL_DAYS", raw)?;
        }

        settings.notifications.discord_webhook_url = get("DISCORD_WEBHOOK_URL");
        settings.notifications.slack_webhook_url = get("SLACK_WEBHOOK_URL");
        if let Some(raw) = get("ALERT_SEVERITY_THRESHOLD") {
            settings.notifications.min_severity = parse_value("ALERT_SEVERITY_THRESHOLD", raw)?;
        }

        if let Some(raw) = get("ENABLE_ANOMALY_DETECTION") {
            settings.anomaly.enabled = parse_flag("ENABLE_ANOMALY_DETECTION", raw)?;
        }
        if let Some(raw) = get("ANOMALY_ZSCORE_THRESHOLD") {
            let threshold: f64 = parse_value("ANOMALY_ZSCORE_THRESHOLD", raw.clone())?;
            if !threshold.is_finite() || threshold <= 0.0 {
                return Err(ConfigError::Invalid {
                    key: "ANOMALY_ZSCORE_THRESHOLD",
                    value: raw,
                    reason: "must be a positive number".to_string(),
                });
            }
            settings.anomaly.zscore_threshold = threshold;
        }
        if let Some(raw) = get("ANOMALY_BASELINE_DAYS") {
            settings.anomaly.baseline_days = parse_value("ANOMALY_BASELINE_DAYS", raw)?;
        }

        Ok(settings)
    }

    /// "live" or "sample", as reported by the metadata endpoint
    pub fn data_source_label(&self) -> &'static str {
        if self.enable_live_data { "live" } else { "sample" }
    }

    /// Logs the effective configuration without secrets
    pub fn log_summary(&self) {
        let enabled = |on: bool| if on { "ENABLED" } else { "DISABLED" };

        tracing::info!("Zchain API: {}", self.zchain_api_url);
        tracing::info!("CoinGecko API: {}", self.coingecko_api_url);
        tracing::info!(
            "Live data: {}",
            if self.enable_live_data { "ENABLED" } else { "DISABLED (sample mode)" }
        );
        tracing::info!("Refresh interval: {}s", self.refresh_interval.as_secs());
        tracing::info!(
            "Discord alerts: {}, Slack alerts: {} (threshold: {})",
            enabled(self.notifications.discord_webhook_url.is_some()),
            enabled(self.notifications.slack_webhook_url.is_some()),
            self.notifications.min_severity
        );
        tracing::info!(
            "Anomaly detection: {} (z-score threshold {}σ, baseline {} days)",
            enabled(self.anomaly.enabled),
            self.anomaly.zscore_threshold,
            self.anomaly.baseline_days
        );
    }
}
