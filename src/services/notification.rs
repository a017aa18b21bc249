//! Discord and Slack webhook delivery for alerts
//!
//! Delivery is fire-and-forget: a failed POST is logged and counted, the
//! remaining alerts and channels still go out. There is no retry.

use std::time::Duration;

use futures_util::future::join_all;
use reqwest::Client;
use serde_json::{Value, json};
use thiserror::Error;

use crate::config::NotificationSettings;
use crate::models::alert::{Alert, Severity};

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(30);
const FOOTER_TEXT: &str = "Zcash Pulseboard";

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("webhook returned HTTP {0}")]
    Status(reqwest::StatusCode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Discord,
    Slack,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Discord => "discord",
            ChannelKind::Slack => "slack",
        }
    }

    pub fn payload(&self, alert: &Alert) -> Value {
        match self {
            ChannelKind::Discord => discord_payload(alert),
            ChannelKind::Slack => slack_payload(alert),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WebhookChannel {
    pub kind: ChannelKind,
    pub url: String,
}

/// Counts for one dispatch run, summed over all channels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
}

impl DispatchReport {
    fn merge(mut self, other: DispatchReport) -> Self {
        self.attempted += other.attempted;
        self.delivered += other.delivered;
        self.failed += other.failed;
        self
    }
}

#[derive(Clone)]
pub struct NotificationDispatcher {
    client: Client,
    channels: Vec<WebhookChannel>,
    min_severity: Severity,
}

impl NotificationDispatcher {
    pub fn new(settings: &NotificationSettings) -> Result<Self, NotificationError> {
        let client = Client::builder().timeout(WEBHOOK_TIMEOUT).build()?;

        let channels = [
            (ChannelKind::Discord, &settings.discord_webhook_url),
            (ChannelKind::Slack, &settings.slack_webhook_url),
        ]
        .into_iter()
        .filter_map(|(kind, url)| {
            url.as_ref().map(|url| WebhookChannel {
                kind,
                url: url.clone(),
            })
        })
        .collect();

        Ok(Self {
            client,
            channels,
            min_severity: settings.min_severity,
        })
    }

    pub fn channels(&self) -> &[WebhookChannel] {
        &self.channels
    }

    /// Alerts at or above the configured severity, in input order
    pub fn filter<'a>(&self, alerts: &'a [Alert]) -> Vec<&'a Alert> {
        alerts
            .iter()
            .filter(|alert| alert.severity >= self.min_severity)
            .collect()
    }

    /// Sends every qualifying alert to every configured channel. Channels run
    /// concurrently; alerts go out in order within a channel.
    pub async fn dispatch(&self, alerts: &[Alert]) -> DispatchReport {
        if self.channels.is_empty() || alerts.is_empty() {
            return DispatchReport::default();
        }

        let selected = self.filter(alerts);
        if selected.is_empty() {
            tracing::info!("No alerts meet severity threshold ({})", self.min_severity);
            return DispatchReport::default();
        }

        let runs = self
            .channels
            .iter()
            .map(|channel| self.send_to_channel(channel, &selected));
        let report = join_all(runs)
            .await
            .into_iter()
            .fold(DispatchReport::default(), DispatchReport::merge);

        tracing::info!(
            "Alert delivery finished: {} attempted, {} delivered, {} failed",
            report.attempted,
            report.delivered,
            report.failed
        );
        report
    }

    async fn send_to_channel(&self, channel: &WebhookChannel, alerts: &[&Alert]) -> DispatchReport {
        let mut report = DispatchReport::default();

        for alert in alerts {
            report.attempted += 1;
            match self.post(channel, alert).await {
                Ok(()) => {
                    report.delivered += 1;
                    tracing::info!(
                        "Sent {} alert via {}: {}",
                        alert.severity,
                        channel.kind.as_str(),
                        alert.summary
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(
                        alert_id = %alert.id,
                        "Failed to send {} notification: {}",
                        channel.kind.as_str(),
                        e
                    );
                }
            }
        }

        report
    }

    async fn post(&self, channel: &WebhookChannel, alert: &Alert) -> Result<(), NotificationError> {
        let response = self
            .client
            .post(&channel.url)
            .json(&channel.kind.payload(alert))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NotificationError::Status(response.status()));
        }
        Ok(())
    }
}

/// Embed color per severity
pub fn severity_color(severity: Severity) -> u32 {
    match severity {
        Severity::High => 0xFF0000,
        Severity::Medium => 0xFFAA00,
        Severity::Low => 0x00FF00,
    }
}

/// Two decimals with thousands separators: 1234567.891 -> "1,234,567.89"
pub fn format_thousands(value: f64) -> String {
    let formatted = format!("{:.2}", value.abs());
    let (int_part, frac_part) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 && formatted != "0.00" { "-" } else { "" };
    format!("{sign}{grouped}.{frac_part}")
}

fn format_change(delta_percent: f64) -> String {
    format!("{:+.1}%", delta_percent)
}

pub fn discord_payload(alert: &Alert) -> Value {
    let field = |name: &str, value: String| json!({ "name": name, "value": value, "inline": true });

    json!({
        "embeds": [{
            "title": format!("🔔 {}", alert.summary),
            "description": alert.explanation,
            "color": severity_color(alert.severity),
            "fields": [
                field("Metric", alert.metric.clone()),
                field("Current Value", format_thousands(alert.current_value)),
                field("Baseline", format_thousands(alert.baseline_value)),
                field("Change", format_change(alert.delta_percent)),
                field("Severity", alert.severity.as_str().to_uppercase()),
            ],
            "timestamp": alert.timestamp.to_rfc3339(),
            "footer": { "text": FOOTER_TEXT },
        }]
    })
}

pub fn slack_payload(alert: &Alert) -> Value {
    let icon = alert.severity.icon();
    let field = |label: &str, value: String| json!({ "type": "mrkdwn", "text": format!("*{label}:*\n{value}") });

    json!({
        "text": format!("{} *{}*", icon, alert.summary),
        "blocks": [
            {
                "type": "header",
                "text": { "type": "plain_text", "text": format!("{} {}", icon, alert.summary) }
            },
            {
                "type": "section",
                "text": { "type": "mrkdwn", "text": alert.explanation }
            },
            {
                "type": "section",
                "fields": [
                    field("Metric", alert.metric.clone()),
                    field("Severity", alert.severity.as_str().to_uppercase()),
                    field("Current", format_thousands(alert.current_value)),
                    field("Baseline", format_thousands(alert.baseline_value)),
                    field("Change", format_change(alert.delta_percent)),
                ]
            }
        ]
    })
}
