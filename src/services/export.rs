//! CSV rendering for the export endpoints

use crate::models::alert::Alert;
use crate::models::metrics::DailyRecord;

pub const METRICS_CSV_HEADER: &str = "date,total_transactions,shielded_transactions,transparent_transactions,\
shielded_volume_zec,transparent_volume_zec,avg_fee_zec,median_fee_zec,avg_block_time_seconds,\
active_addresses,zec_price_usd,market_cap_usd,trading_volume_usd,shielded_tx_ratio,shielded_volume_ratio";

pub const ALERTS_CSV_HEADER: &str =
    "id,timestamp,type,severity,metric,current_value,baseline_value,delta_percent,summary,explanation";

/// Quotes a field when it contains a delimiter, quote or line break
fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

pub fn metrics_csv(records: &[DailyRecord]) -> String {
    let mut csv = String::new();
    csv.push_str(METRICS_CSV_HEADER);
    csv.push('\n');

    for r in records {
        csv.push_str(&format!(
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}\n",
            r.date,
            r.total_transactions,
            r.shielded_transactions,
            r.transparent_transactions,
            r.shielded_volume_zec,
            r.transparent_volume_zec,
            r.avg_fee_zec,
            r.median_fee_zec,
            r.avg_block_time_seconds,
            r.active_addresses,
            optional(r.zec_price_usd),
            optional(r.market_cap_usd),
            optional(r.trading_volume_usd),
            r.shielded_tx_ratio(),
            r.shielded_volume_ratio(),
        ));
    }

    csv
}

pub fn alerts_csv(alerts: &[Alert]) -> String {
    let mut csv = String::new();
    csv.push_str(ALERTS_CSV_HEADER);
    csv.push('\n');

    for a in alerts {
        csv.push_str(&format!(
            "{},{},{},{},{},{},{},{},{},{}\n",
            escape(&a.id),
            a.timestamp.to_rfc3339(),
            escape(&a.alert_type),
            a.severity,
            escape(&a.metric),
            a.current_value,
            a.baseline_value,
            a.delta_percent,
            escape(&a.summary),
            escape(&a.explanation),
        ));
    }

    csv
}
