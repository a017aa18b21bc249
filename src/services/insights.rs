//! Short, friendly explanations attached to KPI cards

use crate::models::metrics::DailyRecord;

pub fn describe_tx_change(current: &DailyRecord, previous: Option<&DailyRecord>) -> String {
    let Some(previous) = previous else {
        return "Tracking baseline transactions.".to_string();
    };
    let diff = (current.total_transactions - previous.total_transactions) as f64;
    if diff.abs() < previous.total_transactions as f64 * 0.01 {
        "Transaction flow is steady compared to yesterday.".to_string()
    } else if diff > 0.0 {
        "Network activity picked up with more transactions than yesterday.".to_string()
    } else {
        "Transactions cooled slightly versus the previous day.".to_string()
    }
}

pub fn describe_shielded_share(current: &DailyRecord, previous: Option<&DailyRecord>) -> String {
    let Some(previous) = previous else {
        return "Establishing a privacy adoption baseline.".to_string();
    };
    // percentage points
    let diff = (current.shielded_tx_ratio() - previous.shielded_tx_ratio()) * 100.0;
    if diff.abs() < 0.5 {
        "Shielded usage share is flat day-over-day.".to_string()
    } else if diff > 0.0 {
        "More transactions opted for shielded addresses today.".to_string()
    } else {
        "Shielded share dipped; monitor if the trend persists.".to_string()
    }
}

pub fn describe_fee_change(current: &DailyRecord, previous: Option<&DailyRecord>) -> String {
    let Some(previous) = previous else {
        return "Fee movement insight becomes available after one day of data.".to_string();
    };
    let diff = current.avg_fee_zec - previous.avg_fee_zec;
    if diff.abs() < previous.avg_fee_zec * 0.05 {
        "Fees are stable relative to the trailing day.".to_string()
    } else if diff > 0.0 {
        "Fees are trending higher; mempool congestion may be rising.".to_string()
    } else {
        "Fees eased, suggesting demand is normalizing.".to_string()
    }
}

pub fn describe_address_change(current: &DailyRecord, previous: Option<&DailyRecord>) -> String {
    let Some(previous) = previous else {
        return "Active address trend will appear after the first comparison day.".to_string();
    };
    let diff = (current.active_addresses - previous.active_addresses) as f64;
    if diff.abs() < previous.active_addresses as f64 * 0.02 {
        "Active address count remains within the typical range.".to_string()
    } else if diff > 0.0 {
        "More addresses interacted with the network today.".to_string()
    } else {
        "Fewer active addresses than yesterday; likely a quiet period.".to_string()
    }
}

/// Reading of the 7-day momentum index
pub fn describe_momentum(momentum_7d: f64) -> String {
    if momentum_7d > 20.0 {
        "Strong pro-privacy trend! Shielded usage is growing faster than transparent.".to_string()
    } else if momentum_7d > 0.0 {
        "Positive momentum. Shielded usage is growing relative to transparent.".to_string()
    } else if momentum_7d > -20.0 {
        "Declining momentum. Transparent usage is growing faster.".to_string()
    } else {
        "Negative trend. Shielded pool usage needs attention.".to_string()
    }
}
