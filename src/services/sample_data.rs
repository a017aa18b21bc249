//! Built-in sample dataset
//!
//! Used when live data is disabled and as the fallback when upstream APIs are
//! unreachable. Values are a pure function of the date, so regenerating a day
//! always yields the same row.

use chrono::{Datelike, Duration, NaiveDate};
use std::f64::consts::TAU;

use crate::models::metrics::{DailyRecord, RawDailyMetrics, RecordError};

pub const SAMPLE_DAYS: u32 = 45;

const ZEC_CIRCULATING_SUPPLY: f64 = 16_300_000.0;

/// splitmix64 mapped to [-1, 1)
fn jitter(seed: i64, salt: u64) -> f64 {
    let mut z = (seed as u64).wrapping_add(salt.wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^= z >> 31;
    (z >> 11) as f64 / (1u64 << 52) as f64 - 1.0
}

/// Sample row for one date
pub fn sample_day(date: NaiveDate) -> Result<DailyRecord, RecordError> {
    let seed = date.num_days_from_ce() as i64;
    // quieter weekends, slow two-month swell
    let weekly = match date.weekday().num_days_from_monday() {
        5 | 6 => -1.0,
        _ => (seed as f64 * TAU / 7.0).sin() * 0.3,
    };
    let seasonal = (seed as f64 * TAU / 60.0).sin();

    let total = (9_000.0 * (1.0 + 0.08 * weekly + 0.05 * seasonal) * (1.0 + 0.03 * jitter(seed, 1))).round() as i64;
    let ratio = (0.34 + 0.03 * seasonal + 0.01 * jitter(seed, 2)).clamp(0.05, 0.9);
    let shielded = (total as f64 * ratio).round() as i64;

    let avg_fee = 0.00012 * (1.0 + 0.15 * jitter(seed, 3));
    let price = 32.0 + 4.0 * seasonal + jitter(seed, 4);

    DailyRecord::try_from(RawDailyMetrics {
        date,
        total_transactions: total,
        shielded_transactions: shielded,
        transparent_transactions: total - shielded,
        shielded_volume_zec: 42_000.0 * (1.0 + 0.1 * weekly + 0.05 * jitter(seed, 5)),
        transparent_volume_zec: 95_000.0 * (1.0 + 0.1 * weekly + 0.05 * jitter(seed, 6)),
        avg_fee_zec: avg_fee,
        median_fee_zec: avg_fee * 0.8,
        avg_block_time_seconds: 75.0 + 3.0 * jitter(seed, 7),
        active_addresses: (total as f64 * 1.5 * (1.0 + 0.02 * jitter(seed, 8))).round() as i64,
        zec_price_usd: Some((price * 100.0).round() / 100.0),
        market_cap_usd: Some((price * ZEC_CIRCULATING_SUPPLY) as i64),
        trading_volume_usd: Some((45_000_000.0 * (1.0 + 0.2 * jitter(seed, 9))) as i64),
    })
}

/// `days` consecutive sample rows ending at `end`, oldest first
pub fn sample_records(end: NaiveDate, days: u32) -> Result<Vec<DailyRecord>, RecordError> {
    (0..days as i64)
        .rev()
        .map(|back| sample_day(end - Duration::days(back)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn end() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, 30).unwrap()
    }

    #[test]
    fn test_sample_window_is_consecutive_and_valid() {
        let rows = sample_records(end(), SAMPLE_DAYS).unwrap();
        assert_eq!(rows.len(), 45);
        assert_eq!(rows.last().unwrap().date, end());
        assert_eq!(rows[0].date, end() - Duration::days(44));

        for pair in rows.windows(2) {
            assert_eq!(pair[1].date - pair[0].date, Duration::days(1));
        }
        for row in &rows {
            assert_eq!(row.shielded_transactions + row.transparent_transactions, row.total_transactions);
            assert!(row.total_transactions > 7_000 && row.total_transactions < 11_000);
            assert!((0.25..0.45).contains(&row.shielded_tx_ratio()));
            assert!(row.zec_price_usd.is_some());
        }
    }

    #[test]
    fn test_same_date_same_row() {
        let a = sample_day(end()).unwrap();
        let b = sample_records(end() + Duration::days(10), 20).unwrap();
        assert!(b.contains(&a));
    }

    #[test]
    fn test_jitter_range() {
        for seed in 0..2_000 {
            let value = jitter(seed, 3);
            assert!((-1.0..1.0).contains(&value));
        }
    }
}
