use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use moka::future::Cache;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::models::metrics::PriceSnapshot;
use crate::services::api_client::{ApiClient, RetryPolicy};
use crate::services::sources::PriceSource;

const COIN_ID: &str = "zcash";
const VS_CURRENCY: &str = "usd";

#[derive(Clone)]
pub struct CoinGeckoService {
    api: Arc<ApiClient>,
    api_key: Option<String>,
    cache: Arc<Cache<NaiveDate, PriceSnapshot>>,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    market_data: Option<HistoryMarketData>,
}

#[derive(Debug, Deserialize)]
struct HistoryMarketData {
    current_price: HashMap<String, f64>,
    #[serde(default)]
    market_cap: HashMap<String, f64>,
    #[serde(default)]
    total_volume: HashMap<String, f64>,
}

#[derive(Debug, Deserialize)]
struct SimplePrice {
    usd: Option<f64>,
    usd_market_cap: Option<f64>,
    usd_24h_vol: Option<f64>,
}

impl CoinGeckoService {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, reqwest::Error> {
        // Free tier allows ~30 requests per minute
        let policy = RetryPolicy {
            min_interval: Duration::from_secs(2),
            ..RetryPolicy::default()
        };
        Self::with_policy(base_url, api_key, policy)
    }

    pub fn with_policy(
        base_url: &str,
        api_key: Option<String>,
        policy: RetryPolicy,
    ) -> Result<Self, reqwest::Error> {
        let cache = Cache::builder()
            .max_capacity(400)
            .time_to_live(Duration::from_secs(3600)) // 1 hour TTL
            .build();

        Ok(Self {
            api: Arc::new(ApiClient::new(base_url, policy)?),
            api_key,
            cache: Arc::new(cache),
        })
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(key) = &self.api_key {
            match HeaderValue::from_str(key) {
                Ok(value) => {
                    headers.insert("x-cg-pro-api-key", value);
                }
                Err(e) => tracing::warn!("Ignoring malformed CoinGecko API key: {}", e),
            }
        }
        headers
    }

    /// Closing price for a past date from `coins/zcash/history`
    pub async fn fetch_historical_price(&self, date: NaiveDate) -> Option<PriceSnapshot> {
        if let Some(cached) = self.cache.get(&date).await {
            tracing::debug!("Cache hit for ZEC price on {}", date);
            return Some(cached);
        }

        let query = [("date", date.format("%d-%m-%Y").to_string())];
        let response: HistoryResponse = self
            .api
            .get_json(&format!("coins/{}/history", COIN_ID), &query, self.headers())
            .await?;

        let market = response.market_data?;
        let price = *market.current_price.get(VS_CURRENCY)?;
        let snapshot = PriceSnapshot {
            price_usd: price,
            market_cap_usd: market.market_cap.get(VS_CURRENCY).map(|v| *v as i64),
            trading_volume_usd: market.total_volume.get(VS_CURRENCY).map(|v| *v as i64),
        };

        tracing::info!("Fetched historical ZEC price for {}: ${}", date, price);
        self.cache.insert(date, snapshot.clone()).await;
        Some(snapshot)
    }

    /// Live price, market cap and 24h volume from `simple/price`
    pub async fn fetch_current_price(&self) -> Option<PriceSnapshot> {
        let query = [
            ("ids", COIN_ID.to_string()),
            ("vs_currencies", VS_CURRENCY.to_string()),
            ("include_market_cap", "true".to_string()),
            ("include_24hr_vol", "true".to_string()),
        ];
        let mut response: HashMap<String, SimplePrice> =
            self.api.get_json("simple/price", &query, self.headers()).await?;

        let current = response.remove(COIN_ID)?;
        let price = current.usd?;
        tracing::info!("Fetched ZEC price: ${}", price);

        Some(PriceSnapshot {
            price_usd: price,
            market_cap_usd: current.usd_market_cap.map(|v| v as i64),
            trading_volume_usd: current.usd_24h_vol.map(|v| v as i64),
        })
    }

    async fn lookup(&self, date: NaiveDate, today: NaiveDate) -> Option<PriceSnapshot> {
        if let Some(snapshot) = self.fetch_historical_price(date).await {
            return Some(snapshot);
        }
        if date == today {
            return self.fetch_current_price().await;
        }
        tracing::warn!("No price data for {}", date);
        None
    }
}

#[async_trait]
impl PriceSource for CoinGeckoService {
    async fn price_for_date(&self, date: NaiveDate) -> Option<PriceSnapshot> {
        self.lookup(date, Utc::now().date_naive()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, extract::Query, http::HeaderMap as AxumHeaders, http::StatusCode, routing::get};
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 1,
            backoff_base: Duration::from_millis(1),
            min_interval: Duration::from_millis(1),
        }
    }

    /// History is known for 01-03-2024 only; simple/price always answers
    async fn spawn_market(history_hits: Arc<AtomicUsize>) -> String {
        let app = Router::new()
            .route(
                "/coins/zcash/history",
                get(move |Query(params): Query<HashMap<String, String>>, headers: AxumHeaders| {
                    let hits = history_hits.clone();
                    async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        if headers.get("x-cg-pro-api-key").is_none() {
                            return Err(StatusCode::UNAUTHORIZED);
                        }
                        if params.get("date").map(String::as_str) == Some("01-03-2024") {
                            Ok(Json(json!({
                                "market_data": {
                                    "current_price": { "usd": 31.5 },
                                    "market_cap": { "usd": 512000000.0 },
                                    "total_volume": { "usd": 42000000.0 }
                                }
                            })))
                        } else {
                            Ok(Json(json!({ "id": "zcash" })))
                        }
                    }
                }),
            )
            .route(
                "/simple/price",
                get(|| async {
                    Json::<Value>(json!({
                        "zcash": { "usd": 33.25, "usd_market_cap": 540000000.0, "usd_24h_vol": 39000000.0 }
                    }))
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_historical_price_is_cached() {
        let hits = Arc::new(AtomicUsize::new(0));
        let base = spawn_market(hits.clone()).await;
        let service =
            CoinGeckoService::with_policy(&base, Some("test-key".to_string()), fast_policy()).unwrap();

        let first = service.fetch_historical_price(ymd(2024, 3, 1)).await.unwrap();
        let second = service.fetch_historical_price(ymd(2024, 3, 1)).await.unwrap();

        assert_eq!(first.price_usd, 31.5);
        assert_eq!(first.market_cap_usd, Some(512_000_000));
        assert_eq!(first, second);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_today_falls_back_to_simple_price() {
        let hits = Arc::new(AtomicUsize::new(0));
        let base = spawn_market(hits).await;
        let service =
            CoinGeckoService::with_policy(&base, Some("test-key".to_string()), fast_policy()).unwrap();

        let today = ymd(2024, 6, 10);
        let snapshot = service.lookup(today, today).await.unwrap();
        assert_eq!(snapshot.price_usd, 33.25);
        assert_eq!(snapshot.trading_volume_usd, Some(39_000_000));

        // past dates without history get no enrichment
        assert!(service.lookup(ymd(2024, 6, 9), today).await.is_none());
    }

    #[tokio::test]
    async fn test_missing_api_key_is_rejected_upstream() {
        let hits = Arc::new(AtomicUsize::new(0));
        let base = spawn_market(hits.clone()).await;
        let service = CoinGeckoService::with_policy(&base, None, fast_policy()).unwrap();

        assert!(service.fetch_historical_price(ymd(2024, 3, 1)).await.is_none());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
