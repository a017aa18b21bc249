//! Shared HTTP GET client for upstream data APIs
//!
//! Adds a client-side rate limit and exponential backoff on top of
//! `reqwest`. Failures are absorbed: callers get `None` and a log line.

use std::time::Duration;

use parking_lot::Mutex;
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tokio::time::{Instant, sleep_until};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Wait before retry `n` (0-based) is `backoff_base * 2^n`
    pub backoff_base: Duration,
    /// Minimum gap between two requests from this client
    pub min_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: Duration::from_secs(1),
            min_interval: Duration::from_millis(500),
        }
    }
}

/// Reserves request slots at least `min_interval` apart
#[derive(Debug)]
struct RateLimiter {
    min_interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_slot: Mutex::new(None),
        }
    }

    async fn wait(&self) {
        let slot = {
            let mut next = self.next_slot.lock();
            let now = Instant::now();
            let slot = match *next {
                Some(at) if at > now => at,
                _ => now,
            };
            *next = Some(slot + self.min_interval);
            slot
        };
        sleep_until(slot).await;
    }
}

enum AttemptError {
    /// 4xx or undecodable body: retrying will not help
    Fatal(String),
    Retryable(String),
}

#[derive(Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    policy: RetryPolicy,
    limiter: RateLimiter,
}

impl ApiClient {
    pub fn new(base_url: &str, policy: RetryPolicy) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            limiter: RateLimiter::new(policy.min_interval),
            policy,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    /// GET `endpoint` and decode the JSON body. Returns `None` on a 4xx, on
    /// an undecodable body, or once all attempts have failed.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
        headers: HeaderMap,
    ) -> Option<T> {
        let url = self.url(endpoint);
        let attempts = self.policy.max_retries.max(1);

        for attempt in 0..attempts {
            self.limiter.wait().await;
            tracing::debug!("GET {} (attempt {}/{})", url, attempt + 1, attempts);

            match self.attempt(&url, query, headers.clone()).await {
                Ok(body) => return Some(body),
                Err(AttemptError::Fatal(reason)) => {
                    tracing::warn!("Request to {} failed: {}", url, reason);
                    return None;
                }
                Err(AttemptError::Retryable(reason)) => {
                    if attempt + 1 == attempts {
                        tracing::error!("Failed after {} attempts: {} ({})", attempts, url, reason);
                        return None;
                    }
                    let wait = self.policy.backoff_base * 2u32.pow(attempt);
                    tracing::info!("{} for {}, retrying in {:?}", reason, url, wait);
                    tokio::time::sleep(wait).await;
                }
            }
        }

        None
    }

    async fn attempt<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        headers: HeaderMap,
    ) -> Result<T, AttemptError> {
        let response = self
            .client
            .get(url)
            .header("accept", "application/json")
            .headers(headers)
            .query(query)
            .send()
            .await
            .map_err(|e| AttemptError::Retryable(format!("request error: {}", e)))?;

        let status = response.status();
        if status.is_client_error() {
            return Err(AttemptError::Fatal(format!("HTTP {}", status)));
        }
        if !status.is_success() {
            return Err(classify_status(status));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AttemptError::Fatal(format!("invalid JSON body: {}", e)))
    }
}

fn classify_status(status: StatusCode) -> AttemptError {
    if status.is_server_error() {
        AttemptError::Retryable(format!("HTTP {}", status))
    } else {
        AttemptError::Fatal(format!("unexpected HTTP {}", status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, http::StatusCode, routing::get};
    use serde_json::{Value, json};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            backoff_base: Duration::from_millis(5),
            min_interval: Duration::from_millis(1),
        }
    }

    /// `/flaky` fails twice with 503 then succeeds, `/missing` is 404,
    /// `/down` always answers 500
    async fn spawn_upstream() -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let flaky_hits = hits.clone();
        let missing_hits = hits.clone();
        let down_hits = hits.clone();

        let app = Router::new()
            .route(
                "/flaky",
                get(move || {
                    let hits = flaky_hits.clone();
                    async move {
                        if hits.fetch_add(1, Ordering::SeqCst) < 2 {
                            Err(StatusCode::SERVICE_UNAVAILABLE)
                        } else {
                            Ok(Json(json!({ "blocks": 42 })))
                        }
                    }
                }),
            )
            .route(
                "/missing",
                get(move || {
                    let hits = missing_hits.clone();
                    async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        StatusCode::NOT_FOUND
                    }
                }),
            )
            .route(
                "/down",
                get(move || {
                    let hits = down_hits.clone();
                    async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), hits)
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let (base, hits) = spawn_upstream().await;
        let client = ApiClient::new(&base, fast_policy()).unwrap();

        let body: Option<Value> = client.get_json("flaky", &[], HeaderMap::new()).await;
        assert_eq!(body, Some(json!({ "blocks": 42 })));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_client_errors_abort_immediately() {
        let (base, hits) = spawn_upstream().await;
        let client = ApiClient::new(&base, fast_policy()).unwrap();

        let body: Option<Value> = client.get_json("/missing", &[], HeaderMap::new()).await;
        assert!(body.is_none());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_return_none() {
        let (base, hits) = spawn_upstream().await;
        let client = ApiClient::new(&format!("{}/", base), fast_policy()).unwrap();

        let body: Option<Value> = client.get_json("down", &[], HeaderMap::new()).await;
        assert!(body.is_none());
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_unreachable_host_returns_none() {
        let client = ApiClient::new("http://127.0.0.1:9", fast_policy()).unwrap();
        let body: Option<Value> = client.get_json("statistics", &[], HeaderMap::new()).await;
        assert!(body.is_none());
    }

    #[tokio::test]
    async fn test_rate_limiter_spaces_requests() {
        let limiter = RateLimiter::new(Duration::from_millis(40));
        let start = Instant::now();
        limiter.wait().await;
        limiter.wait().await;
        limiter.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(80));
    }
}
