//! HTTP client for the journey-maps transfer API.
//!
//! This module fetches station transfers with:
//! - Connection pooling, one client reused across requests
//! - Dispatch rate limiting (spaces out request starts)
//! - Bounded parallel fetching that keeps results in request order
//! - Automatic retry with exponential backoff on 429 and transport errors

use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use reqwest::{Client, StatusCode};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::error::GuidanceError;
use crate::features::FeatureCollection;
use crate::instructions::Directions;
use crate::GuidanceConfig;

const TRANSFER_PATH: &str = "/v1/transfer";
const MAX_CONCURRENCY: usize = 8;

// ============================================================================
// Errors
// ============================================================================

/// Failures talking to the transfer API.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Request failed after {attempts} attempts: {source}")]
    Request {
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    #[error("Rate limited: still 429 after {attempts} attempts")]
    RateLimited { attempts: u32 },

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Undecodable transfer response: {0}")]
    Decode(#[source] GuidanceError),
}

/// Failures of a fetch-and-plan round trip. Fetch and planning problems stay
/// distinguishable.
#[derive(Error, Debug)]
pub enum TransferError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Guidance(#[from] GuidanceError),
}

// ============================================================================
// Configuration
// ============================================================================

/// Connection settings for [`TransferClient`].
#[derive(Debug, Clone)]
pub struct TransferClientConfig {
    /// API root, without a trailing slash.
    /// Default: https://journey-maps.api.sbb.ch
    pub base_url: String,
    /// Sent as the `client` query parameter. Default: "webshop"
    pub client_name: String,
    /// Sent as `clientVersion`. Default: "latest"
    pub client_version: String,
    /// Language of upstream labels. Default: "en"
    pub lang: String,
    /// Ask for step-free routes. Default: true
    pub accessible: bool,
    /// Per-request timeout. Default: 30 seconds
    pub timeout: Duration,
    /// Retries after the first attempt. Default: 3
    pub max_retries: u32,
    /// Minimum spacing between request starts. Default: 100 ms
    pub dispatch_interval: Duration,
}

impl Default for TransferClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://journey-maps.api.sbb.ch".to_string(),
            client_name: "webshop".to_string(),
            client_version: "latest".to_string(),
            lang: "en".to_string(),
            accessible: true,
            timeout: Duration::from_secs(30),
            max_retries: 3,
            dispatch_interval: Duration::from_millis(100),
        }
    }
}

/// A transfer between two tracks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub from_station_id: String,
    pub to_station_id: String,
    pub from_track: String,
    pub to_track: String,
}

impl TransferRequest {
    /// A transfer between two tracks of the same station.
    pub fn within_station(station_id: &str, from_track: &str, to_track: &str) -> Self {
        Self {
            from_station_id: station_id.to_string(),
            to_station_id: station_id.to_string(),
            from_track: from_track.to_string(),
            to_track: to_track.to_string(),
        }
    }
}

/// Progress callback type: (completed, total)
pub type ProgressCallback = Arc<dyn Fn(u32, u32) + Send + Sync>;

// ============================================================================
// Rate limiting
// ============================================================================

/// Spaces out when requests START, so a batch never bursts past the
/// configured dispatch rate.
struct DispatchRateLimiter {
    interval: Duration,
    next_dispatch: Mutex<Instant>,
    dispatched_count: AtomicU32,
    consecutive_429s: AtomicU32,
}

impl DispatchRateLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_dispatch: Mutex::new(Instant::now()),
            dispatched_count: AtomicU32::new(0),
            consecutive_429s: AtomicU32::new(0),
        }
    }

    /// Wait for our dispatch slot. Each caller gets a unique slot
    /// `interval` apart.
    async fn wait_for_dispatch_slot(&self) -> u32 {
        let (wait_duration, dispatch_num) = {
            let mut next = self.next_dispatch.lock().await;
            let now = Instant::now();
            let dispatch_at = if *next > now { *next } else { now };
            *next = dispatch_at + self.interval;

            let num = self.dispatched_count.fetch_add(1, Ordering::Relaxed) + 1;
            (dispatch_at.saturating_duration_since(now), num)
        };

        // Wait outside the lock
        if wait_duration > Duration::from_millis(5) {
            debug!("[Dispatch #{}] Waiting {:?} for slot", dispatch_num, wait_duration);
            tokio::time::sleep(wait_duration).await;
        }

        dispatch_num
    }

    fn record_success(&self) {
        self.consecutive_429s.store(0, Ordering::Relaxed);
    }

    fn record_429(&self) -> Duration {
        let count = self.consecutive_429s.fetch_add(1, Ordering::Relaxed) + 1;
        // Exponential backoff: 1s, 2s, 4s, 8s max
        let backoff = Duration::from_millis(500 * (1 << count.min(4)));
        warn!("[DispatchRateLimiter] Got 429! Consecutive: {}, backing off {:?}", count, backoff);
        backoff
    }
}

// ============================================================================
// Client
// ============================================================================

/// Client for the transfer endpoint. Cheap to share: wrap it in an `Arc` or
/// borrow it across tasks.
pub struct TransferClient {
    client: Client,
    api_key: String,
    config: TransferClientConfig,
    rate_limiter: DispatchRateLimiter,
}

impl TransferClient {
    /// Create a client with default connection settings.
    pub fn new(api_key: &str) -> Result<Self, FetchError> {
        Self::with_config(api_key, TransferClientConfig::default())
    }

    pub fn with_config(api_key: &str, config: TransferClientConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .pool_max_idle_per_host(MAX_CONCURRENCY * 2)
            .pool_idle_timeout(Duration::from_secs(60))
            .tcp_keepalive(Duration::from_secs(30))
            .timeout(config.timeout)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            rate_limiter: DispatchRateLimiter::new(config.dispatch_interval),
            config,
        })
    }

    fn url(&self) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), TRANSFER_PATH)
    }

    fn query_params(&self, request: &TransferRequest) -> Vec<(&'static str, String)> {
        vec![
            ("client", self.config.client_name.clone()),
            ("clientVersion", self.config.client_version.clone()),
            ("lang", self.config.lang.clone()),
            ("fromStationID", request.from_station_id.clone()),
            ("toStationID", request.to_station_id.clone()),
            ("fromTrack", request.from_track.clone()),
            ("toTrack", request.to_track.clone()),
            ("accessible", self.config.accessible.to_string()),
        ]
    }

    /// Fetch the feature collection describing one transfer.
    pub async fn fetch_transfer(&self, request: &TransferRequest) -> Result<FeatureCollection, FetchError> {
        let url = self.url();
        let params = self.query_params(request);
        let label = format!(
            "{} {} -> {} {}",
            request.from_station_id, request.from_track, request.to_station_id, request.to_track
        );

        let mut attempts = 0;
        let req_start = Instant::now();

        loop {
            attempts += 1;
            let response = self
                .client
                .get(&url)
                .query(&params)
                .header("X-API-Key", &self.api_key)
                .send()
                .await;

            let resp = match response {
                Ok(resp) => resp,
                Err(e) => {
                    if attempts > self.config.max_retries {
                        return Err(FetchError::Request { attempts, source: e });
                    }
                    let wait = Duration::from_millis(200 * (1 << attempts.min(5)));
                    warn!("[Fetch {}] Error: {}, retry {} after {:?}", label, e, attempts, wait);
                    tokio::time::sleep(wait).await;
                    continue;
                }
            };

            let status = resp.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                if attempts > self.config.max_retries {
                    return Err(FetchError::RateLimited { attempts });
                }
                let wait = self.rate_limiter.record_429();
                warn!("[Fetch {}] 429 Too Many Requests, retry {} with {:?} backoff", label, attempts, wait);
                tokio::time::sleep(wait).await;
                continue;
            }

            self.rate_limiter.record_success();

            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(FetchError::Status { status: status.as_u16(), body });
            }

            let bytes = resp
                .bytes()
                .await
                .map_err(|source| FetchError::Request { attempts, source })?;
            let collection: FeatureCollection = serde_json::from_slice(&bytes)
                .map_err(|e| FetchError::Decode(GuidanceError::from(e)))?;

            info!(
                "[Fetch {}] {} features, {:.1}KB in {:?}",
                label,
                collection.features.len(),
                bytes.len() as f64 / 1024.0,
                req_start.elapsed()
            );
            return Ok(collection);
        }
    }

    /// Fetch many transfers concurrently. Results come back in request order.
    pub async fn fetch_transfers(
        &self,
        requests: Vec<TransferRequest>,
        on_progress: Option<ProgressCallback>,
    ) -> Vec<Result<FeatureCollection, FetchError>> {
        let total = requests.len() as u32;
        let completed = Arc::new(AtomicU32::new(0));
        let start = Instant::now();

        info!(
            "[TransferClient] Starting fetch of {} transfers (dispatch interval: {:?}, max concurrent: {})",
            total, self.config.dispatch_interval, MAX_CONCURRENCY
        );

        let results: Vec<Result<FeatureCollection, FetchError>> = stream::iter(requests)
            .map(|request| {
                let completed = Arc::clone(&completed);
                let callback = on_progress.clone();

                async move {
                    self.rate_limiter.wait_for_dispatch_slot().await;
                    let result = self.fetch_transfer(&request).await;

                    let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                    if let Some(ref cb) = callback {
                        cb(done, total);
                    }
                    result
                }
            })
            .buffered(MAX_CONCURRENCY)
            .collect()
            .await;

        let success_count = results.iter().filter(|r| r.is_ok()).count();
        info!(
            "[TransferClient] DONE: {}/{} success in {:.2}s",
            success_count,
            total,
            start.elapsed().as_secs_f64()
        );

        results
    }

    /// Fetch a transfer and plan walking directions for it.
    pub async fn directions(
        &self,
        request: &TransferRequest,
        config: &GuidanceConfig,
    ) -> Result<Directions, TransferError> {
        let collection = self.fetch_transfer(request).await?;
        Ok(crate::plan_directions(&collection.features, config)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_dispatch_rate_limiter() {
        let limiter = DispatchRateLimiter::new(Duration::from_millis(50));

        // First request should not wait
        let start = Instant::now();
        let num = limiter.wait_for_dispatch_slot().await;
        assert_eq!(num, 1);
        assert!(start.elapsed() < Duration::from_millis(10));

        // Second request should wait ~50ms
        let start2 = Instant::now();
        let num2 = limiter.wait_for_dispatch_slot().await;
        assert_eq!(num2, 2);
        let elapsed = start2.elapsed();
        assert!(elapsed >= Duration::from_millis(40), "Expected ~50ms wait, got {:?}", elapsed);
    }

    #[test]
    fn test_backoff_grows_and_resets() {
        let limiter = DispatchRateLimiter::new(Duration::ZERO);
        let first = limiter.record_429();
        let second = limiter.record_429();
        assert!(second > first);

        limiter.record_success();
        assert_eq!(limiter.record_429(), first);
    }

    #[test]
    fn test_query_params() {
        let client = TransferClient::new("secret").unwrap();
        let request = TransferRequest::within_station("8503000", "31", "18");
        let params = client.query_params(&request);

        assert_eq!(client.url(), "https://journey-maps.api.sbb.ch/v1/transfer");
        assert!(params.contains(&("client", "webshop".to_string())));
        assert!(params.contains(&("fromStationID", "8503000".to_string())));
        assert!(params.contains(&("toStationID", "8503000".to_string())));
        assert!(params.contains(&("fromTrack", "31".to_string())));
        assert!(params.contains(&("toTrack", "18".to_string())));
        assert!(params.contains(&("accessible", "true".to_string())));
    }

    #[test]
    fn test_trailing_slash_in_base_url() {
        let config = TransferClientConfig {
            base_url: "http://localhost:8080/".to_string(),
            ..Default::default()
        };
        let client = TransferClient::with_config("secret", config).unwrap();
        assert_eq!(client.url(), "http://localhost:8080/v1/transfer");
    }

    /// Serve canned responses on a local port. `respond` gets the request
    /// line and returns (status, delay, body).
    async fn serve<F>(respond: F) -> String
    where
        F: Fn(&str) -> (u16, Duration, String) + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let respond = Arc::new(respond);

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let respond = Arc::clone(&respond);
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 16 * 1024];
                    let mut read = 0;
                    while read < buf.len() {
                        let n = socket.read(&mut buf[read..]).await.unwrap_or(0);
                        if n == 0 {
                            break;
                        }
                        read += n;
                        if buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                            break;
                        }
                    }
                    let request = String::from_utf8_lossy(&buf[..read]).to_string();
                    let request_line = request.lines().next().unwrap_or_default().to_string();

                    let (status, delay, body) = respond(&request_line);
                    tokio::time::sleep(delay).await;
                    let response = format!(
                        "HTTP/1.1 {} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status,
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        format!("http://{}", addr)
    }

    fn local_client(base_url: String, max_retries: u32) -> TransferClient {
        let config = TransferClientConfig {
            base_url,
            max_retries,
            timeout: Duration::from_secs(5),
            dispatch_interval: Duration::ZERO,
            ..Default::default()
        };
        TransferClient::with_config("secret", config).unwrap()
    }

    fn collection_with(features: usize) -> String {
        json!({"type": "FeatureCollection", "features": vec![json!({}); features]}).to_string()
    }

    fn query_value<'a>(request_line: &'a str, key: &str) -> Option<&'a str> {
        let query = request_line.split_whitespace().nth(1)?.split_once('?')?.1;
        query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    #[tokio::test]
    async fn test_retries_after_429() {
        let hits = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&hits);
        let base_url = serve(move |_| {
            if counter.fetch_add(1, Ordering::Relaxed) == 0 {
                (429, Duration::ZERO, "slow down".to_string())
            } else {
                (200, Duration::ZERO, collection_with(2))
            }
        })
        .await;

        let client = local_client(base_url, 1);
        let request = TransferRequest::within_station("8503000", "31", "18");
        let collection = client.fetch_transfer(&request).await.unwrap();

        assert_eq!(collection.features.len(), 2);
        assert_eq!(hits.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_gives_up_when_rate_limited() {
        let base_url = serve(|_| (429, Duration::ZERO, "slow down".to_string())).await;

        let client = local_client(base_url, 0);
        let request = TransferRequest::within_station("8503000", "31", "18");
        let err = client.fetch_transfer(&request).await.unwrap_err();

        assert!(matches!(err, FetchError::RateLimited { attempts: 1 }));
    }

    #[tokio::test]
    async fn test_error_status_carries_body() {
        let base_url = serve(|_| (500, Duration::ZERO, "upstream exploded".to_string())).await;

        let client = local_client(base_url, 3);
        let request = TransferRequest::within_station("8503000", "31", "18");
        let err = client.fetch_transfer(&request).await.unwrap_err();

        match err {
            FetchError::Status { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "upstream exploded");
            }
            other => panic!("expected a status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_undecodable_body() {
        let base_url = serve(|_| (200, Duration::ZERO, "<html>not json</html>".to_string())).await;

        let client = local_client(base_url, 0);
        let request = TransferRequest::within_station("8503000", "31", "18");
        let err = client.fetch_transfer(&request).await.unwrap_err();

        assert!(matches!(err, FetchError::Decode(GuidanceError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_sends_transfer_query() {
        let base_url = serve(|line| {
            let ok = line.starts_with("GET /v1/transfer?")
                && query_value(line, "client") == Some("webshop")
                && query_value(line, "fromStationID") == Some("8503000")
                && query_value(line, "toTrack") == Some("18");
            if ok {
                (200, Duration::ZERO, collection_with(1))
            } else {
                (400, Duration::ZERO, line.to_string())
            }
        })
        .await;

        let client = local_client(base_url, 0);
        let request = TransferRequest::within_station("8503000", "31", "18");
        assert_eq!(client.fetch_transfer(&request).await.unwrap().features.len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_transfers_keeps_order_and_reports_progress() {
        // Earlier requests answer later, so completion order is reversed
        let base_url = serve(|line| {
            let index: u64 = query_value(line, "fromTrack").and_then(|t| t.parse().ok()).unwrap_or(0);
            let delay = Duration::from_millis(40 * (4 - index.min(4)));
            (200, delay, collection_with(index as usize))
        })
        .await;

        let client = local_client(base_url, 0);
        let requests: Vec<TransferRequest> = (0..4)
            .map(|i| TransferRequest::within_station("8503000", &i.to_string(), "18"))
            .collect();

        let calls = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&calls);
        let progress: ProgressCallback = Arc::new(move |done, total| {
            assert_eq!(total, 4);
            assert!(done <= total);
            seen.fetch_add(1, Ordering::Relaxed);
        });

        let results = client.fetch_transfers(requests, Some(progress)).await;
        assert_eq!(results.len(), 4);
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.as_ref().unwrap().features.len(), i);
        }
        assert_eq!(calls.load(Ordering::Relaxed), 4);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_fetch_error() {
        let config = TransferClientConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            max_retries: 0,
            timeout: Duration::from_secs(2),
            ..Default::default()
        };
        let client = TransferClient::with_config("secret", config).unwrap();
        let request = TransferRequest::within_station("8503000", "31", "18");

        let err = client.directions(&request, &GuidanceConfig::default()).await.unwrap_err();
        assert!(matches!(err, TransferError::Fetch(FetchError::Request { attempts: 1, .. })));
    }
}
