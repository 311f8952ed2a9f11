use crate::cache::CacheStore;
use crate::error::{ClientError, Result};
use reqwest::Client;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Point-in-time view of the client's fetch counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub upstream_requests: u64,
    pub retries: u64,
}

#[derive(Default)]
struct Metrics {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    upstream_requests: AtomicU64,
    retries: AtomicU64,
}

/// Read-through cached GET client for a portal-style JSON API.
///
/// Every query path is expanded to `{endpoint}/{path}?format=json&frame=object`.
/// Responses are cached by the exact request URL; cache hits never touch the
/// network. Transient upstream failures are retried a bounded number of times.
pub struct PortalClient {
    http: Client,
    endpoint: String,
    credentials: Option<(String, String)>,
    cache: Option<CacheStore>,
    max_retries: usize,
    metrics: Metrics,
}

impl PortalClient {
    pub fn new(endpoint: &str) -> Result<Self> {
        let endpoint = endpoint.trim_end_matches('/').to_string();
        Url::parse(&endpoint)
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {}", endpoint, e)))?;

        let http = Client::builder()
            .user_agent(concat!("minidb/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .build()?;

        Ok(Self {
            http,
            endpoint,
            credentials: None,
            cache: None,
            max_retries: 3,
            metrics: Metrics::default(),
        })
    }

    pub fn with_credentials(mut self, key: String, secret: String) -> Self {
        self.credentials = Some((key, secret));
        self
    }

    pub fn with_cache(mut self, cache: CacheStore) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            cache_hits: self.metrics.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.metrics.cache_misses.load(Ordering::Relaxed),
            upstream_requests: self.metrics.upstream_requests.load(Ordering::Relaxed),
            retries: self.metrics.retries.load(Ordering::Relaxed),
        }
    }

    /// Cached GET of a query path, returning the parsed JSON document.
    pub async fn get(&self, path: &str) -> Result<Value> {
        let url = self.build_url(path)?;
        let url_str = url.to_string();

        if let Some(store) = &self.cache {
            if let Some(body) = store.get(&url_str)? {
                self.metrics.cache_hits.fetch_add(1, Ordering::Relaxed);
                debug!("Cache hit for {}", url_str);
                return Ok(serde_json::from_str(&body)?);
            }
            self.metrics.cache_misses.fetch_add(1, Ordering::Relaxed);
        }

        debug!("Fetching {}", url_str);
        let body = self.fetch_with_retry(&url).await?;

        if let Some(store) = &self.cache {
            store.set(&url_str, &body)?;
        }

        Ok(serde_json::from_str(&body)?)
    }

    fn build_url(&self, path: &str) -> Result<Url> {
        let path = path.trim_start_matches('/');
        let raw = format!("{}/{}", self.endpoint, path);
        let mut url =
            Url::parse(&raw).map_err(|e| ClientError::InvalidUrl(format!("{}: {}", raw, e)))?;
        url.query_pairs_mut()
            .append_pair("format", "json")
            .append_pair("frame", "object");
        Ok(url)
    }

    async fn fetch_with_retry(&self, url: &Url) -> Result<String> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            self.metrics.upstream_requests.fetch_add(1, Ordering::Relaxed);

            match self.fetch_once(url).await {
                Ok(body) => return Ok(body),
                Err(e) if attempt <= self.max_retries && is_transient(&e) => {
                    warn!("Transient failure for {} (attempt {}): {}", url, attempt, e);
                    self.metrics.retries.fetch_add(1, Ordering::Relaxed);
                    tokio::time::sleep(Duration::from_millis(250 * attempt as u64)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once(&self, url: &Url) -> Result<String> {
        let mut request = self.http.get(url.clone());
        if let Some((key, secret)) = &self.credentials {
            request = request.basic_auth(key, Some(secret));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response.text().await?)
    }
}

fn is_transient(err: &ClientError) -> bool {
    match err {
        ClientError::HttpError(e) => e.is_connect() || e.is_timeout(),
        ClientError::Status { status, .. } => matches!(status, 502 | 503 | 504),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_get_appends_fixed_query_parameters() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/profiles/Donor"))
            .and(query_param("format", "json"))
            .and(query_param("frame", "object"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"title\": \"Donor\"}"))
            .mount(&mock_server)
            .await;

        let client = PortalClient::new(&mock_server.uri()).unwrap();
        let doc = client.get("profiles/Donor").await.unwrap();
        assert_eq!(doc["title"], "Donor");
    }

    #[tokio::test]
    async fn test_leading_slash_is_tolerated() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/donors/d1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"uuid\": \"d1\"}"))
            .mount(&mock_server)
            .await;

        let client = PortalClient::new(&mock_server.uri()).unwrap();
        let doc = client.get("/donors/d1").await.unwrap();
        assert_eq!(doc["uuid"], "d1");
    }

    #[tokio::test]
    async fn test_cache_read_through() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/donors/d1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"uuid\": \"d1\"}"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = PortalClient::new(&mock_server.uri())
            .unwrap()
            .with_cache(CacheStore::open_in_memory().unwrap());

        let first = client.get("donors/d1").await.unwrap();
        let second = client.get("donors/d1").await.unwrap();
        assert_eq!(first, second);

        let metrics = client.metrics();
        assert_eq!(metrics.cache_misses, 1);
        assert_eq!(metrics.cache_hits, 1);
        assert_eq!(metrics.upstream_requests, 1);
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search/"))
            .respond_with(ResponseTemplate::new(404).set_body_string("{\"@graph\": []}"))
            .mount(&mock_server)
            .await;

        let client = PortalClient::new(&mock_server.uri()).unwrap();
        let err = client.get("search/").await.unwrap_err();
        assert_eq!(err.status(), Some(404));
    }

    #[tokio::test]
    async fn test_failed_fetch_is_not_cached() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/donors/d1"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let client = PortalClient::new(&mock_server.uri())
            .unwrap()
            .with_cache(CacheStore::open_in_memory().unwrap())
            .with_max_retries(0);

        assert!(client.get("donors/d1").await.is_err());
        let metrics = client.metrics();
        assert_eq!(metrics.cache_hits, 0);
        assert_eq!(metrics.cache_misses, 1);
    }

    #[tokio::test]
    async fn test_retries_transient_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/donors/d1"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/donors/d1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"uuid\": \"d1\"}"))
            .mount(&mock_server)
            .await;

        let client = PortalClient::new(&mock_server.uri()).unwrap();
        let doc = client.get("donors/d1").await.unwrap();
        assert_eq!(doc["uuid"], "d1");
        assert_eq!(client.metrics().retries, 1);
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let client = PortalClient::new("http://example.org/").unwrap();
        assert_eq!(client.endpoint(), "http://example.org");
    }

    #[test]
    fn test_invalid_endpoint_is_rejected() {
        assert!(PortalClient::new("not a url").is_err());
    }
}
