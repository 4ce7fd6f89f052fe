use crate::error::{FetchError, Result};
use crate::signal::CrawlSignal;
use reqwest::Client;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Default per-request timeout, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// A successfully fetched page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Where the page was served from, after any redirects.
    pub url: String,
    pub status_code: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// HTTP GET with a per-request timeout.
///
/// Implementations own whatever transport state a single request needs and
/// must release it before the returned future completes, on every path.
pub trait PageFetcher: Send + Sync + 'static {
    fn fetch(
        &self,
        url: &str,
        timeout: Duration,
    ) -> impl Future<Output = std::result::Result<FetchedPage, FetchError>> + Send;
}

/// [`PageFetcher`] backed by a pooled `reqwest` client.
///
/// Clones share one connection pool. Each fetch owns its `Response` and
/// drops it on success, error and cancellation alike, which hands the
/// connection back to the pool.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: Client,
}

impl ReqwestFetcher {
    pub fn new(user_agent: &str, connect_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .connect_timeout(connect_timeout)
            .pool_max_idle_per_host(50)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

impl PageFetcher for ReqwestFetcher {
    async fn fetch(
        &self,
        url: &str,
        timeout: Duration,
    ) -> std::result::Result<FetchedPage, FetchError> {
        debug!("Fetching {}", url);

        let response = self.client.get(url).timeout(timeout).send().await?;

        let final_url = response.url().to_string();
        let status_code = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = response.bytes().await?.to_vec();

        Ok(FetchedPage {
            url: final_url,
            status_code,
            content_type,
            body,
        })
    }
}

/// Run one fetch under the crawl's stop switches.
///
/// Returns [`FetchError::Cancelled`] without touching the network if the
/// crawl is already disarmed, and abandons the request if the crawl is
/// cancelled while it is in flight.
pub async fn fetch_page<F: PageFetcher>(
    fetcher: &F,
    url: &str,
    timeout: Duration,
    signal: &CrawlSignal,
) -> std::result::Result<FetchedPage, FetchError> {
    if !signal.is_armed() {
        return Err(FetchError::Cancelled);
    }

    tokio::select! {
        biased;
        _ = signal.cancelled() => Err(FetchError::Cancelled),
        result = fetcher.fetch(url, timeout) => result,
    }
}
