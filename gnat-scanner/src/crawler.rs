use crate::error::{FetchError, Result, ScanError};
use crate::executor::TaskPool;
use crate::extract::Extractor;
use crate::fetch::{DEFAULT_TIMEOUT_SECS, FetchedPage, PageFetcher, ReqwestFetcher, fetch_page};
use crate::frontier::{CrawlBudget, CrawlJob, Frontier, compile_blacklist};
use crate::registry::{ArgumentRegistry, AttackSurface, authority};
use crate::signal::CrawlSignal;
use crate::sink::{NoopSink, SharedSink};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_MAX_DEPTH: usize = 3;
pub const DEFAULT_WORKERS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlState {
    /// Built but not yet fetching.
    Idle,
    /// Jobs are being dispatched.
    Running,
    /// Backlog drained and no fetch outstanding.
    Completed,
    /// The discovery budget was reached.
    Disarmed,
    /// Stopped from outside.
    Cancelled,
}

impl CrawlState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CrawlState::Completed | CrawlState::Disarmed | CrawlState::Cancelled
        )
    }

    /// The state a crawl moves to once `signal` has been looked at. Only a
    /// running crawl can stop, and a cancel overrides a disarm.
    fn observe(self, signal: &CrawlSignal) -> Self {
        match self {
            CrawlState::Running | CrawlState::Disarmed if signal.is_cancelled() => {
                CrawlState::Cancelled
            }
            CrawlState::Running if !signal.is_armed() => CrawlState::Disarmed,
            _ => self,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchFailure {
    pub url: String,
    pub reason: String,
}

/// Summary of one finished crawl. The sink sees the same discoveries as they
/// happen.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlOutcome {
    pub seed: String,
    pub state: CrawlState,
    pub pages_fetched: usize,
    pub urls_crawled: usize,
    pub timeouts: usize,
    pub failures: Vec<FetchFailure>,
    pub attack_surfaces: Vec<AttackSurface>,
}

type FetchCompletion = (CrawlJob, std::result::Result<FetchedPage, FetchError>);

/// State that lives exactly as long as one call to [`Crawler::crawl`].
struct CrawlSession {
    state: CrawlState,
    frontier: Frontier,
    registry: ArgumentRegistry,
    pool: TaskPool<FetchCompletion>,
    pages_fetched: usize,
    timeouts: usize,
    failures: Vec<FetchFailure>,
}

impl CrawlSession {
    fn transition(&mut self, next: CrawlState) {
        if next != self.state {
            debug!("Crawl state {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }
}

pub struct Crawler<F: PageFetcher = ReqwestFetcher> {
    fetcher: Arc<F>,
    sink: SharedSink,
    max_depth: usize,
    width: usize,
    local_only: bool,
    workers: usize,
    request_timeout: Duration,
    blacklist: Vec<String>,
}

impl Crawler<ReqwestFetcher> {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT_SECS)
    }

    pub fn with_timeout(timeout_secs: u64) -> Result<Self> {
        let user_agent = concat!("gnat/", env!("CARGO_PKG_VERSION"));
        let fetcher = ReqwestFetcher::new(user_agent, Duration::from_secs(timeout_secs))?;
        Ok(Self::with_fetcher(fetcher).with_request_timeout(Duration::from_secs(timeout_secs)))
    }
}

impl<F: PageFetcher> Crawler<F> {
    pub fn with_fetcher(fetcher: F) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            sink: Arc::new(NoopSink),
            max_depth: DEFAULT_MAX_DEPTH,
            width: 0,
            local_only: true,
            workers: DEFAULT_WORKERS,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            blacklist: Vec::new(),
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Discovery budget; zero means unbounded.
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }

    pub fn with_local_only(mut self, local_only: bool) -> Self {
        self.local_only = local_only;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Regex patterns; a URL matching any of them is never crawled.
    pub fn with_blacklist(mut self, patterns: Vec<String>) -> Self {
        self.blacklist = patterns;
        self
    }

    pub fn with_sink(mut self, sink: SharedSink) -> Self {
        self.sink = sink;
        self
    }

    pub async fn crawl(&self, seed: &str) -> Result<CrawlOutcome> {
        self.crawl_with_signal(seed, CrawlSignal::new()).await
    }

    /// Crawl from `seed` until the backlog drains, the budget is reached or
    /// `signal` is cancelled.
    pub async fn crawl_with_signal(&self, seed: &str, signal: CrawlSignal) -> Result<CrawlOutcome> {
        let parsed = Url::parse(seed)
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", seed, e)))?;
        if !parsed.scheme().starts_with("http") {
            return Err(ScanError::InvalidUrl(format!("{}: not an http(s) URL", seed)));
        }
        let origin_host = authority(&parsed);
        let seed_url = String::from(parsed);
        let budget = CrawlBudget::from_width(self.width);

        let mut session = CrawlSession {
            frontier: Frontier::new(
                compile_blacklist(&self.blacklist)?,
                self.local_only,
                budget,
                signal.clone(),
            ),
            state: CrawlState::Idle,
            registry: ArgumentRegistry::with_limit(budget.limit()),
            pool: TaskPool::new(self.workers),
            pages_fetched: 0,
            timeouts: 0,
            failures: Vec::new(),
        };

        info!(
            "Starting crawl of {} (depth {}, budget {}, {} workers, local only: {})",
            seed_url,
            self.max_depth,
            if budget.is_unbounded() {
                "unbounded".to_string()
            } else {
                budget.limit().to_string()
            },
            session.pool.capacity(),
            self.local_only
        );

        session.transition(CrawlState::Running);
        session.transition(session.state.observe(&signal));

        if session.state == CrawlState::Running {
            session.frontier.mark_crawled(&seed_url);
            self.submit(
                &mut session.pool,
                CrawlJob {
                    origin_host,
                    target_url: seed_url.clone(),
                    remaining_depth: self.max_depth,
                    width_budget: budget,
                },
                &signal,
            );
        }

        loop {
            session.transition(session.state.observe(&signal));
            if session.state == CrawlState::Running && session.pool.below_half() {
                while session.pool.has_capacity()
                    && let Some(job) = session.frontier.next_job()
                {
                    self.submit(&mut session.pool, job, &signal);
                }
            }

            let Some(joined) = session.pool.next_completed().await else {
                break;
            };
            match joined {
                Ok((job, result)) => self.handle_completion(&mut session, job, result, &signal),
                Err(e) => warn!("Fetch task failed: {}", e),
            }
        }
        session.pool.shutdown().await;

        session.transition(session.state.observe(&signal));
        if session.state == CrawlState::Running {
            session.transition(CrawlState::Completed);
        }
        debug_assert!(session.state.is_terminal());
        info!(
            "Crawl of {} finished ({:?}): {} pages, {} attack surfaces",
            seed_url,
            session.state,
            session.pages_fetched,
            session.registry.discovered_count()
        );

        Ok(CrawlOutcome {
            seed: seed_url,
            state: session.state,
            pages_fetched: session.pages_fetched,
            urls_crawled: session.frontier.crawled_count(),
            timeouts: session.timeouts,
            failures: session.failures,
            attack_surfaces: session.registry.discovered().to_vec(),
        })
    }

    fn submit(&self, pool: &mut TaskPool<FetchCompletion>, job: CrawlJob, signal: &CrawlSignal) {
        let fetcher = self.fetcher.clone();
        let signal = signal.clone();
        let timeout = self.request_timeout;

        pool.spawn(async move {
            let result = fetch_page(fetcher.as_ref(), &job.target_url, timeout, &signal).await;
            (job, result)
        });
    }

    fn handle_completion(
        &self,
        session: &mut CrawlSession,
        job: CrawlJob,
        result: std::result::Result<FetchedPage, FetchError>,
        signal: &CrawlSignal,
    ) {
        let page = match result {
            Ok(page) => page,
            Err(FetchError::Timeout) => {
                debug!("Timed out: {}", job.target_url);
                session.timeouts += 1;
                return;
            }
            Err(FetchError::Cancelled) => {
                debug!("Abandoned: {}", job.target_url);
                return;
            }
            Err(FetchError::Transport(reason)) => {
                warn!("Crawl error for {}: {}", job.target_url, reason);
                self.sink.on_fetch_failed(&job.target_url, &reason);
                session.failures.push(FetchFailure {
                    url: job.target_url,
                    reason,
                });
                return;
            }
        };

        if !signal.is_armed() {
            debug!("Crawl stopped, dropping {}", page.url);
            return;
        }

        session.pages_fetched += 1;
        self.sink.on_crawl_start(&job.target_url);

        // Links on a redirected page are relative to where it was served from.
        if page.url != job.target_url {
            debug!("{} redirected to {}", job.target_url, page.url);
            session.frontier.mark_crawled(&page.url);
        }

        let extraction = Extractor::new(job.width_budget).extract(
            &page.body,
            page.content_type.as_deref(),
            &page.url,
        );
        debug!(
            "{} [{}]: {} links, {} forms{}",
            page.url,
            page.status_code,
            extraction.links.len(),
            extraction.forms_found,
            if extraction.degraded { " (raw scan)" } else { "" }
        );

        for link in &extraction.links {
            let decisions = session.frontier.admit(
                &link.href,
                &page.url,
                &job.origin_host,
                job.remaining_depth,
                &mut session.registry,
            );
            for decision in &decisions {
                let Some(url) = decision.url() else {
                    continue;
                };
                for surface in decision.surfaces() {
                    self.sink.on_attack_surface_discovered(surface.as_str());
                }
                self.sink.on_link_found(&page.url, url);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::CrawlSink;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    const SITE: &str = "http://site.example.com";

    /// Serves pages from memory and records every request it sees.
    #[derive(Default)]
    struct SiteFetcher {
        pages: HashMap<String, String>,
        slow: HashMap<String, Duration>,
        timeouts: Vec<String>,
        requested: Mutex<Vec<String>>,
    }

    impl SiteFetcher {
        fn page(mut self, path: &str, html: &str) -> Self {
            self.pages.insert(format!("{}{}", SITE, path), html.to_string());
            self
        }

        fn slow_page(mut self, path: &str, html: &str, delay: Duration) -> Self {
            self.slow.insert(format!("{}{}", SITE, path), delay);
            self.page(path, html)
        }

        fn timing_out(mut self, path: &str) -> Self {
            self.timeouts.push(format!("{}{}", SITE, path));
            self
        }
    }

    impl PageFetcher for SiteFetcher {
        async fn fetch(
            &self,
            url: &str,
            _timeout: Duration,
        ) -> std::result::Result<FetchedPage, FetchError> {
            self.requested.lock().unwrap().push(url.to_string());
            if let Some(delay) = self.slow.get(url) {
                tokio::time::sleep(*delay).await;
            }
            if self.timeouts.iter().any(|t| t == url) {
                return Err(FetchError::Timeout);
            }
            match self.pages.get(url) {
                Some(html) => Ok(FetchedPage {
                    url: url.to_string(),
                    status_code: 200,
                    content_type: Some("text/html".to_string()),
                    body: html.clone().into_bytes(),
                }),
                None => Err(FetchError::Transport(format!("no route to {}", url))),
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        Start(String),
        Link(String, String),
        Failed(String),
        Surface(String),
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<Event>>,
    }

    impl RecordingSink {
        fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }

        fn surfaces(&self) -> Vec<String> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    Event::Surface(url) => Some(url),
                    _ => None,
                })
                .collect()
        }
    }

    impl CrawlSink for RecordingSink {
        fn on_crawl_start(&self, url: &str) {
            self.events.lock().unwrap().push(Event::Start(url.to_string()));
        }

        fn on_link_found(&self, from_url: &str, to_url: &str) {
            self.events
                .lock()
                .unwrap()
                .push(Event::Link(from_url.to_string(), to_url.to_string()));
        }

        fn on_fetch_failed(&self, url: &str, _reason: &str) {
            self.events.lock().unwrap().push(Event::Failed(url.to_string()));
        }

        fn on_attack_surface_discovered(&self, url: &str) {
            self.events.lock().unwrap().push(Event::Surface(url.to_string()));
        }
    }

    fn url(path: &str) -> String {
        format!("{}{}", SITE, path)
    }

    fn crawler(fetcher: SiteFetcher) -> (Crawler<SiteFetcher>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let crawler = Crawler::with_fetcher(fetcher).with_sink(sink.clone());
        (crawler, sink)
    }

    fn requested(crawler: &Crawler<SiteFetcher>) -> Vec<String> {
        let mut requested = crawler.fetcher.requested.lock().unwrap().clone();
        requested.sort();
        requested
    }

    #[tokio::test]
    async fn test_crawl_discovers_parameters_and_paths() {
        let fetcher = SiteFetcher::default()
            .page(
                "/",
                r#"<a href="/a?id=1">a</a><a href="/b">b</a>
                   <a href="http://other.example.org/">off-site</a>"#,
            )
            .page("/a?id=1", "<p>a</p>")
            .page("/b", "<p>b</p>");
        let (crawler, sink) = crawler(fetcher);

        let outcome = crawler.crawl(SITE).await.unwrap();

        assert_eq!(outcome.state, CrawlState::Completed);
        assert_eq!(outcome.seed, url("/"));
        assert_eq!(outcome.pages_fetched, 3);
        assert_eq!(outcome.urls_crawled, 3);
        assert_eq!(
            outcome
                .attack_surfaces
                .iter()
                .map(AttackSurface::as_str)
                .collect::<Vec<_>>(),
            vec![url("/a?id=XSS"), url("/b/XSS")]
        );
        assert_eq!(sink.surfaces(), vec![url("/a?id=XSS"), url("/b/XSS")]);
        assert!(sink.events().contains(&Event::Start(url("/"))));
        assert!(sink.events().contains(&Event::Link(url("/"), url("/b"))));
        assert_eq!(requested(&crawler), vec![url("/"), url("/a?id=1"), url("/b")]);
    }

    #[tokio::test]
    async fn test_same_parameter_same_path_reported_once() {
        let fetcher = SiteFetcher::default()
            .page("/", r#"<a href="/p?id=1">1</a><a href="/p?id=2">2</a>"#)
            .page("/p?id=1", "")
            .page("/p?id=2", "");
        let (crawler, sink) = crawler(fetcher);

        let outcome = crawler.crawl(SITE).await.unwrap();

        assert_eq!(sink.surfaces(), vec![url("/p?id=XSS")]);
        assert_eq!(outcome.attack_surfaces.len(), 1);
        // Both pages are still fetched; only the surface is deduplicated.
        assert_eq!(outcome.pages_fetched, 3);
    }

    #[tokio::test]
    async fn test_depth_limits_traversal() {
        let fetcher = SiteFetcher::default()
            .page("/", r#"<a href="/1">1</a>"#)
            .page("/1", r#"<a href="/2">2</a>"#)
            .page("/2", r#"<a href="/3">3</a>"#)
            .page("/3", "");
        let (crawler, _sink) = crawler(fetcher);
        let crawler = crawler.with_max_depth(1);

        let outcome = crawler.crawl(SITE).await.unwrap();

        assert_eq!(outcome.state, CrawlState::Completed);
        assert_eq!(outcome.pages_fetched, 2);
        assert_eq!(requested(&crawler), vec![url("/"), url("/1")]);
    }

    #[tokio::test]
    async fn test_zero_depth_fetches_only_the_seed() {
        let fetcher = SiteFetcher::default().page("/", r#"<a href="/next?q=1">n</a>"#);
        let (crawler, sink) = crawler(fetcher);
        let crawler = crawler.with_max_depth(0);

        let outcome = crawler.crawl(SITE).await.unwrap();

        assert_eq!(requested(&crawler), vec![url("/")]);
        assert!(outcome.attack_surfaces.is_empty());
        assert!(sink.surfaces().is_empty());
    }

    #[tokio::test]
    async fn test_cycles_terminate() {
        let fetcher = SiteFetcher::default()
            .page("/", r#"<a href="/a">a</a><a href="/">home</a>"#)
            .page("/a", r#"<a href="/b">b</a><a href="/">home</a>"#)
            .page("/b", r#"<a href="/a">a</a><a href="/b">self</a>"#);
        let (crawler, _sink) = crawler(fetcher);
        let crawler = crawler.with_max_depth(50);

        let outcome = crawler.crawl(SITE).await.unwrap();

        assert_eq!(outcome.state, CrawlState::Completed);
        assert_eq!(requested(&crawler), vec![url("/"), url("/a"), url("/b")]);
    }

    #[tokio::test]
    async fn test_single_worker_drains_backlog() {
        let mut links = String::new();
        let mut fetcher = SiteFetcher::default();
        for i in 0..8 {
            links.push_str(&format!(r#"<a href="/p{}">p</a>"#, i));
            fetcher = fetcher.page(&format!("/p{}", i), "");
        }
        let (crawler, _sink) = crawler(fetcher.page("/", &links));
        let crawler = crawler.with_workers(1);

        let outcome = crawler.crawl(SITE).await.unwrap();

        assert_eq!(outcome.state, CrawlState::Completed);
        assert_eq!(outcome.pages_fetched, 9);
    }

    #[tokio::test]
    async fn test_budget_disarms_crawl() {
        let fetcher = SiteFetcher::default()
            .page(
                "/",
                r#"<a href="/a?x=1">a</a><a href="/b?y=1">b</a><a href="/c?z=1">c</a>"#,
            )
            .page("/a?x=1", r#"<a href="/d?w=1">d</a>"#)
            .page("/b?y=1", "")
            .page("/c?z=1", "");
        let (crawler, sink) = crawler(fetcher);

        let outcome = crawler.with_width(2).crawl(SITE).await.unwrap();

        assert_eq!(outcome.state, CrawlState::Disarmed);
        assert_eq!(outcome.attack_surfaces.len(), 2);
        assert_eq!(sink.surfaces().len(), 2);
        // Only the seed and the one job queued before disarming can run.
        assert!(outcome.pages_fetched <= 2);
    }

    #[tokio::test]
    async fn test_transport_errors_reported_timeouts_dropped() {
        let fetcher = SiteFetcher::default()
            .page("/", r#"<a href="/missing">m</a><a href="/slow">s</a>"#)
            .timing_out("/slow");
        let (crawler, sink) = crawler(fetcher);

        let outcome = crawler.crawl(SITE).await.unwrap();

        assert_eq!(outcome.state, CrawlState::Completed);
        assert_eq!(outcome.timeouts, 1);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].url, url("/missing"));
        let failed: Vec<_> = sink
            .events()
            .into_iter()
            .filter(|e| matches!(e, Event::Failed(_)))
            .collect();
        assert_eq!(failed, vec![Event::Failed(url("/missing"))]);
    }

    #[tokio::test]
    async fn test_cancel_stops_crawl_without_new_jobs() {
        let mut links = String::new();
        let mut fetcher = SiteFetcher::default();
        for i in 0..20 {
            links.push_str(&format!(r#"<a href="/p{}">p</a>"#, i));
            fetcher = fetcher.slow_page(&format!("/p{}", i), "", Duration::from_secs(30));
        }
        let (crawler, sink) = crawler(fetcher.page("/", &links));
        let crawler = crawler.with_workers(2);

        let signal = CrawlSignal::new();
        let canceller = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            canceller.cancel();
        });

        let started = std::time::Instant::now();
        let outcome = crawler.crawl_with_signal(SITE, signal).await.unwrap();

        assert_eq!(outcome.state, CrawlState::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(10));
        // Seed plus at most one batch of two workers ever reached the fetcher.
        assert!(requested(&crawler).len() <= 3);
        assert!(sink.events().iter().all(|e| !matches!(e, Event::Failed(_))));
    }

    #[tokio::test]
    async fn test_cancelled_before_start_fetches_nothing() {
        let (crawler, _sink) = crawler(SiteFetcher::default().page("/", ""));
        let signal = CrawlSignal::new();
        signal.cancel();

        let outcome = crawler.crawl_with_signal(SITE, signal).await.unwrap();

        assert_eq!(outcome.state, CrawlState::Cancelled);
        assert!(requested(&crawler).is_empty());
    }

    #[tokio::test]
    async fn test_invalid_seed_is_rejected() {
        let (crawler, _sink) = crawler(SiteFetcher::default());
        assert!(matches!(
            crawler.crawl("not a url").await,
            Err(ScanError::InvalidUrl(_))
        ));
        assert!(matches!(
            crawler.crawl("ftp://files.example.com/").await,
            Err(ScanError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_blacklist_is_rejected() {
        let (crawler, _sink) = crawler(SiteFetcher::default());
        let crawler = crawler.with_blacklist(vec!["[".to_string()]);
        assert!(matches!(
            crawler.crawl(SITE).await,
            Err(ScanError::InvalidPattern(_))
        ));
    }

    #[tokio::test]
    async fn test_blacklisted_links_never_fetched() {
        let fetcher = SiteFetcher::default()
            .page("/", r#"<a href="/logout">bye</a><a href="/keep">k</a>"#)
            .page("/keep", "")
            .page("/logout", "");
        let (crawler, _sink) = crawler(fetcher);
        let crawler = crawler
            .with_local_only(false)
            .with_blacklist(vec!["/logout".to_string()]);

        crawler.crawl(SITE).await.unwrap();

        assert_eq!(requested(&crawler), vec![url("/"), url("/keep")]);
    }

    /// End to end against a real HTTP server, forms included.
    #[tokio::test]
    async fn test_crawl_over_http_with_forms() {
        let mock_server = MockServer::start().await;

        let root_html = r#"<html><body>
            <a href="/products?cat=shoes">Shoes</a>
            <form action="/search"><input name="q"><select name="order"></select></form>
        </body></html>"#;

        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_bytes(root_html.as_bytes()),
            )
            .mount(&mock_server)
            .await;

        for page in ["/products", "/search"] {
            Mock::given(method("GET"))
                .and(path(page))
                .respond_with(
                    ResponseTemplate::new(200)
                        .insert_header("content-type", "text/html")
                        .set_body_bytes(b"<html><body>done</body></html>".as_slice()),
                )
                .mount(&mock_server)
                .await;
        }

        let sink = Arc::new(RecordingSink::default());
        let crawler = Crawler::new()
            .unwrap()
            .with_max_depth(2)
            .with_workers(4)
            .with_sink(sink.clone());

        let outcome = crawler.crawl(&mock_server.uri()).await.unwrap();
        let base = mock_server.uri();

        assert_eq!(outcome.state, CrawlState::Completed);
        assert_eq!(outcome.pages_fetched, 3);

        let mut surfaces = sink.surfaces();
        surfaces.sort();
        assert_eq!(
            surfaces,
            vec![
                format!("{}/products?cat=XSS", base),
                format!("{}/search?q=XSS&order=1", base),
                format!("{}/search?q=foo&order=XSS", base),
            ]
        );
    }

    #[tokio::test]
    async fn test_redirected_page_resolves_links_from_final_url() {
        let mock_server = MockServer::start().await;

        let pages = [
            ("/", r#"<a href="/dir">dir</a>"#),
            ("/dir/", r#"<a href="child?id=1">child</a>"#),
            ("/dir/child", "<p>leaf</p>"),
        ];
        for (page, body) in pages {
            Mock::given(method("GET"))
                .and(path(page))
                .respond_with(
                    ResponseTemplate::new(200)
                        .insert_header("content-type", "text/html")
                        .set_body_string(body),
                )
                .mount(&mock_server)
                .await;
        }
        Mock::given(method("GET"))
            .and(path("/dir"))
            .respond_with(ResponseTemplate::new(301).insert_header("location", "/dir/"))
            .mount(&mock_server)
            .await;

        let sink = Arc::new(RecordingSink::default());
        let crawler = Crawler::new()
            .unwrap()
            .with_max_depth(2)
            .with_sink(sink.clone());

        let outcome = crawler.crawl(&mock_server.uri()).await.unwrap();
        let base = mock_server.uri();

        assert_eq!(outcome.state, CrawlState::Completed);
        let surfaces = sink.surfaces();
        assert!(
            surfaces.contains(&format!("{}/dir/child?id=XSS", base)),
            "got {:?}",
            surfaces
        );
        assert!(!surfaces.contains(&format!("{}/child?id=XSS", base)));
    }

    #[tokio::test]
    async fn test_single_link_cannot_overshoot_budget() {
        let fetcher = SiteFetcher::default()
            .page("/", r#"<a href="/a?x=1&y=1&z=1&w=1">a</a>"#)
            .page("/a?x=1&y=1&z=1&w=1", "");
        let (crawler, sink) = crawler(fetcher);

        let outcome = crawler.with_width(2).crawl(SITE).await.unwrap();

        assert_eq!(outcome.state, CrawlState::Disarmed);
        assert_eq!(
            sink.surfaces(),
            vec![url("/a?x=XSS&y=1&z=1&w=1"), url("/a?x=1&y=XSS&z=1&w=1")]
        );
        assert_eq!(outcome.attack_surfaces.len(), 2);
    }

    #[tokio::test]
    async fn test_links_past_job_budget_are_not_considered() {
        // Both in-budget links point back at the seed.
        let fetcher = SiteFetcher::default()
            .page(
                "/",
                r##"<a href="/">home</a><a href="/#top">top</a><a href="/a?x=1">a</a>"##,
            )
            .page("/a?x=1", "");
        let (crawler, sink) = crawler(fetcher);

        let crawler = crawler.with_width(2);
        let outcome = crawler.crawl(SITE).await.unwrap();

        assert_eq!(outcome.state, CrawlState::Completed);
        assert!(sink.surfaces().is_empty());
        assert_eq!(requested(&crawler), vec![url("/")]);
    }

    #[test]
    fn test_state_follows_signal() {
        let signal = CrawlSignal::new();
        assert_eq!(CrawlState::Idle.observe(&signal), CrawlState::Idle);
        assert_eq!(CrawlState::Running.observe(&signal), CrawlState::Running);

        signal.disarm();
        assert_eq!(CrawlState::Idle.observe(&signal), CrawlState::Idle);
        assert_eq!(CrawlState::Running.observe(&signal), CrawlState::Disarmed);
        assert_eq!(CrawlState::Completed.observe(&signal), CrawlState::Completed);

        signal.cancel();
        assert_eq!(CrawlState::Disarmed.observe(&signal), CrawlState::Cancelled);
        assert!(CrawlState::Cancelled.is_terminal());
        assert!(!CrawlState::Running.is_terminal());
    }
}
