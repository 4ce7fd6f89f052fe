use crate::config::CrawlConfig;
use gnat_scanner::{CrawlOutcome, CrawlSignal, CrawlSink, Crawler, ReqwestFetcher};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use url::Url;

/// Options for configuring a crawl operation
pub struct CrawlOptions {
    pub urls: Vec<String>,
    pub config: CrawlConfig,
    pub show_progress_bars: bool,
}

/// Callback for reporting crawl progress
pub type CrawlProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Callback for each attack surface as soon as it is discovered
pub type SurfaceCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Extract the path component from a URL
pub fn extract_url_path(url: &str) -> String {
    Url::parse(url)
        .ok()
        .map(|u| {
            let path = u.path().to_string();
            if path.is_empty() || path == "/" {
                "/".to_string()
            } else {
                path
            }
        })
        .unwrap_or_else(|| url.to_string())
}

/// Sink that counts events, drives an optional spinner and forwards attack
/// surfaces to a callback.
pub struct ProgressSink {
    progress_bar: Option<ProgressBar>,
    surface_callback: Option<SurfaceCallback>,
    pages: AtomicUsize,
    links: AtomicUsize,
    surfaces: AtomicUsize,
    failures: AtomicUsize,
}

impl ProgressSink {
    pub fn new(
        progress_bar: Option<ProgressBar>,
        surface_callback: Option<SurfaceCallback>,
    ) -> Self {
        Self {
            progress_bar,
            surface_callback,
            pages: AtomicUsize::new(0),
            links: AtomicUsize::new(0),
            surfaces: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
        }
    }

    pub fn pages(&self) -> usize {
        self.pages.load(Ordering::Relaxed)
    }

    pub fn links(&self) -> usize {
        self.links.load(Ordering::Relaxed)
    }

    pub fn surfaces(&self) -> usize {
        self.surfaces.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }

    fn refresh(&self, current: &str) {
        if let Some(ref pb) = self.progress_bar {
            pb.set_message(format!(
                "Crawling... {} pages, {} attack surfaces  {}",
                self.pages(),
                self.surfaces(),
                current
            ));
            pb.tick();
        }
    }
}

impl CrawlSink for ProgressSink {
    fn on_crawl_start(&self, url: &str) {
        self.pages.fetch_add(1, Ordering::Relaxed);
        self.refresh(&extract_url_path(url));
    }

    fn on_link_found(&self, _from_url: &str, _to_url: &str) {
        self.links.fetch_add(1, Ordering::Relaxed);
    }

    fn on_fetch_failed(&self, url: &str, reason: &str) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        if let Some(ref pb) = self.progress_bar {
            pb.println(format!("[!] {} ({})", url, reason));
        }
    }

    fn on_attack_surface_discovered(&self, url: &str) {
        self.surfaces.fetch_add(1, Ordering::Relaxed);
        if let Some(ref callback) = self.surface_callback {
            match self.progress_bar {
                Some(ref pb) => pb.suspend(|| callback(url)),
                None => callback(url),
            }
        }
        self.refresh(&extract_url_path(url));
    }
}

fn spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_message("Starting crawl...");
    pb
}

fn build_crawler(config: &CrawlConfig) -> Result<Crawler<ReqwestFetcher>, String> {
    config.validate().map_err(|e| e.to_string())?;

    let timeout = Duration::from_secs(config.timeout_secs);
    let fetcher = ReqwestFetcher::new(&config.user_agent, timeout)
        .map_err(|e| format!("Failed to build HTTP client: {}", e))?;

    Ok(Crawler::with_fetcher(fetcher)
        .with_max_depth(config.max_depth)
        .with_width(config.width)
        .with_local_only(config.local_only)
        .with_workers(config.workers)
        .with_request_timeout(timeout)
        .with_blacklist(config.blacklist.clone()))
}

/// Execute a crawl with the given options.
///
/// Each seed gets its own crawl session. Cancelling `cancel` stops the seed
/// being crawled and skips the rest; outcomes gathered so far are returned.
pub async fn execute_crawl(
    options: CrawlOptions,
    cancel: CancellationToken,
    progress_callback: Option<CrawlProgressCallback>,
    surface_callback: Option<SurfaceCallback>,
) -> Result<Vec<CrawlOutcome>, String> {
    let CrawlOptions {
        urls,
        config,
        show_progress_bars,
    } = options;

    if urls.is_empty() {
        return Err("No URLs to crawl".to_string());
    }

    let progress_bar = show_progress_bars.then(spinner);
    let sink = Arc::new(ProgressSink::new(progress_bar.clone(), surface_callback));
    let crawler = build_crawler(&config)?.with_sink(sink.clone());

    let mut outcomes = Vec::new();
    for (idx, url_str) in urls.iter().enumerate() {
        if cancel.is_cancelled() {
            break;
        }

        if let Some(ref callback) = progress_callback
            && urls.len() > 1
        {
            callback(format!(
                "Crawling host {}/{}: {}",
                idx + 1,
                urls.len(),
                url_str
            ));
        }

        let signal = CrawlSignal::with_cancellation(cancel.child_token());
        match crawler.crawl_with_signal(url_str, signal).await {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                warn!("Failed to crawl {}: {}", url_str, e);
                if let Some(ref callback) = progress_callback {
                    callback(format!("[!]  Failed to crawl {}: {}", url_str, e));
                }
            }
        }
    }

    if let Some(ref pb) = progress_bar {
        pb.finish_with_message(format!(
            "Crawl complete! {} pages, {} attack surfaces",
            sink.pages(),
            sink.surfaces()
        ));
    }

    Ok(outcomes)
}
