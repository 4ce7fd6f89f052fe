use std::sync::Arc;

/// Receiver for everything a crawl discovers.
///
/// All calls are made from the coordinating loop of a single crawl, one at a
/// time, so implementations only need interior mutability for their own
/// bookkeeping. Every method has a no-op default.
pub trait CrawlSink: Send + Sync {
    /// A page was fetched and is about to be parsed.
    fn on_crawl_start(&self, _url: &str) {}

    /// `to_url` was admitted from a link on `from_url`.
    fn on_link_found(&self, _from_url: &str, _to_url: &str) {}

    /// A fetch failed for a reason worth reporting.
    fn on_fetch_failed(&self, _url: &str, _reason: &str) {}

    /// A new attack surface (URL with the injection point marked) was found.
    fn on_attack_surface_discovered(&self, _url: &str) {}
}

/// Sink that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl CrawlSink for NoopSink {}

pub type SharedSink = Arc<dyn CrawlSink>;
