use crate::error::Result;
use crate::registry::{ArgumentRegistry, AttackSurface, authority};
use crate::signal::CrawlSignal;
use regex::Regex;
use std::collections::{HashSet, VecDeque};
use tracing::{debug, info};
use url::Url;

/// Global cap on discoveries for one crawl. A width of zero means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlBudget(usize);

impl CrawlBudget {
    pub fn from_width(width: usize) -> Self {
        if width == 0 {
            Self(usize::MAX)
        } else {
            Self(width)
        }
    }

    pub fn limit(&self) -> usize {
        self.0
    }

    pub fn is_unbounded(&self) -> bool {
        self.0 == usize::MAX
    }

    pub fn is_reached(&self, count: usize) -> bool {
        count >= self.0
    }
}

/// A page waiting to be fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlJob {
    /// Authority (`host[:port]`) of the seed this job descends from.
    pub origin_host: String,
    pub target_url: String,
    /// Levels of links still to follow below this page.
    pub remaining_depth: usize,
    /// Caps how many candidate links are taken from this page.
    pub width_budget: CrawlBudget,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionDecision {
    Skip,
    /// Marked as crawled and mined for parameters, but not queued: the
    /// backlog is full or the crawl disarmed while admitting it.
    Registered {
        url: String,
        surfaces: Vec<AttackSurface>,
    },
    Enqueue {
        job: CrawlJob,
        surfaces: Vec<AttackSurface>,
    },
}

impl AdmissionDecision {
    /// The URL this decision admitted, if any.
    pub fn url(&self) -> Option<&str> {
        match self {
            AdmissionDecision::Skip => None,
            AdmissionDecision::Registered { url, .. } => Some(url),
            AdmissionDecision::Enqueue { job, .. } => Some(&job.target_url),
        }
    }

    pub fn surfaces(&self) -> &[AttackSurface] {
        match self {
            AdmissionDecision::Skip => &[],
            AdmissionDecision::Registered { surfaces, .. }
            | AdmissionDecision::Enqueue { surfaces, .. } => surfaces,
        }
    }
}

pub fn compile_blacklist(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|pattern| Regex::new(pattern).map_err(Into::into))
        .collect()
}

/// Crawled set, pending backlog and the admission rules between them.
#[derive(Debug)]
pub struct Frontier {
    crawled: HashSet<String>,
    backlog: VecDeque<CrawlJob>,
    blacklist: Vec<Regex>,
    local_only: bool,
    budget: CrawlBudget,
    signal: CrawlSignal,
}

impl Frontier {
    pub fn new(
        blacklist: Vec<Regex>,
        local_only: bool,
        budget: CrawlBudget,
        signal: CrawlSignal,
    ) -> Self {
        Self {
            crawled: HashSet::new(),
            backlog: VecDeque::new(),
            blacklist,
            local_only,
            budget,
            signal,
        }
    }

    /// Insert a URL straight into the crawled set (used for the seed).
    /// Returns false if it was already there.
    pub fn mark_crawled(&mut self, url: &str) -> bool {
        self.crawled.insert(url.to_string())
    }

    pub fn is_crawled(&self, url: &str) -> bool {
        self.crawled.contains(url)
    }

    pub fn crawled_count(&self) -> usize {
        self.crawled.len()
    }

    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    /// Newest job first.
    pub fn next_job(&mut self) -> Option<CrawlJob> {
        self.backlog.pop_back()
    }

    /// Decide what to do with a link found on `page_url`.
    ///
    /// One candidate can yield several decisions: a URL that embeds a second
    /// `http://` is probed as a whole and also split at that point.
    pub fn admit(
        &mut self,
        candidate: &str,
        page_url: &str,
        origin_host: &str,
        remaining_depth: usize,
        registry: &mut ArgumentRegistry,
    ) -> Vec<AdmissionDecision> {
        expand_candidate(candidate, page_url)
            .into_iter()
            .map(|url| self.check(url, origin_host, remaining_depth, registry))
            .collect()
    }

    fn check(
        &mut self,
        url: String,
        origin_host: &str,
        remaining_depth: usize,
        registry: &mut ArgumentRegistry,
    ) -> AdmissionDecision {
        if !self.signal.is_armed() || self.crawled.contains(&url) || remaining_depth == 0 {
            return AdmissionDecision::Skip;
        }
        if self.is_blacklisted(&url) {
            debug!("Blacklisted: {}", url);
            return AdmissionDecision::Skip;
        }
        if self.local_only && !same_origin(&url, origin_host) {
            debug!("Out of scope: {}", url);
            return AdmissionDecision::Skip;
        }

        self.crawled.insert(url.clone());
        let surfaces = registry.find_args(&url);

        if self.budget.is_reached(registry.discovered_count())
            || self.budget.is_reached(registry.entry_count())
        {
            info!(
                "Discovery budget of {} reached, disarming crawl",
                self.budget.limit()
            );
            self.signal.disarm();
        }

        if self.signal.is_armed() && self.backlog.len() < self.budget.limit() {
            let job = CrawlJob {
                origin_host: origin_host.to_string(),
                target_url: url,
                remaining_depth: remaining_depth - 1,
                width_budget: self.budget,
            };
            debug!("Queued {} (depth {})", job.target_url, job.remaining_depth);
            self.backlog.push_back(job.clone());
            AdmissionDecision::Enqueue { job, surfaces }
        } else {
            AdmissionDecision::Registered { url, surfaces }
        }
    }

    fn is_blacklisted(&self, url: &str) -> bool {
        self.blacklist.iter().any(|pattern| pattern.is_match(url))
    }
}

fn same_origin(url: &str, origin_host: &str) -> bool {
    Url::parse(url).is_ok_and(|parsed| authority(&parsed) == origin_host)
}

/// Turn a raw href into the absolute URLs worth checking.
///
/// Drops `javascript:`/`mailto:` links, anything that does not resolve to
/// http(s), and hosts without a dot. Fragments are removed. When the result
/// contains `http://` past its start (a redirect wrapper such as
/// `/go?u=http://elsewhere/`), the part from there on and the part before it
/// are expanded as well, ahead of the full URL.
pub fn expand_candidate(candidate: &str, page_url: &str) -> Vec<String> {
    let lowered = candidate.trim_start().to_ascii_lowercase();
    if lowered.starts_with("javascript:") || lowered.starts_with("mailto:") {
        return Vec::new();
    }

    let Ok(base) = Url::parse(page_url) else {
        return Vec::new();
    };
    let Ok(mut resolved) = base.join(candidate) else {
        return Vec::new();
    };
    if !resolved.scheme().starts_with("http")
        || !resolved.host_str().is_some_and(|host| host.contains('.'))
    {
        return Vec::new();
    }
    resolved.set_fragment(None);
    let href = String::from(resolved);

    let mut expanded = Vec::new();
    if let Some(pos) = href.rfind("http://")
        && pos != 0
    {
        expanded.extend(expand_candidate(&href[pos..], page_url));
        expanded.extend(expand_candidate(&href[..pos], page_url));
    }
    expanded.push(href);
    expanded
}
