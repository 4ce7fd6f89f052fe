use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::debug;
use url::{Position, Url, form_urlencoded};

/// Placeholder written into the injection point of every attack surface.
pub const SENTINEL: &str = "XSS";

/// A parameter name scoped to the host it was seen on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArgumentKey {
    pub name: String,
    pub host: String,
}

impl ArgumentKey {
    pub fn new(name: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
        }
    }
}

/// First sighting of a parameter on a given path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentEntry {
    /// `scheme://authority/path`, without the query.
    pub path: String,
    /// The URL the parameter was found in.
    pub url: String,
}

/// A URL with exactly one injection point marked by [`SENTINEL`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct AttackSurface(String);

impl AttackSurface {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for AttackSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Remembers which parameters have been seen on which paths and hands out
/// each attack surface exactly once per crawl.
#[derive(Debug)]
pub struct ArgumentRegistry {
    records: HashMap<ArgumentKey, Vec<ArgumentEntry>>,
    discovered: HashSet<AttackSurface>,
    order: Vec<AttackSurface>,
    entries: usize,
    limit: usize,
}

impl Default for ArgumentRegistry {
    fn default() -> Self {
        Self::with_limit(usize::MAX)
    }
}

impl ArgumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry that stops recording once `limit` surfaces or entries exist.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            records: HashMap::new(),
            discovered: HashSet::new(),
            order: Vec::new(),
            entries: 0,
            limit,
        }
    }

    pub fn is_full(&self) -> bool {
        self.order.len() >= self.limit || self.entries >= self.limit
    }

    /// Record the parameters of `url` and return the attack surfaces that are
    /// new to this crawl.
    ///
    /// A parameter yields a surface the first time it shows up on a path for
    /// its host. A URL without parameters yields the path with a sentinel
    /// segment appended. Nothing is recorded once the registry is full.
    pub fn find_args(&mut self, url: &str) -> Vec<AttackSurface> {
        let Ok(parsed) = Url::parse(url) else {
            return Vec::new();
        };
        let path = parsed[..Position::AfterPath].to_string();
        let host = authority(&parsed);
        let params = query_params(&parsed);

        let mut emitted = Vec::new();

        for (name, _) in &params {
            if self.is_full() {
                debug!("Registry full, ignoring the rest of {}", url);
                break;
            }
            let record = self
                .records
                .entry(ArgumentKey::new(name.as_str(), host.as_str()))
                .or_default();
            if record.iter().any(|entry| entry.path == path) {
                continue;
            }
            record.push(ArgumentEntry {
                path: path.clone(),
                url: url.to_string(),
            });
            self.entries += 1;
            debug!("New parameter '{}' on {}", name, path);

            if let Some(surface) = self.emit(parameter_surface(&path, &params, name)) {
                emitted.push(surface);
            }
        }

        if params.is_empty() && !self.is_full() {
            let surface = if path.ends_with('/') {
                format!("{}{}", path, SENTINEL)
            } else {
                format!("{}/{}", path, SENTINEL)
            };
            if let Some(surface) = self.emit(surface) {
                emitted.push(surface);
            }
        }

        emitted
    }

    fn emit(&mut self, url: String) -> Option<AttackSurface> {
        let surface = AttackSurface(url);
        if self.discovered.insert(surface.clone()) {
            self.order.push(surface.clone());
            Some(surface)
        } else {
            None
        }
    }

    /// Attack surfaces in the order they were discovered.
    pub fn discovered(&self) -> &[AttackSurface] {
        &self.order
    }

    pub fn discovered_count(&self) -> usize {
        self.order.len()
    }

    /// Total number of (path, url) entries across all keys.
    pub fn entry_count(&self) -> usize {
        self.entries
    }

    pub fn record(&self, key: &ArgumentKey) -> Option<&[ArgumentEntry]> {
        self.records.get(key).map(Vec::as_slice)
    }
}

/// `host[:port]` of a URL, the scope used for argument keys and local-only checks.
pub(crate) fn authority(url: &Url) -> String {
    url[Position::BeforeHost..Position::AfterPort].to_string()
}

/// Named, non-blank query parameters in first-appearance order, first value
/// wins. Directory-listing sort queries (`C=..;O=..`) count as no parameters.
fn query_params(url: &Url) -> Vec<(String, String)> {
    let Some(query) = url.query() else {
        return Vec::new();
    };
    if query.contains("C=") && query.contains("O=") {
        return Vec::new();
    }

    let mut params: Vec<(String, String)> = Vec::new();
    for (name, value) in url.query_pairs() {
        if value.is_empty() || params.iter().any(|(seen, _)| *seen == name) {
            continue;
        }
        params.push((name.into_owned(), value.into_owned()));
    }
    params
}

fn parameter_surface(path: &str, params: &[(String, String)], target: &str) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    for (name, value) in params {
        let value = if name == target { SENTINEL } else { value.as_str() };
        query.append_pair(name, value);
    }
    format!("{}?{}", path, query.finish())
}
