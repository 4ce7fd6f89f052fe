use crate::frontier::CrawlBudget;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::{debug, trace};
use url::{Url, form_urlencoded};

static ANCHOR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").unwrap());
static FORM_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("form").unwrap());
static INPUT_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("input[name]").unwrap());
static SELECT_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("select[name]").unwrap());

/// Value given to inputs that carry no value of their own.
const DEFAULT_INPUT_VALUE: &str = "foo";
/// Value given to every select field.
const DEFAULT_SELECT_VALUE: &str = "1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSource {
    Anchor,
    Form,
    /// Found by the raw `href=` scan.
    Scan,
}

/// An href exactly as found on the page, not yet resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateLink {
    pub href: String,
    pub source: LinkSource,
}

impl CandidateLink {
    fn new(href: impl Into<String>, source: LinkSource) -> Self {
        Self {
            href: href.into(),
            source,
        }
    }
}

#[derive(Debug, Default)]
pub struct Extraction {
    pub links: Vec<CandidateLink>,
    pub forms_found: usize,
    /// Structured parsing was not possible and only the raw scan ran.
    pub degraded: bool,
}

/// Pulls candidate links and synthesized form URLs out of a page.
#[derive(Debug, Clone, Copy)]
pub struct Extractor {
    budget: CrawlBudget,
}

impl Extractor {
    pub fn new(budget: CrawlBudget) -> Self {
        Self { budget }
    }

    pub fn extract(&self, body: &[u8], content_type: Option<&str>, page_url: &str) -> Extraction {
        let mut extraction = match std::str::from_utf8(body) {
            Ok(html) => self.extract_structured(html, page_url),
            Err(e) => {
                debug!(
                    "Structured parse unavailable for {} ({}, charset {:?}), scanning raw body",
                    page_url,
                    e,
                    content_type.and_then(charset)
                );
                let html = String::from_utf8_lossy(body);
                let links = fallback_scan(&html, 0, self.budget)
                    .into_iter()
                    .map(|href| CandidateLink::new(href, LinkSource::Scan))
                    .collect();
                Extraction {
                    links,
                    forms_found: 0,
                    degraded: true,
                }
            }
        };

        extraction.links.truncate(self.budget.limit());
        extraction
    }

    fn extract_structured(&self, html: &str, page_url: &str) -> Extraction {
        let document = Html::parse_document(html);
        let mut links = Vec::new();

        for element in document.select(&ANCHOR_SELECTOR) {
            if let Some(href) = element.value().attr("href") {
                links.push(CandidateLink::new(href, LinkSource::Anchor));
            }
        }

        let mut forms_found = 0;
        for form in document.select(&FORM_SELECTOR) {
            forms_found += 1;
            links.push(CandidateLink::new(
                synthesize_form_url(form, page_url),
                LinkSource::Form,
            ));
        }

        // The scan catches hrefs the tree does not expose as anchors
        // (inline scripts, comments, other tags).
        let known: HashSet<&str> = links.iter().map(|l| l.href.as_str()).collect();
        let supplement: Vec<String> = fallback_scan(html, links.len(), self.budget)
            .into_iter()
            .filter(|href| !known.contains(href.as_str()))
            .collect();
        trace!("Raw scan added {} links on {}", supplement.len(), page_url);
        links.extend(
            supplement
                .into_iter()
                .map(|href| CandidateLink::new(href, LinkSource::Scan)),
        );

        Extraction {
            links,
            forms_found,
            degraded: false,
        }
    }
}

/// Build the GET URL a form would submit with every named field filled in.
fn synthesize_form_url(form: ElementRef<'_>, page_url: &str) -> String {
    let action = match form.value().attr("action") {
        Some(action) => Url::parse(page_url)
            .and_then(|base| base.join(action))
            .map(String::from)
            .unwrap_or_else(|_| action.to_string()),
        None => page_url.to_string(),
    };

    let mut fields: Vec<(String, String)> = Vec::new();
    for input in form.select(&INPUT_SELECTOR) {
        let value = input
            .value()
            .attr("value")
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_INPUT_VALUE);
        set_field(&mut fields, input.value().attr("name"), value);
    }
    for select in form.select(&SELECT_SELECTOR) {
        set_field(&mut fields, select.value().attr("name"), DEFAULT_SELECT_VALUE);
    }

    if fields.is_empty() {
        debug!("Form with no parameters: {}", action);
        return action;
    }

    let mut query = form_urlencoded::Serializer::new(String::new());
    for (name, value) in &fields {
        query.append_pair(name, value);
    }
    format!("{}?{}", action, query.finish())
}

fn set_field(fields: &mut Vec<(String, String)>, name: Option<&str>, value: &str) {
    let Some(name) = name else {
        return;
    };
    match fields.iter_mut().find(|(existing, _)| existing == name) {
        Some(field) => field.1 = value.to_string(),
        None => fields.push((name.to_string(), value.to_string())),
    }
}

/// Tolerant `href=` scan over raw markup.
///
/// A quote right after `href=` delimits the value; otherwise the value runs
/// to the next `>`. Fragments are dropped and duplicates collapsed. Scanning
/// stops once `offset` plus the hrefs found so far reaches the budget.
///
/// This is deliberately imprecise: unquoted values swallow any attributes
/// that follow them, and upper-case `HREF=` is not matched.
pub fn fallback_scan(html: &str, offset: usize, budget: CrawlBudget) -> Vec<String> {
    let mut hrefs = Vec::new();
    let mut seen = HashSet::new();
    let mut pos = 0;

    while pos < html.len() {
        if budget.is_reached(hrefs.len() + offset) {
            break;
        }
        let Some(found) = html[pos..].find("href=") else {
            break;
        };
        let start = pos + found + "href=".len();
        pos += found + 1;

        let (value_start, delimiter) = match html.as_bytes().get(start) {
            Some(b'"') => (start + 1, '"'),
            Some(b'\'') => (start + 1, '\''),
            Some(_) => (start, '>'),
            None => break,
        };
        let rest = &html[value_start..];
        let value = rest.find(delimiter).map_or(rest, |end| &rest[..end]);
        let href = value.split_once('#').map_or(value, |(head, _)| head);

        if !href.is_empty() && seen.insert(href) {
            hrefs.push(href.to_string());
        }
    }

    hrefs
}

/// `charset` parameter of a content type, if any.
pub fn charset(content_type: &str) -> Option<&str> {
    content_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("charset"))
        .map(|(_, value)| value.trim().trim_matches('"'))
}
