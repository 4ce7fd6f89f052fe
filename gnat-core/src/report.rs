// Report rendering for crawl outcomes

use gnat_scanner::{AttackSurface, CrawlOutcome, CrawlState, FetchFailure};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use uuid::Uuid;

const RULE: &str =
    "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
    Markdown,
}

impl ReportFormat {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            "markdown" | "md" => Some(ReportFormat::Markdown),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportData {
    pub session_id: String,
    pub generated_at: String,
    pub outcomes: Vec<CrawlOutcome>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub seeds: usize,
    pub pages_fetched: usize,
    pub urls_crawled: usize,
    pub attack_surfaces: usize,
    pub timeouts: usize,
    pub failures: usize,
}

impl ReportData {
    pub fn new(outcomes: Vec<CrawlOutcome>) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            outcomes,
        }
    }

    pub fn summary(&self) -> ReportSummary {
        self.outcomes
            .iter()
            .fold(ReportSummary::default(), |mut acc, outcome| {
                acc.seeds += 1;
                acc.pages_fetched += outcome.pages_fetched;
                acc.urls_crawled += outcome.urls_crawled;
                acc.attack_surfaces += outcome.attack_surfaces.len();
                acc.timeouts += outcome.timeouts;
                acc.failures += outcome.failures.len();
                acc
            })
    }

    /// Attack surfaces grouped by host, in discovery order within a host.
    pub fn surfaces_by_host(&self) -> BTreeMap<String, Vec<&AttackSurface>> {
        let mut by_host: BTreeMap<String, Vec<&AttackSurface>> = BTreeMap::new();
        for surface in self.outcomes.iter().flat_map(|o| &o.attack_surfaces) {
            by_host.entry(host_of(surface.as_str())).or_default().push(surface);
        }
        by_host
    }

    fn failures(&self) -> impl Iterator<Item = &FetchFailure> {
        self.outcomes.iter().flat_map(|o| &o.failures)
    }
}

fn host_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(String::from))
        .unwrap_or_else(|| "unknown".to_string())
}

fn state_label(state: CrawlState) -> &'static str {
    match state {
        CrawlState::Idle => "Idle",
        CrawlState::Running => "Running",
        CrawlState::Completed => "Completed",
        CrawlState::Disarmed => "Budget reached",
        CrawlState::Cancelled => "Cancelled",
    }
}

pub fn generate_text_report(data: &ReportData) -> String {
    let mut report = String::new();
    let summary = data.summary();

    report.push_str(RULE);
    report.push_str("\n                         GNAT ATTACK SURFACE REPORT\n");
    report.push_str(RULE);
    report.push_str("\n\n");

    report.push_str(&format!("Session ID:       {}\n", data.session_id));
    report.push_str(&format!("Generated:        {}\n", data.generated_at));
    for outcome in &data.outcomes {
        report.push_str(&format!(
            "Target:           {} [{}]\n",
            outcome.seed,
            state_label(outcome.state)
        ));
    }
    report.push('\n');

    report.push_str(RULE);
    report.push_str("\nSUMMARY\n");
    report.push_str(RULE);
    report.push_str("\n\n");
    report.push_str(&format!("  Pages fetched:    {}\n", summary.pages_fetched));
    report.push_str(&format!("  URLs crawled:     {}\n", summary.urls_crawled));
    report.push_str(&format!("  Attack surfaces:  {}\n", summary.attack_surfaces));
    report.push_str(&format!("  Timeouts:         {}\n", summary.timeouts));
    report.push_str(&format!("  Failed fetches:   {}\n\n", summary.failures));

    let by_host = data.surfaces_by_host();
    if !by_host.is_empty() {
        report.push_str(RULE);
        report.push_str("\nATTACK SURFACES\n");
        report.push_str(RULE);
        report.push_str("\n\n");

        for (host, surfaces) in &by_host {
            report.push_str(&format!("## {}\n", host));
            report.push_str(&format!("  {} attack surfaces\n\n", surfaces.len()));
            for surface in surfaces {
                report.push_str(&format!("  {}\n", surface));
            }
            report.push('\n');
        }
    }

    let mut failures = data.failures().peekable();
    if failures.peek().is_some() {
        report.push_str(RULE);
        report.push_str("\nFAILED FETCHES\n");
        report.push_str(RULE);
        report.push_str("\n\n");
        for failure in failures {
            report.push_str(&format!("  {}  ({})\n", failure.url, failure.reason));
        }
        report.push('\n');
    }

    report.push_str(RULE);
    report.push_str("\nGenerated by gnat - For authorized security testing only.\n");

    report
}

pub fn generate_json_report(data: &ReportData) -> Result<String, serde_json::Error> {
    let targets: Vec<&str> = data.outcomes.iter().map(|o| o.seed.as_str()).collect();
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "gnat",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": data.generated_at,
                "format": "json",
                "disclaimer": "For authorized security testing only"
            },
            "session": {
                "id": data.session_id,
                "targets": targets
            },
            "summary": data.summary(),
            "attack_surfaces": data.surfaces_by_host(),
            "crawls": data.outcomes
        }
    });

    serde_json::to_string_pretty(&json_report)
}

pub fn generate_markdown_report(data: &ReportData) -> String {
    let mut report = String::new();
    let summary = data.summary();

    report.push_str("# gnat attack surface report\n\n");
    report.push_str(&format!("- **Session:** `{}`\n", data.session_id));
    report.push_str(&format!("- **Generated:** {}\n\n", data.generated_at));

    report.push_str("## Targets\n\n");
    report.push_str("| Seed | State | Pages | Crawled | Surfaces |\n");
    report.push_str("|------|-------|------:|--------:|---------:|\n");
    for outcome in &data.outcomes {
        report.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            outcome.seed,
            state_label(outcome.state),
            outcome.pages_fetched,
            outcome.urls_crawled,
            outcome.attack_surfaces.len()
        ));
    }
    report.push_str(&format!(
        "\n**Total:** {} attack surfaces, {} timeouts, {} failed fetches\n\n",
        summary.attack_surfaces, summary.timeouts, summary.failures
    ));

    for (host, surfaces) in data.surfaces_by_host() {
        report.push_str(&format!("## {}\n\n", host));
        for surface in surfaces {
            report.push_str(&format!("- `{}`\n", surface));
        }
        report.push('\n');
    }

    let failures: Vec<&FetchFailure> = data.failures().collect();
    if !failures.is_empty() {
        report.push_str("## Failed fetches\n\n");
        for failure in failures {
            report.push_str(&format!("- `{}`: {}\n", failure.url, failure.reason));
        }
        report.push('\n');
    }

    report
}

pub fn generate_report(data: &ReportData, format: ReportFormat) -> Result<String, String> {
    match format {
        ReportFormat::Text => Ok(generate_text_report(data)),
        ReportFormat::Json => {
            generate_json_report(data).map_err(|e| format!("Failed to render JSON: {}", e))
        }
        ReportFormat::Markdown => Ok(generate_markdown_report(data)),
    }
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}
