use anyhow::{Context, Result, anyhow, bail};
use clap::ArgMatches;
use colored::Colorize;
use gnat_core::config::{CrawlConfig, default_config_path, expand_path, load_blacklist_file};
use gnat_core::crawl::{CrawlOptions, CrawlProgressCallback, SurfaceCallback, execute_crawl};
use gnat_core::report::{ReportData, ReportFormat, generate_report, save_report};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use url::Url;

// Helper functions for crawl handler

/// Load URLs from either a file or a single URL argument
pub fn load_urls_from_source(
    url: Option<&Url>,
    hosts_file: Option<&PathBuf>,
) -> Result<Vec<String>, String> {
    if let Some(hosts_file_path) = hosts_file {
        load_urls_from_file(hosts_file_path)
    } else if let Some(url) = url {
        Ok(vec![url.as_str().to_string()])
    } else {
        Err("Either --url or --hosts-file must be provided".to_string())
    }
}

/// Load and parse URLs from a file. Blank lines and `#` comments are skipped.
pub fn load_urls_from_file(path: &Path) -> Result<Vec<String>, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read hosts file {}: {}", path.display(), e))?;

    let urls: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(parse_url_line)
        .collect();

    if urls.is_empty() {
        return Err(format!("No valid URLs found in {}", path.display()));
    }

    Ok(urls)
}

/// Parse a single line as an http(s) URL, adding `http://` if the scheme is missing
pub fn parse_url_line(line: &str) -> Option<String> {
    if let Ok(url) = Url::parse(line)
        && matches!(url.scheme(), "http" | "https")
    {
        return Some(line.to_string());
    }

    let with_scheme = format!("http://{}", line);
    if Url::parse(&with_scheme).is_ok_and(|url| url.host_str().is_some()) {
        return Some(with_scheme);
    }

    warn!("Skipping invalid URL '{}'", line);
    None
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlOverrides {
    pub depth: Option<usize>,
    pub width: Option<usize>,
    pub threads: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub external: bool,
    pub blacklist: Vec<String>,
}

impl CrawlOverrides {
    pub fn from_matches(args: &ArgMatches) -> Result<Self> {
        let mut blacklist: Vec<String> = args
            .get_many::<String>("blacklist")
            .map(|patterns| patterns.cloned().collect())
            .unwrap_or_default();

        if let Some(path) = args.get_one::<PathBuf>("blacklist-file") {
            blacklist.extend(
                load_blacklist_file(path)
                    .with_context(|| format!("Failed to load blacklist file {}", path.display()))?,
            );
        }

        Ok(Self {
            depth: args.get_one::<usize>("depth").copied(),
            width: args.get_one::<usize>("width").copied(),
            threads: args.get_one::<usize>("threads").copied(),
            timeout_secs: args.get_one::<u64>("timeout").copied(),
            external: args.get_flag("external"),
            blacklist,
        })
    }

    /// Layer these values on top of `config`. Blacklist patterns are added to
    /// the configured ones.
    pub fn apply(self, mut config: CrawlConfig) -> CrawlConfig {
        if let Some(depth) = self.depth {
            config.max_depth = depth;
        }
        if let Some(width) = self.width {
            config.width = width;
        }
        if let Some(threads) = self.threads {
            config.workers = threads;
        }
        if let Some(timeout_secs) = self.timeout_secs {
            config.timeout_secs = timeout_secs;
        }
        if self.external {
            config.local_only = false;
        }
        config.blacklist.extend(self.blacklist);
        config
    }
}

pub fn print_banner() {
    println!(
        "{} {}",
        "gnat".bright_green().bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).bright_black()
    );
    println!(
        "{}",
        "XSS attack surface mapper - for authorized security testing only".bright_black()
    );
    println!();
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

pub fn handle_init(args: &ArgMatches, quiet: bool) -> Result<()> {
    let raw_path = args
        .get_one::<String>("PATH")
        .ok_or_else(|| anyhow!("missing config path"))?;
    let force = args.get_flag("force");
    let path = expand_path(raw_path);

    if path.exists() && !force {
        println!("{}", "⚠ WARNING".yellow().bold());
        println!(
            "Config file already exists: {}",
            path.display().to_string().bright_white()
        );
        println!("Re-run with {} to overwrite it.", "--force".bright_cyan());
        return Ok(());
    }

    CrawlConfig::default()
        .save(&path, force)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;

    if !quiet {
        print_divider();
        println!("{}", "  INITIALIZATION COMPLETE".green().bold());
        print_divider();
        println!();
    }
    println!(
        "{} Config file: {}",
        "✓".green().bold(),
        path.display().to_string().bright_white()
    );
    Ok(())
}

fn load_config(args: &ArgMatches) -> Result<CrawlConfig> {
    match args.get_one::<PathBuf>("config") {
        Some(path) => CrawlConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => {
            let path = default_config_path();
            CrawlConfig::load_or_default(&path)
                .with_context(|| format!("Failed to load config {}", path.display()))
        }
    }
}

fn print_crawl_settings(urls: &[String], config: &CrawlConfig) {
    println!("{} Crawling {} host(s)", "→".blue(), urls.len());
    println!("  Workers:    {}", config.workers);
    println!("  Max depth:  {}", config.max_depth);
    if config.width == 0 {
        println!("  Budget:     unbounded");
    } else {
        println!("  Budget:     {}", config.width);
    }
    println!(
        "  Scope:      {}",
        if config.local_only {
            "seed host only"
        } else {
            "external hosts allowed"
        }
    );
    if !config.blacklist.is_empty() {
        println!("  Blacklist:  {} pattern(s)", config.blacklist.len());
    }
    println!();
}

/// Cancel `cancel` when the user hits Ctrl-C.
fn cancel_on_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n{} Interrupted, finishing up...", "!".yellow().bold());
            cancel.cancel();
        }
    });
}

pub async fn handle_crawl(args: &ArgMatches, quiet: bool) -> Result<()> {
    let url = args.get_one::<Url>("url");
    let hosts_file = args.get_one::<PathBuf>("hosts-file");
    let output = args.get_one::<PathBuf>("output");
    let format = args
        .get_one::<String>("format")
        .and_then(|f| ReportFormat::from_str(f))
        .unwrap_or(ReportFormat::Text);

    let urls = load_urls_from_source(url, hosts_file).map_err(|e| anyhow!(e))?;
    let config = CrawlOverrides::from_matches(args)?.apply(load_config(args)?);
    config.validate()?;

    if !quiet {
        print_crawl_settings(&urls, &config);
    }

    // Stream finds as they happen unless stdout is reserved for a JSON or
    // markdown report.
    let stream = !quiet && (output.is_some() || format == ReportFormat::Text);
    let surface_callback: Option<SurfaceCallback> = stream.then(|| {
        Arc::new(|url: &str| println!("{} {}", "[+]".green().bold(), url)) as SurfaceCallback
    });
    let progress_callback: Option<CrawlProgressCallback> = (!quiet).then(|| {
        Arc::new(|msg: String| eprintln!("{}", msg)) as CrawlProgressCallback
    });

    let options = CrawlOptions {
        urls,
        config,
        show_progress_bars: !quiet && !args.get_flag("no-progress"),
    };

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let outcomes = execute_crawl(options, cancel, progress_callback, surface_callback)
        .await
        .map_err(|e| anyhow!("Crawl failed: {}", e))?;

    let data = ReportData::new(outcomes);
    let report = generate_report(&data, format).map_err(|e| anyhow!(e))?;

    match output {
        Some(path) => {
            save_report(&report, path)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            if !quiet {
                println!(
                    "\n{} Report saved to {}",
                    "✓".green().bold(),
                    path.display().to_string().bright_white()
                );
            }
        }
        None => {
            if !quiet && format == ReportFormat::Text {
                println!();
            }
            print!("{}", report);
        }
    }

    if data.outcomes.is_empty() {
        bail!("No host could be crawled");
    }
    Ok(())
}
