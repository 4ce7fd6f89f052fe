pub mod config;
pub mod crawl;
pub mod report;

pub use config::{ConfigError, CrawlConfig};
pub use crawl::{CrawlOptions, ProgressSink, execute_crawl};
pub use report::{ReportData, ReportFormat};
