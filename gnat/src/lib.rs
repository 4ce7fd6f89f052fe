pub mod handlers;

pub use handlers::{CrawlOverrides, load_urls_from_file, load_urls_from_source, parse_url_line};

pub use gnat_core::crawl::{CrawlOptions, CrawlProgressCallback, execute_crawl, extract_url_path};
