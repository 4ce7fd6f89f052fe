pub mod crawler;
pub mod error;
pub mod executor;
pub mod extract;
pub mod fetch;
pub mod frontier;
pub mod registry;
pub mod signal;
pub mod sink;

pub use crawler::{CrawlOutcome, CrawlState, Crawler, FetchFailure};
pub use error::{FetchError, ScanError};
pub use fetch::{FetchedPage, PageFetcher, ReqwestFetcher};
pub use registry::{AttackSurface, SENTINEL};
pub use signal::CrawlSignal;
pub use sink::{CrawlSink, NoopSink, SharedSink};
