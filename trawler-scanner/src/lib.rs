pub mod cancel;
pub mod config;
pub mod crawler;
pub mod error;
pub mod fetch;
pub mod link;
pub mod result;
pub mod seen;

pub use cancel::{CancellationSignal, ImageBudget};
pub use config::CrawlConfig;
pub use crawler::{Crawler, ProgressCallback, validate_seeds};
pub use error::ScanError;
pub use fetch::{Page, PageFetcher, extract_page};
pub use link::Link;
pub use result::{CrawlAccumulator, CrawlReport, aggregate};
pub use seen::SeenSet;
