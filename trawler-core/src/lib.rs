pub mod crawl;
pub mod report;

pub use trawler_scanner::{CrawlConfig, CrawlReport, ScanError};
