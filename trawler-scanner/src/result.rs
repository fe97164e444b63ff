use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Everything the scheduler collects while a crawl runs.
#[derive(Debug, Clone, Default)]
pub struct CrawlAccumulator {
    pub seeds: Vec<String>,
    pub links: Vec<String>,
    pub images: Vec<String>,
    pub pages_crawled: usize,
    pub pages_failed: usize,
    /// Failures of seed pages; these are reported to the caller.
    pub seed_errors: Vec<String>,
    pub cancelled: bool,
}

/// Final outcome of one crawl invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlReport {
    pub seeds: Vec<String>,
    pub links: Vec<String>,
    pub images: Vec<String>,
    pub link_count: usize,
    pub image_count: usize,
    pub pages_crawled: usize,
    pub pages_failed: usize,
    pub elapsed_seconds: f64,
    pub cancelled: bool,
    pub error_message: Option<String>,
}

impl CrawlReport {
    pub fn is_ok(&self) -> bool {
        self.error_message.is_none()
    }
}

/// Package accumulated crawl state into a report.
pub fn aggregate(acc: CrawlAccumulator, elapsed: Duration) -> CrawlReport {
    let error_message = if acc.seed_errors.is_empty() {
        None
    } else {
        Some(acc.seed_errors.join("; "))
    };

    CrawlReport {
        link_count: acc.links.len(),
        image_count: acc.images.len(),
        seeds: acc.seeds,
        links: acc.links,
        images: acc.images,
        pages_crawled: acc.pages_crawled,
        pages_failed: acc.pages_failed,
        elapsed_seconds: elapsed.as_secs_f64(),
        cancelled: acc.cancelled,
        error_message,
    }
}
