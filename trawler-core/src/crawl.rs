use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;
use trawler_scanner::{CrawlConfig, CrawlReport, Crawler, ScanError, validate_seeds};
use url::Url;

/// Options for configuring a crawl operation
pub struct CrawlOptions {
    pub urls: Vec<String>,
    pub config: CrawlConfig,
    pub show_progress_bars: bool,
}

impl CrawlOptions {
    pub fn new(urls: Vec<String>) -> Self {
        Self {
            urls,
            config: CrawlConfig::default(),
            show_progress_bars: false,
        }
    }
}

/// Callback for reporting crawl progress
pub type CrawlProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Extract the path component from a URL
pub fn extract_url_path(url: &str) -> String {
    Url::parse(url)
        .ok()
        .map(|u| {
            let path = u.path().to_string();
            if path.is_empty() || path == "/" {
                "/".to_string()
            } else {
                path
            }
        })
        .unwrap_or_else(|| url.to_string())
}

/// Extract the host component from a URL, or `"unknown"`
pub fn extract_url_host(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Validate the seeds and run one crawl over all of them.
///
/// Malformed seeds abort before any request is made.
pub async fn execute_crawl(
    options: CrawlOptions,
    progress_callback: Option<CrawlProgressCallback>,
) -> Result<CrawlReport, ScanError> {
    let CrawlOptions {
        urls,
        config,
        show_progress_bars,
    } = options;

    let seeds = validate_seeds(&urls)?;
    debug!("Validated {} seed(s): {:?}", seeds.len(), seeds);
    if let Some(ref callback) = progress_callback {
        callback(format!(
            "Crawling {} seed(s) with {} workers, max depth {}",
            seeds.len(),
            config.workers,
            config.max_depth
        ));
    }

    // Set up single progress bar for overall crawl progress (only if enabled)
    let progress_bar = if show_progress_bars {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message("Starting crawl...");
        Some(Arc::new(pb))
    } else {
        None
    };

    let processed_count = Arc::new(AtomicUsize::new(0));

    let mut crawler = Crawler::with_config(config);
    if let Some(ref pb) = progress_bar {
        let pb_clone = pb.clone();
        let count_clone = processed_count.clone();
        crawler = crawler.with_progress_callback(Arc::new(move |_worker_id: usize, url: String| {
            let count = count_clone.fetch_add(1, Ordering::Relaxed) + 1;
            pb_clone.set_message(format!(
                "Crawling... {} pages fetched ({})",
                count,
                extract_url_path(&url)
            ));
        }));
    }

    let result = crawler.crawl(&seeds).await;

    if let Some(ref pb) = progress_bar {
        let total = processed_count.load(Ordering::Relaxed);
        pb.finish_with_message(format!("Crawl complete! {} pages fetched", total));
    }

    let report = result?;
    if let Some(ref callback) = progress_callback {
        if report.cancelled {
            callback("[!] Image budget exceeded, crawl stopped early".to_string());
        }
        if let Some(ref message) = report.error_message {
            callback(format!("[!] {}", message));
        }
    }

    Ok(report)
}
