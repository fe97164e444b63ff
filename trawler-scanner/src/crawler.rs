use crate::cancel::{CancellationSignal, ImageBudget};
use crate::config::CrawlConfig;
use crate::error::{Result, ScanError};
use crate::fetch::PageFetcher;
use crate::link::Link;
use crate::result::{CrawlAccumulator, CrawlReport, aggregate};
use crate::seen::SeenSet;
use futures::FutureExt;
use futures::future::join_all;
use std::collections::{HashSet, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

pub type ProgressCallback = Arc<dyn Fn(usize, String) + Send + Sync>;

/// What a worker reports back for one dispatched link.
#[derive(Debug)]
struct PageOutcome {
    link: Link,
    links: Vec<Link>,
    images: Vec<String>,
    error: Option<ScanError>,
    /// The crawl was cancelled before this link was fetched.
    skipped: bool,
}

impl PageOutcome {
    fn skipped(link: Link) -> Self {
        Self {
            link,
            links: Vec::new(),
            images: Vec::new(),
            error: None,
            skipped: true,
        }
    }

    fn failed(link: Link, error: ScanError) -> Self {
        Self {
            link,
            links: Vec::new(),
            images: Vec::new(),
            error: Some(error),
            skipped: false,
        }
    }
}

pub struct Crawler {
    config: CrawlConfig,
    progress_callback: Option<ProgressCallback>,
}

impl Crawler {
    pub fn new() -> Self {
        Self::with_config(CrawlConfig::default())
    }

    pub fn with_config(config: CrawlConfig) -> Self {
        Self {
            config,
            progress_callback: None,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.config.max_depth = depth;
        self
    }

    pub fn with_image_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.image_prefix = prefix.into();
        self
    }

    pub fn with_image_threshold(mut self, threshold: Option<usize>) -> Self {
        self.config.image_threshold = threshold;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn with_dedup_images(mut self, dedup: bool) -> Self {
        self.config.dedup_images = dedup;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    /// Crawl breadth-first from `seeds` and return the collected report.
    ///
    /// Every call owns its own dedup set, accumulators and cancellation signal,
    /// so one `Crawler` may run several crawls concurrently. Only invalid seeds
    /// (or an unusable configuration) produce an `Err`; page failures are
    /// recorded in the report.
    pub async fn crawl(&self, seeds: &[String]) -> Result<CrawlReport> {
        let start = Instant::now();

        let workers = self.config.workers;
        if workers == 0 {
            return Err(ScanError::Validation(
                "worker pool size must be at least 1".to_string(),
            ));
        }
        let seeds = validate_seeds(seeds)?;

        info!(
            "Starting crawl of {} seed(s) with {} workers, max depth {}",
            seeds.len(),
            workers,
            self.config.max_depth
        );

        let fetcher = PageFetcher::new(&self.config)?;
        let signal = CancellationSignal::new();
        let budget = ImageBudget::new(self.config.image_threshold, signal.clone());

        let (to_crawl_tx, to_crawl_rx) = mpsc::channel::<Link>(workers);
        let to_crawl_rx = Arc::new(Mutex::new(to_crawl_rx));
        let (worklist_tx, worklist_rx) = mpsc::channel::<PageOutcome>(workers);

        let mut worker_handles: Vec<JoinHandle<()>> = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let worker = Worker {
                id: worker_id,
                fetcher: fetcher.clone(),
                to_crawl: to_crawl_rx.clone(),
                worklist: worklist_tx.clone(),
                budget: budget.clone(),
                signal: signal.clone(),
                progress_callback: self.progress_callback.clone(),
            };
            worker_handles.push(tokio::spawn(worker.run()));
        }
        // Only workers publish outcomes from here on.
        drop(worklist_tx);

        let mut scheduler = Scheduler::new(&self.config, signal.clone());
        scheduler.enqueue_seeds(seeds);
        let result = scheduler.run(to_crawl_tx, worklist_rx).await;

        for joined in join_all(worker_handles).await {
            joined?;
        }

        let mut acc = result?;
        acc.cancelled = signal.is_cancelled();

        let report = aggregate(acc, start.elapsed());
        info!(
            "Crawl complete. {} pages fetched, {} failed, {} links, {} images in {:.2}s{}",
            report.pages_crawled,
            report.pages_failed,
            report.link_count,
            report.image_count,
            report.elapsed_seconds,
            if report.cancelled { " (cancelled)" } else { "" }
        );
        Ok(report)
    }
}

impl Default for Crawler {
    fn default() -> Self {
        Self::new()
    }
}

/// Check that every seed is an absolute http(s) URL and normalise it.
///
/// Duplicate seeds are collapsed, keeping the first occurrence.
pub fn validate_seeds(seeds: &[String]) -> Result<Vec<String>> {
    if seeds.is_empty() {
        return Err(ScanError::Validation("no seed URLs given".to_string()));
    }

    let mut normalised = Vec::with_capacity(seeds.len());
    for seed in seeds {
        let trimmed = seed.trim();
        let url = Url::parse(trimmed)
            .map_err(|e| ScanError::Validation(format!("'{}': {}", trimmed, e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ScanError::Validation(format!(
                "'{}': scheme must be http or https",
                trimmed
            )));
        }
        if url.host_str().is_none_or(str::is_empty) {
            return Err(ScanError::Validation(format!("'{}': missing host", trimmed)));
        }

        let url = url.to_string();
        if !normalised.contains(&url) {
            normalised.push(url);
        }
    }

    Ok(normalised)
}

/// One member of the fixed-size fetch pool.
struct Worker {
    id: usize,
    fetcher: PageFetcher,
    to_crawl: Arc<Mutex<mpsc::Receiver<Link>>>,
    worklist: mpsc::Sender<PageOutcome>,
    budget: ImageBudget,
    signal: CancellationSignal,
    progress_callback: Option<ProgressCallback>,
}

impl Worker {
    async fn run(self) {
        debug!("Worker {} started", self.id);

        loop {
            let next = {
                let mut to_crawl = self.to_crawl.lock().await;
                to_crawl.recv().await
            };
            let Some(link) = next else {
                break;
            };

            let visited = link.clone();
            let outcome = match AssertUnwindSafe(self.visit(link)).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!("[Worker {}] Panicked while visiting {}", self.id, visited.url);
                    let reason = format!("worker panicked while visiting {}", visited.url);
                    PageOutcome::failed(visited, ScanError::Other(reason))
                }
            };

            // Every dispatched link answers with exactly one outcome, even after
            // cancellation, so the scheduler's in-flight count can reach zero.
            if self.worklist.send(outcome).await.is_err() {
                break;
            }
        }

        debug!("Worker {} finished", self.id);
    }

    async fn visit(&self, link: Link) -> PageOutcome {
        if self.signal.is_cancelled() {
            debug!("[Worker {}] Cancelled, not fetching {}", self.id, link.url);
            return PageOutcome::skipped(link);
        }

        if let Some(ref callback) = self.progress_callback {
            callback(self.id, link.url.clone());
        }

        match self.fetcher.fetch_and_extract(&link.url).await {
            Ok(page) => {
                self.budget.record(page.images.len());

                let links = if self.signal.is_cancelled() {
                    debug!(
                        "[Worker {}] Discarding {} links from {} after cancellation",
                        self.id,
                        page.links.len(),
                        link.url
                    );
                    Vec::new()
                } else {
                    page.links.into_iter().map(|url| link.child(url)).collect()
                };

                PageOutcome {
                    link,
                    links,
                    images: page.images,
                    error: None,
                    skipped: false,
                }
            }
            Err(e) => PageOutcome::failed(link, e),
        }
    }
}

/// Single owner of every dispatch decision for one crawl.
///
/// Moves from awaiting batches to dispatching and back until nothing is
/// pending and nothing is in flight, at which point the crawl is drained.
struct Scheduler {
    max_depth: usize,
    dedup_images: bool,
    signal: CancellationSignal,
    /// URLs dispatched (or about to be) for fetching.
    seen: SeenSet,
    /// URLs already listed in the report, seeds included.
    recorded: HashSet<String>,
    seen_images: HashSet<String>,
    pending: VecDeque<Link>,
    in_flight: usize,
    acc: CrawlAccumulator,
}

impl Scheduler {
    fn new(config: &CrawlConfig, signal: CancellationSignal) -> Self {
        Self {
            max_depth: config.max_depth,
            dedup_images: config.dedup_images,
            signal,
            seen: SeenSet::new(),
            recorded: HashSet::new(),
            seen_images: HashSet::new(),
            pending: VecDeque::new(),
            in_flight: 0,
            acc: CrawlAccumulator::default(),
        }
    }

    fn enqueue_seeds(&mut self, seeds: Vec<String>) {
        for seed in &seeds {
            self.recorded.insert(seed.clone());
            if self.seen.test_and_set(seed) {
                continue;
            }
            if self.max_depth > 0 {
                self.pending.push_back(Link::seed(seed.clone()));
            }
        }
        self.acc.seeds = seeds;
    }

    fn is_drained(&self) -> bool {
        self.pending.is_empty() && self.in_flight == 0
    }

    async fn run(
        mut self,
        to_crawl: mpsc::Sender<Link>,
        mut worklist: mpsc::Receiver<PageOutcome>,
    ) -> Result<CrawlAccumulator> {
        loop {
            if self.signal.is_cancelled() && !self.pending.is_empty() {
                debug!(
                    "Cancelled, dropping {} pending links and draining {} in flight",
                    self.pending.len(),
                    self.in_flight
                );
                self.pending.clear();
            }

            if self.is_drained() {
                break;
            }

            tokio::select! {
                outcome = worklist.recv() => {
                    let Some(outcome) = outcome else {
                        return Err(ScanError::Other(
                            "worker pool exited with links still in flight".to_string(),
                        ));
                    };
                    self.in_flight -= 1;
                    self.absorb(outcome);
                }
                permit = to_crawl.reserve(), if !self.pending.is_empty() => {
                    let permit = permit.map_err(|_| {
                        ScanError::Other("worker pool closed its queue".to_string())
                    })?;
                    if let Some(link) = self.pending.pop_front() {
                        debug!("Dispatching {} (depth {})", link.url, link.depth);
                        permit.send(link);
                        self.in_flight += 1;
                    }
                }
                _ = self.signal.cancelled(), if !self.pending.is_empty() => {}
            }
        }

        // Closing the queue lets idle workers exit.
        drop(to_crawl);
        Ok(self.acc)
    }

    fn absorb(&mut self, outcome: PageOutcome) {
        let PageOutcome {
            link,
            links,
            images,
            error,
            skipped,
        } = outcome;

        if skipped {
            return;
        }

        match error {
            Some(e) if link.depth == 0 => {
                warn!("Seed {} failed: {}", link.url, e);
                self.acc.pages_failed += 1;
                self.acc.seed_errors.push(e.to_string());
            }
            Some(e) => {
                warn!("Crawl error for {}: {}", link.url, e);
                self.acc.pages_failed += 1;
            }
            None => self.acc.pages_crawled += 1,
        }

        for image in images {
            if self.dedup_images && !self.seen_images.insert(image.clone()) {
                continue;
            }
            self.acc.images.push(image);
        }

        for child in links {
            if child.depth > self.max_depth {
                continue;
            }

            if self.recorded.insert(child.url.clone()) {
                self.acc.links.push(child.url.clone());
            }

            // A URL first met at the maximum depth keeps its dispatch key, so a
            // shallower path found later can still fetch it.
            if child.depth < self.max_depth
                && !self.signal.is_cancelled()
                && !self.seen.test_and_set(&child.url)
            {
                self.pending.push_back(child);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    fn html(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .insert_header("content-type", "text/html")
            .set_body_string(format!("<html><body>{}</body></html>", body))
    }

    async fn mount_page(server: &MockServer, route: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(html(body))
            .mount(server)
            .await;
    }

    async fn mount_unvisited(server: &MockServer, route: &str) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(html(""))
            .expect(0)
            .mount(server)
            .await;
    }

    fn seed(server: &MockServer) -> Vec<String> {
        vec![server.uri()]
    }

    fn url(server: &MockServer, route: &str) -> String {
        format!("{}{}", server.uri(), route)
    }

    /// Test basic link discovery
    #[tokio::test]
    async fn test_link_discovery() {
        let mock_server = MockServer::start().await;
        mount_page(
            &mock_server,
            "/",
            r#"<a href="/page1">Page 1</a><a href="/page2">Page 2</a>"#,
        )
        .await;
        mount_page(&mock_server, "/page1", "P1").await;
        mount_page(&mock_server, "/page2", "P2").await;

        let crawler = Crawler::new().with_max_depth(2);
        let report = crawler.crawl(&seed(&mock_server)).await.unwrap();

        assert_eq!(
            report.links,
            vec![url(&mock_server, "/page1"), url(&mock_server, "/page2")]
        );
        assert_eq!(report.link_count, 2);
        assert_eq!(report.pages_crawled, 3);
        assert_eq!(report.pages_failed, 0);
        assert!(report.is_ok());
        assert!(!report.cancelled);
    }

    #[tokio::test]
    async fn test_links_at_max_depth_are_recorded_but_not_fetched() {
        let mock_server = MockServer::start().await;
        mount_page(&mock_server, "/", r#"<a href="/a">a</a>"#).await;
        mount_page(&mock_server, "/a", r#"<a href="/b">b</a>"#).await;
        Mock::given(method("GET"))
            .and(path("/b"))
            .respond_with(html(r#"<a href="/c">c</a>"#))
            .expect(0)
            .mount(&mock_server)
            .await;
        mount_unvisited(&mock_server, "/c").await;

        let crawler = Crawler::new().with_max_depth(2);
        let report = crawler.crawl(&seed(&mock_server)).await.unwrap();

        assert_eq!(
            report.links,
            vec![url(&mock_server, "/a"), url(&mock_server, "/b")]
        );
        assert_eq!(report.pages_crawled, 2);
    }

    #[tokio::test]
    async fn test_max_depth_one_with_linkless_seed() {
        let mock_server = MockServer::start().await;
        mount_page(&mock_server, "/", "<p>nothing to see</p>").await;

        let crawler = Crawler::new().with_max_depth(1);
        let report = crawler.crawl(&seed(&mock_server)).await.unwrap();

        assert!(report.links.is_empty());
        assert_eq!(report.link_count, 0);
        assert_eq!(report.pages_crawled, 1);
    }

    #[tokio::test]
    async fn test_max_depth_one_lists_seed_links_without_recursion() {
        let mock_server = MockServer::start().await;
        mount_page(
            &mock_server,
            "/",
            r#"<a href="/x">x</a><a href="/y">y</a>"#,
        )
        .await;
        mount_unvisited(&mock_server, "/x").await;
        mount_unvisited(&mock_server, "/y").await;

        let crawler = Crawler::new().with_max_depth(1);
        let report = crawler.crawl(&seed(&mock_server)).await.unwrap();

        assert_eq!(
            report.links,
            vec![url(&mock_server, "/x"), url(&mock_server, "/y")]
        );
        assert_eq!(report.pages_crawled, 1);
    }

    #[tokio::test]
    async fn test_max_depth_zero_fetches_nothing() {
        let mock_server = MockServer::start().await;
        mount_unvisited(&mock_server, "/").await;

        let crawler = Crawler::new().with_max_depth(0);
        let report = crawler.crawl(&seed(&mock_server)).await.unwrap();

        assert!(report.links.is_empty());
        assert_eq!(report.pages_crawled, 0);
        assert_eq!(report.seeds, vec![url(&mock_server, "/")]);
    }

    #[tokio::test]
    async fn test_seed_404_terminates_with_error_message() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let report = Crawler::new().crawl(&seed(&mock_server)).await.unwrap();

        assert_eq!(report.link_count, 0);
        assert_eq!(report.image_count, 0);
        assert_eq!(report.pages_failed, 1);
        let message = report.error_message.expect("seed failure should be reported");
        assert!(message.contains("404"), "unexpected message: {}", message);
    }

    #[tokio::test]
    async fn test_non_seed_failure_is_isolated() {
        let mock_server = MockServer::start().await;
        mount_page(
            &mock_server,
            "/",
            r#"<a href="/broken">b</a><a href="/fine">f</a>"#,
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&mock_server)
            .await;
        mount_page(&mock_server, "/fine", r#"<a href="/deeper">d</a>"#).await;
        mount_page(&mock_server, "/deeper", "").await;

        let report = Crawler::new()
            .with_max_depth(3)
            .crawl(&seed(&mock_server))
            .await
            .unwrap();

        assert!(report.is_ok());
        assert_eq!(report.pages_failed, 1);
        assert_eq!(report.pages_crawled, 3);
        assert!(report.links.contains(&url(&mock_server, "/deeper")));
    }

    #[tokio::test]
    async fn test_cycles_produce_no_duplicate_links() {
        let mock_server = MockServer::start().await;
        mount_page(
            &mock_server,
            "/",
            r#"<a href="/">self</a><a href="/a">a</a><a href="/b">b</a><a href="/a">a again</a>"#,
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/a"))
            .respond_with(html(r#"<a href="/b">b</a><a href="/">home</a>"#))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/b"))
            .respond_with(html(r#"<a href="/a">a</a><a href="/c">c</a>"#))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/c"))
            .respond_with(html(r#"<a href="/a">a</a>"#))
            .expect(1)
            .mount(&mock_server)
            .await;

        let report = Crawler::new()
            .with_max_depth(5)
            .crawl(&seed(&mock_server))
            .await
            .unwrap();

        let unique: HashSet<_> = report.links.iter().collect();
        assert_eq!(unique.len(), report.links.len());
        assert_eq!(report.link_count, 3);
        assert!(!report.links.contains(&url(&mock_server, "/")));
    }

    #[tokio::test]
    async fn test_image_count_sums_fetched_pages() {
        let mock_server = MockServer::start().await;
        mount_page(
            &mock_server,
            "/",
            r#"<img src="https://cdn.example.com/1.png">
               <img src="http://cdn.example.com/skipped.png">
               <a href="/gallery">g</a><a href="/about">a</a>"#,
        )
        .await;
        mount_page(
            &mock_server,
            "/gallery",
            r#"<img src="https://cdn.example.com/1.png">
               <img src="https://cdn.example.com/2.png">
               <img src="https://cdn.example.com/3.png">"#,
        )
        .await;
        mount_page(&mock_server, "/about", "no images").await;

        let report = Crawler::new()
            .with_image_threshold(None)
            .crawl(&seed(&mock_server))
            .await
            .unwrap();

        assert_eq!(report.image_count, 4);
        assert_eq!(report.images.len(), 4);
        assert!(!report.cancelled);
    }

    #[tokio::test]
    async fn test_dedup_images_option() {
        let mock_server = MockServer::start().await;
        mount_page(
            &mock_server,
            "/",
            r#"<img src="https://cdn.example.com/logo.png"><a href="/a">a</a>"#,
        )
        .await;
        mount_page(&mock_server, "/a", r#"<img src="https://cdn.example.com/logo.png">"#).await;

        let report = Crawler::new()
            .with_dedup_images(true)
            .crawl(&seed(&mock_server))
            .await
            .unwrap();

        assert_eq!(report.images, vec!["https://cdn.example.com/logo.png"]);
    }

    #[tokio::test]
    async fn test_image_budget_cancels_before_new_fetches() {
        let mock_server = MockServer::start().await;

        let mut root_html = String::new();
        for i in 0..3 {
            root_html.push_str(&format!(r#"<img src="https://cdn.example.com/{}.png">"#, i));
        }
        for i in 1..=5 {
            root_html.push_str(&format!(r#"<a href="/page{}">Page {}</a>"#, i, i));
        }
        mount_page(&mock_server, "/", &root_html).await;
        for i in 1..=5 {
            mount_unvisited(&mock_server, &format!("/page{}", i)).await;
        }

        let report = Crawler::new()
            .with_image_threshold(Some(2))
            .crawl(&seed(&mock_server))
            .await
            .unwrap();

        assert!(report.cancelled);
        assert_eq!(report.image_count, 3);
        assert!(report.links.is_empty());
        assert_eq!(report.pages_crawled, 1);
    }

    #[tokio::test]
    async fn test_cancellation_mid_crawl_drains_and_stops() {
        let mock_server = MockServer::start().await;

        let mut root_html = String::from(r#"<img src="https://cdn.example.com/root.png">"#);
        for i in 1..=10 {
            root_html.push_str(&format!(r#"<a href="/page{}">Page {}</a>"#, i, i));
        }
        mount_page(&mock_server, "/", &root_html).await;
        for i in 1..=10 {
            Mock::given(method("GET"))
                .and(path(format!("/page{}", i)))
                .respond_with(
                    html(&format!(
                        r#"<img src="https://cdn.example.com/{}.png"><a href="/deep{}">d</a>"#,
                        i, i
                    ))
                    .set_delay(Duration::from_millis(20)),
                )
                .mount(&mock_server)
                .await;
            mount_unvisited(&mock_server, &format!("/deep{}", i)).await;
        }

        let report = Crawler::new()
            .with_workers(2)
            .with_max_depth(2)
            .with_image_threshold(Some(3))
            .crawl(&seed(&mock_server))
            .await
            .unwrap();

        assert!(report.cancelled);
        assert!(report.image_count > 3);
        assert!(
            report.pages_crawled < 11,
            "expected cancellation to stop the crawl early, crawled {}",
            report.pages_crawled
        );
    }

    /// Test that a pool smaller than the number of pages still processes everything
    #[tokio::test]
    async fn test_small_pool_processes_all_pages() {
        let mock_server = MockServer::start().await;

        let mut root_html = String::new();
        for i in 1..=12 {
            root_html.push_str(&format!(r#"<a href="/page{}">Page {}</a>"#, i, i));
        }
        mount_page(&mock_server, "/", &root_html).await;

        for i in 1..=12 {
            Mock::given(method("GET"))
                .and(path(format!("/page{}", i)))
                .respond_with(html("Content").set_delay(Duration::from_millis(10)))
                .expect(1)
                .mount(&mock_server)
                .await;
        }

        let report = Crawler::new()
            .with_workers(3)
            .with_max_depth(2)
            .crawl(&seed(&mock_server))
            .await
            .unwrap();

        assert_eq!(report.pages_crawled, 13);
        assert_eq!(report.link_count, 12);
    }

    /// Test that multiple workers are actually used during crawling
    #[tokio::test]
    async fn test_shallower_path_fetches_link_first_seen_at_max_depth() {
        let mock_server = MockServer::start().await;
        // /x is reached at depth 2 through /fast and /q long before /slow
        // reports it at depth 1.
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(html(r#"<a href="/x">x</a>"#).set_delay(Duration::from_millis(400)))
            .mount(&mock_server)
            .await;
        mount_page(&mock_server, "/fast", r#"<a href="/q">q</a>"#).await;
        mount_page(&mock_server, "/q", r#"<a href="/x">x</a>"#).await;
        Mock::given(method("GET"))
            .and(path("/x"))
            .respond_with(html(r#"<img src="https://cdn.example.com/x.png">"#))
            .expect(1)
            .mount(&mock_server)
            .await;

        let seeds = vec![url(&mock_server, "/slow"), url(&mock_server, "/fast")];
        let report = Crawler::new()
            .with_max_depth(2)
            .with_image_threshold(None)
            .crawl(&seeds)
            .await
            .unwrap();

        assert_eq!(report.pages_crawled, 4);
        assert_eq!(report.images, vec!["https://cdn.example.com/x.png".to_string()]);
        assert_eq!(report.image_count, 1);
        let x_entries = report
            .links
            .iter()
            .filter(|link| **link == url(&mock_server, "/x"))
            .count();
        assert_eq!(x_entries, 1);
        assert_eq!(report.link_count, 2);
    }

    #[tokio::test]
    async fn test_panicking_visit_is_recorded_as_failure() {
        let mock_server = MockServer::start().await;
        mount_page(
            &mock_server,
            "/",
            r#"<a href="/boom">boom</a><a href="/fine">fine</a>"#,
        )
        .await;
        mount_unvisited(&mock_server, "/boom").await;
        mount_page(&mock_server, "/fine", "").await;

        let crawler = Crawler::new()
            .with_workers(2)
            .with_progress_callback(Arc::new(|_worker_id, url: String| {
                if url.ends_with("/boom") {
                    panic!("callback failure for {}", url);
                }
            }));
        let report = tokio::time::timeout(
            Duration::from_secs(10),
            crawler.crawl(&seed(&mock_server)),
        )
        .await
        .expect("crawl should finish after a worker panic")
        .unwrap();

        assert_eq!(report.pages_crawled, 2);
        assert_eq!(report.pages_failed, 1);
        assert!(report.is_ok());
    }

    #[tokio::test]
    async fn test_multiple_workers_are_used() {
        let mock_server = MockServer::start().await;

        let mut root_html = String::new();
        for i in 1..=10 {
            root_html.push_str(&format!(r#"<a href="/page{}">Page {}</a>"#, i, i));
        }
        mount_page(&mock_server, "/", &root_html).await;
        for i in 1..=10 {
            Mock::given(method("GET"))
                .and(path(format!("/page{}", i)))
                .respond_with(html("Page").set_delay(Duration::from_millis(50)))
                .mount(&mock_server)
                .await;
        }

        let workers_seen: Arc<std::sync::Mutex<HashSet<usize>>> =
            Arc::new(std::sync::Mutex::new(HashSet::new()));
        let dispatched = Arc::new(AtomicUsize::new(0));
        let workers_seen_clone = workers_seen.clone();
        let dispatched_clone = dispatched.clone();

        let report = Crawler::new()
            .with_workers(4)
            .with_max_depth(2)
            .with_progress_callback(Arc::new(move |worker_id, _url| {
                workers_seen_clone.lock().unwrap().insert(worker_id);
                dispatched_clone.fetch_add(1, Ordering::SeqCst);
            }))
            .crawl(&seed(&mock_server))
            .await
            .unwrap();

        assert_eq!(report.pages_crawled, 11);
        assert_eq!(dispatched.load(Ordering::SeqCst), 11);

        let used = workers_seen.lock().unwrap().len();
        assert!(
            used > 1,
            "Expected multiple workers to be used, but only {} worker(s) processed URLs",
            used
        );
    }

    #[tokio::test]
    async fn test_multiple_seeds_share_one_crawl() {
        let first = MockServer::start().await;
        let second = MockServer::start().await;
        mount_page(&first, "/", r#"<a href="/one">1</a>"#).await;
        mount_page(&first, "/one", "").await;
        mount_page(&second, "/", r#"<a href="/two">2</a>"#).await;
        mount_page(&second, "/two", "").await;

        let seeds = vec![first.uri(), second.uri(), first.uri()];
        let report = Crawler::new().crawl(&seeds).await.unwrap();

        assert_eq!(report.seeds.len(), 2);
        assert_eq!(report.pages_crawled, 4);
        let links: HashSet<_> = report.links.iter().cloned().collect();
        assert_eq!(
            links,
            HashSet::from([url(&first, "/one"), url(&second, "/two")])
        );
    }

    #[tokio::test]
    async fn test_concurrent_crawls_do_not_share_state() {
        let mock_server = MockServer::start().await;
        mount_page(&mock_server, "/", r#"<a href="/a">a</a><a href="/b">b</a>"#).await;
        mount_page(&mock_server, "/a", r#"<img src="https://cdn.example.com/a.png">"#).await;
        mount_page(&mock_server, "/b", "").await;

        let crawler = Crawler::new();
        let seeds = seed(&mock_server);
        let (first, second) = tokio::join!(crawler.crawl(&seeds), crawler.crawl(&seeds));
        let (first, second) = (first.unwrap(), second.unwrap());

        assert_eq!(first.link_count, 2);
        assert_eq!(second.link_count, 2);
        assert_eq!(first.image_count, 1);
        assert_eq!(second.image_count, 1);
    }

    #[tokio::test]
    async fn test_invalid_seed_aborts_before_fetching() {
        let mock_server = MockServer::start().await;
        mount_unvisited(&mock_server, "/").await;

        let seeds = vec![mock_server.uri(), "not a url".to_string()];
        let err = Crawler::new().crawl(&seeds).await.unwrap_err();
        assert!(matches!(err, ScanError::Validation(_)));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_zero_workers_is_rejected() {
        let err = Crawler::new()
            .with_workers(0)
            .crawl(&["https://example.com".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::Validation(_)));
    }

    #[test]
    fn test_validate_seeds_normalises_and_dedups() {
        let seeds = vec![
            "https://example.com".to_string(),
            "  https://example.com/  ".to_string(),
            "http://other.example/path".to_string(),
        ];
        let validated = validate_seeds(&seeds).unwrap();
        assert_eq!(
            validated,
            vec!["https://example.com/", "http://other.example/path"]
        );
    }

    #[test]
    fn test_validate_seeds_rejects_bad_input() {
        assert!(validate_seeds(&[]).is_err());
        assert!(validate_seeds(&["example.com".to_string()]).is_err());
        assert!(validate_seeds(&["ftp://example.com/".to_string()]).is_err());
        assert!(validate_seeds(&["mailto:someone@example.com".to_string()]).is_err());
    }
}
