use crate::config::CrawlConfig;
use crate::error::{Result, ScanError};
use reqwest::Client;
use scraper::Html;
use std::time::Instant;
use tracing::debug;
use url::Url;

/// Links and images extracted from one successfully fetched page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    /// Final URL of the response, after redirects.
    pub url: String,
    /// Absolute outbound links in document order.
    pub links: Vec<String>,
    /// Attribute values of `<img>` elements that start with the image prefix.
    pub images: Vec<String>,
}

/// Fetches a page over HTTP and extracts its links and images.
///
/// Holds no crawl state; one fetcher is shared by every worker.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: Client,
    image_prefix: String,
}

impl PageFetcher {
    pub fn new(config: &CrawlConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.request_timeout)
            .connect_timeout(config.request_timeout / 2)
            .pool_max_idle_per_host(config.workers.max(1))
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .tcp_keepalive(std::time::Duration::from_secs(60))
            .build()?;

        Ok(Self::with_client(client, config.image_prefix.as_str()))
    }

    pub fn with_client(client: Client, image_prefix: impl Into<String>) -> Self {
        Self {
            client,
            image_prefix: image_prefix.into(),
        }
    }

    /// GET `url` and extract its links and images.
    ///
    /// All-or-nothing: a non-2xx status, a transport failure or an unreadable
    /// body yields an error and no partial results.
    pub async fn fetch_and_extract(&self, url: &str) -> Result<Page> {
        debug!("Fetching {}", url);

        let start = Instant::now();
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(ScanError::Fetch {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let base = response.url().clone();
        let body = response.text().await.map_err(|e| ScanError::Parse {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let page = extract_page(&body, &base, &self.image_prefix);
        debug!(
            "Fetched {} in {:?}: {} links, {} images",
            url,
            start.elapsed(),
            page.links.len(),
            page.images.len()
        );

        Ok(page)
    }
}

/// Walk the parsed document in pre-order, collecting anchor targets resolved
/// against `base` and image attribute values starting with `image_prefix`.
pub fn extract_page(html: &str, base: &Url, image_prefix: &str) -> Page {
    let document = Html::parse_document(html);
    let mut page = Page {
        url: base.to_string(),
        ..Page::default()
    };

    for node in document.root_element().descendants() {
        let Some(element) = node.value().as_element() else {
            continue;
        };

        match element.name() {
            "a" => {
                if let Some(href) = element.attr("href") {
                    match resolve_link(base, href) {
                        Ok(url) => page.links.push(url),
                        Err(e) => debug!("Skipping link on {}: {}", base, e),
                    }
                }
            }
            // Every attribute is inspected, not only src.
            "img" => {
                for (_, value) in element.attrs() {
                    if value.starts_with(image_prefix) {
                        page.images.push(value.to_string());
                    }
                }
            }
            _ => {}
        }
    }

    page
}

/// Resolve `href` relative to `base`. Only http and https targets are crawlable.
pub fn resolve_link(base: &Url, href: &str) -> Result<String> {
    let resolved = base.join(href).map_err(|e| ScanError::LinkResolution {
        href: href.to_string(),
        reason: e.to_string(),
    })?;

    match resolved.scheme() {
        "http" | "https" => Ok(resolved.to_string()),
        other => Err(ScanError::LinkResolution {
            href: href.to_string(),
            reason: format!("unsupported scheme '{}'", other),
        }),
    }
}
