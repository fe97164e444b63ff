// Report rendering for finished crawls

use crate::crawl::extract_url_host;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use trawler_scanner::CrawlReport;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            other => Err(format!("Unknown report format '{}'", other)),
        }
    }
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Text => "txt",
            ReportFormat::Json => "json",
        }
    }
}

/// One-line description of how the crawl ended
pub fn status_to_string(report: &CrawlReport) -> String {
    match (&report.error_message, report.cancelled) {
        (Some(message), _) => format!("failed: {}", message),
        (None, true) => "cancelled (image budget exceeded)".to_string(),
        (None, false) => "complete".to_string(),
    }
}

/// Group URLs by host, keeping discovery order within each host.
fn group_by_host(urls: &[String]) -> BTreeMap<String, Vec<&str>> {
    let mut by_host: BTreeMap<String, Vec<&str>> = BTreeMap::new();
    for url in urls {
        by_host
            .entry(extract_url_host(url))
            .or_default()
            .push(url.as_str());
    }
    by_host
}

pub fn generate_text_report(report: &CrawlReport) -> String {
    let mut out = String::new();

    out.push_str(RULE);
    out.push_str("                              TRAWLER CRAWL REPORT\n");
    out.push_str(RULE);
    out.push('\n');

    out.push_str(&format!("Status:        {}\n", status_to_string(report)));
    out.push_str(&format!("Seeds:         {}\n", report.seeds.join(", ")));
    out.push_str(&format!("Elapsed:       {:.2} seconds\n", report.elapsed_seconds));
    out.push_str(&format!("Pages crawled: {}\n", report.pages_crawled));
    out.push_str(&format!("Pages failed:  {}\n", report.pages_failed));
    out.push_str(&format!("Links found:   {}\n", report.link_count));
    out.push_str(&format!("Images found:  {}\n", report.image_count));
    out.push('\n');

    if !report.links.is_empty() {
        out.push_str(RULE);
        out.push_str("LINKS\n");
        out.push_str(RULE);
        out.push('\n');

        for (host, urls) in group_by_host(&report.links) {
            out.push_str(&format!("## {}\n", host));
            out.push_str(&format!("  {} links found\n\n", urls.len()));
            for url in urls {
                out.push_str(&format!("  {}\n", url));
            }
            out.push('\n');
        }
    }

    if !report.images.is_empty() {
        out.push_str(RULE);
        out.push_str("IMAGES\n");
        out.push_str(RULE);
        out.push('\n');

        for image in &report.images {
            out.push_str(&format!("  {}\n", image));
        }
        out.push('\n');
    }

    out.push_str(RULE);
    out.push_str("\nGenerated by Trawler\n");

    out
}

pub fn generate_json_report(report: &CrawlReport) -> Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "Trawler",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "format": "json",
            },
            "status": status_to_string(report),
            "summary": {
                "seeds": report.seeds,
                "pages_crawled": report.pages_crawled,
                "pages_failed": report.pages_failed,
                "link_count": report.link_count,
                "image_count": report.image_count,
                "elapsed_seconds": report.elapsed_seconds,
                "cancelled": report.cancelled,
                "error_message": report.error_message,
            },
            "links": report.links,
            "images": report.images,
        }
    });

    serde_json::to_string_pretty(&json_report)
}

pub fn generate_report(report: &CrawlReport, format: ReportFormat) -> Result<String, String> {
    match format {
        ReportFormat::Text => Ok(generate_text_report(report)),
        ReportFormat::Json => generate_json_report(report)
            .map_err(|e| format!("Failed to serialise report: {}", e)),
    }
}

/// Write a rendered report, creating parent directories as needed.
pub fn write_report(path: &Path, content: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)
}
