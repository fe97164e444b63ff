use anyhow::{Context, Result, anyhow};
use clap::ArgMatches;
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use trawler_core::crawl::{CrawlOptions, execute_crawl};
use trawler_core::report::{ReportFormat, generate_report, write_report};
use trawler_scanner::{CrawlConfig, CrawlReport};
use url::Url;

// Helper functions for crawl handler

/// Load URLs from either a file or the `--url` arguments
pub fn load_urls_from_source(
    urls: &[Url],
    hosts_file: Option<&PathBuf>,
) -> Result<Vec<String>, String> {
    if let Some(hosts_file_path) = hosts_file {
        load_urls_from_file(hosts_file_path)
    } else if !urls.is_empty() {
        Ok(urls.iter().map(|url| url.as_str().to_string()).collect())
    } else {
        Err("Either --url or --hosts-file must be provided".to_string())
    }
}

/// Load and parse URLs from a file.
///
/// Blank lines and `#` comments are ignored. A line that is not a URL even
/// with `http://` prepended aborts the whole load.
pub fn load_urls_from_file(path: &Path) -> Result<Vec<String>, String> {
    let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
    let content = fs::read_to_string(&expanded)
        .map_err(|e| format!("Failed to read hosts file {}: {}", path.display(), e))?;

    let mut urls = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match parse_url_line(line) {
            Some(url) => urls.push(url),
            None => {
                return Err(format!(
                    "Invalid URL '{}' on line {} of {}",
                    line,
                    idx + 1,
                    path.display()
                ));
            }
        }
    }

    if urls.is_empty() {
        return Err(format!("No valid URLs found in {}", path.display()));
    }

    Ok(urls)
}

/// Parse a single line as a URL, trying to add http:// if needed
pub fn parse_url_line(line: &str) -> Option<String> {
    // Try to parse as-is
    if let Ok(url) = Url::parse(line)
        && matches!(url.scheme(), "http" | "https")
    {
        return Some(line.to_string());
    }

    // Try adding http://
    let with_scheme = format!("http://{}", line);
    match Url::parse(&with_scheme) {
        Ok(url) if url.host_str().is_some_and(|h| !h.is_empty()) && !line.contains(' ') => {
            Some(with_scheme)
        }
        _ => None,
    }
}

/// Expand `~` in the output path and add the format's extension when the
/// path has none.
pub fn resolve_output_path(output: &Path, format: ReportFormat) -> PathBuf {
    let mut path = PathBuf::from(shellexpand::tilde(&output.to_string_lossy()).as_ref());
    if path.extension().is_none() {
        path.set_extension(format.extension());
    }
    path
}

/// Build the crawl configuration from the `crawl` subcommand's arguments.
pub fn crawl_config_from_args(args: &ArgMatches) -> CrawlConfig {
    let defaults = CrawlConfig::default();

    let image_threshold = if args.get_flag("no-image-limit") {
        None
    } else {
        args.get_one::<usize>("image-threshold")
            .copied()
            .or(defaults.image_threshold)
    };

    CrawlConfig {
        workers: args
            .get_one::<usize>("threads")
            .copied()
            .unwrap_or(defaults.workers),
        max_depth: args
            .get_one::<usize>("max-depth")
            .copied()
            .unwrap_or(defaults.max_depth),
        image_prefix: args
            .get_one::<String>("image-prefix")
            .cloned()
            .unwrap_or(defaults.image_prefix),
        image_threshold,
        request_timeout: args
            .get_one::<u64>("timeout")
            .map(|secs| Duration::from_secs(*secs))
            .unwrap_or(defaults.request_timeout),
        dedup_images: args.get_flag("dedup-images"),
        user_agent: defaults.user_agent,
    }
}

/// Install the stderr log subscriber.
pub fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else if quiet {
        tracing::Level::WARN
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_summary(report: &CrawlReport) {
    print_divider();
    let status = if let Some(ref message) = report.error_message {
        format!("✗ Crawl failed: {}", message).red().bold()
    } else if report.cancelled {
        "⚠ Crawl stopped early: image budget exceeded".yellow().bold()
    } else {
        "✓ Crawl complete!".green().bold()
    };
    println!("{}", status);
    println!(
        "{} {} pages fetched, {} failed, {} links, {} images in {:.2}s",
        "→".blue(),
        report.pages_crawled.to_string().bright_white(),
        report.pages_failed.to_string().bright_white(),
        report.link_count.to_string().bright_white(),
        report.image_count.to_string().bright_white(),
        report.elapsed_seconds
    );
    print_divider();
    println!();
}

/// Run the `crawl` subcommand. Returns `Ok(false)` when the crawl finished
/// but a seed page could not be fetched.
pub async fn handle_crawl(sub_matches: &ArgMatches, quiet: bool) -> Result<bool> {
    let urls: Vec<Url> = sub_matches
        .get_many::<Url>("url")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    let hosts_file = sub_matches.get_one::<PathBuf>("hosts-file");

    let seeds = load_urls_from_source(&urls, hosts_file).map_err(|e| anyhow!(e))?;
    let config = crawl_config_from_args(sub_matches);
    let format: ReportFormat = sub_matches
        .get_one::<String>("format")
        .map(String::as_str)
        .unwrap_or("text")
        .parse::<ReportFormat>()
        .map_err(|e| anyhow!(e))?;

    if !quiet {
        println!("\n{} Crawling {} seed(s)", "🕷".cyan(), seeds.len());
        println!("Workers: {}", config.workers);
        println!("Max depth: {}", config.max_depth);
        match config.image_threshold {
            Some(threshold) => println!("Image budget: {}\n", threshold),
            None => println!("Image budget: unlimited\n"),
        }
    }

    let options = CrawlOptions {
        urls: seeds,
        config,
        show_progress_bars: !quiet,
    };
    let progress_callback: Option<trawler_core::crawl::CrawlProgressCallback> = if quiet {
        None
    } else {
        Some(Arc::new(|msg: String| eprintln!("{}", msg)))
    };

    let report = execute_crawl(options, progress_callback)
        .await
        .context("Crawl failed")?;

    if !quiet {
        print_summary(&report);
    }

    let rendered = generate_report(&report, format).map_err(|e| anyhow!(e))?;
    match sub_matches.get_one::<PathBuf>("output") {
        Some(output) => {
            let expanded = resolve_output_path(output, format);
            write_report(&expanded, &rendered)
                .with_context(|| format!("Failed to write report to {}", expanded.display()))?;
            println!(
                "{} Report saved to {}",
                "✓".green().bold(),
                expanded.display().to_string().bright_white()
            );
        }
        None => print!("{}", rendered),
    }

    Ok(report.is_ok())
}
