use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_WORKERS: usize = 20;
pub const DEFAULT_MAX_DEPTH: usize = 3;
pub const DEFAULT_IMAGE_PREFIX: &str = "https://";
pub const DEFAULT_IMAGE_THRESHOLD: usize = 60;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_USER_AGENT: &str = concat!("Trawler/", env!("CARGO_PKG_VERSION"));

/// Tunables for a single crawl.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Size of the fixed worker pool.
    pub workers: usize,
    /// Links deeper than this are dropped; links at exactly this depth are
    /// recorded but never fetched.
    pub max_depth: usize,
    pub image_prefix: String,
    /// Cancel the crawl once more than this many images have been collected.
    pub image_threshold: Option<usize>,
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,
    pub dedup_images: bool,
    pub user_agent: String,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            max_depth: DEFAULT_MAX_DEPTH,
            image_prefix: DEFAULT_IMAGE_PREFIX.to_string(),
            image_threshold: Some(DEFAULT_IMAGE_THRESHOLD),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            dedup_images: false,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
