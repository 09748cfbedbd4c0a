use crate::error::ConfigError;
use crate::filter::{LinkFilterConfig, default_exclude_patterns};
use crate::regions::Region;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Inclusive range of milliseconds to wait around a navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    /// A range that never sleeps
    pub const fn none() -> Self {
        Self::new(0, 0)
    }

    pub fn is_zero(&self) -> bool {
        self.max_ms == 0
    }
}

/// Configuration for one harvesting run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// Maximum records kept from one region's pages
    #[serde(default = "default_per_region_cap")]
    pub per_region_cap: usize,

    /// Maximum listing pages visited per region
    #[serde(default = "default_max_pages_per_region")]
    pub max_pages_per_region: usize,

    /// Timeout for a single page load
    #[serde(default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,

    /// Random pause before navigating
    #[serde(default = "default_delay")]
    pub pre_nav_delay: DelayRange,

    /// Random pause after navigating
    #[serde(default = "default_delay")]
    pub post_nav_delay: DelayRange,

    /// Wall-clock budget for one batch, checked between regions
    #[serde(default = "default_batch_deadline_ms")]
    pub batch_deadline_ms: u64,

    /// Default number of regions per invocation
    #[serde(default = "default_regions_per_call")]
    pub regions_per_call: usize,

    /// Detail pages loaded per region to build extended profiles
    #[serde(default = "default_profiles_per_region")]
    pub profiles_per_region: usize,

    /// URL for the WebDriver instance
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    /// Run the browser without a window
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Listing URL with `{slug}` and/or `{code}` placeholders
    #[serde(default = "default_listing_url_template")]
    pub listing_url_template: String,

    /// Candidate whole-catalog URLs, tried in order
    #[serde(default = "default_catalog_urls")]
    pub catalog_urls: Vec<String>,

    /// Tag stored on every record to identify the directory it came from
    #[serde(default = "default_source_tag")]
    pub source_tag: String,

    /// Records per upsert call to the result sink
    #[serde(default = "default_sink_chunk_size")]
    pub sink_chunk_size: usize,

    /// Regex patterns for links that can never be detail pages
    #[serde(default = "default_exclude_patterns")]
    pub link_exclude_patterns: Vec<String>,
}

fn default_per_region_cap() -> usize {
    30
}

fn default_max_pages_per_region() -> usize {
    3
}

fn default_navigation_timeout_ms() -> u64 {
    30_000
}

fn default_delay() -> DelayRange {
    DelayRange::new(1_000, 3_000)
}

fn default_batch_deadline_ms() -> u64 {
    240_000
}

fn default_regions_per_call() -> usize {
    2
}

fn default_profiles_per_region() -> usize {
    3
}

fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

fn default_headless() -> bool {
    true
}

fn default_listing_url_template() -> String {
    "https://www.theknot.com/marketplace/wedding-reception-venues-{slug}".to_string()
}

fn default_catalog_urls() -> Vec<String> {
    vec![
        "https://www.theknot.com/marketplace/wedding-reception-venues".to_string(),
        "https://www.theknot.com/marketplace/wedding-venues".to_string(),
    ]
}

fn default_source_tag() -> String {
    "theknot".to_string()
}

fn default_sink_chunk_size() -> usize {
    50
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            per_region_cap: default_per_region_cap(),
            max_pages_per_region: default_max_pages_per_region(),
            navigation_timeout_ms: default_navigation_timeout_ms(),
            pre_nav_delay: default_delay(),
            post_nav_delay: default_delay(),
            batch_deadline_ms: default_batch_deadline_ms(),
            regions_per_call: default_regions_per_call(),
            profiles_per_region: default_profiles_per_region(),
            webdriver_url: default_webdriver_url(),
            headless: default_headless(),
            listing_url_template: default_listing_url_template(),
            catalog_urls: default_catalog_urls(),
            source_tag: default_source_tag(),
            sink_chunk_size: default_sink_chunk_size(),
            link_exclude_patterns: default_exclude_patterns(),
        }
    }
}

impl HarvestConfig {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        Self::from_json(&contents)
    }

    /// Parse configuration from a JSON string and validate it
    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Override the WebDriver URL with the `WEBDRIVER_URL` environment variable if set
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(webdriver_url) = std::env::var("WEBDRIVER_URL") {
            if !webdriver_url.is_empty() {
                self.webdriver_url = webdriver_url;
            }
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.per_region_cap == 0 {
            return Err(ConfigError::Invalid("per_region_cap must be at least 1".into()));
        }
        if self.max_pages_per_region == 0 {
            return Err(ConfigError::Invalid(
                "max_pages_per_region must be at least 1".into(),
            ));
        }
        if self.sink_chunk_size == 0 {
            return Err(ConfigError::Invalid("sink_chunk_size must be at least 1".into()));
        }
        if self.regions_per_call == 0 {
            return Err(ConfigError::Invalid("regions_per_call must be at least 1".into()));
        }
        for (label, range) in [
            ("pre_nav_delay", self.pre_nav_delay),
            ("post_nav_delay", self.post_nav_delay),
        ] {
            if range.min_ms > range.max_ms {
                return Err(ConfigError::Invalid(format!(
                    "{label}: min_ms {} exceeds max_ms {}",
                    range.min_ms, range.max_ms
                )));
            }
        }
        for pattern in &self.link_exclude_patterns {
            if let Err(e) = Regex::new(pattern) {
                return Err(ConfigError::Invalid(format!(
                    "link_exclude_patterns: {pattern}: {e}"
                )));
            }
        }
        if !self.listing_url_template.contains("{slug}")
            && !self.listing_url_template.contains("{code}")
        {
            return Err(ConfigError::Invalid(
                "listing_url_template needs a {slug} or {code} placeholder".into(),
            ));
        }
        Ok(())
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn batch_deadline(&self) -> Duration {
        Duration::from_millis(self.batch_deadline_ms)
    }

    /// Link filter settings scoped to the host of `site_root`
    pub fn link_filter(&self, site_root: Option<&Url>) -> LinkFilterConfig {
        LinkFilterConfig {
            required_domain: site_root.and_then(|u| u.host_str()).map(str::to_string),
            exclude_patterns: self.link_exclude_patterns.clone(),
        }
    }

    /// Listing URL for the first page of a region
    pub fn listing_url(&self, region: &Region) -> String {
        self.listing_url_template
            .replace("{slug}", &region.slug)
            .replace("{code}", &region.code.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = HarvestConfig::from_json("{}").unwrap();
        assert_eq!(config.per_region_cap, 30);
        assert_eq!(config.max_pages_per_region, 3);
        assert_eq!(config.navigation_timeout_ms, 30_000);
        assert_eq!(config.pre_nav_delay, DelayRange::new(1_000, 3_000));
        assert_eq!(config.sink_chunk_size, 50);
    }

    #[test]
    fn test_partial_override() {
        let config = HarvestConfig::from_json(
            r#"{"per_region_cap": 5, "pre_nav_delay": {"min_ms": 0, "max_ms": 0}}"#,
        )
        .unwrap();
        assert_eq!(config.per_region_cap, 5);
        assert!(config.pre_nav_delay.is_zero());
        assert_eq!(config.post_nav_delay, DelayRange::new(1_000, 3_000));
    }

    #[test]
    fn test_rejects_inverted_delay() {
        let err = HarvestConfig::from_json(r#"{"post_nav_delay": {"min_ms": 5, "max_ms": 1}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("post_nav_delay"));
    }

    #[test]
    fn test_rejects_zero_cap() {
        assert!(HarvestConfig::from_json(r#"{"per_region_cap": 0}"#).is_err());
    }

    #[test]
    fn test_link_exclude_patterns() {
        let config = HarvestConfig::default();
        assert_eq!(config.link_exclude_patterns, default_exclude_patterns());

        let config =
            HarvestConfig::from_json(r#"{"link_exclude_patterns": ["/sponsored/"]}"#).unwrap();
        let root = Url::parse("https://dir.example/").unwrap();
        let filter = config.link_filter(Some(&root));
        assert_eq!(filter.required_domain.as_deref(), Some("dir.example"));
        assert_eq!(filter.exclude_patterns, vec!["/sponsored/"]);

        let err = HarvestConfig::from_json(r#"{"link_exclude_patterns": ["("]}"#).unwrap_err();
        assert!(err.to_string().contains("link_exclude_patterns"));
    }

    #[test]
    fn test_listing_url_placeholders() {
        let config = HarvestConfig {
            listing_url_template: "https://dir.example/{code}/{slug}/venues".to_string(),
            ..HarvestConfig::default()
        };
        let region = Region::new(0, "NY", "New York");
        assert_eq!(
            config.listing_url(&region),
            "https://dir.example/ny/new-york/venues"
        );
    }
}
