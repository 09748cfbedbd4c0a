pub mod config;
pub mod crawlers;
pub mod dedupe;
pub mod error;
pub mod filter;
pub mod parsers;
pub mod record;
pub mod regions;
pub mod report;
pub mod results;
pub mod sink;
pub mod utils;

// Re-export commonly used types for convenience
pub use config::HarvestConfig;
pub use crawlers::BatchRequest;
pub use error::{ConfigError, ScrapeError, SinkError};
pub use record::VenueRecord;
pub use report::{CatalogReport, InvocationReport};
pub use results::{RawListingRecord, VenueProfile};
pub use sink::{JsonFileSink, MemorySink, ResultSink};

use crawlers::{FallbackFetcher, HttpSession, RegionIterator, RenderAgent, Sessions};
use filter::LinkFilter;
use parsers::{ListingExtractor, ProfileExtractor};
use regions::Region;
use results::HarvestedVenue;
use tokio::time::Instant;
use url::Url;

/// Entry point for harvesting venue listings region by region
pub struct Harvester {
    config: HarvestConfig,
    regions: Vec<Region>,
    listing: ListingExtractor,
    profiles: ProfileExtractor,
    render: bool,
}

impl Harvester {
    /// Harvester over the 50 US states
    pub fn new(config: HarvestConfig) -> Self {
        let root = site_root(&config.listing_url_template);
        let mut listing = ListingExtractor::new(config.source_tag.clone());
        if let Some(root) = root.clone() {
            listing = listing.with_site_root(root);
        }
        match LinkFilter::new(config.link_filter(root.as_ref())) {
            Ok(links) => listing = listing.with_link_filter(links),
            Err(e) => ::log::warn!("Ignoring link_exclude_patterns: {}", e),
        }
        Self {
            config,
            regions: regions::us_states(),
            listing,
            profiles: ProfileExtractor::new(),
            render: true,
        }
    }

    /// Replace the region list
    pub fn with_regions(mut self, regions: Vec<Region>) -> Self {
        self.regions = regions;
        self
    }

    /// Skip the browser and fetch over plain HTTP only
    pub fn without_render(mut self) -> Self {
        self.render = false;
        self
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Open the sessions a batch uses.
    ///
    /// When no browser can be started the HTTP session becomes the primary.
    pub async fn open_sessions(&self) -> Result<Sessions, ScrapeError> {
        let http = HttpSession::new(FallbackFetcher::new(&self.config)?);
        if !self.render {
            return Ok(Sessions::new(Box::new(http), None));
        }

        match RenderAgent::open(&self.config).await {
            Ok(render) => Ok(Sessions::new(Box::new(render), Some(Box::new(http)))),
            Err(e) => {
                ::log::warn!("{}; continuing with the HTTP fetcher only", e);
                Ok(Sessions::new(Box::new(http), None))
            }
        }
    }

    /// Run one batch and persist its records; sessions are closed on every path
    pub async fn run(&self, request: BatchRequest, sink: &dyn ResultSink) -> InvocationReport {
        if let Err(report) = self.check(request) {
            return report;
        }

        let mut sessions = match self.open_sessions().await {
            Ok(sessions) => sessions,
            Err(e) => {
                ::log::error!("Could not open any session: {}", e);
                return self.failure(request, e);
            }
        };
        let report = self.run_with(&mut sessions, request, sink).await;
        sessions.close().await;
        report
    }

    /// Run one batch on sessions the caller owns and will close
    pub async fn run_with(
        &self,
        sessions: &mut Sessions,
        request: BatchRequest,
        sink: &dyn ResultSink,
    ) -> InvocationReport {
        if let Err(report) = self.check(request) {
            return report;
        }

        let deadline = Instant::now() + self.config.batch_deadline();
        let iterator = RegionIterator::new(&self.regions, &self.config, &self.listing, &self.profiles);
        let batch = match iterator.run_batch(sessions, request, deadline).await {
            Ok(batch) => batch,
            Err(e) => return self.failure(request, e),
        };

        let records: Vec<VenueRecord> = batch.venues.iter().map(VenueRecord::from_harvest).collect();
        let persistence = sink::persist(sink, &records, self.config.sink_chunk_size).await;
        let failed = persistence.iter().filter(|r| !r.is_ok()).count();
        if failed > 0 {
            ::log::warn!("{} of {} sub-batches were not stored", failed, persistence.len());
        }

        InvocationReport::from_batch(&batch, persistence)
    }

    /// Fetch listings from the first catalog URL that has any
    pub async fn harvest_catalog(&self) -> Result<Vec<RawListingRecord>, ScrapeError> {
        let fetcher = FallbackFetcher::new(&self.config)?;
        let (url, records) = fetcher
            .fetch_catalog(&self.config.catalog_urls, &self.listing)
            .await?;
        ::log::info!("Catalog {} gave {} listings", url, records.len());
        Ok(dedupe::dedupe(records))
    }

    /// Store catalog listings, which carry no profiles
    pub async fn persist_catalog(
        &self,
        listings: Vec<RawListingRecord>,
        sink: &dyn ResultSink,
    ) -> CatalogReport {
        let records: Vec<VenueRecord> = listings
            .into_iter()
            .map(|listing| VenueRecord::from_harvest(&HarvestedVenue::from(listing)))
            .collect();
        let persistence = sink::persist(sink, &records, self.config.sink_chunk_size).await;
        CatalogReport::new(records.len(), persistence)
    }

    fn check(&self, request: BatchRequest) -> Result<(), InvocationReport> {
        if request.max_regions == 0 {
            return Err(self.failure(
                request,
                ScrapeError::InvalidRequest("max_regions must be at least 1".into()),
            ));
        }
        Ok(())
    }

    fn failure(&self, request: BatchRequest, error: ScrapeError) -> InvocationReport {
        InvocationReport::failure(
            request.start_index,
            request.max_regions,
            self.regions.len(),
            error,
        )
    }
}

/// Scheme and host of the listing template, e.g. "https://www.theknot.com/"
fn site_root(template: &str) -> Option<Url> {
    let url = Url::parse(template).ok()?;
    url.join("/").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DelayRange;
    use crate::crawlers::PageSession;
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Serves fixed pages; no next links are followed
    struct StaticSession {
        pages: HashMap<String, String>,
        current: Option<String>,
    }

    #[async_trait]
    impl PageSession for StaticSession {
        fn label(&self) -> &'static str {
            "static"
        }

        async fn load(&mut self, url: &str) -> Result<String, ScrapeError> {
            let html = self.pages.get(url).cloned().ok_or(ScrapeError::Http {
                url: url.to_string(),
                status: 404,
            })?;
            self.current = Some(url.to_string());
            Ok(html)
        }

        async fn advance(&mut self) -> Result<Option<String>, ScrapeError> {
            Ok(None)
        }

        fn current_url(&self) -> Option<&str> {
            self.current.as_deref()
        }

        async fn close(&mut self) {}
    }

    fn harvester() -> Harvester {
        let config = HarvestConfig {
            pre_nav_delay: DelayRange::none(),
            post_nav_delay: DelayRange::none(),
            profiles_per_region: 0,
            listing_url_template: "https://dir.example/venues-{slug}".to_string(),
            ..HarvestConfig::default()
        };
        Harvester::new(config).with_regions(regions::us_states().into_iter().take(3).collect())
    }

    #[test]
    fn test_configured_link_exclusions_apply_to_listings() {
        let card = r#"<div class="vendor-card"><a href="/sponsored/oak-hall">Oak Hall</a> 4.0(8) Mobile, AL</div>"#;

        let records = harvester().listing.extract(card);
        assert!(!records[0].synthesized);
        assert_eq!(records[0].detail_url, "https://dir.example/sponsored/oak-hall");

        let config = HarvestConfig {
            link_exclude_patterns: vec!["/sponsored/".to_string()],
            listing_url_template: "https://dir.example/venues-{slug}".to_string(),
            ..HarvestConfig::default()
        };
        let records = Harvester::new(config).listing.extract(card);
        assert!(records[0].synthesized);
        assert_eq!(records[0].detail_url, "https://dir.example/marketplace/oak-hall-mobile-al");
    }

    #[test]
    fn test_site_root() {
        let root = site_root("https://www.theknot.com/marketplace/wedding-reception-venues-{slug}");
        assert_eq!(root.map(String::from), Some("https://www.theknot.com/".to_string()));
        assert!(site_root("not a url {slug}").is_none());
    }

    #[tokio::test]
    async fn test_run_with_persists_and_reports() {
        let harvester = harvester();
        let page = r#"<div class="vendor-card">Lakeview Barn 4.5(120) Springfield, IL</div>
                      <div class="vendor-card">Oak Hall 4.0(8) Mobile, AL</div>"#;
        let session = StaticSession {
            pages: HashMap::from([(
                "https://dir.example/venues-alabama".to_string(),
                page.to_string(),
            )]),
            current: None,
        };
        let mut sessions = Sessions::new(Box::new(session), None);
        let sink = MemorySink::new();

        let report = harvester
            .run_with(&mut sessions, BatchRequest::new(0, 2), &sink)
            .await;

        assert!(report.success);
        assert_eq!(report.venues_scraped, 2);
        assert_eq!(report.batch_info.current_batch, "0-2");
        assert_eq!(report.batch_info.next_start_index, Some(2));
        assert_eq!(report.summary.regions_processed, 2);
        assert_eq!(report.summary.records_per_region, 1);
        assert_eq!(report.persistence.len(), 1);
        assert_eq!(sink.len().await, 2);

        let stored = sink.records().await;
        assert!(stored.iter().all(|r| r.synthesized));
        assert!(
            stored
                .iter()
                .any(|r| r.detail_url == "https://dir.example/marketplace/oak-hall-mobile-al")
        );
    }

    #[tokio::test]
    async fn test_run_with_nothing_loaded_fails() {
        let harvester = harvester();
        let session = StaticSession {
            pages: HashMap::new(),
            current: None,
        };
        let mut sessions = Sessions::new(Box::new(session), None);
        let sink = MemorySink::new();

        let report = harvester
            .run_with(&mut sessions, BatchRequest::new(0, 3), &sink)
            .await;

        assert!(!report.success);
        assert!(report.batch_info.is_complete);
        assert_eq!(report.batch_info.next_start_index, None);
        assert!(sink.is_empty().await);
    }

    /// Refuses every sub-batch
    struct RejectingSink;

    #[async_trait]
    impl ResultSink for RejectingSink {
        async fn upsert(&self, _records: &[VenueRecord]) -> Result<usize, SinkError> {
            Err(SinkError::Rejected {
                reason: "read-only".into(),
            })
        }
    }

    fn catalog_listings() -> Vec<RawListingRecord> {
        let page = r#"<div class="vendor-card">Lakeview Barn 4.5(120) Springfield, IL</div>
                      <div class="vendor-card">Oak Hall 4.0(8) Mobile, AL</div>"#;
        harvester().listing.extract(page)
    }

    #[tokio::test]
    async fn test_persist_catalog_reports_sink_failures() {
        let harvester = harvester();

        let report = harvester
            .persist_catalog(catalog_listings(), &RejectingSink)
            .await;
        assert!(!report.success);
        assert_eq!(report.venues_scraped, 2);
        assert_eq!(report.stored, 0);

        let sink = MemorySink::new();
        let report = harvester.persist_catalog(catalog_listings(), &sink).await;
        assert!(report.success);
        assert_eq!(report.stored, 2);
        assert_eq!(sink.len().await, 2);
    }

    #[tokio::test]
    async fn test_invalid_request() {
        let sink = MemorySink::new();
        let report = harvester().run(BatchRequest::new(0, 0), &sink).await;
        assert!(!report.success);
        assert!(report.error.unwrap().contains("max_regions"));
    }
}
