use crate::config::HarvestConfig;
use crate::crawlers::crawler::{PageSession, Sessions};
use crate::crawlers::pagination::{PaginationOutcome, paginate};
use crate::dedupe::dedupe;
use crate::error::ScrapeError;
use crate::parsers::{ListingExtractor, ProfileExtractor};
use crate::regions::Region;
use crate::results::{HarvestedVenue, RawListingRecord, VenueProfile};
use chrono::Utc;
use std::time::Duration;
use tokio::time::Instant;

/// Which slice of the region list one invocation should cover
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchRequest {
    pub start_index: usize,
    pub max_regions: usize,
}

impl BatchRequest {
    pub fn new(start_index: usize, max_regions: usize) -> Self {
        Self {
            start_index,
            max_regions,
        }
    }
}

/// Progress of a batch while it runs
#[derive(Debug, Clone)]
pub struct ScrapeBatchState {
    pub start_index: usize,
    pub regions_per_call: usize,
    pub started_at: Instant,
    pub venues: Vec<HarvestedVenue>,
    pub regions_processed: usize,
    pub regions_failed: usize,
    pub pages_loaded: usize,
}

impl ScrapeBatchState {
    pub fn new(start_index: usize, regions_per_call: usize) -> Self {
        Self {
            start_index,
            regions_per_call,
            started_at: Instant::now(),
            venues: Vec::new(),
            regions_processed: 0,
            regions_failed: 0,
            pages_loaded: 0,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// What one batch produced and where the next one should start
#[derive(Debug, Clone)]
pub struct BatchResult {
    /// Deduplicated across every region in the batch
    pub venues: Vec<HarvestedVenue>,
    pub start_index: usize,
    /// Exclusive end of the planned range
    pub end_index: usize,
    pub next_start_index: usize,
    pub is_complete: bool,
    pub total_regions: usize,
    pub regions_processed: usize,
    pub regions_failed: usize,
    pub pages_loaded: usize,
    /// True when the deadline stopped the batch early
    pub deadline_hit: bool,
}

impl BatchResult {
    /// Regions were attempted and not one page came back from any session
    pub fn nothing_loaded(&self) -> bool {
        self.regions_processed > 0 && self.pages_loaded == 0
    }
}

/// Walks a slice of regions through pagination and profile enrichment
pub struct RegionIterator<'a> {
    regions: &'a [Region],
    config: &'a HarvestConfig,
    listing: &'a ListingExtractor,
    profiles: &'a ProfileExtractor,
}

impl<'a> RegionIterator<'a> {
    pub fn new(
        regions: &'a [Region],
        config: &'a HarvestConfig,
        listing: &'a ListingExtractor,
        profiles: &'a ProfileExtractor,
    ) -> Self {
        Self {
            regions,
            config,
            listing,
            profiles,
        }
    }

    /// Process regions `[start, start + max)` in order until done or `deadline`.
    ///
    /// The deadline is checked before each region, never in the middle of
    /// one. A region that fails contributes nothing and the batch moves on.
    pub async fn run_batch(
        &self,
        sessions: &mut Sessions,
        request: BatchRequest,
        deadline: Instant,
    ) -> Result<BatchResult, ScrapeError> {
        if request.max_regions == 0 {
            return Err(ScrapeError::InvalidRequest(
                "max_regions must be at least 1".into(),
            ));
        }

        let total = self.regions.len();
        let start = request.start_index.min(total);
        let end = start.saturating_add(request.max_regions).min(total);
        let mut state = ScrapeBatchState::new(start, request.max_regions);
        let mut next_start_index = end;
        let mut deadline_hit = false;

        ::log::info!(
            "Batch covering regions {}..{} of {}",
            start,
            end,
            total
        );

        for index in start..end {
            if Instant::now() >= deadline {
                ::log::warn!(
                    "Deadline reached after {:?}; resuming at region {}",
                    state.elapsed(),
                    index
                );
                next_start_index = index;
                deadline_hit = true;
                break;
            }
            self.process_region(&self.regions[index], sessions, &mut state)
                .await;
            state.regions_processed += 1;
        }

        let venues = dedupe(std::mem::take(&mut state.venues));
        ::log::info!(
            "Batch finished: {} regions, {} venues, {} pages in {:?}",
            state.regions_processed,
            venues.len(),
            state.pages_loaded,
            state.elapsed()
        );

        Ok(BatchResult {
            venues,
            start_index: start,
            end_index: end,
            next_start_index,
            is_complete: next_start_index >= total,
            total_regions: total,
            regions_processed: state.regions_processed,
            regions_failed: state.regions_failed,
            pages_loaded: state.pages_loaded,
            deadline_hit,
        })
    }

    /// Paginate one region, falling back to the secondary session if needed
    async fn process_region(
        &self,
        region: &Region,
        sessions: &mut Sessions,
        state: &mut ScrapeBatchState,
    ) {
        let url = self.config.listing_url(region);
        ::log::info!("Region {} ({}): {}", region.index, region.name, url);

        match self.walk_region(sessions.primary.as_mut(), &url).await {
            Ok(outcome) => {
                let venues = self.enrich(sessions.primary.as_mut(), outcome, state).await;
                state.venues.extend(venues);
                return;
            }
            Err(e) => ::log::warn!(
                "[{}] could not load {}: {}",
                sessions.primary.label(),
                region.name,
                e
            ),
        }

        let Some(fallback) = sessions.fallback.as_mut() else {
            state.regions_failed += 1;
            return;
        };
        match self.walk_region(fallback.as_mut(), &url).await {
            Ok(outcome) => {
                let venues = self.enrich(fallback.as_mut(), outcome, state).await;
                state.venues.extend(venues);
            }
            Err(e) => {
                ::log::warn!("[{}] could not load {}: {}", fallback.label(), region.name, e);
                state.regions_failed += 1;
            }
        }
    }

    async fn walk_region(
        &self,
        session: &mut dyn PageSession,
        url: &str,
    ) -> Result<PaginationOutcome, ScrapeError> {
        paginate(
            session,
            self.listing,
            url,
            self.config.per_region_cap,
            self.config.max_pages_per_region,
        )
        .await
    }

    /// Attach profiles to the first few records that have a real detail URL
    async fn enrich(
        &self,
        session: &mut dyn PageSession,
        outcome: PaginationOutcome,
        state: &mut ScrapeBatchState,
    ) -> Vec<HarvestedVenue> {
        state.pages_loaded += outcome.pages_loaded;

        let mut attempts = 0;
        let mut venues = Vec::with_capacity(outcome.records.len());
        for record in outcome.records {
            let mut venue = HarvestedVenue::from(record);
            if attempts < self.config.profiles_per_region && !venue.listing.synthesized {
                attempts += 1;
                venue.profile = self.profile_for(session, &venue.listing, state).await;
            }
            venues.push(venue);
        }
        venues
    }

    async fn profile_for(
        &self,
        session: &mut dyn PageSession,
        listing: &RawListingRecord,
        state: &mut ScrapeBatchState,
    ) -> Option<VenueProfile> {
        let html = match session.load(&listing.detail_url).await {
            Ok(html) => html,
            Err(e) => {
                ::log::warn!("Skipping profile of {}: {}", listing.name, e);
                return None;
            }
        };
        state.pages_loaded += 1;

        match self
            .profiles
            .extract_for(&html, &listing.detail_url, Utc::now())
        {
            Ok(profile) => Some(profile),
            Err(e) => {
                ::log::warn!("No profile for {}: {}", listing.name, e);
                None
            }
        }
    }
}
