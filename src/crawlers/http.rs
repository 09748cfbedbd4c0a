use crate::config::{DelayRange, HarvestConfig};
use crate::crawlers::crawler::PageSession;
use crate::crawlers::fingerprint::{Fingerprint, pause};
use crate::crawlers::pagination::find_next_link;
use crate::error::ScrapeError;
use crate::parsers::ListingExtractor;
use crate::results::RawListingRecord;
use async_trait::async_trait;
use reqwest::redirect::Policy;
use std::time::Duration;
use url::Url;

const MAX_REDIRECTS: usize = 8;

/// Plain HTTP fetcher used when the browser cannot load a page
#[derive(Debug, Clone)]
pub struct FallbackFetcher {
    client: reqwest::Client,
    timeout: Duration,
    pre_delay: DelayRange,
}

impl FallbackFetcher {
    pub fn new(config: &HarvestConfig) -> Result<Self, ScrapeError> {
        let timeout = config.navigation_timeout();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(Policy::limited(MAX_REDIRECTS))
            .build()?;
        Ok(Self {
            client,
            timeout,
            pre_delay: config.pre_nav_delay,
        })
    }

    /// GET a page with a freshly drawn browser identity
    pub async fn fetch(&self, url: &str) -> Result<String, ScrapeError> {
        pause(self.pre_delay).await;

        let mut request = self.client.get(url);
        for (name, value) in Fingerprint::random().headers() {
            request = request.header(name, value);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ScrapeError::NavigationTimeout {
                    url: url.to_string(),
                    timeout_ms: self.timeout.as_millis() as u64,
                }
            } else {
                ScrapeError::Request(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response.text().await?;
        ::log::debug!("Fetched {} ({} bytes)", url, body.len());
        Ok(body)
    }

    /// Try catalog URLs in order and return the first that yields listings
    pub async fn fetch_catalog(
        &self,
        candidates: &[String],
        extractor: &ListingExtractor,
    ) -> Result<(String, Vec<RawListingRecord>), ScrapeError> {
        let mut session = HttpSession::new(self.clone());
        fetch_catalog_with(&mut session, candidates, extractor).await
    }
}

/// Load each candidate on `session` until one yields at least one listing.
///
/// Candidates that fail to load or carry no listings are skipped.
pub async fn fetch_catalog_with(
    session: &mut dyn PageSession,
    candidates: &[String],
    extractor: &ListingExtractor,
) -> Result<(String, Vec<RawListingRecord>), ScrapeError> {
    for url in candidates {
        let html = match session.load(url).await {
            Ok(html) => html,
            Err(e) => {
                ::log::warn!("Catalog candidate {} failed: {}", url, e);
                continue;
            }
        };
        let page_url = Url::parse(url).ok();
        let records = extractor.extract_page(&html, page_url.as_ref());
        if records.is_empty() {
            ::log::info!("Catalog candidate {} had no listings", url);
            continue;
        }
        ::log::info!("Catalog {} yielded {} listings", url, records.len());
        return Ok((url.clone(), records));
    }
    Err(ScrapeError::CatalogExhausted {
        tried: candidates.len(),
    })
}

/// Page session backed by the fallback fetcher; follows next links only
pub struct HttpSession {
    fetcher: FallbackFetcher,
    current: Option<String>,
    html: Option<String>,
}

impl HttpSession {
    pub fn new(fetcher: FallbackFetcher) -> Self {
        Self {
            fetcher,
            current: None,
            html: None,
        }
    }
}

#[async_trait]
impl PageSession for HttpSession {
    fn label(&self) -> &'static str {
        "http"
    }

    async fn load(&mut self, url: &str) -> Result<String, ScrapeError> {
        let html = self.fetcher.fetch(url).await?;
        self.current = Some(url.to_string());
        self.html = Some(html.clone());
        Ok(html)
    }

    async fn advance(&mut self) -> Result<Option<String>, ScrapeError> {
        let (Some(current), Some(html)) = (self.current.as_deref(), self.html.as_deref()) else {
            return Err(ScrapeError::NoPageLoaded);
        };
        let next = Url::parse(current)
            .ok()
            .and_then(|base| find_next_link(html, &base));
        match next {
            Some(next) => self.load(next.as_str()).await.map(Some),
            None => Ok(None),
        }
    }

    fn current_url(&self) -> Option<&str> {
        self.current.as_deref()
    }

    async fn close(&mut self) {
        self.current = None;
        self.html = None;
    }
}
