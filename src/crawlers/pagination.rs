use crate::crawlers::crawler::PageSession;
use crate::error::ScrapeError;
use crate::filter::{normalize_url, resolve};
use crate::parsers::{ListingExtractor, html};
use crate::results::RawListingRecord;
use scraper::{ElementRef, Html};
use url::Url;

/// Anchors that announce themselves as the next page, most explicit first
const NEXT_SELECTORS: [&str; 8] = [
    r#"a[rel~="next"]"#,
    r#"link[rel~="next"]"#,
    r#"a[aria-label*="Next"]"#,
    r#"a[aria-label*="next"]"#,
    r#"a[data-testid*="next"]"#,
    r#"[class*="pagination"] a[class*="next"]"#,
    r#"a[class*="next"]"#,
    r#"a[class*="Next"]"#,
];

/// Link texts that mean "next page" when nothing is labelled
const NEXT_TEXTS: [&str; 8] = ["next", "next page", "→", ">", "›", "»", ">>", "next ›"];

/// Why pagination of a region stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The per-region record cap was reached
    CapReached,
    /// The page limit was reached
    MaxPages,
    /// The last page carried no next control
    NoNextControl,
    /// A page produced no records
    EmptyPage,
    /// Following the next control failed
    NavigationFailed,
}

/// Records gathered for one region
#[derive(Debug, Clone)]
pub struct PaginationOutcome {
    pub records: Vec<RawListingRecord>,
    pub pages_loaded: usize,
    pub stop: StopReason,
}

/// Locate the next-page link in a listing page.
///
/// Disabled controls and links back to the current page are ignored, as
/// are links to other hosts.
pub fn find_next_link(raw: &str, current: &Url) -> Option<Url> {
    let doc = Html::parse_document(raw);
    let current_page = normalize_url(current);

    let candidate = |element: ElementRef| -> Option<Url> {
        if is_disabled(&element) {
            return None;
        }
        let url = resolve(element.value().attr("href")?, Some(current))?;
        let url = normalize_url(&url);
        (url != current_page && url.host_str() == current.host_str()).then_some(url)
    };

    for css in NEXT_SELECTORS {
        let Some(sel) = html::selector(css) else {
            continue;
        };
        if let Some(url) = doc.select(&sel).find_map(candidate) {
            return Some(url);
        }
    }

    let anchors = html::selector("a[href]")?;
    doc.select(&anchors)
        .filter(|a| {
            let text = html::element_text(a).to_lowercase();
            NEXT_TEXTS.contains(&text.as_str()) || text.starts_with("next ")
        })
        .find_map(candidate)
}

fn is_disabled(element: &ElementRef) -> bool {
    let attrs = element.value();
    attrs.attr("disabled").is_some()
        || attrs.attr("aria-disabled") == Some("true")
        || attrs
            .attr("class")
            .is_some_and(|c| c.to_lowercase().contains("disabled"))
}

/// Walk a region's listing pages until the cap, the page limit or a dead end.
///
/// Fails only when the first page cannot be loaded; later navigation
/// failures end pagination with what was collected so far. The records
/// returned never exceed `per_region_cap`.
pub async fn paginate(
    session: &mut dyn PageSession,
    extractor: &ListingExtractor,
    region_url: &str,
    per_region_cap: usize,
    max_pages: usize,
) -> Result<PaginationOutcome, ScrapeError> {
    let html = session.load(region_url).await?;
    let mut pages_loaded = 1;
    let mut page = extract(session, extractor, &html);
    let mut records: Vec<RawListingRecord> = Vec::new();

    let stop = loop {
        ::log::debug!(
            "[{}] page {} of {} yielded {} records",
            session.label(),
            pages_loaded,
            region_url,
            page.len()
        );
        if page.is_empty() {
            break StopReason::EmptyPage;
        }
        records.append(&mut page);

        if records.len() >= per_region_cap {
            records.truncate(per_region_cap);
            break StopReason::CapReached;
        }
        if pages_loaded >= max_pages {
            break StopReason::MaxPages;
        }

        match session.advance().await {
            Ok(Some(html)) => {
                pages_loaded += 1;
                page = extract(session, extractor, &html);
            }
            Ok(None) => break StopReason::NoNextControl,
            Err(e) => {
                ::log::warn!(
                    "[{}] stopping pagination of {}: {}",
                    session.label(),
                    region_url,
                    e
                );
                break StopReason::NavigationFailed;
            }
        }
    };

    ::log::info!(
        "[{}] {} records from {} pages of {} ({:?})",
        session.label(),
        records.len(),
        pages_loaded,
        region_url,
        stop
    );
    Ok(PaginationOutcome {
        records,
        pages_loaded,
        stop,
    })
}

fn extract(
    session: &dyn PageSession,
    extractor: &ListingExtractor,
    html: &str,
) -> Vec<RawListingRecord> {
    let page_url = session.current_url().and_then(|u| Url::parse(u).ok());
    extractor.extract_page(html, page_url.as_ref())
}
