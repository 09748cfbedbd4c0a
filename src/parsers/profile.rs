use crate::error::ScrapeError;
use crate::filter::LinkFilter;
use crate::parsers::{Document, Probe, first_match, html};
use crate::results::{
    AmenityFlags, CapacityInfo, ContactInfo, Media, Review, ReviewSummary, ServiceFlags,
    SettingFlags, VenueProfile,
};
use crate::utils::{parse_count, parse_rating};
use chrono::{DateTime, Utc};
use scraper::ElementRef;
use std::collections::HashSet;
use url::Url;

/// Reviews beyond this many review elements are not read
pub const MAX_REVIEWS: usize = 10;

pub const NAME_PROBES: &[Probe] = &[
    Probe::Text(r#"h1[data-testid*="vendor-name"]"#),
    Probe::Text(r#"[class*="vendor-name"] h1"#),
    Probe::Text("h1"),
    Probe::Meta("og:title"),
    Probe::JsonLd(&["name"]),
];

pub const TAGLINE_PROBES: &[Probe] = &[
    Probe::Text(r#"[data-testid*="tagline"]"#),
    Probe::Text(r#"[class*="tagline"]"#),
    Probe::Text(r#"[class*="Tagline"]"#),
    Probe::Text("h1 + p"),
];

pub const DESCRIPTION_PROBES: &[Probe] = &[
    Probe::Block(r#"[data-testid*="about"]"#),
    Probe::Block(r#"[class*="about"] [class*="description"]"#),
    Probe::Block(r#"[class*="description"]"#),
    Probe::Block("section#about"),
    Probe::Meta("description"),
    Probe::Meta("og:description"),
    Probe::JsonLd(&["description"]),
];

pub const ADDRESS_PROBES: &[Probe] = &[
    Probe::Text(r#"[data-testid*="address"]"#),
    Probe::Text("address"),
    Probe::Text(r#"[class*="address"]"#),
    Probe::JsonLd(&["address", "streetAddress"]),
];

pub const NEIGHBORHOOD_PROBES: &[Probe] = &[
    Probe::Text(r#"[data-testid*="neighborhood"]"#),
    Probe::Text(r#"[class*="neighborhood"]"#),
];

pub const LANGUAGE_PROBES: &[Probe] = &[
    Probe::Text(r#"[data-testid*="languages"]"#),
    Probe::Text(r#"[class*="languages"]"#),
    Probe::Pattern(r"Languages?:?\s+([A-Z][a-z]+(?:\s*,\s*[A-Z][a-z]+)*)"),
];

pub const PRICE_PROBES: &[Probe] = &[
    Probe::Text(r#"[data-testid*="pricing"]"#),
    Probe::Text(r#"[class*="price-range"]"#),
    Probe::Text(r#"[class*="pricing"]"#),
    Probe::JsonLd(&["priceRange"]),
    Probe::Pattern(r"(\$\s?\d[\d,]*(?:\s*[-–]\s*\$\s?\d[\d,]*)?\+?)"),
];

pub const GUEST_RANGE_PROBES: &[Probe] = &[
    Probe::Text(r#"[data-testid*="guest-capacity"]"#),
    Probe::Text(r#"[class*="guest-capacity"]"#),
    Probe::Text(r#"[class*="capacity"]"#),
    Probe::Pattern(r"(?i)((?:up to\s+)?\d[\d,]*(?:\s*(?:-|–|to)\s*\d[\d,]*)?\+?\s*guests)"),
];

pub const RATING_PROBES: &[Probe] = &[
    Probe::Attr(r#"[itemprop="ratingValue"]"#, "content"),
    Probe::Text(r#"[class*="rating-value"]"#),
    Probe::JsonLd(&["aggregateRating", "ratingValue"]),
    Probe::Pattern(r"(\d(?:\.\d+)?)\s+out of 5"),
];

pub const REVIEW_COUNT_PROBES: &[Probe] = &[
    Probe::Attr(r#"[itemprop="reviewCount"]"#, "content"),
    Probe::Text(r#"[class*="review-count"]"#),
    Probe::JsonLd(&["aggregateRating", "reviewCount"]),
    Probe::Pattern(r"(?i)(\d[\d,]*)\s+reviews"),
];

pub const TEAM_NAME_PROBES: &[Probe] = &[
    Probe::Text(r#"[data-testid*="team-member-name"]"#),
    Probe::Text(r#"[class*="team-name"]"#),
    Probe::Text(r#"[class*="team"] h3"#),
    Probe::Text(r#"[class*="team"] h4"#),
];

pub const TEAM_ROLE_PROBES: &[Probe] = &[
    Probe::Text(r#"[data-testid*="team-member-role"]"#),
    Probe::Text(r#"[class*="team-role"]"#),
    Probe::Text(r#"[class*="team"] [class*="role"]"#),
];

pub const PHONE_PROBES: &[Probe] = &[
    Probe::Attr(r#"a[href^="tel:"]"#, "href"),
    Probe::JsonLd(&["telephone"]),
    Probe::Pattern(r"(\(?\d{3}\)?[\s.-]?\d{3}[\s.-]\d{4})"),
];

pub const EMAIL_PROBES: &[Probe] = &[
    Probe::Attr(r#"a[href^="mailto:"]"#, "href"),
    Probe::JsonLd(&["email"]),
];

pub const WEBSITE_PROBES: &[Probe] = &[
    Probe::Attr(r#"a[data-testid*="website"]"#, "href"),
    Probe::Attr(r#"a[class*="website"]"#, "href"),
    Probe::JsonLd(&["sameAs"]),
];

/// Lists whose items feed keyword flag detection
const AMENITY_LISTS: [&str; 6] = [
    r#"[class*="amenit"] li"#,
    r#"[class*="Amenit"] li"#,
    r#"[data-testid*="amenit"] li"#,
    r#"[class*="feature"] li"#,
    r#"[class*="setting"] li"#,
    r#"[class*="detail"] li"#,
];

const SERVICE_LISTS: [&str; 3] = [
    r#"[data-testid*="service"] li"#,
    r#"[class*="service"] li"#,
    r#"[class*="Service"] li"#,
];

const AWARD_LISTS: [&str; 3] = [
    r#"[class*="award"] li"#,
    r#"[class*="award"] span"#,
    r#"[class*="badge"]"#,
];

const REVIEW_CONTAINERS: [&str; 5] = [
    r#"[data-testid*="review-card"]"#,
    r#"[class*="review-card"]"#,
    r#"[class*="ReviewCard"]"#,
    r#"[itemprop="review"]"#,
    r#"[class*="review-item"]"#,
];

const REVIEW_AUTHOR: [&str; 4] = [
    r#"[itemprop="author"]"#,
    r#"[class*="author"]"#,
    r#"[class*="reviewer"]"#,
    "h4",
];

const REVIEW_BODY: [&str; 4] = [
    r#"[itemprop="reviewBody"]"#,
    r#"[class*="review-body"]"#,
    r#"[class*="review-text"]"#,
    "p",
];

const GALLERY_IMAGES: [&str; 3] = [
    r#"[class*="gallery"] img"#,
    r#"[class*="photo"] img"#,
    r#"[data-testid*="gallery"] img"#,
];

const VIDEO_SOURCES: [(&str, &str); 4] = [
    ("video[src]", "src"),
    ("video source[src]", "src"),
    (r#"iframe[src*="youtube"]"#, "src"),
    (r#"iframe[src*="vimeo"]"#, "src"),
];

/// Builds a `VenueProfile` from a venue's detail page
#[derive(Debug, Clone, Default)]
pub struct ProfileExtractor {
    links: LinkFilter,
}

impl ProfileExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract a profile; fails only when the page has no venue name at all
    pub fn extract(&self, raw: &str) -> Result<VenueProfile, ScrapeError> {
        self.extract_page(raw, None)
    }

    /// Extract and stamp the profile with its source URL and time
    pub fn extract_for(
        &self,
        raw: &str,
        source_url: &str,
        scraped_at: DateTime<Utc>,
    ) -> Result<VenueProfile, ScrapeError> {
        let base = Url::parse(source_url).ok();
        let profile = self.extract_page(raw, base.as_ref())?;
        Ok(profile.stamped(source_url, scraped_at))
    }

    fn extract_page(&self, raw: &str, base: Option<&Url>) -> Result<VenueProfile, ScrapeError> {
        let doc = Document::parse(raw);
        let name = first_match(&doc, NAME_PROBES).ok_or(ScrapeError::ProfileNotFound)?;

        let field = |probes: &[Probe]| first_match(&doc, probes).unwrap_or_default();

        let amenity_text = collect_lists(&doc, &AMENITY_LISTS);
        let service_offerings = first_list(&doc, &SERVICE_LISTS);
        let mut service_text = amenity_text.clone();
        service_text.extend(service_offerings.iter().cloned());

        let guest_range = field(GUEST_RANGE_PROBES);
        let capacity = CapacityInfo {
            max_capacity: max_number(&guest_range),
            guest_range,
        };

        let profile = VenueProfile {
            name,
            tagline: field(TAGLINE_PROBES),
            description: field(DESCRIPTION_PROBES),
            address: field(ADDRESS_PROBES),
            neighborhood: field(NEIGHBORHOOD_PROBES),
            languages: split_list(&field(LANGUAGE_PROBES)),
            price_range: field(PRICE_PROBES),
            capacity,
            amenities: AmenityFlags::detect(&amenity_text),
            settings: SettingFlags::detect(&amenity_text),
            services: ServiceFlags::detect(&service_text),
            service_offerings,
            reviews: ReviewSummary {
                rating: first_match(&doc, RATING_PROBES).and_then(|r| parse_rating(&r)),
                count: first_match(&doc, REVIEW_COUNT_PROBES).and_then(|c| parse_count(&c)),
                individual_reviews: individual_reviews(&doc),
            },
            contact: ContactInfo {
                team_name: field(TEAM_NAME_PROBES),
                team_role: field(TEAM_ROLE_PROBES),
                phone: strip_scheme(&field(PHONE_PROBES), "tel:"),
                email: strip_scheme(&field(EMAIL_PROBES), "mailto:"),
                website: field(WEBSITE_PROBES),
            },
            awards: first_list(&doc, &AWARD_LISTS),
            media: self.media(&doc, base),
            metadata: Default::default(),
        };

        ::log::debug!(
            "Extracted profile for {} ({} amenity entries, {} reviews)",
            profile.name,
            amenity_text.len(),
            profile.reviews.individual_reviews.len()
        );
        Ok(profile)
    }

    fn media(&self, doc: &Document, base: Option<&Url>) -> Media {
        let mut images: Vec<String> = Vec::new();
        for css in GALLERY_IMAGES {
            let Some(sel) = html::selector(css) else {
                continue;
            };
            for img in doc.html().select(&sel) {
                let attrs = img.value();
                let Some(src) = attrs.attr("src").or_else(|| attrs.attr("data-src")) else {
                    continue;
                };
                if let Some(url) = self.links.accept_image(src, base) {
                    push_unique(&mut images, url);
                }
            }
        }
        if let Some(og) = Probe::Meta("og:image").run(doc) {
            if let Some(url) = self.links.accept_image(&og, base) {
                push_unique(&mut images, url);
            }
        }

        let mut videos = Vec::new();
        for (css, attr) in VIDEO_SOURCES {
            let Some(sel) = html::selector(css) else {
                continue;
            };
            for element in doc.html().select(&sel) {
                if let Some(url) = element
                    .value()
                    .attr(attr)
                    .and_then(|src| self.links.accept_image(src, base))
                {
                    push_unique(&mut videos, url);
                }
            }
        }

        Media { images, videos }
    }
}

/// Review cards from the first container selector that matches anything.
///
/// Only the first `MAX_REVIEWS` cards are read; cards without both an author
/// and a body are then dropped.
fn individual_reviews(doc: &Document) -> Vec<Review> {
    for css in REVIEW_CONTAINERS {
        let Some(sel) = html::selector(css) else {
            continue;
        };
        let mut outer = HashSet::new();
        let cards: Vec<ElementRef> = doc
            .html()
            .select(&sel)
            .filter(|card| {
                let nested = card.ancestors().any(|a| outer.contains(&a.id()));
                if !nested {
                    outer.insert(card.id());
                }
                !nested
            })
            .take(MAX_REVIEWS)
            .collect();
        if cards.is_empty() {
            continue;
        }
        return cards.iter().filter_map(review_from_card).collect();
    }
    Vec::new()
}

fn review_from_card(card: &ElementRef) -> Option<Review> {
    let author = first_within(card, &REVIEW_AUTHOR)?;
    let body = first_within(card, &REVIEW_BODY)?;
    if author == body {
        return None;
    }

    let rating = html::selector(r#"[itemprop="ratingValue"]"#)
        .and_then(|sel| {
            card.select(&sel).find_map(|e| {
                e.value()
                    .attr("content")
                    .map(|c| c.to_string())
                    .or_else(|| Some(html::element_text(&e)))
            })
        })
        .and_then(|r| parse_rating(&r));
    let date = html::selector("time").and_then(|sel| {
        card.select(&sel).find_map(|e| {
            e.value()
                .attr("datetime")
                .map(|d| d.to_string())
                .or_else(|| Some(html::element_text(&e)).filter(|t| !t.is_empty()))
        })
    });

    Some(Review {
        author,
        body,
        rating,
        date,
    })
}

/// First non-empty text inside `root` for the selectors, tried in order
fn first_within(root: &ElementRef, selectors: &[&str]) -> Option<String> {
    selectors.iter().find_map(|css| {
        let sel = html::selector(css)?;
        root.select(&sel)
            .map(|e| html::element_text(&e))
            .find(|t| !t.is_empty())
    })
}

/// Items of every list selector, in order, without repeats
fn collect_lists(doc: &Document, selectors: &[&str]) -> Vec<String> {
    let mut items = Vec::new();
    for css in selectors {
        for item in html::all_texts(doc.html(), css) {
            push_unique(&mut items, item);
        }
    }
    items
}

/// Items of the first list selector that matches anything
fn first_list(doc: &Document, selectors: &[&str]) -> Vec<String> {
    selectors
        .iter()
        .map(|css| {
            let mut items = Vec::new();
            for item in html::all_texts(doc.html(), css) {
                push_unique(&mut items, item);
            }
            items
        })
        .find(|items| !items.is_empty())
        .unwrap_or_default()
}

fn push_unique(items: &mut Vec<String>, item: String) {
    if !items.contains(&item) {
        items.push(item);
    }
}

/// "English, Spanish" -> ["English", "Spanish"]
fn split_list(text: &str) -> Vec<String> {
    text.split([',', '/', ';'])
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

fn strip_scheme(value: &str, scheme: &str) -> String {
    value
        .strip_prefix(scheme)
        .unwrap_or(value)
        .trim()
        .to_string()
}

/// Largest number mentioned in the text, e.g. 200 for "50-200 guests"
fn max_number(text: &str) -> Option<u32> {
    text.split(|c: char| !(c.is_ascii_digit() || c == ','))
        .filter_map(parse_count)
        .max()
}
