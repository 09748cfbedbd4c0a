use crate::filter::LinkFilter;
use crate::parsers::{html, text};
use crate::results::{Location, RawListingRecord};
use crate::utils::{parse_count, parse_rating, slugify};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

/// Cards with less text than this are layout fragments
const MIN_CARD_TEXT: usize = 10;
const MAX_NAME_LEN: usize = 150;
/// How far above a heading to look for the card that owns it
const MAX_HEADING_CLIMB: usize = 4;
/// Path used when a detail URL has to be guessed
const SYNTHESIZED_PREFIX: &str = "/marketplace/";

/// "4.5(120)" or "4.5 (1,204)"
static RATING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)\s*\(\s*(\d[\d,]*)\s*\)").expect("valid rating regex")
});

/// "Springfield, IL", tolerating text glued on after the state code
static CITY_STATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([A-Z][A-Za-z.'\-]*(?:\s+[A-Z][A-Za-z.'\-]*){0,3}),\s*([A-Z]{2})(?:[^A-Za-z]|[A-Z][a-z]|$)")
        .expect("valid location regex")
});

static PRICE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:starting at\s+|from\s+)?\$\s?\d[\d,]*(?:\s*[-–]\s*\$\s?\d[\d,]*)?\+?")
        .expect("valid price regex")
});

static CAPACITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:up to\s+)?\d[\d,]*(?:\s*(?:-|–|to)\s*\d[\d,]*)?\+?\s*guests")
        .expect("valid capacity regex")
});

static CARD: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(
        r#"[class*="vendor-card"], [class*="VendorCard"], [class*="vendorCard"],
           [data-testid*="vendor-card"], [class*="listing-card"], [class*="ListingCard"],
           [class*="venue-card"], [class*="VenueCard"], [class*="result-card"],
           [class*="storefront-card"]"#,
    )
    .expect("valid card selector")
});

static CARD_NAME: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(
        r#"h2, h3, h4, [class*="name"], [class*="Name"], [class*="title"], [class*="Title"]"#,
    )
    .expect("valid card name selector")
});

static HEADING: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1, h2, h3, h4").expect("valid heading selector"));

static ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid anchor selector"));

static IMAGE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img").expect("valid image selector"));

/// Ways of finding listing cards, in the order they are tried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingStrategy {
    /// JSON-LD objects with a name and an aggregate rating
    StructuredData,
    /// Elements whose class names look like listing cards
    CardClassNames,
    /// Headings whose surrounding block carries a rating
    HeadingText,
}

impl ListingStrategy {
    pub const ORDERED: [ListingStrategy; 3] = [
        ListingStrategy::StructuredData,
        ListingStrategy::CardClassNames,
        ListingStrategy::HeadingText,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ListingStrategy::StructuredData => "structured-data",
            ListingStrategy::CardClassNames => "card-class-names",
            ListingStrategy::HeadingText => "heading-text",
        }
    }
}

/// Fields read off one card or structured-data entity
struct CardFields {
    name: String,
    location: Location,
    rating: f64,
    review_count: u32,
    /// Accepted detail link, if the card had one
    link: Option<String>,
    image_url: Option<String>,
    price_text: Option<String>,
    capacity_text: Option<String>,
    description: Option<String>,
}

/// Turns listing-page HTML into candidate records
#[derive(Debug, Clone)]
pub struct ListingExtractor {
    source_tag: String,
    site_root: Option<Url>,
    links: LinkFilter,
}

impl ListingExtractor {
    pub fn new(source_tag: impl Into<String>) -> Self {
        Self {
            source_tag: source_tag.into(),
            site_root: None,
            links: LinkFilter::default(),
        }
    }

    /// Resolve relative links against, and keep links on, this site
    pub fn with_site_root(mut self, root: Url) -> Self {
        self.links = LinkFilter::for_site(Some(&root));
        self.site_root = Some(root);
        self
    }

    /// Vet detail links with `links` instead of the default filter
    pub fn with_link_filter(mut self, links: LinkFilter) -> Self {
        self.links = links;
        self
    }

    /// Extract records from a listing page with no page URL known
    pub fn extract(&self, raw: &str) -> Vec<RawListingRecord> {
        self.extract_page(raw, None)
    }

    /// Extract records using the first strategy that yields any.
    ///
    /// Results from different strategies are never merged.
    pub fn extract_page(&self, raw: &str, page_url: Option<&Url>) -> Vec<RawListingRecord> {
        let doc = Html::parse_document(raw);
        let base = page_url.or(self.site_root.as_ref());

        for strategy in ListingStrategy::ORDERED {
            let records = self.run_strategy(strategy, &doc, base);
            if !records.is_empty() {
                ::log::debug!(
                    "Listing strategy {} produced {} records",
                    strategy.name(),
                    records.len()
                );
                return records;
            }
        }

        ::log::debug!("No listing strategy matched");
        Vec::new()
    }

    /// Run a single strategy, for callers that need one in isolation
    pub fn run_strategy(
        &self,
        strategy: ListingStrategy,
        doc: &Html,
        base: Option<&Url>,
    ) -> Vec<RawListingRecord> {
        match strategy {
            ListingStrategy::StructuredData => self.from_structured_data(doc, base),
            ListingStrategy::CardClassNames => self.from_card_classes(doc, base),
            ListingStrategy::HeadingText => self.from_headings(doc, base),
        }
    }

    fn from_structured_data(&self, doc: &Html, base: Option<&Url>) -> Vec<RawListingRecord> {
        let blocks = html::json_ld_blocks(doc);
        let mut venues = Vec::new();
        for block in &blocks {
            collect_rated_entities(block, &mut venues);
        }
        venues
            .into_iter()
            .filter_map(|entity| self.structured_record(entity, base))
            .collect()
    }

    fn structured_record(
        &self,
        entity: &Map<String, Value>,
        base: Option<&Url>,
    ) -> Option<RawListingRecord> {
        let name = entity.get("name").and_then(html::value_text)?;
        if name.chars().count() > MAX_NAME_LEN {
            return None;
        }

        let aggregate = entity.get("aggregateRating")?;
        let rating = aggregate
            .get("ratingValue")
            .and_then(html::value_text)
            .and_then(|v| parse_rating(&v))?;
        let review_count = aggregate
            .get("reviewCount")
            .or_else(|| aggregate.get("ratingCount"))
            .and_then(html::value_text)
            .and_then(|v| parse_count(&v))
            .unwrap_or(0);

        let location = structured_location(entity.get("address")).unwrap_or_else(Location::unknown);
        let link = entity
            .get("url")
            .and_then(html::value_text)
            .and_then(|href| self.links.accept_link(&href, base));
        let image_url = entity
            .get("image")
            .and_then(image_value)
            .and_then(|src| self.links.accept_image(&src, base));
        let price_text = entity.get("priceRange").and_then(html::value_text);
        let description = entity
            .get("description")
            .and_then(html::value_text)
            .map(|d| text::clean_block(&d))
            .or_else(|| describe(&name, &location, None, price_text.as_deref()));

        Some(self.assemble(
            CardFields {
                name,
                location,
                rating,
                review_count,
                link,
                image_url,
                price_text,
                capacity_text: None,
                description,
            },
            base,
        ))
    }

    fn from_card_classes(&self, doc: &Html, base: Option<&Url>) -> Vec<RawListingRecord> {
        let mut accepted = HashSet::new();
        let mut records = Vec::new();

        for card in doc.select(&CARD) {
            if card.ancestors().any(|a| accepted.contains(&a.id())) {
                continue;
            }
            if let Some(record) = self.card_record(&card, None, base) {
                accepted.insert(card.id());
                records.push(record);
            }
        }
        records
    }

    fn from_headings(&self, doc: &Html, base: Option<&Url>) -> Vec<RawListingRecord> {
        let mut accepted = HashSet::new();
        let mut records = Vec::new();

        for heading in doc.select(&HEADING) {
            let name = html::element_text(&heading);
            if name.is_empty() || name.chars().count() > MAX_NAME_LEN || RATING.is_match(&name) {
                continue;
            }
            let Some(card) = owning_card(heading) else {
                continue;
            };
            if accepted.contains(&card.id()) || card.ancestors().any(|a| accepted.contains(&a.id()))
            {
                continue;
            }
            if let Some(record) = self.card_record(&card, Some(name), base) {
                accepted.insert(card.id());
                records.push(record);
            }
        }
        records
    }

    /// Validate one card element and build its record
    fn card_record(
        &self,
        card: &ElementRef,
        heading_name: Option<String>,
        base: Option<&Url>,
    ) -> Option<RawListingRecord> {
        let content = html::element_text(card);
        if content.chars().count() < MIN_CARD_TEXT || text::is_boilerplate(&content) {
            return None;
        }

        let mut ratings = RATING.captures_iter(&content);
        let caps = ratings.next()?;
        if ratings.next().is_some() {
            // Several ratings means a wrapper around several cards
            return None;
        }
        let rating_span = caps.get(0)?;
        let rating = parse_rating(caps.get(1)?.as_str())?;
        let review_count = caps
            .get(2)
            .and_then(|m| parse_count(m.as_str()))
            .unwrap_or(0);

        let name = heading_name
            .or_else(|| card_name(card))
            .or_else(|| {
                let before = content[..rating_span.start()].trim();
                (!before.is_empty()).then(|| before.to_string())
            })?;
        if name.chars().count() > MAX_NAME_LEN {
            return None;
        }

        let location = parse_location(&content[rating_span.end()..])
            .or_else(|| parse_location(&content.replacen(&name, " ", 1)))
            .unwrap_or_else(Location::unknown);

        let link = self.card_link(card, base);
        let image_url = card
            .select(&IMAGE)
            .filter_map(|img| {
                let attrs = img.value();
                attrs.attr("src").or_else(|| attrs.attr("data-src"))
            })
            .find_map(|src| self.links.accept_image(src, base));

        let price_text = PRICE.find(&content).map(|m| m.as_str().trim().to_string());
        let capacity_text = CAPACITY.find(&content).map(|m| m.as_str().trim().to_string());
        let description = describe(
            &name,
            &location,
            capacity_text.as_deref(),
            price_text.as_deref(),
        );

        Some(self.assemble(
            CardFields {
                name,
                location,
                rating,
                review_count,
                link,
                image_url,
                price_text,
                capacity_text,
                description,
            },
            base,
        ))
    }

    fn card_link(&self, card: &ElementRef, base: Option<&Url>) -> Option<String> {
        if card.value().name() == "a" {
            if let Some(link) = card
                .value()
                .attr("href")
                .and_then(|href| self.links.accept_link(href, base))
            {
                return Some(link);
            }
        }
        card.select(&ANCHOR)
            .filter_map(|a| a.value().attr("href"))
            .find_map(|href| self.links.accept_link(href, base))
    }

    /// Finish a record, guessing the detail URL when the card had no link
    fn assemble(&self, card: CardFields, base: Option<&Url>) -> RawListingRecord {
        let (detail_url, synthesized) = match card.link {
            Some(url) => (url, false),
            None => (
                synthesize_detail_url(&card.name, &card.location, base.or(self.site_root.as_ref())),
                true,
            ),
        };

        RawListingRecord {
            name: card.name,
            location: card.location,
            rating: card.rating,
            review_count: card.review_count,
            detail_url,
            synthesized,
            image_url: card.image_url,
            source: self.source_tag.clone(),
            price_text: card.price_text,
            capacity_text: card.capacity_text,
            description: card.description,
        }
    }
}

/// Collect JSON-LD objects that carry both a name and an aggregate rating
fn collect_rated_entities<'a>(value: &'a Value, out: &mut Vec<&'a Map<String, Value>>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_rated_entities(item, out);
            }
        }
        Value::Object(map) => {
            let named = map.get("name").and_then(html::value_text).is_some();
            if named && map.get("aggregateRating").is_some_and(Value::is_object) {
                out.push(map);
                return;
            }
            for child in map.values() {
                collect_rated_entities(child, out);
            }
        }
        _ => {}
    }
}

fn structured_location(address: Option<&Value>) -> Option<Location> {
    let address = match address? {
        Value::Array(items) => items.first()?,
        other => other,
    };
    let city = address.get("addressLocality").and_then(html::value_text)?;
    let state = address.get("addressRegion").and_then(html::value_text)?;
    Some(Location::new(&city, &state))
}

fn image_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.first().and_then(image_value),
        Value::Object(map) => map.get("url").and_then(html::value_text),
        _ => None,
    }
}

/// Nearest ancestor of a heading whose text carries exactly one rating
fn owning_card(heading: ElementRef) -> Option<ElementRef> {
    let mut node = heading;
    for _ in 0..MAX_HEADING_CLIMB {
        let parent = node.parent().and_then(ElementRef::wrap)?;
        let content = html::element_text(&parent);
        match RATING.find_iter(&content).count() {
            0 => node = parent,
            1 => return Some(parent),
            _ => return None,
        }
    }
    None
}

/// Name from a heading or name-like element inside the card
fn card_name(card: &ElementRef) -> Option<String> {
    card.select(&CARD_NAME)
        .map(|e| html::element_text(&e))
        .find(|t| !t.is_empty() && t.chars().count() <= MAX_NAME_LEN && !RATING.is_match(t))
}

/// Parse the first "City, ST" in the text
pub fn parse_location(content: &str) -> Option<Location> {
    let caps = CITY_STATE.captures(content)?;
    let city = caps.get(1)?.as_str().trim();
    let state = caps.get(2)?.as_str();
    Some(Location::new(city, state))
}

/// Best-effort detail URL built from the name and location; it may not resolve
pub fn synthesize_detail_url(name: &str, location: &Location, root: Option<&Url>) -> String {
    let slug = slugify(&format!("{} {}", name, location.full.as_deref().unwrap_or("")));
    let path = format!("{SYNTHESIZED_PREFIX}{slug}");
    root.and_then(|r| r.join(&path).ok())
        .map(|u| u.to_string())
        .unwrap_or(path)
}

/// Short description for cards that carry no free text of their own
fn describe(
    name: &str,
    location: &Location,
    capacity: Option<&str>,
    price: Option<&str>,
) -> Option<String> {
    if capacity.is_none() && price.is_none() {
        return None;
    }

    let mut description = format!("{name} is an event venue");
    if let Some(full) = &location.full {
        description.push_str(&format!(" in {full}"));
    }
    if let Some(capacity) = capacity {
        description.push_str(&format!(" accommodating {}", capacity.to_lowercase()));
    }
    if let Some(price) = price {
        description.push_str(&format!(" with pricing {price}"));
    }
    description.push('.');
    Some(description)
}
