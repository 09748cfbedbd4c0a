use crate::results::{
    AmenityFlags, ContactInfo, HarvestedVenue, Location, Media, ReviewSummary, ServiceFlags,
    SettingFlags, VenueProfile,
};
use crate::utils::parse_count;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// Category every record is stored under
pub const CATEGORY: &str = "venue";
pub const CURRENCY: &str = "USD";
/// Used when no setting flag is set
pub const DEFAULT_VENUE_TYPE: &str = "Event Venue";

static DOLLARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\s?(\d[\d,]*)").expect("valid dollar regex"));

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d[\d,]*").expect("valid number regex"));

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Pricing {
    pub min: Option<u32>,
    pub max: Option<u32>,
    pub currency: String,
    pub description: String,
}

impl Pricing {
    /// "$4,000 - $9,500" gives both bounds, "Starting at $4,000" only a minimum
    pub fn parse(text: &str) -> Self {
        let amounts: Vec<u32> = DOLLARS
            .captures_iter(text)
            .filter_map(|caps| caps.get(1).and_then(|m| parse_count(m.as_str())))
            .collect();
        Self {
            min: amounts.first().copied(),
            max: amounts.get(1).copied(),
            currency: CURRENCY.to_string(),
            description: text.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Capacity {
    pub min: Option<u32>,
    pub max: Option<u32>,
    pub description: String,
}

impl Capacity {
    /// Reads "50-200 guests", "up to 150 guests", "200+ guests" and "150 guests"
    pub fn parse(text: &str) -> Self {
        let numbers: Vec<u32> = NUMBER
            .find_iter(text)
            .filter_map(|m| parse_count(m.as_str()))
            .collect();
        let lowered = text.to_lowercase();

        let (min, max) = match numbers.as_slice() {
            [] => (None, None),
            [n] if lowered.contains("up to") => (None, Some(*n)),
            [n] if text.contains('+') => (Some(*n), None),
            [n] => (None, Some(*n)),
            [a, b, ..] => (Some(*a.min(b)), Some(*a.max(b))),
        };
        Self {
            min,
            max,
            description: text.trim().to_string(),
        }
    }
}

/// Profile fields carried on a stored record, flattened into it
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileColumns {
    pub tagline: String,
    pub address: String,
    pub neighborhood: String,
    pub languages: Vec<String>,
    pub guest_range: String,
    pub max_capacity: Option<u32>,
    #[serde(flatten)]
    pub amenity_flags: AmenityFlags,
    #[serde(flatten)]
    pub setting_flags: SettingFlags,
    #[serde(flatten)]
    pub service_flags: ServiceFlags,
    pub service_offerings: Vec<String>,
    pub reviews: ReviewSummary,
    #[serde(flatten)]
    pub contact: ContactInfo,
    pub awards: Vec<String>,
    #[serde(flatten)]
    pub media: Media,
    pub source_url: Option<String>,
    pub scraped_at: Option<DateTime<Utc>>,
}

impl From<&VenueProfile> for ProfileColumns {
    fn from(profile: &VenueProfile) -> Self {
        Self {
            tagline: profile.tagline.clone(),
            address: profile.address.clone(),
            neighborhood: profile.neighborhood.clone(),
            languages: profile.languages.clone(),
            guest_range: profile.capacity.guest_range.clone(),
            max_capacity: profile.capacity.max_capacity,
            amenity_flags: profile.amenities.clone(),
            setting_flags: profile.settings.clone(),
            service_flags: profile.services.clone(),
            service_offerings: profile.service_offerings.clone(),
            reviews: profile.reviews.clone(),
            contact: profile.contact.clone(),
            awards: profile.awards.clone(),
            media: profile.media.clone(),
            source_url: profile.metadata.source_url.clone(),
            scraped_at: profile.metadata.scraped_at,
        }
    }
}

/// The shape handed to a result sink
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VenueRecord {
    pub name: String,
    pub category: String,
    pub location: Location,
    pub pricing: Pricing,
    pub rating: f64,
    pub review_count: u32,
    pub description: String,
    pub capacity: Capacity,
    pub venue_type: String,
    pub amenities: Vec<String>,
    pub specialties: Vec<String>,
    pub detail_url: String,
    pub synthesized: bool,
    pub image_url: Option<String>,
    pub source: String,
    #[serde(flatten)]
    pub profile: Option<ProfileColumns>,
}

impl VenueRecord {
    /// Build the stored record, preferring profile text over listing text
    pub fn from_harvest(venue: &HarvestedVenue) -> Self {
        let listing = &venue.listing;
        let profile = venue.profile.as_ref();

        let prefer = |from_profile: Option<&String>, from_listing: Option<&String>| {
            from_profile
                .filter(|s| !s.is_empty())
                .or(from_listing)
                .cloned()
                .unwrap_or_default()
        };
        let price_text = prefer(profile.map(|p| &p.price_range), listing.price_text.as_ref());
        let capacity_text = prefer(
            profile.map(|p| &p.capacity.guest_range),
            listing.capacity_text.as_ref(),
        );
        let description = prefer(profile.map(|p| &p.description), listing.description.as_ref());

        let venue_type = profile
            .and_then(|p| p.settings.labels().first().copied())
            .unwrap_or(DEFAULT_VENUE_TYPE)
            .to_string();
        let amenities = profile
            .map(|p| p.amenities.labels().into_iter().map(String::from).collect())
            .unwrap_or_default();
        let specialties = profile.map(specialties).unwrap_or_default();

        Self {
            name: listing.name.clone(),
            category: CATEGORY.to_string(),
            location: listing.location.clone(),
            pricing: Pricing::parse(&price_text),
            rating: listing.rating,
            review_count: listing.review_count,
            description,
            capacity: Capacity::parse(&capacity_text),
            venue_type,
            amenities,
            specialties,
            detail_url: listing.detail_url.clone(),
            synthesized: listing.synthesized,
            image_url: listing.image_url.clone(),
            source: listing.source.clone(),
            profile: profile.map(ProfileColumns::from),
        }
    }

    /// Key a sink upserts on
    pub fn upsert_key(&self) -> (String, String) {
        (self.name.clone(), self.category.clone())
    }
}

/// Service flag labels, then free-text offerings not already covered
fn specialties(profile: &VenueProfile) -> Vec<String> {
    let mut items: Vec<String> = profile
        .services
        .labels()
        .into_iter()
        .map(String::from)
        .collect();
    for offering in &profile.service_offerings {
        if !items.iter().any(|i| i.eq_ignore_ascii_case(offering)) {
            items.push(offering.clone());
        }
    }
    items
}
