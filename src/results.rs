use crate::utils::contains_keyword;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Location text used when a card carries no "City, ST" pattern
pub const UNKNOWN: &str = "Unknown";

/// City/state pair parsed from listing text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub city: String,
    pub state: String,
    /// The matched "City, ST" text, if any
    pub full: Option<String>,
}

impl Location {
    pub fn new(city: &str, state: &str) -> Self {
        Self {
            city: city.to_string(),
            state: state.to_string(),
            full: Some(format!("{city}, {state}")),
        }
    }

    pub fn unknown() -> Self {
        Self {
            city: UNKNOWN.to_string(),
            state: UNKNOWN.to_string(),
            full: None,
        }
    }

    pub fn is_known(&self) -> bool {
        self.full.is_some()
    }
}

/// One candidate venue scraped from a listing card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawListingRecord {
    /// Never empty
    pub name: String,
    pub location: Location,
    /// Clamped into 0.0..=5.0
    pub rating: f64,
    pub review_count: u32,
    pub detail_url: String,
    /// True when `detail_url` was guessed from the name and location
    pub synthesized: bool,
    pub image_url: Option<String>,
    /// Which directory the record came from
    pub source: String,
    pub price_text: Option<String>,
    pub capacity_text: Option<String>,
    pub description: Option<String>,
}

/// Declares a set of boolean flags derived from keyword presence in free text.
macro_rules! keyword_flags {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($field:ident => $label:literal : [$($keyword:literal),+ $(,)?]),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "camelCase")]
        pub struct $name {
            $(pub $field: bool,)+
        }

        impl $name {
            /// Sets every flag whose keywords appear as whole words, or their plurals, in any text
            pub fn detect(texts: &[String]) -> Self {
                let lowered: Vec<String> = texts.iter().map(|t| t.to_lowercase()).collect();
                let hit = |keywords: &[&str]| {
                    lowered
                        .iter()
                        .any(|text| keywords.iter().any(|k| contains_keyword(text, k)))
                };
                Self {
                    $($field: hit(&[$($keyword),+]),)+
                }
            }

            /// Display labels of the set flags, in declaration order
            pub fn labels(&self) -> Vec<&'static str> {
                let mut labels = Vec::new();
                $(
                    if self.$field {
                        labels.push($label);
                    }
                )+
                labels
            }
        }
    };
}

keyword_flags! {
    /// Amenities advertised on a profile
    AmenityFlags {
        av_equipment => "AV Equipment": ["av equipment", "sound system", "projector", "audio"],
        bar_service => "Bar Service": ["bar service", "full bar", "open bar", "bartender", "bartenders"],
        catering => "Catering": ["catering", "caterer", "caterers"],
        dance_floor => "Dance Floor": ["dance floor"],
        dressing_room => "Dressing Room": ["dressing room", "bridal suite", "getting ready"],
        handicap_accessible => "Handicap Accessible": ["handicap accessible", "wheelchair", "accessible"],
        indoor_event_space => "Indoor Event Space": ["indoor"],
        liability_insurance => "Liability Insurance": ["liability insurance"],
        on_site_accommodations => "On-Site Accommodations": ["accommodations", "on-site lodging", "guest rooms"],
        outdoor_event_space => "Outdoor Event Space": ["outdoor"],
        parking => "Parking": ["parking", "valet"],
        reception_area => "Reception Area": ["reception area"],
        wireless_internet => "Wireless Internet": ["wireless", "wi-fi", "wifi"],
    }
}

keyword_flags! {
    /// Physical setting of the venue
    SettingFlags {
        ballroom => "Ballroom": ["ballroom"],
        barn => "Barn": ["barn", "barns", "farm", "ranch"],
        beach => "Beach": ["beach"],
        boat => "Boat": ["boat", "yacht"],
        brewery => "Brewery": ["brewery", "distillery"],
        country_club => "Country Club": ["country club", "golf course"],
        garden => "Garden": ["garden", "gardens"],
        historic_venue => "Historic Venue": ["historic"],
        hotel => "Hotel": ["hotel", "resort"],
        loft => "Loft": ["loft", "warehouse", "industrial"],
        mansion => "Mansion": ["mansion", "estate"],
        park => "Park": ["park"],
        restaurant => "Restaurant": ["restaurant"],
        rooftop => "Rooftop": ["rooftop", "roof top"],
        vineyard_winery => "Vineyard & Winery": ["vineyard", "winery"],
        waterfront => "Waterfront": ["waterfront", "lakefront", "oceanfront", "riverfront"],
        woodland => "Woodland": ["woodland", "forest", "woods"],
    }
}

keyword_flags! {
    /// Event types the venue hosts
    ServiceFlags {
        ceremonies_and_receptions => "Ceremonies & Receptions": ["ceremonies and receptions", "ceremonies & receptions", "ceremony and reception"],
        ceremony_only => "Ceremonies Only": ["ceremonies only", "ceremony only"],
        reception_only => "Receptions Only": ["receptions only", "reception only"],
        rehearsal_dinners => "Rehearsal Dinners": ["rehearsal dinner", "rehearsal dinners"],
        wedding_showers => "Wedding Showers": ["bridal shower", "bridal showers", "wedding shower", "wedding showers"],
        engagement_parties => "Engagement Parties": ["engagement party", "engagement parties"],
        bachelor_parties => "Bachelor & Bachelorette Parties": ["bachelor party", "bachelor parties", "bachelorette party", "bachelorette parties"],
    }
}

/// Guest capacity as stated on a profile
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityInfo {
    /// Raw text such as "50-200 guests"; empty when not found
    pub guest_range: String,
    pub max_capacity: Option<u32>,
}

/// One customer review kept from a profile page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub author: String,
    pub body: String,
    pub rating: Option<f64>,
    pub date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSummary {
    pub rating: Option<f64>,
    pub count: Option<u32>,
    /// At most ten, each with author and body
    pub individual_reviews: Vec<Review>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactInfo {
    pub team_name: String,
    pub team_role: String,
    pub phone: String,
    pub email: String,
    pub website: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    pub images: Vec<String>,
    pub videos: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileMetadata {
    pub source_url: Option<String>,
    pub scraped_at: Option<DateTime<Utc>>,
}

/// Extended detail for one venue, built from its detail page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VenueProfile {
    pub name: String,
    pub tagline: String,
    pub description: String,
    pub address: String,
    pub neighborhood: String,
    pub languages: Vec<String>,
    pub price_range: String,
    pub capacity: CapacityInfo,
    pub amenities: AmenityFlags,
    pub settings: SettingFlags,
    pub services: ServiceFlags,
    pub service_offerings: Vec<String>,
    pub reviews: ReviewSummary,
    pub contact: ContactInfo,
    pub awards: Vec<String>,
    pub media: Media,
    pub metadata: ProfileMetadata,
}

impl VenueProfile {
    /// Record where and when the profile was taken
    pub fn stamped(mut self, source_url: &str, scraped_at: DateTime<Utc>) -> Self {
        self.metadata = ProfileMetadata {
            source_url: Some(source_url.to_string()),
            scraped_at: Some(scraped_at),
        };
        self
    }
}

/// A listing together with its profile, when one was extracted
#[derive(Debug, Clone, PartialEq)]
pub struct HarvestedVenue {
    pub listing: RawListingRecord,
    pub profile: Option<VenueProfile>,
}

impl From<RawListingRecord> for HarvestedVenue {
    fn from(listing: RawListingRecord) -> Self {
        Self {
            listing,
            profile: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_amenity_detection() {
        let flags = AmenityFlags::detect(&texts(&["In-house Catering", "Free Parking", "Wi-Fi"]));
        assert!(flags.catering);
        assert!(flags.parking);
        assert!(flags.wireless_internet);
        assert!(!flags.dance_floor);
        assert_eq!(flags.labels(), vec!["Catering", "Parking", "Wireless Internet"]);
    }

    #[test]
    fn test_setting_detection_ignores_parking() {
        let flags = SettingFlags::detect(&texts(&["Parking lot", "Rustic Barn"]));
        assert!(flags.barn);
        assert!(!flags.park);
    }

    #[test]
    fn test_plural_keywords_set_flags() {
        let flags = AmenityFlags::detect(&texts(&["Outdoors ceremony lawn", "Two bars on site"]));
        assert!(flags.outdoor_event_space);
        assert!(!flags.bar_service);

        let settings = SettingFlags::detect(&texts(&["Three ballrooms", "Near state parks"]));
        assert!(settings.ballroom);
        assert!(settings.park);
    }

    #[test]
    fn test_empty_texts_set_nothing() {
        assert_eq!(ServiceFlags::detect(&[]), ServiceFlags::default());
        assert!(ServiceFlags::default().labels().is_empty());
    }

    #[test]
    fn test_unknown_location() {
        let location = Location::unknown();
        assert_eq!(location.city, "Unknown");
        assert_eq!(location.state, "Unknown");
        assert!(!location.is_known());
    }
}
