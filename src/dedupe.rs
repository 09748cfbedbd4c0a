use crate::results::{HarvestedVenue, RawListingRecord};
use std::collections::HashSet;
use std::fmt;

/// Normalized identity of a record: lowercased name and full location
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupeKey(String);

impl DedupeKey {
    pub fn new(name: &str, full_location: Option<&str>) -> Self {
        let location = full_location.unwrap_or("unknown");
        Self(format!("{}-{}", name.to_lowercase(), location.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DedupeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Anything that can be folded by identity
pub trait Identity {
    fn dedupe_key(&self) -> DedupeKey;
}

impl Identity for RawListingRecord {
    fn dedupe_key(&self) -> DedupeKey {
        DedupeKey::new(&self.name, self.location.full.as_deref())
    }
}

impl Identity for HarvestedVenue {
    fn dedupe_key(&self) -> DedupeKey {
        self.listing.dedupe_key()
    }
}

/// Keep the first record seen for each key, preserving input order.
///
/// Later duplicates are dropped whole, even if they carry more fields.
pub fn dedupe<T: Identity>(records: Vec<T>) -> Vec<T> {
    let before = records.len();
    let mut seen = HashSet::with_capacity(before);
    let kept: Vec<T> = records
        .into_iter()
        .filter(|record| seen.insert(record.dedupe_key()))
        .collect();

    if kept.len() < before {
        ::log::debug!("Dropped {} duplicate records", before - kept.len());
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::Location;

    fn record(name: &str, city: &str, state: &str) -> RawListingRecord {
        RawListingRecord {
            name: name.to_string(),
            location: Location::new(city, state),
            rating: 4.0,
            review_count: 1,
            detail_url: format!("https://dir.example/{}", name.len()),
            synthesized: false,
            image_url: None,
            source: "test".to_string(),
            price_text: None,
            capacity_text: None,
            description: None,
        }
    }

    #[test]
    fn test_key_format() {
        assert_eq!(
            DedupeKey::new("Oak Hall", Some("Austin, TX")).as_str(),
            "oak hall-austin, tx"
        );
        assert_eq!(DedupeKey::new("Oak Hall", None).as_str(), "oak hall-unknown");
    }

    #[test]
    fn test_case_insensitive_collapse() {
        let records = vec![
            record("Oak Hall", "Austin", "TX"),
            record("oak hall", "austin", "tx"),
        ];
        let kept = dedupe(records);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].name, "Oak Hall");
    }

    #[test]
    fn test_first_seen_wins_and_order_kept() {
        let mut richer = record("Oak Hall", "Austin", "TX");
        richer.description = Some("later, more complete".to_string());
        let records = vec![
            record("Barn One", "Waco", "TX"),
            record("Oak Hall", "Austin", "TX"),
            richer,
            record("Oak Hall", "Dallas", "TX"),
        ];
        let kept = dedupe(records);
        let names: Vec<_> = kept
            .iter()
            .map(|r| (r.name.as_str(), r.location.city.as_str()))
            .collect();
        assert_eq!(
            names,
            vec![("Barn One", "Waco"), ("Oak Hall", "Austin"), ("Oak Hall", "Dallas")]
        );
        assert!(kept[1].description.is_none());
    }

    #[test]
    fn test_idempotent() {
        let records = vec![
            record("A", "X", "TX"),
            record("a", "x", "tx"),
            record("B", "Y", "TX"),
        ];
        let once = dedupe(records);
        let twice = dedupe(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_unknown_locations_share_key() {
        let mut a = record("Loft 9", "X", "TX");
        a.location = Location::unknown();
        let mut b = a.clone();
        b.name = "LOFT 9".to_string();
        assert_eq!(dedupe(vec![a, b]).len(), 1);
    }
}
