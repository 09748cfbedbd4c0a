use super::{ScriptedSession, listing_page, names};
use crate::crawlers::http::fetch_catalog_with;
use crate::error::ScrapeError;
use crate::parsers::ListingExtractor;

const BROKEN: &str = "https://dir.example/catalog-broken";
const EMPTY: &str = "https://dir.example/catalog-empty";
const FULL: &str = "https://dir.example/catalog";
const LATER: &str = "https://dir.example/catalog-later";

fn candidates(urls: &[&str]) -> Vec<String> {
    urls.iter().map(|u| u.to_string()).collect()
}

fn catalog_site() -> ScriptedSession {
    ScriptedSession::new("scripted")
        .page(EMPTY, "<html><body><p>Nothing to see</p></body></html>".to_string())
        .page(FULL, listing_page(&names("Oak", 4), "Austin", "TX", None))
        .page(LATER, listing_page(&names("Elm", 2), "Waco", "TX", None))
}

#[tokio::test]
async fn test_first_candidate_with_listings_wins() {
    let mut session = catalog_site();
    let visits = session.visits();

    let (url, records) = fetch_catalog_with(
        &mut session,
        &candidates(&[BROKEN, EMPTY, FULL, LATER]),
        &ListingExtractor::new("test"),
    )
    .await
    .unwrap();

    assert_eq!(url, FULL);
    assert_eq!(records.len(), 4);
    assert_eq!(records[0].name, "Oak Hall 1");
    assert_eq!(
        records[0].detail_url,
        "https://dir.example/marketplace/oak-hall-1"
    );
    // Later candidates are never loaded
    assert_eq!(*visits.lock().unwrap(), vec![BROKEN, EMPTY, FULL]);
}

#[tokio::test]
async fn test_no_candidate_with_listings_is_exhausted() {
    let mut session = catalog_site();

    let result = fetch_catalog_with(
        &mut session,
        &candidates(&[BROKEN, EMPTY]),
        &ListingExtractor::new("test"),
    )
    .await;

    assert!(matches!(result, Err(ScrapeError::CatalogExhausted { tried: 2 })));
}

#[tokio::test]
async fn test_no_candidates_is_exhausted() {
    let mut session = catalog_site();
    let visits = session.visits();

    let result = fetch_catalog_with(&mut session, &[], &ListingExtractor::new("test")).await;

    assert!(matches!(result, Err(ScrapeError::CatalogExhausted { tried: 0 })));
    assert!(visits.lock().unwrap().is_empty());
}
