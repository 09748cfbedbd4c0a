use crate::crawlers::BatchResult;
use crate::sink::ChunkReport;
use serde::Serialize;

/// Position of this invocation in the region list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchInfo {
    /// "start-end" with an exclusive end
    pub current_batch: String,
    /// Where the next invocation should start; null once complete
    pub next_start_index: Option<usize>,
    pub is_complete: bool,
    pub total_regions: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub regions_processed: usize,
    pub records_per_region: usize,
}

/// What one invocation returns to its caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationReport {
    pub success: bool,
    pub venues_scraped: usize,
    pub batch_info: BatchInfo,
    pub summary: Summary,
    pub persistence: Vec<ChunkReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InvocationReport {
    pub fn from_batch(batch: &BatchResult, persistence: Vec<ChunkReport>) -> Self {
        let venues = batch.venues.len();
        let records_per_region = if batch.regions_processed == 0 {
            0
        } else {
            venues / batch.regions_processed
        };
        let error = batch.nothing_loaded().then(|| {
            format!(
                "no page could be loaded for any of {} regions by either session",
                batch.regions_processed
            )
        });

        Self {
            success: error.is_none(),
            venues_scraped: venues,
            batch_info: BatchInfo {
                current_batch: format!("{}-{}", batch.start_index, batch.end_index),
                next_start_index: (!batch.is_complete).then_some(batch.next_start_index),
                is_complete: batch.is_complete,
                total_regions: batch.total_regions,
            },
            summary: Summary {
                regions_processed: batch.regions_processed,
                records_per_region,
            },
            persistence,
            error,
        }
    }

    /// A report for an invocation that could not start
    pub fn failure(
        start_index: usize,
        max_regions: usize,
        total_regions: usize,
        error: impl ToString,
    ) -> Self {
        let end = start_index.saturating_add(max_regions).min(total_regions);
        Self {
            success: false,
            venues_scraped: 0,
            batch_info: BatchInfo {
                current_batch: format!("{}-{}", start_index, end.max(start_index)),
                next_start_index: (start_index < total_regions).then_some(start_index),
                is_complete: start_index >= total_regions,
                total_regions,
            },
            summary: Summary {
                regions_processed: 0,
                records_per_region: 0,
            },
            persistence: Vec::new(),
            error: Some(error.to_string()),
        }
    }
}

/// What a whole-catalog run returns
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogReport {
    /// False when any sub-batch failed to store
    pub success: bool,
    pub venues_scraped: usize,
    pub stored: usize,
    pub persistence: Vec<ChunkReport>,
}

impl CatalogReport {
    pub fn new(venues_scraped: usize, persistence: Vec<ChunkReport>) -> Self {
        Self {
            success: persistence.iter().all(ChunkReport::is_ok),
            venues_scraped,
            stored: persistence.iter().map(|r| r.stored).sum(),
            persistence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn batch(processed: usize, venues: usize, complete: bool) -> BatchResult {
        use crate::results::{HarvestedVenue, Location, RawListingRecord};
        let venues = (0..venues)
            .map(|i| {
                HarvestedVenue::from(RawListingRecord {
                    name: format!("Hall {i}"),
                    location: Location::unknown(),
                    rating: 4.0,
                    review_count: 1,
                    detail_url: format!("https://dir.example/{i}"),
                    synthesized: false,
                    image_url: None,
                    source: "test".to_string(),
                    price_text: None,
                    capacity_text: None,
                    description: None,
                })
            })
            .collect();
        BatchResult {
            venues,
            start_index: 0,
            end_index: 2,
            next_start_index: if complete { 50 } else { 2 },
            is_complete: complete,
            total_regions: 50,
            regions_processed: processed,
            regions_failed: 0,
            pages_loaded: processed,
            deadline_hit: false,
        }
    }

    #[test]
    fn test_report_shape() {
        let report = InvocationReport::from_batch(&batch(2, 7, false), Vec::new());
        let value = serde_json::to_value(&report).unwrap();

        assert_eq!(
            value,
            json!({
                "success": true,
                "venuesScraped": 7,
                "batchInfo": {
                    "currentBatch": "0-2",
                    "nextStartIndex": 2,
                    "isComplete": false,
                    "totalRegions": 50
                },
                "summary": {"regionsProcessed": 2, "recordsPerRegion": 3},
                "persistence": []
            })
        );
    }

    #[test]
    fn test_complete_batch_has_null_next_index() {
        let report = InvocationReport::from_batch(&batch(2, 4, true), Vec::new());
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["batchInfo"]["nextStartIndex"], json!(null));
        assert_eq!(value["batchInfo"]["isComplete"], json!(true));
    }

    #[test]
    fn test_nothing_loaded_is_failure() {
        let mut result = batch(2, 0, false);
        result.pages_loaded = 0;
        let report = InvocationReport::from_batch(&result, Vec::new());
        assert!(!report.success);
        assert!(report.error.is_some());
        assert_eq!(report.summary.records_per_region, 0);
    }

    #[test]
    fn test_failure_report() {
        let report = InvocationReport::failure(4, 0, 50, "max_regions must be at least 1");
        assert!(!report.success);
        assert_eq!(report.batch_info.current_batch, "4-4");
        assert_eq!(report.batch_info.next_start_index, Some(4));
        assert_eq!(report.error.as_deref(), Some("max_regions must be at least 1"));
    }

    #[test]
    fn test_catalog_report_fails_on_any_chunk() {
        let ok = ChunkReport {
            index: 0,
            attempted: 50,
            stored: 50,
            error: None,
        };
        let failed = ChunkReport {
            index: 1,
            attempted: 20,
            stored: 0,
            error: Some("sink rejected records".to_string()),
        };

        let report = CatalogReport::new(70, vec![ok.clone(), failed]);
        assert!(!report.success);
        assert_eq!(report.stored, 50);
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["venuesScraped"], json!(70));
        assert_eq!(value["success"], json!(false));

        assert!(CatalogReport::new(50, vec![ok]).success);
        assert!(CatalogReport::new(0, Vec::new()).success);
    }
}
