use crate::error::SinkError;
use crate::record::VenueRecord;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Where finished records go. Upserts are keyed by `(name, category)`.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Store or replace the records, returning how many were written
    async fn upsert(&self, records: &[VenueRecord]) -> Result<usize, SinkError>;
}

/// Outcome of one sub-batch handed to a sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkReport {
    pub index: usize,
    pub attempted: usize,
    pub stored: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChunkReport {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Upsert records in sub-batches of `chunk_size`.
///
/// A failing sub-batch is reported and the remaining ones are still sent.
pub async fn persist(
    sink: &dyn ResultSink,
    records: &[VenueRecord],
    chunk_size: usize,
) -> Vec<ChunkReport> {
    let mut reports = Vec::new();
    for (index, chunk) in records.chunks(chunk_size.max(1)).enumerate() {
        let report = match sink.upsert(chunk).await {
            Ok(stored) => ChunkReport {
                index,
                attempted: chunk.len(),
                stored,
                error: None,
            },
            Err(e) => {
                ::log::warn!("Sub-batch {} of {} records failed: {}", index, chunk.len(), e);
                ChunkReport {
                    index,
                    attempted: chunk.len(),
                    stored: 0,
                    error: Some(e.to_string()),
                }
            }
        };
        reports.push(report);
    }
    reports
}

type UpsertKey = (String, String);

/// Keeps records in memory; handy for tests and dry runs
#[derive(Debug, Default)]
pub struct MemorySink {
    rows: Mutex<BTreeMap<UpsertKey, VenueRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.lock().await.is_empty()
    }

    /// Stored records ordered by key
    pub async fn records(&self) -> Vec<VenueRecord> {
        self.rows.lock().await.values().cloned().collect()
    }
}

#[async_trait]
impl ResultSink for MemorySink {
    async fn upsert(&self, records: &[VenueRecord]) -> Result<usize, SinkError> {
        let mut rows = self.rows.lock().await;
        for record in records {
            rows.insert(record.upsert_key(), record.clone());
        }
        Ok(records.len())
    }
}

/// Writes every stored record to a JSON array file, rewriting it on each upsert
#[derive(Debug)]
pub struct JsonFileSink {
    path: PathBuf,
    rows: Mutex<BTreeMap<UpsertKey, Value>>,
}

impl JsonFileSink {
    /// Open the file, keeping records already in it
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        let mut rows = BTreeMap::new();

        if tokio::fs::try_exists(&path).await? {
            let contents = tokio::fs::read_to_string(&path).await?;
            if !contents.trim().is_empty() {
                let existing: Vec<Value> = serde_json::from_str(&contents)?;
                for value in existing {
                    let key = value_key(&value).ok_or_else(|| SinkError::Rejected {
                        reason: format!("{} holds a record without name/category", path.display()),
                    })?;
                    rows.insert(key, value);
                }
            }
            ::log::info!("Loaded {} existing records from {}", rows.len(), path.display());
        }

        Ok(Self {
            path,
            rows: Mutex::new(rows),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ResultSink for JsonFileSink {
    async fn upsert(&self, records: &[VenueRecord]) -> Result<usize, SinkError> {
        let mut rows = self.rows.lock().await;
        for record in records {
            if record.name.trim().is_empty() {
                return Err(SinkError::Rejected {
                    reason: "record without a name".into(),
                });
            }
        }

        // Stored rows only change once the file holds them
        let mut next = rows.clone();
        for record in records {
            next.insert(record.upsert_key(), serde_json::to_value(record)?);
        }
        let all: Vec<&Value> = next.values().collect();
        tokio::fs::write(&self.path, serde_json::to_vec_pretty(&all)?).await?;
        ::log::debug!("Wrote {} records to {}", next.len(), self.path.display());

        *rows = next;
        Ok(records.len())
    }
}

fn value_key(value: &Value) -> Option<UpsertKey> {
    let name = value.get("name")?.as_str()?;
    let category = value.get("category")?.as_str()?;
    Some((name.to_string(), category.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::{HarvestedVenue, Location, RawListingRecord};

    fn record(name: &str, city: &str) -> VenueRecord {
        VenueRecord::from_harvest(&HarvestedVenue::from(RawListingRecord {
            name: name.to_string(),
            location: Location::new(city, "TX"),
            rating: 4.0,
            review_count: 3,
            detail_url: format!("https://dir.example/marketplace/{}", name.to_lowercase()),
            synthesized: false,
            image_url: None,
            source: "test".to_string(),
            price_text: None,
            capacity_text: None,
            description: None,
        }))
    }

    /// Rejects whichever sub-batch contains a record with this name
    struct PickySink {
        inner: MemorySink,
        reject: &'static str,
    }

    #[async_trait]
    impl ResultSink for PickySink {
        async fn upsert(&self, records: &[VenueRecord]) -> Result<usize, SinkError> {
            if records.iter().any(|r| r.name == self.reject) {
                return Err(SinkError::Rejected {
                    reason: format!("{} is not allowed", self.reject),
                });
            }
            self.inner.upsert(records).await
        }
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("venue-harvest-{}-{}.json", name, std::process::id()))
    }

    #[tokio::test]
    async fn test_memory_sink_upserts_by_name_and_category() {
        let sink = MemorySink::new();
        sink.upsert(&[record("Oak Hall", "Austin"), record("Elm Hall", "Waco")])
            .await
            .unwrap();
        // Same name, different city: the sink key is coarser than the dedupe key
        sink.upsert(&[record("Oak Hall", "Dallas")]).await.unwrap();

        let stored = sink.records().await;
        assert_eq!(stored.len(), 2);
        let oak = stored.iter().find(|r| r.name == "Oak Hall").unwrap();
        assert_eq!(oak.location.city, "Dallas");
    }

    #[tokio::test]
    async fn test_persist_reports_each_chunk() {
        let sink = PickySink {
            inner: MemorySink::new(),
            reject: "Bad Hall",
        };
        let records = vec![
            record("A Hall", "Austin"),
            record("B Hall", "Austin"),
            record("Bad Hall", "Austin"),
            record("C Hall", "Austin"),
            record("D Hall", "Austin"),
        ];

        let reports = persist(&sink, &records, 2).await;

        assert_eq!(reports.len(), 3);
        assert!(reports[0].is_ok());
        assert_eq!(reports[0].stored, 2);
        assert!(!reports[1].is_ok());
        assert_eq!(reports[1].attempted, 2);
        assert_eq!(reports[1].stored, 0);
        assert!(reports[2].is_ok());
        assert_eq!(sink.inner.len().await, 3);
    }

    #[tokio::test]
    async fn test_persist_nothing() {
        let sink = MemorySink::new();
        assert!(persist(&sink, &[], 50).await.is_empty());
        assert!(sink.is_empty().await);
    }

    #[tokio::test]
    async fn test_json_file_sink_round_trip() {
        let path = temp_path("roundtrip");
        let _ = tokio::fs::remove_file(&path).await;

        let sink = JsonFileSink::open(&path).await.unwrap();
        sink.upsert(&[record("Oak Hall", "Austin")]).await.unwrap();
        sink.upsert(&[record("Elm Hall", "Waco")]).await.unwrap();

        // A reopened sink keeps earlier records and replaces by key
        let reopened = JsonFileSink::open(&path).await.unwrap();
        reopened.upsert(&[record("Oak Hall", "Dallas")]).await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let stored: Vec<Value> = serde_json::from_str(&contents).unwrap();
        assert_eq!(stored.len(), 2);
        let oak = stored.iter().find(|v| v["name"] == "Oak Hall").unwrap();
        assert_eq!(oak["location"]["city"], "Dallas");
        assert_eq!(oak["category"], "venue");

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_failed_write_stores_nothing() {
        let path = temp_path("failed-write");
        let _ = tokio::fs::remove_file(&path).await;
        let _ = tokio::fs::remove_dir(&path).await;

        let sink = JsonFileSink::open(&path).await.unwrap();
        sink.upsert(&[record("Oak Hall", "Austin")]).await.unwrap();

        // A directory in the file's place makes the next write fail
        tokio::fs::remove_file(&path).await.unwrap();
        tokio::fs::create_dir(&path).await.unwrap();
        let result = sink.upsert(&[record("Lost Hall", "Waco")]).await;
        assert!(matches!(result, Err(SinkError::Io(_))));
        assert_eq!(sink.rows.lock().await.len(), 1);

        tokio::fs::remove_dir(&path).await.unwrap();
        sink.upsert(&[record("Elm Hall", "Waco")]).await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let stored: Vec<Value> = serde_json::from_str(&contents).unwrap();
        let names: Vec<&str> = stored.iter().filter_map(|v| v["name"].as_str()).collect();
        assert_eq!(names, vec!["Elm Hall", "Oak Hall"]);

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_json_file_sink_rejects_unnamed() {
        let path = temp_path("unnamed");
        let _ = tokio::fs::remove_file(&path).await;

        let sink = JsonFileSink::open(&path).await.unwrap();
        let result = sink.upsert(&[record(" ", "Austin")]).await;
        assert!(matches!(result, Err(SinkError::Rejected { .. })));
        assert!(!tokio::fs::try_exists(&path).await.unwrap());
    }
}
