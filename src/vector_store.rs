//! Persistent store of document embeddings plus the metadata needed to
//! display and filter them.
//!
//! Binary format per record value:
//! - 4 bytes: vector dimension D (u32 LE)
//! - 8 bytes: insertion timestamp (i64 LE, in the table's fixed precision)
//! - D * 4 bytes: f32 vector values
//! - remainder: JSON-encoded display metadata
//!
//! The timestamp precision and vector dimension are schema-level: fixed
//! when the table is created (or first written) and never altered in
//! place. Changing precision goes through [`VectorStore::migrate_timestamp_precision`],
//! which exports every record, recreates the table, and reinserts.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata,
    TableDefinition,
};
use serde::{Deserialize, Serialize};

use crate::{
    document::DocumentFilter,
    error::{Error, Result},
};

const RECORDS: TableDefinition<u64, &[u8]> =
    TableDefinition::new("vector_records");
const SCHEMA: TableDefinition<&str, &str> = TableDefinition::new("schema");

const PRECISION_KEY: &str = "timestamp_precision";
const DIMENSION_KEY: &str = "dimension";

/// Header size: 4 bytes dimension + 8 bytes timestamp.
const HEADER_SIZE: usize = 12;

/// Time precision of the `inserted_at` column, fixed per table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampPrecision {
    Millis,
    Micros,
}

impl TimestampPrecision {
    pub fn as_str(self) -> &'static str {
        match self {
            TimestampPrecision::Millis => "ms",
            TimestampPrecision::Micros => "us",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "ms" => Ok(TimestampPrecision::Millis),
            "us" => Ok(TimestampPrecision::Micros),
            other => Err(Error::InvalidInput(format!(
                "unknown timestamp precision {other:?} (expected \"ms\" or \"us\")"
            ))),
        }
    }

    /// Current wall-clock time in this precision's units since the epoch.
    fn now(self) -> i64 {
        let elapsed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO);
        match self {
            TimestampPrecision::Millis => elapsed.as_millis() as i64,
            TimestampPrecision::Micros => elapsed.as_micros() as i64,
        }
    }

    fn convert(value: i64, from: Self, to: Self) -> i64 {
        match (from, to) {
            (TimestampPrecision::Millis, TimestampPrecision::Micros) => {
                value.saturating_mul(1000)
            }
            (TimestampPrecision::Micros, TimestampPrecision::Millis) => {
                value / 1000
            }
            _ => value,
        }
    }
}

/// The persisted unit: one embedding plus display metadata.
///
/// At most one live record exists per document id; `upsert` enforces this
/// with replace semantics. Records are never mutated in place.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    pub id: u64,
    pub vector: Vec<f32>,
    pub title: String,
    pub body: String,
    pub published_at: String,
    pub permalink: String,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    /// Insertion timestamp in the table's fixed precision. Zero means
    /// "stamp me at upsert time"; migration preserves nonzero values.
    pub inserted_at: i64,
}

#[derive(Serialize, Deserialize)]
struct RecordMeta {
    title: String,
    body: String,
    published_at: String,
    permalink: String,
    categories: Vec<String>,
    tags: Vec<String>,
}

/// Strict partition of a candidate id set into present and absent ids.
#[derive(Debug, Default, PartialEq)]
pub struct Partition {
    pub existing: Vec<u64>,
    pub missing: Vec<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StoreStats {
    pub exists: bool,
    pub count: u64,
    pub size_bytes: u64,
}

#[derive(Debug, PartialEq)]
pub struct MigrationReport {
    /// Number of records exported and reinserted.
    pub migrated: usize,
    /// False when the table was already at the requested precision.
    pub changed: bool,
}

#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Precision used when creating a new table. An existing table keeps
    /// whatever precision it was created with.
    pub timestamp_precision: TimestampPrecision,
    /// Deadline for scan-shaped operations (`exists`, `search`).
    pub op_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            timestamp_precision: TimestampPrecision::Micros,
            op_timeout: Duration::from_secs(30),
        }
    }
}

pub struct VectorStore {
    db: Database,
    path: PathBuf,
    precision: TimestampPrecision,
    op_timeout: Duration,
}

impl VectorStore {
    /// Open or create a store at the given path with default options.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with(path, StoreOptions::default())
    }

    pub fn open_with(path: &Path, options: StoreOptions) -> Result<Self> {
        let db = Database::create(path).map_err(|e| {
            Error::StoreUnavailable(format!("{}: {e}", path.display()))
        })?;

        // Fix the timestamp precision at creation time; reopening an
        // existing table keeps its recorded precision no matter what the
        // options say.
        let precision;
        let txn = db.begin_write()?;
        {
            txn.open_table(RECORDS)?;
            let mut schema = txn.open_table(SCHEMA)?;
            let recorded = schema
                .get(PRECISION_KEY)?
                .map(|v| v.value().to_string());
            precision = match recorded {
                Some(value) => TimestampPrecision::parse(&value)?,
                None => {
                    schema.insert(
                        PRECISION_KEY,
                        options.timestamp_precision.as_str(),
                    )?;
                    options.timestamp_precision
                }
            };
        }
        txn.commit()?;

        Ok(Self {
            db,
            path: path.to_path_buf(),
            precision,
            op_timeout: options.op_timeout,
        })
    }

    pub fn timestamp_precision(&self) -> TimestampPrecision {
        self.precision
    }

    /// The fixed vector dimension, once the first record has been written.
    pub fn dimension(&self) -> Result<Option<usize>> {
        let txn = self.db.begin_read()?;
        let schema = txn.open_table(SCHEMA)?;
        let dim = schema
            .get(DIMENSION_KEY)?
            .and_then(|v| v.value().parse().ok());
        Ok(dim)
    }

    /// Partition candidate ids into those with a stored record and those
    /// without. Point lookups only; never loads vectors into memory.
    ///
    /// Input duplicates are collapsed, so the two outputs form a strict
    /// partition of the deduplicated input.
    pub fn exists(&self, ids: &[u64]) -> Result<Partition> {
        let deadline = Instant::now() + self.op_timeout;
        let txn = self.db.begin_read()?;
        let table = txn.open_table(RECORDS)?;

        let mut partition = Partition::default();
        let mut seen = std::collections::HashSet::new();
        for &id in ids {
            if !seen.insert(id) {
                continue;
            }
            self.check_deadline(deadline, "exists")?;
            if table.get(id)?.is_some() {
                partition.existing.push(id);
            } else {
                partition.missing.push(id);
            }
        }
        Ok(partition)
    }

    /// Fetch records by id. Missing ids are simply absent from the map.
    pub fn get_by_ids(&self, ids: &[u64]) -> Result<HashMap<u64, VectorRecord>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(RECORDS)?;

        let mut records = HashMap::new();
        for &id in ids {
            if let Some(guard) = table.get(id)? {
                records.insert(id, decode_record(id, guard.value())?);
            }
        }
        Ok(records)
    }

    /// Insert-or-replace records by id: any existing record with the same
    /// id is deleted before the new one is inserted, all inside a single
    /// write transaction, so at most one live record per id survives and
    /// a crash never leaves the delete without its insert.
    ///
    /// Returns the number of records written.
    pub fn upsert(&self, records: &[VectorRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        for record in records {
            if record.id == 0 {
                return Err(Error::InvalidInput(
                    "record id must be a positive integer".into(),
                ));
            }
            if record.vector.is_empty() {
                return Err(Error::InvalidInput(format!(
                    "record {} has an empty vector",
                    record.id
                )));
            }
        }

        let txn = self.db.begin_write()?;
        {
            let mut schema = txn.open_table(SCHEMA)?;
            // Drop the read guard before inserting.
            let recorded = schema
                .get(DIMENSION_KEY)?
                .and_then(|v| v.value().parse::<usize>().ok());
            let dimension = match recorded {
                Some(dim) => dim,
                None => {
                    let dim = records[0].vector.len();
                    schema.insert(DIMENSION_KEY, dim.to_string().as_str())?;
                    dim
                }
            };
            for record in records {
                if record.vector.len() != dimension {
                    return Err(Error::SchemaMismatch {
                        expected: format!("{dimension}-dimensional vector"),
                        found: format!(
                            "{}-dimensional vector for record {}",
                            record.vector.len(),
                            record.id
                        ),
                    });
                }
            }

            let mut table = txn.open_table(RECORDS)?;
            for record in records {
                let inserted_at = if record.inserted_at == 0 {
                    self.precision.now()
                } else {
                    record.inserted_at
                };
                table.remove(record.id)?;
                let encoded = encode_record(record, inserted_at);
                table.insert(record.id, encoded.as_slice())?;
            }
        }
        txn.commit()?;

        tracing::debug!(count = records.len(), "upserted vector records");
        Ok(records.len())
    }

    /// Delete records by id. Returns how many were actually removed.
    pub fn purge(&self, ids: &[u64]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let txn = self.db.begin_write()?;
        let mut removed = 0;
        {
            let mut table = txn.open_table(RECORDS)?;
            for &id in ids {
                if table.remove(id)?.is_some() {
                    removed += 1;
                }
            }
        }
        txn.commit()?;
        Ok(removed)
    }

    /// Nearest-neighbor query by cosine similarity.
    ///
    /// Scores are in [-1, 1] with higher meaning more similar; ties are
    /// broken by descending `published_at`. The date filter is applied
    /// during the scan, never by over-fetching and discarding.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        filter: &DocumentFilter,
    ) -> Result<Vec<(VectorRecord, f32)>> {
        if query.is_empty() {
            return Err(Error::InvalidInput("empty query vector".into()));
        }
        if let Some(dimension) = self.dimension()?
            && query.len() != dimension
        {
            return Err(Error::SchemaMismatch {
                expected: format!("{dimension}-dimensional query"),
                found: format!("{}-dimensional query", query.len()),
            });
        }

        let deadline = Instant::now() + self.op_timeout;
        let txn = self.db.begin_read()?;
        let table = txn.open_table(RECORDS)?;

        let mut scored: Vec<(VectorRecord, f32)> = Vec::new();
        for entry in table.iter()? {
            self.check_deadline(deadline, "search")?;
            let (key, value) = entry?;
            let record = decode_record(key.value(), value.value())?;
            if !filter.matches(&record.published_at) {
                continue;
            }
            let score = cosine_similarity(query, &record.vector);
            scored.push((record, score));
        }

        scored.sort_unstable_by(|a, b| {
            b.1.total_cmp(&a.1)
                .then_with(|| b.0.published_at.cmp(&a.0.published_at))
        });
        scored.truncate(k.max(1));
        Ok(scored)
    }

    pub fn count(&self) -> Result<u64> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(RECORDS)?;
        Ok(table.len()?)
    }

    /// Stats for this open store.
    pub fn stats(&self) -> Result<StoreStats> {
        let size_bytes = std::fs::metadata(&self.path)?.len();
        Ok(StoreStats {
            exists: true,
            count: self.count()?,
            size_bytes,
        })
    }

    /// Recreate the records table at a new timestamp precision, preserving
    /// every field of every record. Idempotent: a no-op when the table is
    /// already at the requested precision.
    pub fn migrate_timestamp_precision(
        &mut self,
        new: TimestampPrecision,
    ) -> Result<MigrationReport> {
        if self.precision == new {
            return Ok(MigrationReport {
                migrated: 0,
                changed: false,
            });
        }

        // Export everything before touching the table.
        let old = self.precision;
        let exported = self.export_all()?;

        let txn = self.db.begin_write()?;
        {
            txn.delete_table(RECORDS)?;
            let mut table = txn.open_table(RECORDS)?;
            for record in &exported {
                let converted =
                    TimestampPrecision::convert(record.inserted_at, old, new);
                let encoded = encode_record(record, converted);
                table.insert(record.id, encoded.as_slice())?;
            }
            let mut schema = txn.open_table(SCHEMA)?;
            schema.insert(PRECISION_KEY, new.as_str())?;
        }
        txn.commit()?;
        self.precision = new;

        tracing::info!(
            count = exported.len(),
            precision = new.as_str(),
            "migrated timestamp precision"
        );
        Ok(MigrationReport {
            migrated: exported.len(),
            changed: true,
        })
    }

    fn export_all(&self) -> Result<Vec<VectorRecord>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(RECORDS)?;
        let mut records = Vec::new();
        for entry in table.iter()? {
            let (key, value) = entry?;
            records.push(decode_record(key.value(), value.value())?);
        }
        Ok(records)
    }

    fn check_deadline(
        &self,
        deadline: Instant,
        operation: &'static str,
    ) -> Result<()> {
        if Instant::now() > deadline {
            Err(Error::Timeout {
                operation,
                limit_ms: self.op_timeout.as_millis() as u64,
            })
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("path", &self.path)
            .field("precision", &self.precision.as_str())
            .finish_non_exhaustive()
    }
}

/// Stats for the store at `path` without requiring it to exist.
///
/// Opens the database exclusively; with a live [`VectorStore`] handle to the
/// same path, call [`VectorStore::stats`] on it instead.
pub fn stats(path: &Path) -> Result<StoreStats> {
    if !path.exists() {
        return Ok(StoreStats {
            exists: false,
            count: 0,
            size_bytes: 0,
        });
    }
    VectorStore::open(path)?.stats()
}

fn encode_record(record: &VectorRecord, inserted_at: i64) -> Vec<u8> {
    let meta = RecordMeta {
        title: record.title.clone(),
        body: record.body.clone(),
        published_at: record.published_at.clone(),
        permalink: record.permalink.clone(),
        categories: record.categories.clone(),
        tags: record.tags.clone(),
    };
    // RecordMeta has no non-serializable fields, so this cannot fail.
    let meta_bytes = serde_json::to_vec(&meta).unwrap_or_default();

    let mut bytes = Vec::with_capacity(
        HEADER_SIZE + record.vector.len() * 4 + meta_bytes.len(),
    );
    bytes.extend_from_slice(&(record.vector.len() as u32).to_le_bytes());
    bytes.extend_from_slice(&inserted_at.to_le_bytes());
    bytes.extend_from_slice(bytemuck::cast_slice(&record.vector));
    bytes.extend_from_slice(&meta_bytes);
    bytes
}

fn decode_record(id: u64, bytes: &[u8]) -> Result<VectorRecord> {
    if bytes.len() < HEADER_SIZE {
        return Err(corrupt(id, "truncated header"));
    }
    let dimension =
        u32::from_le_bytes(bytes[0..4].try_into().unwrap_or_default()) as usize;
    let inserted_at =
        i64::from_le_bytes(bytes[4..12].try_into().unwrap_or_default());

    let vector_end = HEADER_SIZE + dimension * 4;
    if bytes.len() < vector_end {
        return Err(corrupt(id, "truncated vector"));
    }
    // redb value buffers carry no alignment guarantee, so the vector must
    // be read element-wise rather than cast as a whole slice.
    let vector: Vec<f32> = bytes[HEADER_SIZE..vector_end]
        .chunks_exact(4)
        .map(bytemuck::pod_read_unaligned::<f32>)
        .collect();

    let meta: RecordMeta = serde_json::from_slice(&bytes[vector_end..])
        .map_err(|_| corrupt(id, "unreadable metadata"))?;

    Ok(VectorRecord {
        id,
        vector,
        title: meta.title,
        body: meta.body,
        published_at: meta.published_at,
        permalink: meta.permalink,
        categories: meta.categories,
        tags: meta.tags,
        inserted_at,
    })
}

fn corrupt(id: u64, what: &str) -> Error {
    Error::SchemaMismatch {
        expected: "valid record encoding".into(),
        found: format!("{what} for record {id}"),
    }
}

/// Cosine similarity; 0.0 when either vector has zero norm.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> (tempfile::TempDir, VectorStore) {
        let tmp = tempfile::tempdir().unwrap();
        let store = VectorStore::open(&tmp.path().join("records.redb")).unwrap();
        (tmp, store)
    }

    fn record(id: u64, vector: Vec<f32>, date: &str) -> VectorRecord {
        VectorRecord {
            id,
            vector,
            title: format!("Post {id}"),
            body: format!("Body of post {id}."),
            published_at: date.to_string(),
            permalink: format!("https://example.com/?p={id}"),
            categories: vec!["News".to_string()],
            tags: vec![],
            inserted_at: 0,
        }
    }

    #[test]
    fn exists_partitions_strictly() {
        let (_tmp, store) = test_store();
        store
            .upsert(&[
                record(1, vec![1.0, 0.0], "2024-01-01"),
                record(3, vec![0.0, 1.0], "2024-01-02"),
            ])
            .unwrap();

        let ids = [1, 2, 3, 4];
        let partition = store.exists(&ids).unwrap();
        assert_eq!(partition.existing, vec![1, 3]);
        assert_eq!(partition.missing, vec![2, 4]);

        // Union equals input, intersection is empty.
        let mut all: Vec<u64> = partition
            .existing
            .iter()
            .chain(partition.missing.iter())
            .copied()
            .collect();
        all.sort_unstable();
        assert_eq!(all, ids.to_vec());
    }

    #[test]
    fn exists_collapses_duplicates() {
        let (_tmp, store) = test_store();
        store
            .upsert(&[record(1, vec![1.0], "2024-01-01")])
            .unwrap();

        let partition = store.exists(&[1, 1, 2, 2, 2]).unwrap();
        assert_eq!(partition.existing, vec![1]);
        assert_eq!(partition.missing, vec![2]);
    }

    #[test]
    fn exists_on_empty_store() {
        let (_tmp, store) = test_store();
        let partition = store.exists(&[5, 6]).unwrap();
        assert!(partition.existing.is_empty());
        assert_eq!(partition.missing, vec![5, 6]);
    }

    #[test]
    fn upsert_replaces_by_id() {
        let (_tmp, store) = test_store();
        store
            .upsert(&[record(7, vec![1.0, 0.0], "2024-01-01")])
            .unwrap();
        let mut updated = record(7, vec![0.0, 1.0], "2024-02-01");
        updated.title = "Updated".to_string();
        store.upsert(&[updated.clone()]).unwrap();

        assert_eq!(store.count().unwrap(), 1);
        let records = store.get_by_ids(&[7]).unwrap();
        let stored = &records[&7];
        assert_eq!(stored.vector, vec![0.0, 1.0]);
        assert_eq!(stored.title, "Updated");
        assert_eq!(stored.published_at, "2024-02-01");
    }

    #[test]
    fn upsert_stamps_insertion_time() {
        let (_tmp, store) = test_store();
        store
            .upsert(&[record(1, vec![1.0], "2024-01-01")])
            .unwrap();
        let stored = store.get_by_ids(&[1]).unwrap().remove(&1).unwrap();
        assert!(stored.inserted_at > 0);
    }

    #[test]
    fn upsert_rejects_dimension_mismatch() {
        let (_tmp, store) = test_store();
        store
            .upsert(&[record(1, vec![1.0, 0.0], "2024-01-01")])
            .unwrap();

        let err = store
            .upsert(&[record(2, vec![1.0, 0.0, 0.0], "2024-01-02")])
            .unwrap_err();
        assert_eq!(err.kind(), "schema_mismatch");
    }

    #[test]
    fn upsert_rejects_invalid_records() {
        let (_tmp, store) = test_store();
        let err = store
            .upsert(&[record(0, vec![1.0], "2024-01-01")])
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_input");

        let err = store
            .upsert(&[record(1, vec![], "2024-01-01")])
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
    }

    #[test]
    fn get_by_ids_skips_missing() {
        let (_tmp, store) = test_store();
        store
            .upsert(&[record(1, vec![1.0], "2024-01-01")])
            .unwrap();

        let records = store.get_by_ids(&[1, 99]).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records.contains_key(&1));
        assert!(!records.contains_key(&99));
    }

    #[test]
    fn search_ranks_identical_above_orthogonal() {
        let (_tmp, store) = test_store();
        store
            .upsert(&[
                record(1, vec![1.0, 0.0], "2024-01-01"),
                record(2, vec![0.0, 1.0], "2024-01-02"),
            ])
            .unwrap();

        let results = store
            .search(&[1.0, 0.0], 2, &DocumentFilter::default())
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0.id, 1);
        assert!(results[0].1 > results[1].1);
        assert!((results[0].1 - 1.0).abs() < 1e-6);
        assert!(results[1].1.abs() < 1e-6);
    }

    #[test]
    fn search_breaks_ties_by_recency() {
        let (_tmp, store) = test_store();
        store
            .upsert(&[
                record(1, vec![1.0, 0.0], "2024-01-01"),
                record(2, vec![1.0, 0.0], "2024-06-01"),
            ])
            .unwrap();

        let results = store
            .search(&[1.0, 0.0], 2, &DocumentFilter::default())
            .unwrap();
        assert_eq!(results[0].0.id, 2, "newer record wins the tie");
        assert_eq!(results[1].0.id, 1);
    }

    #[test]
    fn search_applies_date_filter() {
        let (_tmp, store) = test_store();
        store
            .upsert(&[
                record(1, vec![1.0, 0.0], "2024-01-05"),
                record(2, vec![1.0, 0.0], "2024-01-20"),
                record(3, vec![1.0, 0.0], "2024-03-01"),
                record(4, vec![1.0, 0.0], "2023-12-01"),
                record(5, vec![1.0, 0.0], "2024-01-31"),
            ])
            .unwrap();

        let filter = DocumentFilter {
            date_after: Some("2024-01-01".into()),
            date_before: Some("2024-01-31".into()),
            limit: None,
        };
        let results = store.search(&[1.0, 0.0], 5, &filter).unwrap();
        let mut ids: Vec<u64> = results.iter().map(|(r, _)| r.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 5]);
    }

    #[test]
    fn filtered_search_tolerates_nonstandard_stored_dates() {
        let (_tmp, store) = test_store();
        // Upsert does not validate dates, so a record like this can land
        // in the store; a filtered search must skip it, not panic.
        store
            .upsert(&[
                record(1, vec![1.0, 0.0], "令和六年一月三十一日"),
                record(2, vec![1.0, 0.0], "2024-01-15"),
            ])
            .unwrap();

        let filter = DocumentFilter {
            date_after: None,
            date_before: Some("2024-01-31".into()),
            limit: None,
        };
        let results = store.search(&[1.0, 0.0], 5, &filter).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0.id, 2);
    }

    #[test]
    fn search_truncates_to_k() {
        let (_tmp, store) = test_store();
        let records: Vec<VectorRecord> = (1..=10)
            .map(|i| record(i, vec![1.0, 0.0], "2024-01-01"))
            .collect();
        store.upsert(&records).unwrap();

        let results = store
            .search(&[1.0, 0.0], 3, &DocumentFilter::default())
            .unwrap();
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn search_empty_store_is_empty_not_error() {
        let (_tmp, store) = test_store();
        let results = store
            .search(&[1.0, 0.0], 5, &DocumentFilter::default())
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn search_rejects_wrong_dimension_query() {
        let (_tmp, store) = test_store();
        store
            .upsert(&[record(1, vec![1.0, 0.0], "2024-01-01")])
            .unwrap();

        let err = store
            .search(&[1.0, 0.0, 0.0], 5, &DocumentFilter::default())
            .unwrap_err();
        assert_eq!(err.kind(), "schema_mismatch");
    }

    #[test]
    fn zero_timeout_reports_timeout() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("records.redb");
        {
            let store = VectorStore::open(&path).unwrap();
            store
                .upsert(&[record(1, vec![1.0], "2024-01-01")])
                .unwrap();
        }
        let store = VectorStore::open_with(
            &path,
            StoreOptions {
                op_timeout: Duration::ZERO,
                ..StoreOptions::default()
            },
        )
        .unwrap();

        let err = store.exists(&[1]).unwrap_err();
        assert_eq!(err.kind(), "timeout");
        let err = store
            .search(&[1.0], 1, &DocumentFilter::default())
            .unwrap_err();
        assert_eq!(err.kind(), "timeout");
    }

    #[test]
    fn purge_removes_records() {
        let (_tmp, store) = test_store();
        store
            .upsert(&[
                record(1, vec![1.0], "2024-01-01"),
                record(2, vec![2.0], "2024-01-02"),
            ])
            .unwrap();

        assert_eq!(store.purge(&[1, 99]).unwrap(), 1);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn reopen_preserves_records_and_precision() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("records.redb");
        {
            let store = VectorStore::open_with(
                &path,
                StoreOptions {
                    timestamp_precision: TimestampPrecision::Millis,
                    ..StoreOptions::default()
                },
            )
            .unwrap();
            store
                .upsert(&[record(1, vec![1.0, 2.0], "2024-01-01")])
                .unwrap();
        }
        {
            // Options ask for micros but the table was created at millis;
            // the recorded precision wins.
            let store = VectorStore::open(&path).unwrap();
            assert_eq!(
                store.timestamp_precision(),
                TimestampPrecision::Millis
            );
            let records = store.get_by_ids(&[1]).unwrap();
            assert_eq!(records[&1].vector, vec![1.0, 2.0]);
        }
    }

    #[test]
    fn migration_preserves_every_field() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("records.redb");
        let mut store = VectorStore::open_with(
            &path,
            StoreOptions {
                timestamp_precision: TimestampPrecision::Millis,
                ..StoreOptions::default()
            },
        )
        .unwrap();

        let mut original = record(1, vec![0.5, -0.5], "2024-01-01");
        original.categories = vec!["A".into(), "B".into()];
        original.tags = vec!["t".into()];
        store.upsert(&[original.clone()]).unwrap();
        let before = store.get_by_ids(&[1]).unwrap().remove(&1).unwrap();

        let report = store
            .migrate_timestamp_precision(TimestampPrecision::Micros)
            .unwrap();
        assert_eq!(report, MigrationReport { migrated: 1, changed: true });
        assert_eq!(store.timestamp_precision(), TimestampPrecision::Micros);

        let after = store.get_by_ids(&[1]).unwrap().remove(&1).unwrap();
        assert_eq!(after.vector, before.vector);
        assert_eq!(after.title, before.title);
        assert_eq!(after.body, before.body);
        assert_eq!(after.published_at, before.published_at);
        assert_eq!(after.permalink, before.permalink);
        assert_eq!(after.categories, before.categories);
        assert_eq!(after.tags, before.tags);
        assert_eq!(after.inserted_at, before.inserted_at * 1000);

        // Precision survives reopen.
        drop(store);
        let store = VectorStore::open(&path).unwrap();
        assert_eq!(store.timestamp_precision(), TimestampPrecision::Micros);
    }

    #[test]
    fn migration_is_idempotent() {
        let (_tmp, mut store) = test_store();
        store
            .upsert(&[record(1, vec![1.0], "2024-01-01")])
            .unwrap();

        // Store defaults to micros; migrating to micros is a no-op.
        let report = store
            .migrate_timestamp_precision(TimestampPrecision::Micros)
            .unwrap();
        assert_eq!(report, MigrationReport { migrated: 0, changed: false });

        let report = store
            .migrate_timestamp_precision(TimestampPrecision::Millis)
            .unwrap();
        assert!(report.changed);
        let report = store
            .migrate_timestamp_precision(TimestampPrecision::Millis)
            .unwrap();
        assert_eq!(report, MigrationReport { migrated: 0, changed: false });
    }

    #[test]
    fn stats_for_missing_and_live_store() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("records.redb");

        let empty = stats(&path).unwrap();
        assert!(!empty.exists);
        assert_eq!(empty.count, 0);

        {
            let store = VectorStore::open(&path).unwrap();
            store
                .upsert(&[
                    record(1, vec![1.0], "2024-01-01"),
                    record(2, vec![2.0], "2024-01-02"),
                ])
                .unwrap();

            // The instance method works while the handle holds the lock.
            let open = store.stats().unwrap();
            assert!(open.exists);
            assert_eq!(open.count, 2);
        }

        let live = stats(&path).unwrap();
        assert!(live.exists);
        assert_eq!(live.count, 2);
        assert!(live.size_bytes > 0);
    }

    #[test]
    fn decode_handles_unaligned_buffers() {
        let original = record(3, vec![1.5, -2.25, 0.125], "2024-04-01");
        let encoded = encode_record(&original, 42);

        // Offset the encoded bytes by one so the vector region cannot be
        // 4-byte aligned, as redb value slices need not be.
        let mut shifted = vec![0u8];
        shifted.extend_from_slice(&encoded);

        let decoded = decode_record(3, &shifted[1..]).unwrap();
        assert_eq!(decoded.vector, vec![1.5, -2.25, 0.125]);
        assert_eq!(decoded.inserted_at, 42);
        assert_eq!(decoded.published_at, "2024-04-01");
    }

    #[test]
    fn cosine_similarity_properties() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!(
            (cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6
        );
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn precision_parse_and_display() {
        assert_eq!(
            TimestampPrecision::parse("us").unwrap(),
            TimestampPrecision::Micros
        );
        assert_eq!(
            TimestampPrecision::parse("ms").unwrap(),
            TimestampPrecision::Millis
        );
        assert!(TimestampPrecision::parse("ns").is_err());
        assert_eq!(TimestampPrecision::Micros.as_str(), "us");
    }
}
