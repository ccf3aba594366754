//! Lance-backed embedding cache keyed by `doc_id` and validated by content hash.
//!
//! The cache is consulted before calling a provider and written through on
//! misses. Every write is a single `merge_insert` commit, so a crash mid-write
//! leaves previously committed rows untouched.

use arrow_array::{Array, BinaryArray, RecordBatch, RecordBatchIterator, StringArray, TimestampMillisecondArray};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{Connection, Table};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use semdex_core::error::{Error, Result};

use crate::codec::{decode_vector, encode_vector};
use crate::schema::{build_cache_schema, COL_DOC_ID, COL_EMBEDDING, COL_FILENAME, COL_HASH, COL_UPDATED_AT};
use crate::table::{ensure_table, open_db, quote};

/// Identifiers per `IN (...)` filter.
const FILTER_CHUNK: usize = 500;

#[derive(Clone, Debug, PartialEq)]
pub struct CacheEntry {
    pub doc_id: String,
    pub filename: String,
    pub content_hash: String,
    pub vector: Vec<f32>,
    pub updated_at: DateTime<Utc>,
}

/// Borrowed input for one upsert.
#[derive(Clone, Copy, Debug)]
pub struct CacheWrite<'a> {
    pub doc_id: &'a str,
    pub filename: &'a str,
    pub content_hash: &'a str,
    pub vector: &'a [f32],
}

#[derive(Clone)]
pub struct EmbeddingCache {
    conn: Connection,
    table: String,
}

impl EmbeddingCache {
    /// Connect to `uri` and create the cache table if absent.
    pub async fn open(uri: &str, table: &str) -> Result<Self> {
        let conn = open_db(uri).await?;
        ensure_table(&conn, table, build_cache_schema()).await?;
        Ok(Self { conn, table: table.to_string() })
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    async fn open_table(&self) -> Result<Table> {
        self.conn.open_table(&self.table).execute().await.map_err(Error::cache)
    }

    /// The stored vector for `doc_id`, only if its hash equals `content_hash`.
    pub async fn lookup(&self, doc_id: &str, content_hash: &str) -> Result<Option<Vec<f32>>> {
        Ok(self.lookup_many(&[(doc_id, content_hash)]).await?.remove(doc_id))
    }

    /// Vectors for every `(doc_id, content_hash)` key whose stored hash matches.
    ///
    /// Only the requested ids are scanned, and a row's embedding is decoded
    /// only when its hash matches, so a corrupt row for an edited or unrelated
    /// document reads as a miss. A corrupt row that would be a hit is `CorruptEntry`.
    pub async fn lookup_many(&self, keys: &[(&str, &str)]) -> Result<HashMap<String, Vec<f32>>> {
        let mut out = HashMap::with_capacity(keys.len());
        if keys.is_empty() {
            return Ok(out);
        }
        let expected: HashMap<&str, &str> = keys.iter().copied().collect();
        let t = self.open_table().await?;
        for chunk in keys.chunks(FILTER_CHUNK) {
            let mut stream = t
                .query()
                .only_if(id_filter(chunk.iter().map(|(id, _)| *id)))
                .select(Select::columns(&[COL_DOC_ID, COL_HASH, COL_EMBEDDING]))
                .execute()
                .await
                .map_err(Error::cache)?;
            while let Some(batch) = stream.try_next().await.map_err(Error::cache)? {
                let ids = string_column(&batch, COL_DOC_ID)?;
                let hashes = string_column(&batch, COL_HASH)?;
                let blobs = binary_column(&batch, COL_EMBEDDING)?;
                for i in 0..batch.num_rows() {
                    let id = ids.value(i);
                    if expected.get(id) != Some(&hashes.value(i)) {
                        continue;
                    }
                    if blobs.is_null(i) {
                        return Err(Error::CorruptEntry { id: id.to_string(), reason: "null embedding".to_string() });
                    }
                    out.insert(id.to_string(), decode_vector(id, blobs.value(i))?);
                }
            }
        }
        debug!(table = %self.table, requested = keys.len(), hits = out.len(), "cache lookup");
        Ok(out)
    }

    pub async fn get(&self, doc_id: &str) -> Result<Option<CacheEntry>> {
        let t = self.open_table().await?;
        let mut stream = t
            .query()
            .only_if(id_filter([doc_id]))
            .limit(1)
            .execute()
            .await
            .map_err(Error::cache)?;
        while let Some(batch) = stream.try_next().await.map_err(Error::cache)? {
            if let Some(entry) = entries_from_batch(&batch)?.into_iter().next() {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    pub async fn store(&self, doc_id: &str, filename: &str, content_hash: &str, vector: &[f32]) -> Result<()> {
        self.store_many(&[CacheWrite { doc_id, filename, content_hash, vector }]).await
    }

    /// Upsert several entries in one commit. Identifiers must be distinct.
    pub async fn store_many(&self, writes: &[CacheWrite<'_>]) -> Result<()> {
        if writes.is_empty() {
            return Ok(());
        }
        let now = Utc::now().timestamp_millis();
        let blobs: Vec<Vec<u8>> = writes.iter().map(|w| encode_vector(w.vector)).collect();
        let batch = RecordBatch::try_new(
            build_cache_schema(),
            vec![
                Arc::new(StringArray::from(writes.iter().map(|w| w.doc_id).collect::<Vec<_>>())),
                Arc::new(StringArray::from(writes.iter().map(|w| w.filename).collect::<Vec<_>>())),
                Arc::new(StringArray::from(writes.iter().map(|w| w.content_hash).collect::<Vec<_>>())),
                Arc::new(BinaryArray::from(blobs.iter().map(Vec::as_slice).collect::<Vec<_>>())),
                Arc::new(TimestampMillisecondArray::from(vec![now; writes.len()])),
            ],
        )
        .map_err(Error::cache)?;
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), build_cache_schema()));
        let t = self.open_table().await?;
        let mut mi = t.merge_insert(&[COL_DOC_ID]);
        mi.when_matched_update_all(None).when_not_matched_insert_all();
        mi.execute(reader).await.map_err(Error::cache)?;
        debug!(table = %self.table, rows = writes.len(), "cache upsert");
        Ok(())
    }

    pub async fn count(&self) -> Result<usize> {
        self.open_table().await?.count_rows(None).await.map_err(Error::cache)
    }

    pub async fn doc_ids(&self) -> Result<Vec<String>> {
        let t = self.open_table().await?;
        let mut stream = t
            .query()
            .select(Select::columns(&[COL_DOC_ID]))
            .execute()
            .await
            .map_err(Error::cache)?;
        let mut ids = Vec::new();
        while let Some(batch) = stream.try_next().await.map_err(Error::cache)? {
            let col = string_column(&batch, COL_DOC_ID)?;
            ids.extend((0..batch.num_rows()).map(|i| col.value(i).to_string()));
        }
        Ok(ids)
    }

    pub async fn all(&self) -> Result<Vec<CacheEntry>> {
        let t = self.open_table().await?;
        let mut stream = t.query().execute().await.map_err(Error::cache)?;
        let mut out = Vec::new();
        while let Some(batch) = stream.try_next().await.map_err(Error::cache)? {
            out.extend(entries_from_batch(&batch)?);
        }
        Ok(out)
    }

    /// Delete entries for `doc_ids`; returns how many rows existed.
    pub async fn remove(&self, doc_ids: &[String]) -> Result<usize> {
        if doc_ids.is_empty() {
            return Ok(0);
        }
        let t = self.open_table().await?;
        let mut removed = 0usize;
        for chunk in doc_ids.chunks(FILTER_CHUNK) {
            let filter = id_filter(chunk.iter().map(String::as_str));
            removed += t.count_rows(Some(filter.clone())).await.map_err(Error::cache)?;
            t.delete(&filter).await.map_err(Error::cache)?;
        }
        debug!(table = %self.table, removed, "cache entries removed");
        Ok(removed)
    }
}

fn id_filter<'a>(ids: impl IntoIterator<Item = &'a str>) -> String {
    let list = ids.into_iter().map(quote).collect::<Vec<_>>().join(",");
    format!("{} IN ({})", COL_DOC_ID, list)
}

fn binary_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a BinaryArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<BinaryArray>())
        .ok_or_else(|| Error::Cache(format!("column '{}' missing or not binary", name)))
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| Error::Cache(format!("column '{}' missing or not utf8", name)))
}

fn entries_from_batch(batch: &RecordBatch) -> Result<Vec<CacheEntry>> {
    let ids = string_column(batch, COL_DOC_ID)?;
    let filenames = string_column(batch, COL_FILENAME)?;
    let hashes = string_column(batch, COL_HASH)?;
    let blobs = binary_column(batch, COL_EMBEDDING)?;
    let times = batch
        .column_by_name(COL_UPDATED_AT)
        .and_then(|c| c.as_any().downcast_ref::<TimestampMillisecondArray>())
        .ok_or_else(|| Error::Cache(format!("column '{}' missing or not a timestamp", COL_UPDATED_AT)))?;
    let mut out = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        let doc_id = ids.value(i).to_string();
        if blobs.is_null(i) {
            return Err(Error::CorruptEntry { id: doc_id, reason: "null embedding".to_string() });
        }
        let vector = decode_vector(&doc_id, blobs.value(i))?;
        let updated_at = DateTime::from_timestamp_millis(times.value(i)).unwrap_or_default();
        out.push(CacheEntry {
            filename: filenames.value(i).to_string(),
            content_hash: hashes.value(i).to_string(),
            doc_id,
            vector,
            updated_at,
        });
    }
    Ok(out)
}
