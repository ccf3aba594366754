use arrow_schema::{DataType, Field, Schema, TimeUnit};
use std::sync::Arc;

pub const COL_DOC_ID: &str = "doc_id";
pub const COL_FILENAME: &str = "filename";
pub const COL_HASH: &str = "hash";
pub const COL_EMBEDDING: &str = "embedding";
pub const COL_UPDATED_AT: &str = "updated_at";

/// One row per document: `doc_id` is the merge key, `embedding` holds the
/// little-endian f32 encoding of the vector.
pub fn build_cache_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new(COL_DOC_ID, DataType::Utf8, false),
        Field::new(COL_FILENAME, DataType::Utf8, false),
        Field::new(COL_HASH, DataType::Utf8, false),
        Field::new(COL_EMBEDDING, DataType::Binary, false),
        Field::new(COL_UPDATED_AT, DataType::Timestamp(TimeUnit::Millisecond, None), false),
    ]))
}
