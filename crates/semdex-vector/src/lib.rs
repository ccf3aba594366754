//! Persistent embedding cache (LanceDB) and in-memory vector index backends.

pub mod cache;
pub mod codec;
pub mod index;
pub mod schema;
pub mod table;

pub use cache::{CacheEntry, CacheWrite, EmbeddingCache};
pub use index::{accelerated_available, compiled_backends, new_index, normalize, select_backend, ExactIndex};

#[cfg(feature = "parallel")]
pub use index::AcceleratedIndex;
