use crate::error::Result;
use crate::types::{BackendKind, Document, SearchHit};

/// Text-to-vector capability. Must be deterministic for identical input and
/// return vectors of `dim()` entries, in input order.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed_one(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector"))
    }
}

/// Enumerable collection of documents. Identifiers must be unique per load.
pub trait DocumentSource: Send + Sync {
    fn load(&self) -> Result<Vec<Document>>;
    fn describe(&self) -> String;
}

/// Nearest-neighbour index over unit-length vectors.
///
/// `build` replaces any previous content. `search` returns hits ordered by
/// descending cosine similarity, ties in insertion order.
pub trait VectorIndex: Send + Sync {
    fn kind(&self) -> BackendKind;
    fn dim(&self) -> usize;
    fn len(&self) -> usize;
    fn build(&mut self, pairs: Vec<(String, Vec<f32>)>) -> Result<()>;
    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchHit>>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Rewrites a query before it is embedded.
pub trait QueryExpander: Send + Sync {
    fn expand(&self, query: &str) -> String;
}
