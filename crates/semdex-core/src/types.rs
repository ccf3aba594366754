//! Domain types shared by the cache, the index backends and the engine.

use serde::{Deserialize, Serialize};

pub type DocId = String;

/// A source document as seen by one indexing pass.
///
/// - `id`: stable identity derived from the file path (stem for top-level files)
/// - `filename`: path of the source file relative to the source root
/// - `text`: cleaned text content
/// - `content_hash`: hex digest of `text`, used to validate cache entries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    pub filename: String,
    pub text: String,
    pub content_hash: String,
}

impl Document {
    /// Build a document from already-cleaned text, computing its hash.
    pub fn new(id: impl Into<DocId>, filename: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let content_hash = crate::text::content_hash(&text);
        Self { id: id.into(), filename: filename.into(), text, content_hash }
    }
}

/// Raw output of a vector index: identifier plus cosine similarity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: DocId,
    pub score: f32,
}

/// Token overlap between a query and a matched document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchInfo {
    pub token_overlap: usize,
    pub overlap_ratio: f32,
    pub matched_tokens: Vec<String>,
}

/// A ranked search result as exposed to API callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub doc_id: DocId,
    pub filename: String,
    pub score: f32,
    pub preview: String,
    pub match_info: MatchInfo,
}

/// Which similarity backend serves queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Parallel blocked scan over a contiguous matrix.
    Accelerated,
    /// Single-threaded brute force, always available.
    Exact,
}

impl BackendKind {
    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::Accelerated => "accelerated",
            BackendKind::Exact => "exact",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Lifecycle of one engine instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    Uninitialized,
    DocsLoaded,
    IndexReady,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Health {
    pub state: EngineState,
    pub docs_loaded: usize,
    pub docs_indexed: usize,
    pub backend: BackendKind,
    pub cache_entries: usize,
}

/// Outcome of one `build_index` pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildReport {
    pub docs_indexed: usize,
    pub cache_hits: usize,
    pub computed: usize,
    pub provider_calls: usize,
    pub cache_write_failures: usize,
    pub stale_entries: usize,
    pub pruned: usize,
    /// Set when the post-build prune could not reach the cache.
    pub prune_failed: bool,
}
