//! Search engine orchestration.
//!
//! One engine owns one corpus and one live index snapshot. Builds run off to
//! the side and publish a complete snapshot with a single pointer swap, so
//! concurrent searches see either the previous index or the new one.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use semdex_core::config::Settings;
use semdex_core::error::{Error, Result};
use semdex_core::source::DirectorySource;
use semdex_core::text::{match_info, preview};
use semdex_core::traits::{DocumentSource, Embedder, QueryExpander, VectorIndex};
use semdex_core::types::{BackendKind, BuildReport, Document, EngineState, Health, SearchResult};
use semdex_vector::{new_index, select_backend, CacheWrite, EmbeddingCache};

use crate::expand::{NoExpansion, SynonymExpander};

#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Upper bound on texts per provider call.
    pub batch_size: usize,
    /// `None` lets provider calls run without a limit.
    pub provider_timeout: Option<Duration>,
    pub preview_chars: usize,
    /// Delete cache entries for documents no longer in the corpus after each build.
    pub prune_stale: bool,
    pub show_progress: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            batch_size: 64,
            provider_timeout: Some(Duration::from_secs(120)),
            preview_chars: 200,
            prune_stale: false,
            show_progress: false,
        }
    }
}

impl EngineOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            batch_size: settings.embedding.batch_size.max(1),
            provider_timeout: settings.embedding.timeout(),
            preview_chars: settings.search.preview_chars,
            prune_stale: settings.cache.prune_stale,
            show_progress: false,
        }
    }
}

#[derive(Default)]
struct Corpus {
    docs: Option<Arc<Vec<Document>>>,
    /// Bumped on every successful load.
    generation: u64,
}

/// A fully built index plus the documents it was built from.
struct IndexSnapshot {
    generation: u64,
    index: Box<dyn VectorIndex>,
    docs: Arc<Vec<Document>>,
    positions: HashMap<String, usize>,
}

impl IndexSnapshot {
    fn document(&self, id: &str) -> Option<&Document> {
        self.positions.get(id).map(|&i| &self.docs[i])
    }
}

pub struct SearchEngine {
    source: Box<dyn DocumentSource>,
    embedder: Arc<dyn Embedder>,
    cache: EmbeddingCache,
    backend: BackendKind,
    expander: Box<dyn QueryExpander>,
    options: EngineOptions,
    corpus: RwLock<Corpus>,
    live: RwLock<Option<Arc<IndexSnapshot>>>,
    build_lock: tokio::sync::Mutex<()>,
}

impl SearchEngine {
    pub fn new(
        source: Box<dyn DocumentSource>,
        embedder: Arc<dyn Embedder>,
        cache: EmbeddingCache,
        backend: BackendKind,
    ) -> Self {
        Self {
            source,
            embedder,
            cache,
            backend,
            expander: Box::new(NoExpansion),
            options: EngineOptions::default(),
            corpus: RwLock::new(Corpus::default()),
            live: RwLock::new(None),
            build_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_expander(mut self, expander: Box<dyn QueryExpander>) -> Self {
        self.expander = expander;
        self
    }

    /// Wire a directory source, the cache store and the probed backend from settings.
    pub async fn from_settings(settings: &Settings, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let source = DirectorySource::new(settings.docs_dir()).with_extension(&settings.data.extension);
        let cache = EmbeddingCache::open(&settings.cache_uri(), &settings.cache.table).await?;
        let backend = select_backend(settings.index.backend);
        let expander = SynonymExpander::new(settings.search.synonyms.clone());
        Ok(Self::new(Box::new(source), embedder, cache, backend)
            .with_options(EngineOptions::from_settings(settings))
            .with_expander(Box::new(expander)))
    }

    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    pub fn state(&self) -> EngineState {
        let corpus = self.corpus.read();
        if corpus.docs.is_none() {
            return EngineState::Uninitialized;
        }
        match self.live.read().as_ref() {
            Some(snapshot) if snapshot.generation == corpus.generation => EngineState::IndexReady,
            _ => EngineState::DocsLoaded,
        }
    }

    /// Read every document from the source. Leaves the cache and the live index alone.
    pub fn load_docs(&self) -> Result<usize> {
        let start = Instant::now();
        let docs = self.source.load()?;
        let count = docs.len();
        {
            let mut corpus = self.corpus.write();
            corpus.docs = Some(Arc::new(docs));
            corpus.generation += 1;
        }
        info!(source = %self.source.describe(), docs = count, elapsed_ms = start.elapsed().as_millis() as u64, "documents loaded");
        Ok(count)
    }

    pub fn docs_count(&self) -> usize {
        self.corpus.read().docs.as_ref().map_or(0, |d| d.len())
    }

    pub fn indexed_count(&self) -> usize {
        self.live.read().as_ref().map_or(0, |s| s.index.len())
    }

    /// Embed the loaded corpus, reusing cached vectors whose content hash
    /// still matches, and swap in a freshly built index.
    ///
    /// Fails with `Busy` while another build on this engine is in flight.
    pub async fn build_index(&self, force_recompute: bool) -> Result<BuildReport> {
        let _guard = self.build_lock.try_lock().map_err(|_| Error::Busy)?;
        let (generation, docs) = {
            let corpus = self.corpus.read();
            (corpus.generation, corpus.docs.clone().ok_or(Error::NotLoaded)?)
        };
        let start = Instant::now();
        let dim = self.embedder.dim();
        let mut report = BuildReport::default();

        let corpus_ids: HashSet<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        report.stale_entries = self
            .cached_ids()
            .await
            .iter()
            .filter(|id| !corpus_ids.contains(id.as_str()))
            .count();
        let mut cached = if force_recompute { HashMap::new() } else { self.cached_vectors(&docs).await? };

        // Classify: cache hits are final, everything else waits for the provider.
        let mut vectors: Vec<Option<Vec<f32>>> = vec![None; docs.len()];
        let mut pending: Vec<usize> = Vec::new();
        for (i, doc) in docs.iter().enumerate() {
            match cached.remove(&doc.id) {
                Some(vector) => {
                    if vector.len() != dim {
                        return Err(Error::DimensionMismatch { id: doc.id.clone(), expected: dim, actual: vector.len() });
                    }
                    vectors[i] = Some(vector);
                    report.cache_hits += 1;
                }
                None => pending.push(i),
            }
        }
        info!(docs = docs.len(), cache_hits = report.cache_hits, misses = pending.len(), force_recompute, "classified documents");

        let progress = self.progress_bar(pending.len());
        for batch in pending.chunks(self.options.batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|&i| docs[i].text.clone()).collect();
            report.provider_calls += 1;
            let embedded = self.embed_texts(texts).await?;
            for (&i, vector) in batch.iter().zip(&embedded) {
                if vector.len() != dim {
                    return Err(Error::DimensionMismatch { id: docs[i].id.clone(), expected: dim, actual: vector.len() });
                }
            }
            let writes: Vec<CacheWrite<'_>> = batch
                .iter()
                .zip(&embedded)
                .map(|(&i, vector)| CacheWrite {
                    doc_id: &docs[i].id,
                    filename: &docs[i].filename,
                    content_hash: &docs[i].content_hash,
                    vector,
                })
                .collect();
            if let Err(e) = self.cache.store_many(&writes).await {
                warn!(error = %e, rows = writes.len(), "cache write failed, vectors will be recomputed next build");
                report.cache_write_failures += writes.len();
            }
            drop(writes);
            for (&i, vector) in batch.iter().zip(embedded) {
                vectors[i] = Some(vector);
            }
            report.computed += batch.len();
            debug!(batch = batch.len(), computed = report.computed, "provider batch embedded");
            progress.inc(batch.len() as u64);
        }
        progress.finish_and_clear();

        let mut pairs = Vec::with_capacity(docs.len());
        for (doc, vector) in docs.iter().zip(vectors) {
            let vector = vector.ok_or_else(|| Error::ProviderFailure(format!("no vector produced for '{}'", doc.id)))?;
            pairs.push((doc.id.clone(), vector));
        }
        let mut index = new_index(self.backend, dim);
        index.build(pairs)?;
        let positions = docs.iter().enumerate().map(|(i, d)| (d.id.clone(), i)).collect();
        let snapshot = Arc::new(IndexSnapshot { generation, index, docs: Arc::clone(&docs), positions });
        report.docs_indexed = snapshot.index.len();
        *self.live.write() = Some(snapshot);

        if self.options.prune_stale {
            match self.remove_stale(&docs).await {
                Ok(removed) => report.pruned = removed,
                Err(e) => {
                    warn!(error = %e, "pruning stale cache entries failed, index is live");
                    report.prune_failed = true;
                }
            }
        } else if report.stale_entries > 0 {
            info!(stale = report.stale_entries, "cache holds entries for documents no longer in the corpus");
        }
        info!(
            backend = %self.backend,
            docs_indexed = report.docs_indexed,
            cache_hits = report.cache_hits,
            computed = report.computed,
            provider_calls = report.provider_calls,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "index built"
        );
        Ok(report)
    }

    /// `load_docs` followed by `build_index`.
    pub async fn rebuild(&self, force_recompute: bool) -> Result<BuildReport> {
        self.load_docs()?;
        self.build_index(force_recompute).await
    }

    /// Rank the live index against `query`. The query itself is never cached.
    pub async fn search(&self, query: &str, top_k: usize, expand: bool) -> Result<Vec<SearchResult>> {
        if query.trim().is_empty() {
            return Err(Error::InvalidArgument("query must not be empty".to_string()));
        }
        if top_k == 0 {
            return Err(Error::InvalidArgument("top_k must be at least 1".to_string()));
        }
        let snapshot = self.live.read().clone().ok_or(Error::IndexNotBuilt)?;
        let text = if expand { self.expander.expand(query) } else { query.to_string() };
        if text != query {
            debug!(expanded = %text, "query expanded");
        }

        let embedder = Arc::clone(&self.embedder);
        let vector = self.call_provider(move || embedder.embed_one(&text)).await?;
        let hits = snapshot.index.search(&vector, top_k)?;

        let results = hits
            .into_iter()
            .filter_map(|hit| {
                let doc = snapshot.document(&hit.id)?;
                Some(SearchResult {
                    doc_id: hit.id,
                    filename: doc.filename.clone(),
                    score: hit.score,
                    preview: preview(&doc.text, self.options.preview_chars),
                    match_info: match_info(query, &doc.text),
                })
            })
            .collect::<Vec<_>>();
        debug!(results = results.len(), top_k, "search complete");
        Ok(results)
    }

    pub async fn health(&self) -> Health {
        let cache_entries = match self.cache.count().await {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "cache count unavailable");
                0
            }
        };
        Health {
            state: self.state(),
            docs_loaded: self.docs_count(),
            docs_indexed: self.indexed_count(),
            backend: self.backend,
            cache_entries,
        }
    }

    /// Delete cache entries whose identifier is absent from the loaded corpus.
    pub async fn prune_stale(&self) -> Result<usize> {
        let _guard = self.build_lock.try_lock().map_err(|_| Error::Busy)?;
        let docs = self.corpus.read().docs.clone().ok_or(Error::NotLoaded)?;
        self.remove_stale(&docs).await
    }

    async fn remove_stale(&self, docs: &[Document]) -> Result<usize> {
        let corpus_ids: HashSet<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        let stale: Vec<String> = self
            .cache
            .doc_ids()
            .await?
            .into_iter()
            .filter(|id| !corpus_ids.contains(id.as_str()))
            .collect();
        let removed = self.cache.remove(&stale).await?;
        info!(removed, "stale cache entries pruned");
        Ok(removed)
    }

    /// Cached vectors whose hash matches the document's; an unreadable store counts as empty.
    async fn cached_vectors(&self, docs: &[Document]) -> Result<HashMap<String, Vec<f32>>> {
        let keys: Vec<(&str, &str)> = docs.iter().map(|d| (d.id.as_str(), d.content_hash.as_str())).collect();
        match self.cache.lookup_many(&keys).await {
            Ok(hits) => Ok(hits),
            Err(Error::Cache(reason)) => {
                warn!(%reason, "cache unreadable, treating every document as a miss");
                Ok(HashMap::new())
            }
            Err(e) => Err(e),
        }
    }

    async fn cached_ids(&self) -> Vec<String> {
        self.cache.doc_ids().await.unwrap_or_else(|e| {
            warn!(error = %e, "cache unreadable");
            Vec::new()
        })
    }

    /// One provider call, off the async workers and bounded by the configured timeout.
    async fn call_provider<T, F>(&self, call: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    {
        let task = tokio::task::spawn_blocking(call);
        let joined = match self.options.provider_timeout {
            Some(limit) => tokio::time::timeout(limit, task).await.map_err(|_| Error::ProviderTimeout(limit))?,
            None => task.await,
        };
        joined
            .map_err(|e| Error::ProviderFailure(format!("provider task failed: {e}")))?
            .map_err(|e| Error::ProviderFailure(format!("{e:#}")))
    }

    async fn embed_texts(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let expected = texts.len();
        let embedder = Arc::clone(&self.embedder);
        let vectors = self.call_provider(move || embedder.embed_batch(&texts)).await?;
        if vectors.len() != expected {
            return Err(Error::ProviderFailure(format!(
                "provider returned {} vectors for {} texts",
                vectors.len(),
                expected
            )));
        }
        Ok(vectors)
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.options.show_progress || len == 0 {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} docs ({percent}%) {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb.set_message("embedding");
        pb
    }
}
