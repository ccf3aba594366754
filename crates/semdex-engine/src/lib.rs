//! semdex-engine
//!
//! Corpus lifecycle, cache-aware index builds and query execution on top of
//! the embedding cache and vector index backends.
//!
//! State machine: `Uninitialized -> DocsLoaded -> IndexReady`. At most one
//! build runs per engine; a concurrent `build_index` fails with `Busy`.

pub mod engine;
pub mod expand;

pub use engine::{EngineOptions, SearchEngine};
pub use expand::{NoExpansion, SynonymExpander};
