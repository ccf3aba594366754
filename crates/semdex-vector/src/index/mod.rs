//! Vector index backends behind `semdex_core::traits::VectorIndex`.
//!
//! Both backends store the same row-major matrix of unit vectors and rank
//! with the same total order (score descending, then insertion order), so
//! they agree on identifiers and differ in scores only by summation order.

use std::cmp::Ordering;

use tracing::{info, warn};

use semdex_core::config::BackendPreference;
use semdex_core::error::{Error, Result};
use semdex_core::traits::VectorIndex;
use semdex_core::types::{BackendKind, SearchHit};

#[cfg(feature = "parallel")]
pub mod accelerated;
pub mod exact;

#[cfg(feature = "parallel")]
pub use accelerated::AcceleratedIndex;
pub use exact::ExactIndex;

/// Scale `v` to unit length in place. Zero vectors stay zero.
pub fn normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Row-major storage of normalised vectors plus their identifiers.
#[derive(Debug, Clone, Default)]
pub(crate) struct Matrix {
    pub dim: usize,
    pub ids: Vec<String>,
    pub data: Vec<f32>,
}

impl Matrix {
    pub fn empty(dim: usize) -> Self {
        Self { dim, ids: Vec::new(), data: Vec::new() }
    }

    pub fn from_pairs(dim: usize, pairs: Vec<(String, Vec<f32>)>) -> Result<Self> {
        let mut ids = Vec::with_capacity(pairs.len());
        let mut data = Vec::with_capacity(pairs.len() * dim);
        for (id, mut vector) in pairs {
            if vector.len() != dim {
                return Err(Error::DimensionMismatch { id, expected: dim, actual: vector.len() });
            }
            if vector.iter().any(|x| !x.is_finite()) {
                return Err(Error::InvalidArgument(format!("vector for '{}' has non-finite values", id)));
            }
            normalize(&mut vector);
            data.extend_from_slice(&vector);
            ids.push(id);
        }
        Ok(Self { dim, ids, data })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.dim..(i + 1) * self.dim]
    }

    /// Validate a query and return its normalised copy plus the effective k.
    pub fn prepare_query(&self, query: &[f32], top_k: usize) -> Result<(Vec<f32>, usize)> {
        if top_k == 0 {
            return Err(Error::InvalidArgument("top_k must be at least 1".to_string()));
        }
        if self.ids.is_empty() {
            return Err(Error::EmptyIndex);
        }
        if query.len() != self.dim {
            return Err(Error::DimensionMismatch { id: "<query>".to_string(), expected: self.dim, actual: query.len() });
        }
        let mut q = query.to_vec();
        normalize(&mut q);
        Ok((q, top_k.min(self.ids.len())))
    }

    pub fn hits(&self, ranked: impl IntoIterator<Item = (usize, f32)>) -> Vec<SearchHit> {
        ranked
            .into_iter()
            .map(|(i, score)| SearchHit { id: self.ids[i].clone(), score })
            .collect()
    }
}

/// Higher score first; equal scores keep insertion order.
pub(crate) fn rank_order(a: &(usize, f32), b: &(usize, f32)) -> Ordering {
    b.1.total_cmp(&a.1).then(a.0.cmp(&b.0))
}

/// Backends compiled into this build.
pub fn compiled_backends() -> Vec<BackendKind> {
    let mut kinds = Vec::with_capacity(2);
    #[cfg(feature = "parallel")]
    kinds.push(BackendKind::Accelerated);
    kinds.push(BackendKind::Exact);
    kinds
}

/// Whether the accelerated backend is compiled in and has more than one
/// worker thread to spread the scan over.
pub fn accelerated_available() -> bool {
    #[cfg(feature = "parallel")]
    {
        rayon::current_num_threads() > 1
    }
    #[cfg(not(feature = "parallel"))]
    {
        false
    }
}

/// Resolve a configured preference into a concrete backend by probing once.
pub fn select_backend(preference: BackendPreference) -> BackendKind {
    let kind = match preference {
        BackendPreference::Exact => BackendKind::Exact,
        BackendPreference::Auto | BackendPreference::Accelerated if accelerated_available() => BackendKind::Accelerated,
        BackendPreference::Accelerated => {
            warn!("accelerated index unavailable, falling back to exact scan");
            BackendKind::Exact
        }
        BackendPreference::Auto => BackendKind::Exact,
    };
    info!(backend = %kind, ?preference, "vector index backend selected");
    kind
}

/// Construct an empty index of the given kind.
pub fn new_index(kind: BackendKind, dim: usize) -> Box<dyn VectorIndex> {
    match kind {
        #[cfg(feature = "parallel")]
        BackendKind::Accelerated => Box::new(AcceleratedIndex::new(dim)),
        #[cfg(not(feature = "parallel"))]
        BackendKind::Accelerated => Box::new(ExactIndex::new(dim)),
        BackendKind::Exact => Box::new(ExactIndex::new(dim)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_handles_zero_vectors() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6 && (v[1] - 0.8).abs() < 1e-6);
        let mut z = vec![0.0; 3];
        normalize(&mut z);
        assert_eq!(z, vec![0.0; 3]);
    }

    #[test]
    fn rank_order_breaks_ties_by_position() {
        let mut v = vec![(2, 0.5), (0, 0.5), (1, 0.9)];
        v.sort_by(rank_order);
        assert_eq!(v, vec![(1, 0.9), (0, 0.5), (2, 0.5)]);
    }

    #[test]
    fn exact_preference_never_probes_accelerated() {
        assert_eq!(select_backend(BackendPreference::Exact), BackendKind::Exact);
    }
}
