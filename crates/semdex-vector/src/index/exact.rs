use semdex_core::error::Result;
use semdex_core::traits::VectorIndex;
use semdex_core::types::{BackendKind, SearchHit};

use super::{rank_order, Matrix};

/// Brute-force fallback: full inner-product vector, then a partial sort.
pub struct ExactIndex {
    matrix: Matrix,
}

impl ExactIndex {
    pub fn new(dim: usize) -> Self {
        Self { matrix: Matrix::empty(dim) }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

impl VectorIndex for ExactIndex {
    fn kind(&self) -> BackendKind {
        BackendKind::Exact
    }

    fn dim(&self) -> usize {
        self.matrix.dim
    }

    fn len(&self) -> usize {
        self.matrix.len()
    }

    fn build(&mut self, pairs: Vec<(String, Vec<f32>)>) -> Result<()> {
        self.matrix = Matrix::from_pairs(self.matrix.dim, pairs)?;
        Ok(())
    }

    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        let (q, k) = self.matrix.prepare_query(query, top_k)?;
        let mut scored: Vec<(usize, f32)> = (0..self.matrix.len()).map(|i| (i, dot(self.matrix.row(i), &q))).collect();
        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, rank_order);
            scored.truncate(k);
        }
        scored.sort_by(rank_order);
        Ok(self.matrix.hits(scored))
    }
}
