use rayon::prelude::*;
use std::collections::BinaryHeap;

use semdex_core::error::Result;
use semdex_core::traits::VectorIndex;
use semdex_core::types::{BackendKind, SearchHit};

use super::{rank_order, Matrix};

/// Rows scored per rayon task.
const BLOCK_ROWS: usize = 256;
const LANES: usize = 8;

/// Parallel blocked scan: each block keeps a bounded heap of its best rows,
/// heaps are merged at the end. Exact results, no training step.
pub struct AcceleratedIndex {
    matrix: Matrix,
}

impl AcceleratedIndex {
    pub fn new(dim: usize) -> Self {
        Self { matrix: Matrix::empty(dim) }
    }
}

/// Dot product with eight independent accumulators so the compiler can keep
/// them in one vector register.
fn dot_lanes(a: &[f32], b: &[f32]) -> f32 {
    let mut acc = [0f32; LANES];
    let a_chunks = a.chunks_exact(LANES);
    let b_chunks = b.chunks_exact(LANES);
    let tail: f32 = a_chunks.remainder().iter().zip(b_chunks.remainder()).map(|(x, y)| x * y).sum();
    for (ca, cb) in a_chunks.zip(b_chunks) {
        for i in 0..LANES {
            acc[i] += ca[i] * cb[i];
        }
    }
    acc.iter().sum::<f32>() + tail
}

/// Heap entry ordered by ranking, so the heap's maximum is the worst kept row.
#[derive(Clone, Copy, Debug)]
struct Candidate(usize, f32);

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        rank_order(&(self.0, self.1), &(other.0, other.1))
    }
}

struct TopK {
    k: usize,
    heap: BinaryHeap<Candidate>,
}

impl TopK {
    fn new(k: usize) -> Self {
        Self { k, heap: BinaryHeap::with_capacity(k + 1) }
    }

    fn push(&mut self, candidate: Candidate) {
        if self.heap.len() < self.k {
            self.heap.push(candidate);
        } else if self.heap.peek().is_some_and(|worst| candidate < *worst) {
            self.heap.pop();
            self.heap.push(candidate);
        }
    }

    fn merge(mut self, other: TopK) -> TopK {
        for c in other.heap {
            self.push(c);
        }
        self
    }

    fn into_sorted(self) -> Vec<(usize, f32)> {
        self.heap.into_sorted_vec().into_iter().map(|c| (c.0, c.1)).collect()
    }
}

impl VectorIndex for AcceleratedIndex {
    fn kind(&self) -> BackendKind {
        BackendKind::Accelerated
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
        let dim = self.matrix.dim.max(1);
        let best = self
            .matrix
            .data
            .par_chunks(dim * BLOCK_ROWS)
            .enumerate()
            .fold(
                || TopK::new(k),
                |mut acc, (block, rows)| {
                    for (j, row) in rows.chunks_exact(dim).enumerate() {
                        acc.push(Candidate(block * BLOCK_ROWS + j, dot_lanes(row, &q)));
                    }
                    acc
                },
            )
            .reduce(|| TopK::new(k), TopK::merge);
        Ok(self.matrix.hits(best.into_sorted()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dot_lanes_matches_naive_sum() {
        let a: Vec<f32> = (0..19).map(|i| i as f32 * 0.1).collect();
        let b: Vec<f32> = (0..19).map(|i| 1.0 - i as f32 * 0.05).collect();
        let naive: f32 = a.iter().zip(&b).map(|(x, y)| x * y).sum();
        assert!((dot_lanes(&a, &b) - naive).abs() < 1e-4);
    }

    #[test]
    fn top_k_keeps_best_and_orders_ties() {
        let mut top = TopK::new(2);
        for c in [Candidate(0, 0.1), Candidate(1, 0.7), Candidate(2, 0.7), Candidate(3, 0.2)] {
            top.push(c);
        }
        assert_eq!(top.into_sorted(), vec![(1, 0.7), (2, 0.7)]);
    }
}
