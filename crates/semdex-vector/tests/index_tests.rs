use semdex_core::traits::VectorIndex;
use semdex_core::types::BackendKind;
use semdex_core::Error;
use semdex_vector::{compiled_backends, new_index, normalize};

/// Small deterministic generator so the corpus is the same on every run.
fn pseudo_vectors(n: usize, dim: usize, seed: u64) -> Vec<(String, Vec<f32>)> {
    let mut state = seed;
    (0..n)
        .map(|i| {
            let v = (0..dim)
                .map(|_| {
                    state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                    ((state >> 33) as f32 / (1u64 << 31) as f32) - 0.5
                })
                .collect();
            (format!("doc-{i}"), v)
        })
        .collect()
}

fn built(kind: BackendKind, dim: usize, pairs: Vec<(String, Vec<f32>)>) -> Box<dyn VectorIndex> {
    let mut index = new_index(kind, dim);
    index.build(pairs).unwrap();
    index
}

#[test]
fn backends_agree_on_ids_and_scores() {
    let corpus = pseudo_vectors(1500, 24, 7);
    let queries = pseudo_vectors(10, 24, 99);
    let indexes: Vec<_> = compiled_backends().into_iter().map(|k| built(k, 24, corpus.clone())).collect();

    for (_, q) in &queries {
        let reference = indexes[0].search(q, 10).unwrap();
        for other in &indexes[1..] {
            let hits = other.search(q, 10).unwrap();
            assert_eq!(hits.len(), reference.len());
            for (a, b) in reference.iter().zip(&hits) {
                assert_eq!(a.id, b.id);
                assert!((a.score - b.score).abs() < 1e-4);
            }
        }
    }
}

#[test]
fn scores_are_cosine_similarities_in_descending_order() {
    for kind in compiled_backends() {
        let index = built(
            kind,
            2,
            vec![("x".into(), vec![10.0, 0.0]), ("diag".into(), vec![1.0, 1.0]), ("y".into(), vec![0.0, 3.0])],
        );
        let hits = index.search(&[2.0, 0.0], 3).unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["x", "diag", "y"], "{kind}");
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert!((hits[1].score - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);
        assert!(hits[2].score.abs() < 1e-6);
    }
}

#[test]
fn ties_keep_insertion_order() {
    for kind in compiled_backends() {
        let pairs = (0..20).map(|i| (format!("t{i:02}"), vec![1.0, 0.0])).collect();
        let index = built(kind, 2, pairs);
        let ids: Vec<_> = index.search(&[1.0, 0.0], 5).unwrap().into_iter().map(|h| h.id).collect();
        assert_eq!(ids, vec!["t00", "t01", "t02", "t03", "t04"], "{kind}");
    }
}

#[test]
fn top_k_larger_than_corpus_returns_everything() {
    for kind in compiled_backends() {
        let index = built(kind, 4, pseudo_vectors(3, 4, 1));
        assert_eq!(index.len(), 3);
        assert_eq!(index.search(&[1.0, 0.0, 0.0, 0.0], 50).unwrap().len(), 3);
    }
}

#[test]
fn invalid_queries_are_rejected() {
    for kind in compiled_backends() {
        let empty = new_index(kind, 3);
        assert!(empty.is_empty());
        assert!(matches!(empty.search(&[1.0, 0.0, 0.0], 1), Err(Error::EmptyIndex)));

        let index = built(kind, 3, pseudo_vectors(4, 3, 5));
        assert!(matches!(index.search(&[1.0, 0.0, 0.0], 0), Err(Error::InvalidArgument(_))));
        assert!(matches!(
            index.search(&[1.0, 0.0], 1),
            Err(Error::DimensionMismatch { expected: 3, actual: 2, .. })
        ));
    }
}

#[test]
fn build_rejects_wrong_dimension_and_replaces_content() {
    for kind in compiled_backends() {
        let mut index = new_index(kind, 3);
        let err = index.build(vec![("bad".into(), vec![1.0, 2.0])]).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { ref id, .. } if id == "bad"));

        index.build(pseudo_vectors(5, 3, 2)).unwrap();
        index.build(vec![("only".into(), vec![0.0, 1.0, 0.0])]).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.search(&[0.0, 1.0, 0.0], 3).unwrap()[0].id, "only");
    }
}

#[test]
fn zero_vectors_score_zero() {
    let mut v = vec![0.0; 3];
    normalize(&mut v);
    for kind in compiled_backends() {
        let index = built(kind, 3, vec![("zero".into(), v.clone()), ("one".into(), vec![1.0, 0.0, 0.0])]);
        let hits = index.search(&[1.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(hits[0].id, "one");
        assert_eq!(hits[1].score, 0.0);
    }
}
