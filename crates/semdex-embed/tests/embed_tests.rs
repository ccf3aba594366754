use semdex_core::config::EmbeddingSettings;
use semdex_core::traits::Embedder;
use semdex_embed::{get_default_embedder, HashingEmbedder};

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[test]
fn fake_embedder_shapes_and_determinism() {
    let settings = EmbeddingSettings { use_fake: true, fake_dim: 384, ..Default::default() };
    let embedder = get_default_embedder(&settings, None).expect("embedder");
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(embedder.dim(), 384);
    assert_eq!(v1.len(), 384, "embedding dim is 384");

    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
}

#[test]
fn shared_words_score_higher_than_disjoint_text() {
    let embedder = HashingEmbedder::new(256);
    let base = embedder.embed_one("cats are mammals").unwrap();
    let near = embedder.embed_one("cats mammals").unwrap();
    let far = embedder.embed_one("stock market rose today").unwrap();
    assert!(cosine(&base, &near) > cosine(&base, &far));
}

#[test]
fn empty_text_yields_zero_vector_and_batches_keep_order() {
    let embedder = HashingEmbedder::new(16);
    let out = embedder
        .embed_batch(&["".to_string(), "alpha".to_string(), "beta".to_string()])
        .unwrap();
    assert_eq!(out.len(), 3);
    assert!(out[0].iter().all(|x| *x == 0.0));
    assert_eq!(out[1], embedder.embed_one("alpha").unwrap());
    assert_eq!(out[2], embedder.embed_one("beta").unwrap());
}
