use candle_core::{DType, Device, Tensor};
use semdex_embed::{l2_normalize, masked_mean, masked_mean_l2};

#[test]
fn masked_mean_ignores_padding() {
    let dev = Device::Cpu;
    // Batch of two sequences, three tokens, hidden dim 2; row 0 pads its last token.
    let h = Tensor::from_slice(
        &[1.0f32, 1.0, 3.0, 3.0, 100.0, 100.0,
          2.0, 0.0, 4.0, 0.0, 6.0, 0.0],
        (2, 3, 2),
        &dev,
    )
    .unwrap();
    let mask = Tensor::from_slice(&[1u32, 1, 0, 1, 1, 1], (2, 3), &dev).unwrap();
    let mean: Vec<Vec<f32>> = masked_mean(&h, &mask).unwrap().to_vec2().unwrap();
    assert_eq!(mean[0], vec![2.0, 2.0]);
    assert_eq!(mean[1], vec![4.0, 0.0]);
}

#[test]
fn l2_normalize_produces_unit_rows() {
    let dev = Device::Cpu;
    let rows = Tensor::from_slice(&[3.0f32, 4.0, 0.0, 2.0], (2, 2), &dev).unwrap();
    let out: Vec<Vec<f32>> = l2_normalize(&rows).unwrap().to_vec2().unwrap();
    assert!((out[0][0] - 0.6).abs() < 1e-5 && (out[0][1] - 0.8).abs() < 1e-5);
    assert!((out[1][1] - 1.0).abs() < 1e-5);
}

#[test]
fn masked_mean_l2_matches_manual_computation() {
    let dev = Device::Cpu;
    let h = Tensor::from_slice(&[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0], (1, 2, 4), &dev).unwrap();
    let mask = Tensor::from_slice(&[1i64, 0], (1, 2), &dev).unwrap().to_dtype(DType::F32).unwrap();
    let v: Vec<Vec<f32>> = masked_mean_l2(&h, &mask).unwrap().to_vec2().unwrap();
    let norm = (1.0f32 + 4.0 + 9.0 + 16.0).sqrt();
    for (a, b) in v[0].iter().zip([1.0 / norm, 2.0 / norm, 3.0 / norm, 4.0 / norm]) {
        assert!((a - b).abs() < 1e-5, "a={a} b={b}");
    }
}
