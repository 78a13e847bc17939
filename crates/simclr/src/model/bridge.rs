//! Tensor bridge: decoded image buffers and embedding rows ↔ burn tensors.
//!
//! The augmentation pipeline produces flat CHW `Vec<f32>` buffers; burn needs
//! `Tensor<B, 4>` inputs. Shape disagreements are caller contract violations
//! and panic immediately — nothing is silently broadcast or truncated.

use burn::prelude::*;
use burn::tensor::TensorData;

/// Convert a batch of flat CHW image buffers to a burn 4D tensor.
///
/// # Arguments
/// - `buffers`: one `Vec<f32>` of length `c·h·w` per image
/// - `shape`: the `[channels, height, width]` of every buffer
/// - `device`: burn device to place the tensor on
///
/// # Panics
/// Panics if `buffers` is empty or any buffer's length disagrees with `shape`.
pub fn views_to_tensor<B: Backend>(
    buffers: &[Vec<f32>],
    shape: [usize; 3],
    device: &B::Device,
) -> Tensor<B, 4> {
    assert!(!buffers.is_empty(), "view batch must not be empty");
    let [channels, height, width] = shape;
    let expected = channels * height * width;
    assert!(expected > 0, "view shape must be non-degenerate, got {shape:?}");
    for (i, buffer) in buffers.iter().enumerate() {
        assert_eq!(
            buffer.len(),
            expected,
            "view {i} has {} value(s), expected {expected} for shape {shape:?}",
            buffer.len()
        );
    }

    let batch = buffers.len();
    let flat: Vec<f32> = buffers.iter().flat_map(|v| v.iter().copied()).collect();
    Tensor::from_data(
        TensorData::new(flat, [batch, channels, height, width]),
        device,
    )
}

/// Extract the rows of a 2D embedding tensor as `Vec<f32>` vectors.
pub fn embeddings_to_rows<B: Backend>(tensor: Tensor<B, 2>) -> Vec<Vec<f32>> {
    let [rows, cols] = tensor.dims();
    let flat: Vec<f32> = tensor.into_data().to_vec().unwrap();
    flat.chunks(cols).take(rows).map(|c| c.to_vec()).collect()
}
