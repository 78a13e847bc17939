//! View-pair provisioning for the training loop.
//!
//! The trainer consumes augmented view pairs through the [`ViewPairProvider`]
//! trait so the loop stays independent of disk layout and image decoding;
//! the folder-backed implementation decodes on demand and augments twice.

use anyhow::Context;
use burn::prelude::*;
use rand::rngs::StdRng;

use datasets::LabeledImageDataset;

use crate::model::bridge::views_to_tensor;
use crate::training::augment::{image_to_chw, AugmentConfig, SimClrAugment};

/// A pair of augmented CHW buffers derived from one source image.
#[derive(Clone, Debug)]
pub struct ViewPair {
    pub view_a: Vec<f32>,
    pub view_b: Vec<f32>,
}

/// Source of augmented view pairs, addressed by sample index.
pub trait ViewPairProvider {
    /// Number of addressable samples.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `[channels, height, width]` of every produced view.
    fn view_shape(&self) -> [usize; 3];

    /// Produce two augmented views of sample `index`.
    fn views(&self, index: usize, rng: &mut StdRng) -> anyhow::Result<ViewPair>;
}

/// Folder-backed provider: decode the sample's image file, augment twice.
pub struct FolderPairProvider {
    dataset: LabeledImageDataset,
    augment: SimClrAugment,
}

impl FolderPairProvider {
    pub fn new(dataset: LabeledImageDataset, config: AugmentConfig) -> Self {
        Self {
            dataset,
            augment: SimClrAugment::new(config),
        }
    }

    pub fn dataset(&self) -> &LabeledImageDataset {
        &self.dataset
    }
}

impl ViewPairProvider for FolderPairProvider {
    fn len(&self) -> usize {
        self.dataset.len()
    }

    fn view_shape(&self) -> [usize; 3] {
        let size = self.augment.config().size as usize;
        [3, size, size]
    }

    fn views(&self, index: usize, rng: &mut StdRng) -> anyhow::Result<ViewPair> {
        let path = self.dataset.path(index);
        let img = image::open(path)
            .with_context(|| format!("Failed to decode image {}", path.display()))?;
        let (a, b) = self.augment.view_pair(&img, rng);
        Ok(ViewPair {
            view_a: image_to_chw(&a),
            view_b: image_to_chw(&b),
        })
    }
}

/// Assemble a batch of view pairs into the two view tensors (x_i, x_j).
pub fn collate_views<B: Backend>(
    pairs: &[ViewPair],
    shape: [usize; 3],
    device: &B::Device,
) -> (Tensor<B, 4>, Tensor<B, 4>) {
    let first: Vec<Vec<f32>> = pairs.iter().map(|p| p.view_a.clone()).collect();
    let second: Vec<Vec<f32>> = pairs.iter().map(|p| p.view_b.clone()).collect();
    (
        views_to_tensor(&first, shape, device),
        views_to_tensor(&second, shape, device),
    )
}
