//! Post-training embedding extraction for downstream evaluation.
//!
//! Loads a checkpointed model and encodes resize-only views into
//! representation rows (h, not the projection z — the projection head is a
//! training-time artifact).

use std::path::{Path, PathBuf};

use anyhow::Context;
use burn::prelude::*;
use image::DynamicImage;

use crate::model::bridge::{embeddings_to_rows, views_to_tensor};
use crate::model::net::{SimClrModel, SimClrModelConfig};
use crate::training::augment::{eval_view, image_to_chw};
use crate::training::trainer::resume_from_checkpoint;

/// Batched encoder over a trained SimCLR model.
pub struct EmbeddingExtractor<B: Backend> {
    model: SimClrModel<B>,
    size: u32,
    device: B::Device,
}

impl<B: Backend> EmbeddingExtractor<B> {
    /// Wrap an existing model.
    pub fn new(model: SimClrModel<B>, size: u32, device: B::Device) -> Self {
        Self {
            model,
            size,
            device,
        }
    }

    /// Load a model from a checkpoint file and wrap it.
    pub fn load(
        path: &Path,
        config: &SimClrModelConfig,
        size: u32,
        device: B::Device,
    ) -> anyhow::Result<Self> {
        let model = resume_from_checkpoint::<B>(path, config, &device)?;
        Ok(Self::new(model, size, device))
    }

    /// Encode decoded images into representation rows.
    pub fn embed_images(&self, images: &[DynamicImage]) -> Vec<Vec<f32>> {
        let buffers: Vec<Vec<f32>> = images
            .iter()
            .map(|img| image_to_chw(&eval_view(img, self.size)))
            .collect();
        let size = self.size as usize;
        let x = views_to_tensor::<B>(&buffers, [3, size, size], &self.device);
        let (h, _z) = self.model.forward(x);
        embeddings_to_rows(h)
    }

    /// Decode and encode image files in batches of `batch_size`.
    pub fn embed_paths(
        &self,
        paths: &[PathBuf],
        batch_size: usize,
    ) -> anyhow::Result<Vec<Vec<f32>>> {
        assert!(batch_size > 0, "batch size must be > 0");
        let mut rows = Vec::with_capacity(paths.len());
        for chunk in paths.chunks(batch_size) {
            let images: Vec<DynamicImage> = chunk
                .iter()
                .map(|p| {
                    image::open(p).with_context(|| format!("Failed to decode image {}", p.display()))
                })
                .collect::<anyhow::Result<_>>()?;
            rows.extend(self.embed_images(&images));
        }
        Ok(rows)
    }

    /// Dimension of the produced representation rows.
    pub fn d_repr(&self) -> usize {
        self.model.d_repr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    fn test_image(shade: u8) -> DynamicImage {
        DynamicImage::ImageRgb8(image::RgbImage::from_fn(20, 16, |x, y| {
            image::Rgb([shade, (x * 10) as u8, (y * 10) as u8])
        }))
    }

    #[test]
    fn test_embed_images_shapes() {
        let device = Default::default();
        let model = SimClrModelConfig::new()
            .with_base_channels(8)
            .with_stages(2)
            .init::<TestBackend>(&device);
        let extractor = EmbeddingExtractor::new(model, 16, device);

        let rows = extractor.embed_images(&[test_image(10), test_image(200)]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].len(), extractor.d_repr());
        assert_ne!(rows[0], rows[1], "distinct images should embed differently");
    }

    #[test]
    fn test_embed_paths_batches() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = Vec::new();
        for i in 0..3u8 {
            let path = dir.path().join(format!("img_{i}.png"));
            test_image(i * 60).save(&path).unwrap();
            paths.push(path);
        }

        let device = Default::default();
        let model = SimClrModelConfig::new()
            .with_base_channels(8)
            .with_stages(2)
            .init::<TestBackend>(&device);
        let extractor = EmbeddingExtractor::new(model, 16, device);

        // batch_size 2 forces a full batch plus a remainder batch
        let rows = extractor.embed_paths(&paths, 2).unwrap();
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn test_embed_missing_path_fails() {
        let device = Default::default();
        let model = SimClrModelConfig::new()
            .with_base_channels(8)
            .with_stages(2)
            .init::<TestBackend>(&device);
        let extractor = EmbeddingExtractor::new(model, 16, device);

        let err = extractor
            .embed_paths(&[PathBuf::from("/nonexistent/img.png")], 4)
            .unwrap_err();
        assert!(err.to_string().contains("Failed to decode image"));
    }
}
