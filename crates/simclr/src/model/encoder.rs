//! Convolutional encoder backbone.

use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, PaddingConfig2d};
use burn::prelude::*;
use burn::tensor::activation::relu;

/// Configuration for the conv encoder.
///
/// A stack of stride-2 conv stages, each doubling the channel count, followed
/// by global average pooling:
///
/// ```text
/// (batch, in_channels, H, W)
///   → [Conv2d 3×3 s2 → BatchNorm → ReLU] × stages
///   → AdaptiveAvgPool(1×1) → flatten
///   → h: (batch, base_channels · 2^(stages−1))
/// ```
#[derive(Config, Debug)]
pub struct ConvEncoderConfig {
    /// Input image channels (3 for RGB microscopy crops).
    #[config(default = 3)]
    pub in_channels: usize,
    /// Channel count of the first stage; doubled per stage.
    #[config(default = 32)]
    pub base_channels: usize,
    /// Number of stride-2 conv stages.
    #[config(default = 4)]
    pub stages: usize,
}

/// One conv stage: stride-2 conv, batch norm, ReLU.
#[derive(Module, Debug)]
struct ConvBlock<B: Backend> {
    conv: Conv2d<B>,
    norm: BatchNorm<B, 2>,
}

impl<B: Backend> ConvBlock<B> {
    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        relu(self.norm.forward(self.conv.forward(x)))
    }
}

/// Conv backbone mapping image batches to representation vectors h.
///
/// The representation (not the projection) is what downstream evaluation
/// consumes after contrastive pretraining.
#[derive(Module, Debug)]
pub struct ConvEncoder<B: Backend> {
    blocks: Vec<ConvBlock<B>>,
    pool: AdaptiveAvgPool2d,
    d_repr: usize,
}

impl ConvEncoderConfig {
    /// Initialize a ConvEncoder with the given configuration.
    pub fn init<B: Backend>(&self, device: &B::Device) -> ConvEncoder<B> {
        assert!(self.stages >= 1, "encoder needs at least one conv stage");

        let mut blocks = Vec::with_capacity(self.stages);
        let mut c_in = self.in_channels;
        let mut c_out = self.base_channels;
        for _ in 0..self.stages {
            blocks.push(ConvBlock {
                conv: Conv2dConfig::new([c_in, c_out], [3, 3])
                    .with_stride([2, 2])
                    .with_padding(PaddingConfig2d::Explicit(1, 1))
                    .init(device),
                norm: BatchNormConfig::new(c_out).init(device),
            });
            c_in = c_out;
            c_out *= 2;
        }

        ConvEncoder {
            blocks,
            pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            d_repr: c_in,
        }
    }
}

impl<B: Backend> ConvEncoder<B> {
    /// Forward pass: image batch to representations.
    ///
    /// Input shape: `(batch, in_channels, H, W)`
    /// Output shape: `(batch, d_repr)`
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut x = x;
        for block in &self.blocks {
            x = block.forward(x);
        }
        let pooled = self.pool.forward(x);
        let [batch, channels, _, _] = pooled.dims();
        pooled.reshape([batch, channels])
    }

    /// Dimension of the representation vectors this encoder produces.
    pub fn d_repr(&self) -> usize {
        self.d_repr
    }
}
