//! The combined SimCLR model: encoder backbone + projection head.

use burn::prelude::*;

use crate::model::encoder::{ConvEncoder, ConvEncoderConfig};
use crate::model::projection::{ProjectionHead, ProjectionHeadConfig};

/// Configuration for the full SimCLR model.
#[derive(Config, Debug)]
pub struct SimClrModelConfig {
    /// Input image channels.
    #[config(default = 3)]
    pub in_channels: usize,
    /// First-stage channel count of the encoder.
    #[config(default = 32)]
    pub base_channels: usize,
    /// Number of encoder conv stages.
    #[config(default = 4)]
    pub stages: usize,
    /// Projection dimension fed to the contrastive loss.
    #[config(default = 128)]
    pub d_proj: usize,
}

/// Encoder + projection head.
///
/// `forward` returns both the representation h (for downstream evaluation)
/// and the projection z (for the contrastive loss), matching the two-output
/// convention of SimCLR.
#[derive(Module, Debug)]
pub struct SimClrModel<B: Backend> {
    encoder: ConvEncoder<B>,
    projector: ProjectionHead<B>,
}

impl SimClrModelConfig {
    /// Initialize a SimClrModel with the given configuration.
    pub fn init<B: Backend>(&self, device: &B::Device) -> SimClrModel<B> {
        let encoder = ConvEncoderConfig::new()
            .with_in_channels(self.in_channels)
            .with_base_channels(self.base_channels)
            .with_stages(self.stages)
            .init(device);
        let projector = ProjectionHeadConfig::new(encoder.d_repr())
            .with_d_proj(self.d_proj)
            .init(device);
        SimClrModel { encoder, projector }
    }
}

impl<B: Backend> SimClrModel<B> {
    /// Forward pass: image batch to (representation, projection).
    ///
    /// Input shape: `(batch, in_channels, H, W)`
    /// Output shapes: h `(batch, d_repr)`, z `(batch, d_proj)`
    pub fn forward(&self, x: Tensor<B, 4>) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let h = self.encoder.forward(x);
        let z = self.projector.forward(h.clone());
        (h, z)
    }

    /// Representation dimension of the encoder.
    pub fn d_repr(&self) -> usize {
        self.encoder.d_repr()
    }
}
