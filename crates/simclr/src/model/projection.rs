//! Projection head mapping representations into the contrastive space.

use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation::relu;

/// Configuration for the projection head MLP.
///
/// Two linear layers with a ReLU between, hidden width equal to the input
/// width. The projection z is only consumed by the contrastive loss; the
/// representation h underneath is what downstream tasks use.
#[derive(Config, Debug)]
pub struct ProjectionHeadConfig {
    /// Representation dimension produced by the encoder.
    pub d_repr: usize,
    /// Output projection dimension.
    #[config(default = 128)]
    pub d_proj: usize,
}

/// 2-layer MLP projection head.
#[derive(Module, Debug)]
pub struct ProjectionHead<B: Backend> {
    fc1: Linear<B>,
    fc2: Linear<B>,
}

impl ProjectionHeadConfig {
    /// Initialize a ProjectionHead with the given configuration.
    pub fn init<B: Backend>(&self, device: &B::Device) -> ProjectionHead<B> {
        ProjectionHead {
            fc1: LinearConfig::new(self.d_repr, self.d_repr).init(device),
            fc2: LinearConfig::new(self.d_repr, self.d_proj).init(device),
        }
    }
}

impl<B: Backend> ProjectionHead<B> {
    /// Forward pass: representations to projections.
    ///
    /// Input shape: `(batch, d_repr)`
    /// Output shape: `(batch, d_proj)`
    pub fn forward(&self, h: Tensor<B, 2>) -> Tensor<B, 2> {
        self.fc2.forward(relu(self.fc1.forward(h)))
    }
}
