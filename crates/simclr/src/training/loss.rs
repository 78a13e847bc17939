//! NT-Xent contrastive loss over paired augmented views.
//!
//! Given projections z_i, z_j of two augmented views of the same batch, each
//! row k of z_i and row k of z_j form a positive pair; every other row of the
//! concatenated 2N-batch is a negative. The loss is a softmax cross-entropy
//! per anchor over [positive | 2N−2 negatives], averaged across all 2N
//! anchors — identical to summing and dividing by 2N.

use burn::nn::loss::CrossEntropyLossConfig;
use burn::prelude::*;
use burn::tensor::TensorData;

/// The correlation mask for a batch of size N, as row-major boolean rows.
///
/// Entry `[a][b]` is true iff b is a *negative* for anchor a: everything
/// except the main diagonal (self-similarity) and the ±N diagonals (the
/// positive pairs). Every row has exactly 2N−2 true entries.
pub fn correlation_mask(batch_size: usize) -> Vec<Vec<bool>> {
    let n2 = batch_size * 2;
    (0..n2)
        .map(|a| {
            let positive = (a + batch_size) % n2;
            (0..n2).map(|b| b != a && b != positive).collect()
        })
        .collect()
}

/// Normalized temperature-scaled cross-entropy loss.
///
/// The correlation mask and the gather indices derived from it depend only on
/// the batch size, so they are computed once at construction, placed on the
/// compute device, and reused across calls.
pub struct NtXent<B: Backend> {
    batch_size: usize,
    temperature: f64,
    mask: Tensor<B, 2, Bool>,
    pos_index: Tensor<B, 2, Int>,
    neg_index: Option<Tensor<B, 2, Int>>,
    device: B::Device,
}

impl<B: Backend> NtXent<B> {
    /// Build the loss for a fixed batch size and temperature.
    ///
    /// # Panics
    /// Panics if `batch_size` is zero or `temperature` is not positive.
    pub fn new(batch_size: usize, temperature: f64, device: &B::Device) -> Self {
        assert!(batch_size >= 1, "batch size must be >= 1");
        assert!(
            temperature > 0.0,
            "temperature must be > 0, got {temperature}"
        );

        let rows = correlation_mask(batch_size);
        let n2 = batch_size * 2;

        let mask_flat: Vec<bool> = rows.iter().flatten().copied().collect();
        let mask = Tensor::from_data(TensorData::new(mask_flat, [n2, n2]), device);

        let pos_flat: Vec<i64> = (0..n2).map(|a| ((a + batch_size) % n2) as i64).collect();
        let pos_index = Tensor::from_data(TensorData::new(pos_flat, [n2, 1]), device);

        // With N = 1 there are no negatives; the logits are the positive only.
        let neg_index = (n2 > 2).then(|| {
            let neg_flat: Vec<i64> = rows
                .iter()
                .flat_map(|row| {
                    row.iter()
                        .enumerate()
                        .filter(|(_, &keep)| keep)
                        .map(|(b, _)| b as i64)
                })
                .collect();
            Tensor::from_data(TensorData::new(neg_flat, [n2, n2 - 2]), device)
        });

        Self {
            batch_size,
            temperature,
            mask,
            pos_index,
            neg_index,
            device: device.clone(),
        }
    }

    /// Per-anchor logits `(2N, 2N−1)` with the positive similarity first.
    ///
    /// # Panics
    /// Panics if the two batches differ in shape, or their batch dimension
    /// does not match the construction-time batch size — shapes are a caller
    /// contract, never broadcast.
    pub fn logits(&self, z_i: Tensor<B, 2>, z_j: Tensor<B, 2>) -> Tensor<B, 2> {
        let di = z_i.dims();
        let dj = z_j.dims();
        assert_eq!(
            di, dj,
            "paired embedding batches must have identical shapes, got {di:?} vs {dj:?}"
        );
        assert_eq!(
            di[0], self.batch_size,
            "embedding batch size {} does not match the constructed batch size {}",
            di[0], self.batch_size
        );

        let p = l2_normalize(Tensor::cat(vec![z_i, z_j], 0));
        let sim = p.clone().matmul(p.transpose()) / self.temperature;

        let positives = sim.clone().gather(1, self.pos_index.clone());
        match &self.neg_index {
            Some(neg_index) => {
                let negatives = sim.gather(1, neg_index.clone());
                Tensor::cat(vec![positives, negatives], 1)
            }
            None => positives,
        }
    }

    /// Cross-entropy over precomputed logits, target index 0 for every anchor.
    pub fn loss_from_logits(&self, logits: Tensor<B, 2>) -> Tensor<B, 1> {
        let n2 = self.batch_size * 2;
        let labels = Tensor::<B, 1, Int>::zeros([n2], &self.device);
        CrossEntropyLossConfig::new()
            .init(&self.device)
            .forward(logits, labels)
    }

    /// Compute the scalar NT-Xent loss for two projection batches.
    ///
    /// Input shapes: both `(batch_size, d)`. Output: scalar tensor `(1,)`.
    pub fn forward(&self, z_i: Tensor<B, 2>, z_j: Tensor<B, 2>) -> Tensor<B, 1> {
        let logits = self.logits(z_i, z_j);
        self.loss_from_logits(logits)
    }

    /// The precomputed `(2N, 2N)` correlation mask.
    pub fn mask(&self) -> &Tensor<B, 2, Bool> {
        &self.mask
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }
}

/// L2-normalize each row, clamping the norm at 1e-12 so zero rows stay zero.
fn l2_normalize<B: Backend>(x: Tensor<B, 2>) -> Tensor<B, 2> {
    let norms = x.clone().powf_scalar(2.0).sum_dim(1).sqrt().clamp_min(1e-12);
    x / norms
}
