//! SimCLR training loop with a single AdamW optimizer.
//!
//! Ties together the view-pair provider, NT-Xent loss, and metrics into an
//! epoch/step loop with warmup + cosine LR schedule, periodic checkpointing,
//! and optional validation passes.

use std::path::Path;
use std::time::Instant;

use burn::grad_clipping::GradientClippingConfig;
use burn::module::AutodiffModule;
use burn::optim::{AdamWConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder};
use burn::tensor::backend::AutodiffBackend;
use rand::rngs::StdRng;
use rand::SeedableRng;

use datasets::SubsetRandomSampler;

use crate::model::net::{SimClrModel, SimClrModelConfig};
use crate::training::data::{collate_views, ViewPairProvider};
use crate::training::loss::NtXent;
use crate::training::metrics::{ContrastiveMetrics, MetricsHistory};

/// Metadata saved alongside each checkpoint for resuming training.
#[derive(serde::Serialize, serde::Deserialize, Debug)]
pub struct CheckpointMeta {
    /// 0-based index of the last completed epoch.
    pub epoch: usize,
    /// Optimizer steps taken so far.
    pub global_step: u64,
    /// Batches skipped because a view pair failed to load.
    pub skipped_batches: u64,
}

/// Configuration for SimCLR pretraining.
#[derive(Config, Debug)]
pub struct SimClrTrainingConfig {
    /// Base learning rate for AdamW.
    #[config(default = 3e-4)]
    pub lr: f64,
    /// Weight decay for AdamW.
    #[config(default = 1e-6)]
    pub weight_decay: f64,
    /// Maximum gradient norm for clipping.
    #[config(default = 1.0)]
    pub max_grad_norm: f64,
    /// Total number of training epochs.
    #[config(default = 100)]
    pub epochs: usize,
    /// Epochs of linear LR warmup before cosine decay.
    #[config(default = 10)]
    pub warmup_epochs: usize,
    /// Number of source images per step (N); the loss sees 2N views.
    #[config(default = 128)]
    pub batch_size: usize,
    /// NT-Xent temperature τ.
    #[config(default = 0.5)]
    pub temperature: f64,
    /// Steps between metric logging.
    #[config(default = 50)]
    pub log_interval: usize,
    /// Epochs between checkpoint saves.
    #[config(default = 10)]
    pub checkpoint_interval: usize,
    /// Directory for saving checkpoints.
    #[config(default = "String::from(\"checkpoints/simclr\")")]
    pub checkpoint_dir: String,
    /// Validation batches evaluated at each epoch end.
    #[config(default = 4)]
    pub val_batches: usize,
    /// Seed for shuffling and augmentation randomness.
    #[config(default = 42)]
    pub seed: u64,
}

/// Learning rate at a given step: linear warmup, then cosine decay to 0.
pub fn lr_schedule(base_lr: f64, warmup_steps: usize, total_steps: usize, step: usize) -> f64 {
    if warmup_steps > 0 && step < warmup_steps {
        return base_lr * (step + 1) as f64 / warmup_steps as f64;
    }
    let decay_steps = total_steps.saturating_sub(warmup_steps).max(1);
    let progress =
        ((step.saturating_sub(warmup_steps)) as f64 / decay_steps as f64).min(1.0);
    base_lr * 0.5 * (1.0 + (std::f64::consts::PI * progress).cos())
}

/// Running average accumulator for metrics over a logging interval.
struct RunningAvg {
    loss: f64,
    pos_sim: f64,
    neg_sim: f64,
    sim_gap: f64,
    agreement: f64,
    count: usize,
}

impl RunningAvg {
    fn new() -> Self {
        Self {
            loss: 0.0,
            pos_sim: 0.0,
            neg_sim: 0.0,
            sim_gap: 0.0,
            agreement: 0.0,
            count: 0,
        }
    }

    fn update(&mut self, m: &ContrastiveMetrics) {
        self.loss += m.loss;
        self.pos_sim += m.pos_sim;
        self.neg_sim += m.neg_sim;
        self.sim_gap += m.sim_gap;
        self.agreement += m.agreement;
        self.count += 1;
    }

    fn display(&self) -> String {
        if self.count == 0 {
            return "no data".to_string();
        }
        let n = self.count as f64;
        format!(
            "loss={:.4} pos={:.3} neg={:.3} gap={:.3} agree={:.2}",
            self.loss / n,
            self.pos_sim / n,
            self.neg_sim / n,
            self.sim_gap / n,
            self.agreement / n,
        )
    }

    fn avg_metrics(&self) -> Option<ContrastiveMetrics> {
        if self.count == 0 {
            return None;
        }
        let n = self.count as f64;
        Some(ContrastiveMetrics {
            loss: self.loss / n,
            pos_sim: self.pos_sim / n,
            neg_sim: self.neg_sim / n,
            sim_gap: self.sim_gap / n,
            agreement: self.agreement / n,
        })
    }

    fn reset(&mut self) {
        *self = Self::new();
    }
}

/// Evaluate one batch of view pairs without gradients.
///
/// Returns `None` if any view pair in the batch fails to load.
fn eval_batch<B: Backend, P: ViewPairProvider>(
    model: &SimClrModel<B>,
    criterion: &NtXent<B>,
    provider: &P,
    batch: &[usize],
    rng: &mut StdRng,
    device: &B::Device,
) -> Option<ContrastiveMetrics> {
    let mut pairs = Vec::with_capacity(batch.len());
    for &index in batch {
        match provider.views(index, rng) {
            Ok(pair) => pairs.push(pair),
            Err(_) => return None,
        }
    }
    if pairs.is_empty() {
        return None;
    }

    let (x_i, x_j) = collate_views::<B>(&pairs, provider.view_shape(), device);
    let (_, z_i) = model.forward(x_i);
    let (_, z_j) = model.forward(x_j);

    let logits = criterion.logits(z_i, z_j);
    let loss: f64 = criterion
        .loss_from_logits(logits.clone())
        .into_scalar()
        .elem();
    Some(ContrastiveMetrics::compute(
        &logits,
        criterion.temperature(),
        loss,
    ))
}

/// Run the SimCLR pretraining loop.
///
/// # Arguments
/// - `config`: training hyperparameters
/// - `model`: initialized model (consumed and returned updated)
/// - `provider`: source of augmented view pairs
/// - `train_sampler`: training indices, reshuffled per epoch, drop-last batches
/// - `valid_sampler`: optional validation indices for epoch-end metrics
/// - `device`: burn device for tensor operations
/// - `resume_epoch`: if `Some(e)`, load optimizer state and metadata from
///   `{checkpoint_dir}/epoch_{e}/` and continue with epoch e+1
///
/// # Returns
/// The trained model and the logged metrics history.
pub fn train<B: AutodiffBackend, P: ViewPairProvider>(
    config: &SimClrTrainingConfig,
    mut model: SimClrModel<B>,
    provider: &P,
    train_sampler: &SubsetRandomSampler,
    valid_sampler: Option<&SubsetRandomSampler>,
    device: &B::Device,
    resume_epoch: Option<usize>,
) -> anyhow::Result<(SimClrModel<B>, MetricsHistory)> {
    std::fs::create_dir_all(&config.checkpoint_dir)?;

    let steps_per_epoch = train_sampler.len() / config.batch_size;
    if steps_per_epoch == 0 {
        anyhow::bail!(
            "Batch size {} exceeds the training split ({} samples) — no full batch fits",
            config.batch_size,
            train_sampler.len()
        );
    }
    let total_steps = config.epochs * steps_per_epoch;
    let warmup_steps = config.warmup_epochs * steps_per_epoch;

    tracing::info!(
        epochs = config.epochs,
        steps_per_epoch,
        batch_size = config.batch_size,
        temperature = config.temperature,
        "Starting contrastive pretraining"
    );

    let criterion = NtXent::<B>::new(config.batch_size, config.temperature, device);
    let val_criterion = valid_sampler
        .map(|_| NtXent::<B::InnerBackend>::new(config.batch_size, config.temperature, device));

    let optim_config = AdamWConfig::new()
        .with_weight_decay(config.weight_decay as f32)
        .with_grad_clipping(Some(GradientClippingConfig::Norm(
            config.max_grad_norm as f32,
        )));
    let mut optimizer = optim_config.init();

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut val_rng = StdRng::seed_from_u64(config.seed.wrapping_add(1));
    let mut history = MetricsHistory::new();
    let mut running_avg = RunningAvg::new();
    let train_start = Instant::now();
    let mut global_step: u64 = 0;
    let mut skipped_batches: u64 = 0;
    let start_epoch: usize;

    // Resume optimizer state and counters if requested.
    if let Some(epoch) = resume_epoch {
        let epoch_dir = format!("{}/epoch_{epoch}", config.checkpoint_dir);
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();

        let optim_path = format!("{epoch_dir}/optimizer");
        let optim_record = recorder
            .load(optim_path.into(), device)
            .map_err(|e| anyhow::anyhow!("Failed to load optimizer from {epoch_dir}: {e}"))?;
        optimizer = optimizer.load_record(optim_record);

        let meta_path = format!("{epoch_dir}/meta.json");
        let meta: CheckpointMeta = serde_json::from_reader(
            std::fs::File::open(&meta_path)
                .map_err(|e| anyhow::anyhow!("Failed to open {meta_path}: {e}"))?,
        )
        .map_err(|e| anyhow::anyhow!("Failed to parse {meta_path}: {e}"))?;
        global_step = meta.global_step;
        skipped_batches = meta.skipped_batches;
        start_epoch = meta.epoch + 1;

        tracing::info!(start_epoch, global_step, "Resumed training from checkpoint");
    } else {
        start_epoch = 0;
    }

    for epoch in start_epoch..config.epochs {
        let order = train_sampler.epoch(&mut rng);
        let mut epoch_loss = 0.0;
        let mut epoch_batches = 0usize;

        for (batch_in_epoch, chunk) in order.chunks_exact(config.batch_size).enumerate() {
            let step = epoch * steps_per_epoch + batch_in_epoch;
            let lr = lr_schedule(config.lr, warmup_steps, total_steps, step);

            // Assemble the augmented pair batch.
            let mut pairs = Vec::with_capacity(config.batch_size);
            let mut load_failed = false;
            for &index in chunk {
                match provider.views(index, &mut rng) {
                    Ok(pair) => pairs.push(pair),
                    Err(e) => {
                        tracing::warn!(epoch, index, "Skipping batch: {e}");
                        load_failed = true;
                        break;
                    }
                }
            }
            if load_failed {
                skipped_batches += 1;
                continue;
            }

            let (x_i, x_j) = collate_views::<B>(&pairs, provider.view_shape(), device);

            // Positive pair, with encoding: both views through the same model.
            let (_h_i, z_i) = model.forward(x_i);
            let (_h_j, z_j) = model.forward(x_j);

            let logits = criterion.logits(z_i, z_j);
            let loss = criterion.loss_from_logits(logits.clone());
            let loss_val: f64 = loss.clone().into_scalar().elem();

            let step_metrics =
                ContrastiveMetrics::compute(&logits, config.temperature, loss_val);

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optimizer.step(lr.into(), model, grads);

            running_avg.update(&step_metrics);
            epoch_loss += loss_val;
            epoch_batches += 1;

            if config.log_interval > 0 && global_step % config.log_interval as u64 == 0 {
                let avg_metrics = running_avg.avg_metrics();
                let warnings = avg_metrics
                    .as_ref()
                    .map(|m| m.health_check())
                    .unwrap_or_default();
                if !warnings.is_empty() {
                    tracing::warn!(epoch, step, "Health check warnings: {warnings:?}");
                }

                let elapsed = train_start.elapsed().as_secs_f64();
                let done = (step.saturating_sub(start_epoch * steps_per_epoch)).max(1);
                let remaining = elapsed * (total_steps - step) as f64 / done as f64;
                let eta = if remaining < 60.0 {
                    format!("{remaining:.0}s")
                } else if remaining < 3600.0 {
                    format!("{:.0}m", remaining / 60.0)
                } else {
                    format!("{:.1}h", remaining / 3600.0)
                };

                let lr_str = format!("{lr:.2e}");
                tracing::info!(
                    epoch,
                    step,
                    lr = %lr_str,
                    eta,
                    "avg({}) {}",
                    running_avg.count,
                    running_avg.display()
                );
                if let Some(m) = avg_metrics {
                    history.push(step, m);
                }
                running_avg.reset();
            }

            global_step += 1;
        }

        if epoch_batches > 0 {
            tracing::info!(
                epoch,
                avg_loss = format!("{:.4}", epoch_loss / epoch_batches as f64),
                batches = epoch_batches,
                "Epoch complete"
            );
        }

        // Epoch-end validation metrics, no gradients.
        if let (Some(val_s), Some(val_c)) = (valid_sampler, val_criterion.as_ref()) {
            let val_model = model.valid();
            let val_order = val_s.epoch(&mut val_rng);
            let mut val_avg = RunningAvg::new();
            for chunk in val_order
                .chunks_exact(config.batch_size)
                .take(config.val_batches)
            {
                if let Some(m) =
                    eval_batch(&val_model, val_c, provider, chunk, &mut val_rng, device)
                {
                    val_avg.update(&m);
                }
            }
            if val_avg.count > 0 {
                tracing::info!(epoch, "val({}) {}", val_avg.count, val_avg.display());
            }
        }

        // Periodic checkpoint: model + optimizer + meta.
        if config.checkpoint_interval > 0 && (epoch + 1) % config.checkpoint_interval == 0 {
            let epoch_dir = format!("{}/epoch_{epoch}", config.checkpoint_dir);
            std::fs::create_dir_all(&epoch_dir)?;
            let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();

            model
                .clone()
                .save_file(format!("{epoch_dir}/model"), &recorder)
                .map_err(|e| anyhow::anyhow!("Failed to save model at epoch {epoch}: {e}"))?;
            recorder
                .record(optimizer.to_record(), format!("{epoch_dir}/optimizer").into())
                .map_err(|e| anyhow::anyhow!("Failed to save optimizer at epoch {epoch}: {e}"))?;
            serde_json::to_writer(
                std::fs::File::create(format!("{epoch_dir}/meta.json"))?,
                &CheckpointMeta {
                    epoch,
                    global_step,
                    skipped_batches,
                },
            )?;

            tracing::info!(epoch, "Checkpoint saved (model + optimizer + meta)");
        }
    }

    // Final checkpoint.
    let final_dir = format!("{}/final", config.checkpoint_dir);
    std::fs::create_dir_all(&final_dir)?;
    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    model
        .clone()
        .save_file(format!("{final_dir}/model"), &recorder)
        .map_err(|e| anyhow::anyhow!("Failed to save final model: {e}"))?;
    recorder
        .record(optimizer.to_record(), format!("{final_dir}/optimizer").into())
        .map_err(|e| anyhow::anyhow!("Failed to save final optimizer: {e}"))?;
    serde_json::to_writer(
        std::fs::File::create(format!("{final_dir}/meta.json"))?,
        &CheckpointMeta {
            epoch: config.epochs.saturating_sub(1),
            global_step,
            skipped_batches,
        },
    )?;

    let elapsed = train_start.elapsed();
    tracing::info!(
        global_step,
        skipped_batches,
        elapsed_secs = format!("{:.1}", elapsed.as_secs_f64()),
        "Training complete. Final checkpoint saved."
    );
    if skipped_batches > global_step / 2 {
        tracing::warn!(
            skipped_batches,
            "A large share of batches were skipped due to image load failures — \
             check the dataset for unreadable files"
        );
    }

    Ok((model, history))
}

/// Load a SimClrModel from a checkpoint file.
///
/// Creates a fresh model from config, then loads saved weights on top.
pub fn resume_from_checkpoint<B: Backend>(
    path: &Path,
    config: &SimClrModelConfig,
    device: &B::Device,
) -> anyhow::Result<SimClrModel<B>> {
    let model = config
        .init::<B>(device)
        .load_file(
            path,
            &NamedMpkFileRecorder::<FullPrecisionSettings>::new(),
            device,
        )
        .map_err(|e| anyhow::anyhow!("Failed to load checkpoint from {}: {e}", path.display()))?;
    Ok(model)
}
