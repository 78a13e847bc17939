//! TOML config loading for the SimCLR CLI.
//!
//! Deserializes `configs/train.toml` which has `[trainer]` and `[augment]`
//! sections, then merges with CLI overrides.

use std::path::Path;

use serde::Deserialize;

use simclr::training::augment::AugmentConfig;
use simclr::training::trainer::SimClrTrainingConfig;

/// Top-level structure matching `configs/train.toml`.
#[derive(Debug, Default, Deserialize)]
pub struct TrainToml {
    /// Trainer hyperparameter overrides.
    #[serde(default)]
    pub trainer: TrainerOverrides,
    /// Augmentation pipeline overrides.
    #[serde(default)]
    pub augment: AugmentOverrides,
}

/// Optional overrides for [`SimClrTrainingConfig`] fields.
///
/// All fields are `Option` so a sparse TOML file only overrides what it
/// names; everything else keeps the built-in defaults.
#[derive(Debug, Default, Deserialize)]
pub struct TrainerOverrides {
    pub lr: Option<f64>,
    pub weight_decay: Option<f64>,
    pub max_grad_norm: Option<f64>,
    pub epochs: Option<usize>,
    pub warmup_epochs: Option<usize>,
    pub batch_size: Option<usize>,
    pub temperature: Option<f64>,
    pub log_interval: Option<usize>,
    pub checkpoint_interval: Option<usize>,
    pub val_batches: Option<usize>,
    pub seed: Option<u64>,
}

/// Optional overrides for [`AugmentConfig`] fields. The view size itself is
/// a property of the dataset, not the config file.
#[derive(Debug, Default, Deserialize)]
pub struct AugmentOverrides {
    pub min_crop_scale: Option<f32>,
    pub flip_prob: Option<f64>,
    pub jitter_strength: Option<f32>,
    pub grayscale_prob: Option<f64>,
}

/// Trainer fields the CLI can override on top of the TOML file.
#[derive(Debug, Default)]
pub struct CliTrainOverrides {
    pub epochs: Option<usize>,
    pub batch_size: Option<usize>,
    pub lr: Option<f64>,
    pub temperature: Option<f64>,
    pub seed: Option<u64>,
}

/// Load and deserialize a `TrainToml` from a TOML file.
pub fn load_train_toml(path: &Path) -> anyhow::Result<TrainToml> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config {}: {e}", path.display()))?;
    let config: TrainToml = toml::from_str(&contents)?;
    tracing::info!(path = %path.display(), "Loaded train config");
    Ok(config)
}

/// Build the training config from defaults, TOML values, and CLI flags.
///
/// Priority chain: built-in defaults < TOML values < CLI flags.
pub fn build_training_config(
    toml: &TrainerOverrides,
    cli: &CliTrainOverrides,
) -> SimClrTrainingConfig {
    let mut config = SimClrTrainingConfig::new();

    if let Some(v) = toml.lr {
        config.lr = v;
    }
    if let Some(v) = toml.weight_decay {
        config.weight_decay = v;
    }
    if let Some(v) = toml.max_grad_norm {
        config.max_grad_norm = v;
    }
    if let Some(v) = toml.epochs {
        config.epochs = v;
    }
    if let Some(v) = toml.warmup_epochs {
        config.warmup_epochs = v;
    }
    if let Some(v) = toml.batch_size {
        config.batch_size = v;
    }
    if let Some(v) = toml.temperature {
        config.temperature = v;
    }
    if let Some(v) = toml.log_interval {
        config.log_interval = v;
    }
    if let Some(v) = toml.checkpoint_interval {
        config.checkpoint_interval = v;
    }
    if let Some(v) = toml.val_batches {
        config.val_batches = v;
    }
    if let Some(v) = toml.seed {
        config.seed = v;
    }

    // CLI overrides take highest priority.
    if let Some(v) = cli.epochs {
        config.epochs = v;
    }
    if let Some(v) = cli.batch_size {
        config.batch_size = v;
    }
    if let Some(v) = cli.lr {
        config.lr = v;
    }
    if let Some(v) = cli.temperature {
        config.temperature = v;
    }
    if let Some(v) = cli.seed {
        config.seed = v;
    }

    config
}

/// Build the augmentation config for a dataset's view size plus TOML
/// overrides.
pub fn build_augment_config(size: u32, overrides: &AugmentOverrides) -> AugmentConfig {
    let mut config = AugmentConfig::new(size);
    if let Some(v) = overrides.min_crop_scale {
        config.min_crop_scale = v;
    }
    if let Some(v) = overrides.flip_prob {
        config.flip_prob = v;
    }
    if let Some(v) = overrides.jitter_strength {
        config.jitter_strength = v;
    }
    if let Some(v) = overrides.grayscale_prob {
        config.grayscale_prob = v;
    }
    config
}
