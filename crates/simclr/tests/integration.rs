//! Integration tests for the simclr crate.
//!
//! Exercise cross-module interactions: model + loss + optimizer training
//! steps, the full dataset → provider → trainer pipeline on a synthetic
//! image tree, and checkpoint round trips. All tests use the NdArray backend
//! and small models.

use burn::backend::ndarray::NdArray;
use burn::backend::Autodiff;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use datasets::{DatasetKind, LabeledImageDataset, SubsetRandomSampler};
use simclr::inference::EmbeddingExtractor;
use simclr::model::net::SimClrModelConfig;
use simclr::training::augment::AugmentConfig;
use simclr::training::data::{FolderPairProvider, ViewPair, ViewPairProvider};
use simclr::training::loss::NtXent;
use simclr::training::trainer::{
    resume_from_checkpoint, train, SimClrTrainingConfig,
};

type TestBackend = NdArray<f32>;
type TestAutodiffBackend = Autodiff<NdArray<f32>>;

/// Provider producing deterministic per-index patterns with small view noise,
/// standing in for disk-backed augmentation.
struct SyntheticProvider {
    samples: usize,
    shape: [usize; 3],
}

impl ViewPairProvider for SyntheticProvider {
    fn len(&self) -> usize {
        self.samples
    }

    fn view_shape(&self) -> [usize; 3] {
        self.shape
    }

    fn views(&self, index: usize, rng: &mut StdRng) -> anyhow::Result<ViewPair> {
        let [c, h, w] = self.shape;
        let len = c * h * w;
        let base = (index % 5) as f32 / 5.0;
        let view = |rng: &mut StdRng| -> Vec<f32> {
            (0..len)
                .map(|k| base + 0.1 * ((k % 7) as f32 / 7.0) + 0.02 * rng.gen::<f32>())
                .collect()
        };
        Ok(ViewPair {
            view_a: view(rng),
            view_b: view(rng),
        })
    }
}

/// Write a plasmodium-layout image tree with `per_class` PNGs per class.
fn write_image_tree(root: &std::path::Path, per_class: usize) {
    for (class, shade) in [("Parasitized", 180u8), ("Uninfected", 60u8)] {
        let dir = root.join("plasmodium/cell_images").join(class);
        std::fs::create_dir_all(&dir).unwrap();
        for i in 0..per_class {
            let img = image::RgbImage::from_fn(12, 12, |x, y| {
                image::Rgb([shade, (x * 20 + i as u32) as u8, (y * 20) as u8])
            });
            img.save(dir.join(format!("cell_{i:02}.png"))).unwrap();
        }
    }
}

// ---------------------------------------------------------------------------
// Model + loss + optimizer: a few real training steps reduce the loss
// ---------------------------------------------------------------------------

#[test]
fn test_contrastive_training_steps_reduce_loss() {
    let device = Default::default();
    let mut model = SimClrModelConfig::new()
        .with_base_channels(4)
        .with_stages(2)
        .with_d_proj(8)
        .init::<TestAutodiffBackend>(&device);
    let criterion = NtXent::<TestAutodiffBackend>::new(4, 0.5, &device);
    let mut optim = AdamConfig::new().init();

    let provider = SyntheticProvider {
        samples: 8,
        shape: [3, 8, 8],
    };
    let mut rng = StdRng::seed_from_u64(0);

    let mut first_loss = None;
    let mut last_loss = 0.0;
    for _ in 0..8 {
        let pairs: Vec<ViewPair> = (0..4)
            .map(|i| provider.views(i, &mut rng).unwrap())
            .collect();
        let (x_i, x_j) = simclr::training::data::collate_views::<TestAutodiffBackend>(
            &pairs,
            provider.view_shape(),
            &device,
        );
        let (_, z_i) = model.forward(x_i);
        let (_, z_j) = model.forward(x_j);
        let loss = criterion.forward(z_i, z_j);
        let loss_val: f64 = loss.clone().into_scalar().elem();

        let grads = GradientsParams::from_grads(loss.backward(), &model);
        model = optim.step(1e-2, model, grads);

        first_loss.get_or_insert(loss_val);
        last_loss = loss_val;
        assert!(loss_val.is_finite(), "loss must stay finite, got {loss_val}");
    }

    let first = first_loss.unwrap();
    assert!(
        last_loss < first,
        "training should reduce the loss: first={first}, last={last_loss}"
    );
}

// ---------------------------------------------------------------------------
// Full trainer on a synthetic provider: history, checkpoints, resume
// ---------------------------------------------------------------------------

#[test]
fn test_trainer_end_to_end_with_checkpoints() {
    let dir = tempfile::tempdir().unwrap();
    let checkpoint_dir = dir.path().join("ckpt");

    let config = SimClrTrainingConfig::new()
        .with_epochs(2)
        .with_warmup_epochs(1)
        .with_batch_size(4)
        .with_temperature(0.5)
        .with_log_interval(1)
        .with_checkpoint_interval(1)
        .with_val_batches(1)
        .with_checkpoint_dir(checkpoint_dir.display().to_string())
        .with_seed(7);

    let device = Default::default();
    let model = SimClrModelConfig::new()
        .with_base_channels(4)
        .with_stages(2)
        .with_d_proj(8)
        .init::<TestAutodiffBackend>(&device);

    let provider = SyntheticProvider {
        samples: 16,
        shape: [3, 8, 8],
    };
    let train_sampler = SubsetRandomSampler::new((0..12).collect());
    let valid_sampler = SubsetRandomSampler::new((12..16).collect());

    let (trained, history) = train(
        &config,
        model,
        &provider,
        &train_sampler,
        Some(&valid_sampler),
        &device,
        None,
    )
    .unwrap();

    assert!(!history.is_empty(), "logging at every step must record history");
    assert!(checkpoint_dir.join("epoch_0/model.mpk").exists());
    assert!(checkpoint_dir.join("epoch_1/meta.json").exists());
    assert!(checkpoint_dir.join("final/model.mpk").exists());

    // The final checkpoint loads back and matches the trained model's output.
    let model_config = SimClrModelConfig::new()
        .with_base_channels(4)
        .with_stages(2)
        .with_d_proj(8);
    let reloaded = resume_from_checkpoint::<TestBackend>(
        &checkpoint_dir.join("final/model"),
        &model_config,
        &Default::default(),
    )
    .unwrap();

    let mut rng = StdRng::seed_from_u64(3);
    let pair = provider.views(0, &mut rng).unwrap();
    let (x, _) = simclr::training::data::collate_views::<TestBackend>(
        &[pair.clone()],
        provider.view_shape(),
        &Default::default(),
    );
    let (h_reloaded, _) = reloaded.forward(x);

    use burn::module::AutodiffModule;
    let (x2, _) = simclr::training::data::collate_views::<TestBackend>(
        &[pair],
        provider.view_shape(),
        &Default::default(),
    );
    let (h_trained, _) = trained.valid().forward(x2);

    let diff: f32 = (h_reloaded - h_trained).abs().sum().into_scalar().elem();
    assert!(
        diff < 1e-5,
        "reloaded checkpoint should reproduce the trained model, diff={diff}"
    );
}

#[test]
fn test_trainer_resume_from_checkpoint_meta() {
    let dir = tempfile::tempdir().unwrap();
    let checkpoint_dir = dir.path().join("ckpt");

    let config = SimClrTrainingConfig::new()
        .with_epochs(1)
        .with_warmup_epochs(0)
        .with_batch_size(4)
        .with_log_interval(0)
        .with_checkpoint_interval(1)
        .with_checkpoint_dir(checkpoint_dir.display().to_string());

    let device = Default::default();
    let provider = SyntheticProvider {
        samples: 8,
        shape: [3, 8, 8],
    };
    let train_sampler = SubsetRandomSampler::new((0..8).collect());

    let model = SimClrModelConfig::new()
        .with_base_channels(4)
        .with_stages(2)
        .init::<TestAutodiffBackend>(&device);
    train(&config, model, &provider, &train_sampler, None, &device, None).unwrap();

    // Continue for one more epoch from the saved state.
    let resumed_config = SimClrTrainingConfig::new()
        .with_epochs(2)
        .with_warmup_epochs(0)
        .with_batch_size(4)
        .with_log_interval(0)
        .with_checkpoint_interval(0)
        .with_checkpoint_dir(checkpoint_dir.display().to_string());

    let model_config = SimClrModelConfig::new().with_base_channels(4).with_stages(2);
    let model = resume_from_checkpoint::<TestAutodiffBackend>(
        &checkpoint_dir.join("epoch_0/model"),
        &model_config,
        &device,
    )
    .unwrap();

    train(
        &resumed_config,
        model,
        &provider,
        &train_sampler,
        None,
        &device,
        Some(0),
    )
    .unwrap();
    // Resumed run starts at epoch 1 of 2 and still writes the final checkpoint.
    assert!(checkpoint_dir.join("final/model.mpk").exists());
}

#[test]
fn test_trainer_rejects_oversized_batch() {
    let device = Default::default();
    let dir = tempfile::tempdir().unwrap();
    let config = SimClrTrainingConfig::new()
        .with_batch_size(64)
        .with_checkpoint_dir(dir.path().join("ckpt").display().to_string());

    let provider = SyntheticProvider {
        samples: 8,
        shape: [3, 8, 8],
    };
    let train_sampler = SubsetRandomSampler::new((0..8).collect());
    let model = SimClrModelConfig::new()
        .with_base_channels(4)
        .with_stages(2)
        .init::<TestAutodiffBackend>(&device);

    let err = train(&config, model, &provider, &train_sampler, None, &device, None)
        .unwrap_err();
    assert!(
        err.to_string().contains("no full batch fits"),
        "unexpected error: {err}"
    );
}

// ---------------------------------------------------------------------------
// Dataset → split → provider → tensors on a real (synthetic) image tree
// ---------------------------------------------------------------------------

#[test]
fn test_folder_pipeline_to_tensors() {
    let root = tempfile::tempdir().unwrap();
    write_image_tree(root.path(), 6);

    let dataset = LabeledImageDataset::load(root.path(), DatasetKind::Plasmodium).unwrap();
    assert_eq!(dataset.len(), 12);

    let mut rng = StdRng::seed_from_u64(1);
    let (train_sampler, valid_sampler) = dataset.stratified_split(0.25, &mut rng).unwrap();
    assert_eq!(train_sampler.len() + valid_sampler.len(), 12);

    let provider = FolderPairProvider::new(dataset, AugmentConfig::new(8));
    let order = train_sampler.epoch(&mut rng);
    let pairs: Vec<ViewPair> = order[..4]
        .iter()
        .map(|&i| provider.views(i, &mut rng).unwrap())
        .collect();

    let device = Default::default();
    let (x_i, x_j) = simclr::training::data::collate_views::<TestBackend>(
        &pairs,
        provider.view_shape(),
        &device,
    );
    assert_eq!(x_i.dims(), [4, 3, 8, 8]);
    assert_eq!(x_j.dims(), [4, 3, 8, 8]);
}

// ---------------------------------------------------------------------------
// Embedding extraction over a trained-then-saved model
// ---------------------------------------------------------------------------

#[test]
fn test_embedding_extraction_from_saved_model() {
    let dir = tempfile::tempdir().unwrap();
    let device: <TestBackend as Backend>::Device = Default::default();

    let model = SimClrModelConfig::new()
        .with_base_channels(4)
        .with_stages(2)
        .init::<TestBackend>(&device);
    let recorder =
        burn::record::NamedMpkFileRecorder::<burn::record::FullPrecisionSettings>::new();
    model
        .save_file(dir.path().join("model").display().to_string(), &recorder)
        .unwrap();

    let model_config = SimClrModelConfig::new().with_base_channels(4).with_stages(2);
    let extractor = EmbeddingExtractor::<TestBackend>::load(
        &dir.path().join("model"),
        &model_config,
        16,
        device,
    )
    .unwrap();

    let images: Vec<image::DynamicImage> = (0..3u8)
        .map(|i| {
            image::DynamicImage::ImageRgb8(image::RgbImage::from_fn(20, 20, move |x, y| {
                image::Rgb([i * 50, (x * 12) as u8, (y * 12) as u8])
            }))
        })
        .collect();

    let rows = extractor.embed_images(&images);
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].len(), extractor.d_repr());
}
