//! CLI pipelines: contrastive pretraining, dataset inspection, and
//! embedding export.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;

use burn::backend::ndarray::NdArray;
use burn::backend::Autodiff;
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::SeedableRng;

use datasets::{DatasetKind, LabeledImageDataset};
use simclr::inference::EmbeddingExtractor;
use simclr::model::net::SimClrModelConfig;
use simclr::training::data::FolderPairProvider;
use simclr::training::trainer::{resume_from_checkpoint, train};

use crate::config::{
    build_augment_config, build_training_config, load_train_toml, CliTrainOverrides,
};

/// CPU backends; intra-op parallelism is the tensor backend's concern.
type TrainBackend = Autodiff<NdArray<f32>>;
type EvalBackend = NdArray<f32>;

pub struct TrainArgs {
    pub config: PathBuf,
    pub dataset: String,
    pub data_root: PathBuf,
    pub output_dir: Option<PathBuf>,
    pub valid_fraction: f64,
    pub epochs: Option<usize>,
    pub batch_size: Option<usize>,
    pub lr: Option<f64>,
    pub temperature: Option<f64>,
    pub seed: Option<u64>,
    pub resume_from: Option<usize>,
}

/// Pretrain on one of the supported corpora.
pub fn run_train(args: TrainArgs) -> anyhow::Result<()> {
    let kind = DatasetKind::parse(&args.dataset)?;
    let toml_config = load_train_toml(&args.config)?;
    let mut config = build_training_config(
        &toml_config.trainer,
        &CliTrainOverrides {
            epochs: args.epochs,
            batch_size: args.batch_size,
            lr: args.lr,
            temperature: args.temperature,
            seed: args.seed,
        },
    );
    if let Some(dir) = &args.output_dir {
        config.checkpoint_dir = dir.display().to_string();
    }

    let dataset = LabeledImageDataset::load(&args.data_root, kind)?;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let (train_sampler, valid_sampler) =
        dataset.stratified_split(args.valid_fraction, &mut rng)?;
    tracing::info!(
        dataset = %kind,
        train = train_sampler.len(),
        valid = valid_sampler.len(),
        "Prepared stratified samplers"
    );

    let augment = build_augment_config(kind.view_size(), &toml_config.augment);
    let provider = FolderPairProvider::new(dataset, augment);

    let device = Default::default();
    let model_config = SimClrModelConfig::new();
    let model = match args.resume_from {
        Some(epoch) => {
            let path =
                PathBuf::from(&config.checkpoint_dir).join(format!("epoch_{epoch}/model"));
            resume_from_checkpoint::<TrainBackend>(&path, &model_config, &device)?
        }
        None => model_config.init::<TrainBackend>(&device),
    };

    let (_model, history) = train(
        &config,
        model,
        &provider,
        &train_sampler,
        Some(&valid_sampler),
        &device,
        args.resume_from,
    )?;

    history.save_json(&PathBuf::from(&config.checkpoint_dir).join("metrics.json"))?;
    Ok(())
}

pub struct InspectArgs {
    pub dataset: String,
    pub data_root: PathBuf,
    pub valid_fraction: f64,
    pub seed: u64,
    pub json: bool,
}

#[derive(serde::Serialize)]
struct ClassSplit {
    total: usize,
    train: usize,
    valid: usize,
}

#[derive(serde::Serialize)]
struct SplitReport {
    dataset: String,
    samples: usize,
    train: usize,
    valid: usize,
    classes: BTreeMap<String, ClassSplit>,
}

/// Print dataset statistics and the realized stratified split per class.
pub fn run_inspect(args: InspectArgs) -> anyhow::Result<()> {
    let kind = DatasetKind::parse(&args.dataset)?;
    let dataset = LabeledImageDataset::load(&args.data_root, kind)?;

    let mut rng = StdRng::seed_from_u64(args.seed);
    let (train_sampler, valid_sampler) =
        dataset.stratified_split(args.valid_fraction, &mut rng)?;

    let count_side = |side: &[usize]| {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for &index in side {
            *counts.entry(dataset.labels()[index].clone()).or_insert(0) += 1;
        }
        counts
    };
    let train_counts = count_side(train_sampler.indices());
    let valid_counts = count_side(valid_sampler.indices());

    let classes: BTreeMap<String, ClassSplit> = dataset
        .class_counts()
        .into_iter()
        .map(|(label, total)| {
            let split = ClassSplit {
                total,
                train: train_counts.get(&label).copied().unwrap_or(0),
                valid: valid_counts.get(&label).copied().unwrap_or(0),
            };
            (label, split)
        })
        .collect();

    let report = SplitReport {
        dataset: kind.name().to_string(),
        samples: dataset.len(),
        train: train_sampler.len(),
        valid: valid_sampler.len(),
        classes,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "{}: {} samples ({} train / {} valid at f={})",
            report.dataset, report.samples, report.train, report.valid, args.valid_fraction
        );
        for (label, split) in &report.classes {
            println!(
                "  {label:<24} total={:<6} train={:<6} valid={}",
                split.total, split.train, split.valid
            );
        }
    }
    Ok(())
}

pub struct EmbedArgs {
    pub dataset: String,
    pub data_root: PathBuf,
    pub checkpoint: PathBuf,
    pub output: PathBuf,
    pub batch_size: usize,
}

#[derive(serde::Serialize)]
struct EmbedRow<'a> {
    path: String,
    label: &'a str,
    embedding: Vec<f32>,
}

/// Export representation embeddings for every sample as JSONL.
pub fn run_embed(args: EmbedArgs) -> anyhow::Result<()> {
    let kind = DatasetKind::parse(&args.dataset)?;
    let dataset = LabeledImageDataset::load(&args.data_root, kind)?;

    let extractor = EmbeddingExtractor::<EvalBackend>::load(
        &args.checkpoint,
        &SimClrModelConfig::new(),
        kind.view_size(),
        Default::default(),
    )?;

    let file = std::fs::File::create(&args.output)
        .map_err(|e| anyhow::anyhow!("Failed to create {}: {e}", args.output.display()))?;
    let mut writer = std::io::BufWriter::new(file);

    let pb = ProgressBar::new(dataset.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) Embedding")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );

    let mut rows = 0usize;
    for chunk_start in (0..dataset.len()).step_by(args.batch_size) {
        let chunk_end = (chunk_start + args.batch_size).min(dataset.len());
        let paths: Vec<PathBuf> = (chunk_start..chunk_end)
            .map(|i| dataset.path(i).clone())
            .collect();
        let embeddings = extractor.embed_paths(&paths, args.batch_size)?;

        for (offset, embedding) in embeddings.into_iter().enumerate() {
            let index = chunk_start + offset;
            let row = EmbedRow {
                path: dataset.path(index).display().to_string(),
                label: dataset.labels()[index].as_str(),
                embedding,
            };
            serde_json::to_writer(&mut writer, &row)?;
            writer.write_all(b"\n")?;
            rows += 1;
        }
        pb.inc((chunk_end - chunk_start) as u64);
    }
    pb.finish_with_message("done");
    writer.flush()?;

    tracing::info!(
        rows,
        dim = extractor.d_repr(),
        output = %args.output.display(),
        "Wrote embeddings"
    );
    Ok(())
}
