mod config;
mod pipeline;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pipeline::{EmbedArgs, InspectArgs, TrainArgs};

/// simclr: contrastive representation pretraining for microscopy datasets.
#[derive(Parser)]
#[command(name = "simclr", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// CLI subcommands for pretraining, dataset inspection, and embedding export.
#[derive(Subcommand)]
enum Command {
    /// Pretrain an encoder with the NT-Xent objective.
    Train {
        /// Path to train config TOML file.
        #[arg(long, default_value = "configs/train.toml")]
        config: PathBuf,
        /// Dataset name: matek, jurkat, or plasmodium.
        #[arg(long)]
        dataset: String,
        /// Root directory containing the dataset layout.
        #[arg(long)]
        data_root: PathBuf,
        /// Override the checkpoint directory.
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Fraction of samples held out for validation.
        #[arg(long, default_value_t = 0.2)]
        valid_fraction: f64,
        /// Override total training epochs.
        #[arg(long)]
        epochs: Option<usize>,
        /// Override the contrastive batch size N.
        #[arg(long)]
        batch_size: Option<usize>,
        /// Override the base learning rate.
        #[arg(long)]
        lr: Option<f64>,
        /// Override the NT-Xent temperature.
        #[arg(long)]
        temperature: Option<f64>,
        /// Override the shuffling/augmentation seed.
        #[arg(long)]
        seed: Option<u64>,
        /// Resume from the checkpoint saved at this epoch.
        #[arg(long)]
        resume_from: Option<usize>,
    },
    /// Print dataset statistics and the stratified split summary.
    Inspect {
        /// Dataset name: matek, jurkat, or plasmodium.
        #[arg(long)]
        dataset: String,
        /// Root directory containing the dataset layout.
        #[arg(long)]
        data_root: PathBuf,
        /// Fraction of samples held out for validation.
        #[arg(long, default_value_t = 0.2)]
        valid_fraction: f64,
        /// Seed for the split shuffle.
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Output as JSON instead of human-readable text.
        #[arg(long)]
        json: bool,
    },
    /// Export representation embeddings for a trained checkpoint as JSONL.
    Embed {
        /// Dataset name: matek, jurkat, or plasmodium.
        #[arg(long)]
        dataset: String,
        /// Root directory containing the dataset layout.
        #[arg(long)]
        data_root: PathBuf,
        /// Path to the model checkpoint file (without the .mpk extension).
        #[arg(long)]
        checkpoint: PathBuf,
        /// Output JSONL file.
        #[arg(long)]
        output: PathBuf,
        /// Images encoded per forward pass.
        #[arg(long, default_value_t = 64)]
        batch_size: usize,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Train {
            config,
            dataset,
            data_root,
            output_dir,
            valid_fraction,
            epochs,
            batch_size,
            lr,
            temperature,
            seed,
            resume_from,
        } => pipeline::run_train(TrainArgs {
            config,
            dataset,
            data_root,
            output_dir,
            valid_fraction,
            epochs,
            batch_size,
            lr,
            temperature,
            seed,
            resume_from,
        }),
        Command::Inspect {
            dataset,
            data_root,
            valid_fraction,
            seed,
            json,
        } => pipeline::run_inspect(InspectArgs {
            dataset,
            data_root,
            valid_fraction,
            seed,
            json,
        }),
        Command::Embed {
            dataset,
            data_root,
            checkpoint,
            output,
            batch_size,
        } => pipeline::run_embed(EmbedArgs {
            dataset,
            data_root,
            checkpoint,
            output,
            batch_size,
        }),
    }
}
