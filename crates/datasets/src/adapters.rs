//! Unified labeled-image dataset over the three microscopy corpora.
//!
//! The per-dataset differences are pure configuration: image subdirectory,
//! optional manifest (delimiter + label column), and the view size the
//! augmentation pipeline crops to. One [`LabeledImageDataset`] serves all
//! three kinds.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rand::Rng;
use serde::Deserialize;

use crate::image_folder::{FolderSample, ImageFolder};
use crate::manifest::{read_label_column, ManifestFormat};
use crate::split::{stratified_split, SubsetRandomSampler};

/// The supported microscopy corpora.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    /// AML blood-cell morphology (space-delimited annotation manifest).
    Matek,
    /// Jurkat cell-cycle imaging flow cytometry (tab-delimited list manifest).
    Jurkat,
    /// Malaria thin-smear cell crops (labels from the folder layout).
    Plasmodium,
}

impl DatasetKind {
    /// Resolve a user-supplied dataset name.
    ///
    /// # Errors
    /// Unknown names fail with a fixed "not implemented" error — there is no
    /// fallback dataset.
    pub fn parse(name: &str) -> anyhow::Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "matek" => Ok(Self::Matek),
            "jurkat" => Ok(Self::Jurkat),
            "plasmodium" => Ok(Self::Plasmodium),
            _ => anyhow::bail!("Dataset {name:?} is not implemented"),
        }
    }

    /// Image root relative to the dataset root directory.
    pub fn image_subdir(&self) -> &'static str {
        match self {
            Self::Matek => "matek/AML-Cytomorphology_LMU",
            Self::Jurkat => "jurkat/cell_cycle",
            Self::Plasmodium => "plasmodium/cell_images",
        }
    }

    /// Sidecar label manifest, if the corpus ships one.
    pub fn manifest(&self) -> Option<(&'static str, ManifestFormat)> {
        match self {
            // columns: path, class_1, class_2, class_3 — stratify on class_1
            Self::Matek => Some((
                "matek/annotations.dat",
                ManifestFormat {
                    delimiter: b' ',
                    columns: 4,
                    label_column: 1,
                },
            )),
            // columns: id, class, path — stratify on class
            Self::Jurkat => Some((
                "jurkat/img.lst",
                ManifestFormat {
                    delimiter: b'\t',
                    columns: 3,
                    label_column: 1,
                },
            )),
            Self::Plasmodium => None,
        }
    }

    /// Square view size the augmentation pipeline produces for this corpus.
    pub fn view_size(&self) -> u32 {
        match self {
            Self::Matek => 128,
            Self::Jurkat => 64,
            Self::Plasmodium => 128,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Matek => "matek",
            Self::Jurkat => "jurkat",
            Self::Plasmodium => "plasmodium",
        }
    }
}

impl std::fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A scanned corpus with one stratification label per sample.
///
/// Labels come from the manifest's class column when the corpus ships one,
/// otherwise from the folder-derived class names. Manifest rows are matched
/// to scanned samples by position, so the row count must agree with the scan.
#[derive(Clone, Debug)]
pub struct LabeledImageDataset {
    kind: DatasetKind,
    folder: ImageFolder,
    labels: Vec<String>,
}

impl LabeledImageDataset {
    /// Scan `root` for the given corpus and attach stratification labels.
    pub fn load(root: &Path, kind: DatasetKind) -> anyhow::Result<Self> {
        let folder = ImageFolder::scan(&root.join(kind.image_subdir()))?;

        let labels = match kind.manifest() {
            Some((file, format)) => {
                let path = root.join(file);
                let labels = read_label_column(&path, &format)?;
                if labels.len() != folder.len() {
                    anyhow::bail!(
                        "Manifest {} has {} row(s) but {} image(s) were scanned — \
                         the manifest and image tree are out of sync",
                        path.display(),
                        labels.len(),
                        folder.len()
                    );
                }
                labels
            }
            None => folder
                .targets()
                .into_iter()
                .map(|t| folder.classes()[t].clone())
                .collect(),
        };

        tracing::info!(
            dataset = %kind,
            samples = folder.len(),
            classes = count_classes(&labels),
            "Loaded labeled image dataset"
        );

        Ok(LabeledImageDataset {
            kind,
            folder,
            labels,
        })
    }

    /// Stratified train/validation samplers over this dataset's indices.
    pub fn stratified_split(
        &self,
        valid_fraction: f64,
        rng: &mut impl Rng,
    ) -> anyhow::Result<(SubsetRandomSampler, SubsetRandomSampler)> {
        let split = stratified_split(&self.labels, valid_fraction, true, rng)?;
        Ok((
            SubsetRandomSampler::new(split.train),
            SubsetRandomSampler::new(split.valid),
        ))
    }

    pub fn kind(&self) -> DatasetKind {
        self.kind
    }

    pub fn folder(&self) -> &ImageFolder {
        &self.folder
    }

    /// All scanned samples in stable order.
    pub fn samples(&self) -> &[FolderSample] {
        self.folder.samples()
    }

    /// The path of sample `index`.
    pub fn path(&self, index: usize) -> &PathBuf {
        &self.folder.samples()[index].path
    }

    /// Stratification label of every sample, in sample order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Sample counts per stratification label.
    pub fn class_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for label in &self.labels {
            *counts.entry(label.clone()).or_insert(0) += 1;
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.folder.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folder.is_empty()
    }
}

fn count_classes(labels: &[String]) -> usize {
    labels
        .iter()
        .collect::<std::collections::BTreeSet<_>>()
        .len()
}
