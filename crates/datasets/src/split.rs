//! Stratified train/validation splitting and epoch index samplers.
//!
//! The split partitions sample indices into two disjoint, exhaustive sets
//! whose per-class label proportions match the full dataset within rounding.
//! Splitting never degrades silently: a class too small to appear on both
//! sides is an error, not a skewed split.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::Rng;

/// A stratified partition of `0..len` into train and validation indices.
#[derive(Clone, Debug)]
pub struct StratifiedSplit {
    pub train: Vec<usize>,
    pub valid: Vec<usize>,
}

/// Stratified split of sample indices keyed on per-sample class labels.
///
/// For each class, `round(valid_fraction * class_size)` members go to the
/// validation side, clamped so every class keeps at least one member on each
/// side. With `shuffle`, class members are shuffled before the cut and the
/// resulting index lists are shuffled too; without it, each class contributes
/// its tail in dataset order and output order is deterministic.
///
/// # Errors
/// Fails on an empty label set, a fraction outside `(0, 1)`, or any class
/// with fewer than 2 members (a singleton cannot be stratified across both
/// splits).
pub fn stratified_split(
    labels: &[String],
    valid_fraction: f64,
    shuffle: bool,
    rng: &mut impl Rng,
) -> anyhow::Result<StratifiedSplit> {
    if labels.is_empty() {
        anyhow::bail!("Cannot split an empty dataset");
    }
    if !(valid_fraction > 0.0 && valid_fraction < 1.0) {
        anyhow::bail!("Validation fraction must be in (0, 1), got {valid_fraction}");
    }

    // BTreeMap keeps class iteration order deterministic.
    let mut by_class: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (index, label) in labels.iter().enumerate() {
        by_class.entry(label.as_str()).or_default().push(index);
    }

    let mut train = Vec::new();
    let mut valid = Vec::new();

    for (class, mut members) in by_class {
        if members.len() < 2 {
            anyhow::bail!(
                "Class {class:?} has {} member(s) — cannot stratify a singleton class across both splits",
                members.len()
            );
        }
        if shuffle {
            members.shuffle(rng);
        }
        let n_valid = ((members.len() as f64 * valid_fraction).round() as usize)
            .clamp(1, members.len() - 1);
        let cut = members.len() - n_valid;
        train.extend_from_slice(&members[..cut]);
        valid.extend_from_slice(&members[cut..]);
    }

    if shuffle {
        train.shuffle(rng);
        valid.shuffle(rng);
    } else {
        train.sort_unstable();
        valid.sort_unstable();
    }

    tracing::debug!(
        total = labels.len(),
        train = train.len(),
        valid = valid.len(),
        "Stratified split"
    );

    Ok(StratifiedSplit { train, valid })
}

/// An index subset that yields a freshly shuffled order every epoch.
#[derive(Clone, Debug)]
pub struct SubsetRandomSampler {
    indices: Vec<usize>,
}

impl SubsetRandomSampler {
    pub fn new(indices: Vec<usize>) -> Self {
        Self { indices }
    }

    /// The underlying indices in construction order.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// A shuffled copy of the indices for one epoch of iteration.
    pub fn epoch(&self, rng: &mut impl Rng) -> Vec<usize> {
        let mut order = self.indices.clone();
        order.shuffle(rng);
        order
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}
