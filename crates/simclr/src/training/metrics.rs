//! Contrastive training metrics with collapse health checks.

use std::path::Path;

use burn::prelude::*;

/// Metrics derived from one batch of NT-Xent logits.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ContrastiveMetrics {
    /// Scalar loss value.
    pub loss: f64,
    /// Mean cosine similarity of the positive pairs.
    pub pos_sim: f64,
    /// Mean cosine similarity across the negative pool.
    pub neg_sim: f64,
    /// `pos_sim - neg_sim`.
    pub sim_gap: f64,
    /// Fraction of anchors ranking their positive above every negative.
    pub agreement: f64,
}

impl ContrastiveMetrics {
    /// Compute metrics from the loss logits `(2N, 2N−1)` (positive first).
    ///
    /// Logits are temperature-scaled similarities; `temperature` undoes the
    /// scaling so the reported values are plain cosines.
    pub fn compute<B: Backend>(logits: &Tensor<B, 2>, temperature: f64, loss: f64) -> Self {
        let [rows, cols] = logits.dims();
        let positives = logits.clone().slice([0..rows, 0..1]);
        let pos_sim = mean_scalar(positives.clone()) * temperature;

        if cols == 1 {
            // Batch of one: no negative pool.
            return Self {
                loss,
                pos_sim,
                neg_sim: 0.0,
                sim_gap: pos_sim,
                agreement: 1.0,
            };
        }

        let negatives = logits.clone().slice([0..rows, 1..cols]);
        let neg_sim = mean_scalar(negatives.clone()) * temperature;

        let max_negative = negatives.max_dim(1);
        let wins: i64 = positives
            .greater(max_negative)
            .int()
            .sum()
            .into_scalar()
            .elem();
        let agreement = wins as f64 / rows as f64;

        Self {
            loss,
            pos_sim,
            neg_sim,
            sim_gap: pos_sim - neg_sim,
            agreement,
        }
    }

    /// Warning strings for collapse signatures; empty when the batch looks
    /// healthy.
    pub fn health_check(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.sim_gap < 0.0 {
            warnings.push(format!(
                "negatives rank above positives on average (gap={:.3})",
                self.sim_gap
            ));
        }
        if self.sim_gap.abs() < 1e-3 {
            warnings.push(
                "positive/negative similarity gap has vanished — representations may be collapsing"
                    .to_string(),
            );
        }
        if self.agreement < 0.05 {
            warnings.push(format!(
                "agreement {:.3} is at chance level",
                self.agreement
            ));
        }
        warnings
    }
}

fn mean_scalar<B: Backend>(t: Tensor<B, 2>) -> f64 {
    let value: f32 = t.mean().into_scalar().elem();
    value as f64
}

/// One recorded training point.
#[derive(Debug, Clone, serde::Serialize)]
struct HistoryRow {
    step: usize,
    #[serde(flatten)]
    metrics: ContrastiveMetrics,
}

/// Accumulated (step, metrics) rows, serializable for offline plotting.
#[derive(Debug, Default)]
pub struct MetricsHistory {
    rows: Vec<HistoryRow>,
}

impl MetricsHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: usize, metrics: ContrastiveMetrics) {
        self.rows.push(HistoryRow { step, metrics });
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Write the history as pretty JSON.
    pub fn save_json(&self, path: &Path) -> anyhow::Result<()> {
        let file = std::fs::File::create(path)
            .map_err(|e| anyhow::anyhow!("Failed to create {}: {e}", path.display()))?;
        serde_json::to_writer_pretty(file, &self.rows)?;
        tracing::info!(path = %path.display(), rows = self.rows.len(), "Saved metrics history");
        Ok(())
    }
}
