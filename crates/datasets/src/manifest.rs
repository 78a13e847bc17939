//! Delimiter-separated label manifests.
//!
//! MATEK and JURKAT ship sidecar manifests (space- and tab-delimited
//! respectively, fixed column order, no header row). Only the stratification
//! label column is consumed here; image paths come from the folder scan and
//! are matched to manifest rows by position.

use std::path::Path;

use anyhow::Context;

/// Shape of a fixed-column, headerless, delimiter-separated manifest.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ManifestFormat {
    /// Field delimiter byte (`b' '` or `b'\t'`).
    pub delimiter: u8,
    /// Total number of columns every row must have.
    pub columns: usize,
    /// Zero-based index of the class label column.
    pub label_column: usize,
}

/// Read the class label column from a manifest file, one label per row.
///
/// # Errors
/// Fails if the file cannot be opened, a row cannot be parsed, or a row's
/// column count disagrees with the format.
pub fn read_label_column(path: &Path, format: &ManifestFormat) -> anyhow::Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(format.delimiter)
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open manifest {}", path.display()))?;

    let mut labels = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record =
            record.with_context(|| format!("Failed to parse manifest row {row} in {}", path.display()))?;
        if record.len() != format.columns {
            anyhow::bail!(
                "Manifest row {row} in {} has {} column(s), expected {}",
                path.display(),
                record.len(),
                format.columns
            );
        }
        labels.push(record[format.label_column].to_string());
    }

    tracing::info!(path = %path.display(), rows = labels.len(), "Loaded label manifest");
    Ok(labels)
}
