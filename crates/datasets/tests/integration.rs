//! Integration tests for the datasets crate.
//!
//! Exercise cross-module interactions: folder scan + manifest + stratified
//! split through the unified adapter, on synthetic directory trees.

use std::collections::HashSet;
use std::path::Path;

use rand::rngs::StdRng;
use rand::SeedableRng;

use datasets::{DatasetKind, LabeledImageDataset};

/// Create `dir/<class>/cell_<i>.png` placeholder files, returning the paths
/// in the order the scanner will visit them (sorted classes, sorted files).
fn write_class_tree(dir: &Path, classes: &[(&str, usize)]) {
    let mut sorted: Vec<_> = classes.to_vec();
    sorted.sort();
    for (class, count) in sorted {
        let class_dir = dir.join(class);
        std::fs::create_dir_all(&class_dir).unwrap();
        for i in 0..count {
            std::fs::write(class_dir.join(format!("cell_{i:03}.png")), b"").unwrap();
        }
    }
}

#[test]
fn test_plasmodium_adapter_labels_from_folders() {
    let root = tempfile::tempdir().unwrap();
    write_class_tree(
        &root.path().join("plasmodium/cell_images"),
        &[("Parasitized", 6), ("Uninfected", 4)],
    );

    let dataset = LabeledImageDataset::load(root.path(), DatasetKind::Plasmodium).unwrap();
    assert_eq!(dataset.len(), 10);
    assert_eq!(dataset.labels()[0], "Parasitized");
    assert_eq!(dataset.labels()[9], "Uninfected");

    let counts = dataset.class_counts();
    assert_eq!(counts["Parasitized"], 6);
    assert_eq!(counts["Uninfected"], 4);
}

#[test]
fn test_matek_adapter_labels_from_manifest() {
    let root = tempfile::tempdir().unwrap();
    write_class_tree(
        &root.path().join("matek/AML-Cytomorphology_LMU"),
        &[("EOS", 2), ("NGS", 2)],
    );
    // Space-delimited, 4 columns, label in column 1. Rows match scan order.
    std::fs::write(
        root.path().join("matek/annotations.dat"),
        "EOS/cell_000.png EOS EOS NGS\n\
         EOS/cell_001.png EOS NGS NGS\n\
         NGS/cell_000.png NGS NGS NGS\n\
         NGS/cell_001.png NGS EOS NGS\n",
    )
    .unwrap();

    let dataset = LabeledImageDataset::load(root.path(), DatasetKind::Matek).unwrap();
    assert_eq!(dataset.labels(), &["EOS", "EOS", "NGS", "NGS"]);
}

#[test]
fn test_jurkat_adapter_tab_manifest() {
    let root = tempfile::tempdir().unwrap();
    write_class_tree(&root.path().join("jurkat/cell_cycle"), &[("G1", 2), ("G2", 1)]);
    std::fs::write(
        root.path().join("jurkat/img.lst"),
        "0\tG1\tG1/cell_000.png\n1\tG1\tG1/cell_001.png\n2\tG2\tG2/cell_000.png\n",
    )
    .unwrap();

    let dataset = LabeledImageDataset::load(root.path(), DatasetKind::Jurkat).unwrap();
    assert_eq!(dataset.labels(), &["G1", "G1", "G2"]);
    assert_eq!(dataset.kind().view_size(), 64);
}

#[test]
fn test_manifest_row_count_mismatch_fails() {
    let root = tempfile::tempdir().unwrap();
    write_class_tree(
        &root.path().join("matek/AML-Cytomorphology_LMU"),
        &[("EOS", 2), ("NGS", 1)],
    );
    // Only two rows for three scanned images.
    std::fs::write(
        root.path().join("matek/annotations.dat"),
        "a.png EOS EOS EOS\nb.png NGS NGS NGS\n",
    )
    .unwrap();

    let err = LabeledImageDataset::load(root.path(), DatasetKind::Matek).unwrap_err();
    assert!(
        err.to_string().contains("out of sync"),
        "unexpected error: {err}"
    );
}

#[test]
fn test_adapter_split_covers_dataset_with_proportions() {
    let root = tempfile::tempdir().unwrap();
    write_class_tree(
        &root.path().join("plasmodium/cell_images"),
        &[("Parasitized", 30), ("Uninfected", 20)],
    );

    let dataset = LabeledImageDataset::load(root.path(), DatasetKind::Plasmodium).unwrap();
    let mut rng = StdRng::seed_from_u64(17);
    let (train, valid) = dataset.stratified_split(0.2, &mut rng).unwrap();

    assert_eq!(train.len(), 40);
    assert_eq!(valid.len(), 10);

    let train_set: HashSet<usize> = train.indices().iter().copied().collect();
    let valid_set: HashSet<usize> = valid.indices().iter().copied().collect();
    assert!(train_set.is_disjoint(&valid_set));
    assert_eq!(train_set.len() + valid_set.len(), dataset.len());

    // 30/20 at f=0.2 → 6 parasitized and 4 uninfected on the validation side.
    let valid_parasitized = valid
        .indices()
        .iter()
        .filter(|&&i| dataset.labels()[i] == "Parasitized")
        .count();
    assert_eq!(valid_parasitized, 6);
}

#[test]
fn test_split_fails_on_singleton_class() {
    let root = tempfile::tempdir().unwrap();
    write_class_tree(
        &root.path().join("plasmodium/cell_images"),
        &[("Parasitized", 5), ("Uninfected", 1)],
    );

    let dataset = LabeledImageDataset::load(root.path(), DatasetKind::Plasmodium).unwrap();
    let mut rng = StdRng::seed_from_u64(0);
    assert!(dataset.stratified_split(0.2, &mut rng).is_err());
}
