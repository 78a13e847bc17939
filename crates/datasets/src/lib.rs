//! Microscopy dataset adapters: image-folder scanning, label manifests, and
//! stratified train/validation splitting.
//!
//! The three supported corpora (MATEK blood-cell morphology, JURKAT cell
//! cycle, PLASMODIUM malaria smears) share one folder-per-class image layout
//! and differ only in where the images live, whether a sidecar label manifest
//! exists, and which column of it carries the stratification key. All three
//! are served by a single [`adapters::LabeledImageDataset`] parameterized by
//! [`adapters::DatasetKind`].

pub mod adapters;
pub mod image_folder;
pub mod manifest;
pub mod split;

pub use adapters::{DatasetKind, LabeledImageDataset};
pub use image_folder::ImageFolder;
pub use manifest::ManifestFormat;
pub use split::{stratified_split, StratifiedSplit, SubsetRandomSampler};
