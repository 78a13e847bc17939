//! Class-labeled image directory scanning.
//!
//! Follows the usual image-folder convention: every subdirectory of the root
//! is a class, every image file inside it is a sample of that class. Classes
//! are indexed in sorted name order and files in sorted path order, so sample
//! indices are stable across runs and machines.

use std::path::{Path, PathBuf};

use anyhow::Context;

/// File extensions treated as images during a scan. Everything else is skipped.
const IMAGE_EXTENSIONS: &[&str] = &["bmp", "jpeg", "jpg", "png", "tif", "tiff"];

/// One scanned sample: an image path and its folder-derived class index.
#[derive(Clone, Debug)]
pub struct FolderSample {
    /// Absolute or root-relative path to the image file.
    pub path: PathBuf,
    /// Index into [`ImageFolder::classes`].
    pub class_index: usize,
}

/// A scanned class-labeled image directory.
#[derive(Clone, Debug)]
pub struct ImageFolder {
    root: PathBuf,
    classes: Vec<String>,
    samples: Vec<FolderSample>,
}

impl ImageFolder {
    /// Scan `root` for class subdirectories and their image files.
    ///
    /// # Errors
    /// Fails if the root cannot be read, contains no class subdirectories,
    /// or contains no image files at all.
    pub fn scan(root: &Path) -> anyhow::Result<Self> {
        let entries = std::fs::read_dir(root)
            .with_context(|| format!("Failed to read image root {}", root.display()))?;

        let mut class_dirs: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        class_dirs.sort();

        if class_dirs.is_empty() {
            anyhow::bail!(
                "No class subdirectories found under {} — expected one directory per class",
                root.display()
            );
        }

        let mut classes = Vec::with_capacity(class_dirs.len());
        let mut samples = Vec::new();

        for (class_index, dir) in class_dirs.iter().enumerate() {
            let name = dir
                .file_name()
                .and_then(|s| s.to_str())
                .map(|s| s.to_string())
                .ok_or_else(|| {
                    anyhow::anyhow!("Class directory {} has a non-UTF8 name", dir.display())
                })?;

            let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
                .with_context(|| format!("Failed to read class directory {}", dir.display()))?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file() && is_image(p))
                .collect();
            files.sort();

            for path in files {
                samples.push(FolderSample { path, class_index });
            }
            classes.push(name);
        }

        if samples.is_empty() {
            anyhow::bail!(
                "No image files found under {} (looked for {:?})",
                root.display(),
                IMAGE_EXTENSIONS
            );
        }

        tracing::info!(
            root = %root.display(),
            classes = classes.len(),
            samples = samples.len(),
            "Scanned image folder"
        );

        Ok(ImageFolder {
            root: root.to_path_buf(),
            classes,
            samples,
        })
    }

    /// Class names in index order.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// All scanned samples in stable order.
    pub fn samples(&self) -> &[FolderSample] {
        &self.samples
    }

    /// The class index of every sample, in sample order.
    pub fn targets(&self) -> Vec<usize> {
        self.samples.iter().map(|s| s.class_index).collect()
    }

    /// The scanned root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}
