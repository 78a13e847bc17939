//! SimCLR-style contrastive representation learning for microscopy images.
//!
//! Provides the conv encoder + projection head model, the NT-Xent contrastive
//! loss with its precomputed correlation mask, SimCLR view-pair augmentation,
//! the AdamW training loop with warmup + cosine schedule and checkpointing,
//! and post-training embedding extraction.

pub mod inference;
pub mod model;
pub mod training;
