//! Contrastive training: view-pair augmentation and provisioning, the
//! NT-Xent loss, metrics with collapse health checks, and the AdamW
//! training loop.

pub mod augment;
pub mod data;
pub mod loss;
pub mod metrics;
pub mod trainer;
