//! SimCLR view-pair augmentation over decoded images.
//!
//! Each source image is pushed through the stochastic pipeline twice to form
//! the (x_i, x_j) positive pair: random area crop resized to the corpus view
//! size, random horizontal flip, brightness/contrast jitter, and random
//! grayscale. All randomness flows through the caller's RNG so pairs are
//! reproducible under a fixed seed.

use image::imageops::FilterType;
use image::DynamicImage;
use rand::Rng;
use serde::Deserialize;

/// Augmentation parameters.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct AugmentConfig {
    /// Square output size of every view.
    pub size: u32,
    /// Lower bound of the cropped area as a fraction of the source area.
    #[serde(default = "default_min_crop_scale")]
    pub min_crop_scale: f32,
    /// Probability of a horizontal flip.
    #[serde(default = "default_flip_prob")]
    pub flip_prob: f64,
    /// Brightness/contrast jitter strength; 0 disables jitter.
    #[serde(default = "default_jitter_strength")]
    pub jitter_strength: f32,
    /// Probability of converting the view to grayscale.
    #[serde(default = "default_grayscale_prob")]
    pub grayscale_prob: f64,
}

fn default_min_crop_scale() -> f32 {
    0.25
}

fn default_flip_prob() -> f64 {
    0.5
}

fn default_jitter_strength() -> f32 {
    0.4
}

fn default_grayscale_prob() -> f64 {
    0.2
}

impl AugmentConfig {
    /// Defaults for a given view size.
    pub fn new(size: u32) -> Self {
        Self {
            size,
            min_crop_scale: default_min_crop_scale(),
            flip_prob: default_flip_prob(),
            jitter_strength: default_jitter_strength(),
            grayscale_prob: default_grayscale_prob(),
        }
    }
}

/// The stochastic SimCLR view pipeline.
pub struct SimClrAugment {
    config: AugmentConfig,
}

impl SimClrAugment {
    pub fn new(config: AugmentConfig) -> Self {
        assert!(config.size > 0, "view size must be > 0");
        assert!(
            config.min_crop_scale > 0.0 && config.min_crop_scale <= 1.0,
            "min_crop_scale must be in (0, 1], got {}",
            config.min_crop_scale
        );
        Self { config }
    }

    pub fn config(&self) -> &AugmentConfig {
        &self.config
    }

    /// One augmented view of `img`.
    pub fn view(&self, img: &DynamicImage, rng: &mut impl Rng) -> DynamicImage {
        let (width, height) = (img.width().max(1), img.height().max(1));

        // Random area crop: area scale in [min, 1], side scale is its sqrt.
        let scale = rng.gen_range(self.config.min_crop_scale..=1.0).sqrt();
        let crop_w = ((width as f32 * scale) as u32).clamp(1, width);
        let crop_h = ((height as f32 * scale) as u32).clamp(1, height);
        let x = rng.gen_range(0..=width - crop_w);
        let y = rng.gen_range(0..=height - crop_h);

        let mut view = img
            .crop_imm(x, y, crop_w, crop_h)
            .resize_exact(self.config.size, self.config.size, FilterType::Triangle);

        if rng.gen_bool(self.config.flip_prob) {
            view = view.fliph();
        }

        if self.config.jitter_strength > 0.0 {
            let s = self.config.jitter_strength;
            let brightness = rng.gen_range(-s..=s);
            let contrast = rng.gen_range(-s..=s);
            view = view
                .brighten((brightness * 64.0) as i32)
                .adjust_contrast(contrast * 100.0);
        }

        if rng.gen_bool(self.config.grayscale_prob) {
            view = view.grayscale();
        }

        view
    }

    /// Two independent augmented views of the same source image.
    pub fn view_pair(
        &self,
        img: &DynamicImage,
        rng: &mut impl Rng,
    ) -> (DynamicImage, DynamicImage) {
        (self.view(img, rng), self.view(img, rng))
    }
}

/// Deterministic resize-only view, used at embedding-extraction time.
pub fn eval_view(img: &DynamicImage, size: u32) -> DynamicImage {
    img.resize_exact(size, size, FilterType::Triangle)
}

/// Decoded image → flat CHW f32 buffer in [0, 1].
pub fn image_to_chw(img: &DynamicImage) -> Vec<f32> {
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();
    let plane = (width * height) as usize;
    let mut out = vec![0.0_f32; 3 * plane];
    for (x, y, pixel) in rgb.enumerate_pixels() {
        let offset = (y * width + x) as usize;
        for channel in 0..3 {
            out[channel * plane + offset] = pixel[channel] as f32 / 255.0;
        }
    }
    out
}
