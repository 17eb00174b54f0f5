use super::features::{Descriptor, Feature, FeatureExtractor, FeatureSet};
use crate::config::FeatureConfig;
use crate::Result;
use ndarray::{Array2, ArrayView2};
use std::cmp::Ordering;

// Bresenham circle of radius 3 used by the FAST-9 test.
const CIRCLE: [(i32, i32); 16] = [
    (0, -3),
    (1, -3),
    (2, -2),
    (3, -1),
    (3, 0),
    (3, 1),
    (2, 2),
    (1, 3),
    (0, 3),
    (-1, 3),
    (-2, 2),
    (-3, 1),
    (-3, 0),
    (-3, -1),
    (-2, -2),
    (-1, -3),
];

const ARC_LENGTH: usize = 9;
const DESCRIPTOR_BITS: usize = 256;

#[derive(Debug, Clone, Copy)]
struct Keypoint {
    x: usize,
    y: usize,
    response: f32,
}

/// FAST-9 corners with upright BRIEF descriptors.
///
/// Slices are rescaled to `[0, 255]` and box-smoothed before detection, so the
/// corner threshold is expressed in 8-bit intensity units regardless of the
/// source voxel type. No orientation is assigned: the alignment model is
/// translation only.
pub struct BriefExtractor {
    config: FeatureConfig,
    pattern: Vec<(i32, i32, i32, i32)>,
}

impl Default for BriefExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl BriefExtractor {
    pub fn new() -> Self {
        Self::with_config(FeatureConfig::default())
    }

    pub fn with_config(config: FeatureConfig) -> Self {
        let pattern = sampling_pattern(config.patch_radius as i32);
        Self { config, pattern }
    }

    fn border(&self) -> usize {
        self.config.patch_radius.max(3) as usize + 1
    }

    fn detect_corners(&self, image: &Array2<f32>) -> Vec<Keypoint> {
        let (height, width) = image.dim();
        let border = self.border();
        if height <= 2 * border || width <= 2 * border {
            return Vec::new();
        }

        let mut corners = Vec::new();
        for y in border..height - border {
            for x in border..width - border {
                if let Some(response) = self.fast_response(image, x, y) {
                    corners.push(Keypoint { x, y, response });
                }
            }
        }
        self.non_maximum_suppression(corners)
    }

    fn fast_response(&self, image: &Array2<f32>, x: usize, y: usize) -> Option<f32> {
        let center = image[[y, x]];
        let threshold = self.config.fast_threshold;

        let mut diffs = [0.0f32; 16];
        for (i, (dx, dy)) in CIRCLE.iter().enumerate() {
            let px = (x as i32 + dx) as usize;
            let py = (y as i32 + dy) as usize;
            diffs[i] = image[[py, px]] - center;
        }

        let longest_run = |bright: bool| {
            let mut best = 0;
            let mut run = 0;
            // Walk the circle twice to catch arcs that wrap around.
            for i in 0..32 {
                let d = diffs[i % 16];
                let hit = if bright { d > threshold } else { d < -threshold };
                if hit {
                    run += 1;
                    best = best.max(run.min(16));
                } else {
                    run = 0;
                }
            }
            best
        };

        let bright = longest_run(true) >= ARC_LENGTH;
        let dark = !bright && longest_run(false) >= ARC_LENGTH;
        if !bright && !dark {
            return None;
        }

        let response: f32 = diffs
            .iter()
            .map(|d| if bright { *d - threshold } else { -*d - threshold })
            .filter(|d| *d > 0.0)
            .sum();
        Some(response)
    }

    fn non_maximum_suppression(&self, mut corners: Vec<Keypoint>) -> Vec<Keypoint> {
        corners.sort_by(|a, b| {
            b.response
                .partial_cmp(&a.response)
                .unwrap_or(Ordering::Equal)
                .then(a.y.cmp(&b.y))
                .then(a.x.cmp(&b.x))
        });

        let radius_sq = self.config.suppression_radius * self.config.suppression_radius;
        let mut selected: Vec<Keypoint> = Vec::new();
        for corner in corners {
            let suppressed = selected.iter().any(|s| {
                let dx = corner.x as f32 - s.x as f32;
                let dy = corner.y as f32 - s.y as f32;
                dx * dx + dy * dy < radius_sq
            });
            if !suppressed {
                selected.push(corner);
                if selected.len() >= self.config.max_keypoints {
                    break;
                }
            }
        }
        selected
    }

    fn describe(&self, image: &Array2<f32>, keypoint: &Keypoint) -> [u8; 32] {
        let mut descriptor = [0u8; 32];
        let (x, y) = (keypoint.x as i32, keypoint.y as i32);
        for (bit, &(dx1, dy1, dx2, dy2)) in self.pattern.iter().enumerate() {
            let a = image[[(y + dy1) as usize, (x + dx1) as usize]];
            let b = image[[(y + dy2) as usize, (x + dx2) as usize]];
            if a < b {
                descriptor[bit / 8] |= 1 << (bit % 8);
            }
        }
        descriptor
    }
}

impl FeatureExtractor for BriefExtractor {
    fn name(&self) -> &str {
        "FAST-BRIEF"
    }

    fn extract(&self, image: &ArrayView2<f32>) -> Result<FeatureSet> {
        let smoothed = box_smooth(&normalize(image));
        let corners = self.detect_corners(&smoothed);
        tracing::trace!(corners = corners.len(), "FAST corners selected");

        Ok(corners
            .iter()
            .map(|kp| Feature {
                position: (kp.x as f64, kp.y as f64),
                descriptor: Descriptor::Binary(self.describe(&smoothed, kp)),
            })
            .collect())
    }
}

/// Linearly rescales finite values to `[0, 255]`; flat or empty slices map to 0.
fn normalize(image: &ArrayView2<f32>) -> Array2<f32> {
    let (lo, hi) = image
        .iter()
        .filter(|v| v.is_finite())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(*v), hi.max(*v))
        });
    let range = hi - lo;
    if !range.is_finite() || range <= f32::EPSILON {
        return Array2::zeros(image.dim());
    }
    image.mapv(|v| {
        if v.is_finite() {
            (v - lo) / range * 255.0
        } else {
            0.0
        }
    })
}

/// 3x3 mean filter with clamped borders.
fn box_smooth(image: &Array2<f32>) -> Array2<f32> {
    let (height, width) = image.dim();
    Array2::from_shape_fn((height, width), |(y, x)| {
        let mut sum = 0.0;
        let mut count = 0.0;
        for ny in y.saturating_sub(1)..=(y + 1).min(height - 1) {
            for nx in x.saturating_sub(1)..=(x + 1).min(width - 1) {
                sum += image[[ny, nx]];
                count += 1.0;
            }
        }
        sum / count
    })
}

/// Fixed pseudo-random test pairs inside a `(2r + 1)^2` patch.
fn sampling_pattern(radius: i32) -> Vec<(i32, i32, i32, i32)> {
    let span = (2 * radius + 1) as u32;
    let mut state: u32 = 0x2545_f491;
    let mut next = || {
        state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        ((state >> 16) % span) as i32 - radius
    };
    (0..DESCRIPTOR_BITS)
        .map(|_| (next(), next(), next(), next()))
        .collect()
}
