use crate::Result;
use ndarray::ArrayView2;

/// Local descriptor payload. Binary descriptors compare by Hamming distance,
/// float descriptors by Euclidean distance.
#[derive(Debug, Clone, PartialEq)]
pub enum Descriptor {
    Binary([u8; 32]),
    Float(Vec<f32>),
}

impl Descriptor {
    /// Distance between two descriptors; infinite when the kinds differ.
    pub fn distance(&self, other: &Descriptor) -> f64 {
        match (self, other) {
            (Descriptor::Binary(a), Descriptor::Binary(b)) => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| (x ^ y).count_ones())
                .sum::<u32>() as f64,
            (Descriptor::Float(a), Descriptor::Float(b)) if a.len() == b.len() => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| {
                    let d = (*x - *y) as f64;
                    d * d
                })
                .sum::<f64>()
                .sqrt(),
            _ => f64::INFINITY,
        }
    }
}

/// A descriptor anchored at a sub-pixel `(x, y)` position.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub position: (f64, f64),
    pub descriptor: Descriptor,
}

/// Features extracted from exactly one slice, in extraction order.
pub type FeatureSet = Vec<Feature>;

/// Turns a 2D slice (indexed `[y, x]`) into local features.
///
/// Implementations must be deterministic for identical pixels.
pub trait FeatureExtractor: Send + Sync {
    fn name(&self) -> &str;

    fn extract(&self, image: &ArrayView2<f32>) -> Result<FeatureSet>;
}
