use super::features::{Descriptor, Feature, FeatureExtractor, FeatureSet};
use crate::config::SiftConfig;
use crate::Result;
use ndarray::ArrayView2;
use opencv::core::{no_array, KeyPoint, Mat, Ptr, Scalar, Vector, CV_8UC1};
use opencv::features2d::SIFT;
use opencv::prelude::*;
use std::sync::Mutex;

/// SIFT keypoints and descriptors computed by OpenCV.
pub struct OpenCvSiftExtractor {
    detector: Mutex<Ptr<SIFT>>,
}

// SAFETY: the detector is only touched while holding the mutex.
unsafe impl Send for OpenCvSiftExtractor {}
unsafe impl Sync for OpenCvSiftExtractor {}

impl OpenCvSiftExtractor {
    pub fn new() -> Result<Self> {
        Self::with_config(SiftConfig::default())
    }

    pub fn with_config(config: SiftConfig) -> Result<Self> {
        let detector = SIFT::create(
            config.n_features,
            config.n_octave_layers,
            config.contrast_threshold,
            config.edge_threshold,
            config.sigma,
            false, // enable_precise_upscale
        )?;
        Ok(Self {
            detector: Mutex::new(detector),
        })
    }
}

/// Rescales a real-valued slice into an 8-bit single channel `Mat`.
fn to_gray_mat(image: &ArrayView2<f32>) -> Result<Mat> {
    let (height, width) = image.dim();
    let (lo, hi) = image
        .iter()
        .filter(|v| v.is_finite())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(*v), hi.max(*v))
        });
    let range = if (hi - lo).is_finite() && hi > lo { hi - lo } else { 1.0 };

    let mut mat =
        Mat::new_rows_cols_with_default(height as i32, width as i32, CV_8UC1, Scalar::all(0.0))?;
    for ((y, x), value) in image.indexed_iter() {
        if value.is_finite() {
            let scaled = ((value - lo) / range * 255.0).round().clamp(0.0, 255.0);
            *mat.at_2d_mut::<u8>(y as i32, x as i32)? = scaled as u8;
        }
    }
    Ok(mat)
}

impl FeatureExtractor for OpenCvSiftExtractor {
    fn name(&self) -> &str {
        "OpenCV-SIFT"
    }

    fn extract(&self, image: &ArrayView2<f32>) -> Result<FeatureSet> {
        let mat = to_gray_mat(image)?;
        let mut keypoints = Vector::<KeyPoint>::new();
        let mut descriptors = Mat::default();

        self.detector
            .lock()
            .map_err(|_| anyhow::anyhow!("SIFT detector lock poisoned"))?
            .detect_and_compute(&mat, &no_array(), &mut keypoints, &mut descriptors, false)?;

        let mut features = Vec::with_capacity(keypoints.len());
        for (row, keypoint) in keypoints.iter().enumerate() {
            let values = descriptors.at_row::<f32>(row as i32)?;
            let pt = keypoint.pt();
            features.push(Feature {
                position: (pt.x as f64, pt.y as f64),
                descriptor: Descriptor::Float(values.to_vec()),
            });
        }
        Ok(features)
    }
}
