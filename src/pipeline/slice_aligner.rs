use super::traits::SliceRegistration;
use super::types::SliceShift;
use crate::algorithms::{BriefExtractor, FeatureExtractor, FeatureMatcher, RatioMatcher};
use crate::config::{Config, ExtractorKind};
use crate::utils::{ModelFitter, TranslationRansac};
use crate::Result;
use ndarray::ArrayView2;
use std::sync::Arc;

/// Feature-based translation estimate for one slice pair.
///
/// Features of the input slice are matched against the reference slice and a
/// translation-only model is fitted robustly. Every failure along the way is
/// reported as "no match".
#[derive(Clone)]
pub struct SliceAligner {
    extractor: Arc<dyn FeatureExtractor>,
    matcher: Arc<dyn FeatureMatcher>,
    fitter: Arc<dyn ModelFitter>,
    ratio_threshold: f32,
}

impl SliceAligner {
    pub fn new(
        extractor: Arc<dyn FeatureExtractor>,
        matcher: Arc<dyn FeatureMatcher>,
        fitter: Arc<dyn ModelFitter>,
        ratio_threshold: f32,
    ) -> Self {
        Self {
            extractor,
            matcher,
            fitter,
            ratio_threshold,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let extractor: Arc<dyn FeatureExtractor> = match config.features.extractor {
            ExtractorKind::Brief => Arc::new(BriefExtractor::with_config(config.features.clone())),
            #[cfg(feature = "opencv")]
            ExtractorKind::Sift => Arc::new(crate::algorithms::OpenCvSiftExtractor::with_config(
                config.features.sift.clone(),
            )?),
            #[cfg(not(feature = "opencv"))]
            ExtractorKind::Sift => {
                anyhow::bail!("the SIFT extractor requires building with the `opencv` feature")
            }
        };
        tracing::debug!(extractor = extractor.name(), "slice aligner configured");

        Ok(Self::new(
            extractor,
            Arc::new(RatioMatcher::with_config(&config.matching)),
            Arc::new(TranslationRansac::with_config(config.ransac.clone())),
            config.matching.ratio_threshold,
        ))
    }
}

impl SliceRegistration for SliceAligner {
    fn align(&self, input: &ArrayView2<f32>, reference: &ArrayView2<f32>) -> Option<SliceShift> {
        let input_features = match self.extractor.extract(input) {
            Ok(features) => features,
            Err(e) => {
                tracing::warn!(error = %e, "feature extraction failed on input slice");
                return None;
            }
        };
        let reference_features = match self.extractor.extract(reference) {
            Ok(features) => features,
            Err(e) => {
                tracing::warn!(error = %e, "feature extraction failed on reference slice");
                return None;
            }
        };
        if input_features.is_empty() || reference_features.is_empty() {
            tracing::debug!(
                input = input_features.len(),
                reference = reference_features.len(),
                "no features to match"
            );
            return None;
        }

        let matches = self.matcher.match_features(
            &input_features,
            &reference_features,
            self.ratio_threshold,
        );
        tracing::debug!(
            input = input_features.len(),
            reference = reference_features.len(),
            matches = matches.len(),
            "features matched"
        );

        match self.fitter.fit(&matches) {
            Ok(Some(fit)) => Some(SliceShift {
                dx: fit.dx.round() as i32,
                dy: fit.dy.round() as i32,
                cost: fit.cost,
            }),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "robust fit failed, treating slice as unmatched");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::{FeatureSet, PointMatch};
    use crate::utils::TranslationFit;
    use ndarray::{s, Array2};

    fn speckle(width: usize, height: usize, seed: u64) -> Array2<f32> {
        let mut state = seed;
        Array2::from_shape_fn((height, width), |_| {
            state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407);
            ((state >> 33) % 256) as f32
        })
    }

    #[test]
    fn test_identical_slices_align_at_origin() {
        let aligner = SliceAligner::from_config(&Config::default()).unwrap();
        let image = speckle(96, 96, 3);
        let shift = aligner.align(&image.view(), &image.view()).unwrap();
        assert_eq!((shift.dx, shift.dy), (0, 0));
        assert!(shift.cost < 1e-6);
    }

    #[test]
    fn test_cropped_slice_recovers_offset() {
        let aligner = SliceAligner::from_config(&Config::default()).unwrap();
        let reference = speckle(128, 128, 11);
        let input = reference.slice(s![10..90, 7..95]).to_owned();
        let shift = aligner.align(&input.view(), &reference.view()).unwrap();
        assert_eq!((shift.dx, shift.dy), (7, 10));
    }

    #[test]
    fn test_featureless_slice_is_no_match() {
        let aligner = SliceAligner::from_config(&Config::default()).unwrap();
        let flat = Array2::from_elem((64, 64), 1.0f32);
        let image = speckle(64, 64, 5);
        assert!(aligner.align(&flat.view(), &image.view()).is_none());
    }

    struct FailingExtractor;

    impl FeatureExtractor for FailingExtractor {
        fn name(&self) -> &str {
            "failing"
        }

        fn extract(&self, _image: &ArrayView2<f32>) -> Result<FeatureSet> {
            anyhow::bail!("sensor glitch")
        }
    }

    struct DegenerateFitter;

    impl ModelFitter for DegenerateFitter {
        fn fit(&self, _matches: &[PointMatch]) -> Result<Option<TranslationFit>> {
            anyhow::bail!("singular system")
        }
    }

    #[test]
    fn test_collaborator_errors_become_no_match() {
        let image = speckle(64, 64, 9);

        let aligner = SliceAligner::new(
            Arc::new(FailingExtractor),
            Arc::new(RatioMatcher::new()),
            Arc::new(TranslationRansac::new()),
            0.75,
        );
        assert!(aligner.align(&image.view(), &image.view()).is_none());

        let aligner = SliceAligner::new(
            Arc::new(BriefExtractor::new()),
            Arc::new(RatioMatcher::new()),
            Arc::new(DegenerateFitter),
            0.75,
        );
        assert!(aligner.align(&image.view(), &image.view()).is_none());
    }

    #[cfg(not(feature = "opencv"))]
    #[test]
    fn test_sift_requires_opencv_feature() {
        let mut config = Config::default();
        config.features.extractor = ExtractorKind::Sift;
        assert!(SliceAligner::from_config(&config).is_err());
    }
}
