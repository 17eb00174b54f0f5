use super::features::FeatureSet;
use crate::config::MatchingConfig;

/// A correspondence between a position in the input slice (`source`) and a
/// position in the reference slice (`target`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointMatch {
    pub source: (f64, f64),
    pub target: (f64, f64),
    pub weight: f64,
}

impl PointMatch {
    pub fn new(source: (f64, f64), target: (f64, f64)) -> Self {
        Self {
            source,
            target,
            weight: 1.0,
        }
    }

    /// Offset that carries `source` onto `target`.
    pub fn displacement(&self) -> (f64, f64) {
        (
            self.target.0 - self.source.0,
            self.target.1 - self.source.1,
        )
    }
}

/// Pairs up features of two sets.
pub trait FeatureMatcher: Send + Sync {
    fn match_features(&self, source: &FeatureSet, target: &FeatureSet, ratio: f32)
        -> Vec<PointMatch>;
}

/// Brute-force nearest neighbour matching with Lowe's ratio test and
/// rejection of targets claimed by more than one source feature.
#[derive(Debug, Clone, Default)]
pub struct RatioMatcher {
    max_distance: Option<f64>,
}

impl RatioMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: &MatchingConfig) -> Self {
        Self {
            max_distance: config.max_distance,
        }
    }
}

impl FeatureMatcher for RatioMatcher {
    fn match_features(
        &self,
        source: &FeatureSet,
        target: &FeatureSet,
        ratio: f32,
    ) -> Vec<PointMatch> {
        let mut candidates: Vec<(usize, usize, f64)> = Vec::new();

        for (source_idx, source_feature) in source.iter().enumerate() {
            let mut best = f64::INFINITY;
            let mut second = f64::INFINITY;
            let mut best_idx = None;

            for (target_idx, target_feature) in target.iter().enumerate() {
                let distance = source_feature.descriptor.distance(&target_feature.descriptor);
                if distance < best {
                    second = best;
                    best = distance;
                    best_idx = Some(target_idx);
                } else if distance < second {
                    second = distance;
                }
            }

            let Some(target_idx) = best_idx else {
                continue;
            };
            if self.max_distance.is_some_and(|max| best > max) {
                continue;
            }
            // A lone candidate has an infinite runner-up and always passes.
            if best < ratio as f64 * second {
                candidates.push((source_idx, target_idx, best));
            }
        }

        let mut claims = vec![0usize; target.len()];
        for (_, target_idx, _) in &candidates {
            claims[*target_idx] += 1;
        }

        candidates
            .into_iter()
            .filter(|(_, target_idx, _)| claims[*target_idx] == 1)
            .map(|(source_idx, target_idx, distance)| PointMatch {
                source: source[source_idx].position,
                target: target[target_idx].position,
                weight: 1.0 / (1.0 + distance),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::features::{Descriptor, Feature};

    fn feature(x: f64, y: f64, values: &[f32]) -> Feature {
        Feature {
            position: (x, y),
            descriptor: Descriptor::Float(values.to_vec()),
        }
    }

    #[test]
    fn test_ratio_test_rejects_ambiguous_neighbours() {
        let source = vec![feature(1.0, 1.0, &[0.0, 0.0])];
        let target = vec![feature(5.0, 5.0, &[1.0, 0.0]), feature(9.0, 9.0, &[0.0, 1.1])];
        let matcher = RatioMatcher::new();
        assert!(matcher.match_features(&source, &target, 0.75).is_empty());

        let target = vec![feature(5.0, 5.0, &[0.1, 0.0]), feature(9.0, 9.0, &[0.0, 2.0])];
        let matches = matcher.match_features(&source, &target, 0.75);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].displacement(), (4.0, 4.0));
    }

    #[test]
    fn test_single_target_passes_ratio_test() {
        let source = vec![feature(0.0, 0.0, &[3.0])];
        let target = vec![feature(2.0, 1.0, &[3.5])];
        let matches = RatioMatcher::new().match_features(&source, &target, 0.75);
        assert_eq!(matches.len(), 1);
        assert!((matches[0].weight - 1.0 / 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_shared_target_is_discarded() {
        let source = vec![feature(0.0, 0.0, &[1.0]), feature(3.0, 3.0, &[1.01])];
        let target = vec![feature(2.0, 2.0, &[1.0]), feature(7.0, 7.0, &[50.0])];
        let matches = RatioMatcher::new().match_features(&source, &target, 0.75);
        assert!(matches.is_empty());
    }

    #[test]
    fn test_max_distance_filter() {
        let config = MatchingConfig {
            max_distance: Some(0.5),
            ..MatchingConfig::default()
        };
        let source = vec![feature(0.0, 0.0, &[0.0])];
        let target = vec![feature(1.0, 1.0, &[1.0])];
        let matcher = RatioMatcher::with_config(&config);
        assert!(matcher.match_features(&source, &target, 0.75).is_empty());
    }
}
