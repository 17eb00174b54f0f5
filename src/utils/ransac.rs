use crate::algorithms::PointMatch;
use crate::config::RansacConfig;
use crate::Result;
use anyhow::bail;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// A fitted 2D translation with its residual cost.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TranslationFit {
    pub dx: f64,
    pub dy: f64,
    /// Weighted mean residual distance of the inliers, in pixels.
    pub cost: f64,
    pub inliers: usize,
}

/// Robust model estimation over point correspondences.
///
/// `Ok(None)` means no model reached the acceptance criteria; `Err` signals a
/// numerically degenerate input.
pub trait ModelFitter: Send + Sync {
    fn fit(&self, matches: &[PointMatch]) -> Result<Option<TranslationFit>>;
}

/// RANSAC for a translation-only model. The minimal sample is a single match.
#[derive(Clone, Debug, Default)]
pub struct TranslationRansac {
    config: RansacConfig,
}

impl TranslationRansac {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: RansacConfig) -> Self {
        Self { config }
    }

    fn accepted(&self, inliers: usize, total: usize) -> bool {
        inliers >= self.config.min_inliers
            && inliers as f64 / total as f64 >= self.config.min_inlier_ratio
    }
}

impl ModelFitter for TranslationRansac {
    fn fit(&self, matches: &[PointMatch]) -> Result<Option<TranslationFit>> {
        if matches.iter().any(|m| {
            !(m.source.0.is_finite()
                && m.source.1.is_finite()
                && m.target.0.is_finite()
                && m.target.1.is_finite()
                && m.weight.is_finite())
        }) {
            bail!("point matches contain non-finite values");
        }
        if matches.is_empty() || matches.len() < self.config.min_inliers {
            return Ok(None);
        }

        let tolerance = self.config.inlier_tolerance;
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut best: Vec<usize> = Vec::new();

        for _ in 0..self.config.max_iterations {
            let Some(sample) = matches.choose(&mut rng) else {
                break;
            };
            let inliers = collect_inliers(matches, sample.displacement(), tolerance);
            if inliers.len() > best.len() {
                best = inliers;
                if best.len() == matches.len() {
                    break;
                }
            }
        }

        if !self.accepted(best.len(), matches.len()) {
            return Ok(None);
        }

        // Re-fit on the consensus set until it stops changing.
        let mut translation = weighted_mean_displacement(matches, &best)?;
        for _ in 0..self.config.max_refinements {
            let refined = collect_inliers(matches, translation, tolerance);
            if refined == best {
                break;
            }
            if !self.accepted(refined.len(), matches.len()) {
                return Ok(None);
            }
            best = refined;
            translation = weighted_mean_displacement(matches, &best)?;
        }

        let cost = weighted_mean_residual(matches, &best, translation)?;
        tracing::trace!(
            dx = translation.0,
            dy = translation.1,
            cost,
            inliers = best.len(),
            total = matches.len(),
            "translation model accepted"
        );

        Ok(Some(TranslationFit {
            dx: translation.0,
            dy: translation.1,
            cost,
            inliers: best.len(),
        }))
    }
}

/// Fits a translation with the given RANSAC budget and default inlier floor.
pub fn fit_robust_translation(
    matches: &[PointMatch],
    max_iterations: usize,
    inlier_tolerance: f64,
    min_inlier_ratio: f64,
) -> Result<Option<TranslationFit>> {
    TranslationRansac::with_config(RansacConfig {
        max_iterations,
        inlier_tolerance,
        min_inlier_ratio,
        ..RansacConfig::default()
    })
    .fit(matches)
}

fn residual(m: &PointMatch, translation: (f64, f64)) -> f64 {
    let dx = m.source.0 + translation.0 - m.target.0;
    let dy = m.source.1 + translation.1 - m.target.1;
    (dx * dx + dy * dy).sqrt()
}

fn collect_inliers(matches: &[PointMatch], translation: (f64, f64), tolerance: f64) -> Vec<usize> {
    matches
        .iter()
        .enumerate()
        .filter(|(_, m)| residual(m, translation) < tolerance)
        .map(|(i, _)| i)
        .collect()
}

fn weighted_mean_displacement(matches: &[PointMatch], inliers: &[usize]) -> Result<(f64, f64)> {
    let (mut sx, mut sy, mut sw) = (0.0, 0.0, 0.0);
    for &i in inliers {
        let (dx, dy) = matches[i].displacement();
        let w = matches[i].weight;
        sx += w * dx;
        sy += w * dy;
        sw += w;
    }
    if sw <= 0.0 || !sw.is_finite() {
        bail!("degenerate inlier weights (sum {})", sw);
    }
    Ok((sx / sw, sy / sw))
}

fn weighted_mean_residual(
    matches: &[PointMatch],
    inliers: &[usize],
    translation: (f64, f64),
) -> Result<f64> {
    let (mut sum, mut sw) = (0.0, 0.0);
    for &i in inliers {
        let w = matches[i].weight;
        sum += w * residual(&matches[i], translation);
        sw += w;
    }
    if sw <= 0.0 || !sw.is_finite() {
        bail!("degenerate inlier weights (sum {})", sw);
    }
    Ok(sum / sw)
}
