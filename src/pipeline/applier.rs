use super::types::{Alignment, CropInterval};
use crate::volume::{Axis, Volume};

/// Turns a winning [`Alignment`] into crop bounds for datasets that share
/// the reference's XY footprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignmentApplier {
    reference_xy: (usize, usize),
}

impl AlignmentApplier {
    /// `reference_xy` is the `(width, height)` of the winning reference.
    pub fn new(reference_xy: (usize, usize)) -> Self {
        Self { reference_xy }
    }

    pub fn for_reference(reference: &Volume) -> Self {
        Self::new((reference.width(), reference.height()))
    }

    pub fn reference_xy(&self) -> (usize, usize) {
        self.reference_xy
    }

    /// Inclusive bounds on every axis of `source`.
    ///
    /// X spans `dx - 1 ..= dx - 2 + width` and Y likewise with `dy` and the
    /// target height; Z and Channel keep the source's full range. Returns
    /// `None` when the source's XY extent differs from the reference's.
    pub fn crop_interval(
        &self,
        alignment: &Alignment,
        source: &Volume,
        target_xy: (usize, usize),
    ) -> Option<CropInterval> {
        if (source.width(), source.height()) != self.reference_xy {
            tracing::debug!(
                width = source.width(),
                height = source.height(),
                reference_width = self.reference_xy.0,
                reference_height = self.reference_xy.1,
                "XY footprint differs from reference, not cropping"
            );
            return None;
        }

        let (target_width, target_height) = target_xy;
        let mut min = Vec::with_capacity(source.ndim());
        let mut max = Vec::with_capacity(source.ndim());
        for (dim, axis) in source.axes().iter().enumerate() {
            let (lo, hi) = match axis {
                Axis::X => {
                    let lo = i64::from(alignment.dx) - 1;
                    (lo, lo + target_width as i64 - 1)
                }
                Axis::Y => {
                    let lo = i64::from(alignment.dy) - 1;
                    (lo, lo + target_height as i64 - 1)
                }
                Axis::Z | Axis::Channel => (source.min(dim), source.max(dim)),
            };
            min.push(lo);
            max.push(hi);
        }
        Some(CropInterval { min, max })
    }
}
