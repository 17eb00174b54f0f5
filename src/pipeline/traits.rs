use super::types::SliceShift;
use ndarray::ArrayView2;

/// Estimates the translation between one input slice and one reference slice.
///
/// Both slices are indexed `[y, x]`. `None` means the pair could not be
/// aligned; it is a normal outcome, not an error.
pub trait SliceRegistration: Send + Sync {
    fn align(&self, input: &ArrayView2<f32>, reference: &ArrayView2<f32>) -> Option<SliceShift>;
}
