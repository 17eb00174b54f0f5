use super::consensus;
use super::slice_aligner::SliceAligner;
use super::traits::SliceRegistration;
use super::types::{Alignment, SliceShift};
use crate::config::Config;
use crate::volume::Volume;
use crate::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

/// Aligns two volumes by voting over per-slice translation estimates.
#[derive(Clone)]
pub struct VolumeAligner {
    registration: Arc<dyn SliceRegistration>,
    channel: usize,
    sampling_seed: Option<u64>,
}

impl VolumeAligner {
    pub fn new(registration: Arc<dyn SliceRegistration>) -> Self {
        Self {
            registration,
            channel: 0,
            sampling_seed: None,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let aligner = SliceAligner::from_config(config)?;
        Ok(Self::new(Arc::new(aligner))
            .with_channel(config.alignment.channel)
            .with_sampling_seed(config.alignment.sampling_seed))
    }

    pub fn with_channel(mut self, channel: usize) -> Self {
        self.channel = channel;
        self
    }

    pub fn with_sampling_seed(mut self, seed: Option<u64>) -> Self {
        self.sampling_seed = seed;
        self
    }

    /// One-based slice indices to evaluate.
    ///
    /// `sample_count == 0` (or equal to `max_slice`) walks every slice in
    /// order; any other count draws that many indices with replacement.
    pub fn slice_indices(&self, max_slice: usize, sample_count: usize) -> Vec<usize> {
        if max_slice == 0 {
            return Vec::new();
        }
        if sample_count == 0 || sample_count == max_slice {
            return (1..=max_slice).collect();
        }

        let mut rng = match self.sampling_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        (0..sample_count)
            .map(|_| rng.gen_range(1..=max_slice))
            .collect()
    }

    /// Consensus offset carrying `input` coordinates onto `reference`.
    ///
    /// In strict mode volumes with different Z extents are incompatible and
    /// yield [`Alignment::none`] without touching any slice.
    pub fn align(
        &self,
        input: &Volume,
        reference: &Volume,
        sample_count: usize,
        strict: bool,
    ) -> Result<Alignment> {
        if strict && input.depth() != reference.depth() {
            tracing::debug!(
                input_depth = input.depth(),
                reference_depth = reference.depth(),
                "strict mode: Z extents differ, pair is incompatible"
            );
            return Ok(Alignment::none());
        }

        let max_slice = input.depth().min(reference.depth());
        let indices = self.slice_indices(max_slice, sample_count);
        let span = tracing::debug_span!("volume_align", max_slice, samples = indices.len());
        let _enter = span.enter();

        let mut shifts: Vec<Option<SliceShift>> = Vec::with_capacity(indices.len());
        for slice in indices {
            let input_plane = input.slice(slice - 1, self.channel)?;
            let reference_plane = reference.slice(slice - 1, self.channel)?;
            let shift = self
                .registration
                .align(&input_plane.view(), &reference_plane.view());
            match &shift {
                Some(s) => tracing::debug!(slice, dx = s.dx, dy = s.dy, cost = s.cost, "slice aligned"),
                None => tracing::debug!(slice, "slice has no match"),
            }
            shifts.push(shift);
        }

        let alignment = consensus::vote(&shifts);
        tracing::debug!(%alignment, "consensus reached");
        Ok(alignment)
    }
}
