//! Spans for candidate searches
//!
//! One `search` span per run carries the run id; every candidate task opens a
//! child `candidate` span so that events from worker threads stay correlated.

use crate::error::CandidateError;
use crate::pipeline::{Alignment, CandidateRef};
use std::time::{Duration, Instant};
use tracing::{info_span, Span};
use uuid::Uuid;

pub struct SearchSpan {
    span: Span,
    start_time: Instant,
}

impl SearchSpan {
    pub fn new(run_id: Uuid, candidates: usize, workers: usize) -> Self {
        let span = info_span!("search", run_id = %run_id, candidates, workers);
        tracing::info!(parent: &span, "starting candidate search");
        Self {
            span,
            start_time: Instant::now(),
        }
    }

    /// Child span for the task aligning `candidate`.
    pub fn candidate_span(&self, index: usize, candidate: &CandidateRef) -> Span {
        info_span!(
            parent: &self.span,
            "candidate",
            index,
            path = %candidate.path.display(),
            dataset = %candidate.dataset
        )
    }

    pub fn record_outcome(
        &self,
        candidate: &CandidateRef,
        outcome: &Result<Alignment, CandidateError>,
    ) {
        match outcome {
            Ok(alignment) => tracing::debug!(
                parent: &self.span,
                candidate = %candidate,
                dx = alignment.dx,
                dy = alignment.dy,
                cost = alignment.cost,
                support = alignment.support_count,
                "candidate aligned"
            ),
            Err(error) => tracing::warn!(
                parent: &self.span,
                candidate = %candidate,
                %error,
                "candidate unavailable, excluded from the vote"
            ),
        }
    }

    pub fn finish(self, winner: Option<(&CandidateRef, &Alignment)>) -> Duration {
        let elapsed = self.start_time.elapsed();
        match winner {
            Some((candidate, alignment)) => tracing::info!(
                parent: &self.span,
                winner = %candidate,
                dx = alignment.dx,
                dy = alignment.dy,
                support = alignment.support_count,
                elapsed_ms = elapsed.as_millis() as u64,
                "candidate search finished"
            ),
            None => tracing::warn!(
                parent: &self.span,
                elapsed_ms = elapsed.as_millis() as u64,
                "candidate search found no viable reference"
            ),
        }
        elapsed
    }
}
