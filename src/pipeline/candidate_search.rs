use super::types::{Alignment, CandidateRef, CandidateResult};
use super::volume_aligner::VolumeAligner;
use crate::config::Config;
use crate::error::{CandidateError, ConfigError};
use crate::logging::{new_run_id, SearchSpan};
use crate::volume::{Volume, VolumeStore};
use crate::Result;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::Serialize;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use uuid::Uuid;

/// Everything one search produced, in candidate submission order.
#[derive(Debug, Serialize)]
pub struct SearchReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub workers: usize,
    pub results: Vec<CandidateResult>,
    pub winner: Option<(CandidateRef, Alignment)>,
}

impl SearchReport {
    pub fn failures(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_err()).count()
    }
}

/// Aligns one input volume against many candidate references in parallel
/// and keeps the best supported one.
pub struct CandidateSearch {
    store: Arc<dyn VolumeStore>,
    aligner: VolumeAligner,
    pool: ThreadPool,
    workers: usize,
    sample_count: usize,
    strict: bool,
}

impl CandidateSearch {
    pub fn new(
        store: Arc<dyn VolumeStore>,
        aligner: VolumeAligner,
        workers: usize,
        sample_count: usize,
        strict: bool,
    ) -> Result<Self> {
        if workers == 0 {
            return Err(ConfigError::Invalid("candidate search needs at least one worker".into()).into());
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("refalign-worker-{i}"))
            .build()?;

        Ok(Self {
            store,
            aligner,
            pool,
            workers,
            sample_count,
            strict,
        })
    }

    pub fn from_config(store: Arc<dyn VolumeStore>, config: &Config) -> Result<Self> {
        Self::new(
            store,
            VolumeAligner::from_config(config)?,
            config.search.workers,
            config.alignment.sample_count,
            config.search.strict,
        )
    }

    /// Best `(candidate, alignment)` pair, or `None` when nothing is viable.
    pub fn find_best(
        &self,
        input: &Volume,
        candidates: &[CandidateRef],
    ) -> Option<(CandidateRef, Alignment)> {
        self.search(input, candidates).winner
    }

    /// Runs one task per candidate and reports every outcome.
    ///
    /// A candidate that cannot be opened, fails to align or panics is
    /// excluded from the vote; it never aborts the search.
    pub fn search(&self, input: &Volume, candidates: &[CandidateRef]) -> SearchReport {
        let run_id = new_run_id();
        let started_at = Utc::now();
        let span = SearchSpan::new(run_id, candidates.len(), self.workers);

        let results: Vec<CandidateResult> = self.pool.install(|| {
            candidates
                .par_iter()
                .enumerate()
                .map(|(index, candidate)| {
                    let outcome = span
                        .candidate_span(index, candidate)
                        .in_scope(|| self.run_task(input, candidate));
                    span.record_outcome(candidate, &outcome);
                    CandidateResult {
                        candidate: candidate.clone(),
                        outcome,
                    }
                })
                .collect()
        });

        let winner = select_winner(&results);
        span.finish(winner.as_ref().map(|(c, a)| (c, a)));

        SearchReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            workers: self.workers,
            results,
            winner,
        }
    }

    fn run_task(
        &self,
        input: &Volume,
        candidate: &CandidateRef,
    ) -> std::result::Result<Alignment, CandidateError> {
        catch_unwind(AssertUnwindSafe(|| self.align_candidate(input, candidate)))
            .unwrap_or_else(|payload| Err(CandidateError::Panicked(panic_message(payload))))
    }

    fn align_candidate(
        &self,
        input: &Volume,
        candidate: &CandidateRef,
    ) -> std::result::Result<Alignment, CandidateError> {
        let reference = self
            .store
            .open(&candidate.path, &candidate.dataset)
            .map_err(|reason| CandidateError::Open {
                path: candidate.path.clone(),
                dataset: candidate.dataset.clone(),
                reason,
            })?;
        self.aligner
            .align(input, &reference, self.sample_count, self.strict)
            .map_err(CandidateError::Align)
    }
}

/// First candidate, in submission order, with the largest positive support.
pub fn select_winner(results: &[CandidateResult]) -> Option<(CandidateRef, Alignment)> {
    let mut best: Option<(&CandidateRef, &Alignment)> = None;
    for result in results {
        let Some(alignment) = result.alignment() else {
            continue;
        };
        if !alignment.is_supported() {
            continue;
        }
        if best.map_or(true, |(_, b)| alignment.support_count > b.support_count) {
            best = Some((&result.candidate, alignment));
        }
    }
    best.map(|(candidate, alignment)| (candidate.clone(), *alignment))
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
