use crate::error::CandidateError;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;

/// Integer offset estimated from one slice pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SliceShift {
    pub dx: i32,
    pub dy: i32,
    pub cost: f64,
}

/// Consensus offset of one input/reference volume pair.
///
/// `(dx, dy)` carries input coordinates onto reference coordinates.
/// `support_count` is the size of the largest group of slices that voted for
/// exactly this offset and `cost` is the mean cost within that group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Alignment {
    pub dx: i32,
    pub dy: i32,
    pub cost: f64,
    pub support_count: usize,
}

impl Alignment {
    pub fn new(dx: i32, dy: i32, cost: f64, support_count: usize) -> Self {
        Self {
            dx,
            dy,
            cost,
            support_count,
        }
    }

    /// The zero-support result used for incompatible pairs and empty votes.
    pub fn none() -> Self {
        Self::new(0, 0, 0.0, 0)
    }

    pub fn is_supported(&self) -> bool {
        self.support_count > 0
    }
}

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{},{},{},{}]",
            self.dx, self.dy, self.cost, self.support_count
        )
    }
}

/// A candidate reference: a dataset inside a volume file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CandidateRef {
    pub path: PathBuf,
    pub dataset: String,
}

impl CandidateRef {
    pub fn new(path: impl Into<PathBuf>, dataset: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            dataset: dataset.into(),
        }
    }
}

impl fmt::Display for CandidateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.path.display(), self.dataset)
    }
}

/// Outcome of aligning the input against one candidate.
#[derive(Debug)]
pub struct CandidateResult {
    pub candidate: CandidateRef,
    pub outcome: Result<Alignment, CandidateError>,
}

impl CandidateResult {
    pub fn alignment(&self) -> Option<&Alignment> {
        self.outcome.as_ref().ok()
    }
}

impl Serialize for CandidateResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("CandidateResult", 3)?;
        state.serialize_field("candidate", &self.candidate)?;
        state.serialize_field("alignment", &self.alignment())?;
        state.serialize_field(
            "error",
            &self.outcome.as_ref().err().map(|e| e.to_string()),
        )?;
        state.end()
    }
}

/// Per-axis inclusive bounds, one entry per source volume dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropInterval {
    pub min: Vec<i64>,
    pub max: Vec<i64>,
}

impl CropInterval {
    pub fn dimensions(&self) -> Vec<i64> {
        self.min
            .iter()
            .zip(self.max.iter())
            .map(|(lo, hi)| hi - lo + 1)
            .collect()
    }
}

/// Role a dataset plays inside a candidate file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatasetRole {
    Reference,
    Training,
    Mask,
    Label,
}

impl DatasetRole {
    /// Dataset path the role is written to in the training output file.
    pub fn output_dataset(&self) -> Option<&'static str> {
        match self {
            DatasetRole::Reference => None,
            DatasetRole::Training => Some("/training/reference"),
            DatasetRole::Mask => Some("/training/data"),
            DatasetRole::Label => Some("/training/labels"),
        }
    }

    pub fn is_cropped(&self) -> bool {
        matches!(self, DatasetRole::Training | DatasetRole::Mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alignment_display_matches_log_format() {
        assert_eq!(Alignment::new(5, -2, 1.5, 8).to_string(), "[5,-2,1.5,8]");
        assert!(!Alignment::none().is_supported());
    }

    #[test]
    fn test_crop_interval_dimensions() {
        let interval = CropInterval {
            min: vec![0, 4, 1],
            max: vec![9, 103, 50],
        };
        assert_eq!(interval.dimensions(), vec![10, 100, 50]);
    }

    #[test]
    fn test_only_training_and_mask_are_cropped() {
        assert!(DatasetRole::Training.is_cropped());
        assert!(DatasetRole::Mask.is_cropped());
        assert!(!DatasetRole::Label.is_cropped());
        assert_eq!(DatasetRole::Reference.output_dataset(), None);
    }

    #[test]
    fn test_candidate_result_serializes_outcome() {
        let ok = CandidateResult {
            candidate: CandidateRef::new("a.vol", "/reference"),
            outcome: Ok(Alignment::new(1, 2, 0.5, 3)),
        };
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["alignment"]["support_count"], 3);
        assert!(json["error"].is_null());

        let failed = CandidateResult {
            candidate: CandidateRef::new("b.vol", "/reference"),
            outcome: Err(CandidateError::Panicked("boom".into())),
        };
        let json = serde_json::to_value(&failed).unwrap();
        assert!(json["alignment"].is_null());
        assert_eq!(json["error"], "alignment task panicked: boom");
    }
}
