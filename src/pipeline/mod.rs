//! Reference alignment engine
//!
//! Slice registration feeds a per-volume consensus vote; candidate search
//! runs that vote against many references and the applier turns the winner
//! into crop bounds.

pub mod applier;
pub mod candidate_search;
pub mod consensus;
pub mod crop_finder;
pub mod slice_aligner;
pub mod traits;
pub mod types;
pub mod volume_aligner;

pub use applier::*;
pub use candidate_search::*;
pub use crop_finder::*;
pub use slice_aligner::*;
pub use traits::*;
pub use types::*;
pub use volume_aligner::*;
