pub mod brief;
pub mod features;
pub mod matching;
#[cfg(feature = "opencv")]
pub mod opencv_sift;

pub use brief::*;
pub use features::*;
pub use matching::*;
#[cfg(feature = "opencv")]
pub use opencv_sift::*;
