pub mod algorithms;
pub mod config;
pub mod data;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod utils;
pub mod volume;

pub use algorithms::*;
pub use config::Config;
pub use data::*;
pub use error::{CandidateError, ConfigError};
pub use pipeline::*;
pub use volume::{ArchiveStore, Axis, MemoryStore, Volume, VolumeStore};

pub type Result<T> = anyhow::Result<T>;
