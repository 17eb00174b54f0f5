pub mod ransac;

pub use ransac::*;
