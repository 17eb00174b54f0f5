pub mod loader;
pub mod scanner;

pub use loader::*;
pub use scanner::*;
