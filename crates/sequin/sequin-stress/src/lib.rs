mod error;
mod runner;

pub use error::StressError;
pub use runner::{StressReport, StressRunner, smoke};
