mod config;

pub use config::{ConfigError, StressConfig};
