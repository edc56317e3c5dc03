use serde::Deserialize;
use std::path::Path;

/// Settings for the seqlock stress harness.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct StressConfig {
    /// Number of reader threads spinning on the lock.
    #[serde(default = "defaults::readers")]
    pub readers: usize,
    /// Loads each reader performs before it reports done.
    #[serde(default = "defaults::reads_per_reader")]
    pub reads_per_reader: u64,
    #[serde(default = "defaults::log_level")]
    pub log_level: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

mod defaults {
    pub fn readers() -> usize {
        16
    }

    pub fn reads_per_reader() -> u64 {
        10_000_000
    }

    pub fn log_level() -> String {
        "info".into()
    }
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            readers: defaults::readers(),
            reads_per_reader: defaults::reads_per_reader(),
            log_level: defaults::log_level(),
        }
    }
}

impl StressConfig {
    pub fn load(path: impl AsRef<Path> + ToString) -> Result<Self, ConfigError> {
        let toml_to_str = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_toml(&toml_to_str)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let stress_config: StressConfig = toml::from_str(toml_str)?;
        stress_config.validate()?;
        Ok(stress_config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.readers == 0 {
            return Err(ConfigError::Invalid("readers must be at least 1".into()));
        }
        if self.reads_per_reader == 0 {
            return Err(ConfigError::Invalid(
                "reads_per_reader must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
