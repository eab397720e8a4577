//! Configuration error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// Pointer width outside {1, 2, 4, 8, 16} bytes
    #[error("Invalid pointer size {0}: expected 1, 2, 4, 8 or 16 bytes")]
    PointerSize(u32),

    /// `max_iterations: Some(0)` would stop before the first pop
    #[error("max_iterations must be at least 1 (or unset for no bound)")]
    ZeroIterationBound,

    /// An enabled pass needs another pass that is disabled
    #[error("{option} requires {requires}")]
    Requires {
        option: &'static str,
        requires: &'static str,
    },

    #[error("Unsupported configuration version {found}. Supported versions: {}", supported.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", "))]
    UnsupportedVersion { found: u32, supported: Vec<u32> },

    #[error("Unknown preset '{0}'. Valid presets: fast, balanced, thorough, custom")]
    UnknownPreset(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert!(ConfigError::PointerSize(3).to_string().contains("pointer size 3"));

        let err = ConfigError::Requires {
            option: "enable_location_equivalence",
            requires: "enable_pointer_equivalence",
        };
        assert_eq!(
            err.to_string(),
            "enable_location_equivalence requires enable_pointer_equivalence"
        );
    }

    #[test]
    fn test_unsupported_version_formatting() {
        let err = ConfigError::UnsupportedVersion {
            found: 3,
            supported: vec![1],
        };
        assert_eq!(
            err.to_string(),
            "Unsupported configuration version 3. Supported versions: 1"
        );
    }
}
