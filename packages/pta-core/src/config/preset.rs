//! Preset configurations
//!
//! Presets provide complete default configurations for common use cases.

use super::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};

/// Configuration preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// Smallest setup cost: offline cycle collapse only, no equivalence labeling
    Fast,

    /// All offline and online optimizations, unbounded solve
    Balanced,

    /// Balanced plus a post-solve pass that re-checks every constraint
    Thorough,

    /// Every optimization disabled; a reference solve for comparisons
    Custom,
}

impl Preset {
    /// Parse preset from string
    pub fn from_str(s: &str) -> ConfigResult<Self> {
        match s.to_lowercase().as_str() {
            "fast" => Ok(Self::Fast),
            "balanced" => Ok(Self::Balanced),
            "thorough" => Ok(Self::Thorough),
            "custom" => Ok(Self::Custom),
            _ => Err(ConfigError::UnknownPreset(s.to_string())),
        }
    }

    /// Lowercase name, as written in YAML
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Balanced => "balanced",
            Self::Thorough => "thorough",
            Self::Custom => "custom",
        }
    }
}

impl Default for Preset {
    fn default() -> Self {
        Self::Balanced
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_from_str() {
        assert_eq!(Preset::from_str("fast").unwrap(), Preset::Fast);
        assert_eq!(Preset::from_str("BALANCED").unwrap(), Preset::Balanced);
        assert!(matches!(
            Preset::from_str("turbo"),
            Err(ConfigError::UnknownPreset(_))
        ));
    }

    #[test]
    fn test_preset_name_roundtrip() {
        for preset in [
            Preset::Fast,
            Preset::Balanced,
            Preset::Thorough,
            Preset::Custom,
        ] {
            assert_eq!(Preset::from_str(preset.as_str()).unwrap(), preset);
        }
    }
}
