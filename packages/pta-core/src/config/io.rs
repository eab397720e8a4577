//! Configuration I/O (YAML loading and saving)

use super::error::{ConfigError, ConfigResult};
use super::preset::Preset;
use super::pta_config::PtaConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Supported schema versions
const SUPPORTED_VERSIONS: &[u32] = &[1];

/// YAML Schema v1
///
/// ```yaml
/// version: 1
/// preset: balanced
/// overrides:
///   max_iterations: 500000
///   external_policy: empty
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileV1 {
    /// Schema version (always 1 for v1)
    pub version: u32,

    /// Base preset
    pub preset: String,

    /// Fine-grained overrides, merged field by field over the preset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overrides: Option<serde_yaml::Mapping>,
}

impl PtaConfig {
    /// Parse a versioned YAML document
    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        let file: ConfigFileV1 = serde_yaml::from_str(yaml)?;
        if !SUPPORTED_VERSIONS.contains(&file.version) {
            return Err(ConfigError::UnsupportedVersion {
                found: file.version,
                supported: SUPPORTED_VERSIONS.to_vec(),
            });
        }

        let base = PtaConfig::from_preset(Preset::from_str(&file.preset)?);
        let config = match file.overrides {
            Some(overrides) => {
                let mut merged = match serde_yaml::to_value(&base)? {
                    serde_yaml::Value::Mapping(m) => m,
                    _ => serde_yaml::Mapping::new(),
                };
                for (key, value) in overrides {
                    merged.insert(key, value);
                }
                serde_yaml::from_value(serde_yaml::Value::Mapping(merged))?
            }
            None => base,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load a versioned YAML file
    pub fn from_yaml(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Serialize as a versioned YAML document (`custom` preset + full overrides)
    pub fn to_yaml(&self) -> ConfigResult<String> {
        let overrides = match serde_yaml::to_value(self)? {
            serde_yaml::Value::Mapping(m) => Some(m),
            _ => None,
        };
        let file = ConfigFileV1 {
            version: 1,
            preset: Preset::Custom.as_str().to_string(),
            overrides,
        };
        Ok(serde_yaml::to_string(&file)?)
    }
}
