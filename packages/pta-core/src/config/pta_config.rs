//! Points-to analysis configuration

use super::error::{ConfigError, ConfigResult};
use super::preset::Preset;
use serde::{Deserialize, Serialize};

/// What an unresolved/external symbol may point to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExternalPolicy {
    /// Points to the universal object (sound default)
    Universal,
    /// Points to nothing (unsound for real programs, useful for tests)
    Empty,
}

impl Default for ExternalPolicy {
    fn default() -> Self {
        ExternalPolicy::Universal
    }
}

/// Pointer width/layout descriptor
///
/// The core is offset-agnostic; collaborators use this to compute offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PointerLayout {
    /// Pointer size in bytes
    pub pointer_size: u32,
}

impl Default for PointerLayout {
    fn default() -> Self {
        Self { pointer_size: 8 }
    }
}

impl PointerLayout {
    /// Pointer size in bits
    #[inline]
    pub fn pointer_bits(&self) -> u32 {
        self.pointer_size * 8
    }
}

/// Points-to analysis configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PtaConfig {
    /// Offline pointer equivalence (merge nodes with identical signatures)
    pub enable_pointer_equivalence: bool,

    /// Offline location equivalence (merge objects that always appear together)
    pub enable_location_equivalence: bool,

    /// Offline COPY-cycle collapse
    pub enable_offline_cycles: bool,

    /// Online (lazy) cycle detection during solving
    pub enable_online_cycles: bool,

    /// Max worklist pops (None = run to fixpoint)
    pub max_iterations: Option<usize>,

    /// Re-check every constraint after solving
    pub verify_fixpoint: bool,

    /// Default for external/unresolved symbols
    pub external_policy: ExternalPolicy,

    /// Pointer layout handed to generation collaborators
    pub layout: PointerLayout,
}

impl PtaConfig {
    /// Validate configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_iterations == Some(0) {
            return Err(ConfigError::ZeroIterationBound);
        }
        if !matches!(self.layout.pointer_size, 1 | 2 | 4 | 8 | 16) {
            return Err(ConfigError::PointerSize(self.layout.pointer_size));
        }
        if self.enable_location_equivalence && !self.enable_pointer_equivalence {
            return Err(ConfigError::Requires {
                option: "enable_location_equivalence",
                requires: "enable_pointer_equivalence",
            });
        }
        Ok(())
    }

    /// Builder: Set enable_pointer_equivalence
    pub fn pointer_equivalence(mut self, v: bool) -> Self {
        self.enable_pointer_equivalence = v;
        self
    }

    /// Builder: Set enable_location_equivalence
    pub fn location_equivalence(mut self, v: bool) -> Self {
        self.enable_location_equivalence = v;
        self
    }

    /// Builder: Set enable_offline_cycles
    pub fn offline_cycles(mut self, v: bool) -> Self {
        self.enable_offline_cycles = v;
        self
    }

    /// Builder: Set enable_online_cycles
    pub fn online_cycles(mut self, v: bool) -> Self {
        self.enable_online_cycles = v;
        self
    }

    /// Builder: Set max_iterations
    pub fn max_iterations(mut self, v: Option<usize>) -> Self {
        self.max_iterations = v;
        self
    }

    /// Builder: Set verify_fixpoint
    pub fn verify_fixpoint(mut self, v: bool) -> Self {
        self.verify_fixpoint = v;
        self
    }

    /// Builder: Set external_policy
    pub fn external_policy(mut self, v: ExternalPolicy) -> Self {
        self.external_policy = v;
        self
    }

    /// Builder: Set pointer size in bytes
    pub fn pointer_size(mut self, bytes: u32) -> Self {
        self.layout.pointer_size = bytes;
        self
    }

    /// True when any offline reduction is enabled
    pub fn any_offline(&self) -> bool {
        self.enable_pointer_equivalence
            || self.enable_location_equivalence
            || self.enable_offline_cycles
    }

    /// Get preset configuration
    pub fn from_preset(preset: Preset) -> Self {
        match preset {
            Preset::Fast => Self {
                enable_pointer_equivalence: false,
                enable_location_equivalence: false,
                enable_offline_cycles: true,
                enable_online_cycles: true,
                max_iterations: None,
                verify_fixpoint: false,
                external_policy: ExternalPolicy::Universal,
                layout: PointerLayout::default(),
            },
            Preset::Balanced => Self {
                enable_pointer_equivalence: true,
                enable_location_equivalence: true,
                enable_offline_cycles: true,
                enable_online_cycles: true,
                max_iterations: None,
                verify_fixpoint: false,
                external_policy: ExternalPolicy::Universal,
                layout: PointerLayout::default(),
            },
            Preset::Thorough => Self {
                verify_fixpoint: true,
                ..Self::from_preset(Preset::Balanced)
            },
            Preset::Custom => Self {
                enable_pointer_equivalence: false,
                enable_location_equivalence: false,
                enable_offline_cycles: false,
                enable_online_cycles: false,
                max_iterations: None,
                verify_fixpoint: false,
                external_policy: ExternalPolicy::Universal,
                layout: PointerLayout::default(),
            },
        }
    }
}

impl Default for PtaConfig {
    fn default() -> Self {
        Self::from_preset(Preset::Balanced)
    }
}
