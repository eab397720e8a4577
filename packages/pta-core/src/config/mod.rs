//! Analysis Configuration
//!
//! Two ways to configure the points-to core:
//! - Preset: `PtaConfig::from_preset(Preset::Balanced)` plus builder setters,
//!   checked by `PtaConfig::validate`
//! - YAML: `PtaConfig::from_yaml("pta.yaml")` (versioned schema, see `io`)
//!
//! # Examples
//!
//! ```rust,ignore
//! use pta_core::config::{PtaConfig, Preset, ExternalPolicy};
//!
//! let config = PtaConfig::from_preset(Preset::Thorough)
//!     .external_policy(ExternalPolicy::Empty)
//!     .max_iterations(Some(1_000_000));
//! config.validate()?;
//! ```

pub mod error;
pub mod io;
pub mod preset;
pub mod pta_config;

// Re-exports
pub use error::{ConfigError, ConfigResult};
pub use io::ConfigFileV1;
pub use preset::Preset;
pub use pta_config::{ExternalPolicy, PointerLayout, PtaConfig};
