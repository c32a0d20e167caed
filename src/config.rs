//! Configuration for arenas and logging
//!
//! Settings are read from TOML; every field has a default so a partial file
//! (or none at all) works.
//!
//! ```toml
//! [arena]
//! start_chunk_size = 64
//! slab_size = 1048576
//! growth_factor = 2.0
//!
//! [logging]
//! debug = true
//! format = "json"
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Arena sizing policy, fixed for the arena's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Chunk size of the smallest class (bytes)
    pub start_chunk_size: usize,
    /// Bytes per slab; also the largest allocation served
    pub slab_size: usize,
    /// Ratio between consecutive class chunk sizes
    pub growth_factor: f64,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            start_chunk_size: 64,
            slab_size: 1024 * 1024,
            growth_factor: 2.0,
        }
    }
}

impl ArenaConfig {
    pub fn validate(&self) -> Result<()> {
        if self.start_chunk_size == 0 {
            return Err(Error::InvalidArgument(
                "start_chunk_size must be greater than 0".to_string(),
            ));
        }
        if self.slab_size == 0 {
            return Err(Error::InvalidArgument(
                "slab_size must be greater than 0".to_string(),
            ));
        }
        if !self.growth_factor.is_finite() || self.growth_factor <= 1.0 {
            return Err(Error::InvalidArgument(format!(
                "growth_factor must be a finite number greater than 1.0, got {}",
                self.growth_factor
            )));
        }
        Ok(())
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable multi-line output
    Pretty,
    /// Single-line output
    #[default]
    Compact,
    /// JSON lines for log shippers
    Json,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(Error::Config(format!("unknown log format: {}", other))),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Turn on the allocator's debug output (slab growth, class creation)
    pub debug: bool,
    /// Base filter directive, e.g. "info" or "warn,slabarena=trace"
    pub filter: String,
    pub format: LogFormat,
    /// Colored output
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            debug: false,
            filter: "info".to_string(),
            format: LogFormat::default(),
            ansi: true,
        }
    }
}

impl LogConfig {
    /// Effective filter directive, with the debug flag applied
    pub fn directive(&self) -> String {
        if self.debug {
            format!("{},slabarena=debug", self.filter)
        } else {
            self.filter.clone()
        }
    }
}

/// Top-level settings file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub arena: ArenaConfig,
    pub logging: LogConfig,
}

impl Settings {
    /// Parse and validate settings from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let settings: Settings =
            toml::from_str(text).map_err(|e| Error::Config(format!("Invalid settings: {}", e)))?;
        settings.arena.validate()?;
        Ok(settings)
    }

    /// Load settings from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }
}
