//! Mapper configuration via `docmap.toml`
//!
//! The configuration is a small TOML file. A default file can be written on
//! first use; to change settings, edit the file and rebuild the mapper.

use docmap_core::{Error, Result, DEFAULT_IDENTITY_FIELD};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Config file name
pub const CONFIG_FILE_NAME: &str = "docmap.toml";

/// How a dynamic reference's stored `skip` is replayed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipMode {
    /// Apply `skip` as stored
    #[default]
    Skip,
    /// Reproduce the historical behavior where the skip branch re-applied
    /// the limit, so the stored skip never took effect
    LegacyAlias,
}

/// Mapper configuration loaded from `docmap.toml`.
///
/// # Example
///
/// ```toml
/// default_database = "main"
/// identity_field = "_id"
/// parallel_batches = false
/// skip_mode = "skip"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapperConfig {
    /// Database used when a model or reference does not name one
    #[serde(default = "default_database")]
    pub default_database: String,
    /// Identity field name; never unset by the diff engine
    #[serde(default = "default_identity_field")]
    pub identity_field: String,
    /// Run per-type reference batches on the rayon pool
    #[serde(default)]
    pub parallel_batches: bool,
    /// Skip replay mode for dynamic references
    #[serde(default)]
    pub skip_mode: SkipMode,
}

fn default_database() -> String {
    "main".to_string()
}

fn default_identity_field() -> String {
    DEFAULT_IDENTITY_FIELD.to_string()
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            default_database: default_database(),
            identity_field: default_identity_field(),
            parallel_batches: false,
            skip_mode: SkipMode::default(),
        }
    }
}

impl MapperConfig {
    /// Config with a specific default database
    pub fn with_database(database: impl Into<String>) -> Self {
        Self {
            default_database: database.into(),
            ..Default::default()
        }
    }

    /// Check field values that TOML parsing alone cannot reject.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty database name, or an identity field
    /// that is empty or contains `.` or a leading `$`.
    pub fn validate(&self) -> Result<()> {
        if self.default_database.is_empty() {
            return Err(Error::Config("default_database must not be empty".to_string()));
        }
        let id = &self.identity_field;
        if id.is_empty() || id.contains('.') || id.starts_with('$') {
            return Err(Error::Config(format!(
                "Invalid identity_field '{}': must be a plain top-level field name",
                id
            )));
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# docmap configuration
#
# Database used when a model or a reference does not name one
default_database = "main"

# Identity field; it is never emitted as an unset
identity_field = "_id"

# Resolve per-type reference batches concurrently (default: false)
parallel_batches = false

# Dynamic reference skip replay: "skip" (default) or "legacy_alias"
#   "legacy_alias" ignores the stored skip, as older writers did
skip_mode = "skip"
"#
    }

    /// Parse and validate config from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: MapperConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{} ({})", msg, path.display())),
            other => other,
        })
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                Error::Config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            Error::Config(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}
