//! Configuration System
//!
//! Layered configuration for the renderer: merge-policy defaults, an optional TOML
//! file, then `MARKUP_*` environment variables (`__` separates nested keys, e.g.
//! `MARKUP_RENDER__CHUNK_SIZE=4096`).

use crate::error::ConfigError;
use crate::logging::LoggingConfig;
use crate::markup::is_valid_attribute_name;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod merge_policy;
mod sources;

/// Default prefix for environment overrides
pub const ENV_PREFIX: &str = "MARKUP";

/// Renderer settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Suppress boundary markers, text separators and the root attribute
    #[serde(default)]
    pub static_markup: bool,

    /// Attribute rendered as `name=""` on the first element (non-static only)
    #[serde(default)]
    pub root_attribute: Option<String>,

    /// Size hint used by stream adapters for each read
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Publish fallback placeholders when a boundary first suspends (stream mode)
    #[serde(default = "default_true")]
    pub placeholders: bool,
}

fn default_chunk_size() -> usize {
    16 * 1024
}

fn default_true() -> bool {
    true
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            static_markup: false,
            root_attribute: None,
            chunk_size: default_chunk_size(),
            placeholders: default_true(),
        }
    }
}

impl RenderConfig {
    /// Configuration for the minimal variant without structural markers
    pub fn static_markup() -> Self {
        Self {
            static_markup: true,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid(
                "render.chunk_size must be greater than zero".to_string(),
            ));
        }
        if let Some(name) = &self.root_attribute {
            if !is_valid_attribute_name(name) {
                return Err(ConfigError::Invalid(format!(
                    "render.root_attribute {:?} is not a valid attribute name",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub render: RenderConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.render.validate()?;
        self.logging.validate()
    }
}

/// Loads [`Settings`] from defaults, an optional file and the environment
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    file: Option<PathBuf>,
    env_prefix: String,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self {
            file: None,
            env_prefix: ENV_PREFIX.to_string(),
        }
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        self.file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn load(&self) -> Result<Settings, ConfigError> {
        let mut builder = merge_policy::builder_with_defaults()?;
        if let Some(path) = &self.file {
            builder = sources::add_file(builder, path);
        }
        builder = sources::add_environment(builder, &self.env_prefix);

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }
}
