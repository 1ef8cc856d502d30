//! Configuration sources: an explicit TOML file and prefixed environment variables.

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::{Environment, File};
use std::path::Path;
use tracing::warn;

/// Add the config file at `path` if it exists; the format follows its extension.
pub fn add_file(builder: ConfigBuilder<DefaultState>, path: &Path) -> ConfigBuilder<DefaultState> {
    if path.exists() {
        builder.add_source(File::from(path).required(false))
    } else {
        warn!(
            config_path = %path.display(),
            "Configuration file not found, using defaults and environment only"
        );
        builder
    }
}

/// Add `{prefix}_SECTION__KEY` environment overrides.
pub fn add_environment(
    builder: ConfigBuilder<DefaultState>,
    prefix: &str,
) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix(prefix)
            .separator("__")
            .try_parsing(true),
    )
}
