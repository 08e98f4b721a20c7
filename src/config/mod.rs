// Configuration management module
// Handles TOML configuration for the embedding backend, chunking policy and crawler

pub mod settings;

use anyhow::{Context, Result};
use std::path::Path;

pub use settings::{
    Config, ConfigError, DATA_DIR_ENV, EmbeddingBackend, EmbeddingConfig, StorageConfig,
};

/// Get the default data directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::default_dir()
}

/// Print the effective configuration for a data directory as TOML
#[inline]
pub fn show_config(data_dir: &Path) -> Result<()> {
    let config = Config::load(data_dir).context("Failed to load configuration")?;
    let rendered =
        toml::to_string_pretty(&config).context("Failed to serialize configuration")?;

    println!("# {}", config.config_file_path().display());
    print!("{}", rendered);
    Ok(())
}
