//! Configuration file generation.
//!
//! `jina-mcp init` writes the built-in defaults as a TOML file the user can
//! edit. The format matches what [`super::load_config`] reads:
//!
//! ```toml
//! [api_keys]
//! jina = "jina_..."
//!
//! [server]
//! host = "0.0.0.0"
//! port = 8000
//! log_level = "info"
//! debug = false
//!
//! [upstream]
//! reader_endpoint = "https://r.jina.ai/"
//! search_endpoint = "https://s.jina.ai/"
//! timeout_secs = 60
//!
//! [sse]
//! idle_timeout_secs = 30
//! retry_ms = 30000
//! queue_capacity = 256
//!
//! [logging]
//! format = "text"
//! ```

use std::path::Path;

use super::Config;

/// Configuration file errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("{0} already exists (use --force to overwrite)")]
    Exists(String),
}

/// Write the default configuration to `path`.
///
/// The API key is never written out, even when one is set in the
/// environment.
pub fn write_default_config(path: &Path, force: bool) -> Result<(), ConfigFileError> {
    if path.exists() && !force {
        return Err(ConfigFileError::Exists(path.display().to_string()));
    }

    let mut config = Config::default();
    config.api_keys.jina = None;

    let content = toml::to_string_pretty(&config)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}
