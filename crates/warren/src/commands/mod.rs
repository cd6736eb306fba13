//! CLI command handlers.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use warren_config::ClientConfiguration;

pub mod config;
pub mod simulate;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Client configuration file, if one is known.
    pub config_path: Option<PathBuf>,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Load the client configuration, falling back to defaults when the
    /// file does not exist.
    pub fn load_client_configuration(&self) -> Result<ClientConfiguration> {
        let config = ClientConfiguration::load_or_default(self.config_path.as_deref())
            .with_context(|| match &self.config_path {
                Some(path) => format!("loading client configuration from {}", path.display()),
                None => "loading client configuration".to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }
}

/// `<config dir>/warren/warren.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("warren").join("warren.toml"))
}
