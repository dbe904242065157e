//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::{MigrateError, Result};
use crate::orchestrator::Credentials;
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Fill blank tokens from the environment. `GRIST_API_URL` only replaces
    /// the default Grist url; a url set in the config file wins.
    pub fn with_env_credentials(self) -> Self {
        self.with_credentials_from(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::with_env_credentials`] with an injectable lookup.
    pub fn with_credentials_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.source.token.trim().is_empty() {
            if let Some(token) = lookup(AIRTABLE_TOKEN_ENV) {
                self.source.token = token;
            }
        }
        if self.destination.token.trim().is_empty() {
            if let Some(token) = lookup(GRIST_TOKEN_ENV) {
                self.destination.token = token;
            }
        }
        if self.destination.api_url.trim() == types::default_grist_url() {
            if let Some(url) = lookup(GRIST_URL_ENV) {
                if !url.trim().is_empty() {
                    self.destination.api_url = url;
                }
            }
        }
        self
    }

    /// Build the credential set, failing when either token is missing.
    pub fn require_credentials(&self) -> Result<Credentials> {
        if self.source.token.trim().is_empty() {
            return Err(MigrateError::Config(format!(
                "Airtable token is required (set source.token or {})",
                AIRTABLE_TOKEN_ENV
            )));
        }
        if self.destination.token.trim().is_empty() {
            return Err(MigrateError::Config(format!(
                "Grist API key is required (set destination.token or {})",
                GRIST_TOKEN_ENV
            )));
        }
        Ok(Credentials::new(
            self.source.token.trim(),
            self.destination.token.trim(),
            self.destination.api_url.trim(),
        ))
    }
}
