//! Configuration validation.

use super::Config;
use crate::error::{MigrateError, Result};
use crate::source::MAX_PAGE_SIZE;

/// Validate the configuration.
///
/// Tokens are checked separately by [`Config::require_credentials`] since a
/// config file is allowed to leave them to the environment or the wizard.
pub fn validate(config: &Config) -> Result<()> {
    if config.source.api_url.trim().is_empty() {
        return Err(MigrateError::Config("source.api_url is required".into()));
    }
    if !is_http_url(&config.source.api_url) {
        return Err(MigrateError::Config(format!(
            "source.api_url must start with http:// or https://, got '{}'",
            config.source.api_url
        )));
    }

    if config.destination.api_url.trim().is_empty() {
        return Err(MigrateError::Config(
            "destination.api_url is required".into(),
        ));
    }
    if !is_http_url(&config.destination.api_url) {
        return Err(MigrateError::Config(format!(
            "destination.api_url must start with http:// or https://, got '{}'",
            config.destination.api_url
        )));
    }

    if config.migration.batch_size == 0 {
        return Err(MigrateError::Config(
            "migration.batch_size must be at least 1".into(),
        ));
    }
    if config.migration.page_size == 0 || config.migration.page_size > MAX_PAGE_SIZE {
        return Err(MigrateError::Config(format!(
            "migration.page_size must be between 1 and {}",
            MAX_PAGE_SIZE
        )));
    }
    if let Some(name) = &config.migration.document_name {
        if name.trim().is_empty() {
            return Err(MigrateError::Config(
                "migration.document_name must not be blank".into(),
            ));
        }
    }

    Ok(())
}

fn is_http_url(url: &str) -> bool {
    let url = url.trim();
    url.starts_with("http://") || url.starts_with("https://")
}
