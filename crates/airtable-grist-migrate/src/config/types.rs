//! Configuration type definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Environment variable holding the Airtable personal access token.
pub const AIRTABLE_TOKEN_ENV: &str = "AIRTABLE_API_KEY";
/// Environment variable holding the Grist API key.
pub const GRIST_TOKEN_ENV: &str = "GRIST_API_KEY";
/// Environment variable holding the Grist API url.
pub const GRIST_URL_ENV: &str = "GRIST_API_URL";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Source API configuration (Airtable).
    #[serde(default)]
    pub source: SourceConfig,

    /// Destination API configuration (Grist).
    #[serde(default)]
    pub destination: DestinationConfig,

    /// Migration behavior configuration.
    #[serde(default)]
    pub migration: MigrationConfig,
}

/// Airtable API configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// API base url (default: https://api.airtable.com/v0).
    #[serde(default = "default_airtable_url")]
    pub api_url: String,

    /// Personal access token. Usually supplied through `AIRTABLE_API_KEY`.
    #[serde(default, skip_serializing)]
    pub token: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            api_url: default_airtable_url(),
            token: String::new(),
        }
    }
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("api_url", &self.api_url)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Grist API configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct DestinationConfig {
    /// Grist server url, e.g. https://docs.getgrist.com.
    #[serde(default = "default_grist_url")]
    pub api_url: String,

    /// API key. Usually supplied through `GRIST_API_KEY`.
    #[serde(default, skip_serializing)]
    pub token: String,
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            api_url: default_grist_url(),
            token: String::new(),
        }
    }
}

impl fmt::Debug for DestinationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DestinationConfig")
            .field("api_url", &self.api_url)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Migration behavior configuration.
///
/// The selection fields are only needed by the non-interactive `run`
/// command; the wizard asks for them instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Airtable base id to migrate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_id: Option<String>,

    /// Airtable table ids to migrate, in order.
    #[serde(default)]
    pub tables: Vec<String>,

    /// Grist organization id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<i64>,

    /// Grist workspace id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<i64>,

    /// Name of the created Grist document. Derived from the base name and
    /// today's date when not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_name: Option<String>,

    /// Records per insert call (default: 100).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Records per Airtable page (default: 100, the API maximum).
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            base_id: None,
            tables: Vec::new(),
            org_id: None,
            workspace_id: None,
            document_name: None,
            batch_size: default_batch_size(),
            page_size: default_page_size(),
        }
    }
}

// Default value functions for serde
fn default_airtable_url() -> String {
    "https://api.airtable.com/v0".to_string()
}

pub(crate) fn default_grist_url() -> String {
    "https://docs.getgrist.com".to_string()
}

fn default_batch_size() -> usize {
    100
}

fn default_page_size() -> usize {
    100
}
