//! Session state carried between orchestrator transitions.

use std::fmt;

use crate::source::Base;

/// Where the session is in the migration flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    CredentialsValidated,
    ContainerSelected,
    TablesSelected,
    DestinationTargetSelected,
    Migrating,
    Complete,
    Failed,
}

impl SessionState {
    /// Whether credentials have been validated and no run is in flight.
    pub fn is_connected(&self) -> bool {
        !matches!(self, SessionState::Idle | SessionState::Migrating)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// API tokens for both sides. Held in memory only, never serialized.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    source_token: String,
    destination_token: String,
    destination_api_url: String,
}

impl Credentials {
    pub fn new(
        source_token: impl Into<String>,
        destination_token: impl Into<String>,
        destination_api_url: impl Into<String>,
    ) -> Self {
        Self {
            source_token: source_token.into(),
            destination_token: destination_token.into(),
            destination_api_url: destination_api_url.into(),
        }
    }

    pub fn source_token(&self) -> &str {
        &self.source_token
    }

    pub fn destination_token(&self) -> &str {
        &self.destination_token
    }

    pub fn destination_api_url(&self) -> &str {
        &self.destination_api_url
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("source_token", &"[REDACTED]")
            .field("destination_token", &"[REDACTED]")
            .field("destination_api_url", &self.destination_api_url)
            .finish()
    }
}

/// Choices made so far in the session.
#[derive(Debug, Clone, Default)]
pub struct MigrationSelection {
    /// Credentials the clients were built from, when known.
    pub credentials: Option<Credentials>,

    /// Chosen Airtable base.
    pub base: Option<Base>,

    /// Chosen table ids, in the order they will be migrated.
    pub table_ids: Vec<String>,

    /// Chosen Grist organization.
    pub org_id: Option<i64>,

    /// Chosen Grist workspace.
    pub workspace_id: Option<i64>,
}

impl MigrationSelection {
    /// Forget everything chosen after the credentials.
    pub(crate) fn clear_choices(&mut self) {
        self.base = None;
        self.table_ids.clear();
        self.org_id = None;
        self.workspace_id = None;
    }
}

/// Pairing of a source table with the table created for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMapping {
    pub source_table_id: String,
    pub destination_table_id: String,
}

/// Destination objects created by a run. Entry `i` of `tables` belongs to
/// entry `i` of the selection's `table_ids`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationTarget {
    pub document_id: String,
    pub tables: Vec<TableMapping>,
}

/// Order-preserving de-duplication of selected table ids.
pub(crate) fn dedup_preserving_order(ids: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_debug_redacts_tokens() {
        let creds = Credentials::new("patSECRET", "gristSECRET", "https://docs.getgrist.com");
        let debug_output = format!("{:?}", creds);
        assert!(!debug_output.contains("patSECRET"));
        assert!(!debug_output.contains("gristSECRET"));
        assert!(debug_output.contains("docs.getgrist.com"));
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let ids: Vec<String> = ["tblC", "tblA", "tblC", "tblB", "tblA"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(dedup_preserving_order(&ids), vec!["tblC", "tblA", "tblB"]);
    }

    #[test]
    fn test_connected_states() {
        assert!(!SessionState::Idle.is_connected());
        assert!(!SessionState::Migrating.is_connected());
        assert!(SessionState::CredentialsValidated.is_connected());
        assert!(SessionState::Failed.is_connected());
    }
}
