//! Error types for the migration library.

use std::fmt;

use thiserror::Error;

/// Exit code for configuration and precondition errors.
pub const EXIT_CONFIG_ERROR: u8 = 1;
/// Exit code for rejected credentials.
pub const EXIT_AUTH_ERROR: u8 = 2;
/// Exit code for a base or table that does not exist.
pub const EXIT_NOT_FOUND: u8 = 3;
/// Exit code for a non-2xx response from either API.
pub const EXIT_REMOTE_ERROR: u8 = 4;
/// Exit code for transport failures.
pub const EXIT_NETWORK_ERROR: u8 = 5;
/// Exit code when the run was cancelled by a signal.
pub const EXIT_CANCELLED: u8 = 6;
/// Exit code for file system errors.
pub const EXIT_IO_ERROR: u8 = 7;

/// Phase of a migration run, used to tell the user where a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    CreateDocument,
    FetchSchema,
    CreateTables,
    FetchRecords,
    InsertRecords,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::CreateDocument => "creating document",
            RunPhase::FetchSchema => "fetching table schema",
            RunPhase::CreateTables => "creating tables",
            RunPhase::FetchRecords => "fetching records",
            RunPhase::InsertRecords => "inserting records",
        };
        f.write_str(name)
    }
}

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Missing or rejected API token.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Any non-2xx response from a remote API.
    #[error("Remote API error: {status} {status_text}")]
    Remote {
        status: u16,
        status_text: String,
        body: String,
    },

    /// Referenced base or table is absent on the remote.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller violated a precondition (empty selection, wrong state, ...).
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Transport-level failure (DNS, connect, TLS, body decoding).
    #[error("Network error: {0}")]
    Network(String),

    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Migration was cancelled (SIGINT, etc.)
    #[error("Migration cancelled")]
    Cancelled,

    /// A migration run stopped in the given phase.
    #[error("Migration failed while {phase}{}", table_suffix(.table))]
    Run {
        phase: RunPhase,
        table: Option<String>,
        #[source]
        source: Box<MigrateError>,
    },
}

fn table_suffix(table: &Option<String>) -> String {
    match table {
        Some(name) => format!(" (table {})", name),
        None => String::new(),
    }
}

impl From<reqwest::Error> for MigrateError {
    fn from(e: reqwest::Error) -> Self {
        MigrateError::Network(e.to_string())
    }
}

impl MigrateError {
    /// Create a Remote error from a response status.
    pub fn remote(status: reqwest::StatusCode, body: impl Into<String>) -> Self {
        MigrateError::Remote {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("Unknown").to_string(),
            body: body.into(),
        }
    }

    /// Wrap an error with the phase and table it happened in.
    pub fn run(phase: RunPhase, table: Option<&str>, source: MigrateError) -> Self {
        MigrateError::Run {
            phase,
            table: table.map(str::to_string),
            source: Box::new(source),
        }
    }

    /// The innermost error, looking through `Run` wrappers.
    pub fn root(&self) -> &MigrateError {
        match self {
            MigrateError::Run { source, .. } => source.root(),
            other => other,
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self.root() {
            MigrateError::Auth(_) => EXIT_AUTH_ERROR,
            MigrateError::NotFound(_) => EXIT_NOT_FOUND,
            MigrateError::Remote { .. } => EXIT_REMOTE_ERROR,
            MigrateError::Network(_) => EXIT_NETWORK_ERROR,
            MigrateError::Cancelled => EXIT_CANCELLED,
            MigrateError::Io(_) => EXIT_IO_ERROR,
            _ => EXIT_CONFIG_ERROR,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        if let MigrateError::Remote { body, .. } = self.root() {
            if !body.is_empty() {
                output.push_str(&format!("\n\nResponse body:\n  {}", body));
            }
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
