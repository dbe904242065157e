//! # airtable-grist-migrate
//!
//! Copy Airtable bases into Grist documents.
//!
//! This library provides:
//!
//! - **Source client** for the Airtable REST API (bases, table metadata,
//!   paginated records)
//! - **Destination client** for the Grist REST API (orgs, workspaces,
//!   documents, tables, records)
//! - **Type mapping** from Airtable field types to Grist column types
//! - **Orchestrator** that drives a migration step by step and reports
//!   progress
//!
//! ## Example
//!
//! ```rust,no_run
//! use airtable_grist_migrate::{Config, Orchestrator};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("config.yaml")?.with_env_credentials();
//!     let mut orchestrator = Orchestrator::connect(config.require_credentials()?, &config)?;
//!
//!     orchestrator.validate().await?;
//!     orchestrator.select_container("appkYowYfmnc53Xn2").await?;
//!     orchestrator.select_tables(&["tblCampaigns".to_string()])?;
//!     orchestrator.select_destination(42, 146993)?;
//!
//!     let result = orchestrator.run(&CancellationToken::new()).await?;
//!     println!("Copied {} records into {}", result.records_copied, result.document_id);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod source;
pub mod target;
pub mod typemap;

// Re-exports for convenient access
pub use config::{Config, DestinationConfig, MigrationConfig, SourceConfig};
pub use error::{MigrateError, Result, RunPhase};
pub use orchestrator::{
    Credentials, MigrationResult, MigrationSelection, MigrationTarget, Orchestrator,
    ProgressEvent, ProgressReporter, SessionState, TableMapping, TableResult,
};
pub use source::{AirtableClient, Base, FieldDescriptor, Record, SourceApi, TableDescriptor};
pub use target::{GristClient, Org, TableSchema, TargetApi, Workspace};
pub use typemap::GristType;
