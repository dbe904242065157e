//! Migration orchestrator - main workflow coordinator.
//!
//! The orchestrator is a state machine driven by explicit calls:
//!
//! ```text
//! Idle -> CredentialsValidated -> ContainerSelected -> TablesSelected
//!      -> DestinationTargetSelected -> Migrating -> Complete | Failed
//! ```
//!
//! Exactly one remote call is outstanding at any time.

mod progress;
mod session;

pub use progress::{ProgressEvent, ProgressReporter};
pub use session::{Credentials, MigrationSelection, MigrationTarget, SessionState, TableMapping};

use crate::config::{Config, MigrationConfig};
use crate::error::{MigrateError, Result, RunPhase};
use crate::source::{AirtableClient, Base, SourceApi, TableDescriptor};
use crate::target::{GristClient, Org, TargetApi, Workspace};
use crate::typemap::{to_record_fields, to_table_schema};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Migration orchestrator.
pub struct Orchestrator {
    config: MigrationConfig,
    source: Arc<dyn SourceApi>,
    target: Arc<dyn TargetApi>,
    state: SessionState,
    selection: MigrationSelection,
    tables: Vec<TableDescriptor>,
    migration_target: Option<MigrationTarget>,
    progress: Option<Box<dyn ProgressReporter>>,
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationResult {
    /// Unique run identifier.
    pub run_id: String,

    /// Id of the created Grist document.
    pub document_id: String,

    /// Name of the created Grist document.
    pub document_name: String,

    /// Per-table outcome, in selection order.
    pub tables: Vec<TableResult>,

    /// Total records copied.
    pub records_copied: usize,

    /// When the migration started.
    pub started_at: DateTime<Utc>,

    /// When the migration completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,
}

/// Outcome for one migrated table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableResult {
    pub source_table_id: String,
    pub source_table_name: String,
    pub destination_table_id: String,
    pub records_copied: usize,
}

/// Name of the document created for a base on the given day.
pub fn document_name(base_name: &str, date: NaiveDate) -> String {
    format!("{} (Airtable import {})", base_name, date.format("%Y-%m-%d"))
}

impl Orchestrator {
    /// Create an orchestrator over already-built clients.
    pub fn new(
        source: Arc<dyn SourceApi>,
        target: Arc<dyn TargetApi>,
        config: MigrationConfig,
    ) -> Self {
        Self {
            config,
            source,
            target,
            state: SessionState::Idle,
            selection: MigrationSelection::default(),
            tables: Vec::new(),
            migration_target: None,
            progress: None,
        }
    }

    /// Build the Airtable and Grist clients from credentials.
    pub fn connect(credentials: Credentials, config: &Config) -> Result<Self> {
        let source = AirtableClient::new(credentials.source_token())?
            .with_base_url(&config.source.api_url)
            .with_page_size(config.migration.page_size);
        let target = GristClient::new(
            credentials.destination_api_url(),
            credentials.destination_token(),
        )?;

        let mut orchestrator = Self::new(
            Arc::new(source),
            Arc::new(target),
            config.migration.clone(),
        );
        orchestrator.selection.credentials = Some(credentials);
        Ok(orchestrator)
    }

    /// Receive progress events during [`Orchestrator::run`].
    pub fn with_progress(mut self, reporter: impl ProgressReporter + 'static) -> Self {
        self.progress = Some(Box::new(reporter));
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn selection(&self) -> &MigrationSelection {
        &self.selection
    }

    /// Tables of the selected base.
    pub fn tables(&self) -> &[TableDescriptor] {
        &self.tables
    }

    /// Destination objects of the last run, once created.
    pub fn migration_target(&self) -> Option<&MigrationTarget> {
        self.migration_target.as_ref()
    }

    /// Check both credential sets. Moves to `CredentialsValidated` only if
    /// both are accepted; otherwise the session stays `Idle`.
    pub async fn validate(&mut self) -> Result<()> {
        self.require_not_migrating("validate credentials")?;

        let source_ok = self.source.validate_credentials().await;
        let target_ok = self.target.validate_credentials().await;

        if source_ok && target_ok {
            info!("Airtable and Grist credentials accepted");
            self.selection.clear_choices();
            self.tables.clear();
            self.migration_target = None;
            self.state = SessionState::CredentialsValidated;
            return Ok(());
        }

        self.state = SessionState::Idle;
        let failed = match (source_ok, target_ok) {
            (false, false) => "Airtable and Grist credentials were rejected",
            (false, true) => "Airtable credentials were rejected",
            _ => "Grist credentials were rejected",
        };
        warn!("{}", failed);
        Err(MigrateError::Auth(failed.to_string()))
    }

    /// List the bases the source token can access.
    pub async fn list_containers(&self) -> Result<Vec<Base>> {
        self.require_connected("list bases")?;
        self.source.list_containers().await
    }

    /// List Grist organizations.
    pub async fn list_organizations(&self) -> Result<Vec<Org>> {
        self.require_connected("list organizations")?;
        self.target.list_organizations().await
    }

    /// List the workspaces of a Grist organization.
    pub async fn list_workspaces(&self, org_id: i64) -> Result<Vec<Workspace>> {
        self.require_connected("list workspaces")?;
        self.target.list_workspaces(org_id).await
    }

    /// Choose the base to migrate from and load its tables.
    pub async fn select_container(&mut self, base_id: &str) -> Result<&[TableDescriptor]> {
        self.require_connected("select a base")?;

        let loaded = self.load_container(base_id).await;
        match loaded {
            Ok((base, tables)) => {
                info!("Selected base {} ({} tables)", base.name, tables.len());
                self.selection.clear_choices();
                self.selection.base = Some(base);
                self.tables = tables;
                self.state = SessionState::ContainerSelected;
                Ok(&self.tables)
            }
            Err(e) => {
                warn!("Failed to load base {}: {}", base_id, e);
                self.selection.clear_choices();
                self.tables.clear();
                self.state = SessionState::CredentialsValidated;
                Err(e)
            }
        }
    }

    async fn load_container(&self, base_id: &str) -> Result<(Base, Vec<TableDescriptor>)> {
        let base = self
            .source
            .list_containers()
            .await?
            .into_iter()
            .find(|b| b.id == base_id)
            .ok_or_else(|| MigrateError::NotFound(format!("base {}", base_id)))?;
        let tables = self.source.list_tables(base_id).await?;
        Ok((base, tables))
    }

    /// Choose the tables to migrate. Order is kept; duplicates are dropped.
    pub fn select_tables(&mut self, table_ids: &[String]) -> Result<()> {
        if !matches!(
            self.state,
            SessionState::ContainerSelected
                | SessionState::TablesSelected
                | SessionState::DestinationTargetSelected
        ) {
            return Err(self.wrong_state("select tables"));
        }
        if table_ids.is_empty() {
            return Err(MigrateError::Validation(
                "select at least one table to migrate".into(),
            ));
        }

        let ids = session::dedup_preserving_order(table_ids);
        if let Some(missing) = ids.iter().find(|id| !self.tables.iter().any(|t| &t.id == *id)) {
            return Err(MigrateError::NotFound(format!(
                "table {} in the selected base",
                missing
            )));
        }

        debug!("Selected tables: {:?}", ids);
        self.selection.table_ids = ids;
        self.state = SessionState::TablesSelected;
        Ok(())
    }

    /// Choose the Grist organization and workspace to create the document in.
    pub fn select_destination(&mut self, org_id: i64, workspace_id: i64) -> Result<()> {
        if !matches!(
            self.state,
            SessionState::TablesSelected | SessionState::DestinationTargetSelected
        ) {
            return Err(self.wrong_state("select a destination"));
        }
        self.selection.org_id = Some(org_id);
        self.selection.workspace_id = Some(workspace_id);
        self.state = SessionState::DestinationTargetSelected;
        Ok(())
    }

    /// Go back to `Idle`, dropping every choice and the last run's target.
    pub fn reset(&mut self) {
        self.selection = MigrationSelection {
            credentials: self.selection.credentials.take(),
            ..MigrationSelection::default()
        };
        self.tables.clear();
        self.migration_target = None;
        self.state = SessionState::Idle;
    }

    /// Run the migration.
    ///
    /// Any error aborts the run immediately; nothing written to Grist so far
    /// is rolled back. Cancellation is honoured between remote calls.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<MigrationResult> {
        if self.state != SessionState::DestinationTargetSelected {
            return Err(self.wrong_state("run the migration"));
        }

        let run_id = uuid::Uuid::new_v4().to_string();
        info!("Starting migration run: {}", run_id);
        self.state = SessionState::Migrating;
        self.migration_target = None;

        match self.execute(run_id, cancel).await {
            Ok(result) => {
                self.state = SessionState::Complete;
                info!(
                    "Migration completed: {} tables, {} records in {:.1}s (document {})",
                    result.tables.len(),
                    result.records_copied,
                    result.duration_seconds,
                    result.document_id
                );
                self.emit(ProgressEvent::Completed {
                    document_id: result.document_id.clone(),
                    records: result.records_copied,
                });
                Ok(result)
            }
            Err(e) => {
                self.state = SessionState::Failed;
                error!(cause = %e.root(), "{}", e);
                self.emit(ProgressEvent::Failed {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn execute(&mut self, run_id: String, cancel: &CancellationToken) -> Result<MigrationResult> {
        let started_at = Utc::now();
        let base = self
            .selection
            .base
            .clone()
            .ok_or_else(|| MigrateError::Validation("no base selected".into()))?;
        let workspace_id = self
            .selection
            .workspace_id
            .ok_or_else(|| MigrateError::Validation("no workspace selected".into()))?;
        let table_ids = self.selection.table_ids.clone();

        // Phase 1: Create document
        check_cancelled(cancel, RunPhase::CreateDocument, None)?;
        let name = self
            .config
            .document_name
            .clone()
            .unwrap_or_else(|| document_name(&base.name, started_at.date_naive()));
        info!("Phase 1: Creating document '{}' in workspace {}", name, workspace_id);
        let document_id = self
            .target
            .create_document(workspace_id, &name)
            .await
            .map_err(|e| MigrateError::run(RunPhase::CreateDocument, None, e))?;
        self.emit(ProgressEvent::DocumentCreated {
            document_id: document_id.clone(),
            document_name: name.clone(),
        });

        // Phase 2: Fetch schemas, strictly in selection order
        info!("Phase 2: Fetching {} table schemas", table_ids.len());
        let mut schemas = Vec::with_capacity(table_ids.len());
        for table_id in &table_ids {
            let label = self.table_label(table_id);
            check_cancelled(cancel, RunPhase::FetchSchema, Some(label))?;
            let schema = self
                .source
                .get_table_schema(&base.id, table_id)
                .await
                .map_err(|e| MigrateError::run(RunPhase::FetchSchema, Some(label), e))?;
            debug!("{}: {} fields", schema.name, schema.fields.len());
            schemas.push(schema);
        }
        self.emit(ProgressEvent::SchemasFetched {
            tables: schemas.len(),
        });

        // Phase 3: Create all tables in one call
        check_cancelled(cancel, RunPhase::CreateTables, None)?;
        info!("Phase 3: Creating {} tables", schemas.len());
        let grist_tables: Vec<_> = schemas.iter().map(to_table_schema).collect();
        let created_ids = self
            .target
            .create_tables(&document_id, &grist_tables)
            .await
            .map_err(|e| MigrateError::run(RunPhase::CreateTables, None, e))?;
        if created_ids.len() != schemas.len() {
            return Err(MigrateError::run(
                RunPhase::CreateTables,
                None,
                MigrateError::Remote {
                    status: 200,
                    status_text: "Partial table creation".into(),
                    body: format!(
                        "requested {} tables, received {} ids",
                        schemas.len(),
                        created_ids.len()
                    ),
                },
            ));
        }

        let target = MigrationTarget {
            document_id: document_id.clone(),
            tables: table_ids
                .iter()
                .zip(&created_ids)
                .map(|(source, destination)| TableMapping {
                    source_table_id: source.clone(),
                    destination_table_id: destination.clone(),
                })
                .collect(),
        };
        self.migration_target = Some(target.clone());
        self.emit(ProgressEvent::TablesCreated {
            table_ids: created_ids,
        });

        // Phase 4: Copy records table by table
        info!("Phase 4: Copying records");
        let total_tables = schemas.len();
        let mut results = Vec::with_capacity(total_tables);
        for (position, (schema, mapping)) in schemas.iter().zip(&target.tables).enumerate() {
            let copied = self
                .copy_table(&base.id, &document_id, schema, mapping, cancel)
                .await?;
            info!(
                "{}: copied {} records ({}/{})",
                schema.name,
                copied,
                position + 1,
                total_tables
            );
            self.emit(ProgressEvent::TableCopied {
                table: schema.name.clone(),
                destination_table_id: mapping.destination_table_id.clone(),
                records: copied,
                position: position + 1,
                of: total_tables,
            });
            results.push(TableResult {
                source_table_id: schema.id.clone(),
                source_table_name: schema.name.clone(),
                destination_table_id: mapping.destination_table_id.clone(),
                records_copied: copied,
            });
        }

        let completed_at = Utc::now();
        let duration = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;
        Ok(MigrationResult {
            run_id,
            document_id,
            document_name: name,
            records_copied: results.iter().map(|t| t.records_copied).sum(),
            tables: results,
            started_at,
            completed_at,
            duration_seconds: duration,
        })
    }

    /// Fetch every record of one table and insert it in sequential batches.
    async fn copy_table(
        &self,
        base_id: &str,
        document_id: &str,
        schema: &TableDescriptor,
        mapping: &TableMapping,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        check_cancelled(cancel, RunPhase::FetchRecords, Some(schema.name.as_str()))?;
        let records = self
            .source
            .list_all_records(base_id, &mapping.source_table_id)
            .await
            .map_err(|e| MigrateError::run(RunPhase::FetchRecords, Some(schema.name.as_str()), e))?;

        let rows: Vec<_> = records.iter().map(|r| to_record_fields(schema, r)).collect();
        let batch_size = self.config.batch_size.max(1);
        let mut inserted = 0;

        for batch in rows.chunks(batch_size) {
            check_cancelled(cancel, RunPhase::InsertRecords, Some(schema.name.as_str()))?;
            self.target
                .insert_records(document_id, &mapping.destination_table_id, batch)
                .await
                .map_err(|e| MigrateError::run(RunPhase::InsertRecords, Some(schema.name.as_str()), e))?;
            inserted += batch.len();
            debug!("{}: inserted {}/{}", schema.name, inserted, rows.len());
            self.emit(ProgressEvent::BatchInserted {
                table: schema.name.clone(),
                inserted,
                total: rows.len(),
            });
        }

        Ok(inserted)
    }

    /// Table name for log and error context, falling back to the id.
    fn table_label<'a>(&'a self, table_id: &'a str) -> &'a str {
        self.tables
            .iter()
            .find(|t| t.id == table_id)
            .map(|t| t.name.as_str())
            .unwrap_or(table_id)
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(ref reporter) = self.progress {
            reporter.report(&event);
        }
    }

    fn require_connected(&self, action: &str) -> Result<()> {
        if self.state.is_connected() {
            Ok(())
        } else {
            Err(self.wrong_state(action))
        }
    }

    fn require_not_migrating(&self, action: &str) -> Result<()> {
        if self.state == SessionState::Migrating {
            Err(self.wrong_state(action))
        } else {
            Ok(())
        }
    }

    fn wrong_state(&self, action: &str) -> MigrateError {
        MigrateError::Validation(format!("cannot {} in state {}", action, self.state))
    }
}

fn check_cancelled(cancel: &CancellationToken, phase: RunPhase, table: Option<&str>) -> Result<()> {
    if cancel.is_cancelled() {
        info!("Cancellation requested, stopping before {}", phase);
        return Err(MigrateError::run(phase, table, MigrateError::Cancelled));
    }
    Ok(())
}

impl MigrationResult {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
