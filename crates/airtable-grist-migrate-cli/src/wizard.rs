//! Interactive migration wizard.
//!
//! Walks bases, tables, organization and workspace, then runs the
//! migration. Tokens typed at the prompts are kept in memory only.

use airtable_grist_migrate::{
    Base, Config, MigrateError, MigrationResult, Orchestrator, Org, ProgressEvent,
    TableDescriptor, Workspace,
};
use dialoguer::{Confirm, MultiSelect, Password, Select};

use crate::shutdown::Shutdown;

/// Result type for wizard operations.
pub type WizardResult<T> = Result<T, WizardError>;

/// Errors that can occur during wizard execution.
#[derive(Debug)]
pub enum WizardError {
    /// User cancelled the wizard.
    Cancelled,
    /// Terminal IO error.
    Io(std::io::Error),
    /// Nothing to choose from, or an invalid choice.
    Validation(String),
    /// Error from the migration library.
    Migrate(MigrateError),
}

impl std::fmt::Display for WizardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cancelled => write!(f, "Migration cancelled"),
            Self::Io(e) => write!(f, "IO error: {}", e),
            Self::Validation(msg) => write!(f, "Validation error: {}", msg),
            Self::Migrate(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for WizardError {}

impl From<std::io::Error> for WizardError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<dialoguer::Error> for WizardError {
    fn from(e: dialoguer::Error) -> Self {
        Self::Io(std::io::Error::other(e.to_string()))
    }
}

impl From<MigrateError> for WizardError {
    fn from(e: MigrateError) -> Self {
        Self::Migrate(e)
    }
}

impl From<WizardError> for MigrateError {
    fn from(e: WizardError) -> Self {
        match e {
            WizardError::Cancelled => MigrateError::Cancelled,
            WizardError::Io(e) => MigrateError::Io(e),
            WizardError::Validation(msg) => MigrateError::Validation(msg),
            WizardError::Migrate(e) => e,
        }
    }
}

/// Run the migration wizard.
pub async fn run_wizard(mut config: Config, shutdown: Shutdown) -> WizardResult<()> {
    println!();
    println!("Airtable to Grist Migration");
    println!("===========================");
    println!();

    prompt_credentials(&mut config)?;
    shutdown.listen()?;

    let credentials = config.require_credentials()?;
    let grist_url = credentials.destination_api_url().trim_end_matches('/').to_string();
    let mut orchestrator = Orchestrator::connect(credentials, &config)?.with_progress(print_progress);

    loop {
        println!("Validating credentials...");
        orchestrator.validate().await?;
        println!("  Airtable and Grist credentials accepted.\n");

        let bases = orchestrator.list_containers().await?;
        let base = prompt_base(&bases, config.migration.base_id.as_deref())?;

        let tables = orchestrator.select_container(&base.id).await?.to_vec();
        let table_ids = prompt_tables(&tables, &config.migration.tables)?;
        orchestrator.select_tables(&table_ids)?;

        let orgs = orchestrator.list_organizations().await?;
        let org = prompt_org(&orgs, config.migration.org_id)?;
        let workspaces = orchestrator.list_workspaces(org.id).await?;
        let workspace = prompt_workspace(&workspaces, config.migration.workspace_id)?;
        orchestrator.select_destination(org.id, workspace.id)?;

        print_summary(base, &tables, &table_ids, org, workspace);

        if !prompt_start_confirm()? {
            return Err(WizardError::Cancelled);
        }

        println!();
        let cancel = shutdown.begin_run();
        let result = orchestrator.run(&cancel).await;
        shutdown.end_run();
        let result = result?;
        print_result(&result, &grist_url);

        if !prompt_another()? {
            return Ok(());
        }
        orchestrator.reset();
        println!();
    }
}

/// Ask for any token that neither the config file nor the environment set.
fn prompt_credentials(config: &mut Config) -> WizardResult<()> {
    if config.source.token.trim().is_empty() {
        println!("Airtable");
        println!("--------");
        config.source.token = prompt_token("  Personal access token")?;
        println!();
    }

    if config.destination.token.trim().is_empty() {
        println!("Grist ({})", config.destination.api_url);
        println!("-----");
        config.destination.token = prompt_token("  API key")?;
        println!();
    }

    Ok(())
}

fn prompt_token(prompt: &str) -> WizardResult<String> {
    Ok(Password::new()
        .with_prompt(prompt)
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("a token is required")
            } else {
                Ok(())
            }
        })
        .interact()?)
}

fn prompt_base<'a>(bases: &'a [Base], preferred: Option<&str>) -> WizardResult<&'a Base> {
    if bases.is_empty() {
        return Err(WizardError::Validation(
            "no Airtable bases are accessible with this token".to_string(),
        ));
    }

    let items: Vec<String> = bases
        .iter()
        .map(|b| format!("{} ({})", b.name, b.id))
        .collect();
    let default = preferred
        .and_then(|id| bases.iter().position(|b| b.id == id))
        .unwrap_or(0);

    let selection = Select::new()
        .with_prompt("Airtable base")
        .items(&items)
        .default(default)
        .interact()?;
    Ok(&bases[selection])
}

/// Multi-select tables; the returned ids follow the base's table order.
fn prompt_tables(tables: &[TableDescriptor], preferred: &[String]) -> WizardResult<Vec<String>> {
    if tables.is_empty() {
        return Err(WizardError::Validation(
            "the selected base has no tables".to_string(),
        ));
    }

    let items: Vec<String> = tables
        .iter()
        .map(|t| format!("{} ({} fields)", t.name, t.fields.len()))
        .collect();
    let defaults: Vec<bool> = tables
        .iter()
        .map(|t| preferred.is_empty() || preferred.contains(&t.id))
        .collect();

    loop {
        let chosen = MultiSelect::new()
            .with_prompt("Tables to migrate (space to toggle, enter to confirm)")
            .items(&items)
            .defaults(&defaults)
            .interact()?;

        if chosen.is_empty() {
            println!("  Select at least one table.");
            continue;
        }
        return Ok(chosen.into_iter().map(|i| tables[i].id.clone()).collect());
    }
}

fn prompt_org(orgs: &[Org], preferred: Option<i64>) -> WizardResult<&Org> {
    match orgs {
        [] => Err(WizardError::Validation(
            "no Grist organizations are accessible with this API key".to_string(),
        )),
        [only] => {
            println!("Grist organization: {}", only.name);
            Ok(only)
        }
        _ => {
            let items: Vec<String> = orgs
                .iter()
                .map(|o| match o.domain {
                    Some(ref domain) => format!("{} ({})", o.name, domain),
                    None => o.name.clone(),
                })
                .collect();
            let default = preferred
                .and_then(|id| orgs.iter().position(|o| o.id == id))
                .unwrap_or(0);
            let selection = Select::new()
                .with_prompt("Grist organization")
                .items(&items)
                .default(default)
                .interact()?;
            Ok(&orgs[selection])
        }
    }
}

fn prompt_workspace(workspaces: &[Workspace], preferred: Option<i64>) -> WizardResult<&Workspace> {
    match workspaces {
        [] => Err(WizardError::Validation(
            "the selected organization has no workspaces".to_string(),
        )),
        [only] => {
            println!("Grist workspace: {}", only.name);
            Ok(only)
        }
        _ => {
            let items: Vec<&str> = workspaces.iter().map(|w| w.name.as_str()).collect();
            let default = preferred
                .and_then(|id| workspaces.iter().position(|w| w.id == id))
                .unwrap_or(0);
            let selection = Select::new()
                .with_prompt("Grist workspace")
                .items(&items)
                .default(default)
                .interact()?;
            Ok(&workspaces[selection])
        }
    }
}

fn print_summary(
    base: &Base,
    tables: &[TableDescriptor],
    table_ids: &[String],
    org: &Org,
    workspace: &Workspace,
) {
    println!();
    println!("Migration Summary");
    println!("-----------------");
    println!("  Source: {} ({})", base.name, base.id);
    for id in table_ids {
        if let Some(table) = tables.iter().find(|t| &t.id == id) {
            println!("    - {} ({} fields)", table.name, table.fields.len());
        }
    }
    println!("  Destination: {} / {}", org.name, workspace.name);
    println!("  A new Grist document will be created.");
    println!();
}

fn prompt_start_confirm() -> WizardResult<bool> {
    Ok(Confirm::new()
        .with_prompt("Start migration?")
        .default(true)
        .interact()?)
}

fn prompt_another() -> WizardResult<bool> {
    Ok(Confirm::new()
        .with_prompt("Migrate another base?")
        .default(false)
        .interact()?)
}

fn print_progress(event: &ProgressEvent) {
    match event {
        ProgressEvent::DocumentCreated { document_name, .. } => {
            println!("Created document '{}'", document_name);
        }
        ProgressEvent::SchemasFetched { tables } => {
            println!("Fetched {} table schemas", tables);
        }
        ProgressEvent::TablesCreated { table_ids } => {
            println!("Created tables: {}", table_ids.join(", "));
        }
        ProgressEvent::BatchInserted {
            table,
            inserted,
            total,
        } => {
            println!("  {}: {}/{} records", table, inserted, total);
        }
        ProgressEvent::TableCopied {
            table,
            records,
            position,
            of,
            ..
        } => {
            println!("[{}/{}] {}: {} records copied", position, of, table, records);
        }
        // Reported by the caller.
        ProgressEvent::Completed { .. } | ProgressEvent::Failed { .. } => {}
    }
}

fn print_result(result: &MigrationResult, grist_url: &str) {
    println!("\nMigration completed!");
    println!("  Document: {}", result.document_name);
    println!("  Open: {}/doc/{}", grist_url, result.document_id);
    println!("  Tables: {}", result.tables.len());
    println!("  Records: {}", result.records_copied);
    println!("  Duration: {:.2}s", result.duration_seconds);
    println!();
}
