//! airtable-grist-migrate CLI - Copy Airtable bases into Grist documents.

mod shutdown;
mod wizard;

use airtable_grist_migrate::source::SourceApi;
use airtable_grist_migrate::{
    target, AirtableClient, Config, MigrateError, Orchestrator, ProgressEvent,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use shutdown::Shutdown;
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser)]
#[command(name = "airtable-grist-migrate")]
#[command(about = "Migrate Airtable bases into Grist documents")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    /// Print progress updates as JSON lines to stderr
    #[arg(long)]
    progress: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a migration using the configuration file
    Run {
        /// Airtable base id to migrate
        #[arg(long)]
        base: Option<String>,

        /// Airtable table id to migrate (repeatable, order is kept)
        #[arg(long = "table")]
        tables: Vec<String>,

        /// Grist organization id
        #[arg(long)]
        org: Option<i64>,

        /// Grist workspace id
        #[arg(long)]
        workspace: Option<i64>,

        /// Records per insert request
        #[arg(long)]
        batch_size: Option<usize>,

        /// Name of the Grist document to create
        #[arg(long)]
        document_name: Option<String>,
    },

    /// Choose base, tables and destination interactively, then migrate
    Wizard,

    /// Validate Airtable and Grist credentials
    HealthCheck,

    /// List the Airtable bases the token can access
    ListBases,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    // Handle wizard separately (config file is optional)
    if let Commands::Wizard = cli.command {
        // No logging setup for wizard - keeps terminal clean for interactive prompts
        let config = if cli.config.exists() {
            Config::load(&cli.config)?
        } else {
            Config::default()
        };
        return wizard::run_wizard(config.with_env_credentials(), Shutdown::new())
            .await
            .map_err(MigrateError::from);
    }

    setup_logging(&cli.verbosity, &cli.log_format)
        .map_err(|e| MigrateError::Config(e.to_string()))?;

    let mut config = Config::load(&cli.config)?.with_env_credentials();
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Wizard => unreachable!(), // Handled above
        Commands::Run {
            base,
            tables,
            org,
            workspace,
            batch_size,
            document_name,
        } => {
            // Apply overrides
            if let Some(base) = base {
                config.migration.base_id = Some(base);
            }
            if !tables.is_empty() {
                config.migration.tables = tables;
            }
            if let Some(org) = org {
                config.migration.org_id = Some(org);
            }
            if let Some(workspace) = workspace {
                config.migration.workspace_id = Some(workspace);
            }
            if let Some(size) = batch_size {
                config.migration.batch_size = size;
            }
            if let Some(name) = document_name {
                config.migration.document_name = Some(name);
            }
            config.validate()?;

            let base_id = required(config.migration.base_id.clone(), "base_id (--base)")?;
            let org_id = required(config.migration.org_id, "org_id (--org)")?;
            let workspace_id =
                required(config.migration.workspace_id, "workspace_id (--workspace)")?;
            if config.migration.tables.is_empty() {
                return Err(MigrateError::Config(
                    "migration.tables is required (--table)".to_string(),
                ));
            }

            let shutdown = Shutdown::new();
            shutdown.listen()?;
            let mut orchestrator = Orchestrator::connect(config.require_credentials()?, &config)?;

            // Enable progress reporting if requested
            if cli.progress {
                orchestrator = orchestrator.with_progress(print_progress_json);
            }

            orchestrator.validate().await?;
            orchestrator.select_container(&base_id).await?;
            orchestrator.select_tables(&config.migration.tables)?;
            orchestrator.select_destination(org_id, workspace_id)?;

            let cancel_token = shutdown.begin_run();
            let result = orchestrator.run(&cancel_token).await;
            shutdown.end_run();
            let result = result?;

            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                println!("\nMigration completed!");
                println!("  Run ID: {}", result.run_id);
                println!(
                    "  Document: {} ({})",
                    result.document_name, result.document_id
                );
                println!("  Duration: {:.2}s", result.duration_seconds);
                println!("  Tables: {}", result.tables.len());
                for table in &result.tables {
                    println!(
                        "    {} -> {}: {} records",
                        table.source_table_name,
                        table.destination_table_id,
                        table.records_copied
                    );
                }
                println!("  Records: {}", result.records_copied);
            }
        }

        Commands::HealthCheck => {
            let credentials = config.require_credentials()?;

            let started = Instant::now();
            let source_ok = AirtableClient::new(credentials.source_token())?
                .with_base_url(&config.source.api_url)
                .validate_credentials()
                .await;
            let source_latency_ms = started.elapsed().as_millis() as u64;

            let started = Instant::now();
            let target_ok = target::validate_credentials(
                credentials.destination_api_url(),
                credentials.destination_token(),
            )
            .await;
            let target_latency_ms = started.elapsed().as_millis() as u64;

            let healthy = source_ok && target_ok;

            if cli.output_json {
                let report = serde_json::json!({
                    "source_connected": source_ok,
                    "source_latency_ms": source_latency_ms,
                    "target_connected": target_ok,
                    "target_latency_ms": target_latency_ms,
                    "healthy": healthy,
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Source (Airtable): {} ({}ms)",
                    if source_ok { "OK" } else { "FAILED" },
                    source_latency_ms
                );
                println!(
                    "  Destination (Grist {}): {} ({}ms)",
                    credentials.destination_api_url(),
                    if target_ok { "OK" } else { "FAILED" },
                    target_latency_ms
                );
                println!(
                    "\n  Overall: {}",
                    if healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if !healthy {
                return Err(MigrateError::Auth("Health check failed".to_string()));
            }
        }

        Commands::ListBases => {
            let client = AirtableClient::new(&config.source.token)?
                .with_base_url(&config.source.api_url);
            let bases = client.list_containers().await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&bases)?);
            } else if bases.is_empty() {
                println!("No bases are accessible with this token.");
            } else {
                for base in &bases {
                    println!("{}  {} ({})", base.id, base.name, base.permission_level);
                }
            }
        }
    }

    Ok(())
}

fn required<T>(value: Option<T>, name: &str) -> Result<T, MigrateError> {
    value.ok_or_else(|| MigrateError::Config(format!("migration.{} is required", name)))
}

fn print_progress_json(event: &ProgressEvent) {
    if let Ok(line) = serde_json::to_string(event) {
        eprintln!("{}", line);
    }
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    Ok(())
}
