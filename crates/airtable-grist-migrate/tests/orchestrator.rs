//! Orchestrator behaviour against in-memory source and target doubles.

mod common;

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

use airtable_grist_migrate::error::{MigrateError, RunPhase};
use airtable_grist_migrate::orchestrator::{Orchestrator, ProgressEvent, SessionState};
use airtable_grist_migrate::source::SourceApi;
use airtable_grist_migrate::MigrationConfig;
use common::*;
use serde_json::json;
use tokio_util::sync::CancellationToken;

fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn three_tables() -> Vec<airtable_grist_migrate::TableDescriptor> {
    vec![
        table("tblA", "Alpha"),
        table("tblB", "Beta"),
        table("tblC", "Gamma"),
    ]
}

/// Drive an orchestrator up to `DestinationTargetSelected`.
async fn ready(
    source: Arc<MockSource>,
    target: Arc<MockTarget>,
    selected: &[&str],
    batch_size: usize,
) -> Orchestrator {
    let config = MigrationConfig {
        batch_size,
        ..MigrationConfig::default()
    };
    let mut orchestrator = Orchestrator::new(source, target, config);
    orchestrator.validate().await.unwrap();
    orchestrator.select_container(BASE_ID).await.unwrap();
    orchestrator.select_tables(&ids(selected)).unwrap();
    orchestrator.select_destination(42, 146993).unwrap();
    orchestrator
}

#[tokio::test]
async fn test_list_all_records_concatenates_pages_in_order() {
    let log = call_log();
    let source = MockSource::new(log.clone(), vec![table("tblA", "Alpha")])
        .with_pages("tblA", pages("A", &[250, 100, 37]));

    let all = source.list_all_records(BASE_ID, "tblA").await.unwrap();

    assert_eq!(all.len(), 387);
    let seqs: Vec<u64> = all.iter().map(|r| r.fields["Seq"].as_u64().unwrap()).collect();
    assert_eq!(seqs, (0..387).collect::<Vec<u64>>());
    // Stops on the first page without a cursor.
    assert_eq!(source.page_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_list_all_records_single_empty_page() {
    let source = MockSource::new(call_log(), vec![table("tblA", "Alpha")]);
    let all = source.list_all_records(BASE_ID, "tblA").await.unwrap();
    assert!(all.is_empty());
    assert_eq!(source.page_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_run_completes_with_mapping_per_selected_table() {
    let log = call_log();
    let source = Arc::new(
        MockSource::new(log.clone(), three_tables())
            .with_pages("tblA", pages("A", &[3]))
            .with_pages("tblB", pages("B", &[2]))
            .with_pages("tblC", pages("C", &[1])),
    );
    let target = Arc::new(MockTarget::new(log.clone()));
    let mut orchestrator = ready(source, target.clone(), &["tblA", "tblB", "tblC"], 100).await;

    let result = orchestrator.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(orchestrator.state(), SessionState::Complete);
    assert_eq!(result.document_id, "docNew");
    assert_eq!(result.tables.len(), 3);
    assert_eq!(result.records_copied, 6);
    assert!(result
        .document_name
        .starts_with("Customer Database (Airtable import "));

    let mapping = orchestrator.migration_target().unwrap();
    assert_eq!(mapping.document_id, "docNew");
    assert_eq!(mapping.tables.len(), 3);
    let sources: Vec<_> = mapping.tables.iter().map(|m| m.source_table_id.as_str()).collect();
    assert_eq!(sources, vec!["tblA", "tblB", "tblC"]);

    // Tables are created in one call with the mapped schema.
    let created = target.created_tables.lock().unwrap().clone();
    assert_eq!(created.len(), 3);
    assert_eq!(created[0].id, "Alpha");
    assert_eq!(created[0].columns[0].id, "fldName");
}

#[tokio::test]
async fn test_schema_fetch_and_copy_follow_selection_order() {
    let log = call_log();
    let source = Arc::new(
        MockSource::new(log.clone(), three_tables())
            .with_pages("tblA", pages("A", &[1]))
            .with_pages("tblB", pages("B", &[1]))
            .with_pages("tblC", pages("C", &[1])),
    );
    let target = Arc::new(MockTarget::new(log.clone()));
    let mut orchestrator = ready(source, target, &["tblC", "tblA", "tblB"], 100).await;
    log.lock().unwrap().clear();

    orchestrator.run(&CancellationToken::new()).await.unwrap();

    let record_fetches: Vec<_> = calls(&log)
        .into_iter()
        .filter(|c| c.starts_with("source.list_records"))
        .collect();
    assert_eq!(
        record_fetches,
        vec![
            "source.list_records tblC",
            "source.list_records tblA",
            "source.list_records tblB"
        ]
    );

    let log = calls(&log);
    let create_pos = log.iter().position(|c| c.starts_with("target.create_tables")).unwrap();
    let schema_fetches = log.iter().filter(|c| c.starts_with("source.list_tables")).count();
    assert_eq!(schema_fetches, 3);
    assert!(log[..create_pos]
        .iter()
        .all(|c| !c.starts_with("source.list_records")));
}

#[tokio::test]
async fn test_records_land_in_positionally_matching_table() {
    let log = call_log();
    let source = Arc::new(
        MockSource::new(log.clone(), three_tables())
            .with_pages("tblA", pages("A", &[2]))
            .with_pages("tblB", pages("B", &[2]))
            .with_pages("tblC", pages("C", &[2])),
    );
    let target = Arc::new(MockTarget::new(log.clone()));
    let mut orchestrator = ready(source, target.clone(), &["tblA", "tblB", "tblC"], 100).await;

    orchestrator.run(&CancellationToken::new()).await.unwrap();

    let inserts = target.inserts();
    assert_eq!(inserts.len(), 3);
    for insert in &inserts {
        let expected_prefix = match insert.table_id.as_str() {
            "Table1_Alpha" => "A-",
            "Table2_Beta" => "B-",
            "Table3_Gamma" => "C-",
            other => panic!("unexpected destination table {}", other),
        };
        for record in &insert.records {
            let name = record["fldName"].as_str().unwrap();
            assert!(
                name.starts_with(expected_prefix),
                "record {} landed in {}",
                name,
                insert.table_id
            );
        }
    }

    // Table C's records never reach table A's destination.
    let table_a = inserts.iter().find(|i| i.table_id == "Table1_Alpha").unwrap();
    assert!(table_a
        .records
        .iter()
        .all(|r| !r["fldName"].as_str().unwrap().starts_with("C-")));
}

#[tokio::test]
async fn test_batches_are_sized_and_sequential() {
    let log = call_log();
    let source = Arc::new(
        MockSource::new(log.clone(), vec![table("tblA", "Alpha")])
            .with_pages("tblA", pages("A", &[100, 100, 50])),
    );
    let target = Arc::new(MockTarget::new(log.clone()));
    let mut orchestrator = ready(source, target.clone(), &["tblA"], 100).await;

    orchestrator.run(&CancellationToken::new()).await.unwrap();

    let sizes: Vec<usize> = target.inserts().iter().map(|i| i.records.len()).collect();
    assert_eq!(sizes, vec![100, 100, 50]);
    assert_eq!(target.max_in_flight.load(Ordering::SeqCst), 1);

    // Batches keep source order.
    let first_of_each: Vec<_> = target
        .inserts()
        .iter()
        .map(|i| i.records[0]["fldSeq"].clone())
        .collect();
    assert_eq!(first_of_each, vec![json!(0), json!(100), json!(200)]);
}

#[tokio::test]
async fn test_validate_with_rejected_source_stays_idle() {
    let log = call_log();
    let mut source = MockSource::new(log.clone(), three_tables());
    source.authorized = false;
    let target = MockTarget::new(log.clone());
    let mut orchestrator =
        Orchestrator::new(Arc::new(source), Arc::new(target), MigrationConfig::default());

    let err = orchestrator.validate().await.unwrap_err();
    assert!(matches!(err, MigrateError::Auth(ref m) if m.contains("Airtable")));
    assert_eq!(orchestrator.state(), SessionState::Idle);

    // Nothing past Idle is reachable.
    assert!(orchestrator.select_container(BASE_ID).await.is_err());
    assert!(orchestrator.select_tables(&ids(&["tblA"])).is_err());
    assert!(orchestrator.select_destination(42, 1).is_err());
    assert!(orchestrator.run(&CancellationToken::new()).await.is_err());
    assert_eq!(orchestrator.state(), SessionState::Idle);
}

#[tokio::test]
async fn test_validate_reports_rejected_destination() {
    let log = call_log();
    let source = MockSource::new(log.clone(), three_tables());
    let mut target = MockTarget::new(log.clone());
    target.authorized = false;
    let mut orchestrator =
        Orchestrator::new(Arc::new(source), Arc::new(target), MigrationConfig::default());

    let err = orchestrator.validate().await.unwrap_err();
    assert!(matches!(err, MigrateError::Auth(ref m) if m.starts_with("Grist")));
    assert_eq!(orchestrator.state(), SessionState::Idle);
}

#[tokio::test]
async fn test_select_container_failure_stays_validated() {
    let log = call_log();
    let source = Arc::new(MockSource::new(log.clone(), three_tables()));
    let target = Arc::new(MockTarget::new(log.clone()));
    let mut orchestrator = Orchestrator::new(source, target, MigrationConfig::default());
    orchestrator.validate().await.unwrap();

    let err = orchestrator.select_container("appMissing").await.unwrap_err();
    assert!(matches!(err, MigrateError::NotFound(_)));
    assert_eq!(orchestrator.state(), SessionState::CredentialsValidated);

    let tables = orchestrator.select_container(BASE_ID).await.unwrap();
    assert_eq!(tables.len(), 3);
    assert_eq!(orchestrator.state(), SessionState::ContainerSelected);
}

#[tokio::test]
async fn test_select_tables_validation() {
    let log = call_log();
    let source = Arc::new(MockSource::new(log.clone(), three_tables()));
    let target = Arc::new(MockTarget::new(log.clone()));
    let mut orchestrator = Orchestrator::new(source, target, MigrationConfig::default());
    orchestrator.validate().await.unwrap();
    orchestrator.select_container(BASE_ID).await.unwrap();

    let err = orchestrator.select_tables(&[]).unwrap_err();
    assert!(matches!(err, MigrateError::Validation(_)));
    assert_eq!(orchestrator.state(), SessionState::ContainerSelected);

    let err = orchestrator.select_tables(&ids(&["tblA", "tblZ"])).unwrap_err();
    assert!(matches!(err, MigrateError::NotFound(_)));

    orchestrator
        .select_tables(&ids(&["tblB", "tblA", "tblB"]))
        .unwrap();
    assert_eq!(orchestrator.selection().table_ids, ids(&["tblB", "tblA"]));
    assert_eq!(orchestrator.state(), SessionState::TablesSelected);
}

#[tokio::test]
async fn test_run_requires_destination_selected() {
    let log = call_log();
    let source = Arc::new(MockSource::new(log.clone(), three_tables()));
    let target = Arc::new(MockTarget::new(log.clone()));
    let mut orchestrator = Orchestrator::new(source, target, MigrationConfig::default());
    orchestrator.validate().await.unwrap();
    orchestrator.select_container(BASE_ID).await.unwrap();
    orchestrator.select_tables(&ids(&["tblA"])).unwrap();

    let err = orchestrator.run(&CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, MigrateError::Validation(_)));
    assert_eq!(orchestrator.state(), SessionState::TablesSelected);
}

#[tokio::test]
async fn test_insert_failure_aborts_without_further_calls() {
    let log = call_log();
    let source = Arc::new(
        MockSource::new(log.clone(), three_tables())
            .with_pages("tblA", pages("A", &[150]))
            .with_pages("tblB", pages("B", &[10]))
            .with_pages("tblC", pages("C", &[10])),
    );
    let mut target = MockTarget::new(log.clone());
    target.fail_insert_at = Some(2);
    let target = Arc::new(target);
    let mut orchestrator = ready(source, target.clone(), &["tblA", "tblB", "tblC"], 100).await;

    let err = orchestrator.run(&CancellationToken::new()).await.unwrap_err();

    assert_eq!(orchestrator.state(), SessionState::Failed);
    match &err {
        MigrateError::Run { phase, table, .. } => {
            assert_eq!(*phase, RunPhase::InsertRecords);
            assert_eq!(table.as_deref(), Some("Alpha"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(matches!(err.root(), MigrateError::Remote { status: 500, .. }));

    // The failing insert is the last remote call made.
    let log = calls(&log);
    assert_eq!(log.last().unwrap(), "target.insert_records Table1_Alpha 50");
    assert!(!log.iter().any(|c| c.contains("tblB") && c.starts_with("source.list_records")));
    assert_eq!(target.inserts().len(), 2);
}

/// Collects formatted log output for assertions.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_failed_run_logs_one_line_summary() {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let log = call_log();
    let source = Arc::new(
        MockSource::new(log.clone(), three_tables()).with_pages("tblA", pages("A", &[150])),
    );
    let mut target = MockTarget::new(log.clone());
    target.fail_insert_at = Some(1);
    let mut orchestrator = ready(source, Arc::new(target), &["tblA"], 100).await;

    orchestrator.run(&CancellationToken::new()).await.unwrap_err();

    let output = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
    let failures: Vec<&str> = output
        .lines()
        .filter(|l| l.contains("Migration failed while inserting records"))
        .collect();
    assert_eq!(failures.len(), 1, "logs: {output}");
    assert!(failures[0].contains("500"));
    assert!(!output.contains("Caused by:"));
}

#[tokio::test]
async fn test_record_fetch_failure_reports_phase_and_table() {
    let log = call_log();
    let mut source = MockSource::new(log.clone(), three_tables())
        .with_pages("tblA", pages("A", &[5]));
    source.fail_records_for = Some("tblB".to_string());
    let target = Arc::new(MockTarget::new(log.clone()));
    let mut orchestrator =
        ready(Arc::new(source), target.clone(), &["tblA", "tblB", "tblC"], 100).await;

    let err = orchestrator.run(&CancellationToken::new()).await.unwrap_err();

    assert_eq!(orchestrator.state(), SessionState::Failed);
    assert!(matches!(
        err,
        MigrateError::Run { phase: RunPhase::FetchRecords, ref table, .. }
            if table.as_deref() == Some("Beta")
    ));
    assert_eq!(calls(&log).last().unwrap(), "source.list_records tblB");
    // Table A's records stay in Grist; no rollback.
    assert_eq!(target.inserts().len(), 1);
}

#[tokio::test]
async fn test_partial_table_creation_fails_run() {
    let log = call_log();
    let source = Arc::new(MockSource::new(log.clone(), three_tables()));
    let mut target = MockTarget::new(log.clone());
    target.drop_one_table_id = true;
    let mut orchestrator = ready(source, Arc::new(target), &["tblA", "tblB"], 100).await;

    let err = orchestrator.run(&CancellationToken::new()).await.unwrap_err();

    assert_eq!(orchestrator.state(), SessionState::Failed);
    assert!(matches!(
        err,
        MigrateError::Run { phase: RunPhase::CreateTables, .. }
    ));
    assert!(matches!(err.root(), MigrateError::Remote { .. }));
    assert!(calls(&log).last().unwrap().starts_with("target.create_tables"));
}

#[tokio::test]
async fn test_cancelled_before_start_makes_no_remote_calls() {
    let log = call_log();
    let source = Arc::new(MockSource::new(log.clone(), three_tables()));
    let target = Arc::new(MockTarget::new(log.clone()));
    let mut orchestrator = ready(source, target, &["tblA"], 100).await;
    log.lock().unwrap().clear();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = orchestrator.run(&cancel).await.unwrap_err();

    assert!(matches!(err.root(), MigrateError::Cancelled));
    assert_eq!(orchestrator.state(), SessionState::Failed);
    assert!(calls(&log).is_empty());
}

#[tokio::test]
async fn test_cancellation_is_honoured_between_steps() {
    let log = call_log();
    let source = Arc::new(
        MockSource::new(log.clone(), three_tables())
            .with_pages("tblA", pages("A", &[10]))
            .with_pages("tblB", pages("B", &[10])),
    );
    let target = Arc::new(MockTarget::new(log.clone()));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();

    let mut orchestrator = ready(source, target.clone(), &["tblA", "tblB"], 100)
        .await
        .with_progress(move |event: &ProgressEvent| {
            if matches!(event, ProgressEvent::TableCopied { position: 1, .. }) {
                trigger.cancel();
            }
        });

    let err = orchestrator.run(&cancel).await.unwrap_err();

    assert!(matches!(
        err,
        MigrateError::Run { phase: RunPhase::FetchRecords, ref table, .. }
            if table.as_deref() == Some("Beta")
    ));
    assert!(matches!(err.root(), MigrateError::Cancelled));
    assert_eq!(target.inserts().len(), 1);
}

#[tokio::test]
async fn test_progress_events_are_ordered() {
    let log = call_log();
    let source = Arc::new(
        MockSource::new(log.clone(), three_tables())
            .with_pages("tblA", pages("A", &[150]))
            .with_pages("tblB", pages("B", &[1])),
    );
    let target = Arc::new(MockTarget::new(log.clone()));
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();

    let mut orchestrator = ready(source, target, &["tblA", "tblB"], 100)
        .await
        .with_progress(move |event: &ProgressEvent| sink.lock().unwrap().push(event.clone()));

    orchestrator.run(&CancellationToken::new()).await.unwrap();

    let kinds: Vec<String> = events
        .lock()
        .unwrap()
        .iter()
        .map(|e| serde_json::to_value(e).unwrap()["event"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        kinds,
        vec![
            "document_created",
            "schemas_fetched",
            "tables_created",
            "batch_inserted",
            "batch_inserted",
            "table_copied",
            "batch_inserted",
            "table_copied",
            "completed"
        ]
    );
}

#[tokio::test]
async fn test_failed_event_emitted_on_error() {
    let log = call_log();
    let mut source = MockSource::new(log.clone(), three_tables());
    source.fail_records_for = Some("tblA".to_string());
    let target = Arc::new(MockTarget::new(log.clone()));
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();

    let mut orchestrator = ready(Arc::new(source), target, &["tblA"], 100)
        .await
        .with_progress(move |event: &ProgressEvent| sink.lock().unwrap().push(event.clone()));

    assert!(orchestrator.run(&CancellationToken::new()).await.is_err());
    let events = events.lock().unwrap();
    assert!(matches!(events.last(), Some(ProgressEvent::Failed { .. })));
}

#[tokio::test]
async fn test_document_name_override_and_reset() {
    let log = call_log();
    let source = Arc::new(MockSource::new(log.clone(), three_tables()));
    let target = Arc::new(MockTarget::new(log.clone()));
    let config = MigrationConfig {
        document_name: Some("Imported CRM".to_string()),
        ..MigrationConfig::default()
    };
    let mut orchestrator = Orchestrator::new(source, target, config);
    orchestrator.validate().await.unwrap();
    orchestrator.select_container(BASE_ID).await.unwrap();
    orchestrator.select_tables(&ids(&["tblA"])).unwrap();
    orchestrator.select_destination(42, 7).unwrap();

    let result = orchestrator.run(&CancellationToken::new()).await.unwrap();
    assert_eq!(result.document_name, "Imported CRM");
    assert!(calls(&log).contains(&"target.create_document 7 Imported CRM".to_string()));

    orchestrator.reset();
    assert_eq!(orchestrator.state(), SessionState::Idle);
    assert!(orchestrator.migration_target().is_none());
    assert!(orchestrator.selection().table_ids.is_empty());
}
