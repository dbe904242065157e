//! In-memory source and target doubles that record every call.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use airtable_grist_migrate::error::{MigrateError, Result};
use airtable_grist_migrate::source::{
    Base, FieldDescriptor, ListRecordsOptions, Record, RecordPage, SourceApi, TableDescriptor,
};
use airtable_grist_migrate::target::{Org, TableSchema, TargetApi, Workspace};
use async_trait::async_trait;
use serde_json::{json, Map, Value};

pub const BASE_ID: &str = "appBase";
pub const BASE_NAME: &str = "Customer Database";

/// Shared, ordered log of remote calls across both doubles.
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn calls(log: &CallLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

pub fn table(id: &str, name: &str) -> TableDescriptor {
    TableDescriptor {
        id: id.to_string(),
        name: name.to_string(),
        description: None,
        primary_field_id: "fldName".to_string(),
        fields: vec![
            FieldDescriptor {
                id: "fldName".to_string(),
                name: "Name".to_string(),
                type_tag: "singleLineText".to_string(),
                description: None,
                options: None,
            },
            FieldDescriptor {
                id: "fldSeq".to_string(),
                name: "Seq".to_string(),
                type_tag: "number".to_string(),
                description: None,
                options: None,
            },
        ],
        views: Vec::new(),
    }
}

/// `count` records whose Name is `{prefix}-{n}`.
pub fn records(prefix: &str, start: usize, count: usize) -> Vec<Record> {
    (start..start + count)
        .map(|n| Record {
            id: format!("rec{}{}", prefix, n),
            created_time: None,
            fields: json!({"Name": format!("{}-{}", prefix, n), "Seq": n})
                .as_object()
                .unwrap()
                .clone(),
        })
        .collect()
}

/// Split records into pages of the given sizes.
pub fn pages(prefix: &str, sizes: &[usize]) -> Vec<Vec<Record>> {
    let mut start = 0;
    sizes
        .iter()
        .map(|size| {
            let page = records(prefix, start, *size);
            start += size;
            page
        })
        .collect()
}

pub struct MockSource {
    pub log: CallLog,
    pub authorized: bool,
    pub tables: Vec<TableDescriptor>,
    pub pages: HashMap<String, Vec<Vec<Record>>>,
    pub fail_records_for: Option<String>,
    pub page_calls: AtomicUsize,
}

impl MockSource {
    pub fn new(log: CallLog, tables: Vec<TableDescriptor>) -> Self {
        Self {
            log,
            authorized: true,
            tables,
            pages: HashMap::new(),
            fail_records_for: None,
            page_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_pages(mut self, table_id: &str, pages: Vec<Vec<Record>>) -> Self {
        self.pages.insert(table_id.to_string(), pages);
        self
    }

    fn record(&self, call: String) {
        self.log.lock().unwrap().push(call);
    }
}

#[async_trait]
impl SourceApi for MockSource {
    async fn list_containers(&self) -> Result<Vec<Base>> {
        self.record("source.list_containers".into());
        if !self.authorized {
            return Err(MigrateError::Auth("401 Unauthorized".into()));
        }
        Ok(vec![Base {
            id: BASE_ID.to_string(),
            name: BASE_NAME.to_string(),
            permission_level: "create".to_string(),
        }])
    }

    async fn list_tables(&self, base_id: &str) -> Result<Vec<TableDescriptor>> {
        self.record(format!("source.list_tables {}", base_id));
        if base_id != BASE_ID {
            return Err(MigrateError::NotFound(format!("base {}", base_id)));
        }
        Ok(self.tables.clone())
    }

    async fn list_records(
        &self,
        _base_id: &str,
        table_id: &str,
        options: ListRecordsOptions,
    ) -> Result<RecordPage> {
        self.record(format!("source.list_records {}", table_id));
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_records_for.as_deref() == Some(table_id) {
            return Err(MigrateError::Network("connection reset".into()));
        }

        let pages = self.pages.get(table_id).cloned().unwrap_or_default();
        let index: usize = options
            .offset
            .as_deref()
            .map(|o| o.trim_start_matches("page").parse().unwrap())
            .unwrap_or(0);
        let records = pages.get(index).cloned().unwrap_or_default();
        let offset = (index + 1 < pages.len()).then(|| format!("page{}", index + 1));
        Ok(RecordPage { records, offset })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertCall {
    pub document_id: String,
    pub table_id: String,
    pub records: Vec<Map<String, Value>>,
}

pub struct MockTarget {
    pub log: CallLog,
    pub authorized: bool,
    pub inserts: Mutex<Vec<InsertCall>>,
    pub created_tables: Mutex<Vec<TableSchema>>,
    /// Fail the n-th insert call (1-based).
    pub fail_insert_at: Option<usize>,
    /// Return one id fewer than requested from create_tables.
    pub drop_one_table_id: bool,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl MockTarget {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            authorized: true,
            inserts: Mutex::new(Vec::new()),
            created_tables: Mutex::new(Vec::new()),
            fail_insert_at: None,
            drop_one_table_id: false,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn inserts(&self) -> Vec<InsertCall> {
        self.inserts.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.log.lock().unwrap().push(call);
    }
}

#[async_trait]
impl TargetApi for MockTarget {
    async fn list_organizations(&self) -> Result<Vec<Org>> {
        self.record("target.list_organizations".into());
        if !self.authorized {
            return Err(MigrateError::Auth("401 Unauthorized".into()));
        }
        Ok(vec![Org {
            id: 42,
            name: "Personal".to_string(),
            domain: Some("docs".to_string()),
        }])
    }

    async fn list_workspaces(&self, org_id: i64) -> Result<Vec<Workspace>> {
        self.record(format!("target.list_workspaces {}", org_id));
        Ok(vec![Workspace {
            id: 146993,
            name: "Home".to_string(),
            docs: None,
        }])
    }

    async fn create_document(&self, workspace_id: i64, name: &str) -> Result<String> {
        self.record(format!("target.create_document {} {}", workspace_id, name));
        Ok("docNew".to_string())
    }

    async fn create_tables(&self, document_id: &str, tables: &[TableSchema]) -> Result<Vec<String>> {
        self.record(format!("target.create_tables {}", document_id));
        self.created_tables.lock().unwrap().extend_from_slice(tables);
        // Grist normalizes the requested ids; mimic that so tests cannot
        // pass by matching on names.
        let mut ids: Vec<String> = tables
            .iter()
            .enumerate()
            .map(|(i, t)| format!("Table{}_{}", i + 1, t.id.replace(' ', "_")))
            .collect();
        if self.drop_one_table_id {
            ids.pop();
        }
        Ok(ids)
    }

    async fn insert_records(
        &self,
        document_id: &str,
        table_id: &str,
        records: &[Map<String, Value>],
    ) -> Result<()> {
        self.record(format!("target.insert_records {} {}", table_id, records.len()));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        // Give any concurrently issued call a chance to overlap.
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let call_number = {
            let mut inserts = self.inserts.lock().unwrap();
            inserts.push(InsertCall {
                document_id: document_id.to_string(),
                table_id: table_id.to_string(),
                records: records.to_vec(),
            });
            inserts.len()
        };

        if self.fail_insert_at == Some(call_number) {
            return Err(MigrateError::Remote {
                status: 500,
                status_text: "Internal Server Error".to_string(),
                body: String::new(),
            });
        }
        Ok(())
    }
}
