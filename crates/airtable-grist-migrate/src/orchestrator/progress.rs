//! Progress events emitted during a run.

use serde::Serialize;

/// A discrete step of a migration run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    DocumentCreated {
        document_id: String,
        document_name: String,
    },
    SchemasFetched {
        tables: usize,
    },
    TablesCreated {
        table_ids: Vec<String>,
    },
    BatchInserted {
        table: String,
        inserted: usize,
        total: usize,
    },
    TableCopied {
        table: String,
        destination_table_id: String,
        records: usize,
        /// 1-based position of the table in the selection.
        position: usize,
        of: usize,
    },
    Completed {
        document_id: String,
        records: usize,
    },
    Failed {
        message: String,
    },
}

/// Receives progress events synchronously and in order.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: &ProgressEvent);
}

impl<F> ProgressReporter for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn report(&self, event: &ProgressEvent) {
        self(event)
    }
}
