//! Grist API payload types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::typemap::GristType;

/// A Grist organization (team site or personal site).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Org {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

/// A workspace inside an organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docs: Option<Vec<DocSummary>>,
}

/// Document entry listed inside a workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocSummary {
    pub id: String,
    pub name: String,
}

/// Table definition sent to `POST /api/docs/{docId}/tables`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Requested table id. Grist may normalize it, so the returned id is
    /// the one to use afterwards.
    pub id: String,
    pub columns: Vec<ColumnSchema>,
}

/// Column definition. `fields` is a single object, not a list, matching
/// the Grist API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub id: String,
    pub fields: ColumnFields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnFields {
    pub label: String,
    #[serde(rename = "type")]
    pub column_type: GristType,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateTablesRequest<'a> {
    pub tables: &'a [TableSchema],
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateTablesResponse {
    pub tables: Vec<TableRef>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TableRef {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct InsertRecordsRequest<'a> {
    pub records: Vec<RecordFields<'a>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RecordFields<'a> {
    pub fields: &'a Map<String, Value>,
}
