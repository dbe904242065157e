//! Airtable metadata and record types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An Airtable base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Base {
    /// Base id, e.g. `appkYowYfmnc53Xn2`.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Permission of the token on this base (`read`, `edit`, `create`, ...).
    #[serde(default)]
    pub permission_level: String,
}

/// Table metadata, including the full field list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDescriptor {
    /// Table id, e.g. `tblXXXXXXXXXXXXXX`.
    pub id: String,

    /// Table name.
    pub name: String,

    /// Optional table description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Id of the primary field.
    pub primary_field_id: String,

    /// Field definitions in display order.
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,

    /// Views defined on the table.
    #[serde(default)]
    pub views: Vec<View>,
}

impl TableDescriptor {
    /// Look up a field by its display name.
    pub fn field_by_name(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Field (column) metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Field id, e.g. `fldXXXXXXXXXXXXXX`.
    pub id: String,

    /// Field name.
    pub name: String,

    /// Airtable type tag, e.g. `singleLineText`.
    #[serde(rename = "type")]
    pub type_tag: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Type-specific options, kept opaque.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
}

/// A table view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct View {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub view_type: String,
}

/// A record as returned by the list records endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<String>,

    /// Cell values keyed by field name. Empty cells are omitted by the API.
    #[serde(default)]
    pub fields: Map<String, Value>,
}

/// One page of records.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordPage {
    #[serde(default)]
    pub records: Vec<Record>,

    /// Cursor for the next page; absent on the last page.
    #[serde(default)]
    pub offset: Option<String>,
}

/// Query options for a single list records call.
#[derive(Debug, Clone, Default)]
pub struct ListRecordsOptions {
    /// Records per page (the API caps this at 100).
    pub page_size: Option<usize>,

    /// Cursor returned by the previous page.
    pub offset: Option<String>,

    /// Only return records visible in this view.
    pub view: Option<String>,

    /// Only return records matching this formula.
    pub filter_by_formula: Option<String>,
}

impl ListRecordsOptions {
    /// Options for the page following `offset`.
    pub fn page(page_size: usize, offset: Option<String>) -> Self {
        Self {
            page_size: Some(page_size),
            offset,
            ..Self::default()
        }
    }

    /// Render as query parameters, skipping unset options.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(size) = self.page_size {
            pairs.push(("pageSize", size.to_string()));
        }
        if let Some(ref offset) = self.offset {
            pairs.push(("offset", offset.clone()));
        }
        if let Some(ref view) = self.view {
            pairs.push(("view", view.clone()));
        }
        if let Some(ref formula) = self.filter_by_formula {
            pairs.push(("filterByFormula", formula.clone()));
        }
        pairs
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct BasesResponse {
    #[serde(default)]
    pub bases: Vec<Base>,
    #[serde(default)]
    pub offset: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TablesResponse {
    #[serde(default)]
    pub tables: Vec<TableDescriptor>,
}
