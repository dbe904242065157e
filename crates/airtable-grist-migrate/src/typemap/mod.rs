//! Type mapping between Airtable and Grist.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::source::{Record, TableDescriptor};
use crate::target::{ColumnFields, ColumnSchema, TableSchema};

/// Grist column types produced by the mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GristType {
    Text,
    Numeric,
    Int,
    Date,
    DateTime,
    Bool,
    Choice,
}

impl GristType {
    /// Wire name of the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            GristType::Text => "Text",
            GristType::Numeric => "Numeric",
            GristType::Int => "Int",
            GristType::Date => "Date",
            GristType::DateTime => "DateTime",
            GristType::Bool => "Bool",
            GristType::Choice => "Choice",
        }
    }
}

/// Map an Airtable field type tag to a Grist column type.
///
/// Unknown tags fall back to Text so table creation never fails on a type.
pub fn airtable_to_grist(type_tag: &str) -> GristType {
    match type_tag {
        // Text
        "singleLineText" | "multilineText" | "richText" | "email" | "url" | "phoneNumber" => {
            GristType::Text
        }

        // Numeric
        "number" | "currency" | "percent" | "duration" => GristType::Numeric,

        // Integer
        "autoNumber" | "count" | "rating" => GristType::Int,

        // Date/time
        "date" => GristType::Date,
        "dateTime" | "createdTime" | "lastModifiedTime" => GristType::DateTime,

        // Boolean
        "checkbox" => GristType::Bool,

        // Choice (Grist has no multi-choice equivalent here, so
        // multipleSelects stays Text)
        "singleSelect" => GristType::Choice,

        // Computed and composite values are stored as text
        "multipleSelects" | "formula" | "multipleAttachments" | "attachment" | "barcode"
        | "button" | "singleCollaborator" | "multipleCollaborators" | "collaborator"
        | "createdBy" | "lastModifiedBy" | "lookup" | "multipleLookupValues" | "rollup"
        | "multipleRecordLinks" => GristType::Text,

        // Default fallback
        _ => GristType::Text,
    }
}

/// Build the Grist table definition for an Airtable table.
///
/// Columns keep the source field order; the column id is the field id and
/// the label is the field name. The table id is the source table name.
pub fn to_table_schema(table: &TableDescriptor) -> TableSchema {
    let columns = table
        .fields
        .iter()
        .map(|field| ColumnSchema {
            id: field.id.clone(),
            fields: ColumnFields {
                label: field.name.clone(),
                column_type: airtable_to_grist(&field.type_tag),
            },
        })
        .collect();

    TableSchema {
        id: table.name.clone(),
        columns,
    }
}

/// Convert an Airtable record into Grist column values.
///
/// Airtable keys cells by field name while the created columns use field
/// ids, so cells are re-keyed. Values bound for Text columns are flattened
/// to strings; cells whose field is not in the schema are dropped.
pub fn to_record_fields(table: &TableDescriptor, record: &Record) -> Map<String, Value> {
    let mut fields = Map::with_capacity(record.fields.len());

    for (name, value) in &record.fields {
        let Some(field) = table.field_by_name(name) else {
            continue;
        };
        let value = match airtable_to_grist(&field.type_tag) {
            GristType::Text => flatten_to_text(value),
            _ => value.clone(),
        };
        fields.insert(field.id.clone(), value);
    }

    fields
}

/// Render composite cell values (select lists, attachments, collaborators)
/// as a single string.
fn flatten_to_text(value: &Value) -> Value {
    match value {
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(text_of).collect();
            Value::String(parts.join(", "))
        }
        Value::Object(_) => text_of(value).map(Value::String).unwrap_or(Value::Null),
        Value::Number(n) => Value::String(n.to_string()),
        Value::Bool(b) => Value::String(b.to_string()),
        other => other.clone(),
    }
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => ["url", "email", "name", "text"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .map(str::to_string)
            .or_else(|| Some(value.to_string())),
        other => Some(other.to_string()),
    }
}
