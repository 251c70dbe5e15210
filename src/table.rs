//! Deriving table shapes from data source schemas.
//!
//! A data source's root block flattens into one table: each attribute with a
//! usable type becomes a column, each nested block becomes a JSON column.
//! Columns are ordered by classification (required, then optional, then
//! read-only) and alphabetically within a group, mirroring how provider
//! documentation conventionally lists arguments. Required and optional
//! entries double as equality key columns so the host can push filters down
//! into the read request.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::warn;

use crate::error::BridgeError;
use crate::schema::{Attribute, Block, Classification, Schema};
use crate::value::{Type, Value};

/// Storage type of a derived column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// 64-bit floating point. All schema numbers map here.
    Double,
    /// UTF-8 text.
    String,
    /// Boolean.
    Bool,
    /// A JSON document, used for every structured type.
    Json,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Double => write!(f, "double"),
            ColumnType::String => write!(f, "string"),
            ColumnType::Bool => write!(f, "bool"),
            ColumnType::Json => write!(f, "json"),
        }
    }
}

/// A single column of a derived table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name, identical to the attribute or nested block name.
    pub name: String,
    /// Storage type the column's values are rendered as.
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    /// Whether the underlying schema entry is required, optional or
    /// read-only. Determines the column's position and whether it is
    /// usable as a key column.
    pub classification: Classification,
    /// Description carried over from the schema, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Whether a key column must be present in a read request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyRequirement {
    /// The filter must be supplied for the read to proceed.
    Mandatory,
    /// The filter may be supplied to narrow the read.
    Optional,
}

/// A column usable as an equality filter in a read request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyColumn {
    /// Column name.
    pub name: String,
    /// Whether the host must supply this filter.
    pub require: KeyRequirement,
    /// Supported comparison operators. Always equality.
    pub operators: Vec<String>,
}

impl KeyColumn {
    /// A key column the host must supply.
    pub fn mandatory(name: impl Into<String>) -> Self {
        KeyColumn {
            name: name.into(),
            require: KeyRequirement::Mandatory,
            operators: vec!["=".to_string()],
        }
    }

    /// A key column the host may supply.
    pub fn optional(name: impl Into<String>) -> Self {
        KeyColumn {
            name: name.into(),
            require: KeyRequirement::Optional,
            operators: vec!["=".to_string()],
        }
    }
}

/// The table shape derived from one data source schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDescriptor {
    /// Table name, identical to the data source type name.
    pub name: String,
    /// Ordered column list.
    pub columns: Vec<Column>,
    /// Columns accepted as equality filters.
    pub key_columns: Vec<KeyColumn>,
    /// Description of the data source, when its schema carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TableDescriptor {
    /// Derive the table shape for a data source.
    ///
    /// Fails with [`BridgeError::SchemaDefect`] when any attribute or
    /// nested block matches no classification.
    pub fn from_schema(name: impl Into<String>, schema: &Schema) -> Result<Self, BridgeError> {
        Ok(TableDescriptor {
            name: name.into(),
            columns: derive_columns(&schema.block)?,
            key_columns: derive_key_columns(&schema.block)?,
            description: schema.block.description.clone(),
        })
    }
}

/// Derive the ordered column list for a block.
///
/// Attributes map by declared type (number to double, string to string,
/// bool to bool, anything structured to JSON); nested blocks always come
/// out as JSON columns. An attribute carrying neither a type nor a nested
/// object type is skipped with a warning.
pub fn derive_columns(block: &Block) -> Result<Vec<Column>, BridgeError> {
    let mut columns = Vec::new();
    for (name, attribute) in &block.attributes {
        let Some(column_type) = attribute_column_type(attribute) else {
            warn!(attribute = %name, "attribute has no usable type, skipping column");
            continue;
        };
        let classification = attribute.classify().ok_or_else(|| {
            BridgeError::SchemaDefect(format!("attribute {:?} matches no classification", name))
        })?;
        columns.push(Column {
            name: name.clone(),
            column_type,
            classification,
            description: attribute.description.clone(),
        });
    }
    for (name, nested) in &block.blocks {
        let classification = nested.classify().ok_or_else(|| {
            BridgeError::SchemaDefect(format!("block {:?} matches no classification", name))
        })?;
        columns.push(Column {
            name: name.clone(),
            column_type: ColumnType::Json,
            classification,
            description: nested.block.description.clone(),
        });
    }
    // Stable, so columns with equal rank and distinct names cannot swap.
    columns.sort_by(|a, b| {
        a.classification
            .rank()
            .cmp(&b.classification.rank())
            .then_with(|| a.name.cmp(&b.name))
    });
    Ok(columns)
}

/// Derive the key columns for a block.
///
/// Required entries become mandatory key columns, optional entries become
/// optional ones. Read-only entries and attributes without a usable type
/// never qualify.
pub fn derive_key_columns(block: &Block) -> Result<Vec<KeyColumn>, BridgeError> {
    let mut keys = Vec::new();
    for (name, attribute) in &block.attributes {
        if attribute_column_type(attribute).is_none() {
            continue;
        }
        let classification = attribute.classify().ok_or_else(|| {
            BridgeError::SchemaDefect(format!("attribute {:?} matches no classification", name))
        })?;
        match classification {
            Classification::Required => keys.push(KeyColumn::mandatory(name.clone())),
            Classification::Optional => keys.push(KeyColumn::optional(name.clone())),
            Classification::ReadOnly => {}
        }
    }
    for (name, nested) in &block.blocks {
        let classification = nested.classify().ok_or_else(|| {
            BridgeError::SchemaDefect(format!("block {:?} matches no classification", name))
        })?;
        match classification {
            Classification::Required => keys.push(KeyColumn::mandatory(name.clone())),
            Classification::Optional => keys.push(KeyColumn::optional(name.clone())),
            Classification::ReadOnly => {}
        }
    }
    Ok(keys)
}

fn attribute_column_type(attribute: &Attribute) -> Option<ColumnType> {
    match &attribute.attr_type {
        Some(Type::Number) => Some(ColumnType::Double),
        Some(Type::String) => Some(ColumnType::String),
        Some(Type::Bool) => Some(ColumnType::Bool),
        Some(_) => Some(ColumnType::Json),
        None if attribute.nested_type.is_some() => Some(ColumnType::Json),
        None => None,
    }
}

/// One result row, keyed by column name.
pub type Row = BTreeMap<String, ColumnValue>;

/// A native cell value handed to the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ColumnValue {
    /// The column has no value.
    Null,
    /// Value of a double column.
    Double(f64),
    /// Value of a string column.
    String(String),
    /// Value of a bool column.
    Bool(bool),
    /// Value of a JSON column.
    Json(JsonValue),
}

/// Map a decoded data source state object onto a row of the descriptor's
/// columns. Null and absent fields become [`ColumnValue::Null`].
pub fn build_row(descriptor: &TableDescriptor, state: &Value) -> Result<Row, BridgeError> {
    let fields = state.as_map().ok_or_else(|| {
        BridgeError::Encoding(format!(
            "data source state must be an object, got a {} value",
            value_kind(state)
        ))
    })?;
    let mut row = Row::new();
    for column in &descriptor.columns {
        row.insert(column.name.clone(), cell(column, fields.get(&column.name))?);
    }
    Ok(row)
}

fn cell(column: &Column, value: Option<&Value>) -> Result<ColumnValue, BridgeError> {
    let value = match value {
        Some(value) if !value.is_null() => value,
        _ => return Ok(ColumnValue::Null),
    };
    match (column.column_type, value) {
        (ColumnType::Double, Value::Number(n)) => Ok(ColumnValue::Double(*n)),
        (ColumnType::String, Value::String(s)) => Ok(ColumnValue::String(s.clone())),
        (ColumnType::Bool, Value::Bool(b)) => Ok(ColumnValue::Bool(*b)),
        (ColumnType::Json, value) => Ok(ColumnValue::Json(value.to_json())),
        (expected, value) => Err(BridgeError::Encoding(format!(
            "column {:?} expects a {} value, got a {} value",
            column.name,
            expected,
            value_kind(value)
        ))),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null(_) => "null",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Bool(_) => "bool",
        Value::List(_) => "list",
        Value::Map(_) => "map",
    }
}
