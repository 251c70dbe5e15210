//! Encoding equality filters into a data source read configuration.
//!
//! The host pushes down equality filters on key columns. Each filter value
//! is rendered back to JSON per its column's schema entry: attribute
//! filters as the native scalar the attribute's primitive type calls for,
//! nested block filters as a pre-encoded JSON document. The rendered fields
//! are assembled into one JSON object which is then decoded against the
//! schema's implied type. Going through JSON means every field the filters
//! leave out comes back as a typed null instead of needing per-type
//! construction.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map as JsonMap, Value as JsonValue};
use tracing::warn;

use crate::codec;
use crate::error::BridgeError;
use crate::schema::{Attribute, Schema};
use crate::value::{Type, Value};

/// An equality filter value supplied by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QualValue {
    /// Filter on a double column.
    Number(f64),
    /// Filter on a string column, or a JSON document for a JSON column.
    String(String),
    /// Filter on a bool column.
    Bool(bool),
}

impl From<f64> for QualValue {
    fn from(n: f64) -> Self {
        QualValue::Number(n)
    }
}

impl From<&str> for QualValue {
    fn from(s: &str) -> Self {
        QualValue::String(s.to_string())
    }
}

impl From<String> for QualValue {
    fn from(s: String) -> Self {
        QualValue::String(s)
    }
}

impl From<bool> for QualValue {
    fn from(b: bool) -> Self {
        QualValue::Bool(b)
    }
}

/// Equality filters keyed by column name.
pub type Filters = BTreeMap<String, QualValue>;

/// Build the configuration value for a data source read from the host's
/// equality filters.
///
/// Filters naming neither an attribute nor a nested block are ignored with
/// a warning; the host only offers filters on derived key columns, so an
/// unknown name is a host-side inconsistency rather than a user error.
pub fn build_read_config(schema: &Schema, filters: &Filters) -> Result<Value, BridgeError> {
    let mut doc = JsonMap::new();
    for (name, qual) in filters {
        if let Some(attribute) = schema.block.attributes.get(name) {
            doc.insert(name.clone(), attribute_filter(name, attribute, qual)?);
        } else if schema.block.blocks.contains_key(name) {
            doc.insert(name.clone(), block_filter(name, qual)?);
        } else {
            warn!(column = %name, "filter does not match any attribute or block, ignoring");
        }
    }
    codec::decode_json_value(&JsonValue::Object(doc), &schema.implied_type())
}

fn attribute_filter(
    name: &str,
    attribute: &Attribute,
    qual: &QualValue,
) -> Result<JsonValue, BridgeError> {
    match &attribute.attr_type {
        Some(Type::Number) => match qual {
            QualValue::Number(n) => Ok(json!(*n)),
            _ => Err(mismatch(name, "number")),
        },
        Some(Type::String) => match qual {
            QualValue::String(s) => Ok(JsonValue::String(s.clone())),
            _ => Err(mismatch(name, "string")),
        },
        Some(Type::Bool) => match qual {
            QualValue::Bool(b) => Ok(JsonValue::Bool(*b)),
            _ => Err(mismatch(name, "bool")),
        },
        _ => Err(BridgeError::UnsupportedQualifier {
            column: name.to_string(),
            type_name: qualifier_type_name(attribute),
        }),
    }
}

/// Nested block columns carry JSON, so their filters arrive as JSON text.
fn block_filter(name: &str, qual: &QualValue) -> Result<JsonValue, BridgeError> {
    let QualValue::String(raw) = qual else {
        return Err(BridgeError::Encoding(format!(
            "filter for block {:?} must be a JSON-encoded document",
            name
        )));
    };
    serde_json::from_str(raw).map_err(|e| {
        BridgeError::Encoding(format!("filter for block {:?} is not valid JSON: {}", name, e))
    })
}

fn mismatch(name: &str, expected: &str) -> BridgeError {
    BridgeError::Encoding(format!(
        "filter for column {:?} must be a {} value",
        name, expected
    ))
}

fn qualifier_type_name(attribute: &Attribute) -> String {
    match (&attribute.attr_type, &attribute.nested_type) {
        (Some(ty), _) => ty.to_string(),
        (None, Some(nested)) => nested.implied_type().to_string(),
        (None, None) => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeFlags, Block, NestedBlock};

    fn filters(entries: &[(&str, QualValue)]) -> Filters {
        entries
            .iter()
            .map(|(name, qual)| (name.to_string(), qual.clone()))
            .collect()
    }

    #[test]
    fn test_missing_filters_become_typed_nulls() {
        let schema = Schema::v0()
            .with_attribute("host", Attribute::required_string())
            .with_attribute(
                "addrs",
                Attribute::new(
                    Type::List(Box::new(Type::String)),
                    AttributeFlags::optional(),
                ),
            );
        let config =
            build_read_config(&schema, &filters(&[("host", "example.com".into())])).unwrap();

        let map = config.as_map().unwrap();
        assert_eq!(map["host"], Value::String("example.com".to_string()));
        assert_eq!(map["addrs"], Value::null_of(&Type::List(Box::new(Type::String))));
    }

    #[test]
    fn test_scalar_filters() {
        let schema = Schema::v0()
            .with_attribute("port", Attribute::required_number())
            .with_attribute("cached", Attribute::optional_bool());
        let config = build_read_config(
            &schema,
            &filters(&[("port", 443.0.into()), ("cached", true.into())]),
        )
        .unwrap();

        let map = config.as_map().unwrap();
        assert_eq!(map["port"], Value::Number(443.0));
        assert_eq!(map["cached"], Value::Bool(true));
    }

    #[test]
    fn test_block_filter_parses_json() {
        let schema = Schema::v0().with_block(
            "filter",
            NestedBlock::list(Block::new().with_attribute("name", Attribute::optional_string())),
        );
        let config = build_read_config(
            &schema,
            &filters(&[("filter", r#"[{"name":"web"}]"#.into())]),
        )
        .unwrap();

        let map = config.as_map().unwrap();
        let Value::List(items) = &map["filter"] else {
            panic!("expected a list, got {:?}", map["filter"]);
        };
        assert_eq!(items.len(), 1);
        assert_eq!(
            items[0].as_map().unwrap()["name"],
            Value::String("web".to_string())
        );
    }

    #[test]
    fn test_structured_attribute_filter_is_unsupported() {
        let schema = Schema::v0().with_attribute(
            "tags",
            Attribute::new(Type::Map(Box::new(Type::String)), AttributeFlags::optional()),
        );
        let err = build_read_config(&schema, &filters(&[("tags", "x".into())])).unwrap_err();
        assert!(matches!(err, BridgeError::UnsupportedQualifier { .. }));
        assert!(err.to_string().contains("tags"));
    }

    #[test]
    fn test_mismatched_scalar_kind() {
        let schema = Schema::v0().with_attribute("host", Attribute::required_string());
        let err = build_read_config(&schema, &filters(&[("host", 5.0.into())])).unwrap_err();
        assert!(err.to_string().contains("host"));
    }

    #[test]
    fn test_invalid_block_json() {
        let schema = Schema::v0().with_block("filter", NestedBlock::list(Block::new()));
        let err =
            build_read_config(&schema, &filters(&[("filter", "{not json".into())])).unwrap_err();
        assert!(matches!(err, BridgeError::Encoding(_)));
    }

    #[test]
    fn test_unknown_filter_ignored() {
        let schema = Schema::v0().with_attribute("host", Attribute::required_string());
        let config = build_read_config(&schema, &filters(&[("bogus", "x".into())])).unwrap();
        let map = config.as_map().unwrap();
        assert_eq!(map["host"], Value::null_of(&Type::String));
        assert!(!map.contains_key("bogus"));
    }
}
