//! The dynamic type and value model shared with providers.
//!
//! Providers describe every attribute with a structural type drawn from a
//! small algebra (primitives, collections, objects, tuples and a dynamic
//! placeholder), and exchange values tagged with those types. [`Type`] is the
//! in-memory form of that algebra and knows how to read and write the JSON
//! type notation carried inside schema responses. [`Value`] is the bridge's
//! native value model: a closed set of variants, so every consumer matches
//! exhaustively instead of falling through a default branch.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;

use crate::error::BridgeError;

/// A structural type descriptor for provider values.
///
/// Mirrors the type algebra used on the wire: three primitives, three
/// homogeneous collections, heterogeneous tuples, objects with per-attribute
/// types, and `Dynamic` for values that carry their own type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    /// Arbitrary-precision number on the wire; handled as `f64` here.
    Number,
    /// UTF-8 string.
    String,
    /// Boolean.
    Bool,
    /// Ordered collection with a single element type.
    List(Box<Type>),
    /// Unordered collection with a single element type.
    Set(Box<Type>),
    /// String-keyed collection with a single element type.
    Map(Box<Type>),
    /// Fixed-length sequence with per-position element types.
    Tuple(Vec<Type>),
    /// Named attributes, each with its own type.
    Object(BTreeMap<String, Type>),
    /// Type is decided by the value itself at encoding time.
    Dynamic,
}

impl Type {
    /// Parse the JSON type notation used in schema responses.
    ///
    /// The notation encodes primitives as bare strings (`"string"`,
    /// `"number"`, `"bool"`, `"dynamic"`) and everything else as a tagged
    /// array, e.g. `["list","string"]` or `["object",{"host":"string"}]`.
    pub fn parse(raw: &[u8]) -> Result<Self, BridgeError> {
        let doc: JsonValue = serde_json::from_slice(raw)?;
        Self::from_json(&doc)
    }

    /// Build a `Type` from an already-parsed JSON type document.
    pub fn from_json(doc: &JsonValue) -> Result<Self, BridgeError> {
        match doc {
            JsonValue::String(name) => match name.as_str() {
                "number" => Ok(Type::Number),
                "string" => Ok(Type::String),
                "bool" => Ok(Type::Bool),
                "dynamic" => Ok(Type::Dynamic),
                other => Err(BridgeError::Encoding(format!(
                    "unknown primitive type {:?}",
                    other
                ))),
            },
            JsonValue::Array(parts) => Self::from_json_parts(parts),
            other => Err(BridgeError::Encoding(format!(
                "type notation must be a string or array, got {}",
                json_kind(other)
            ))),
        }
    }

    fn from_json_parts(parts: &[JsonValue]) -> Result<Self, BridgeError> {
        let kind = parts
            .first()
            .and_then(JsonValue::as_str)
            .ok_or_else(|| BridgeError::Encoding("empty type notation array".to_string()))?;

        match kind {
            "list" | "set" | "map" => {
                let elem = parts.get(1).ok_or_else(|| {
                    BridgeError::Encoding(format!("{} type is missing its element type", kind))
                })?;
                let elem = Box::new(Self::from_json(elem)?);
                Ok(match kind {
                    "list" => Type::List(elem),
                    "set" => Type::Set(elem),
                    _ => Type::Map(elem),
                })
            },
            "object" => {
                // A third array element may list optional attribute names;
                // it does not affect the structural type and is ignored.
                let attrs = parts
                    .get(1)
                    .and_then(JsonValue::as_object)
                    .ok_or_else(|| {
                        BridgeError::Encoding(
                            "object type is missing its attribute map".to_string(),
                        )
                    })?;
                let mut out = BTreeMap::new();
                for (name, aty) in attrs {
                    out.insert(name.clone(), Self::from_json(aty)?);
                }
                Ok(Type::Object(out))
            },
            "tuple" => {
                let elems = parts
                    .get(1)
                    .and_then(JsonValue::as_array)
                    .ok_or_else(|| {
                        BridgeError::Encoding(
                            "tuple type is missing its element list".to_string(),
                        )
                    })?;
                let mut out = Vec::with_capacity(elems.len());
                for ety in elems {
                    out.push(Self::from_json(ety)?);
                }
                Ok(Type::Tuple(out))
            },
            other => Err(BridgeError::Encoding(format!(
                "unknown type kind {:?}",
                other
            ))),
        }
    }

    /// Render this type back into the JSON type notation.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Type::Number => JsonValue::String("number".to_string()),
            Type::String => JsonValue::String("string".to_string()),
            Type::Bool => JsonValue::String("bool".to_string()),
            Type::Dynamic => JsonValue::String("dynamic".to_string()),
            Type::List(elem) => json_pair("list", elem.to_json()),
            Type::Set(elem) => json_pair("set", elem.to_json()),
            Type::Map(elem) => json_pair("map", elem.to_json()),
            Type::Tuple(elems) => json_pair(
                "tuple",
                JsonValue::Array(elems.iter().map(Type::to_json).collect()),
            ),
            Type::Object(attrs) => {
                let mut map = serde_json::Map::new();
                for (name, aty) in attrs {
                    map.insert(name.clone(), aty.to_json());
                }
                json_pair("object", JsonValue::Object(map))
            },
        }
    }

    /// True for the three scalar types usable as equality qualifiers.
    pub fn is_primitive(&self) -> bool {
        matches!(self, Type::Number | Type::String | Type::Bool)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Number => write!(f, "number"),
            Type::String => write!(f, "string"),
            Type::Bool => write!(f, "bool"),
            Type::Dynamic => write!(f, "dynamic"),
            Type::List(elem) => write!(f, "list({})", elem),
            Type::Set(elem) => write!(f, "set({})", elem),
            Type::Map(elem) => write!(f, "map({})", elem),
            Type::Tuple(elems) => {
                write!(f, "tuple([")?;
                for (i, ety) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", ety)?;
                }
                write!(f, "])")
            },
            Type::Object(attrs) => {
                write!(f, "object({{")?;
                for (i, (name, aty)) in attrs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}={}", name, aty)?;
                }
                write!(f, "}})")
            },
        }
    }
}

/// Types serialize as their wire notation, so a schema dumped to JSON reads
/// the same way the provider sent it.
impl Serialize for Type {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Type {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let doc = JsonValue::deserialize(deserializer)?;
        Type::from_json(&doc).map_err(serde::de::Error::custom)
    }
}

/// A decoded provider value.
///
/// The variant set is closed on purpose: collections of every flavor decode
/// to [`Value::List`], and both maps and objects decode to [`Value::Map`],
/// so row extraction and qualifier handling stay exhaustive `match`es. Null
/// keeps the type it was decoded against, which distinguishes "no value for
/// this string attribute" from "no value for this block list" when a value
/// is re-encoded.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent value of a known type.
    Null(Type),
    /// Number, as `f64`.
    Number(f64),
    /// String.
    String(String),
    /// Boolean.
    Bool(bool),
    /// List, set or tuple contents.
    List(Vec<Value>),
    /// Map or object contents, keyed by attribute/element name.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// The typed null for `ty`.
    pub fn null_of(ty: &Type) -> Self {
        Value::Null(ty.clone())
    }

    /// True when the value is null (of any type).
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null(_))
    }

    /// Borrow the entries of a map/object value.
    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Project the value into plain JSON, dropping type information.
    ///
    /// Used for JSON-typed columns, where nested structures are handed to
    /// the host as generic documents. Non-finite numbers have no JSON
    /// representation and collapse to null.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null(_) => JsonValue::Null,
            Value::Number(n) => {
                if n.is_finite() && n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
                    JsonValue::Number((*n as i64).into())
                } else {
                    serde_json::Number::from_f64(*n)
                        .map(JsonValue::Number)
                        .unwrap_or(JsonValue::Null)
                }
            },
            Value::String(s) => JsonValue::String(s.clone()),
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::List(items) => JsonValue::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(entries) => {
                let mut map = serde_json::Map::new();
                for (name, item) in entries {
                    map.insert(name.clone(), item.to_json());
                }
                JsonValue::Object(map)
            },
        }
    }
}

// Helper functions

fn json_pair(kind: &str, rest: JsonValue) -> JsonValue {
    JsonValue::Array(vec![JsonValue::String(kind.to_string()), rest])
}

pub(crate) fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_primitive_types() {
        assert_eq!(Type::parse(b"\"string\"").unwrap(), Type::String);
        assert_eq!(Type::parse(b"\"number\"").unwrap(), Type::Number);
        assert_eq!(Type::parse(b"\"bool\"").unwrap(), Type::Bool);
        assert_eq!(Type::parse(b"\"dynamic\"").unwrap(), Type::Dynamic);
    }

    #[test]
    fn test_parse_collection_types() {
        assert_eq!(
            Type::parse(br#"["list","string"]"#).unwrap(),
            Type::List(Box::new(Type::String))
        );
        assert_eq!(
            Type::parse(br#"["set","number"]"#).unwrap(),
            Type::Set(Box::new(Type::Number))
        );
        assert_eq!(
            Type::parse(br#"["map","bool"]"#).unwrap(),
            Type::Map(Box::new(Type::Bool))
        );
        assert_eq!(
            Type::parse(br#"["list",["list","string"]]"#).unwrap(),
            Type::List(Box::new(Type::List(Box::new(Type::String))))
        );
    }

    #[test]
    fn test_parse_object_and_tuple() {
        let ty = Type::parse(br#"["object",{"host":"string","port":"number"}]"#).unwrap();
        let mut attrs = BTreeMap::new();
        attrs.insert("host".to_string(), Type::String);
        attrs.insert("port".to_string(), Type::Number);
        assert_eq!(ty, Type::Object(attrs));

        let ty = Type::parse(br#"["tuple",["string","number"]]"#).unwrap();
        assert_eq!(ty, Type::Tuple(vec![Type::String, Type::Number]));
    }

    #[test]
    fn test_parse_object_with_optional_names() {
        // Optional attribute names may trail the attribute map.
        let ty = Type::parse(br#"["object",{"a":"string","b":"number"},["b"]]"#).unwrap();
        match ty {
            Type::Object(attrs) => assert_eq!(attrs.len(), 2),
            other => panic!("expected object, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(Type::parse(b"\"uuid\"").is_err());
        assert!(Type::parse(br#"["list"]"#).is_err());
        assert!(Type::parse(br#"["pair","string","string"]"#).is_err());
        assert!(Type::parse(br#"["object","string"]"#).is_err());
        assert!(Type::parse(b"42").is_err());
        assert!(Type::parse(b"not json").is_err());
    }

    #[test]
    fn test_type_json_round_trip() {
        let types = vec![
            Type::String,
            Type::List(Box::new(Type::Number)),
            Type::Map(Box::new(Type::List(Box::new(Type::Bool)))),
            Type::Tuple(vec![Type::String, Type::Dynamic]),
            Type::Object(BTreeMap::from([
                ("host".to_string(), Type::String),
                ("tags".to_string(), Type::Set(Box::new(Type::String))),
            ])),
        ];
        for ty in types {
            let doc = ty.to_json();
            assert_eq!(Type::from_json(&doc).unwrap(), ty);
        }
    }

    #[test]
    fn test_type_display() {
        assert_eq!(Type::String.to_string(), "string");
        assert_eq!(Type::List(Box::new(Type::String)).to_string(), "list(string)");
        assert_eq!(
            Type::Object(BTreeMap::from([
                ("a".to_string(), Type::Number),
                ("b".to_string(), Type::Bool),
            ]))
            .to_string(),
            "object({a=number, b=bool})"
        );
        assert_eq!(
            Type::Tuple(vec![Type::String, Type::Number]).to_string(),
            "tuple([string, number])"
        );
    }

    #[test]
    fn test_value_to_json() {
        let value = Value::Map(BTreeMap::from([
            ("host".to_string(), Value::String("example.com".to_string())),
            ("port".to_string(), Value::Number(53.0)),
            ("ratio".to_string(), Value::Number(0.5)),
            ("up".to_string(), Value::Bool(true)),
            ("missing".to_string(), Value::Null(Type::String)),
            (
                "addrs".to_string(),
                Value::List(vec![
                    Value::String("1.1.1.1".to_string()),
                    Value::String("8.8.8.8".to_string()),
                ]),
            ),
        ]));
        assert_eq!(
            value.to_json(),
            json!({
                "host": "example.com",
                "port": 53,
                "ratio": 0.5,
                "up": true,
                "missing": null,
                "addrs": ["1.1.1.1", "8.8.8.8"],
            })
        );
    }

    #[test]
    fn test_value_helpers() {
        assert!(Value::Null(Type::String).is_null());
        assert!(!Value::Bool(false).is_null());
        assert_eq!(Value::null_of(&Type::Number), Value::Null(Type::Number));

        let map = Value::Map(BTreeMap::from([(
            "k".to_string(),
            Value::Number(1.0),
        )]));
        assert!(map.as_map().is_some());
        assert!(Value::Number(1.0).as_map().is_none());
    }
}
