//! Wire encoding and decoding of typed values.
//!
//! Values travel to and from providers in one of two forms: a compact
//! msgpack payload (preferred) or a JSON payload. Both encodings are
//! schema-guided: the bytes alone are ambiguous, so every decode takes the
//! [`Type`] the payload was produced against. Decoding an empty or absent
//! payload always yields the typed null of the requested type, never an
//! error, so callers do not special-case "no value returned".

use std::collections::BTreeMap;

use serde_json::Value as JsonValue;

use crate::error::BridgeError;
use crate::value::{json_kind, Type, Value};

/// Decode whichever payload of a wire value is present.
///
/// Msgpack wins when both are set, matching the protocol's preference.
/// Both empty means the value was absent: the typed null is returned.
pub fn decode_wire(msgpack: &[u8], json: &[u8], ty: &Type) -> Result<Value, BridgeError> {
    if !msgpack.is_empty() {
        decode_msgpack(msgpack, ty)
    } else if !json.is_empty() {
        decode_json(json, ty)
    } else {
        Ok(Value::null_of(ty))
    }
}

/// Encode a value into the msgpack wire form.
pub fn encode_msgpack(value: &Value, ty: &Type) -> Result<Vec<u8>, BridgeError> {
    let mp = to_msgpack(value, ty)?;
    let mut buf = Vec::new();
    rmpv::encode::write_value(&mut buf, &mp)
        .map_err(|e| BridgeError::Encoding(format!("msgpack write failed: {}", e)))?;
    Ok(buf)
}

/// Decode a msgpack wire payload against `ty`.
pub fn decode_msgpack(raw: &[u8], ty: &Type) -> Result<Value, BridgeError> {
    if raw.is_empty() {
        return Ok(Value::null_of(ty));
    }
    let mut rd: &[u8] = raw;
    let mp = rmpv::decode::read_value(&mut rd)
        .map_err(|e| BridgeError::Encoding(format!("msgpack read failed: {}", e)))?;
    from_msgpack(&mp, ty)
}

/// Encode a value into the JSON wire form.
pub fn encode_json(value: &Value, ty: &Type) -> Result<Vec<u8>, BridgeError> {
    let doc = to_json_doc(value, ty)?;
    Ok(serde_json::to_vec(&doc)?)
}

/// Decode a JSON wire payload against `ty`.
pub fn decode_json(raw: &[u8], ty: &Type) -> Result<Value, BridgeError> {
    if raw.is_empty() {
        return Ok(Value::null_of(ty));
    }
    let doc: JsonValue = serde_json::from_slice(raw)?;
    from_json_doc(&doc, ty)
}

/// Decode a JSON document that is already parsed.
pub fn decode_json_value(doc: &JsonValue, ty: &Type) -> Result<Value, BridgeError> {
    from_json_doc(doc, ty)
}

// msgpack form

fn to_msgpack(value: &Value, ty: &Type) -> Result<rmpv::Value, BridgeError> {
    if let Type::Dynamic = ty {
        // Dynamic values carry their own type: a two-element array of the
        // JSON type notation followed by the value encoded against it.
        let actual = infer_type(value);
        let type_json = serde_json::to_vec(&actual.to_json())?;
        return Ok(rmpv::Value::Array(vec![
            rmpv::Value::Binary(type_json),
            to_msgpack(value, &actual)?,
        ]));
    }

    match (value, ty) {
        (Value::Null(_), _) => Ok(rmpv::Value::Nil),
        (Value::Number(n), Type::Number) => Ok(number_to_msgpack(*n)),
        (Value::String(s), Type::String) => Ok(rmpv::Value::String(s.as_str().into())),
        (Value::Bool(b), Type::Bool) => Ok(rmpv::Value::Boolean(*b)),
        (Value::List(items), Type::List(elem)) | (Value::List(items), Type::Set(elem)) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(to_msgpack(item, elem)?);
            }
            Ok(rmpv::Value::Array(out))
        },
        (Value::List(items), Type::Tuple(etys)) => {
            if items.len() != etys.len() {
                return Err(BridgeError::Encoding(format!(
                    "tuple value has {} elements, type expects {}",
                    items.len(),
                    etys.len()
                )));
            }
            let mut out = Vec::with_capacity(items.len());
            for (item, ety) in items.iter().zip(etys) {
                out.push(to_msgpack(item, ety)?);
            }
            Ok(rmpv::Value::Array(out))
        },
        (Value::Map(entries), Type::Map(elem)) => {
            let mut out = Vec::with_capacity(entries.len());
            for (key, item) in entries {
                out.push((
                    rmpv::Value::String(key.as_str().into()),
                    to_msgpack(item, elem)?,
                ));
            }
            Ok(rmpv::Value::Map(out))
        },
        (Value::Map(entries), Type::Object(atys)) => {
            for key in entries.keys() {
                if !atys.contains_key(key) {
                    return Err(BridgeError::Encoding(format!(
                        "value has attribute {:?} not present in {}",
                        key, ty
                    )));
                }
            }
            let mut out = Vec::with_capacity(atys.len());
            for (name, aty) in atys {
                let item = match entries.get(name) {
                    Some(item) => to_msgpack(item, aty)?,
                    None => rmpv::Value::Nil,
                };
                out.push((rmpv::Value::String(name.as_str().into()), item));
            }
            Ok(rmpv::Value::Map(out))
        },
        (value, ty) => Err(mismatch(value, ty)),
    }
}

fn from_msgpack(mp: &rmpv::Value, ty: &Type) -> Result<Value, BridgeError> {
    match mp {
        rmpv::Value::Nil => return Ok(Value::null_of(ty)),
        // Unknown-value extension markers; a read result is expected to be
        // wholly known, so any that slip through become nulls.
        rmpv::Value::Ext(_, _) => return Ok(Value::null_of(ty)),
        _ => {}
    }

    match ty {
        Type::Number => msgpack_number(mp),
        Type::String => match mp {
            rmpv::Value::String(s) => match s.as_str() {
                Some(s) => Ok(Value::String(s.to_string())),
                None => Err(BridgeError::Encoding("string payload is not UTF-8".to_string())),
            },
            other => Err(wire_mismatch("string", mp_kind(other))),
        },
        Type::Bool => match mp {
            rmpv::Value::Boolean(b) => Ok(Value::Bool(*b)),
            other => Err(wire_mismatch("bool", mp_kind(other))),
        },
        Type::List(elem) | Type::Set(elem) => match mp {
            rmpv::Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(from_msgpack(item, elem)?);
                }
                Ok(Value::List(out))
            },
            other => Err(wire_mismatch("array", mp_kind(other))),
        },
        Type::Tuple(etys) => match mp {
            rmpv::Value::Array(items) => {
                if items.len() != etys.len() {
                    return Err(BridgeError::Encoding(format!(
                        "tuple payload has {} elements, type expects {}",
                        items.len(),
                        etys.len()
                    )));
                }
                let mut out = Vec::with_capacity(items.len());
                for (item, ety) in items.iter().zip(etys) {
                    out.push(from_msgpack(item, ety)?);
                }
                Ok(Value::List(out))
            },
            other => Err(wire_mismatch("array", mp_kind(other))),
        },
        Type::Map(elem) => {
            let pairs = msgpack_entries(mp)?;
            let mut out = BTreeMap::new();
            for (key, item) in pairs {
                out.insert(key, from_msgpack(item, elem)?);
            }
            Ok(Value::Map(out))
        },
        Type::Object(atys) => {
            let pairs = msgpack_entries(mp)?;
            let mut out = BTreeMap::new();
            for (key, item) in pairs {
                let aty = atys.get(&key).ok_or_else(|| {
                    BridgeError::Encoding(format!("payload has unsupported attribute {:?}", key))
                })?;
                out.insert(key, from_msgpack(item, aty)?);
            }
            for (name, aty) in atys {
                out.entry(name.clone())
                    .or_insert_with(|| Value::null_of(aty));
            }
            Ok(Value::Map(out))
        },
        Type::Dynamic => match mp {
            rmpv::Value::Array(parts) if parts.len() == 2 => {
                let type_json = match &parts[0] {
                    rmpv::Value::Binary(b) => b.as_slice(),
                    rmpv::Value::String(s) => s.as_bytes(),
                    other => {
                        return Err(wire_mismatch("type notation bytes", mp_kind(other)));
                    },
                };
                let actual = Type::parse(type_json)?;
                from_msgpack(&parts[1], &actual)
            },
            other => Err(wire_mismatch("two-element array", mp_kind(other))),
        },
    }
}

fn number_to_msgpack(n: f64) -> rmpv::Value {
    // The upper bound is exclusive: i64::MAX as f64 rounds up to 2^63,
    // which does not fit an i64 and must travel as a float.
    if n.is_finite() && n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64 {
        rmpv::Value::from(n as i64)
    } else {
        rmpv::Value::F64(n)
    }
}

fn msgpack_number(mp: &rmpv::Value) -> Result<Value, BridgeError> {
    match mp {
        rmpv::Value::Integer(i) => {
            if let Some(v) = i.as_i64() {
                Ok(Value::Number(v as f64))
            } else if let Some(v) = i.as_u64() {
                Ok(Value::Number(v as f64))
            } else {
                Err(BridgeError::Encoding("unrepresentable integer payload".to_string()))
            }
        },
        rmpv::Value::F32(f) => Ok(Value::Number(f64::from(*f))),
        rmpv::Value::F64(f) => Ok(Value::Number(*f)),
        // Numbers beyond float precision are sent as decimal strings.
        rmpv::Value::String(s) => {
            let text = s
                .as_str()
                .ok_or_else(|| BridgeError::Encoding("number payload is not UTF-8".to_string()))?;
            text.parse::<f64>()
                .map(Value::Number)
                .map_err(|_| BridgeError::Encoding(format!("invalid number payload {:?}", text)))
        },
        other => Err(wire_mismatch("number", mp_kind(other))),
    }
}

fn msgpack_entries(mp: &rmpv::Value) -> Result<Vec<(String, &rmpv::Value)>, BridgeError> {
    match mp {
        rmpv::Value::Map(pairs) => {
            let mut out = Vec::with_capacity(pairs.len());
            for (key, item) in pairs {
                let key = match key {
                    rmpv::Value::String(s) => s.as_str().map(str::to_string),
                    _ => None,
                };
                let key = key.ok_or_else(|| {
                    BridgeError::Encoding("map payload has a non-string key".to_string())
                })?;
                out.push((key, item));
            }
            Ok(out)
        },
        other => Err(wire_mismatch("map", mp_kind(other))),
    }
}

// JSON form

fn to_json_doc(value: &Value, ty: &Type) -> Result<JsonValue, BridgeError> {
    if let Type::Dynamic = ty {
        let actual = match value {
            Value::Null(inner) => inner.clone(),
            other => infer_type(other),
        };
        return Ok(serde_json::json!({
            "value": to_json_doc(value, &actual)?,
            "type": actual.to_json(),
        }));
    }

    match (value, ty) {
        (Value::Null(_), _) => Ok(JsonValue::Null),
        (Value::Number(_), Type::Number)
        | (Value::String(_), Type::String)
        | (Value::Bool(_), Type::Bool) => Ok(value.to_json()),
        (Value::List(items), Type::List(elem)) | (Value::List(items), Type::Set(elem)) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(to_json_doc(item, elem)?);
            }
            Ok(JsonValue::Array(out))
        },
        (Value::List(items), Type::Tuple(etys)) => {
            if items.len() != etys.len() {
                return Err(BridgeError::Encoding(format!(
                    "tuple value has {} elements, type expects {}",
                    items.len(),
                    etys.len()
                )));
            }
            let mut out = Vec::with_capacity(items.len());
            for (item, ety) in items.iter().zip(etys) {
                out.push(to_json_doc(item, ety)?);
            }
            Ok(JsonValue::Array(out))
        },
        (Value::Map(entries), Type::Map(elem)) => {
            let mut out = serde_json::Map::new();
            for (key, item) in entries {
                out.insert(key.clone(), to_json_doc(item, elem)?);
            }
            Ok(JsonValue::Object(out))
        },
        (Value::Map(entries), Type::Object(atys)) => {
            for key in entries.keys() {
                if !atys.contains_key(key) {
                    return Err(BridgeError::Encoding(format!(
                        "value has attribute {:?} not present in {}",
                        key, ty
                    )));
                }
            }
            let mut out = serde_json::Map::new();
            for (name, aty) in atys {
                let doc = match entries.get(name) {
                    Some(item) => to_json_doc(item, aty)?,
                    None => JsonValue::Null,
                };
                out.insert(name.clone(), doc);
            }
            Ok(JsonValue::Object(out))
        },
        (value, ty) => Err(mismatch(value, ty)),
    }
}

fn from_json_doc(doc: &JsonValue, ty: &Type) -> Result<Value, BridgeError> {
    if doc.is_null() {
        return Ok(Value::null_of(ty));
    }

    match ty {
        Type::Number => match doc {
            JsonValue::Number(n) => n
                .as_f64()
                .map(Value::Number)
                .ok_or_else(|| BridgeError::Encoding("unrepresentable number".to_string())),
            // Full-precision numbers arrive as strings.
            JsonValue::String(s) => s
                .parse::<f64>()
                .map(Value::Number)
                .map_err(|_| BridgeError::Encoding(format!("invalid number {:?}", s))),
            other => Err(wire_mismatch("number", json_kind(other))),
        },
        Type::String => match doc {
            JsonValue::String(s) => Ok(Value::String(s.clone())),
            other => Err(wire_mismatch("string", json_kind(other))),
        },
        Type::Bool => match doc {
            JsonValue::Bool(b) => Ok(Value::Bool(*b)),
            other => Err(wire_mismatch("bool", json_kind(other))),
        },
        Type::List(elem) | Type::Set(elem) => match doc {
            JsonValue::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(from_json_doc(item, elem)?);
                }
                Ok(Value::List(out))
            },
            other => Err(wire_mismatch("array", json_kind(other))),
        },
        Type::Tuple(etys) => match doc {
            JsonValue::Array(items) => {
                if items.len() != etys.len() {
                    return Err(BridgeError::Encoding(format!(
                        "tuple payload has {} elements, type expects {}",
                        items.len(),
                        etys.len()
                    )));
                }
                let mut out = Vec::with_capacity(items.len());
                for (item, ety) in items.iter().zip(etys) {
                    out.push(from_json_doc(item, ety)?);
                }
                Ok(Value::List(out))
            },
            other => Err(wire_mismatch("array", json_kind(other))),
        },
        Type::Map(elem) => match doc {
            JsonValue::Object(entries) => {
                let mut out = BTreeMap::new();
                for (key, item) in entries {
                    out.insert(key.clone(), from_json_doc(item, elem)?);
                }
                Ok(Value::Map(out))
            },
            other => Err(wire_mismatch("object", json_kind(other))),
        },
        Type::Object(atys) => match doc {
            JsonValue::Object(entries) => {
                let mut out = BTreeMap::new();
                for (key, item) in entries {
                    let aty = atys.get(key).ok_or_else(|| {
                        BridgeError::Encoding(format!(
                            "payload has unsupported attribute {:?}",
                            key
                        ))
                    })?;
                    out.insert(key.clone(), from_json_doc(item, aty)?);
                }
                // Attributes absent from the document become typed nulls.
                for (name, aty) in atys {
                    out.entry(name.clone())
                        .or_insert_with(|| Value::null_of(aty));
                }
                Ok(Value::Map(out))
            },
            other => Err(wire_mismatch("object", json_kind(other))),
        },
        Type::Dynamic => match doc {
            JsonValue::Object(entries) => {
                let type_doc = entries.get("type").ok_or_else(|| {
                    BridgeError::Encoding("dynamic payload is missing \"type\"".to_string())
                })?;
                let value_doc = entries.get("value").ok_or_else(|| {
                    BridgeError::Encoding("dynamic payload is missing \"value\"".to_string())
                })?;
                let actual = Type::from_json(type_doc)?;
                from_json_doc(value_doc, &actual)
            },
            other => Err(wire_mismatch("dynamic wrapper object", json_kind(other))),
        },
    }
}

// Helper functions

/// Derive a concrete type from a value, for encoding against `Dynamic`.
/// Sequences become tuples and keyed maps become objects, the same shapes
/// a self-describing JSON document implies.
fn infer_type(value: &Value) -> Type {
    match value {
        Value::Null(ty) => ty.clone(),
        Value::Number(_) => Type::Number,
        Value::String(_) => Type::String,
        Value::Bool(_) => Type::Bool,
        Value::List(items) => Type::Tuple(items.iter().map(infer_type).collect()),
        Value::Map(entries) => Type::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), infer_type(v)))
                .collect(),
        ),
    }
}

fn mismatch(value: &Value, ty: &Type) -> BridgeError {
    let shape = match value {
        Value::Null(_) => "null",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Bool(_) => "bool",
        Value::List(_) => "list",
        Value::Map(_) => "map",
    };
    BridgeError::Encoding(format!("cannot encode {} value as {}", shape, ty))
}

fn wire_mismatch(expected: &str, got: &str) -> BridgeError {
    BridgeError::Encoding(format!("expected {}, got {}", expected, got))
}

fn mp_kind(mp: &rmpv::Value) -> &'static str {
    match mp {
        rmpv::Value::Nil => "nil",
        rmpv::Value::Boolean(_) => "bool",
        rmpv::Value::Integer(_) => "integer",
        rmpv::Value::F32(_) | rmpv::Value::F64(_) => "float",
        rmpv::Value::String(_) => "string",
        rmpv::Value::Binary(_) => "binary",
        rmpv::Value::Array(_) => "array",
        rmpv::Value::Map(_) => "map",
        rmpv::Value::Ext(_, _) => "extension",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object_type(attrs: &[(&str, Type)]) -> Type {
        Type::Object(
            attrs
                .iter()
                .map(|(name, ty)| (name.to_string(), ty.clone()))
                .collect(),
        )
    }

    #[test]
    fn test_msgpack_round_trip_primitives() {
        let cases = vec![
            (Value::Number(42.0), Type::Number),
            (Value::Number(3.25), Type::Number),
            (Value::Number(-7.0), Type::Number),
            (Value::String("example.com".to_string()), Type::String),
            (Value::Bool(true), Type::Bool),
            (Value::Null(Type::String), Type::String),
        ];
        for (value, ty) in cases {
            let raw = encode_msgpack(&value, &ty).unwrap();
            assert_eq!(decode_msgpack(&raw, &ty).unwrap(), value);
        }
    }

    #[test]
    fn test_json_round_trip_primitives() {
        let cases = vec![
            (Value::Number(42.0), Type::Number),
            (Value::Number(0.5), Type::Number),
            (Value::String("a".to_string()), Type::String),
            (Value::Bool(false), Type::Bool),
            (Value::Null(Type::Bool), Type::Bool),
        ];
        for (value, ty) in cases {
            let raw = encode_json(&value, &ty).unwrap();
            assert_eq!(decode_json(&raw, &ty).unwrap(), value);
        }
    }

    #[test]
    fn test_json_round_trip_nested() {
        let ty = object_type(&[
            ("host", Type::String),
            ("addrs", Type::List(Box::new(Type::String))),
            ("weights", Type::Map(Box::new(Type::Number))),
        ]);
        let value = Value::Map(BTreeMap::from([
            ("host".to_string(), Value::String("example.com".to_string())),
            (
                "addrs".to_string(),
                Value::List(vec![
                    Value::String("1.1.1.1".to_string()),
                    Value::String("8.8.8.8".to_string()),
                ]),
            ),
            (
                "weights".to_string(),
                Value::Map(BTreeMap::from([
                    ("a".to_string(), Value::Number(1.0)),
                    ("b".to_string(), Value::Number(2.5)),
                ])),
            ),
        ]));
        let raw = encode_json(&value, &ty).unwrap();
        assert_eq!(decode_json(&raw, &ty).unwrap(), value);
    }

    #[test]
    fn test_msgpack_round_trip_nested() {
        let ty = object_type(&[
            ("names", Type::Set(Box::new(Type::String))),
            ("pair", Type::Tuple(vec![Type::String, Type::Number])),
        ]);
        let value = Value::Map(BTreeMap::from([
            (
                "names".to_string(),
                Value::List(vec![Value::String("x".to_string())]),
            ),
            (
                "pair".to_string(),
                Value::List(vec![Value::String("p".to_string()), Value::Number(9.0)]),
            ),
        ]));
        let raw = encode_msgpack(&value, &ty).unwrap();
        assert_eq!(decode_msgpack(&raw, &ty).unwrap(), value);
    }

    #[test]
    fn test_empty_payload_decodes_to_typed_null() {
        let types = vec![
            Type::Number,
            Type::String,
            Type::Bool,
            Type::List(Box::new(Type::String)),
            object_type(&[("a", Type::Number)]),
            Type::Dynamic,
        ];
        for ty in types {
            assert_eq!(decode_msgpack(&[], &ty).unwrap(), Value::null_of(&ty));
            assert_eq!(decode_json(&[], &ty).unwrap(), Value::null_of(&ty));
            assert_eq!(decode_wire(&[], &[], &ty).unwrap(), Value::null_of(&ty));
        }
    }

    #[test]
    fn test_decode_wire_prefers_msgpack() {
        let ty = Type::Number;
        let mp = encode_msgpack(&Value::Number(1.0), &ty).unwrap();
        let js = encode_json(&Value::Number(2.0), &ty).unwrap();
        assert_eq!(decode_wire(&mp, &js, &ty).unwrap(), Value::Number(1.0));
        assert_eq!(decode_wire(&[], &js, &ty).unwrap(), Value::Number(2.0));
    }

    #[test]
    fn test_object_decode_fills_missing_with_null() {
        let ty = object_type(&[
            ("host", Type::String),
            ("addrs", Type::List(Box::new(Type::String))),
        ]);
        let value = decode_json(br#"{"host":"example.com"}"#, &ty).unwrap();
        let entries = value.as_map().unwrap();
        assert_eq!(
            entries.get("host"),
            Some(&Value::String("example.com".to_string()))
        );
        assert_eq!(
            entries.get("addrs"),
            Some(&Value::Null(Type::List(Box::new(Type::String))))
        );
    }

    #[test]
    fn test_object_decode_rejects_unknown_attribute() {
        let ty = object_type(&[("host", Type::String)]);
        let err = decode_json(br#"{"host":"a","extra":1}"#, &ty).unwrap_err();
        assert!(format!("{}", err).contains("unsupported attribute"));
    }

    #[test]
    fn test_decode_shape_mismatch() {
        assert!(decode_json(b"[1,2]", &Type::Number).is_err());
        assert!(decode_json(b"\"x\"", &Type::Bool).is_err());
        let raw = encode_msgpack(&Value::Bool(true), &Type::Bool).unwrap();
        assert!(decode_msgpack(&raw, &Type::String).is_err());
    }

    #[test]
    fn test_tuple_length_mismatch() {
        let ty = Type::Tuple(vec![Type::String, Type::Number]);
        let err = decode_json(br#"["only-one"]"#, &ty).unwrap_err();
        assert!(format!("{}", err).contains("tuple payload"));

        let value = Value::List(vec![Value::String("x".to_string())]);
        assert!(encode_json(&value, &ty).is_err());
        assert!(encode_msgpack(&value, &ty).is_err());
    }

    #[test]
    fn test_msgpack_unknown_extension_decodes_to_null() {
        let mut raw = Vec::new();
        rmpv::encode::write_value(&mut raw, &rmpv::Value::Ext(0, vec![0])).unwrap();
        assert_eq!(
            decode_msgpack(&raw, &Type::String).unwrap(),
            Value::Null(Type::String)
        );
    }

    #[test]
    fn test_msgpack_number_from_string_payload() {
        let mut raw = Vec::new();
        rmpv::encode::write_value(&mut raw, &rmpv::Value::from("12345.5")).unwrap();
        assert_eq!(
            decode_msgpack(&raw, &Type::Number).unwrap(),
            Value::Number(12345.5)
        );
    }

    #[test]
    fn test_json_number_from_string_payload() {
        assert_eq!(
            decode_json(b"\"10\"", &Type::Number).unwrap(),
            Value::Number(10.0)
        );
    }

    #[test]
    fn test_dynamic_round_trip() {
        let value = Value::Map(BTreeMap::from([
            ("name".to_string(), Value::String("x".to_string())),
            ("count".to_string(), Value::Number(2.0)),
        ]));

        let raw = encode_msgpack(&value, &Type::Dynamic).unwrap();
        assert_eq!(decode_msgpack(&raw, &Type::Dynamic).unwrap(), value);

        let raw = encode_json(&value, &Type::Dynamic).unwrap();
        assert_eq!(decode_json(&raw, &Type::Dynamic).unwrap(), value);
    }

    #[test]
    fn test_encode_type_check() {
        let err = encode_msgpack(&Value::String("x".to_string()), &Type::Number).unwrap_err();
        assert!(format!("{}", err).contains("cannot encode string value as number"));

        let value = Value::Map(BTreeMap::from([("nope".to_string(), Value::Number(1.0))]));
        let ty = object_type(&[("host", Type::String)]);
        assert!(encode_json(&value, &ty).is_err());
    }
}
