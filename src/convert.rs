//! Conversion from wire protocol messages into the schema model.
//!
//! Both protocol dialects describe the same shapes with separate generated
//! types, so the conversions come in parallel v5 and v6 flavors. Schema
//! conversion is strict: an attribute with an unparseable type descriptor or
//! a block with an invalid nesting mode fails the whole response, since
//! nothing downstream can work with a half-converted schema. Diagnostic
//! conversion is lossless and never fails.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::error::BridgeError;
use crate::proto::{tfplugin5, tfplugin6};
use crate::schema::{
    Attribute, AttributeFlags, Block, Diagnostic, DiagnosticSeverity, Diagnostics, NestedBlock,
    NestedType, NestingMode, ProviderSchema, Schema, ServerCapabilities,
};
use crate::value::Type;

/// Convert a v5 schema response into the provider schema model.
///
/// When the response carries error diagnostics the schema maps are left
/// empty and only the diagnostics survive.
pub fn provider_schema_v5(
    resp: tfplugin5::get_provider_schema::Response,
) -> Result<ProviderSchema, BridgeError> {
    let mut diagnostics = diagnostics_v5(resp.diagnostics);
    if diagnostics.has_errors() {
        return Ok(ProviderSchema {
            diagnostics,
            ..Default::default()
        });
    }

    let provider = match resp.provider {
        Some(provider) => schema_v5(provider)?,
        None => {
            diagnostics.push(Diagnostic::error("missing provider schema"));
            return Ok(ProviderSchema {
                diagnostics,
                ..Default::default()
            });
        },
    };

    Ok(ProviderSchema {
        provider,
        provider_meta: resp.provider_meta.map(schema_v5).transpose()?,
        resource_types: schema_map_v5(resp.resource_schemas)?,
        data_sources: schema_map_v5(resp.data_source_schemas)?,
        capabilities: resp
            .server_capabilities
            .map(capabilities_v5)
            .unwrap_or_default(),
        diagnostics,
    })
}

/// Convert a v6 schema response into the provider schema model.
///
/// When the response carries error diagnostics the schema maps are left
/// empty and only the diagnostics survive.
pub fn provider_schema_v6(
    resp: tfplugin6::get_provider_schema::Response,
) -> Result<ProviderSchema, BridgeError> {
    let mut diagnostics = diagnostics_v6(resp.diagnostics);
    if diagnostics.has_errors() {
        return Ok(ProviderSchema {
            diagnostics,
            ..Default::default()
        });
    }

    let provider = match resp.provider {
        Some(provider) => schema_v6(provider)?,
        None => {
            diagnostics.push(Diagnostic::error("missing provider schema"));
            return Ok(ProviderSchema {
                diagnostics,
                ..Default::default()
            });
        },
    };

    Ok(ProviderSchema {
        provider,
        provider_meta: resp.provider_meta.map(schema_v6).transpose()?,
        resource_types: schema_map_v6(resp.resource_schemas)?,
        data_sources: schema_map_v6(resp.data_source_schemas)?,
        capabilities: resp
            .server_capabilities
            .map(capabilities_v6)
            .unwrap_or_default(),
        diagnostics,
    })
}

/// Convert v5 wire diagnostics.
pub fn diagnostics_v5(diags: Vec<tfplugin5::Diagnostic>) -> Diagnostics {
    diags
        .into_iter()
        .map(diagnostic_v5)
        .collect::<Vec<_>>()
        .into()
}

/// Convert v6 wire diagnostics.
pub fn diagnostics_v6(diags: Vec<tfplugin6::Diagnostic>) -> Diagnostics {
    diags
        .into_iter()
        .map(diagnostic_v6)
        .collect::<Vec<_>>()
        .into()
}

// Protocol v5

fn schema_map_v5(
    schemas: std::collections::HashMap<String, tfplugin5::Schema>,
) -> Result<BTreeMap<String, Schema>, BridgeError> {
    let mut out = BTreeMap::new();
    for (name, schema) in schemas {
        out.insert(name, schema_v5(schema)?);
    }
    Ok(out)
}

fn schema_v5(schema: tfplugin5::Schema) -> Result<Schema, BridgeError> {
    Ok(Schema {
        version: schema.version,
        block: schema.block.map(block_v5).transpose()?.unwrap_or_default(),
    })
}

fn block_v5(block: tfplugin5::schema::Block) -> Result<Block, BridgeError> {
    let mut attributes = BTreeMap::new();
    for attr in block.attributes {
        let (name, attr) = attribute_v5(attr)?;
        attributes.insert(name, attr);
    }
    let mut blocks = BTreeMap::new();
    for nested in block.block_types {
        let (name, nested) = nested_block_v5(nested)?;
        blocks.insert(name, nested);
    }
    Ok(Block {
        attributes,
        blocks,
        description: non_empty(block.description),
    })
}

fn attribute_v5(
    attr: tfplugin5::schema::Attribute,
) -> Result<(String, Attribute), BridgeError> {
    let attr_type = parse_attr_type(&attr.name, &attr.r#type)?;
    let converted = Attribute {
        attr_type,
        nested_type: None,
        flags: AttributeFlags {
            required: attr.required,
            optional: attr.optional,
            computed: attr.computed,
            sensitive: attr.sensitive,
        },
        description: non_empty(attr.description),
    };
    Ok((attr.name, converted))
}

fn nested_block_v5(
    nested: tfplugin5::schema::NestedBlock,
) -> Result<(String, NestedBlock), BridgeError> {
    use tfplugin5::schema::nested_block::NestingMode as Wire;

    let nesting = match nested.nesting() {
        Wire::Single => NestingMode::Single,
        Wire::List => NestingMode::List,
        Wire::Set => NestingMode::Set,
        Wire::Map => NestingMode::Map,
        Wire::Group => NestingMode::Group,
        Wire::Invalid => {
            return Err(BridgeError::SchemaDefect(format!(
                "block {:?} uses an invalid nesting mode",
                nested.type_name
            )));
        },
    };
    let converted = NestedBlock {
        block: nested.block.map(block_v5).transpose()?.unwrap_or_default(),
        nesting,
        min_items: nested.min_items.max(0) as u64,
        max_items: nested.max_items.max(0) as u64,
    };
    Ok((nested.type_name, converted))
}

fn capabilities_v5(caps: tfplugin5::ServerCapabilities) -> ServerCapabilities {
    ServerCapabilities {
        plan_destroy: caps.plan_destroy,
        get_provider_schema_optional: caps.get_provider_schema_optional,
    }
}

fn diagnostic_v5(diag: tfplugin5::Diagnostic) -> Diagnostic {
    use tfplugin5::diagnostic::Severity as Wire;

    Diagnostic {
        severity: match diag.severity() {
            Wire::Error => DiagnosticSeverity::Error,
            Wire::Warning => DiagnosticSeverity::Warning,
            Wire::Invalid => DiagnosticSeverity::Invalid,
        },
        summary: diag.summary,
        detail: non_empty(diag.detail),
        attribute: diag.attribute.map(render_path_v5).and_then(non_empty),
    }
}

fn render_path_v5(path: tfplugin5::AttributePath) -> String {
    use tfplugin5::attribute_path::step::Selector;

    let mut out = String::new();
    for step in path.steps {
        match step.selector {
            Some(Selector::AttributeName(name)) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(&name);
            },
            Some(Selector::ElementKeyString(key)) => {
                let _ = write!(out, "[{:?}]", key);
            },
            Some(Selector::ElementKeyInt(index)) => {
                let _ = write!(out, "[{}]", index);
            },
            None => {}
        }
    }
    out
}

// Protocol v6

fn schema_map_v6(
    schemas: std::collections::HashMap<String, tfplugin6::Schema>,
) -> Result<BTreeMap<String, Schema>, BridgeError> {
    let mut out = BTreeMap::new();
    for (name, schema) in schemas {
        out.insert(name, schema_v6(schema)?);
    }
    Ok(out)
}

fn schema_v6(schema: tfplugin6::Schema) -> Result<Schema, BridgeError> {
    Ok(Schema {
        version: schema.version,
        block: schema.block.map(block_v6).transpose()?.unwrap_or_default(),
    })
}

fn block_v6(block: tfplugin6::schema::Block) -> Result<Block, BridgeError> {
    let mut attributes = BTreeMap::new();
    for attr in block.attributes {
        let (name, attr) = attribute_v6(attr)?;
        attributes.insert(name, attr);
    }
    let mut blocks = BTreeMap::new();
    for nested in block.block_types {
        let (name, nested) = nested_block_v6(nested)?;
        blocks.insert(name, nested);
    }
    Ok(Block {
        attributes,
        blocks,
        description: non_empty(block.description),
    })
}

fn attribute_v6(
    attr: tfplugin6::schema::Attribute,
) -> Result<(String, Attribute), BridgeError> {
    let attr_type = parse_attr_type(&attr.name, &attr.r#type)?;
    let nested_type = attr.nested_type.map(nested_type_v6).transpose()?;
    let converted = Attribute {
        attr_type,
        nested_type,
        flags: AttributeFlags {
            required: attr.required,
            optional: attr.optional,
            computed: attr.computed,
            sensitive: attr.sensitive,
        },
        description: non_empty(attr.description),
    };
    Ok((attr.name, converted))
}

fn nested_type_v6(object: tfplugin6::schema::Object) -> Result<NestedType, BridgeError> {
    use tfplugin6::schema::object::NestingMode as Wire;

    let nesting = match object.nesting() {
        Wire::Single => NestingMode::Single,
        Wire::List => NestingMode::List,
        Wire::Set => NestingMode::Set,
        Wire::Map => NestingMode::Map,
        Wire::Invalid => {
            return Err(BridgeError::SchemaDefect(
                "nested attribute object uses an invalid nesting mode".to_string(),
            ));
        },
    };
    let mut attributes = BTreeMap::new();
    for attr in object.attributes {
        let (name, attr) = attribute_v6(attr)?;
        attributes.insert(name, attr);
    }
    Ok(NestedType {
        attributes,
        nesting,
    })
}

fn nested_block_v6(
    nested: tfplugin6::schema::NestedBlock,
) -> Result<(String, NestedBlock), BridgeError> {
    use tfplugin6::schema::nested_block::NestingMode as Wire;

    let nesting = match nested.nesting() {
        Wire::Single => NestingMode::Single,
        Wire::List => NestingMode::List,
        Wire::Set => NestingMode::Set,
        Wire::Map => NestingMode::Map,
        Wire::Group => NestingMode::Group,
        Wire::Invalid => {
            return Err(BridgeError::SchemaDefect(format!(
                "block {:?} uses an invalid nesting mode",
                nested.type_name
            )));
        },
    };
    let converted = NestedBlock {
        block: nested.block.map(block_v6).transpose()?.unwrap_or_default(),
        nesting,
        min_items: nested.min_items.max(0) as u64,
        max_items: nested.max_items.max(0) as u64,
    };
    Ok((nested.type_name, converted))
}

fn capabilities_v6(caps: tfplugin6::ServerCapabilities) -> ServerCapabilities {
    ServerCapabilities {
        plan_destroy: caps.plan_destroy,
        get_provider_schema_optional: caps.get_provider_schema_optional,
    }
}

fn diagnostic_v6(diag: tfplugin6::Diagnostic) -> Diagnostic {
    use tfplugin6::diagnostic::Severity as Wire;

    Diagnostic {
        severity: match diag.severity() {
            Wire::Error => DiagnosticSeverity::Error,
            Wire::Warning => DiagnosticSeverity::Warning,
            Wire::Invalid => DiagnosticSeverity::Invalid,
        },
        summary: diag.summary,
        detail: non_empty(diag.detail),
        attribute: diag.attribute.map(render_path_v6).and_then(non_empty),
    }
}

fn render_path_v6(path: tfplugin6::AttributePath) -> String {
    use tfplugin6::attribute_path::step::Selector;

    let mut out = String::new();
    for step in path.steps {
        match step.selector {
            Some(Selector::AttributeName(name)) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(&name);
            },
            Some(Selector::ElementKeyString(key)) => {
                let _ = write!(out, "[{:?}]", key);
            },
            Some(Selector::ElementKeyInt(index)) => {
                let _ = write!(out, "[{}]", index);
            },
            None => {}
        }
    }
    out
}

// Helper functions

fn parse_attr_type(name: &str, raw: &[u8]) -> Result<Option<Type>, BridgeError> {
    if raw.is_empty() {
        return Ok(None);
    }
    Type::parse(raw)
        .map(Some)
        .map_err(|e| {
            BridgeError::Encoding(format!("attribute {:?} has an invalid type: {}", name, e))
        })
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() { None } else { Some(text) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Classification;

    fn v5_string_attr(name: &str, required: bool) -> tfplugin5::schema::Attribute {
        tfplugin5::schema::Attribute {
            name: name.to_string(),
            r#type: b"\"string\"".to_vec(),
            description: String::new(),
            required,
            optional: !required,
            computed: false,
            sensitive: false,
            description_kind: 0,
            deprecated: false,
        }
    }

    #[test]
    fn test_v5_schema_conversion() {
        let resp = tfplugin5::get_provider_schema::Response {
            provider: Some(tfplugin5::Schema {
                version: 0,
                block: Some(tfplugin5::schema::Block {
                    version: 0,
                    attributes: vec![v5_string_attr("api_key", true)],
                    block_types: vec![],
                    description: "provider config".to_string(),
                    description_kind: 0,
                    deprecated: false,
                }),
            }),
            resource_schemas: Default::default(),
            data_source_schemas: std::collections::HashMap::from([(
                "dns_a_record_set".to_string(),
                tfplugin5::Schema {
                    version: 1,
                    block: Some(tfplugin5::schema::Block {
                        version: 1,
                        attributes: vec![
                            v5_string_attr("host", true),
                            tfplugin5::schema::Attribute {
                                name: "addrs".to_string(),
                                r#type: br#"["list","string"]"#.to_vec(),
                                description: "resolved addresses".to_string(),
                                required: false,
                                optional: false,
                                computed: true,
                                sensitive: false,
                                description_kind: 0,
                                deprecated: false,
                            },
                        ],
                        block_types: vec![tfplugin5::schema::NestedBlock {
                            type_name: "options".to_string(),
                            block: Some(tfplugin5::schema::Block::default()),
                            nesting: tfplugin5::schema::nested_block::NestingMode::List
                                as i32,
                            min_items: 0,
                            max_items: 0,
                        }],
                        description: String::new(),
                        description_kind: 0,
                        deprecated: false,
                    }),
                },
            )]),
            diagnostics: vec![],
            provider_meta: None,
            server_capabilities: Some(tfplugin5::ServerCapabilities {
                plan_destroy: false,
                get_provider_schema_optional: true,
            }),
        };

        let schema = provider_schema_v5(resp).unwrap();
        assert!(!schema.diagnostics.has_errors());
        assert!(schema.capabilities.get_provider_schema_optional);
        assert!(schema.provider.block.attributes.contains_key("api_key"));

        let ds = schema.data_source("dns_a_record_set").unwrap();
        assert_eq!(ds.version, 1);
        let host = &ds.block.attributes["host"];
        assert_eq!(host.attr_type, Some(Type::String));
        assert_eq!(host.classify(), Some(Classification::Required));
        let addrs = &ds.block.attributes["addrs"];
        assert_eq!(addrs.attr_type, Some(Type::List(Box::new(Type::String))));
        assert_eq!(addrs.classify(), Some(Classification::ReadOnly));
        assert_eq!(ds.block.blocks["options"].nesting, NestingMode::List);
    }

    #[test]
    fn test_v5_error_diagnostics_empty_maps() {
        let resp = tfplugin5::get_provider_schema::Response {
            provider: Some(tfplugin5::Schema::default()),
            resource_schemas: std::collections::HashMap::from([(
                "thing".to_string(),
                tfplugin5::Schema::default(),
            )]),
            data_source_schemas: std::collections::HashMap::from([(
                "thing_lookup".to_string(),
                tfplugin5::Schema::default(),
            )]),
            diagnostics: vec![tfplugin5::Diagnostic {
                severity: tfplugin5::diagnostic::Severity::Error as i32,
                summary: "schema unavailable".to_string(),
                detail: String::new(),
                attribute: None,
            }],
            provider_meta: None,
            server_capabilities: None,
        };

        let schema = provider_schema_v5(resp).unwrap();
        assert!(schema.diagnostics.has_errors());
        assert!(schema.data_sources.is_empty());
        assert!(schema.resource_types.is_empty());
    }

    #[test]
    fn test_missing_provider_schema_is_reported() {
        let schema =
            provider_schema_v6(tfplugin6::get_provider_schema::Response::default()).unwrap();
        assert!(schema.diagnostics.has_errors());
        assert_eq!(schema.diagnostics[0].summary, "missing provider schema");
    }

    #[test]
    fn test_v5_invalid_nesting_mode_is_defect() {
        let resp = tfplugin5::get_provider_schema::Response {
            provider: Some(tfplugin5::Schema {
                version: 0,
                block: Some(tfplugin5::schema::Block {
                    block_types: vec![tfplugin5::schema::NestedBlock {
                        type_name: "broken".to_string(),
                        block: None,
                        nesting: 0,
                        min_items: 0,
                        max_items: 0,
                    }],
                    ..Default::default()
                }),
            }),
            ..Default::default()
        };

        match provider_schema_v5(resp) {
            Err(BridgeError::SchemaDefect(msg)) => assert!(msg.contains("broken")),
            other => panic!("expected schema defect, got {:?}", other),
        }
    }

    #[test]
    fn test_v5_unparseable_attribute_type_fails() {
        let mut attr = v5_string_attr("bad", true);
        attr.r#type = b"\"uuid\"".to_vec();
        let resp = tfplugin5::get_provider_schema::Response {
            provider: Some(tfplugin5::Schema {
                version: 0,
                block: Some(tfplugin5::schema::Block {
                    attributes: vec![attr],
                    ..Default::default()
                }),
            }),
            ..Default::default()
        };

        match provider_schema_v5(resp) {
            Err(BridgeError::Encoding(msg)) => assert!(msg.contains("bad")),
            other => panic!("expected encoding error, got {:?}", other),
        }
    }

    #[test]
    fn test_v5_attribute_path_rendering() {
        use tfplugin5::attribute_path::step::Selector;
        use tfplugin5::attribute_path::Step;

        let diag = tfplugin5::Diagnostic {
            severity: tfplugin5::diagnostic::Severity::Warning as i32,
            summary: "odd value".to_string(),
            detail: "check the element".to_string(),
            attribute: Some(tfplugin5::AttributePath {
                steps: vec![
                    Step {
                        selector: Some(Selector::AttributeName("options".to_string())),
                    },
                    Step {
                        selector: Some(Selector::ElementKeyInt(0)),
                    },
                    Step {
                        selector: Some(Selector::AttributeName("timeout".to_string())),
                    },
                ],
            }),
        };

        let diags = diagnostics_v5(vec![diag]);
        assert_eq!(diags[0].severity, DiagnosticSeverity::Warning);
        assert_eq!(diags[0].attribute.as_deref(), Some("options[0].timeout"));
        assert_eq!(diags[0].detail.as_deref(), Some("check the element"));
    }

    #[test]
    fn test_v6_nested_type_conversion() {
        let resp = tfplugin6::get_provider_schema::Response {
            provider: Some(tfplugin6::Schema::default()),
            data_source_schemas: std::collections::HashMap::from([(
                "store_items".to_string(),
                tfplugin6::Schema {
                    version: 0,
                    block: Some(tfplugin6::schema::Block {
                        attributes: vec![tfplugin6::schema::Attribute {
                            name: "items".to_string(),
                            r#type: vec![],
                            description: String::new(),
                            required: false,
                            optional: false,
                            computed: true,
                            sensitive: false,
                            description_kind: 0,
                            deprecated: false,
                            nested_type: Some(tfplugin6::schema::Object {
                                attributes: vec![tfplugin6::schema::Attribute {
                                    name: "sku".to_string(),
                                    r#type: b"\"string\"".to_vec(),
                                    description: String::new(),
                                    required: true,
                                    optional: false,
                                    computed: false,
                                    sensitive: false,
                                    description_kind: 0,
                                    deprecated: false,
                                    nested_type: None,
                                }],
                                nesting: tfplugin6::schema::object::NestingMode::List
                                    as i32,
                            }),
                        }],
                        ..Default::default()
                    }),
                },
            )]),
            ..Default::default()
        };

        let schema = provider_schema_v6(resp).unwrap();
        let attr = &schema.data_sources["store_items"].block.attributes["items"];
        assert!(attr.attr_type.is_none());
        let nested = attr.nested_type.as_ref().unwrap();
        assert_eq!(nested.nesting, NestingMode::List);
        assert_eq!(
            attr.implied_type(),
            Some(Type::List(Box::new(Type::Object(BTreeMap::from([(
                "sku".to_string(),
                Type::String
            )])))))
        );
    }

    #[test]
    fn test_v6_diagnostics_conversion() {
        let diags = diagnostics_v6(vec![
            tfplugin6::Diagnostic {
                severity: tfplugin6::diagnostic::Severity::Error as i32,
                summary: "bad config".to_string(),
                detail: String::new(),
                attribute: None,
            },
            tfplugin6::Diagnostic {
                severity: 99,
                summary: "unknown severity".to_string(),
                detail: String::new(),
                attribute: None,
            },
        ]);

        assert!(diags.has_errors());
        assert_eq!(diags[1].severity, DiagnosticSeverity::Invalid);
    }

    #[test]
    fn test_v6_flags_and_bounds_preserved() {
        let (name, nested) = nested_block_v6(tfplugin6::schema::NestedBlock {
            type_name: "listener".to_string(),
            block: Some(tfplugin6::schema::Block {
                attributes: vec![tfplugin6::schema::Attribute {
                    name: "port".to_string(),
                    r#type: b"\"number\"".to_vec(),
                    description: "Listen port".to_string(),
                    required: true,
                    optional: false,
                    computed: false,
                    sensitive: true,
                    description_kind: 0,
                    deprecated: false,
                    nested_type: None,
                }],
                ..Default::default()
            }),
            nesting: tfplugin6::schema::nested_block::NestingMode::Set as i32,
            min_items: 1,
            max_items: 4,
        })
        .unwrap();

        assert_eq!(name, "listener");
        assert_eq!(nested.nesting, NestingMode::Set);
        assert_eq!(nested.min_items, 1);
        assert_eq!(nested.max_items, 4);
        let port = &nested.block.attributes["port"];
        assert_eq!(port.attr_type, Some(Type::Number));
        assert!(port.flags.required && port.flags.sensitive);
        assert_eq!(port.description.as_deref(), Some("Listen port"));
        assert_eq!(nested.classify(), Some(Classification::Required));
    }

    #[test]
    fn test_negative_item_bounds_clamped() {
        let (_, nested) = nested_block_v5(tfplugin5::schema::NestedBlock {
            type_name: "options".to_string(),
            block: None,
            nesting: tfplugin5::schema::nested_block::NestingMode::Single as i32,
            min_items: -1,
            max_items: -1,
        })
        .unwrap();
        assert_eq!(nested.min_items, 0);
        assert_eq!(nested.max_items, 0);
    }
}
