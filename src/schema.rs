//! Schema types describing provider and data source structure.
//!
//! A provider describes itself with a tree of blocks: each block carries
//! named attributes (leaf fields with a [`Type`]) and named nested blocks
//! (recursive sub-schemas with repetition bounds). The bridge consumes these
//! trees three ways: classifying every entry as required, optional or
//! read-only; deriving the implied structural type used to encode and decode
//! configuration and state; and flattening them into table columns.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;
use crate::value::Type;

/// How a schema entry may be used by callers.
///
/// Every well-formed attribute and nested block belongs to exactly one
/// class. Ranks order table columns: required first, read-only last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    /// Must be supplied in configuration.
    Required,
    /// May be supplied in configuration.
    Optional,
    /// Produced by the provider, never supplied.
    ReadOnly,
}

impl Classification {
    /// Sort rank for column ordering.
    pub fn rank(self) -> u8 {
        match self {
            Classification::Required => 0,
            Classification::Optional => 1,
            Classification::ReadOnly => 2,
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Required => write!(f, "required"),
            Classification::Optional => write!(f, "optional"),
            Classification::ReadOnly => write!(f, "readonly"),
        }
    }
}

/// Describes how an attribute can be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AttributeFlags {
    /// The attribute is required in configuration.
    pub required: bool,
    /// The attribute is optional in configuration.
    pub optional: bool,
    /// The attribute is computed by the provider (read-only).
    pub computed: bool,
    /// The attribute is sensitive and should be hidden in logs/UI.
    pub sensitive: bool,
}

impl AttributeFlags {
    /// Create flags for a required attribute.
    pub fn required() -> Self {
        Self {
            required: true,
            ..Default::default()
        }
    }

    /// Create flags for an optional attribute.
    pub fn optional() -> Self {
        Self {
            optional: true,
            ..Default::default()
        }
    }

    /// Create flags for a computed attribute (read-only, set by provider).
    pub fn computed() -> Self {
        Self {
            computed: true,
            ..Default::default()
        }
    }

    /// Create flags for an optional+computed attribute (may be set, defaults
    /// from the provider otherwise).
    pub fn optional_computed() -> Self {
        Self {
            optional: true,
            computed: true,
            ..Default::default()
        }
    }

    /// Mark the attribute as sensitive.
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }
}

/// Describes a single attribute in a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// The declared type of the attribute, when it has one.
    ///
    /// Protocol v6 attributes may instead describe an object of nested
    /// attributes via [`Attribute::nested_type`]; an attribute carrying
    /// neither is malformed and never becomes a column.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub attr_type: Option<Type>,
    /// Nested object type for attribute-syntax blocks (protocol v6).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nested_type: Option<NestedType>,
    /// Flags describing how the attribute can be used.
    #[serde(flatten)]
    pub flags: AttributeFlags,
    /// Human-readable description of the attribute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Attribute {
    /// Create a new attribute with the given type and flags.
    pub fn new(attr_type: Type, flags: AttributeFlags) -> Self {
        Self {
            attr_type: Some(attr_type),
            nested_type: None,
            flags,
            description: None,
        }
    }

    /// Create an attribute backed by a nested object type.
    pub fn nested(nested_type: NestedType, flags: AttributeFlags) -> Self {
        Self {
            attr_type: None,
            nested_type: Some(nested_type),
            flags,
            description: None,
        }
    }

    /// Create a required string attribute.
    pub fn required_string() -> Self {
        Self::new(Type::String, AttributeFlags::required())
    }

    /// Create an optional string attribute.
    pub fn optional_string() -> Self {
        Self::new(Type::String, AttributeFlags::optional())
    }

    /// Create a computed string attribute.
    pub fn computed_string() -> Self {
        Self::new(Type::String, AttributeFlags::computed())
    }

    /// Create a required number attribute.
    pub fn required_number() -> Self {
        Self::new(Type::Number, AttributeFlags::required())
    }

    /// Create an optional number attribute.
    pub fn optional_number() -> Self {
        Self::new(Type::Number, AttributeFlags::optional())
    }

    /// Create a computed number attribute.
    pub fn computed_number() -> Self {
        Self::new(Type::Number, AttributeFlags::computed())
    }

    /// Create an optional bool attribute.
    pub fn optional_bool() -> Self {
        Self::new(Type::Bool, AttributeFlags::optional())
    }

    /// Create a computed bool attribute.
    pub fn computed_bool() -> Self {
        Self::new(Type::Bool, AttributeFlags::computed())
    }

    /// Set the description for this attribute.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Mark this attribute as sensitive.
    pub fn sensitive(mut self) -> Self {
        self.flags.sensitive = true;
        self
    }

    /// Classify this attribute as required, optional or read-only.
    ///
    /// `None` means the flags match no class; callers must escalate that to
    /// a [`BridgeError::SchemaDefect`] naming the attribute rather than
    /// defaulting.
    pub fn classify(&self) -> Option<Classification> {
        if self.flags.required {
            Some(Classification::Required)
        } else if self.flags.optional {
            Some(Classification::Optional)
        } else if self.flags.computed {
            Some(Classification::ReadOnly)
        } else {
            None
        }
    }

    /// The structural type of this attribute, from its declared type or its
    /// nested object type. `None` for malformed attributes carrying neither.
    pub fn implied_type(&self) -> Option<Type> {
        if let Some(ty) = &self.attr_type {
            Some(ty.clone())
        } else {
            self.nested_type.as_ref().map(NestedType::implied_type)
        }
    }

    fn is_read_only(&self) -> bool {
        self.flags.computed && !self.flags.optional && !self.flags.required
    }

    fn is_configurable(&self) -> bool {
        self.flags.required || self.flags.optional
    }
}

/// The nesting mode for a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NestingMode {
    /// A single nested block (at most one).
    #[default]
    Single,
    /// A list of nested blocks (zero or more, ordered).
    List,
    /// A set of nested blocks (zero or more, unordered, unique).
    Set,
    /// A map of nested blocks keyed by string.
    Map,
    /// Like single, but treated as always present with null contents.
    Group,
}

/// A nested object type carried by a protocol v6 attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedType {
    /// The attributes of the nested object.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Attribute>,
    /// How instances of the object repeat.
    #[serde(default)]
    pub nesting: NestingMode,
}

impl NestedType {
    /// Create a nested object type with the given nesting mode.
    pub fn new(nesting: NestingMode) -> Self {
        Self {
            attributes: BTreeMap::new(),
            nesting,
        }
    }

    /// Add an attribute to the nested object type.
    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.attributes.insert(name.into(), attr);
        self
    }

    /// The structural type implied by this nested object.
    pub fn implied_type(&self) -> Type {
        let mut attrs = BTreeMap::new();
        for (name, attr) in &self.attributes {
            if let Some(ty) = attr.implied_type() {
                attrs.insert(name.clone(), ty);
            }
        }
        let object = Type::Object(attrs);
        match self.nesting {
            NestingMode::Single | NestingMode::Group => object,
            NestingMode::List => Type::List(Box::new(object)),
            NestingMode::Set => Type::Set(Box::new(object)),
            NestingMode::Map => Type::Map(Box::new(object)),
        }
    }
}

/// A named group of attributes and nested blocks.
///
/// Attribute and nested-block names are disjoint namespaces within one
/// block. Both maps are ordered so that derived artifacts (implied types,
/// column lists) come out deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// The attributes within this block.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Attribute>,
    /// Nested blocks within this block.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub blocks: BTreeMap<String, NestedBlock>,
    /// Human-readable description of the block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Block {
    /// Create a new empty block.
    pub fn new() -> Self {
        Self {
            attributes: BTreeMap::new(),
            blocks: BTreeMap::new(),
            description: None,
        }
    }

    /// Add an attribute to this block.
    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.attributes.insert(name.into(), attr);
        self
    }

    /// Add a nested block to this block.
    pub fn with_block(mut self, name: impl Into<String>, block: NestedBlock) -> Self {
        self.blocks.insert(name.into(), block);
        self
    }

    /// Set the description for this block.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// True when the block has no attributes and no nested blocks.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.blocks.is_empty()
    }

    /// The object type used to encode configuration for this block and to
    /// decode state returned for it: one entry per attribute with its own
    /// type, one entry per nested block shaped by its nesting mode.
    /// Attributes with no usable type are left out.
    pub fn implied_type(&self) -> Type {
        let mut attrs = BTreeMap::new();
        for (name, attr) in &self.attributes {
            if let Some(ty) = attr.implied_type() {
                attrs.insert(name.clone(), ty);
            }
        }
        for (name, nested) in &self.blocks {
            attrs.insert(name.clone(), nested.implied_type());
        }
        Type::Object(attrs)
    }

    fn any_descendant_configurable(&self) -> bool {
        self.attributes.values().any(Attribute::is_configurable)
            || self
                .blocks
                .values()
                .any(|b| b.is_required() || b.is_optional())
    }

    fn all_descendants_read_only(&self) -> bool {
        self.attributes.values().all(Attribute::is_read_only)
            && self.blocks.values().all(NestedBlock::is_read_only)
    }
}

impl Default for Block {
    fn default() -> Self {
        Self::new()
    }
}

/// A nested block with its nesting mode and repetition bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedBlock {
    /// The block definition.
    #[serde(flatten)]
    pub block: Block,
    /// How the block is nested (single, list, set, map, group).
    #[serde(default)]
    pub nesting: NestingMode,
    /// Minimum number of blocks required.
    #[serde(default)]
    pub min_items: u64,
    /// Maximum number of blocks allowed (0 = unlimited).
    #[serde(default)]
    pub max_items: u64,
}

impl NestedBlock {
    /// Create a single nested block (0 or 1 allowed).
    pub fn single(block: Block) -> Self {
        Self {
            block,
            nesting: NestingMode::Single,
            min_items: 0,
            max_items: 1,
        }
    }

    /// Create a list of nested blocks.
    pub fn list(block: Block) -> Self {
        Self {
            block,
            nesting: NestingMode::List,
            min_items: 0,
            max_items: 0,
        }
    }

    /// Create a set of nested blocks.
    pub fn set(block: Block) -> Self {
        Self {
            block,
            nesting: NestingMode::Set,
            min_items: 0,
            max_items: 0,
        }
    }

    /// Create a map of nested blocks.
    pub fn map(block: Block) -> Self {
        Self {
            block,
            nesting: NestingMode::Map,
            min_items: 0,
            max_items: 0,
        }
    }

    /// Set the minimum number of blocks required.
    pub fn with_min_items(mut self, min: u64) -> Self {
        self.min_items = min;
        self
    }

    /// Set the maximum number of blocks allowed.
    pub fn with_max_items(mut self, max: u64) -> Self {
        self.max_items = max;
        self
    }

    /// Classify this block as required, optional or read-only.
    ///
    /// A block is required when its bounds demand at least one instance.
    /// It is optional when unbounded below and either empty or carrying any
    /// configurable descendant. It is read-only when unbounded in both
    /// directions and every descendant is read-only. `None` means none of
    /// the three apply; callers must escalate to a
    /// [`BridgeError::SchemaDefect`] naming the block.
    pub fn classify(&self) -> Option<Classification> {
        if self.is_required() {
            Some(Classification::Required)
        } else if self.is_optional() {
            Some(Classification::Optional)
        } else if self.is_read_only() {
            Some(Classification::ReadOnly)
        } else {
            None
        }
    }

    /// The structural type implied by this nested block.
    pub fn implied_type(&self) -> Type {
        let object = self.block.implied_type();
        match self.nesting {
            NestingMode::Single | NestingMode::Group => object,
            NestingMode::List => Type::List(Box::new(object)),
            NestingMode::Set => Type::Set(Box::new(object)),
            NestingMode::Map => Type::Map(Box::new(object)),
        }
    }

    fn is_required(&self) -> bool {
        self.min_items > 0
    }

    fn is_optional(&self) -> bool {
        if self.min_items > 0 {
            return false;
        }
        self.block.is_empty() || self.block.any_descendant_configurable()
    }

    fn is_read_only(&self) -> bool {
        if self.min_items != 0 || self.max_items != 0 {
            return false;
        }
        self.block.all_descendants_read_only()
    }
}

/// Schema for the provider configuration, a resource or a data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// The version of this schema.
    #[serde(default)]
    pub version: i64,
    /// The root block containing all attributes and nested blocks.
    #[serde(flatten)]
    pub block: Block,
}

impl Schema {
    /// Create a new schema with the given version.
    pub fn new(version: i64) -> Self {
        Self {
            version,
            block: Block::new(),
        }
    }

    /// Create a schema at version 0.
    pub fn v0() -> Self {
        Self::new(0)
    }

    /// Add an attribute to the schema's root block.
    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.block.attributes.insert(name.into(), attr);
        self
    }

    /// Add a nested block to the schema's root block.
    pub fn with_block(mut self, name: impl Into<String>, block: NestedBlock) -> Self {
        self.block.blocks.insert(name.into(), block);
        self
    }

    /// Set the description of the schema's root block.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.block.description = Some(description.into());
        self
    }

    /// The object type used to encode configuration against this schema.
    pub fn implied_type(&self) -> Type {
        self.block.implied_type()
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::v0()
    }
}

/// Optional behaviors a provider server reports alongside its schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ServerCapabilities {
    /// The provider wants to participate in destroy planning.
    pub plan_destroy: bool,
    /// Clients may skip the schema call when they have it cached.
    pub get_provider_schema_optional: bool,
}

/// Everything a provider reports about itself in one schema fetch.
///
/// When `diagnostics` contains errors the schema maps are left empty;
/// callers must check [`ProviderSchema::diagnostics`] before trusting the
/// rest (an empty data-source map is also what a provider without data
/// sources reports).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProviderSchema {
    /// Schema for the provider's own configuration.
    #[serde(default)]
    pub provider: Schema,
    /// Schema for provider metadata sent with each request, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_meta: Option<Schema>,
    /// Schemas for each managed resource type.
    #[serde(default)]
    pub resource_types: BTreeMap<String, Schema>,
    /// Schemas for each data source type.
    #[serde(default)]
    pub data_sources: BTreeMap<String, Schema>,
    /// Capability flags reported by the server.
    #[serde(default)]
    pub capabilities: ServerCapabilities,
    /// Diagnostics reported with the schema response.
    #[serde(default)]
    pub diagnostics: Diagnostics,
}

impl ProviderSchema {
    /// Create a new empty provider schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the provider configuration schema.
    pub fn with_provider_config(mut self, schema: Schema) -> Self {
        self.provider = schema;
        self
    }

    /// Add a resource schema.
    pub fn with_resource(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.resource_types.insert(name.into(), schema);
        self
    }

    /// Add a data source schema.
    pub fn with_data_source(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.data_sources.insert(name.into(), schema);
        self
    }

    /// Look up a data source schema by name.
    pub fn data_source(&self, name: &str) -> Result<&Schema, BridgeError> {
        self.data_sources
            .get(name)
            .ok_or_else(|| BridgeError::UnknownDataSource(name.to_string()))
    }
}

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    /// Severity missing or unrecognized on the wire.
    Invalid,
    /// An error that prevents the operation from completing.
    Error,
    /// A warning that doesn't prevent the operation but should be addressed.
    Warning,
}

/// A diagnostic message from the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The severity of the diagnostic.
    pub severity: DiagnosticSeverity,
    /// A short summary of the issue.
    pub summary: String,
    /// A detailed description of the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// The attribute path where the issue occurred, rendered dotted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Diagnostic {
    /// Create an error diagnostic.
    pub fn error(summary: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    /// Create a warning diagnostic.
    pub fn warning(summary: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    /// Add detail to this diagnostic.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Set the attribute path for this diagnostic.
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{}: {}", self.summary, detail),
            None => write!(f, "{}", self.summary),
        }
    }
}

/// An ordered list of diagnostics from one provider response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    /// Create an empty diagnostics list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a diagnostic.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.0.push(diagnostic);
    }

    /// True when any entry has error severity.
    pub fn has_errors(&self) -> bool {
        self.0
            .iter()
            .any(|d| d.severity == DiagnosticSeverity::Error)
    }

    /// Iterate over the warning-severity entries.
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0
            .iter()
            .filter(|d| d.severity == DiagnosticSeverity::Warning)
    }

    /// Escalate to an error when any entry has error severity; otherwise
    /// pass the list through for warning handling.
    pub fn check(self) -> Result<Self, BridgeError> {
        if self.has_errors() {
            Err(BridgeError::Diagnostics(self))
        } else {
            Ok(self)
        }
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Errors only when present, everything otherwise.
        let mut shown = 0;
        for diag in self
            .0
            .iter()
            .filter(|d| !self.has_errors() || d.severity == DiagnosticSeverity::Error)
        {
            if shown > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", diag)?;
            shown += 1;
        }
        if shown == 0 {
            write!(f, "no diagnostics")?;
        }
        Ok(())
    }
}

impl From<Vec<Diagnostic>> for Diagnostics {
    fn from(list: Vec<Diagnostic>) -> Self {
        Self(list)
    }
}

impl std::ops::Deref for Diagnostics {
    type Target = [Diagnostic];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_flags() {
        let required = AttributeFlags::required();
        assert!(required.required);
        assert!(!required.optional);
        assert!(!required.computed);

        let optional_computed = AttributeFlags::optional_computed();
        assert!(optional_computed.optional);
        assert!(optional_computed.computed);

        let sensitive = AttributeFlags::required().sensitive();
        assert!(sensitive.sensitive);
    }

    #[test]
    fn test_attribute_classification() {
        assert_eq!(
            Attribute::required_string().classify(),
            Some(Classification::Required)
        );
        assert_eq!(
            Attribute::optional_number().classify(),
            Some(Classification::Optional)
        );
        assert_eq!(
            Attribute::computed_string().classify(),
            Some(Classification::ReadOnly)
        );

        // Optional+computed counts as optional.
        let attr = Attribute::new(Type::String, AttributeFlags::optional_computed());
        assert_eq!(attr.classify(), Some(Classification::Optional));

        // No flags at all matches no class.
        let attr = Attribute::new(Type::String, AttributeFlags::default());
        assert_eq!(attr.classify(), None);
    }

    #[test]
    fn test_block_classification_required() {
        let nested = NestedBlock::list(
            Block::new().with_attribute("name", Attribute::optional_string()),
        )
        .with_min_items(1);
        assert_eq!(nested.classify(), Some(Classification::Required));
    }

    #[test]
    fn test_block_classification_empty_is_optional() {
        let nested = NestedBlock::list(Block::new());
        assert_eq!(nested.classify(), Some(Classification::Optional));
    }

    #[test]
    fn test_block_classification_optional_descendant() {
        let inner = NestedBlock::single(
            Block::new().with_attribute("enabled", Attribute::optional_bool()),
        );
        let nested = NestedBlock::set(Block::new().with_block("config", inner));
        assert_eq!(nested.classify(), Some(Classification::Optional));
    }

    #[test]
    fn test_block_classification_read_only() {
        let nested = NestedBlock::list(
            Block::new()
                .with_attribute("id", Attribute::computed_string())
                .with_attribute("created", Attribute::computed_string()),
        );
        assert_eq!(nested.classify(), Some(Classification::ReadOnly));
    }

    #[test]
    fn test_block_classification_defect() {
        // Bounded above, all descendants read-only: matches no class.
        let nested = NestedBlock::list(
            Block::new().with_attribute("id", Attribute::computed_string()),
        )
        .with_max_items(5);
        assert_eq!(nested.classify(), None);
    }

    #[test]
    fn test_classification_ranks() {
        assert_eq!(Classification::Required.rank(), 0);
        assert_eq!(Classification::Optional.rank(), 1);
        assert_eq!(Classification::ReadOnly.rank(), 2);
        assert_eq!(Classification::ReadOnly.to_string(), "readonly");
    }

    #[test]
    fn test_block_implied_type() {
        let schema = Schema::v0()
            .with_attribute("host", Attribute::required_string())
            .with_attribute(
                "addrs",
                Attribute::new(
                    Type::List(Box::new(Type::String)),
                    AttributeFlags::optional(),
                ),
            )
            .with_block(
                "options",
                NestedBlock::list(
                    Block::new().with_attribute("timeout", Attribute::optional_number()),
                ),
            );

        let expected = Type::Object(BTreeMap::from([
            ("host".to_string(), Type::String),
            ("addrs".to_string(), Type::List(Box::new(Type::String))),
            (
                "options".to_string(),
                Type::List(Box::new(Type::Object(BTreeMap::from([(
                    "timeout".to_string(),
                    Type::Number,
                )])))),
            ),
        ]));
        assert_eq!(schema.implied_type(), expected);
    }

    #[test]
    fn test_single_block_implied_type() {
        let nested = NestedBlock::single(
            Block::new().with_attribute("enabled", Attribute::optional_bool()),
        );
        assert_eq!(
            nested.implied_type(),
            Type::Object(BTreeMap::from([("enabled".to_string(), Type::Bool)]))
        );
    }

    #[test]
    fn test_nested_type_implied_type() {
        let nested = NestedType::new(NestingMode::List)
            .with_attribute("name", Attribute::required_string());
        assert_eq!(
            nested.implied_type(),
            Type::List(Box::new(Type::Object(BTreeMap::from([(
                "name".to_string(),
                Type::String
            )]))))
        );

        let attr = Attribute::nested(nested, AttributeFlags::optional());
        assert!(attr.attr_type.is_none());
        assert!(attr.implied_type().is_some());
    }

    #[test]
    fn test_untyped_attribute_left_out_of_implied_type() {
        let attr = Attribute {
            attr_type: None,
            nested_type: None,
            flags: AttributeFlags::optional(),
            description: None,
        };
        let schema = Schema::v0()
            .with_attribute("broken", attr)
            .with_attribute("host", Attribute::required_string());
        assert_eq!(
            schema.implied_type(),
            Type::Object(BTreeMap::from([("host".to_string(), Type::String)]))
        );
    }

    #[test]
    fn test_provider_schema_builder() {
        let schema = ProviderSchema::new()
            .with_provider_config(
                Schema::v0().with_attribute("api_key", Attribute::required_string().sensitive()),
            )
            .with_resource(
                "dns_record",
                Schema::v0().with_attribute("name", Attribute::required_string()),
            )
            .with_data_source(
                "dns_a_record_set",
                Schema::v0().with_attribute("host", Attribute::required_string()),
            );

        assert!(schema.provider.block.attributes.contains_key("api_key"));
        assert!(schema.resource_types.contains_key("dns_record"));
        assert!(schema.data_source("dns_a_record_set").is_ok());
        assert!(matches!(
            schema.data_source("missing"),
            Err(BridgeError::UnknownDataSource(_))
        ));
    }

    #[test]
    fn test_diagnostic_builders() {
        let err = Diagnostic::error("Invalid configuration")
            .with_detail("The value must be positive")
            .with_attribute("count");

        assert_eq!(err.severity, DiagnosticSeverity::Error);
        assert_eq!(err.summary, "Invalid configuration");
        assert_eq!(err.detail, Some("The value must be positive".to_string()));
        assert_eq!(err.attribute, Some("count".to_string()));
        assert_eq!(
            err.to_string(),
            "Invalid configuration: The value must be positive"
        );
    }

    #[test]
    fn test_diagnostics_check() {
        let warnings = Diagnostics::from(vec![Diagnostic::warning("deprecated")]);
        assert!(!warnings.has_errors());
        assert!(warnings.check().is_ok());

        let mut diags = Diagnostics::new();
        diags.push(Diagnostic::warning("deprecated"));
        diags.push(Diagnostic::error("broken"));
        assert!(diags.has_errors());
        assert_eq!(diags.warnings().count(), 1);
        match diags.check() {
            Err(BridgeError::Diagnostics(inner)) => assert_eq!(inner.len(), 2),
            other => panic!("expected diagnostics error, got {:?}", other),
        }
    }

    #[test]
    fn test_diagnostics_display_shows_errors_only() {
        let diags = Diagnostics::from(vec![
            Diagnostic::warning("minor"),
            Diagnostic::error("major"),
        ]);
        assert_eq!(diags.to_string(), "major");

        let diags = Diagnostics::from(vec![Diagnostic::warning("minor")]);
        assert_eq!(diags.to_string(), "minor");

        assert_eq!(Diagnostics::new().to_string(), "no diagnostics");
    }

    #[test]
    fn test_nested_block_modes() {
        let single = NestedBlock::single(Block::new());
        assert_eq!(single.nesting, NestingMode::Single);
        assert_eq!(single.max_items, 1);

        let list = NestedBlock::list(Block::new())
            .with_min_items(1)
            .with_max_items(5);
        assert_eq!(list.nesting, NestingMode::List);
        assert_eq!(list.min_items, 1);
        assert_eq!(list.max_items, 5);
    }
}
