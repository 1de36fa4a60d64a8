//! Schema and wire types
//!
//! Describes the arguments of every FlexibleEngine resource and data source,
//! plus the JSON-RPC envelopes and diagnostics Terraform core exchanges with
//! the plugin.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Value type of a schema attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    String,
    Number,
    Bool,
    List(Box<AttributeType>),
    Map(Box<AttributeType>),
    /// Fixed set of named fields, as returned by data sources
    Object(HashMap<String, AttributeType>),
}

/// A single argument or exported attribute
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaAttribute {
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub optional: bool,
    /// Filled in by the cloud when left unset
    #[serde(default)]
    pub computed: bool,
    #[serde(default)]
    pub sensitive: bool,
    /// Changing the value replaces the remote object
    #[serde(default)]
    pub force_new: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

impl SchemaAttribute {
    fn typed(attr_type: AttributeType) -> Self {
        Self {
            attr_type,
            description: None,
            required: false,
            optional: false,
            computed: false,
            sensitive: false,
            force_new: false,
            default: None,
        }
    }

    pub fn string() -> Self {
        Self::typed(AttributeType::String)
    }

    pub fn number() -> Self {
        Self::typed(AttributeType::Number)
    }

    pub fn bool() -> Self {
        Self::typed(AttributeType::Bool)
    }

    pub fn list(element: AttributeType) -> Self {
        Self::typed(AttributeType::List(Box::new(element)))
    }

    pub fn map(element: AttributeType) -> Self {
        Self::typed(AttributeType::Map(Box::new(element)))
    }

    /// Must be present in configuration
    pub fn required(self) -> Self {
        Self {
            required: true,
            optional: false,
            ..self
        }
    }

    pub fn optional(self) -> Self {
        Self {
            required: false,
            optional: true,
            ..self
        }
    }

    pub fn computed(self) -> Self {
        Self {
            computed: true,
            ..self
        }
    }

    /// Redacted from plan output
    pub fn sensitive(self) -> Self {
        Self {
            sensitive: true,
            ..self
        }
    }

    pub fn force_new(self) -> Self {
        Self {
            force_new: true,
            ..self
        }
    }

    /// Value planned when the argument is omitted
    pub fn with_default(self, value: serde_json::Value) -> Self {
        Self {
            default: Some(value),
            ..self
        }
    }

    pub fn with_description(self, text: &str) -> Self {
        Self {
            description: Some(text.to_string()),
            ..self
        }
    }
}

/// Attributes and nested blocks of a resource, data source or the provider itself
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaBlock {
    pub attributes: BTreeMap<String, SchemaAttribute>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub blocks: BTreeMap<String, NestedBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl SchemaBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attribute(mut self, name: &str, attribute: SchemaAttribute) -> Self {
        self.attributes.insert(name.to_string(), attribute);
        self
    }

    pub fn with_block(mut self, name: &str, nested: NestedBlock) -> Self {
        self.blocks.insert(name.to_string(), nested);
        self
    }

    pub fn with_description(mut self, text: &str) -> Self {
        self.description = Some(text.to_string());
        self
    }

    /// Adds a `timeouts` block holding one duration per listed operation
    pub fn with_timeouts(self, operations: &[&str]) -> Self {
        let mut timeouts = SchemaBlock::new();
        for op in operations {
            timeouts = timeouts.with_attribute(
                op,
                SchemaAttribute::string()
                    .optional()
                    .with_description(&format!("How long to wait for {} (e.g. 30m)", op)),
            );
        }
        self.with_block("timeouts", NestedBlock::list(timeouts).max_items(1))
    }
}

/// How repeated nested blocks are collected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NestingMode {
    Single,
    List,
}

/// A repeatable block such as `db {}` or `backup_policy {}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NestedBlock {
    pub nesting_mode: NestingMode,
    pub block: SchemaBlock,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_items: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<i64>,
    /// Any change inside the block replaces the remote object
    #[serde(default)]
    pub force_new: bool,
}

impl NestedBlock {
    pub fn list(block: SchemaBlock) -> Self {
        Self {
            nesting_mode: NestingMode::List,
            block,
            min_items: None,
            max_items: None,
            force_new: false,
        }
    }

    pub fn min_items(self, n: i64) -> Self {
        Self {
            min_items: Some(n),
            ..self
        }
    }

    pub fn max_items(self, n: i64) -> Self {
        Self {
            max_items: Some(n),
            ..self
        }
    }

    pub fn force_new(self) -> Self {
        Self {
            force_new: true,
            ..self
        }
    }
}

/// Versioned schema of one resource type or data source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSchema {
    pub version: i64,
    pub block: SchemaBlock,
}

impl ResourceSchema {
    pub fn new(version: i64, block: SchemaBlock) -> Self {
        Self { version, block }
    }
}

/// Everything returned by `GetProviderSchema`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSchema {
    pub provider: SchemaBlock,
    pub resource_schemas: BTreeMap<String, ResourceSchema>,
    pub data_source_schemas: BTreeMap<String, ResourceSchema>,
}

impl ProviderSchema {
    pub fn new(provider: SchemaBlock) -> Self {
        Self {
            provider,
            resource_schemas: BTreeMap::new(),
            data_source_schemas: BTreeMap::new(),
        }
    }

    pub fn with_resource(mut self, type_name: &str, schema: ResourceSchema) -> Self {
        self.resource_schemas.insert(type_name.to_string(), schema);
        self
    }

    pub fn with_data_source(mut self, type_name: &str, schema: ResourceSchema) -> Self {
        self.data_source_schemas.insert(type_name.to_string(), schema);
        self
    }
}

// ----------------------------------------------------------------------------
// JSON-RPC envelopes
// ----------------------------------------------------------------------------

const JSONRPC_VERSION: &str = "2.0";

#[derive(Debug, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub id: i64,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

impl RpcRequest {
    pub fn new(id: i64, method: &str, params: serde_json::Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.to_string(),
            params,
        }
    }
}

/// Transport-level failure (unparseable request, unknown method)
#[derive(Debug, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

/// Exactly one of `result` or `error` is set
#[derive(Debug, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    pub fn success(id: i64, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: i64, code: i32, message: &str) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.to_string(),
            }),
        }
    }

    /// Successful envelope whose result is only a diagnostics list
    pub fn diagnostics(id: i64, diagnostics: &[Diagnostic]) -> Self {
        Self::success(id, serde_json::json!({ "diagnostics": diagnostics }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
}

/// User-facing problem attached to an operation result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Path of the offending argument, e.g. `["backup_policy", "0", "backup_at"]`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<Vec<String>>,
}

impl Diagnostic {
    pub fn error(summary: &str) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            summary: summary.to_string(),
            detail: None,
            attribute: None,
        }
    }

    pub fn with_detail(mut self, detail: &str) -> Self {
        self.detail = Some(detail.to_string());
        self
    }

    pub fn with_attribute(mut self, path: Vec<String>) -> Self {
        self.attribute = Some(path);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}
