//! Terraform Resources for FlexibleEngine
//!
//! Defines the resources that can be managed via Terraform. Each submodule
//! binds one resource type to its service API.

mod dcs_backup;
mod dcs_instance;
mod nat_gateway;
mod rds_instance;
mod secgroup;
mod secgroup_rule;
mod swr_organization;
mod swr_repository;
mod vpc;
mod vpc_subnet;

pub use dcs_backup::DcsBackupResource;
pub use dcs_instance::DcsInstanceResource;
pub use nat_gateway::NatGatewayResource;
pub use rds_instance::RdsInstanceResource;
pub use secgroup::SecGroupResource;
pub use secgroup_rule::SecGroupRuleResource;
pub use swr_organization::SwrOrganizationResource;
pub use swr_repository::SwrRepositoryResource;
pub use vpc::VpcResource;
pub use vpc_subnet::VpcSubnetResource;

use crate::config::Config;
use crate::plan::{plan_resource_change, PlannedChange};
use crate::schema::{Diagnostic, ResourceSchema};
use async_trait::async_trait;
use flexibleengine_sdk::ClientError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Result type for resource operations
pub type ResourceResult<T> = Result<T, Vec<Diagnostic>>;

/// Resource state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    pub values: HashMap<String, Value>,
}

impl ResourceState {
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// Build from a JSON object; anything else yields an empty state
    pub fn from_value(value: &Value) -> Self {
        let values = value
            .as_object()
            .map(|obj| obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        Self { values }
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.values.clone().into_iter().collect())
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// String value; empty strings count as unset
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.values
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(String::from)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.values.get(key).and_then(|v| {
            v.as_i64()
                .or_else(|| v.as_f64().map(|f| f as i64))
                .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
        })
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get_i64(key).and_then(|v| u64::try_from(v).ok())
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.values.get(key).and_then(|v| v.as_f64())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.values.get(key).and_then(|v| v.as_bool())
    }

    pub fn get_string_list(&self, key: &str) -> Vec<String> {
        self.values
            .get(key)
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn get_string_map(&self, key: &str) -> HashMap<String, String> {
        self.values
            .get(key)
            .and_then(|v| v.as_object())
            .map(|obj| {
                obj.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// First element of a list block
    pub fn get_block(&self, key: &str) -> Option<ResourceState> {
        self.values
            .get(key)
            .and_then(|v| v.as_array())
            .and_then(|arr| arr.first())
            .map(ResourceState::from_value)
    }

    /// Required string attribute
    pub fn require_string(&self, key: &str) -> ResourceResult<String> {
        self.get_string(key)
            .ok_or_else(|| vec![Diagnostic::error(&format!("\"{}\" is required", key))])
    }

    /// Resource ID
    pub fn id(&self) -> ResourceResult<String> {
        self.get_string("id")
            .ok_or_else(|| vec![Diagnostic::error("Resource ID is required")])
    }

    pub fn set(&mut self, key: &str, value: Value) {
        self.values.insert(key.to_string(), value);
    }

    /// Store a single-item list block
    pub fn set_block(&mut self, key: &str, block: ResourceState) {
        self.set(key, Value::Array(vec![block.to_value()]));
    }

    /// Copy attributes the API never returns from a previous state
    pub fn carry_over(&mut self, previous: &ResourceState, keys: &[&str]) {
        for key in keys {
            if let Some(value) = previous.get(key) {
                self.values.insert(key.to_string(), value.clone());
            }
        }
    }
}

impl Default for ResourceState {
    fn default() -> Self {
        Self::new()
    }
}

/// Operation timeouts from the `timeouts {}` block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub create: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Timeouts {
    pub const fn minutes(create: u64, update: u64, delete: u64) -> Self {
        Self {
            create: Duration::from_secs(create * 60),
            update: Duration::from_secs(update * 60),
            delete: Duration::from_secs(delete * 60),
        }
    }

    /// Read the `timeouts` block, falling back to `defaults` per operation
    pub fn from_state(state: &ResourceState, defaults: Timeouts) -> ResourceResult<Self> {
        let Some(block) = state.get_block("timeouts") else {
            return Ok(defaults);
        };

        let parse = |op: &str, default: Duration| -> ResourceResult<Duration> {
            match block.get_string(op) {
                Some(raw) => humantime::parse_duration(&raw).map_err(|e| {
                    vec![Diagnostic::error(&format!("Invalid {} timeout \"{}\": {}", op, raw, e))]
                }),
                None => Ok(default),
            }
        };

        Ok(Self {
            create: parse("create", defaults.create)?,
            update: parse("update", defaults.update)?,
            delete: parse("delete", defaults.delete)?,
        })
    }
}

/// Wrap an SDK error with a one-line context
pub fn sdk_error(context: &str, err: ClientError) -> Vec<Diagnostic> {
    vec![Diagnostic::error(&format!("{}: {}", context, err))]
}

/// Resource trait
#[async_trait]
pub trait Resource: Send + Sync {
    /// Resource type name
    fn type_name(&self) -> &str;

    /// Get the schema for this resource
    fn schema(&self) -> ResourceSchema;

    /// Create a new resource
    async fn create(&self, config: &Config, planned: &ResourceState)
        -> ResourceResult<ResourceState>;

    /// Read an existing resource. An empty state means it no longer exists.
    async fn read(&self, config: &Config, current: &ResourceState)
        -> ResourceResult<ResourceState>;

    /// Update an existing resource
    async fn update(
        &self,
        config: &Config,
        current: &ResourceState,
        planned: &ResourceState,
    ) -> ResourceResult<ResourceState>;

    /// Delete a resource
    async fn delete(&self, config: &Config, current: &ResourceState) -> ResourceResult<()>;

    /// Plan changes
    fn plan_change(
        &self,
        current: Option<&ResourceState>,
        proposed: &ResourceState,
    ) -> ResourceResult<PlannedChange> {
        Ok(plan_resource_change(&self.schema().block, current, proposed))
    }

    /// State to read from when importing `id`
    fn import_state(&self, id: &str) -> ResourceResult<ResourceState> {
        let mut state = ResourceState::new();
        state.set("id", Value::String(id.to_string()));
        Ok(state)
    }
}

/// Split a `<parent>/<child>` import ID
pub fn split_composite_id(id: &str, what: &str) -> ResourceResult<(String, String)> {
    match id.split_once('/') {
        Some((parent, child)) if !parent.is_empty() && !child.is_empty() => {
            Ok((parent.to_string(), child.to_string()))
        }
        _ => Err(vec![Diagnostic::error(&format!(
            "Invalid ID \"{}\", expected <{}>",
            id, what
        ))]),
    }
}

/// Get all available resources
pub fn get_all_resources() -> Vec<Box<dyn Resource>> {
    vec![
        Box::new(VpcResource::new()),
        Box::new(VpcSubnetResource::new()),
        Box::new(SecGroupResource::new()),
        Box::new(SecGroupRuleResource::new()),
        Box::new(NatGatewayResource::new()),
        Box::new(RdsInstanceResource::new()),
        Box::new(DcsInstanceResource::new()),
        Box::new(DcsBackupResource::new()),
        Box::new(SwrOrganizationResource::new()),
        Box::new(SwrRepositoryResource::new()),
    ]
}
