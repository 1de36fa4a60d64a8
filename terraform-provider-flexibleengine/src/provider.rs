//! Terraform Provider Implementation
//!
//! Implements the JSON-RPC plugin protocol for FlexibleEngine.

use crate::config::{Config, ProviderConfig};
use crate::data_sources::{get_all_data_sources, DataSource};
use crate::plan::validate_config;
use crate::resources::{get_all_resources, Resource, ResourceState};
use crate::schema::{
    AttributeType, Diagnostic, ProviderSchema, RpcRequest, RpcResponse, SchemaAttribute,
    SchemaBlock,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::runtime::Runtime;

/// FlexibleEngine Terraform Provider
pub struct FlexibleEngineProvider {
    config: Arc<RwLock<Option<Config>>>,
    resources: HashMap<String, Box<dyn Resource>>,
    data_sources: HashMap<String, Box<dyn DataSource>>,
    runtime: Runtime,
}

/// Read a state object parameter; `null` or absent yields `None`
fn state_param(params: &Value, key: &str) -> Option<ResourceState> {
    params
        .get(key)
        .filter(|v| v.is_object())
        .map(ResourceState::from_value)
}

fn str_param<'a>(params: &'a Value, key: &str) -> &'a str {
    params.get(key).and_then(|v| v.as_str()).unwrap_or("")
}

fn unknown(id: i64, kind: &str, type_name: &str) -> RpcResponse {
    RpcResponse::diagnostics(
        id,
        &[Diagnostic::error(&format!("Unknown {} type: {}", kind, type_name))],
    )
}

impl FlexibleEngineProvider {
    /// Create a new provider
    pub fn new() -> std::io::Result<Self> {
        let resources: HashMap<String, Box<dyn Resource>> = get_all_resources()
            .into_iter()
            .map(|r| (r.type_name().to_string(), r))
            .collect();
        let data_sources: HashMap<String, Box<dyn DataSource>> = get_all_data_sources()
            .into_iter()
            .map(|d| (d.type_name().to_string(), d))
            .collect();

        Ok(Self {
            config: Arc::new(RwLock::new(None)),
            resources,
            data_sources,
            runtime: Runtime::new()?,
        })
    }

    /// Get provider schema
    fn get_schema(&self) -> ProviderSchema {
        let provider_block = SchemaBlock::new()
            .with_attribute(
                "region",
                SchemaAttribute::string()
                    .with_description("Region to manage resources in (OS_REGION_NAME)")
                    .optional(),
            )
            .with_attribute(
                "access_key",
                SchemaAttribute::string()
                    .with_description("Access key (OS_ACCESS_KEY)")
                    .optional()
                    .sensitive(),
            )
            .with_attribute(
                "secret_key",
                SchemaAttribute::string()
                    .with_description("Secret key (OS_SECRET_KEY)")
                    .optional()
                    .sensitive(),
            )
            .with_attribute(
                "security_token",
                SchemaAttribute::string()
                    .with_description("Security token for temporary credentials (OS_SECURITY_TOKEN)")
                    .optional()
                    .sensitive(),
            )
            .with_attribute(
                "project_id",
                SchemaAttribute::string()
                    .with_description("Project ID (OS_PROJECT_ID); looked up by name when unset")
                    .optional(),
            )
            .with_attribute(
                "project_name",
                SchemaAttribute::string()
                    .with_description("Project name (OS_PROJECT_NAME); defaults to the region")
                    .optional(),
            )
            .with_attribute(
                "auth_url",
                SchemaAttribute::string()
                    .with_description("Identity endpoint (OS_AUTH_URL)")
                    .optional(),
            )
            .with_attribute(
                "cloud",
                SchemaAttribute::string()
                    .with_description("Endpoint domain suffix")
                    .optional(),
            )
            .with_attribute(
                "insecure",
                SchemaAttribute::bool()
                    .with_description("Skip TLS verification (OS_INSECURE)")
                    .optional(),
            )
            .with_attribute(
                "endpoints",
                SchemaAttribute::map(AttributeType::String)
                    .with_description("Per-service endpoint overrides")
                    .optional(),
            )
            .with_description("FlexibleEngine cloud provider");

        let mut schema = ProviderSchema::new(provider_block);
        for (name, resource) in &self.resources {
            schema = schema.with_resource(name, resource.schema());
        }
        for (name, data_source) in &self.data_sources {
            schema = schema.with_data_source(name, data_source.schema());
        }
        schema
    }

    /// Configure the provider from an already merged provider block
    pub fn configure(&self, provider: ProviderConfig) -> Vec<Diagnostic> {
        let config = match self.runtime.block_on(Config::load(provider)) {
            Ok(config) => config,
            Err(e) => return vec![Diagnostic::error(&format!("Invalid provider configuration: {}", e))],
        };

        match self.config.write() {
            Ok(mut guard) => {
                *guard = Some(config);
                Vec::new()
            }
            Err(_) => vec![Diagnostic::error("Provider configuration lock poisoned")],
        }
    }

    /// Get the configured provider
    fn get_config(&self) -> Result<Config, Diagnostic> {
        self.config
            .read()
            .map_err(|_| Diagnostic::error("Provider configuration lock poisoned"))?
            .clone()
            .ok_or_else(|| Diagnostic::error("Provider not configured"))
    }

    /// Handle an RPC request
    pub fn handle_request(&self, input: &str) -> String {
        let request: RpcRequest = match serde_json::from_str(input) {
            Ok(r) => r,
            Err(e) => {
                return serde_json::to_string(&RpcResponse::error(
                    0,
                    -32700,
                    &format!("Parse error: {}", e),
                ))
                .unwrap_or_default();
            }
        };

        tracing::debug!(id = request.id, method = %request.method, "handling request");

        let response = match request.method.as_str() {
            "GetProviderSchema" => self.handle_get_schema(request.id),
            "ConfigureProvider" => self.handle_configure(request.id, &request.params),
            "ValidateResourceConfig" => {
                self.handle_validate_resource(request.id, &request.params)
            }
            "ValidateDataSourceConfig" => {
                self.handle_validate_data_source(request.id, &request.params)
            }
            "PlanResourceChange" => self.handle_plan_resource(request.id, &request.params),
            "ApplyResourceChange" => self.handle_apply_resource(request.id, &request.params),
            "ReadResource" => self.handle_read_resource(request.id, &request.params),
            "ImportResourceState" => self.handle_import_resource(request.id, &request.params),
            "ReadDataSource" => self.handle_read_data_source(request.id, &request.params),
            "StopProvider" => RpcResponse::success(request.id, json!({})),
            _ => RpcResponse::error(
                request.id,
                -32601,
                &format!("Method not found: {}", request.method),
            ),
        };

        serde_json::to_string(&response).unwrap_or_else(|e| {
            serde_json::to_string(&RpcResponse::error(
                request.id,
                -32603,
                &format!("Serialization error: {}", e),
            ))
            .unwrap_or_default()
        })
    }

    /// Handle GetProviderSchema
    fn handle_get_schema(&self, id: i64) -> RpcResponse {
        let schema = self.get_schema();
        RpcResponse::success(id, serde_json::to_value(schema).unwrap_or_default())
    }

    /// Handle ConfigureProvider
    fn handle_configure(&self, id: i64, params: &Value) -> RpcResponse {
        let provider: ProviderConfig = match params.get("config").filter(|c| !c.is_null()) {
            Some(c) => match serde_json::from_value(c.clone()) {
                Ok(p) => p,
                Err(e) => {
                    return RpcResponse::diagnostics(
                        id,
                        &[Diagnostic::error(&format!("Invalid provider block: {}", e))],
                    )
                }
            },
            None => ProviderConfig::default(),
        };

        let diagnostics = self.configure(provider.merge_env());
        RpcResponse::diagnostics(id, &diagnostics)
    }

    /// Handle ValidateResourceConfig
    fn handle_validate_resource(&self, id: i64, params: &Value) -> RpcResponse {
        let type_name = str_param(params, "type_name");
        let Some(resource) = self.resources.get(type_name) else {
            return unknown(id, "resource", type_name);
        };

        let config = state_param(params, "config").unwrap_or_default();
        let diagnostics = validate_config(&resource.schema().block, &config);
        RpcResponse::diagnostics(id, &diagnostics)
    }

    /// Handle ValidateDataSourceConfig
    fn handle_validate_data_source(&self, id: i64, params: &Value) -> RpcResponse {
        let type_name = str_param(params, "type_name");
        let Some(data_source) = self.data_sources.get(type_name) else {
            return unknown(id, "data source", type_name);
        };

        let config = state_param(params, "config").unwrap_or_default();
        let diagnostics = validate_config(&data_source.schema().block, &config);
        RpcResponse::diagnostics(id, &diagnostics)
    }

    /// Handle PlanResourceChange
    fn handle_plan_resource(&self, id: i64, params: &Value) -> RpcResponse {
        let type_name = str_param(params, "type_name");
        let Some(resource) = self.resources.get(type_name) else {
            return unknown(id, "resource", type_name);
        };

        let prior_state = state_param(params, "prior_state");
        let Some(proposed_state) = state_param(params, "proposed_new_state") else {
            // Destroy plan
            return RpcResponse::success(id, json!({ "planned_state": null, "diagnostics": [] }));
        };

        match resource.plan_change(prior_state.as_ref(), &proposed_state) {
            Ok(planned) => RpcResponse::success(
                id,
                json!({
                    "planned_state": planned.state.values,
                    "requires_replace": planned.requires_replace,
                    "diagnostics": []
                }),
            ),
            Err(diagnostics) => RpcResponse::diagnostics(id, &diagnostics),
        }
    }

    /// Handle ApplyResourceChange
    fn handle_apply_resource(&self, id: i64, params: &Value) -> RpcResponse {
        let type_name = str_param(params, "type_name");
        let Some(resource) = self.resources.get(type_name) else {
            return unknown(id, "resource", type_name);
        };

        let config = match self.get_config() {
            Ok(c) => c,
            Err(diag) => return RpcResponse::diagnostics(id, &[diag]),
        };

        let prior_state = state_param(params, "prior_state");
        let planned_state = state_param(params, "planned_state");

        let result = self.runtime.block_on(async {
            match (prior_state, planned_state) {
                (Some(prior), None) => resource.delete(&config, &prior).await.map(|_| None),
                (None, None) => Ok(None),
                (None, Some(planned)) => resource.create(&config, &planned).await.map(Some),
                (Some(prior), Some(planned)) => {
                    resource.update(&config, &prior, &planned).await.map(Some)
                }
            }
        });

        match result {
            Ok(new_state) => RpcResponse::success(
                id,
                json!({
                    "new_state": new_state.map(|s| s.to_value()),
                    "diagnostics": []
                }),
            ),
            Err(diagnostics) => RpcResponse::diagnostics(id, &diagnostics),
        }
    }

    /// Handle ReadResource
    fn handle_read_resource(&self, id: i64, params: &Value) -> RpcResponse {
        let type_name = str_param(params, "type_name");
        let Some(resource) = self.resources.get(type_name) else {
            return unknown(id, "resource", type_name);
        };

        let config = match self.get_config() {
            Ok(c) => c,
            Err(diag) => return RpcResponse::diagnostics(id, &[diag]),
        };

        let current_state = state_param(params, "current_state").unwrap_or_default();
        let result = self
            .runtime
            .block_on(async { resource.read(&config, &current_state).await });

        match result {
            // Resource no longer exists
            Ok(state) if state.is_empty() => {
                RpcResponse::success(id, json!({ "new_state": null, "diagnostics": [] }))
            }
            Ok(state) => RpcResponse::success(
                id,
                json!({ "new_state": state.values, "diagnostics": [] }),
            ),
            Err(diagnostics) => RpcResponse::diagnostics(id, &diagnostics),
        }
    }

    /// Handle ImportResourceState
    fn handle_import_resource(&self, id: i64, params: &Value) -> RpcResponse {
        let type_name = str_param(params, "type_name");
        let resource_id = str_param(params, "id");
        let Some(resource) = self.resources.get(type_name) else {
            return unknown(id, "resource", type_name);
        };

        let config = match self.get_config() {
            Ok(c) => c,
            Err(diag) => return RpcResponse::diagnostics(id, &[diag]),
        };

        let import_state = match resource.import_state(resource_id) {
            Ok(s) => s,
            Err(diagnostics) => return RpcResponse::diagnostics(id, &diagnostics),
        };

        let result = self
            .runtime
            .block_on(async { resource.read(&config, &import_state).await });

        match result {
            Ok(state) if state.is_empty() => RpcResponse::diagnostics(
                id,
                &[Diagnostic::error(&format!(
                    "Cannot import non-existent remote object {}",
                    resource_id
                ))],
            ),
            Ok(state) => RpcResponse::success(
                id,
                json!({
                    "imported_resources": [{
                        "type_name": type_name,
                        "state": state.values
                    }],
                    "diagnostics": []
                }),
            ),
            Err(diagnostics) => RpcResponse::diagnostics(id, &diagnostics),
        }
    }

    /// Handle ReadDataSource
    fn handle_read_data_source(&self, id: i64, params: &Value) -> RpcResponse {
        let type_name = str_param(params, "type_name");
        let Some(data_source) = self.data_sources.get(type_name) else {
            return unknown(id, "data source", type_name);
        };

        let config = match self.get_config() {
            Ok(c) => c,
            Err(diag) => return RpcResponse::diagnostics(id, &[diag]),
        };

        let query = state_param(params, "config").unwrap_or_default();
        let result = self
            .runtime
            .block_on(async { data_source.read(&config, &query).await });

        match result {
            Ok(state) => RpcResponse::success(
                id,
                json!({ "state": state.values, "diagnostics": [] }),
            ),
            Err(diagnostics) => RpcResponse::diagnostics(id, &diagnostics),
        }
    }
}
