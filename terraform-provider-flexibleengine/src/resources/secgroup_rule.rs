//! `flexibleengine_networking_secgroup_rule_v2`
//!
//! Rules are immutable: every argument forces a new rule.

use super::{sdk_error, Resource, ResourceResult, ResourceState};
use crate::config::Config;
use crate::schema::{Diagnostic, ResourceSchema, SchemaAttribute, SchemaBlock};
use async_trait::async_trait;
use flexibleengine_sdk::services::networking;
use serde_json::json;

const DIRECTIONS: &[&str] = &["ingress", "egress"];
const ETHERTYPES: &[&str] = &["IPv4", "IPv6"];

pub struct SecGroupRuleResource;

impl SecGroupRuleResource {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SecGroupRuleResource {
    fn default() -> Self {
        Self::new()
    }
}

fn one_of(state: &ResourceState, key: &str, allowed: &[&str]) -> ResourceResult<String> {
    let value = state.require_string(key)?;
    if allowed.contains(&value.as_str()) {
        Ok(value)
    } else {
        Err(vec![Diagnostic::error(&format!(
            "Invalid {} \"{}\", expected one of: {}",
            key,
            value,
            allowed.join(", ")
        ))
        .with_attribute(vec![key.to_string()])])
    }
}

fn rule_state(rule: &networking::SecGroupRule) -> ResourceState {
    let mut state = ResourceState::new();
    state.set("id", json!(rule.id));
    state.set("direction", json!(rule.direction));
    state.set("ethertype", json!(rule.ethertype));
    state.set("security_group_id", json!(rule.security_group_id));
    state.set("protocol", json!(rule.protocol.clone().unwrap_or_default()));
    state.set("port_range_min", json!(rule.port_range_min.unwrap_or(0)));
    state.set("port_range_max", json!(rule.port_range_max.unwrap_or(0)));
    state.set(
        "remote_ip_prefix",
        json!(rule.remote_ip_prefix.clone().unwrap_or_default()),
    );
    state.set(
        "remote_group_id",
        json!(rule.remote_group_id.clone().unwrap_or_default()),
    );
    state.set("description", json!(rule.description.clone().unwrap_or_default()));
    state.set("tenant_id", json!(rule.tenant_id.clone().unwrap_or_default()));
    state
}

#[async_trait]
impl Resource for SecGroupRuleResource {
    fn type_name(&self) -> &str {
        "flexibleengine_networking_secgroup_rule_v2"
    }

    fn schema(&self) -> ResourceSchema {
        let block = SchemaBlock::new()
            .with_attribute(
                "direction",
                SchemaAttribute::string()
                    .with_description("ingress or egress")
                    .required()
                    .force_new(),
            )
            .with_attribute(
                "ethertype",
                SchemaAttribute::string()
                    .with_description("IPv4 or IPv6")
                    .required()
                    .force_new(),
            )
            .with_attribute(
                "security_group_id",
                SchemaAttribute::string().required().force_new(),
            )
            .with_attribute(
                "protocol",
                SchemaAttribute::string().optional().computed().force_new(),
            )
            .with_attribute(
                "port_range_min",
                SchemaAttribute::number().optional().computed().force_new(),
            )
            .with_attribute(
                "port_range_max",
                SchemaAttribute::number().optional().computed().force_new(),
            )
            .with_attribute(
                "remote_ip_prefix",
                SchemaAttribute::string().optional().computed().force_new(),
            )
            .with_attribute(
                "remote_group_id",
                SchemaAttribute::string().optional().computed().force_new(),
            )
            .with_attribute(
                "description",
                SchemaAttribute::string().optional().computed().force_new(),
            )
            .with_attribute("tenant_id", SchemaAttribute::string().computed())
            .with_description("Manages a security group rule");

        ResourceSchema::new(1, block)
    }

    async fn create(
        &self,
        config: &Config,
        planned: &ResourceState,
    ) -> ResourceResult<ResourceState> {
        let port_min = planned.get_i64("port_range_min").filter(|p| *p != 0);
        let port_max = planned.get_i64("port_range_max").filter(|p| *p != 0);
        if let (Some(min), Some(max)) = (port_min, port_max) {
            if min > max {
                return Err(vec![Diagnostic::error(&format!(
                    "port_range_min ({}) must not exceed port_range_max ({})",
                    min, max
                ))]);
            }
        }

        let opts = networking::CreateRuleOpts {
            direction: one_of(planned, "direction", DIRECTIONS)?,
            ethertype: one_of(planned, "ethertype", ETHERTYPES)?,
            security_group_id: planned.require_string("security_group_id")?,
            protocol: planned.get_string("protocol"),
            port_range_min: port_min,
            port_range_max: port_max,
            remote_ip_prefix: planned.get_string("remote_ip_prefix"),
            remote_group_id: planned.get_string("remote_group_id"),
            description: planned.get_string("description"),
        };

        let rule = networking::create_rule(&config.networking_v2_client(), &opts)
            .await
            .map_err(|e| sdk_error("Error creating security group rule", e))?;
        tracing::info!(id = %rule.id, security_group_id = %rule.security_group_id, "security group rule created");

        Ok(rule_state(&rule))
    }

    async fn read(
        &self,
        config: &Config,
        current: &ResourceState,
    ) -> ResourceResult<ResourceState> {
        let id = current.id()?;

        match networking::get_rule(&config.networking_v2_client(), &id).await {
            Ok(rule) => Ok(rule_state(&rule)),
            Err(e) if e.is_not_found() => {
                tracing::warn!(id = %id, "security group rule not found, removing from state");
                Ok(ResourceState::new())
            }
            Err(e) => Err(sdk_error("Error retrieving security group rule", e)),
        }
    }

    async fn update(
        &self,
        _config: &Config,
        _current: &ResourceState,
        _planned: &ResourceState,
    ) -> ResourceResult<ResourceState> {
        Err(vec![Diagnostic::error(
            "Security group rules cannot be updated in place",
        )])
    }

    async fn delete(&self, config: &Config, current: &ResourceState) -> ResourceResult<()> {
        let id = current.id()?;

        match networking::delete_rule(&config.networking_v2_client(), &id).await {
            Ok(()) => {
                tracing::info!(id = %id, "security group rule deleted");
                Ok(())
            }
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(sdk_error("Error deleting security group rule", e)),
        }
    }
}
