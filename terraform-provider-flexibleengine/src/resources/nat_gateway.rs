//! `flexibleengine_nat_gateway_v2`

use super::{sdk_error, Resource, ResourceResult, ResourceState, Timeouts};
use crate::config::Config;
use crate::schema::{Diagnostic, ResourceSchema, SchemaAttribute, SchemaBlock};
use async_trait::async_trait;
use flexibleengine_sdk::services::nat;
use flexibleengine_sdk::wait::deleted_on_not_found;
use flexibleengine_sdk::{ServiceClient, StateChangeConf, STATE_DELETED};
use serde_json::json;
use std::time::Duration;

const DEFAULT_TIMEOUTS: Timeouts = Timeouts::minutes(10, 10, 10);

/// Gateway sizes: 1 small, 2 medium, 3 large, 4 extra-large
const SPECS: &[&str] = &["1", "2", "3", "4"];

pub struct NatGatewayResource;

impl NatGatewayResource {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NatGatewayResource {
    fn default() -> Self {
        Self::new()
    }
}

fn gateway_state(g: &nat::NatGateway) -> ResourceState {
    let mut state = ResourceState::new();
    state.set("id", json!(g.id));
    state.set("name", json!(g.name));
    state.set("description", json!(g.description));
    state.set("spec", json!(g.spec));
    state.set("router_id", json!(g.router_id));
    state.set("internal_network_id", json!(g.internal_network_id));
    state.set("status", json!(g.status));
    state.set("tenant_id", json!(g.tenant_id.clone().unwrap_or_default()));
    state
}

fn validate_spec(spec: &str) -> ResourceResult<()> {
    if SPECS.contains(&spec) {
        Ok(())
    } else {
        Err(vec![Diagnostic::error(&format!(
            "Invalid spec \"{}\", expected one of: {}",
            spec,
            SPECS.join(", ")
        ))
        .with_attribute(vec!["spec".to_string()])])
    }
}

async fn wait_for_gateway(
    client: &ServiceClient,
    id: &str,
    pending: &[&str],
    target: &str,
    timeout: Duration,
) -> flexibleengine_sdk::Result<()> {
    StateChangeConf::new(pending, &[target], timeout)
        .with_poll_interval(Duration::from_secs(5))
        .wait_for_state(|| async {
            deleted_on_not_found(nat::get(client, id).await, |g| g.status.clone())
        })
        .await
        .map(|_| ())
}

#[async_trait]
impl Resource for NatGatewayResource {
    fn type_name(&self) -> &str {
        "flexibleengine_nat_gateway_v2"
    }

    fn schema(&self) -> ResourceSchema {
        let block = SchemaBlock::new()
            .with_attribute("name", SchemaAttribute::string().required())
            .with_attribute("description", SchemaAttribute::string().optional().computed())
            .with_attribute(
                "spec",
                SchemaAttribute::string()
                    .with_description("Gateway size: 1 (small) to 4 (extra-large)")
                    .required(),
            )
            .with_attribute(
                "router_id",
                SchemaAttribute::string()
                    .with_description("ID of the VPC the gateway belongs to")
                    .required()
                    .force_new(),
            )
            .with_attribute(
                "internal_network_id",
                SchemaAttribute::string()
                    .with_description("Network ID of the downstream subnet")
                    .required()
                    .force_new(),
            )
            .with_attribute("status", SchemaAttribute::string().computed())
            .with_attribute("tenant_id", SchemaAttribute::string().computed())
            .with_timeouts(&["create", "delete"])
            .with_description("Manages a NAT gateway");

        ResourceSchema::new(1, block)
    }

    async fn create(
        &self,
        config: &Config,
        planned: &ResourceState,
    ) -> ResourceResult<ResourceState> {
        let client = config.nat_v2_client();
        let timeouts = Timeouts::from_state(planned, DEFAULT_TIMEOUTS)?;

        let spec = planned.require_string("spec")?;
        validate_spec(&spec)?;

        let opts = nat::CreateNatGatewayOpts {
            name: planned.require_string("name")?,
            spec,
            router_id: planned.require_string("router_id")?,
            internal_network_id: planned.require_string("internal_network_id")?,
            description: planned.get_string("description"),
        };
        let gateway = nat::create(&client, &opts)
            .await
            .map_err(|e| sdk_error("Error creating NAT gateway", e))?;
        tracing::info!(id = %gateway.id, "NAT gateway created");

        wait_for_gateway(&client, &gateway.id, &["PENDING_CREATE"], "ACTIVE", timeouts.create)
            .await
            .map_err(|e| sdk_error(&format!("Error waiting for NAT gateway {} to become active", gateway.id), e))?;

        let mut state = planned.clone();
        state.set("id", json!(gateway.id));
        self.read(config, &state).await
    }

    async fn read(
        &self,
        config: &Config,
        current: &ResourceState,
    ) -> ResourceResult<ResourceState> {
        let id = current.id()?;

        match nat::get(&config.nat_v2_client(), &id).await {
            Ok(g) => {
                let mut state = gateway_state(&g);
                state.carry_over(current, &["timeouts"]);
                Ok(state)
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!(id = %id, "NAT gateway not found, removing from state");
                Ok(ResourceState::new())
            }
            Err(e) => Err(sdk_error("Error retrieving NAT gateway", e)),
        }
    }

    async fn update(
        &self,
        config: &Config,
        current: &ResourceState,
        planned: &ResourceState,
    ) -> ResourceResult<ResourceState> {
        let id = current.id()?;
        let client = config.nat_v2_client();
        let timeouts = Timeouts::from_state(planned, DEFAULT_TIMEOUTS)?;

        let changed = |key: &str| current.get(key) != planned.get(key);
        let mut opts = nat::UpdateNatGatewayOpts::default();
        if changed("name") {
            opts.name = planned.get_string("name");
        }
        if changed("description") {
            opts.description = Some(planned.get_string("description").unwrap_or_default());
        }
        if changed("spec") {
            let spec = planned.require_string("spec")?;
            validate_spec(&spec)?;
            opts.spec = Some(spec);
        }

        nat::update(&client, &id, &opts)
            .await
            .map_err(|e| sdk_error("Error updating NAT gateway", e))?;

        wait_for_gateway(&client, &id, &["PENDING_UPDATE"], "ACTIVE", timeouts.update)
            .await
            .map_err(|e| sdk_error(&format!("Error waiting for NAT gateway {} update", id), e))?;

        let mut state = planned.clone();
        state.set("id", json!(id));
        self.read(config, &state).await
    }

    async fn delete(&self, config: &Config, current: &ResourceState) -> ResourceResult<()> {
        let id = current.id()?;
        let client = config.nat_v2_client();
        let timeouts = Timeouts::from_state(current, DEFAULT_TIMEOUTS)?;

        match nat::delete(&client, &id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(sdk_error("Error deleting NAT gateway", e)),
        }

        wait_for_gateway(
            &client,
            &id,
            &["ACTIVE", "PENDING_DELETE"],
            STATE_DELETED,
            timeouts.delete,
        )
        .await
        .map_err(|e| sdk_error(&format!("Error waiting for NAT gateway {} to be deleted", id), e))?;
        tracing::info!(id = %id, "NAT gateway deleted");
        Ok(())
    }
}
