//! `flexibleengine_vpc_subnet_v1`

use super::{sdk_error, Resource, ResourceResult, ResourceState, Timeouts};
use crate::config::Config;
use crate::schema::{ResourceSchema, SchemaAttribute, SchemaBlock};
use async_trait::async_trait;
use flexibleengine_sdk::services::vpc;
use flexibleengine_sdk::wait::deleted_on_not_found;
use flexibleengine_sdk::{ServiceClient, StateChangeConf, STATE_DELETED};
use serde_json::json;
use std::time::Duration;

const DEFAULT_TIMEOUTS: Timeouts = Timeouts::minutes(10, 10, 10);

pub struct VpcSubnetResource;

impl VpcSubnetResource {
    pub fn new() -> Self {
        Self
    }
}

impl Default for VpcSubnetResource {
    fn default() -> Self {
        Self::new()
    }
}

fn subnet_state(s: &vpc::Subnet) -> ResourceState {
    let mut state = ResourceState::new();
    state.set("id", json!(s.id));
    state.set("name", json!(s.name));
    state.set("cidr", json!(s.cidr));
    state.set("gateway_ip", json!(s.gateway_ip));
    state.set("vpc_id", json!(s.vpc_id));
    state.set("dhcp_enable", json!(s.dhcp_enable));
    state.set("primary_dns", json!(s.primary_dns.clone().unwrap_or_default()));
    state.set("secondary_dns", json!(s.secondary_dns.clone().unwrap_or_default()));
    state.set(
        "availability_zone",
        json!(s.availability_zone.clone().unwrap_or_default()),
    );
    state.set("description", json!(s.description.clone().unwrap_or_default()));
    state.set("status", json!(s.status));
    state.set("subnet_id", json!(s.neutron_subnet_id.clone().unwrap_or_default()));
    state
}

async fn wait_for_subnet(
    client: &ServiceClient,
    id: &str,
    pending: &[&str],
    target: &str,
    timeout: Duration,
) -> flexibleengine_sdk::Result<()> {
    StateChangeConf::new(pending, &[target], timeout)
        .with_poll_interval(Duration::from_secs(3))
        .wait_for_state(|| async {
            deleted_on_not_found(vpc::get_subnet(client, id).await, |s| s.status.clone())
        })
        .await
        .map(|_| ())
}

#[async_trait]
impl Resource for VpcSubnetResource {
    fn type_name(&self) -> &str {
        "flexibleengine_vpc_subnet_v1"
    }

    fn schema(&self) -> ResourceSchema {
        let block = SchemaBlock::new()
            .with_attribute("name", SchemaAttribute::string().required())
            .with_attribute(
                "cidr",
                SchemaAttribute::string()
                    .with_description("Subnet range, must be within the VPC CIDR")
                    .required()
                    .force_new(),
            )
            .with_attribute(
                "gateway_ip",
                SchemaAttribute::string().required().force_new(),
            )
            .with_attribute(
                "vpc_id",
                SchemaAttribute::string().required().force_new(),
            )
            .with_attribute(
                "dhcp_enable",
                SchemaAttribute::bool().optional().with_default(json!(true)),
            )
            .with_attribute("primary_dns", SchemaAttribute::string().optional().computed())
            .with_attribute("secondary_dns", SchemaAttribute::string().optional().computed())
            .with_attribute(
                "availability_zone",
                SchemaAttribute::string().optional().computed().force_new(),
            )
            .with_attribute("description", SchemaAttribute::string().optional().computed())
            .with_attribute("status", SchemaAttribute::string().computed())
            .with_attribute(
                "subnet_id",
                SchemaAttribute::string()
                    .with_description("ID of the underlying Neutron subnet")
                    .computed(),
            )
            .with_timeouts(&["create", "delete"])
            .with_description("Manages a subnet inside a VPC");

        ResourceSchema::new(1, block)
    }

    async fn create(
        &self,
        config: &Config,
        planned: &ResourceState,
    ) -> ResourceResult<ResourceState> {
        let client = config.vpc_v1_client();
        let timeouts = Timeouts::from_state(planned, DEFAULT_TIMEOUTS)?;

        let opts = vpc::CreateSubnetOpts {
            name: planned.require_string("name")?,
            cidr: planned.require_string("cidr")?,
            gateway_ip: planned.require_string("gateway_ip")?,
            vpc_id: planned.require_string("vpc_id")?,
            dhcp_enable: planned.get_bool("dhcp_enable").unwrap_or(true),
            primary_dns: planned.get_string("primary_dns"),
            secondary_dns: planned.get_string("secondary_dns"),
            availability_zone: planned.get_string("availability_zone"),
            description: planned.get_string("description"),
        };
        let created = vpc::create_subnet(&client, &opts)
            .await
            .map_err(|e| sdk_error("Error creating subnet", e))?;
        tracing::info!(id = %created.id, vpc_id = %opts.vpc_id, "subnet created");

        wait_for_subnet(&client, &created.id, &["UNKNOWN"], "ACTIVE", timeouts.create)
            .await
            .map_err(|e| sdk_error(&format!("Error waiting for subnet {} to become active", created.id), e))?;

        let mut state = planned.clone();
        state.set("id", json!(created.id));
        self.read(config, &state).await
    }

    async fn read(
        &self,
        config: &Config,
        current: &ResourceState,
    ) -> ResourceResult<ResourceState> {
        let id = current.id()?;

        match vpc::get_subnet(&config.vpc_v1_client(), &id).await {
            Ok(s) => {
                let mut state = subnet_state(&s);
                state.carry_over(current, &["timeouts"]);
                Ok(state)
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!(id = %id, "subnet not found, removing from state");
                Ok(ResourceState::new())
            }
            Err(e) => Err(sdk_error("Error retrieving subnet", e)),
        }
    }

    async fn update(
        &self,
        config: &Config,
        current: &ResourceState,
        planned: &ResourceState,
    ) -> ResourceResult<ResourceState> {
        let id = current.id()?;
        let vpc_id = current.require_string("vpc_id")?;

        let changed = |key: &str| current.get(key) != planned.get(key);
        let mut opts = vpc::UpdateSubnetOpts {
            name: planned.require_string("name")?,
            ..Default::default()
        };
        if changed("description") {
            opts.description = Some(planned.get_string("description").unwrap_or_default());
        }
        if changed("dhcp_enable") {
            opts.dhcp_enable = planned.get_bool("dhcp_enable");
        }
        if changed("primary_dns") {
            opts.primary_dns = planned.get_string("primary_dns");
        }
        if changed("secondary_dns") {
            opts.secondary_dns = planned.get_string("secondary_dns");
        }

        vpc::update_subnet(&config.vpc_v1_client(), &vpc_id, &id, &opts)
            .await
            .map_err(|e| sdk_error("Error updating subnet", e))?;

        let mut state = planned.clone();
        state.set("id", json!(id));
        self.read(config, &state).await
    }

    async fn delete(&self, config: &Config, current: &ResourceState) -> ResourceResult<()> {
        let id = current.id()?;
        let vpc_id = current.require_string("vpc_id")?;
        let client = config.vpc_v1_client();
        let timeouts = Timeouts::from_state(current, DEFAULT_TIMEOUTS)?;

        match vpc::delete_subnet(&client, &vpc_id, &id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(sdk_error("Error deleting subnet", e)),
        }

        wait_for_subnet(&client, &id, &["ACTIVE", "UNKNOWN"], STATE_DELETED, timeouts.delete)
            .await
            .map_err(|e| sdk_error(&format!("Error waiting for subnet {} to be deleted", id), e))?;
        tracing::info!(id = %id, "subnet deleted");
        Ok(())
    }
}
