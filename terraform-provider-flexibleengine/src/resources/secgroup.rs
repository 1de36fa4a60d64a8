//! `flexibleengine_networking_secgroup_v2`

use super::{sdk_error, Resource, ResourceResult, ResourceState, Timeouts};
use crate::config::Config;
use crate::schema::{ResourceSchema, SchemaAttribute, SchemaBlock};
use async_trait::async_trait;
use flexibleengine_sdk::services::networking;
use flexibleengine_sdk::wait::deleted_on_not_found;
use flexibleengine_sdk::{StateChangeConf, STATE_DELETED};
use serde_json::json;
use std::time::Duration;

const DEFAULT_TIMEOUTS: Timeouts = Timeouts::minutes(10, 10, 10);

pub struct SecGroupResource;

impl SecGroupResource {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SecGroupResource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Resource for SecGroupResource {
    fn type_name(&self) -> &str {
        "flexibleengine_networking_secgroup_v2"
    }

    fn schema(&self) -> ResourceSchema {
        let block = SchemaBlock::new()
            .with_attribute("name", SchemaAttribute::string().required())
            .with_attribute("description", SchemaAttribute::string().optional().computed())
            .with_attribute(
                "delete_default_rules",
                SchemaAttribute::bool()
                    .with_description("Remove the egress rules added by default on creation")
                    .optional()
                    .force_new(),
            )
            .with_attribute("tenant_id", SchemaAttribute::string().computed())
            .with_timeouts(&["delete"])
            .with_description("Manages a security group");

        ResourceSchema::new(1, block)
    }

    async fn create(
        &self,
        config: &Config,
        planned: &ResourceState,
    ) -> ResourceResult<ResourceState> {
        let client = config.networking_v2_client();

        let opts = networking::CreateSecGroupOpts {
            name: planned.require_string("name")?,
            description: planned.get_string("description"),
        };
        let group = networking::create_group(&client, &opts)
            .await
            .map_err(|e| sdk_error("Error creating security group", e))?;
        tracing::info!(id = %group.id, "security group created");

        if planned.get_bool("delete_default_rules").unwrap_or(false) {
            for rule in &group.security_group_rules {
                networking::delete_rule(&client, &rule.id)
                    .await
                    .map_err(|e| sdk_error(&format!("Error deleting default rule {}", rule.id), e))?;
            }
        }

        let mut state = planned.clone();
        state.set("id", json!(group.id));
        self.read(config, &state).await
    }

    async fn read(
        &self,
        config: &Config,
        current: &ResourceState,
    ) -> ResourceResult<ResourceState> {
        let id = current.id()?;

        let group = match networking::get_group(&config.networking_v2_client(), &id).await {
            Ok(g) => g,
            Err(e) if e.is_not_found() => {
                tracing::warn!(id = %id, "security group not found, removing from state");
                return Ok(ResourceState::new());
            }
            Err(e) => return Err(sdk_error("Error retrieving security group", e)),
        };

        let mut state = ResourceState::new();
        state.set("id", json!(group.id));
        state.set("name", json!(group.name));
        state.set("description", json!(group.description));
        state.set("tenant_id", json!(group.tenant_id.unwrap_or_default()));
        state.carry_over(current, &["delete_default_rules", "timeouts"]);
        Ok(state)
    }

    async fn update(
        &self,
        config: &Config,
        current: &ResourceState,
        planned: &ResourceState,
    ) -> ResourceResult<ResourceState> {
        let id = current.id()?;

        let opts = networking::UpdateSecGroupOpts {
            name: planned.get_string("name"),
            description: Some(planned.get_string("description").unwrap_or_default()),
        };
        networking::update_group(&config.networking_v2_client(), &id, &opts)
            .await
            .map_err(|e| sdk_error("Error updating security group", e))?;

        let mut state = planned.clone();
        state.set("id", json!(id));
        self.read(config, &state).await
    }

    async fn delete(&self, config: &Config, current: &ResourceState) -> ResourceResult<()> {
        let id = current.id()?;
        let client = config.networking_v2_client();
        let timeouts = Timeouts::from_state(current, DEFAULT_TIMEOUTS)?;

        match networking::delete_group(&client, &id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(sdk_error("Error deleting security group", e)),
        }

        // Groups carry no status; presence means not yet gone
        StateChangeConf::new(&["ACTIVE"], &[STATE_DELETED], timeouts.delete)
            .with_poll_interval(Duration::from_secs(3))
            .wait_for_state(|| async {
                deleted_on_not_found(networking::get_group(&client, &id).await, |_| {
                    "ACTIVE".to_string()
                })
            })
            .await
            .map_err(|e| sdk_error(&format!("Error waiting for security group {} to be deleted", id), e))?;
        Ok(())
    }
}
