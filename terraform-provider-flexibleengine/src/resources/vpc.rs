//! `flexibleengine_vpc_v1`

use super::{sdk_error, Resource, ResourceResult, ResourceState, Timeouts};
use crate::config::Config;
use crate::schema::{AttributeType, Diagnostic, ResourceSchema, SchemaAttribute, SchemaBlock};
use async_trait::async_trait;
use flexibleengine_sdk::services::{vpc, Tag};
use flexibleengine_sdk::wait::deleted_on_not_found;
use flexibleengine_sdk::{ServiceClient, StateChangeConf, STATE_DELETED};
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;

const DEFAULT_TIMEOUTS: Timeouts = Timeouts::minutes(10, 10, 10);

pub struct VpcResource;

impl VpcResource {
    pub fn new() -> Self {
        Self
    }
}

impl Default for VpcResource {
    fn default() -> Self {
        Self::new()
    }
}

fn vpc_state(v: &vpc::Vpc, tags: &[Tag]) -> ResourceState {
    let mut state = ResourceState::new();
    state.set("id", json!(v.id));
    state.set("name", json!(v.name));
    state.set("cidr", json!(v.cidr));
    state.set("description", json!(v.description));
    state.set("status", json!(v.status));
    let tags: HashMap<&str, &str> = tags.iter().map(|t| (t.key.as_str(), t.value.as_str())).collect();
    state.set("tags", json!(tags));
    state
}

fn tags_from_map(map: &HashMap<String, String>) -> Vec<Tag> {
    let mut tags: Vec<Tag> = map.iter().map(|(k, v)| Tag::new(k, v)).collect();
    tags.sort_by(|a, b| a.key.cmp(&b.key));
    tags
}

/// Apply the difference between two tag maps
async fn update_tags(
    client: &ServiceClient,
    id: &str,
    old: &HashMap<String, String>,
    new: &HashMap<String, String>,
) -> flexibleengine_sdk::Result<()> {
    let removed: HashMap<String, String> = old
        .iter()
        .filter(|(k, v)| new.get(*k) != Some(*v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let added: HashMap<String, String> = new
        .iter()
        .filter(|(k, v)| old.get(*k) != Some(*v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    vpc::batch_tags(client, "vpcs", id, "delete", &tags_from_map(&removed)).await?;
    vpc::batch_tags(client, "vpcs", id, "create", &tags_from_map(&added)).await
}

async fn wait_for_vpc(client: &ServiceClient, id: &str, target: &str, timeout: Duration) -> flexibleengine_sdk::Result<()> {
    let pending: &[&str] = if target == STATE_DELETED {
        &["OK", "CREATING"]
    } else {
        &["CREATING"]
    };
    StateChangeConf::new(pending, &[target], timeout)
        .with_poll_interval(Duration::from_secs(3))
        .wait_for_state(|| async {
            deleted_on_not_found(vpc::get(client, id).await, |v| v.status.clone())
        })
        .await
        .map(|_| ())
}

#[async_trait]
impl Resource for VpcResource {
    fn type_name(&self) -> &str {
        "flexibleengine_vpc_v1"
    }

    fn schema(&self) -> ResourceSchema {
        let block = SchemaBlock::new()
            .with_attribute(
                "name",
                SchemaAttribute::string()
                    .with_description("Name of the VPC")
                    .required(),
            )
            .with_attribute(
                "cidr",
                SchemaAttribute::string()
                    .with_description("Address range of the VPC (e.g. 192.168.0.0/16)")
                    .required(),
            )
            .with_attribute(
                "description",
                SchemaAttribute::string().optional().computed(),
            )
            .with_attribute(
                "tags",
                SchemaAttribute::map(AttributeType::String)
                    .with_description("Key/value tags")
                    .optional(),
            )
            .with_attribute("status", SchemaAttribute::string().computed())
            .with_timeouts(&["create", "delete"])
            .with_description("Manages a VPC");

        ResourceSchema::new(1, block)
    }

    async fn create(
        &self,
        config: &Config,
        planned: &ResourceState,
    ) -> ResourceResult<ResourceState> {
        let client = config.vpc_v1_client();
        let timeouts = Timeouts::from_state(planned, DEFAULT_TIMEOUTS)?;

        let opts = vpc::CreateVpcOpts {
            name: planned.require_string("name")?,
            cidr: planned.require_string("cidr")?,
            description: planned.get_string("description"),
        };
        let created = vpc::create(&client, &opts)
            .await
            .map_err(|e| sdk_error("Error creating VPC", e))?;
        tracing::info!(id = %created.id, "VPC created");

        wait_for_vpc(&client, &created.id, "OK", timeouts.create)
            .await
            .map_err(|e| sdk_error(&format!("Error waiting for VPC {} to become available", created.id), e))?;

        let tags = planned.get_string_map("tags");
        if !tags.is_empty() {
            update_tags(&config.vpc_v2_client(), &created.id, &HashMap::new(), &tags)
                .await
                .map_err(|e| sdk_error("Error setting VPC tags", e))?;
        }

        let mut state = planned.clone();
        state.set("id", json!(created.id));
        let refreshed = self.read(config, &state).await?;
        if refreshed.is_empty() {
            return Err(vec![Diagnostic::error(&format!(
                "VPC {} disappeared after creation",
                created.id
            ))]);
        }
        Ok(refreshed)
    }

    async fn read(
        &self,
        config: &Config,
        current: &ResourceState,
    ) -> ResourceResult<ResourceState> {
        let id = current.id()?;

        let v = match vpc::get(&config.vpc_v1_client(), &id).await {
            Ok(v) => v,
            Err(e) if e.is_not_found() => {
                tracing::warn!(id = %id, "VPC not found, removing from state");
                return Ok(ResourceState::new());
            }
            Err(e) => return Err(sdk_error("Error retrieving VPC", e)),
        };

        let tags = vpc::get_tags(&config.vpc_v2_client(), "vpcs", &id)
            .await
            .map_err(|e| sdk_error("Error retrieving VPC tags", e))?;

        let mut state = vpc_state(&v, &tags);
        state.carry_over(current, &["timeouts"]);
        Ok(state)
    }

    async fn update(
        &self,
        config: &Config,
        current: &ResourceState,
        planned: &ResourceState,
    ) -> ResourceResult<ResourceState> {
        let id = current.id()?;

        let changed = |key: &str| current.get(key) != planned.get(key);
        if changed("name") || changed("cidr") || changed("description") {
            let opts = vpc::UpdateVpcOpts {
                name: planned.get_string("name"),
                cidr: planned.get_string("cidr"),
                description: Some(planned.get_string("description").unwrap_or_default()),
            };
            vpc::update(&config.vpc_v1_client(), &id, &opts)
                .await
                .map_err(|e| sdk_error("Error updating VPC", e))?;
        }

        if changed("tags") {
            update_tags(
                &config.vpc_v2_client(),
                &id,
                &current.get_string_map("tags"),
                &planned.get_string_map("tags"),
            )
            .await
            .map_err(|e| sdk_error("Error updating VPC tags", e))?;
        }

        let mut state = planned.clone();
        state.set("id", json!(id));
        self.read(config, &state).await
    }

    async fn delete(&self, config: &Config, current: &ResourceState) -> ResourceResult<()> {
        let id = current.id()?;
        let client = config.vpc_v1_client();
        let timeouts = Timeouts::from_state(current, DEFAULT_TIMEOUTS)?;

        match vpc::delete(&client, &id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(sdk_error("Error deleting VPC", e)),
        }

        wait_for_vpc(&client, &id, STATE_DELETED, timeouts.delete)
            .await
            .map_err(|e| sdk_error(&format!("Error waiting for VPC {} to be deleted", id), e))?;
        tracing::info!(id = %id, "VPC deleted");
        Ok(())
    }
}
