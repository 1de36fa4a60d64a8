//! `data "flexibleengine_vpc_subnet_ids_v1"`

use super::{no_results, DataSource};
use crate::config::Config;
use crate::resources::{sdk_error, ResourceResult, ResourceState};
use crate::schema::{AttributeType, ResourceSchema, SchemaAttribute, SchemaBlock};
use async_trait::async_trait;
use flexibleengine_sdk::services::vpc;
use serde_json::json;

pub struct VpcSubnetIdsDataSource;

impl VpcSubnetIdsDataSource {
    pub fn new() -> Self {
        Self
    }
}

impl Default for VpcSubnetIdsDataSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataSource for VpcSubnetIdsDataSource {
    fn type_name(&self) -> &str {
        "flexibleengine_vpc_subnet_ids_v1"
    }

    fn schema(&self) -> ResourceSchema {
        let block = SchemaBlock::new()
            .with_attribute("vpc_id", SchemaAttribute::string().required())
            .with_attribute(
                "ids",
                SchemaAttribute::list(AttributeType::String)
                    .with_description("IDs of the subnets in the VPC")
                    .computed(),
            )
            .with_description("Lists the subnet IDs of a VPC");

        ResourceSchema::new(1, block)
    }

    async fn read(&self, config: &Config, query: &ResourceState) -> ResourceResult<ResourceState> {
        let vpc_id = query.require_string("vpc_id")?;

        let subnets = vpc::list_subnets(&config.vpc_v1_client(), Some(&vpc_id))
            .await
            .map_err(|e| sdk_error("Unable to retrieve subnets", e))?;

        // Guard against endpoints that ignore the filter
        let ids: Vec<String> = subnets
            .into_iter()
            .filter(|s| s.vpc_id == vpc_id)
            .map(|s| s.id)
            .collect();
        if ids.is_empty() {
            return Err(no_results("subnets"));
        }
        tracing::debug!(vpc_id = %vpc_id, count = ids.len(), "subnets found");

        let mut state = ResourceState::new();
        state.set("id", json!(vpc_id));
        state.set("vpc_id", json!(vpc_id));
        state.set("ids", json!(ids));
        Ok(state)
    }
}
