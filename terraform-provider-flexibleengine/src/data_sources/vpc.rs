//! `data "flexibleengine_vpc_v1"`

use super::{no_results, DataSource};
use crate::config::Config;
use crate::resources::{sdk_error, ResourceResult, ResourceState};
use crate::schema::{Diagnostic, ResourceSchema, SchemaAttribute, SchemaBlock};
use async_trait::async_trait;
use flexibleengine_sdk::services::vpc;
use serde_json::json;

pub struct VpcDataSource;

impl VpcDataSource {
    pub fn new() -> Self {
        Self
    }
}

impl Default for VpcDataSource {
    fn default() -> Self {
        Self::new()
    }
}

/// VPCs matching every filter that is set
fn filter_vpcs(vpcs: Vec<vpc::Vpc>, query: &ResourceState) -> Vec<vpc::Vpc> {
    let id = query.get_string("id");
    let name = query.get_string("name");
    let cidr = query.get_string("cidr");
    let status = query.get_string("status");

    vpcs.into_iter()
        .filter(|v| id.as_ref().map_or(true, |x| *x == v.id))
        .filter(|v| name.as_ref().map_or(true, |x| *x == v.name))
        .filter(|v| cidr.as_ref().map_or(true, |x| *x == v.cidr))
        .filter(|v| status.as_ref().map_or(true, |x| *x == v.status))
        .collect()
}

#[async_trait]
impl DataSource for VpcDataSource {
    fn type_name(&self) -> &str {
        "flexibleengine_vpc_v1"
    }

    fn schema(&self) -> ResourceSchema {
        let block = SchemaBlock::new()
            .with_attribute("id", SchemaAttribute::string().optional().computed())
            .with_attribute("name", SchemaAttribute::string().optional().computed())
            .with_attribute("cidr", SchemaAttribute::string().optional().computed())
            .with_attribute("status", SchemaAttribute::string().optional().computed())
            .with_attribute("description", SchemaAttribute::string().computed())
            .with_description("Looks up a single VPC");

        ResourceSchema::new(1, block)
    }

    async fn read(&self, config: &Config, query: &ResourceState) -> ResourceResult<ResourceState> {
        let vpcs = vpc::list(&config.vpc_v1_client())
            .await
            .map_err(|e| sdk_error("Unable to retrieve VPCs", e))?;

        let mut matches = filter_vpcs(vpcs, query);
        if matches.len() > 1 {
            return Err(vec![Diagnostic::error(&format!(
                "Your query returned {} VPCs. Please change your search criteria and try again.",
                matches.len()
            ))]);
        }
        let v = matches.pop().ok_or_else(|| no_results("VPCs"))?;
        tracing::debug!(id = %v.id, "VPC found");

        let mut state = ResourceState::new();
        state.set("id", json!(v.id));
        state.set("name", json!(v.name));
        state.set("cidr", json!(v.cidr));
        state.set("status", json!(v.status));
        state.set("description", json!(v.description));
        Ok(state)
    }
}
