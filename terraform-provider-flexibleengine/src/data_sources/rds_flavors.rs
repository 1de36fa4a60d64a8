//! `data "flexibleengine_rds_flavors_v3"`

use super::{no_results, DataSource};
use crate::config::Config;
use crate::resources::{sdk_error, ResourceResult, ResourceState};
use crate::schema::{AttributeType, ResourceSchema, SchemaAttribute, SchemaBlock};
use async_trait::async_trait;
use flexibleengine_sdk::services::rds;
use serde_json::{json, Value};
use std::collections::HashMap;

pub struct RdsFlavorsDataSource;

impl RdsFlavorsDataSource {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RdsFlavorsDataSource {
    fn default() -> Self {
        Self::new()
    }
}

fn flavor_matches(flavor: &rds::Flavor, query: &ResourceState) -> bool {
    if let Some(mode) = query.get_string("instance_mode") {
        if flavor.instance_mode != mode {
            return false;
        }
    }
    if let Some(vcpus) = query.get_i64("vcpus").filter(|v| *v > 0) {
        if flavor.vcpus.parse::<i64>().ok() != Some(vcpus) {
            return false;
        }
    }
    if let Some(memory) = query.get_i64("memory").filter(|m| *m > 0) {
        if flavor.ram != memory {
            return false;
        }
    }
    true
}

fn flatten_flavor(flavor: &rds::Flavor) -> Value {
    let mut zones: Vec<&String> = flavor
        .az_status
        .iter()
        .filter(|(_, status)| status.as_str() == "normal")
        .map(|(zone, _)| zone)
        .collect();
    zones.sort();

    json!({
        "name": flavor.spec_code,
        "vcpus": flavor.vcpus.parse::<i64>().unwrap_or_default(),
        "memory": flavor.ram,
        "mode": flavor.instance_mode,
        "availability_zones": zones,
    })
}

#[async_trait]
impl DataSource for RdsFlavorsDataSource {
    fn type_name(&self) -> &str {
        "flexibleengine_rds_flavors_v3"
    }

    fn schema(&self) -> ResourceSchema {
        let flavor_type = AttributeType::Object(HashMap::from([
            ("name".to_string(), AttributeType::String),
            ("vcpus".to_string(), AttributeType::Number),
            ("memory".to_string(), AttributeType::Number),
            ("mode".to_string(), AttributeType::String),
            (
                "availability_zones".to_string(),
                AttributeType::List(Box::new(AttributeType::String)),
            ),
        ]));

        let block = SchemaBlock::new()
            .with_attribute(
                "db_type",
                SchemaAttribute::string()
                    .with_description("MySQL, PostgreSQL or SQLServer")
                    .required(),
            )
            .with_attribute("db_version", SchemaAttribute::string().required())
            .with_attribute(
                "instance_mode",
                SchemaAttribute::string()
                    .with_description("single, ha or replica")
                    .optional(),
            )
            .with_attribute("vcpus", SchemaAttribute::number().optional())
            .with_attribute(
                "memory",
                SchemaAttribute::number()
                    .with_description("Memory size in GB")
                    .optional(),
            )
            .with_attribute("flavors", SchemaAttribute::list(flavor_type).computed())
            .with_description("Lists RDS flavors for a database engine and version");

        ResourceSchema::new(1, block)
    }

    async fn read(&self, config: &Config, query: &ResourceState) -> ResourceResult<ResourceState> {
        let db_type = query.require_string("db_type")?;
        let db_version = query.require_string("db_version")?;

        let flavors = rds::list_flavors(&config.rds_v3_client(), &db_type, &db_version)
            .await
            .map_err(|e| sdk_error("Unable to retrieve RDS flavors", e))?;

        let flattened: Vec<Value> = flavors
            .iter()
            .filter(|f| flavor_matches(f, query))
            .map(flatten_flavor)
            .collect();
        if flattened.is_empty() {
            return Err(no_results("RDS flavors"));
        }
        tracing::debug!(db_type = %db_type, db_version = %db_version, count = flattened.len(), "RDS flavors found");

        let mut state = query.clone();
        state.set("id", json!(format!("{}-{}", db_type, db_version)));
        state.set("flavors", Value::Array(flattened));
        Ok(state)
    }
}
