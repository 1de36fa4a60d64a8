//! `flexibleengine_rds_instance_v3`
//!
//! Relational database instances. Creation, flavor changes and volume growth
//! are asynchronous jobs; every change waits for the instance to return to
//! `ACTIVE`.

use super::{sdk_error, Resource, ResourceResult, ResourceState, Timeouts};
use crate::config::Config;
use crate::plan::{plan_resource_change, PlannedChange};
use crate::schema::{
    AttributeType, Diagnostic, NestedBlock, ResourceSchema, SchemaAttribute, SchemaBlock,
};
use async_trait::async_trait;
use flexibleengine_sdk::services::rds;
use flexibleengine_sdk::wait::deleted_on_not_found;
use flexibleengine_sdk::{ServiceClient, StateChangeConf, STATE_DELETED};
use serde_json::json;
use std::time::Duration;

const DEFAULT_TIMEOUTS: Timeouts = Timeouts::minutes(30, 30, 30);

const STATE_ACTIVE: &str = "ACTIVE";
const PENDING_CREATE: &[&str] = &["BUILD"];
const PENDING_UPDATE: &[&str] = &[
    "MODIFYING",
    "RESIZING",
    "BACKING UP",
    "MODIFYING INSTANCE CLASS",
    "MODIFYING DATABASE PORT",
];
const PENDING_DELETE: &[&str] = &["ACTIVE", "BACKING UP", "FAILED", "DELETING"];

pub struct RdsInstanceResource;

impl RdsInstanceResource {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RdsInstanceResource {
    fn default() -> Self {
        Self::new()
    }
}

async fn wait_for_instance(
    client: &ServiceClient,
    id: &str,
    pending: &[&str],
    target: &str,
    timeout: Duration,
) -> flexibleengine_sdk::Result<()> {
    StateChangeConf::new(pending, &[target], timeout)
        .with_poll_interval(Duration::from_secs(10))
        .wait_for_state(|| async {
            deleted_on_not_found(rds::get(client, id).await, |i| i.status.clone())
        })
        .await
        .map(|_| ())
}

async fn wait_for_update(
    client: &ServiceClient,
    id: &str,
    timeout: Duration,
    what: &str,
) -> ResourceResult<()> {
    wait_for_instance(client, id, PENDING_UPDATE, STATE_ACTIVE, timeout)
        .await
        .map_err(|e| sdk_error(&format!("Error waiting for RDS instance {} {}", id, what), e))
}

fn backup_strategy(block: &ResourceState) -> ResourceResult<rds::BackupStrategy> {
    Ok(rds::BackupStrategy {
        start_time: block.require_string("start_time")?,
        keep_days: block.get_i64("keep_days").unwrap_or(7),
    })
}

fn volume_size(state: &ResourceState) -> Option<i64> {
    state.get_block("volume").and_then(|v| v.get_i64("size"))
}

/// Volumes can only grow
fn check_volume_growth(current: &ResourceState, planned: &ResourceState) -> ResourceResult<()> {
    match (volume_size(current), volume_size(planned)) {
        (Some(old), Some(new)) if new < old => Err(vec![Diagnostic::error(&format!(
            "RDS volume size cannot shrink ({} GB to {} GB)",
            old, new
        ))
        .with_attribute(vec!["volume".to_string(), "0".to_string(), "size".to_string()])]),
        _ => Ok(()),
    }
}

fn create_opts(config: &Config, planned: &ResourceState) -> ResourceResult<rds::CreateInstanceOpts> {
    let missing = |name: &str| vec![Diagnostic::error(&format!("A \"{}\" block is required", name))];
    let db = planned.get_block("db").ok_or_else(|| missing("db"))?;
    let volume = planned.get_block("volume").ok_or_else(|| missing("volume"))?;

    let zones = planned.get_string_list("availability_zone");
    if zones.is_empty() {
        return Err(vec![Diagnostic::error("availability_zone must list at least one zone")]);
    }

    let ha = planned
        .get_string("ha_replication_mode")
        .map(|replication_mode| rds::Ha {
            mode: "Ha".to_string(),
            replication_mode,
        });

    let backup = match planned.get_block("backup_strategy") {
        Some(block) => Some(backup_strategy(&block)?),
        None => None,
    };

    Ok(rds::CreateInstanceOpts {
        name: planned.require_string("name")?,
        datastore: rds::Datastore {
            db_type: db.require_string("type")?,
            version: db.require_string("version")?,
        },
        ha,
        flavor_ref: planned.require_string("flavor")?,
        volume: rds::Volume {
            volume_type: volume.require_string("type")?,
            size: volume
                .get_i64("size")
                .ok_or_else(|| vec![Diagnostic::error("volume.size is required")])?,
            disk_encryption_id: volume.get_string("disk_encryption_id"),
        },
        region: config.region.clone(),
        availability_zone: zones.join(","),
        vpc_id: planned.require_string("vpc_id")?,
        subnet_id: planned.require_string("subnet_id")?,
        security_group_id: planned.require_string("security_group_id")?,
        password: db.require_string("password")?,
        port: db.get_i64("port").filter(|p| *p > 0).map(|p| p.to_string()),
        backup_strategy: backup,
        configuration_id: planned.get_string("param_group_id"),
    })
}

/// Zones of the instance nodes, master first
fn node_zones(instance: &rds::Instance) -> Vec<String> {
    let mut nodes: Vec<&rds::Node> = instance.nodes.iter().collect();
    nodes.sort_by_key(|n| n.role != "master");
    let mut zones: Vec<String> = Vec::new();
    for node in nodes {
        if !node.availability_zone.is_empty() && !zones.contains(&node.availability_zone) {
            zones.push(node.availability_zone.clone());
        }
    }
    zones
}

fn instance_state(instance: &rds::Instance, current: &ResourceState) -> ResourceState {
    let mut state = ResourceState::new();
    state.set("id", json!(instance.id));
    state.set("name", json!(instance.name));
    state.set("flavor", json!(instance.flavor_ref));
    state.set("region", json!(instance.region));
    state.set("vpc_id", json!(instance.vpc_id));
    state.set("subnet_id", json!(instance.subnet_id));
    state.set("security_group_id", json!(instance.security_group_id));
    state.set("status", json!(instance.status));
    state.set("private_ips", json!(instance.private_ips));
    state.set("public_ips", json!(instance.public_ips));
    state.set("created", json!(instance.created));
    state.set(
        "param_group_id",
        json!(instance.configuration_id.clone().unwrap_or_default()),
    );
    state.set(
        "ha_replication_mode",
        json!(instance
            .ha
            .as_ref()
            .map(|ha| ha.replication_mode.clone())
            .unwrap_or_default()),
    );

    let zones = node_zones(instance);
    if zones.is_empty() {
        state.carry_over(current, &["availability_zone"]);
    } else {
        state.set("availability_zone", json!(zones));
    }

    let mut db = ResourceState::new();
    db.set("type", json!(instance.datastore.db_type));
    db.set("version", json!(instance.datastore.version));
    db.set("port", json!(instance.port));
    db.set("user_name", json!(instance.db_user_name));
    if let Some(previous) = current.get_block("db") {
        db.carry_over(&previous, &["password"]);
    }
    state.set_block("db", db);

    let mut volume = ResourceState::new();
    volume.set("type", json!(instance.volume.volume_type));
    volume.set("size", json!(instance.volume.size));
    volume.set(
        "disk_encryption_id",
        json!(instance.volume.disk_encryption_id.clone().unwrap_or_default()),
    );
    state.set_block("volume", volume);

    // Only track the backup policy when configured, or when importing
    let track_backup = match current.get("backup_strategy") {
        None => true,
        Some(v) => v.as_array().map_or(false, |a| !a.is_empty()),
    };
    match (&instance.backup_strategy, track_backup) {
        (Some(policy), true) => {
            let mut block = ResourceState::new();
            block.set("start_time", json!(policy.start_time));
            block.set("keep_days", json!(policy.keep_days));
            state.set_block("backup_strategy", block);
        }
        _ => state.set("backup_strategy", json!([])),
    }

    state.carry_over(current, &["timeouts"]);
    state
}

#[async_trait]
impl Resource for RdsInstanceResource {
    fn type_name(&self) -> &str {
        "flexibleengine_rds_instance_v3"
    }

    fn schema(&self) -> ResourceSchema {
        let db = SchemaBlock::new()
            .with_attribute(
                "type",
                SchemaAttribute::string()
                    .with_description("Engine: MySQL, PostgreSQL or SQLServer")
                    .required()
                    .force_new(),
            )
            .with_attribute("version", SchemaAttribute::string().required().force_new())
            .with_attribute(
                "password",
                SchemaAttribute::string().required().sensitive().force_new(),
            )
            .with_attribute(
                "port",
                SchemaAttribute::number().optional().computed().force_new(),
            )
            .with_attribute("user_name", SchemaAttribute::string().computed());

        let volume = SchemaBlock::new()
            .with_attribute(
                "type",
                SchemaAttribute::string()
                    .with_description("ULTRAHIGH or COMMON")
                    .required()
                    .force_new(),
            )
            .with_attribute(
                "size",
                SchemaAttribute::number()
                    .with_description("Volume size in GB; can only grow")
                    .required(),
            )
            .with_attribute(
                "disk_encryption_id",
                SchemaAttribute::string().optional().computed().force_new(),
            );

        let backup = SchemaBlock::new()
            .with_attribute(
                "start_time",
                SchemaAttribute::string()
                    .with_description("UTC window, e.g. 08:00-09:00")
                    .required(),
            )
            .with_attribute("keep_days", SchemaAttribute::number().optional().computed());

        let block = SchemaBlock::new()
            .with_attribute("name", SchemaAttribute::string().required())
            .with_attribute(
                "flavor",
                SchemaAttribute::string()
                    .with_description("Specification code of the instance flavor")
                    .required(),
            )
            .with_attribute(
                "availability_zone",
                SchemaAttribute::list(AttributeType::String)
                    .required()
                    .force_new(),
            )
            .with_attribute("vpc_id", SchemaAttribute::string().required().force_new())
            .with_attribute("subnet_id", SchemaAttribute::string().required().force_new())
            .with_attribute(
                "security_group_id",
                SchemaAttribute::string().required().force_new(),
            )
            .with_attribute(
                "ha_replication_mode",
                SchemaAttribute::string()
                    .with_description("Replication mode of an HA pair (async, semisync, sync)")
                    .optional()
                    .computed()
                    .force_new(),
            )
            .with_attribute(
                "param_group_id",
                SchemaAttribute::string().optional().computed().force_new(),
            )
            .with_attribute("region", SchemaAttribute::string().computed())
            .with_attribute("status", SchemaAttribute::string().computed())
            .with_attribute(
                "private_ips",
                SchemaAttribute::list(AttributeType::String).computed(),
            )
            .with_attribute(
                "public_ips",
                SchemaAttribute::list(AttributeType::String).computed(),
            )
            .with_attribute("created", SchemaAttribute::string().computed())
            .with_block("db", NestedBlock::list(db).min_items(1).max_items(1))
            .with_block("volume", NestedBlock::list(volume).min_items(1).max_items(1))
            .with_block("backup_strategy", NestedBlock::list(backup).max_items(1))
            .with_timeouts(&["create", "update", "delete"])
            .with_description("Manages an RDS database instance");

        ResourceSchema::new(1, block)
    }

    fn plan_change(
        &self,
        current: Option<&ResourceState>,
        proposed: &ResourceState,
    ) -> ResourceResult<PlannedChange> {
        if let Some(current) = current {
            check_volume_growth(current, proposed)?;
        }
        Ok(plan_resource_change(&self.schema().block, current, proposed))
    }

    async fn create(
        &self,
        config: &Config,
        planned: &ResourceState,
    ) -> ResourceResult<ResourceState> {
        let client = config.rds_v3_client();
        let timeouts = Timeouts::from_state(planned, DEFAULT_TIMEOUTS)?;
        let opts = create_opts(config, planned)?;

        let (created, job_id) = rds::create(&client, &opts)
            .await
            .map_err(|e| sdk_error("Error creating RDS instance", e))?;
        tracing::info!(id = %created.id, job_id = ?job_id, "RDS instance creation started");

        wait_for_instance(&client, &created.id, PENDING_CREATE, STATE_ACTIVE, timeouts.create)
            .await
            .map_err(|e| sdk_error(&format!("Error waiting for RDS instance {} to become active", created.id), e))?;

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

        match rds::get(&config.rds_v3_client(), &id).await {
            Ok(instance) => Ok(instance_state(&instance, current)),
            Err(e) if e.is_not_found() => {
                tracing::warn!(id = %id, "RDS instance not found, removing from state");
                Ok(ResourceState::new())
            }
            Err(e) => Err(sdk_error("Error retrieving RDS instance", e)),
        }
    }

    async fn update(
        &self,
        config: &Config,
        current: &ResourceState,
        planned: &ResourceState,
    ) -> ResourceResult<ResourceState> {
        let id = current.id()?;
        let client = config.rds_v3_client();
        let timeouts = Timeouts::from_state(planned, DEFAULT_TIMEOUTS)?;
        check_volume_growth(current, planned)?;
        let backup = match planned.get_block("backup_strategy") {
            Some(block) => backup_strategy(&block)?,
            None => rds::BackupStrategy::disabled(),
        };

        if current.get("name") != planned.get("name") {
            let name = planned.require_string("name")?;
            rds::rename(&client, &id, &name)
                .await
                .map_err(|e| sdk_error("Error renaming RDS instance", e))?;
        }

        if current.get("flavor") != planned.get("flavor") {
            let flavor = planned.require_string("flavor")?;
            rds::resize_flavor(&client, &id, &flavor)
                .await
                .map_err(|e| sdk_error("Error resizing RDS instance flavor", e))?;
            tracing::info!(id = %id, flavor = %flavor, "RDS flavor change started");
            wait_for_update(&client, &id, timeouts.update, "flavor change").await?;
        }

        if let (Some(old), Some(new)) = (volume_size(current), volume_size(planned)) {
            if new > old {
                rds::enlarge_volume(&client, &id, new)
                    .await
                    .map_err(|e| sdk_error("Error enlarging RDS volume", e))?;
                tracing::info!(id = %id, size = new, "RDS volume enlargement started");
                wait_for_update(&client, &id, timeouts.update, "volume enlargement").await?;
            }
        }

        // Dropping the block turns automated backups off
        if current.get_block("backup_strategy") != planned.get_block("backup_strategy") {
            rds::update_backup_policy(&client, &id, &backup)
                .await
                .map_err(|e| sdk_error("Error updating RDS backup policy", e))?;
        }

        let mut state = planned.clone();
        state.set("id", json!(id));
        self.read(config, &state).await
    }

    async fn delete(&self, config: &Config, current: &ResourceState) -> ResourceResult<()> {
        let id = current.id()?;
        let client = config.rds_v3_client();
        let timeouts = Timeouts::from_state(current, DEFAULT_TIMEOUTS)?;

        match rds::delete(&client, &id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(sdk_error("Error deleting RDS instance", e)),
        }

        wait_for_instance(&client, &id, PENDING_DELETE, STATE_DELETED, timeouts.delete)
            .await
            .map_err(|e| sdk_error(&format!("Error waiting for RDS instance {} to be deleted", id), e))?;
        tracing::info!(id = %id, "RDS instance deleted");
        Ok(())
    }
}
