//! `flexibleengine_dcs_instance_v2`

use super::{sdk_error, Resource, ResourceResult, ResourceState, Timeouts};
use crate::config::Config;
use crate::schema::{
    AttributeType, Diagnostic, NestedBlock, ResourceSchema, SchemaAttribute, SchemaBlock,
};
use async_trait::async_trait;
use flexibleengine_sdk::services::dcs;
use flexibleengine_sdk::wait::deleted_on_not_found;
use flexibleengine_sdk::{ServiceClient, StateChangeConf, STATE_DELETED};
use serde_json::{json, Value};
use std::time::Duration;

const DEFAULT_TIMEOUTS: Timeouts = Timeouts::minutes(30, 30, 15);

const STATE_RUNNING: &str = "RUNNING";

pub struct DcsInstanceResource;

impl DcsInstanceResource {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DcsInstanceResource {
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
            deleted_on_not_found(dcs::get(client, id).await, |i| i.status.clone())
        })
        .await
        .map(|_| ())
}

fn backup_policy(planned: &ResourceState) -> ResourceResult<Option<dcs::BackupPolicy>> {
    let Some(block) = planned.get_block("backup_policy") else {
        return Ok(None);
    };

    let backup_at: Vec<i64> = block
        .get("backup_at")
        .and_then(|v| v.as_array())
        .map(|days| days.iter().filter_map(|d| d.as_i64()).collect())
        .unwrap_or_default();
    if backup_at.is_empty() || backup_at.iter().any(|d| !(1..=7).contains(d)) {
        return Err(vec![Diagnostic::error(
            "backup_policy.backup_at must list weekdays between 1 (Monday) and 7 (Sunday)",
        )]);
    }

    Ok(Some(dcs::BackupPolicy {
        backup_type: block.get_string("backup_type").unwrap_or_else(|| "auto".to_string()),
        save_days: block.get_i64("save_days"),
        periodical_backup_plan: dcs::BackupPlan {
            begin_at: block.require_string("begin_at")?,
            period_type: block
                .get_string("period_type")
                .unwrap_or_else(|| "weekly".to_string()),
            backup_at,
        },
    }))
}

/// Whole capacities are kept integral so `8` in config matches `8.0` from the API
fn capacity_value(capacity: f64) -> Value {
    if capacity.fract() == 0.0 {
        json!(capacity as i64)
    } else {
        json!(capacity)
    }
}

fn instance_state(instance: &dcs::Instance, current: &ResourceState) -> ResourceState {
    let mut state = ResourceState::new();
    state.set("id", json!(instance.instance_id));
    state.set("name", json!(instance.name));
    state.set("engine", json!(instance.engine));
    state.set("engine_version", json!(instance.engine_version));
    state.set("capacity", capacity_value(instance.capacity));
    state.set("flavor", json!(instance.spec_code));
    state.set("vpc_id", json!(instance.vpc_id));
    state.set("subnet_id", json!(instance.subnet_id));
    state.set("security_group_id", json!(instance.security_group_id));
    state.set("availability_zones", json!(instance.available_zones));
    state.set("port", json!(instance.port));
    state.set("description", json!(instance.description));
    state.set("status", json!(instance.status));
    state.set("private_ip", json!(instance.ip));
    state.set("domain_name", json!(instance.domain_name));
    state.set("max_memory", json!(instance.max_memory));
    state.set("used_memory", json!(instance.used_memory));

    let track_backup = match current.get("backup_policy") {
        None => true,
        Some(v) => v.as_array().map_or(false, |a| !a.is_empty()),
    };
    match (&instance.instance_backup_policy, track_backup) {
        (Some(wrapper), true) => {
            let policy = &wrapper.policy;
            let mut block = ResourceState::new();
            block.set("backup_type", json!(policy.backup_type));
            block.set("save_days", json!(policy.save_days));
            block.set("period_type", json!(policy.periodical_backup_plan.period_type));
            block.set("backup_at", json!(policy.periodical_backup_plan.backup_at));
            block.set("begin_at", json!(policy.periodical_backup_plan.begin_at));
            state.set_block("backup_policy", block);
        }
        _ => state.set("backup_policy", json!([])),
    }

    state.carry_over(current, &["password", "timeouts"]);
    state
}

#[async_trait]
impl Resource for DcsInstanceResource {
    fn type_name(&self) -> &str {
        "flexibleengine_dcs_instance_v2"
    }

    fn schema(&self) -> ResourceSchema {
        let backup = SchemaBlock::new()
            .with_attribute(
                "backup_type",
                SchemaAttribute::string()
                    .optional()
                    .with_default(json!("auto")),
            )
            .with_attribute(
                "save_days",
                SchemaAttribute::number()
                    .with_description("Days to keep automatic backups (1-7)")
                    .optional()
                    .computed(),
            )
            .with_attribute(
                "period_type",
                SchemaAttribute::string()
                    .optional()
                    .with_default(json!("weekly")),
            )
            .with_attribute(
                "backup_at",
                SchemaAttribute::list(AttributeType::Number)
                    .with_description("Weekdays on which to back up, 1 (Monday) to 7 (Sunday)")
                    .required(),
            )
            .with_attribute(
                "begin_at",
                SchemaAttribute::string()
                    .with_description("UTC window, e.g. 00:00-01:00")
                    .required(),
            );

        let block = SchemaBlock::new()
            .with_attribute("name", SchemaAttribute::string().required())
            .with_attribute(
                "engine",
                SchemaAttribute::string()
                    .with_description("Cache engine, e.g. Redis or Memcached")
                    .required()
                    .force_new(),
            )
            .with_attribute(
                "engine_version",
                SchemaAttribute::string().required().force_new(),
            )
            .with_attribute(
                "capacity",
                SchemaAttribute::number()
                    .with_description("Cache capacity in GB")
                    .required(),
            )
            .with_attribute(
                "flavor",
                SchemaAttribute::string()
                    .with_description("Specification code, e.g. redis.cluster.xu1.large.r2.s1.8")
                    .required(),
            )
            .with_attribute("vpc_id", SchemaAttribute::string().required().force_new())
            .with_attribute("subnet_id", SchemaAttribute::string().required().force_new())
            .with_attribute(
                "security_group_id",
                SchemaAttribute::string().optional().computed(),
            )
            .with_attribute(
                "availability_zones",
                SchemaAttribute::list(AttributeType::String)
                    .required()
                    .force_new(),
            )
            .with_attribute(
                "port",
                SchemaAttribute::number().optional().computed().force_new(),
            )
            .with_attribute(
                "password",
                SchemaAttribute::string().optional().sensitive(),
            )
            .with_attribute("description", SchemaAttribute::string().optional().computed())
            .with_attribute("status", SchemaAttribute::string().computed())
            .with_attribute("private_ip", SchemaAttribute::string().computed())
            .with_attribute("domain_name", SchemaAttribute::string().computed())
            .with_attribute("max_memory", SchemaAttribute::number().computed())
            .with_attribute("used_memory", SchemaAttribute::number().computed())
            .with_block("backup_policy", NestedBlock::list(backup).max_items(1))
            .with_timeouts(&["create", "update", "delete"])
            .with_description("Manages a DCS (distributed cache) instance");

        ResourceSchema::new(1, block)
    }

    async fn create(
        &self,
        config: &Config,
        planned: &ResourceState,
    ) -> ResourceResult<ResourceState> {
        let client = config.dcs_v2_client();
        let timeouts = Timeouts::from_state(planned, DEFAULT_TIMEOUTS)?;

        let opts = dcs::CreateInstanceOpts {
            name: planned.require_string("name")?,
            engine: planned.require_string("engine")?,
            engine_version: planned.require_string("engine_version")?,
            capacity: planned
                .get_f64("capacity")
                .ok_or_else(|| vec![Diagnostic::error("\"capacity\" is required")])?,
            spec_code: planned.require_string("flavor")?,
            vpc_id: planned.require_string("vpc_id")?,
            subnet_id: planned.require_string("subnet_id")?,
            available_zones: planned.get_string_list("availability_zones"),
            security_group_id: planned.get_string("security_group_id"),
            password: planned.get_string("password"),
            port: planned.get_i64("port").filter(|p| *p > 0),
            description: planned.get_string("description"),
            instance_backup_policy: backup_policy(planned)?,
        };

        let id = dcs::create(&client, &opts)
            .await
            .map_err(|e| sdk_error("Error creating DCS instance", e))?;
        tracing::info!(id = %id, engine = %opts.engine, "DCS instance creation started");

        wait_for_instance(&client, &id, &["CREATING"], STATE_RUNNING, timeouts.create)
            .await
            .map_err(|e| sdk_error(&format!("Error waiting for DCS instance {} to become running", id), e))?;

        let mut state = planned.clone();
        state.set("id", json!(id));
        self.read(config, &state).await
    }

    async fn read(
        &self,
        config: &Config,
        current: &ResourceState,
    ) -> ResourceResult<ResourceState> {
        let id = current.id()?;

        match dcs::get(&config.dcs_v2_client(), &id).await {
            Ok(instance) => Ok(instance_state(&instance, current)),
            Err(e) if e.is_not_found() => {
                tracing::warn!(id = %id, "DCS instance not found, removing from state");
                Ok(ResourceState::new())
            }
            Err(e) => Err(sdk_error("Error retrieving DCS instance", e)),
        }
    }

    async fn update(
        &self,
        config: &Config,
        current: &ResourceState,
        planned: &ResourceState,
    ) -> ResourceResult<ResourceState> {
        let id = current.id()?;
        let client = config.dcs_v2_client();
        let timeouts = Timeouts::from_state(planned, DEFAULT_TIMEOUTS)?;
        let changed = |key: &str| current.get(key) != planned.get(key);
        let policy_changed = current.get_block("backup_policy") != planned.get_block("backup_policy");

        if changed("name") || changed("description") || changed("security_group_id") || policy_changed {
            let mut opts = dcs::UpdateInstanceOpts {
                name: planned.get_string("name"),
                ..Default::default()
            };
            if changed("description") {
                opts.description = Some(planned.get_string("description").unwrap_or_default());
            }
            if changed("security_group_id") {
                opts.security_group_id = planned.get_string("security_group_id");
            }
            if policy_changed {
                opts.instance_backup_policy = match backup_policy(planned)? {
                    Some(policy) => Some(policy),
                    // Dropping the block stops scheduled backups
                    None => backup_policy(current)?.map(dcs::BackupPolicy::into_manual),
                };
            }
            dcs::update(&client, &id, &opts)
                .await
                .map_err(|e| sdk_error("Error updating DCS instance", e))?;
        }

        if changed("capacity") || changed("flavor") {
            let spec_code = planned.require_string("flavor")?;
            let capacity = planned
                .get_f64("capacity")
                .ok_or_else(|| vec![Diagnostic::error("\"capacity\" is required")])?;
            dcs::resize(&client, &id, &spec_code, capacity)
                .await
                .map_err(|e| sdk_error("Error resizing DCS instance", e))?;
            tracing::info!(id = %id, spec_code = %spec_code, "DCS resize started");

            wait_for_instance(&client, &id, &["EXTENDING"], STATE_RUNNING, timeouts.update)
                .await
                .map_err(|e| sdk_error(&format!("Error waiting for DCS instance {} resize", id), e))?;
        }

        if changed("password") {
            let old = current.get_string("password").unwrap_or_default();
            let new = planned.get_string("password").unwrap_or_default();
            dcs::change_password(&client, &id, &old, &new)
                .await
                .map_err(|e| sdk_error("Error changing DCS instance password", e))?;
        }

        let mut state = planned.clone();
        state.set("id", json!(id));
        self.read(config, &state).await
    }

    async fn delete(&self, config: &Config, current: &ResourceState) -> ResourceResult<()> {
        let id = current.id()?;
        let client = config.dcs_v2_client();
        let timeouts = Timeouts::from_state(current, DEFAULT_TIMEOUTS)?;

        match dcs::delete(&client, &id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(sdk_error("Error deleting DCS instance", e)),
        }

        wait_for_instance(
            &client,
            &id,
            &["RUNNING", "DELETING", "ERROR"],
            STATE_DELETED,
            timeouts.delete,
        )
        .await
        .map_err(|e| sdk_error(&format!("Error waiting for DCS instance {} to be deleted", id), e))?;
        tracing::info!(id = %id, "DCS instance deleted");
        Ok(())
    }
}
