//! `flexibleengine_dcs_backup`
//!
//! Manual backup of a DCS instance. The ID is `<instance_id>/<backup_id>`;
//! backups are only listable, so reads page through the instance's backups.

use super::{sdk_error, split_composite_id, Resource, ResourceResult, ResourceState, Timeouts};
use crate::config::Config;
use crate::schema::{ResourceSchema, SchemaAttribute, SchemaBlock};
use async_trait::async_trait;
use flexibleengine_sdk::services::dcs;
use flexibleengine_sdk::StateChangeConf;
use serde_json::json;
use std::time::Duration;

const DEFAULT_TIMEOUTS: Timeouts = Timeouts::minutes(10, 10, 10);
const ID_FORMAT: &str = "instance_id>/<backup_id";

pub struct DcsBackupResource;

impl DcsBackupResource {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DcsBackupResource {
    fn default() -> Self {
        Self::new()
    }
}

fn backup_state(backup: &dcs::Backup, instance_id: &str) -> ResourceState {
    let mut state = ResourceState::new();
    state.set("id", json!(format!("{}/{}", instance_id, backup.backup_id)));
    state.set("instance_id", json!(instance_id));
    state.set("backup_id", json!(backup.backup_id));
    state.set("name", json!(backup.backup_name));
    state.set("description", json!(backup.remark));
    state.set("backup_format", json!(backup.backup_format));
    state.set("status", json!(backup.status));
    state.set("size", json!(backup.size));
    state.set("type", json!(backup.backup_type));
    state.set("created_at", json!(backup.created_at));
    state
}

#[async_trait]
impl Resource for DcsBackupResource {
    fn type_name(&self) -> &str {
        "flexibleengine_dcs_backup"
    }

    fn schema(&self) -> ResourceSchema {
        let block = SchemaBlock::new()
            .with_attribute(
                "instance_id",
                SchemaAttribute::string().required().force_new(),
            )
            .with_attribute(
                "description",
                SchemaAttribute::string().optional().computed().force_new(),
            )
            .with_attribute(
                "backup_format",
                SchemaAttribute::string()
                    .with_description("rdb or aof (Redis 4.0 and later)")
                    .optional()
                    .computed()
                    .force_new(),
            )
            .with_attribute("backup_id", SchemaAttribute::string().computed())
            .with_attribute("name", SchemaAttribute::string().computed())
            .with_attribute("status", SchemaAttribute::string().computed())
            .with_attribute("size", SchemaAttribute::number().computed())
            .with_attribute("type", SchemaAttribute::string().computed())
            .with_attribute("created_at", SchemaAttribute::string().computed())
            .with_timeouts(&["create", "delete"])
            .with_description("Manages a manual DCS instance backup");

        ResourceSchema::new(1, block)
    }

    async fn create(
        &self,
        config: &Config,
        planned: &ResourceState,
    ) -> ResourceResult<ResourceState> {
        let client = config.dcs_v2_client();
        let timeouts = Timeouts::from_state(planned, DEFAULT_TIMEOUTS)?;
        let instance_id = planned.require_string("instance_id")?;

        let opts = dcs::CreateBackupOpts {
            remark: planned.get_string("description"),
            backup_format: planned.get_string("backup_format"),
        };
        let backup_id = dcs::create_backup(&client, &instance_id, &opts)
            .await
            .map_err(|e| sdk_error("Error creating DCS backup", e))?;
        tracing::info!(instance_id = %instance_id, backup_id = %backup_id, "DCS backup started");

        let backup = StateChangeConf::new(&["waiting", "backuping"], &["succeed"], timeouts.create)
            .with_poll_interval(Duration::from_secs(10))
            .wait_for_state(|| async {
                let backup = dcs::get_backup(&client, &instance_id, &backup_id).await?;
                let status = backup.status.clone();
                Ok((Some(backup), status))
            })
            .await
            .map_err(|e| sdk_error(&format!("Error waiting for DCS backup {} to succeed", backup_id), e))?;

        match backup {
            Some(backup) => {
                let mut state = backup_state(&backup, &instance_id);
                state.carry_over(planned, &["timeouts"]);
                Ok(state)
            }
            None => {
                let mut state = planned.clone();
                state.set("id", json!(format!("{}/{}", instance_id, backup_id)));
                self.read(config, &state).await
            }
        }
    }

    async fn read(
        &self,
        config: &Config,
        current: &ResourceState,
    ) -> ResourceResult<ResourceState> {
        let (instance_id, backup_id) = split_composite_id(&current.id()?, ID_FORMAT)?;

        match dcs::get_backup(&config.dcs_v2_client(), &instance_id, &backup_id).await {
            Ok(backup) => {
                let mut state = backup_state(&backup, &instance_id);
                state.carry_over(current, &["timeouts"]);
                Ok(state)
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!(instance_id = %instance_id, backup_id = %backup_id, "DCS backup not found, removing from state");
                Ok(ResourceState::new())
            }
            Err(e) => Err(sdk_error("Error retrieving DCS backup", e)),
        }
    }

    async fn update(
        &self,
        config: &Config,
        current: &ResourceState,
        _planned: &ResourceState,
    ) -> ResourceResult<ResourceState> {
        // Every argument forces replacement
        self.read(config, current).await
    }

    async fn delete(&self, config: &Config, current: &ResourceState) -> ResourceResult<()> {
        let (instance_id, backup_id) = split_composite_id(&current.id()?, ID_FORMAT)?;

        match dcs::delete_backup(&config.dcs_v2_client(), &instance_id, &backup_id).await {
            Ok(()) => {
                tracing::info!(instance_id = %instance_id, backup_id = %backup_id, "DCS backup deleted");
                Ok(())
            }
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(sdk_error("Error deleting DCS backup", e)),
        }
    }

    fn import_state(&self, id: &str) -> ResourceResult<ResourceState> {
        let (instance_id, backup_id) = split_composite_id(id, ID_FORMAT)?;
        let mut state = ResourceState::new();
        state.set("id", json!(id));
        state.set("instance_id", json!(instance_id));
        state.set("backup_id", json!(backup_id));
        Ok(state)
    }
}
