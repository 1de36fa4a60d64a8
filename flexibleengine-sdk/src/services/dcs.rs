//! Distributed Cache Service (v2)

use crate::client::ServiceClient;
use crate::error::{ClientError, Result};
use crate::pagination::{OffsetPager, Page};
use serde::{Deserialize, Serialize};

/// Periodic backup schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupPlan {
    /// `HH:MM-HH:MM` UTC window
    pub begin_at: String,
    /// Only `weekly` is accepted
    pub period_type: String,
    /// Days of week, 1 (Monday) to 7 (Sunday)
    pub backup_at: Vec<i64>,
}

/// Backup policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupPolicy {
    /// `auto` or `manual`
    pub backup_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_days: Option<i64>,
    pub periodical_backup_plan: BackupPlan,
}

impl BackupPolicy {
    /// Same schedule, but only manual backups are taken
    pub fn into_manual(self) -> Self {
        Self {
            backup_type: "manual".to_string(),
            ..self
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupPolicyWrapper {
    pub policy: BackupPolicy,
}

/// Create instance request
#[derive(Debug, Clone, Serialize, Default)]
pub struct CreateInstanceOpts {
    pub name: String,
    pub engine: String,
    pub engine_version: String,
    pub capacity: f64,
    pub spec_code: String,
    pub vpc_id: String,
    pub subnet_id: String,
    pub available_zones: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_group_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_backup_policy: Option<BackupPolicy>,
}

/// Update instance request
#[derive(Debug, Clone, Serialize, Default)]
pub struct UpdateInstanceOpts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_group_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_backup_policy: Option<BackupPolicy>,
}

/// Instance data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub instance_id: String,
    pub name: String,
    pub engine: String,
    pub engine_version: String,
    pub capacity: f64,
    pub spec_code: String,
    pub status: String,
    #[serde(default)]
    pub port: i64,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub domain_name: String,
    #[serde(default)]
    pub vpc_id: String,
    #[serde(default)]
    pub subnet_id: String,
    #[serde(default)]
    pub security_group_id: String,
    #[serde(default)]
    pub available_zones: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub max_memory: i64,
    #[serde(default)]
    pub used_memory: i64,
    #[serde(default)]
    pub instance_backup_policy: Option<BackupPolicyWrapper>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedInstance {
    pub instance_id: String,
    #[serde(default)]
    pub instance_name: String,
}

#[derive(Deserialize)]
struct CreateResponse {
    #[serde(default)]
    instances: Vec<CreatedInstance>,
}

/// Create an instance and return its ID
pub async fn create(client: &ServiceClient, opts: &CreateInstanceOpts) -> Result<String> {
    let url = client.service_url(&["instances"]);
    let resp: CreateResponse = client.post(&url, opts).await?;
    resp.instances
        .into_iter()
        .next()
        .map(|i| i.instance_id)
        .ok_or_else(|| ClientError::Api {
            status: 200,
            code: None,
            message: "create response contains no instance".to_string(),
        })
}

pub async fn get(client: &ServiceClient, id: &str) -> Result<Instance> {
    client.get(&client.service_url(&["instances", id])).await
}

pub async fn update(client: &ServiceClient, id: &str, opts: &UpdateInstanceOpts) -> Result<()> {
    let url = client.service_url(&["instances", id]);
    let _: serde_json::Value = client.put(&url, opts).await?;
    Ok(())
}

/// Change the flavor (and capacity) of an instance
pub async fn resize(client: &ServiceClient, id: &str, spec_code: &str, capacity: f64) -> Result<()> {
    let url = client.service_url(&["instances", id, "resize"]);
    let body = serde_json::json!({ "spec_code": spec_code, "new_capacity": capacity });
    let _: serde_json::Value = client.post(&url, &body).await?;
    Ok(())
}

pub async fn change_password(
    client: &ServiceClient,
    id: &str,
    old_password: &str,
    new_password: &str,
) -> Result<()> {
    let url = client.service_url(&["instances", id, "password"]);
    let body = serde_json::json!({ "old_password": old_password, "new_password": new_password });
    let _: serde_json::Value = client.put(&url, &body).await?;
    Ok(())
}

pub async fn delete(client: &ServiceClient, id: &str) -> Result<()> {
    client.delete(&client.service_url(&["instances", id])).await
}

// ============================================================================
// Backups
// ============================================================================

/// Backup record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Backup {
    pub backup_id: String,
    #[serde(default)]
    pub backup_name: String,
    #[serde(default)]
    pub instance_id: String,
    pub status: String,
    #[serde(default)]
    pub backup_format: String,
    #[serde(default)]
    pub remark: String,
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub backup_type: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

/// Create backup request
#[derive(Debug, Clone, Serialize, Default)]
pub struct CreateBackupOpts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_format: Option<String>,
}

#[derive(Deserialize)]
struct CreateBackupResponse {
    backup_id: String,
}

#[derive(Deserialize)]
struct BackupList {
    #[serde(default)]
    total_num: usize,
    #[serde(default)]
    backup_record_response: Vec<Backup>,
}

pub const BACKUP_PAGE_SIZE: usize = 10;

pub async fn create_backup(
    client: &ServiceClient,
    instance_id: &str,
    opts: &CreateBackupOpts,
) -> Result<String> {
    let url = client.service_url(&["instances", instance_id, "backups"]);
    let resp: CreateBackupResponse = client.post(&url, opts).await?;
    Ok(resp.backup_id)
}

/// Fetch one page of backups. The offset is 1-based.
pub async fn list_backups(
    client: &ServiceClient,
    instance_id: &str,
    offset: usize,
    limit: usize,
) -> Result<Page<Backup>> {
    let url = client.service_url(&["instances", instance_id, "backups"]);
    let query = [("offset", offset.to_string()), ("limit", limit.to_string())];
    let resp: BackupList = client.get_with_query(&url, &query).await?;
    Ok(Page {
        items: resp.backup_record_response,
        total: resp.total_num,
    })
}

/// Look a backup up by ID, paging through the instance's backups
pub async fn get_backup(client: &ServiceClient, instance_id: &str, backup_id: &str) -> Result<Backup> {
    OffsetPager::new(BACKUP_PAGE_SIZE, 1)
        .find(
            |offset, limit| list_backups(client, instance_id, offset, limit),
            |b: &Backup| b.backup_id == backup_id,
        )
        .await?
        .ok_or_else(|| ClientError::NotFound(format!("DCS backup {}", backup_id)))
}

pub async fn delete_backup(client: &ServiceClient, instance_id: &str, backup_id: &str) -> Result<()> {
    client
        .delete(&client.service_url(&["instances", instance_id, "backups", backup_id]))
        .await
}
