//! Relational Database Service (v3)

use crate::client::ServiceClient;
use crate::error::{ClientError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Database engine and version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Datastore {
    #[serde(rename = "type")]
    pub db_type: String,
    pub version: String,
}

/// Storage volume
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    #[serde(rename = "type")]
    pub volume_type: String,
    pub size: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_encryption_id: Option<String>,
}

/// Automated backup policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupStrategy {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub start_time: String,
    #[serde(default)]
    pub keep_days: i64,
}

impl BackupStrategy {
    /// A retention of zero days turns automated backups off
    pub fn disabled() -> Self {
        Self {
            start_time: String::new(),
            keep_days: 0,
        }
    }
}

/// HA settings on create
#[derive(Debug, Clone, Serialize)]
pub struct Ha {
    pub mode: String,
    pub replication_mode: String,
}

/// Create instance request
#[derive(Debug, Clone, Serialize)]
pub struct CreateInstanceOpts {
    pub name: String,
    pub datastore: Datastore,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ha: Option<Ha>,
    pub flavor_ref: String,
    pub volume: Volume,
    pub region: String,
    /// Comma separated; primary first for HA instances
    pub availability_zone: String,
    pub vpc_id: String,
    pub subnet_id: String,
    pub security_group_id: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_strategy: Option<BackupStrategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration_id: Option<String>,
}

/// Instance node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub availability_zone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HaInfo {
    #[serde(default)]
    pub replication_mode: String,
}

/// Instance data as returned by the list API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub id: String,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub port: i64,
    #[serde(rename = "type", default)]
    pub instance_type: String,
    #[serde(default)]
    pub region: String,
    pub datastore: Datastore,
    pub volume: Volume,
    pub flavor_ref: String,
    #[serde(default)]
    pub vpc_id: String,
    #[serde(default)]
    pub subnet_id: String,
    #[serde(default)]
    pub security_group_id: String,
    #[serde(default)]
    pub private_ips: Vec<String>,
    #[serde(default)]
    pub public_ips: Vec<String>,
    #[serde(default)]
    pub backup_strategy: Option<BackupStrategy>,
    #[serde(default)]
    pub db_user_name: String,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub ha: Option<HaInfo>,
    #[serde(default)]
    pub configuration_id: Option<String>,
}

/// Instance reference returned by create
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedInstance {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Deserialize)]
struct CreateResponse {
    instance: CreatedInstance,
    #[serde(default)]
    job_id: Option<String>,
}

#[derive(Deserialize)]
struct InstanceList {
    #[serde(default)]
    instances: Vec<Instance>,
    #[serde(default)]
    total_count: usize,
}

/// List filters
#[derive(Debug, Clone, Default)]
pub struct ListOpts {
    pub id: Option<String>,
    pub name: Option<String>,
    pub datastore_type: Option<String>,
    pub offset: usize,
    pub limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobResponse {
    #[serde(default)]
    pub job_id: Option<String>,
}

/// Create an instance; returns the instance reference and the job ID
pub async fn create(
    client: &ServiceClient,
    opts: &CreateInstanceOpts,
) -> Result<(CreatedInstance, Option<String>)> {
    let url = client.service_url(&["instances"]);
    let resp: CreateResponse = client.post(&url, opts).await?;
    Ok((resp.instance, resp.job_id))
}

/// List instances; returns one page and the total count
pub async fn list(client: &ServiceClient, opts: &ListOpts) -> Result<(Vec<Instance>, usize)> {
    let url = client.service_url(&["instances"]);
    let mut query = vec![
        ("id", opts.id.clone().unwrap_or_default()),
        ("name", opts.name.clone().unwrap_or_default()),
        ("datastore_type", opts.datastore_type.clone().unwrap_or_default()),
    ];
    if opts.limit > 0 {
        query.push(("offset", opts.offset.to_string()));
        query.push(("limit", opts.limit.to_string()));
    }
    let resp: InstanceList = client.get_with_query(&url, &query).await?;
    Ok((resp.instances, resp.total_count))
}

/// Get one instance by ID. The API has no single-instance GET; an empty list is a 404.
pub async fn get(client: &ServiceClient, id: &str) -> Result<Instance> {
    let opts = ListOpts {
        id: Some(id.to_string()),
        ..Default::default()
    };
    let (instances, _) = list(client, &opts).await?;
    instances
        .into_iter()
        .find(|i| i.id == id)
        .ok_or_else(|| ClientError::NotFound(format!("RDS instance {}", id)))
}

pub async fn delete(client: &ServiceClient, id: &str) -> Result<()> {
    client.delete(&client.service_url(&["instances", id])).await
}

pub async fn rename(client: &ServiceClient, id: &str, name: &str) -> Result<()> {
    let url = client.service_url(&["instances", id, "name"]);
    let _: serde_json::Value = client.put(&url, &serde_json::json!({ "name": name })).await?;
    Ok(())
}

pub async fn resize_flavor(client: &ServiceClient, id: &str, spec_code: &str) -> Result<JobResponse> {
    let url = client.service_url(&["instances", id, "action"]);
    let body = serde_json::json!({ "resize_flavor": { "spec_code": spec_code } });
    client.post(&url, &body).await
}

pub async fn enlarge_volume(client: &ServiceClient, id: &str, size: i64) -> Result<JobResponse> {
    let url = client.service_url(&["instances", id, "action"]);
    let body = serde_json::json!({ "enlarge_volume": { "size": size } });
    client.post(&url, &body).await
}

pub async fn update_backup_policy(
    client: &ServiceClient,
    id: &str,
    policy: &BackupStrategy,
) -> Result<()> {
    let url = client.service_url(&["instances", id, "backups", "policy"]);
    let body = serde_json::json!({ "backup_policy": policy });
    let _: serde_json::Value = client.put(&url, &body).await?;
    Ok(())
}

// ============================================================================
// Flavors
// ============================================================================

/// Instance flavor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flavor {
    /// Returned as a string by the API
    pub vcpus: String,
    /// Memory in GB
    pub ram: i64,
    pub spec_code: String,
    pub instance_mode: String,
    #[serde(default)]
    pub az_status: HashMap<String, String>,
}

#[derive(Deserialize)]
struct FlavorList {
    #[serde(default)]
    flavors: Vec<Flavor>,
}

/// List flavors for a database engine (`MySQL`, `PostgreSQL`, `SQLServer`)
pub async fn list_flavors(
    client: &ServiceClient,
    database_name: &str,
    version_name: &str,
) -> Result<Vec<Flavor>> {
    let url = client.service_url(&["flavors", database_name]);
    let resp: FlavorList = client
        .get_with_query(&url, &[("version_name", version_name.to_string())])
        .await?;
    Ok(resp.flavors)
}
