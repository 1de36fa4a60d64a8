//! Software Repository for Containers (v2): organizations and repositories

use crate::client::ServiceClient;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Organization (namespace) data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub creator_name: String,
    /// 7: manage, 3: write, 1: read
    #[serde(default)]
    pub auth: i64,
}

impl Organization {
    pub fn permission(&self) -> &'static str {
        permission_name(self.auth)
    }
}

pub fn permission_name(auth: i64) -> &'static str {
    match auth {
        7 => "Manage",
        3 => "Write",
        1 => "Read",
        _ => "Unknown",
    }
}

/// Repository data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub internal_path: String,
    #[serde(default)]
    pub num_images: i64,
    #[serde(default)]
    pub size: i64,
}

/// Create repository request
#[derive(Debug, Clone, Serialize, Default)]
pub struct CreateRepositoryOpts {
    pub repository: String,
    pub is_public: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Update repository request
#[derive(Debug, Clone, Serialize, Default)]
pub struct UpdateRepositoryOpts {
    pub is_public: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

pub async fn create_organization(client: &ServiceClient, name: &str) -> Result<()> {
    let url = client.service_url(&["manage", "namespaces"]);
    let _: serde_json::Value = client
        .post(&url, &serde_json::json!({ "namespace": name }))
        .await?;
    Ok(())
}

pub async fn get_organization(client: &ServiceClient, name: &str) -> Result<Organization> {
    client
        .get(&client.service_url(&["manage", "namespaces", name]))
        .await
}

pub async fn delete_organization(client: &ServiceClient, name: &str) -> Result<()> {
    client
        .delete(&client.service_url(&["manage", "namespaces", name]))
        .await
}

pub async fn create_repository(
    client: &ServiceClient,
    organization: &str,
    opts: &CreateRepositoryOpts,
) -> Result<()> {
    let url = client.service_url(&["manage", "namespaces", organization, "repos"]);
    let _: serde_json::Value = client.post(&url, opts).await?;
    Ok(())
}

pub async fn get_repository(
    client: &ServiceClient,
    organization: &str,
    name: &str,
) -> Result<Repository> {
    client
        .get(&client.service_url(&["manage", "namespaces", organization, "repos", name]))
        .await
}

pub async fn update_repository(
    client: &ServiceClient,
    organization: &str,
    name: &str,
    opts: &UpdateRepositoryOpts,
) -> Result<()> {
    let url = client.service_url(&["manage", "namespaces", organization, "repos", name]);
    let _: serde_json::Value = client.patch(&url, opts).await?;
    Ok(())
}

pub async fn delete_repository(client: &ServiceClient, organization: &str, name: &str) -> Result<()> {
    client
        .delete(&client.service_url(&["manage", "namespaces", organization, "repos", name]))
        .await
}
