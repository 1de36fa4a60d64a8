//! Networking (Neutron v2.0): security groups and rules

use crate::client::ServiceClient;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Security group rule data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecGroupRule {
    pub id: String,
    pub direction: String,
    pub ethertype: String,
    pub security_group_id: String,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub port_range_min: Option<i64>,
    #[serde(default)]
    pub port_range_max: Option<i64>,
    #[serde(default)]
    pub remote_ip_prefix: Option<String>,
    #[serde(default)]
    pub remote_group_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
}

/// Security group data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecGroup {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub security_group_rules: Vec<SecGroupRule>,
}

/// Create security group request
#[derive(Debug, Clone, Serialize, Default)]
pub struct CreateSecGroupOpts {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Update security group request
#[derive(Debug, Clone, Serialize, Default)]
pub struct UpdateSecGroupOpts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Create rule request
#[derive(Debug, Clone, Serialize, Default)]
pub struct CreateRuleOpts {
    pub direction: String,
    pub ethertype: String,
    pub security_group_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_range_min: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_range_max: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_ip_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_group_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct GroupEnvelope<T> {
    security_group: T,
}

#[derive(Serialize, Deserialize)]
struct RuleEnvelope<T> {
    security_group_rule: T,
}

pub async fn create_group(client: &ServiceClient, opts: &CreateSecGroupOpts) -> Result<SecGroup> {
    let url = client.service_url(&["security-groups"]);
    let resp: GroupEnvelope<SecGroup> = client
        .post(&url, &GroupEnvelope { security_group: opts })
        .await?;
    Ok(resp.security_group)
}

pub async fn get_group(client: &ServiceClient, id: &str) -> Result<SecGroup> {
    let url = client.service_url(&["security-groups", id]);
    let resp: GroupEnvelope<SecGroup> = client.get(&url).await?;
    Ok(resp.security_group)
}

pub async fn update_group(
    client: &ServiceClient,
    id: &str,
    opts: &UpdateSecGroupOpts,
) -> Result<SecGroup> {
    let url = client.service_url(&["security-groups", id]);
    let resp: GroupEnvelope<SecGroup> = client
        .put(&url, &GroupEnvelope { security_group: opts })
        .await?;
    Ok(resp.security_group)
}

pub async fn delete_group(client: &ServiceClient, id: &str) -> Result<()> {
    client
        .delete(&client.service_url(&["security-groups", id]))
        .await
}

pub async fn create_rule(client: &ServiceClient, opts: &CreateRuleOpts) -> Result<SecGroupRule> {
    let url = client.service_url(&["security-group-rules"]);
    let resp: RuleEnvelope<SecGroupRule> = client
        .post(&url, &RuleEnvelope { security_group_rule: opts })
        .await?;
    Ok(resp.security_group_rule)
}

pub async fn get_rule(client: &ServiceClient, id: &str) -> Result<SecGroupRule> {
    let url = client.service_url(&["security-group-rules", id]);
    let resp: RuleEnvelope<SecGroupRule> = client.get(&url).await?;
    Ok(resp.security_group_rule)
}

pub async fn delete_rule(client: &ServiceClient, id: &str) -> Result<()> {
    client
        .delete(&client.service_url(&["security-group-rules", id]))
        .await
}
