//! VPC service (v1): VPCs, subnets and resource tags

use super::Tag;
use crate::client::ServiceClient;
use crate::error::Result;
use serde::{Deserialize, Serialize};

// ============================================================================
// VPCs
// ============================================================================

/// VPC data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vpc {
    pub id: String,
    pub name: String,
    pub cidr: String,
    pub status: String,
    #[serde(default)]
    pub description: String,
}

/// Create VPC request
#[derive(Debug, Clone, Serialize, Default)]
pub struct CreateVpcOpts {
    pub name: String,
    pub cidr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Update VPC request
#[derive(Debug, Clone, Serialize, Default)]
pub struct UpdateVpcOpts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cidr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct VpcEnvelope<T> {
    vpc: T,
}

#[derive(Deserialize)]
struct VpcList {
    #[serde(default)]
    vpcs: Vec<Vpc>,
}

pub async fn create(client: &ServiceClient, opts: &CreateVpcOpts) -> Result<Vpc> {
    let url = client.service_url(&["vpcs"]);
    let resp: VpcEnvelope<Vpc> = client.post(&url, &VpcEnvelope { vpc: opts }).await?;
    Ok(resp.vpc)
}

pub async fn get(client: &ServiceClient, id: &str) -> Result<Vpc> {
    let url = client.service_url(&["vpcs", id]);
    let resp: VpcEnvelope<Vpc> = client.get(&url).await?;
    Ok(resp.vpc)
}

pub async fn list(client: &ServiceClient) -> Result<Vec<Vpc>> {
    let url = client.service_url(&["vpcs"]);
    let resp: VpcList = client.get(&url).await?;
    Ok(resp.vpcs)
}

pub async fn update(client: &ServiceClient, id: &str, opts: &UpdateVpcOpts) -> Result<Vpc> {
    let url = client.service_url(&["vpcs", id]);
    let resp: VpcEnvelope<Vpc> = client.put(&url, &VpcEnvelope { vpc: opts }).await?;
    Ok(resp.vpc)
}

pub async fn delete(client: &ServiceClient, id: &str) -> Result<()> {
    client.delete(&client.service_url(&["vpcs", id])).await
}

// ============================================================================
// Subnets
// ============================================================================

/// Subnet data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subnet {
    pub id: String,
    pub name: String,
    pub cidr: String,
    pub gateway_ip: String,
    pub vpc_id: String,
    pub status: String,
    #[serde(default)]
    pub dhcp_enable: bool,
    #[serde(default)]
    pub primary_dns: Option<String>,
    #[serde(default)]
    pub secondary_dns: Option<String>,
    #[serde(default)]
    pub availability_zone: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Neutron subnet ID
    #[serde(default)]
    pub neutron_subnet_id: Option<String>,
    /// Neutron network ID; the subnet ID itself on FlexibleEngine
    #[serde(default)]
    pub neutron_network_id: Option<String>,
}

/// Create subnet request
#[derive(Debug, Clone, Serialize, Default)]
pub struct CreateSubnetOpts {
    pub name: String,
    pub cidr: String,
    pub gateway_ip: String,
    pub vpc_id: String,
    pub dhcp_enable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_dns: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_dns: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Update subnet request; name is mandatory for the API
#[derive(Debug, Clone, Serialize, Default)]
pub struct UpdateSubnetOpts {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dhcp_enable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_dns: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_dns: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct SubnetEnvelope<T> {
    subnet: T,
}

#[derive(Deserialize)]
struct SubnetList {
    #[serde(default)]
    subnets: Vec<Subnet>,
}

pub async fn create_subnet(client: &ServiceClient, opts: &CreateSubnetOpts) -> Result<Subnet> {
    let url = client.service_url(&["subnets"]);
    let resp: SubnetEnvelope<Subnet> = client.post(&url, &SubnetEnvelope { subnet: opts }).await?;
    Ok(resp.subnet)
}

pub async fn get_subnet(client: &ServiceClient, id: &str) -> Result<Subnet> {
    let url = client.service_url(&["subnets", id]);
    let resp: SubnetEnvelope<Subnet> = client.get(&url).await?;
    Ok(resp.subnet)
}

/// List subnets, optionally restricted to one VPC
pub async fn list_subnets(client: &ServiceClient, vpc_id: Option<&str>) -> Result<Vec<Subnet>> {
    let url = client.service_url(&["subnets"]);
    let query = [("vpc_id", vpc_id.unwrap_or_default().to_string())];
    let resp: SubnetList = client.get_with_query(&url, &query).await?;
    Ok(resp.subnets)
}

pub async fn update_subnet(
    client: &ServiceClient,
    vpc_id: &str,
    id: &str,
    opts: &UpdateSubnetOpts,
) -> Result<()> {
    let url = client.service_url(&["vpcs", vpc_id, "subnets", id]);
    let _: serde_json::Value = client.put(&url, &SubnetEnvelope { subnet: opts }).await?;
    Ok(())
}

pub async fn delete_subnet(client: &ServiceClient, vpc_id: &str, id: &str) -> Result<()> {
    client
        .delete(&client.service_url(&["vpcs", vpc_id, "subnets", id]))
        .await
}

// ============================================================================
// Tags (v2.0 tag API on the VPC endpoint)
// ============================================================================

#[derive(Deserialize)]
struct TagList {
    #[serde(default)]
    tags: Vec<Tag>,
}

#[derive(Serialize)]
struct TagAction<'a> {
    action: &'a str,
    tags: &'a [Tag],
}

/// Get the tags of a resource. `client` is the v2.0 project-scoped client.
pub async fn get_tags(client: &ServiceClient, resource_type: &str, id: &str) -> Result<Vec<Tag>> {
    let url = client.service_url(&[resource_type, id, "tags"]);
    let resp: TagList = client.get(&url).await?;
    Ok(resp.tags)
}

/// Batch create or delete tags (`action` is `create` or `delete`)
pub async fn batch_tags(
    client: &ServiceClient,
    resource_type: &str,
    id: &str,
    action: &str,
    tags: &[Tag],
) -> Result<()> {
    if tags.is_empty() {
        return Ok(());
    }
    let url = client.service_url(&[resource_type, id, "tags", "action"]);
    let _: serde_json::Value = client.post(&url, &TagAction { action, tags }).await?;
    Ok(())
}
