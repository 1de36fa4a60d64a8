//! NAT gateway service (v2.0)

use crate::client::ServiceClient;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// NAT gateway data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NatGateway {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub spec: String,
    pub router_id: String,
    pub internal_network_id: String,
    pub status: String,
    #[serde(default)]
    pub admin_state_up: bool,
    #[serde(default)]
    pub tenant_id: Option<String>,
}

/// Create NAT gateway request
#[derive(Debug, Clone, Serialize, Default)]
pub struct CreateNatGatewayOpts {
    pub name: String,
    pub spec: String,
    pub router_id: String,
    pub internal_network_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Update NAT gateway request
#[derive(Debug, Clone, Serialize, Default)]
pub struct UpdateNatGatewayOpts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    nat_gateway: T,
}

pub async fn create(client: &ServiceClient, opts: &CreateNatGatewayOpts) -> Result<NatGateway> {
    let url = client.service_url(&["nat_gateways"]);
    let resp: Envelope<NatGateway> = client.post(&url, &Envelope { nat_gateway: opts }).await?;
    Ok(resp.nat_gateway)
}

pub async fn get(client: &ServiceClient, id: &str) -> Result<NatGateway> {
    let url = client.service_url(&["nat_gateways", id]);
    let resp: Envelope<NatGateway> = client.get(&url).await?;
    Ok(resp.nat_gateway)
}

pub async fn update(
    client: &ServiceClient,
    id: &str,
    opts: &UpdateNatGatewayOpts,
) -> Result<NatGateway> {
    let url = client.service_url(&["nat_gateways", id]);
    let resp: Envelope<NatGateway> = client.put(&url, &Envelope { nat_gateway: opts }).await?;
    Ok(resp.nat_gateway)
}

pub async fn delete(client: &ServiceClient, id: &str) -> Result<()> {
    client.delete(&client.service_url(&["nat_gateways", id])).await
}
