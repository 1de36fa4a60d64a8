//! Identity service: project lookup

use crate::client::ServiceClient;
use crate::error::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub domain_id: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

#[derive(Deserialize)]
struct ProjectList {
    #[serde(default)]
    projects: Vec<Project>,
}

/// List projects with the given name (`GET /v3/projects?name=`)
pub async fn list_projects(client: &ServiceClient, name: &str) -> Result<Vec<Project>> {
    let url = client.service_url(&["projects"]);
    let list: ProjectList = client
        .get_with_query(&url, &[("name", name.to_string())])
        .await?;
    Ok(list.projects)
}
