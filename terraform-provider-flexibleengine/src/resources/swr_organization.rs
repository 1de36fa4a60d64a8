//! `flexibleengine_swr_organization`

use super::{sdk_error, Resource, ResourceResult, ResourceState};
use crate::config::Config;
use crate::schema::{Diagnostic, ResourceSchema, SchemaAttribute, SchemaBlock};
use async_trait::async_trait;
use flexibleengine_sdk::services::swr;
use serde_json::json;

pub struct SwrOrganizationResource;

impl SwrOrganizationResource {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SwrOrganizationResource {
    fn default() -> Self {
        Self::new()
    }
}

/// Organization names: 1-64 chars of lowercase letters, digits, `.`, `_` and
/// `-`, starting with a letter and ending with a letter or digit.
fn validate_name(name: &str) -> ResourceResult<()> {
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-'));
    let starts = name.chars().next().is_some_and(|c| c.is_ascii_lowercase());
    let ends = name
        .chars()
        .last()
        .is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit());

    if valid_chars && starts && ends && name.len() <= 64 {
        Ok(())
    } else {
        Err(vec![Diagnostic::error(&format!("Invalid organization name \"{}\"", name))
            .with_detail("Use 1-64 lowercase letters, digits, '.', '_' or '-', starting with a letter")
            .with_attribute(vec!["name".to_string()])])
    }
}

#[async_trait]
impl Resource for SwrOrganizationResource {
    fn type_name(&self) -> &str {
        "flexibleengine_swr_organization"
    }

    fn schema(&self) -> ResourceSchema {
        let block = SchemaBlock::new()
            .with_attribute(
                "name",
                SchemaAttribute::string()
                    .with_description("Organization (namespace) name")
                    .required()
                    .force_new(),
            )
            .with_attribute("creator", SchemaAttribute::string().computed())
            .with_attribute(
                "permission",
                SchemaAttribute::string()
                    .with_description("Permission of the caller: Manage, Write or Read")
                    .computed(),
            )
            .with_attribute(
                "login_server",
                SchemaAttribute::string()
                    .with_description("Registry host to push images to")
                    .computed(),
            )
            .with_description("Manages an SWR organization");

        ResourceSchema::new(1, block)
    }

    async fn create(
        &self,
        config: &Config,
        planned: &ResourceState,
    ) -> ResourceResult<ResourceState> {
        let name = planned.require_string("name")?;
        validate_name(&name)?;

        swr::create_organization(&config.swr_v2_client(), &name)
            .await
            .map_err(|e| sdk_error("Error creating SWR organization", e))?;
        tracing::info!(name = %name, "SWR organization created");

        let mut state = planned.clone();
        state.set("id", json!(name));
        self.read(config, &state).await
    }

    async fn read(
        &self,
        config: &Config,
        current: &ResourceState,
    ) -> ResourceResult<ResourceState> {
        let id = current.id()?;

        let org = match swr::get_organization(&config.swr_v2_client(), &id).await {
            Ok(org) => org,
            Err(e) if e.is_not_found() => {
                tracing::warn!(name = %id, "SWR organization not found, removing from state");
                return Ok(ResourceState::new());
            }
            Err(e) => return Err(sdk_error("Error retrieving SWR organization", e)),
        };

        let mut state = ResourceState::new();
        state.set("id", json!(org.name));
        state.set("name", json!(org.name));
        state.set("creator", json!(org.creator_name));
        state.set("permission", json!(org.permission()));
        state.set("login_server", json!(config.swr_login_server()));
        Ok(state)
    }

    async fn update(
        &self,
        config: &Config,
        current: &ResourceState,
        _planned: &ResourceState,
    ) -> ResourceResult<ResourceState> {
        // The name forces replacement; nothing else is writable
        self.read(config, current).await
    }

    async fn delete(&self, config: &Config, current: &ResourceState) -> ResourceResult<()> {
        let id = current.id()?;

        match swr::delete_organization(&config.swr_v2_client(), &id).await {
            Ok(()) => {
                tracing::info!(name = %id, "SWR organization deleted");
                Ok(())
            }
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(sdk_error("Error deleting SWR organization", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("terraform-test").is_ok());
        assert!(validate_name("org.v1_x").is_ok());
        assert!(validate_name("Upper").is_err());
        assert!(validate_name("1abc").is_err());
        assert!(validate_name("abc-").is_err());
        assert!(validate_name("").is_err());
        assert!(validate_name(&"a".repeat(65)).is_err());
    }
}
