//! `flexibleengine_swr_repository`
//!
//! Image repository inside an SWR organization. The ID is
//! `<organization>/<name>`.

use super::{sdk_error, split_composite_id, Resource, ResourceResult, ResourceState};
use crate::config::Config;
use crate::schema::{ResourceSchema, SchemaAttribute, SchemaBlock};
use async_trait::async_trait;
use flexibleengine_sdk::services::swr;
use serde_json::json;

const ID_FORMAT: &str = "organization>/<name";
const DEFAULT_CATEGORY: &str = "linux";

pub struct SwrRepositoryResource;

impl SwrRepositoryResource {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SwrRepositoryResource {
    fn default() -> Self {
        Self::new()
    }
}

fn repository_state(organization: &str, repo: &swr::Repository) -> ResourceState {
    let mut state = ResourceState::new();
    state.set("id", json!(format!("{}/{}", organization, repo.name)));
    state.set("organization", json!(organization));
    state.set("name", json!(repo.name));
    state.set("is_public", json!(repo.is_public));
    state.set("description", json!(repo.description));
    state.set("category", json!(repo.category));
    state.set("repository_id", json!(repo.id));
    state.set("path", json!(repo.path));
    state.set("internal_path", json!(repo.internal_path));
    state.set("num_images", json!(repo.num_images));
    state.set("size", json!(repo.size));
    state
}

#[async_trait]
impl Resource for SwrRepositoryResource {
    fn type_name(&self) -> &str {
        "flexibleengine_swr_repository"
    }

    fn schema(&self) -> ResourceSchema {
        let block = SchemaBlock::new()
            .with_attribute(
                "organization",
                SchemaAttribute::string().required().force_new(),
            )
            .with_attribute("name", SchemaAttribute::string().required().force_new())
            .with_attribute(
                "is_public",
                SchemaAttribute::bool().optional().with_default(json!(false)),
            )
            .with_attribute("description", SchemaAttribute::string().optional().computed())
            .with_attribute(
                "category",
                SchemaAttribute::string()
                    .with_description("app_server, linux, framework_app, database, lang, other, windows or arm")
                    .optional()
                    .with_default(json!(DEFAULT_CATEGORY)),
            )
            .with_attribute("repository_id", SchemaAttribute::number().computed())
            .with_attribute("path", SchemaAttribute::string().computed())
            .with_attribute("internal_path", SchemaAttribute::string().computed())
            .with_attribute("num_images", SchemaAttribute::number().computed())
            .with_attribute("size", SchemaAttribute::number().computed())
            .with_description("Manages an SWR image repository");

        ResourceSchema::new(1, block)
    }

    async fn create(
        &self,
        config: &Config,
        planned: &ResourceState,
    ) -> ResourceResult<ResourceState> {
        let organization = planned.require_string("organization")?;
        let name = planned.require_string("name")?;

        let opts = swr::CreateRepositoryOpts {
            repository: name.clone(),
            is_public: planned.get_bool("is_public").unwrap_or(false),
            category: planned.get_string("category"),
            description: planned.get_string("description"),
        };
        swr::create_repository(&config.swr_v2_client(), &organization, &opts)
            .await
            .map_err(|e| sdk_error("Error creating SWR repository", e))?;
        tracing::info!(organization = %organization, name = %name, "SWR repository created");

        let mut state = planned.clone();
        state.set("id", json!(format!("{}/{}", organization, name)));
        self.read(config, &state).await
    }

    async fn read(
        &self,
        config: &Config,
        current: &ResourceState,
    ) -> ResourceResult<ResourceState> {
        let (organization, name) = split_composite_id(&current.id()?, ID_FORMAT)?;

        match swr::get_repository(&config.swr_v2_client(), &organization, &name).await {
            Ok(repo) => Ok(repository_state(&organization, &repo)),
            Err(e) if e.is_not_found() => {
                tracing::warn!(organization = %organization, name = %name, "SWR repository not found, removing from state");
                Ok(ResourceState::new())
            }
            Err(e) => Err(sdk_error("Error retrieving SWR repository", e)),
        }
    }

    async fn update(
        &self,
        config: &Config,
        current: &ResourceState,
        planned: &ResourceState,
    ) -> ResourceResult<ResourceState> {
        let (organization, name) = split_composite_id(&current.id()?, ID_FORMAT)?;

        // The API replaces all three fields at once
        let opts = swr::UpdateRepositoryOpts {
            is_public: planned.get_bool("is_public").unwrap_or(false),
            category: Some(
                planned
                    .get_string("category")
                    .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            ),
            description: Some(planned.get_string("description").unwrap_or_default()),
        };
        swr::update_repository(&config.swr_v2_client(), &organization, &name, &opts)
            .await
            .map_err(|e| sdk_error("Error updating SWR repository", e))?;

        self.read(config, current).await
    }

    async fn delete(&self, config: &Config, current: &ResourceState) -> ResourceResult<()> {
        let (organization, name) = split_composite_id(&current.id()?, ID_FORMAT)?;

        match swr::delete_repository(&config.swr_v2_client(), &organization, &name).await {
            Ok(()) => {
                tracing::info!(organization = %organization, name = %name, "SWR repository deleted");
                Ok(())
            }
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(sdk_error("Error deleting SWR repository", e)),
        }
    }

    fn import_state(&self, id: &str) -> ResourceResult<ResourceState> {
        let (organization, name) = split_composite_id(id, ID_FORMAT)?;
        let mut state = ResourceState::new();
        state.set("id", json!(id));
        state.set("organization", json!(organization));
        state.set("name", json!(name));
        Ok(state)
    }
}
