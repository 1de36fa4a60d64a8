//! Provider configuration and credential resolution
//!
//! The provider block is merged over `OS_*` environment variables, then turned
//! into a [`Config`] that hands out one signed [`ServiceClient`] per service.

use flexibleengine_sdk::services::iam;
use flexibleengine_sdk::{build_http_client, ClientError, Credentials, ServiceClient};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

pub const DEFAULT_CLOUD: &str = "prod-cloud-ocb.orange-business.com";

pub const ENV_REGION: &str = "OS_REGION_NAME";
pub const ENV_ACCESS_KEY: &str = "OS_ACCESS_KEY";
pub const ENV_SECRET_KEY: &str = "OS_SECRET_KEY";
pub const ENV_SECURITY_TOKEN: &str = "OS_SECURITY_TOKEN";
pub const ENV_PROJECT_ID: &str = "OS_PROJECT_ID";
pub const ENV_PROJECT_NAME: &str = "OS_PROJECT_NAME";
pub const ENV_AUTH_URL: &str = "OS_AUTH_URL";
pub const ENV_INSECURE: &str = "OS_INSECURE";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set in the provider block or through {1}")]
    Missing(&'static str, &'static str),
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] ClientError),
    #[error("failed to look up project '{name}': {source}")]
    ProjectLookup {
        name: String,
        #[source]
        source: ClientError,
    },
    #[error("no project named '{0}' is visible to these credentials")]
    ProjectNotFound(String),
}

/// Provider block as sent by Terraform
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub region: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub security_token: Option<String>,
    pub project_id: Option<String>,
    pub project_name: Option<String>,
    pub auth_url: Option<String>,
    pub cloud: Option<String>,
    pub insecure: Option<bool>,
    /// Per-service endpoint overrides, keyed by service name (`vpc`, `rds`, ...)
    pub endpoints: Option<HashMap<String, String>>,
}

impl ProviderConfig {
    /// Configuration taken from the environment only
    pub fn from_env() -> Self {
        Self::default().merge_env()
    }

    /// Fill unset fields from `OS_*` environment variables
    pub fn merge_env(self) -> Self {
        self.merge_from(|key| std::env::var(key).ok())
    }

    /// Fill unset fields using `lookup`. Empty values count as unset.
    pub fn merge_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let fill = |field: &mut Option<String>, key: &str| {
            if field.as_deref().map_or(true, str::is_empty) {
                *field = get(key);
            }
        };

        fill(&mut self.region, ENV_REGION);
        fill(&mut self.access_key, ENV_ACCESS_KEY);
        fill(&mut self.secret_key, ENV_SECRET_KEY);
        fill(&mut self.security_token, ENV_SECURITY_TOKEN);
        fill(&mut self.project_id, ENV_PROJECT_ID);
        fill(&mut self.project_name, ENV_PROJECT_NAME);
        fill(&mut self.auth_url, ENV_AUTH_URL);
        if self.insecure.is_none() {
            self.insecure = get(ENV_INSECURE).map(|v| matches!(v.as_str(), "1" | "true" | "TRUE"));
        }
        self
    }
}

/// Resolved provider configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub region: String,
    pub project_id: String,
    pub cloud: String,
    credentials: Credentials,
    endpoints: HashMap<String, String>,
    http: reqwest::Client,
}

impl Config {
    /// Validate the provider block and resolve the project ID.
    pub async fn load(provider: ProviderConfig) -> Result<Self, ConfigError> {
        let region = provider
            .region
            .clone()
            .ok_or(ConfigError::Missing("region", ENV_REGION))?;
        let access_key = provider
            .access_key
            .clone()
            .ok_or(ConfigError::Missing("access_key", ENV_ACCESS_KEY))?;
        let secret_key = provider
            .secret_key
            .clone()
            .ok_or(ConfigError::Missing("secret_key", ENV_SECRET_KEY))?;

        let mut credentials = Credentials::new(&access_key, &secret_key);
        if let Some(token) = &provider.security_token {
            credentials = credentials.with_security_token(token);
        }

        let http = build_http_client(provider.insecure.unwrap_or(false))
            .map_err(ConfigError::HttpClient)?;

        let mut endpoints: HashMap<String, String> = provider.endpoints.clone().unwrap_or_default();
        if let Some(auth_url) = &provider.auth_url {
            // auth_url points at the identity API root (`.../v3`)
            endpoints
                .entry("iam".to_string())
                .or_insert_with(|| auth_url.trim_end_matches('/').trim_end_matches("/v3").to_string());
        }

        let mut config = Self {
            region,
            project_id: String::new(),
            cloud: provider.cloud.clone().unwrap_or_else(|| DEFAULT_CLOUD.to_string()),
            credentials,
            endpoints,
            http,
        };

        config.project_id = match provider.project_id {
            Some(id) => id,
            None => {
                let name = provider
                    .project_name
                    .clone()
                    .unwrap_or_else(|| config.region.clone());
                config.lookup_project_id(&name).await?
            }
        };

        tracing::info!(region = %config.region, project_id = %config.project_id, "provider configured");
        Ok(config)
    }

    async fn lookup_project_id(&self, name: &str) -> Result<String, ConfigError> {
        let projects = iam::list_projects(&self.iam_v3_client(), name)
            .await
            .map_err(|source| ConfigError::ProjectLookup {
                name: name.to_string(),
                source,
            })?;

        projects
            .into_iter()
            .find(|p| p.name == name)
            .map(|p| p.id)
            .ok_or_else(|| ConfigError::ProjectNotFound(name.to_string()))
    }

    /// Endpoint root for a service, honouring overrides
    pub fn endpoint(&self, service: &str) -> String {
        if let Some(url) = self.endpoints.get(service) {
            return url.clone();
        }
        let host = match service {
            // Neutron APIs are served by the VPC endpoint
            "networking" => "vpc",
            "swr" => "swr-api",
            other => other,
        };
        format!("https://{}.{}.{}", host, self.region, self.cloud)
    }

    fn client(&self, service: &str, base_path: &str) -> ServiceClient {
        ServiceClient::new(
            self.http.clone(),
            &self.endpoint(service),
            base_path,
            self.credentials.clone(),
        )
        .with_project_id(&self.project_id)
    }

    pub fn iam_v3_client(&self) -> ServiceClient {
        ServiceClient::new(
            self.http.clone(),
            &self.endpoint("iam"),
            "v3",
            self.credentials.clone(),
        )
    }

    pub fn vpc_v1_client(&self) -> ServiceClient {
        self.client("vpc", &format!("v1/{}", self.project_id))
    }

    /// Project-scoped v2.0 VPC client used for tags
    pub fn vpc_v2_client(&self) -> ServiceClient {
        self.client("vpc", &format!("v2.0/{}", self.project_id))
    }

    pub fn networking_v2_client(&self) -> ServiceClient {
        self.client("networking", "v2.0")
    }

    pub fn nat_v2_client(&self) -> ServiceClient {
        self.client("nat", "v2.0")
    }

    pub fn rds_v3_client(&self) -> ServiceClient {
        self.client("rds", &format!("v3/{}", self.project_id))
    }

    pub fn dcs_v2_client(&self) -> ServiceClient {
        self.client("dcs", &format!("v2/{}", self.project_id))
    }

    pub fn swr_v2_client(&self) -> ServiceClient {
        self.client("swr", "v2")
    }

    /// Registry host for SWR image paths
    pub fn swr_login_server(&self) -> String {
        format!("swr.{}.{}", self.region, self.cloud)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_merge_fills_unset_fields() {
        let provider = ProviderConfig {
            region: Some("eu-west-0".into()),
            ..Default::default()
        }
        .merge_from(env(&[
            (ENV_REGION, "eu-west-1"),
            (ENV_ACCESS_KEY, "AK"),
            (ENV_SECRET_KEY, "SK"),
            (ENV_INSECURE, "true"),
        ]));

        assert_eq!(provider.region.as_deref(), Some("eu-west-0"));
        assert_eq!(provider.access_key.as_deref(), Some("AK"));
        assert_eq!(provider.secret_key.as_deref(), Some("SK"));
        assert_eq!(provider.insecure, Some(true));
        assert!(provider.project_id.is_none());
    }

    #[test]
    fn test_merge_ignores_empty_values() {
        let provider = ProviderConfig {
            access_key: Some(String::new()),
            ..Default::default()
        }
        .merge_from(env(&[(ENV_ACCESS_KEY, "AK"), (ENV_PROJECT_ID, "")]));

        assert_eq!(provider.access_key.as_deref(), Some("AK"));
        assert!(provider.project_id.is_none());
    }

    #[tokio::test]
    async fn test_load_requires_credentials() {
        let err = Config::load(ProviderConfig {
            region: Some("eu-west-0".into()),
            ..Default::default()
        })
        .await
        .unwrap_err();

        assert!(matches!(err, ConfigError::Missing("access_key", ENV_ACCESS_KEY)));
    }

    #[tokio::test]
    async fn test_endpoints() {
        let mut endpoints = HashMap::new();
        endpoints.insert("rds".to_string(), "http://localhost:9000".to_string());

        let config = Config::load(ProviderConfig {
            region: Some("eu-west-0".into()),
            access_key: Some("AK".into()),
            secret_key: Some("SK".into()),
            project_id: Some("proj".into()),
            endpoints: Some(endpoints),
            ..Default::default()
        })
        .await
        .unwrap();

        assert_eq!(
            config.endpoint("vpc"),
            "https://vpc.eu-west-0.prod-cloud-ocb.orange-business.com"
        );
        assert_eq!(
            config.endpoint("networking"),
            "https://vpc.eu-west-0.prod-cloud-ocb.orange-business.com"
        );
        assert_eq!(
            config.endpoint("swr"),
            "https://swr-api.eu-west-0.prod-cloud-ocb.orange-business.com"
        );
        assert_eq!(config.endpoint("rds"), "http://localhost:9000");
        assert_eq!(
            config.rds_v3_client().service_url(&["instances"]),
            "http://localhost:9000/v3/proj/instances"
        );
        assert_eq!(
            config.swr_login_server(),
            "swr.eu-west-0.prod-cloud-ocb.orange-business.com"
        );
    }
}
