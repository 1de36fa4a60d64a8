//! Signed service client
//!
//! A `ServiceClient` is bound to one service endpoint and a base path
//! (usually the API version plus the project ID). Resource modules build URLs
//! with [`ServiceClient::service_url`] and issue requests through the typed
//! helpers below.

use crate::error::{ClientError, Result};
use crate::signer::{self, Credentials, HEADER_PROJECT_ID};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Method, Url};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
pub const USER_AGENT: &str = concat!("terraform-provider-flexibleengine/", env!("CARGO_PKG_VERSION"));

/// Build the shared HTTP client used by every service client.
pub fn build_http_client(insecure: bool) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .user_agent(USER_AGENT)
        .danger_accept_invalid_certs(insecure)
        .build()?;
    Ok(client)
}

/// Client for one FlexibleEngine service
#[derive(Clone, Debug)]
pub struct ServiceClient {
    http: reqwest::Client,
    endpoint: String,
    resource_base: String,
    project_id: Option<String>,
    credentials: Credentials,
}

impl ServiceClient {
    /// Create a new client.
    ///
    /// `endpoint` is the service root (`https://vpc.eu-west-0.<cloud>`);
    /// `base_path` is appended to it for every `service_url` call
    /// (`v1/<project_id>`).
    pub fn new(
        http: reqwest::Client,
        endpoint: &str,
        base_path: &str,
        credentials: Credentials,
    ) -> Self {
        let endpoint = format!("{}/", endpoint.trim_end_matches('/'));
        let base_path = base_path.trim_matches('/');
        let resource_base = if base_path.is_empty() {
            endpoint.clone()
        } else {
            format!("{}{}/", endpoint, base_path)
        };

        Self {
            http,
            endpoint,
            resource_base,
            project_id: None,
            credentials,
        }
    }

    /// Sign requests with `X-Project-Id`
    pub fn with_project_id(mut self, project_id: &str) -> Self {
        self.project_id = Some(project_id.to_string());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn resource_base(&self) -> &str {
        &self.resource_base
    }

    pub fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }

    /// Join path parts onto the resource base
    pub fn service_url(&self, parts: &[&str]) -> String {
        format!("{}{}", self.resource_base, parts.join("/"))
    }

    /// GET request
    pub async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.request_json(Method::GET, url, &[], None::<&()>).await
    }

    /// GET request with query parameters; empty values are skipped
    pub async fn get_with_query<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        self.request_json(Method::GET, url, query, None::<&()>)
            .await
    }

    /// POST request
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, url: &str, body: &B) -> Result<T> {
        self.request_json(Method::POST, url, &[], Some(body)).await
    }

    /// PUT request
    pub async fn put<T: DeserializeOwned, B: Serialize>(&self, url: &str, body: &B) -> Result<T> {
        self.request_json(Method::PUT, url, &[], Some(body)).await
    }

    /// PATCH request
    pub async fn patch<T: DeserializeOwned, B: Serialize>(&self, url: &str, body: &B) -> Result<T> {
        self.request_json(Method::PATCH, url, &[], Some(body)).await
    }

    /// DELETE request
    pub async fn delete(&self, url: &str) -> Result<()> {
        self.send(Method::DELETE, url, &[], None).await.map(|_| ())
    }

    async fn request_json<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<T> {
        let body = match body {
            Some(b) => Some(serde_json::to_vec(b)?),
            None => None,
        };
        let text = self.send(method, url, query, body).await?;

        // Several APIs answer 201/204 with an empty body
        let text = if text.trim().is_empty() { "null" } else { text.as_str() };
        Ok(serde_json::from_str(text)?)
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, String)],
        body: Option<Vec<u8>>,
    ) -> Result<String> {
        let mut url = Url::parse(url).map_err(|e| ClientError::InvalidUrl(format!("{}: {}", url, e)))?;
        {
            let present: Vec<_> = query.iter().filter(|(_, v)| !v.is_empty()).collect();
            if !present.is_empty() {
                let mut pairs = url.query_pairs_mut();
                for (k, v) in present {
                    pairs.append_pair(k, v);
                }
            }
        }

        let mut sign_headers = BTreeMap::new();
        if body.is_some() {
            sign_headers.insert("content-type".to_string(), "application/json".to_string());
        }
        if let Some(project_id) = &self.project_id {
            sign_headers.insert(HEADER_PROJECT_ID.to_string(), project_id.clone());
        }
        let payload = body.as_deref().unwrap_or_default();
        let authorization = signer::sign(
            &self.credentials,
            method.as_str(),
            &url,
            &mut sign_headers,
            payload,
            chrono::Utc::now(),
        );

        let mut headers = HeaderMap::new();
        for (name, value) in &sign_headers {
            // reqwest derives Host from the URL
            if name == "host" {
                continue;
            }
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                headers.insert(name, value);
            }
        }
        if let Ok(value) = HeaderValue::from_str(&authorization) {
            headers.insert(AUTHORIZATION, value);
        }

        tracing::debug!(method = %method, url = %url, "sending request");

        let mut request = self.http.request(method.clone(), url.clone()).headers(headers);
        if let Some(body) = body {
            request = request.body(body);
        }
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        tracing::debug!(method = %method, url = %url, status = status.as_u16(), "received response");

        if status.is_success() {
            Ok(text)
        } else {
            Err(ClientError::from_response(status.as_u16(), &text))
        }
    }
}
