//! OpenStack Manila Adapter
//!
//! Talks to the Manila v2 API over HTTP after authenticating against
//! Keystone v3 with a password.

use crate::domain::ports::{
    AccessRequest, AccessRule, ApiVersion, CreateShareRequest, ExportLocation, Share,
    SharedFileSystemApi,
};
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

const MANILA_SERVICE: &str = "manila";
const SHARE_SERVICE_TYPE: &str = "sharev2";
const MICROVERSION_HEADER: &str = "X-OpenStack-Manila-API-Version";
const SUBJECT_TOKEN_HEADER: &str = "X-Subject-Token";
const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the OpenStack adapter
#[derive(Debug, Clone)]
pub struct OpenStackConfig {
    /// Keystone auth URL
    pub auth_url: String,
    /// Username
    pub username: String,
    /// Password (should use secrets in production)
    pub password: String,
    /// Project name
    pub project_name: String,
    /// User domain name
    pub user_domain_name: String,
    /// Project domain name
    pub project_domain_name: String,
    /// Region name
    pub region: String,
    /// Microversion pinned on every Manila request
    pub microversion: String,
}

impl Default for OpenStackConfig {
    fn default() -> Self {
        Self {
            auth_url: "http://keystone:5000/v3".to_string(),
            username: "admin".to_string(),
            password: String::new(),
            project_name: "admin".to_string(),
            user_domain_name: "Default".to_string(),
            project_domain_name: "Default".to_string(),
            region: "RegionOne".to_string(),
            microversion: "2.21".to_string(),
        }
    }
}

// =============================================================================
// Keystone Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Token,
}

#[derive(Debug, Deserialize)]
struct Token {
    #[serde(default)]
    catalog: Vec<CatalogEntry>,
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    #[serde(rename = "type")]
    service_type: String,
    #[serde(default)]
    endpoints: Vec<Endpoint>,
}

#[derive(Debug, Deserialize)]
struct Endpoint {
    interface: String,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    region_id: Option<String>,
    url: String,
}

// =============================================================================
// Manila Envelopes
// =============================================================================

#[derive(Debug, Deserialize)]
struct ShareEnvelope {
    share: Share,
}

#[derive(Debug, Serialize)]
struct CreateShareEnvelope<'a> {
    share: &'a CreateShareRequest,
}

#[derive(Debug, Deserialize)]
struct ExportLocationsEnvelope {
    export_locations: Vec<ExportLocation>,
}

#[derive(Debug, Deserialize)]
struct AccessEnvelope {
    access: AccessRule,
}

#[derive(Debug, Deserialize)]
struct VersionsEnvelope {
    versions: Vec<ApiVersion>,
}

// =============================================================================
// Manila Client
// =============================================================================

/// Manila v2 API client
pub struct ManilaClient {
    http: reqwest::Client,
    /// Share service endpoint, including the project ID
    endpoint: String,
    token: String,
    microversion: String,
}

impl ManilaClient {
    /// Authenticate with Keystone and locate the share service endpoint
    pub async fn authenticate(config: &OpenStackConfig) -> Result<Self> {
        let http = reqwest::Client::new();
        let url = format!("{}/auth/tokens", config.auth_url.trim_end_matches('/'));

        let body = json!({
            "auth": {
                "identity": {
                    "methods": ["password"],
                    "password": {
                        "user": {
                            "name": config.username,
                            "domain": { "name": config.user_domain_name },
                            "password": config.password,
                        }
                    }
                },
                "scope": {
                    "project": {
                        "name": config.project_name,
                        "domain": { "name": config.project_domain_name },
                    }
                }
            }
        });

        debug!("Authenticating {} against {}", config.username, url);
        let response = http.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(Error::Authentication(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }

        let token = response
            .headers()
            .get(SUBJECT_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| Error::Authentication("response carries no subject token".into()))?;

        let body: TokenResponse = response.json().await?;
        let endpoint = find_endpoint(&body.token.catalog, SHARE_SERVICE_TYPE, &config.region)?;
        info!("Using Manila endpoint {}", endpoint);

        Ok(Self::with_token(endpoint, token, config.microversion.clone()))
    }

    /// Build a client for an already known endpoint and token
    pub fn with_token(
        endpoint: impl Into<String>,
        token: impl Into<String>,
        microversion: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            token: token.into(),
            microversion: microversion.into(),
        }
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header(AUTH_TOKEN_HEADER, &self.token)
            .header(MICROVERSION_HEADER, format!("share {}", self.microversion))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint, path)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        operation: &str,
        request: RequestBuilder,
    ) -> Result<T> {
        let response = check_status(operation, request.send().await?).await?;
        Ok(response.json().await?)
    }
}

/// Pick the public endpoint of a service in a region from a token catalog
fn find_endpoint(catalog: &[CatalogEntry], service_type: &str, region: &str) -> Result<String> {
    catalog
        .iter()
        .filter(|entry| entry.service_type == service_type)
        .flat_map(|entry| entry.endpoints.iter())
        .find(|ep| {
            ep.interface == "public"
                && (ep.region.as_deref() == Some(region) || ep.region_id.as_deref() == Some(region))
        })
        .map(|ep| ep.url.clone())
        .ok_or_else(|| Error::ResourceNotFound {
            kind: "Endpoint".into(),
            name: format!("{service_type}@{region}"),
        })
}

/// Versions document URL: the endpoint without its `/v2/<project>` suffix
fn versions_url(endpoint: &str) -> String {
    let trimmed = endpoint.trim_end_matches('/');
    let root = trimmed
        .rsplit_once('/')
        .and_then(|(rest, _project)| rest.rsplit_once('/'))
        .map_or(trimmed, |(root, _version)| root);
    format!("{root}/")
}

async fn check_status(operation: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::OpenStackApi {
        service: MANILA_SERVICE.into(),
        reason: format!("{operation} returned {status}: {body}"),
    })
}

#[async_trait]
impl SharedFileSystemApi for ManilaClient {
    async fn api_version(&self) -> Result<ApiVersion> {
        let url = versions_url(&self.endpoint);
        let envelope: VersionsEnvelope = self
            .send("list versions", self.request(Method::GET, &url))
            .await?;

        envelope
            .versions
            .into_iter()
            .find(|v| v.id.starts_with("v2"))
            .ok_or_else(|| Error::ResourceNotFound {
                kind: "ApiVersion".into(),
                name: "v2".into(),
            })
    }

    fn microversion(&self) -> &str {
        &self.microversion
    }

    async fn create_share(&self, request: &CreateShareRequest) -> Result<Share> {
        let envelope: ShareEnvelope = self
            .send(
                "create share",
                self.request(Method::POST, &self.url("shares"))
                    .json(&CreateShareEnvelope { share: request }),
            )
            .await?;
        Ok(envelope.share)
    }

    async fn get_share(&self, share_id: &str) -> Result<Share> {
        let envelope: ShareEnvelope = self
            .send(
                "get share",
                self.request(Method::GET, &self.url(&format!("shares/{share_id}"))),
            )
            .await?;
        Ok(envelope.share)
    }

    async fn list_export_locations(&self, share_id: &str) -> Result<Vec<ExportLocation>> {
        let envelope: ExportLocationsEnvelope = self
            .send(
                "list export locations",
                self.request(
                    Method::GET,
                    &self.url(&format!("shares/{share_id}/export_locations")),
                ),
            )
            .await?;
        Ok(envelope.export_locations)
    }

    async fn grant_access(&self, share_id: &str, access: &AccessRequest) -> Result<AccessRule> {
        let envelope: AccessEnvelope = self
            .send(
                "grant access",
                self.request(Method::POST, &self.url(&format!("shares/{share_id}/action")))
                    .json(&json!({ "allow_access": access })),
            )
            .await?;
        Ok(envelope.access)
    }

    async fn delete_share(&self, share_id: &str) -> Result<()> {
        let response = self
            .request(Method::DELETE, &self.url(&format!("shares/{share_id}")))
            .send()
            .await?;
        check_status("delete share", response).await?;
        Ok(())
    }
}
