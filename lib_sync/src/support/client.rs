//! Page-level access to the support portal.
//!
//! `SourceApi` is the seam the reader paginates over. `SupportClient` is the
//! HTTP implementation: `GET openapi/v1/bi/<resource>?...&max=N[&marker=M]`
//! with basic authentication, answering `{ "data": [...], "marker": int }`.

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use url::form_urlencoded;

use crate::configs::config_sync::SyncConfig;
use crate::errors::SyncError;
use crate::retrieve::ky_http::{ApiClient, ClientAuth};
use crate::support::reader::Marker;

/// The two listings the engine reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    /// Company/subscription records of one product.
    Maintenances { product: String, region: String },
    /// Maintenance history entries.
    MaintenanceRecords { region: String },
}

impl Resource {
    fn path(&self) -> &'static str {
        match self {
            Resource::Maintenances { .. } => "openapi/v1/bi/maintenances",
            Resource::MaintenanceRecords { .. } => "openapi/v1/bi/maintenance-records",
        }
    }
}

/// One page request: which listing, how many rows, and where to continue from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub resource: Resource,
    pub max: u32,
    pub marker: Marker,
}

impl PageRequest {
    /// Relative path with query string. The marker is omitted on the first page.
    pub fn path_and_query(&self) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        match &self.resource {
            Resource::Maintenances { product, region } => {
                query.append_pair("region", region);
                query.append_pair("product", product);
            }
            Resource::MaintenanceRecords { region } => {
                query.append_pair("region", region);
            }
        }
        query.append_pair("max", &self.max.to_string());
        if let Some(marker) = self.marker.query_value() {
            query.append_pair("marker", &marker.to_string());
        }
        format!("{}?{}", self.resource.path(), query.finish())
    }
}

/// A page as sent by the portal, records still undecoded.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPage {
    #[serde(default)]
    data: Option<Vec<serde_json::Value>>,
    pub marker: i64,
}

impl RawPage {
    pub fn new(data: Vec<serde_json::Value>, marker: i64) -> Self {
        Self {
            data: Some(data),
            marker,
        }
    }

    pub fn into_data(self) -> Vec<serde_json::Value> {
        self.data.unwrap_or_default()
    }
}

#[async_trait]
pub trait SourceApi: Send + Sync {
    async fn fetch_page(&self, request: &PageRequest) -> Result<RawPage, SyncError>;
}

/// HTTP client of the support portal.
pub struct SupportClient {
    client: ApiClient,
}

impl SupportClient {
    pub fn new(config: &SyncConfig) -> Result<Self, SyncError> {
        let auth = if config.support_username.is_empty() {
            ClientAuth::None
        } else {
            ClientAuth::Basic {
                username: config.support_username.clone(),
                password: config.support_password.clone(),
            }
        };
        let client = ApiClient::new(&config.support_endpoint, auth, config.source_retries)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SourceApi for SupportClient {
    async fn fetch_page(&self, request: &PageRequest) -> Result<RawPage, SyncError> {
        let path = request.path_and_query();
        log::debug!("GET {}{}", self.client.base_url(), path);

        let response = self
            .client
            .request::<RawPage, ()>(Method::GET, &path, None, None)
            .await?;
        if !response.success {
            return Err(SyncError::http_status(response.status, response.error_body));
        }
        response
            .data
            .ok_or_else(|| SyncError::Decode(format!("empty page body from {}", path)))
    }
}
