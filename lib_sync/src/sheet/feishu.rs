//! Row-level access to the destination table.
//!
//! `SheetApi` is the seam the engine writes through; `FeishuSheet` speaks the
//! bitable records API:
//!
//! - `POST .../records/search?page_size=N` with an optional exact-match
//!   filter and an optional descending sort,
//! - `POST .../records` to create a row,
//! - `PUT  .../records/{record_id}` to update one.
//!
//! Every answer is wrapped in `{ "code": int, "msg": string, "data": ... }`;
//! a non-zero code is an application error even when the HTTP status is 200.

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::configs::config_sync::SyncConfig;
use crate::errors::SyncError;
use crate::retrieve::ky_http::{ApiClient, ClientAuth};

/// Column name -> cell value.
pub type Fields = Map<String, Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SheetRow {
    #[serde(default)]
    pub record_id: String,
    #[serde(default)]
    pub fields: Fields,
}

/// Exact match of one column against one value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub field_name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub filter: Option<Condition>,
    /// Column to sort by, descending.
    pub sort_desc: Option<String>,
    /// Restrict the returned columns.
    pub field_names: Option<Vec<String>>,
    pub page_size: Option<u32>,
}

impl SearchQuery {
    /// Rows whose `field` equals `value`.
    pub fn exact(field: &str, value: &str) -> Self {
        Self {
            filter: Some(Condition {
                field_name: field.to_string(),
                value: value.to_string(),
            }),
            ..Default::default()
        }
    }

    /// The first `page_size` rows ordered by `field` descending, only that column returned.
    pub fn top_by(field: &str, page_size: u32) -> Self {
        Self {
            sort_desc: Some(field.to_string()),
            field_names: Some(vec![field.to_string()]),
            page_size: Some(page_size),
            ..Default::default()
        }
    }

    fn body(&self) -> Value {
        let mut body = Map::new();
        if let Some(names) = &self.field_names {
            body.insert("field_names".into(), json!(names));
        }
        if let Some(field) = &self.sort_desc {
            body.insert("sort".into(), json!([{ "field_name": field, "desc": true }]));
        }
        if let Some(cond) = &self.filter {
            body.insert(
                "filter".into(),
                json!({
                    "conjunction": "and",
                    "conditions": [{
                        "field_name": cond.field_name,
                        "operator": "is",
                        "value": [cond.value],
                    }],
                }),
            );
        }
        Value::Object(body)
    }
}

#[async_trait]
pub trait SheetApi: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SheetRow>, SyncError>;
    async fn create(&self, fields: &Fields) -> Result<SheetRow, SyncError>;
    async fn update(&self, record_id: &str, fields: &Fields) -> Result<SheetRow, SyncError>;
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    msg: String,
    data: Option<T>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchData {
    #[serde(default)]
    items: Option<Vec<SheetRow>>,
}

#[derive(Debug, Deserialize)]
struct RecordData {
    record: SheetRow,
}

#[derive(Serialize)]
struct RecordBody<'a> {
    fields: &'a Fields,
}

/// HTTP client of one bitable table.
pub struct FeishuSheet {
    client: ApiClient,
    records_path: String,
}

impl FeishuSheet {
    pub fn new(config: &SyncConfig) -> Result<Self, SyncError> {
        let auth = if config.feishu_access_token.is_empty() {
            ClientAuth::None
        } else {
            ClientAuth::Bearer(config.feishu_access_token.clone())
        };
        // Writes are never retried inside a cycle; the next cycle re-attempts.
        let client = ApiClient::new(&config.feishu_endpoint, auth, 0)?;
        Ok(Self {
            client,
            records_path: format!(
                "open-apis/bitable/v1/apps/{}/tables/{}/records",
                config.feishu_table_app_token, config.feishu_table_id
            ),
        })
    }

    async fn call<T, B>(&self, method: Method, path: &str, body: &B) -> Result<T, SyncError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let response = self
            .client
            .request_text(method, path, None, Some(body))
            .await?;
        let status = response.status;
        let raw = if response.success {
            response.data.unwrap_or_default()
        } else {
            response.error_body.unwrap_or_default()
        };

        let envelope: Envelope<T> = match serde_json::from_str(&raw) {
            Ok(envelope) => envelope,
            Err(_) if !response.success => return Err(SyncError::http_status(status, Some(raw))),
            Err(e) => return Err(SyncError::Decode(format!("{}: {}", path, e))),
        };
        if !response.success || envelope.code != 0 {
            return Err(SyncError::Application {
                status,
                code: envelope.code,
                message: envelope.msg,
            });
        }
        envelope
            .data
            .ok_or_else(|| SyncError::Decode(format!("{}: response has no data", path)))
    }
}

#[async_trait]
impl SheetApi for FeishuSheet {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SheetRow>, SyncError> {
        let mut path = format!("{}/search", self.records_path);
        if let Some(size) = query.page_size {
            path.push_str(&format!("?page_size={}", size));
        }
        let data: SearchData = self.call(Method::POST, &path, &query.body()).await?;
        Ok(data.items.unwrap_or_default())
    }

    async fn create(&self, fields: &Fields) -> Result<SheetRow, SyncError> {
        let data: RecordData = self
            .call(Method::POST, &self.records_path, &RecordBody { fields })
            .await?;
        Ok(data.record)
    }

    async fn update(&self, record_id: &str, fields: &Fields) -> Result<SheetRow, SyncError> {
        let path = format!("{}/{}", self.records_path, record_id);
        let data: RecordData = self
            .call(Method::PUT, &path, &RecordBody { fields })
            .await?;
        Ok(data.record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_search_body() {
        let body = SearchQuery::exact("客户全称", "Acme Ltd").body();
        assert_eq!(
            body,
            json!({
                "filter": {
                    "conjunction": "and",
                    "conditions": [{ "field_name": "客户全称", "operator": "is", "value": ["Acme Ltd"] }]
                }
            })
        );
    }

    #[test]
    fn test_top_by_body() {
        let query = SearchQuery::top_by("编号", 10);
        assert_eq!(query.page_size, Some(10));
        assert_eq!(
            query.body(),
            json!({
                "field_names": ["编号"],
                "sort": [{ "field_name": "编号", "desc": true }]
            })
        );
    }

    #[test]
    fn test_records_path_from_config() {
        let config = SyncConfig {
            feishu_endpoint: "https://open.example.com".into(),
            feishu_table_app_token: "app1".into(),
            feishu_table_id: "tbl1".into(),
            ..Default::default()
        };
        let sheet = FeishuSheet::new(&config).unwrap();
        assert_eq!(sheet.records_path, "open-apis/bitable/v1/apps/app1/tables/tbl1/records");
    }
}
