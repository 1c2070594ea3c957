//! # Integration Test Fixtures
//!
//! Shared builders for the tests under `tests/`. Every remote endpoint the
//! sync engine talks to (support portal, sheet API, chat webhook) is served
//! by one `httpmock::MockServer`; these helpers point a `SyncConfig` at it
//! and shape the JSON bodies those endpoints answer with.

#![forbid(unsafe_code)]

use httpmock::MockServer;
use lib_sync::SyncConfig;
use serde_json::{json, Value};

pub const APP_TOKEN: &str = "app1";
pub const TABLE_ID: &str = "tbl1";
pub const ACCESS_TOKEN: &str = "t-abc";
pub const WEBHOOK_PATH: &str = "/cgi-bin/webhook/send";

/// A configuration whose every endpoint is `server`.
pub fn config_for(server: &MockServer) -> SyncConfig {
    SyncConfig {
        support_endpoint: server.base_url(),
        support_username: "user".into(),
        support_password: "pass".into(),
        feishu_endpoint: server.base_url(),
        feishu_access_token: ACCESS_TOKEN.into(),
        feishu_table_app_token: APP_TOKEN.into(),
        feishu_table_id: TABLE_ID.into(),
        wechat_group_robot_webhook: webhook_url(server),
        wechat_message_robot_webhook: webhook_url(server),
        robot_reminds_mobile_phones: "13800000000".into(),
        // Keep failing-status tests fast: no transport retries.
        source_retries: 0,
        ..Default::default()
    }
}

pub fn webhook_url(server: &MockServer) -> String {
    server.url(format!("{}?key=abc", WEBHOOK_PATH))
}

pub fn records_path() -> String {
    format!("/open-apis/bitable/v1/apps/{}/tables/{}/records", APP_TOKEN, TABLE_ID)
}

/// A `/maintenances` record.
pub fn company(id: i64, name: &str, short: &str, amount: i64) -> Value {
    json!({
        "id": id,
        "creatorName": "Li Lei",
        "subscription": {
            "amount": amount,
            "serviceTypeName": "Enterprise",
            "startDate": 1700000000000i64,
            "endDate": 1731536000000i64,
            "supportEndDate": 1731536000000i64,
            "client": { "name": name, "abbreviatedName": short },
            "salesUser": { "name": "Han Meimei" }
        },
        "content": {
            "elements": [ { "title": "version", "contentMap": { "value1": "v3.10" } } ]
        }
    })
}

/// A `/maintenance-records` entry.
pub fn maintenance_record(id: i64, name: &str) -> Value {
    json!({
        "id": id,
        "clientName": name,
        "maintenanceTime": 1700000000000i64,
        "maintenanceTypes": "upgrade",
        "maintenanceContext": "v3.9 to v3.10",
        "modifiedByName": "Li Lei"
    })
}

/// A support portal page.
pub fn page(data: Vec<Value>, marker: i64) -> Value {
    json!({ "data": data, "marker": marker })
}

/// The sheet API envelope around `data`.
pub fn envelope(data: Value) -> Value {
    json!({ "code": 0, "msg": "success", "data": data })
}

pub fn search_result(rows: Vec<Value>) -> Value {
    let total = rows.len();
    envelope(json!({ "has_more": false, "items": rows, "total": total }))
}

pub fn record_result(record_id: &str, fields: Value) -> Value {
    envelope(json!({ "record": { "record_id": record_id, "fields": fields } }))
}
