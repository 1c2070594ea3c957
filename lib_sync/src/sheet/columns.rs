//! Column names of the customer table and decoding of its rows.
//!
//! The sheet API is loosely typed: a text column may come back as a plain
//! string or as a list of `{ "type": ..., "text": ... }` segments, and a
//! number column may come back as a number or as a numeric string. The
//! helpers here accept all of those and fall back to zero values.

use serde_json::Value;

use crate::sheet::feishu::SheetRow;

pub const SERIAL: &str = "编号";
pub const FINAL_NAME: &str = "最终客户名称";
pub const FULL_NAME: &str = "客户全称";
pub const SHORT_NAME: &str = "简称";
pub const SALES: &str = "销售";
pub const CREATOR: &str = "交付负责人";
pub const VERSION: &str = "系统版本";
pub const DEPLOY_ARCH: &str = "部署架构";
pub const SERVICE_TYPE: &str = "订阅类型";
pub const AMOUNT: &str = "规格";
pub const START_DATE: &str = "订阅开始时间";
pub const END_DATE: &str = "订阅结束时间";
pub const SUPPORT_END_DATE: &str = "维保结束时间";
pub const MAINTENANCE_LOG: &str = "维护记录";

/// A customer row as the engine sees it.
///
/// `record_id == None` is the placeholder returned when no row matches a
/// company yet; it carries the searched name and serial `0`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DestinationRow {
    pub record_id: Option<String>,
    pub serial: i64,
    pub company_name: String,
    pub short_name: String,
    pub creator_name: String,
    pub version: String,
    pub sales_name: String,
    pub amount: i64,
    pub start_date: i64,
    pub end_date: i64,
    pub support_end_date: i64,
    pub maintenance_log: String,
}

impl DestinationRow {
    pub fn placeholder(company_name: &str) -> Self {
        Self {
            company_name: company_name.to_string(),
            ..Default::default()
        }
    }

    pub fn exists(&self) -> bool {
        self.record_id.as_deref().is_some_and(|id| !id.is_empty())
    }

    pub fn from_sheet_row(row: &SheetRow) -> Self {
        let cell = |name: &str| row.fields.get(name).unwrap_or(&Value::Null);
        Self {
            record_id: Some(row.record_id.clone()).filter(|id| !id.is_empty()),
            serial: number(cell(SERIAL)),
            company_name: text(cell(FULL_NAME)),
            short_name: text(cell(SHORT_NAME)),
            creator_name: text(cell(CREATOR)),
            version: text(cell(VERSION)),
            sales_name: text(cell(SALES)),
            amount: number(cell(AMOUNT)),
            start_date: number(cell(START_DATE)),
            end_date: number(cell(END_DATE)),
            support_end_date: number(cell(SUPPORT_END_DATE)),
            maintenance_log: text(cell(MAINTENANCE_LOG)),
        }
    }
}

/// Reads a cell as text. Segment lists are concatenated in order.
pub fn text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(items) => items.iter().map(segment_text).collect(),
        Value::Object(map) => map.get("text").map(text).unwrap_or_default(),
    }
}

fn segment_text(item: &Value) -> String {
    match item {
        Value::Object(map) => map.get("text").map(text).unwrap_or_default(),
        other => text(other),
    }
}

/// Reads a cell as an integer, `0` when absent or not numeric.
pub fn number(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or_default(),
        Value::String(s) => s.trim().parse().unwrap_or_default(),
        Value::Array(_) | Value::Object(_) => text(value).trim().parse().unwrap_or_default(),
        Value::Null | Value::Bool(_) => 0,
    }
}
