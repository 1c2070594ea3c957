//! Support portal record models.
//!
//! Field names follow the portal's JSON (camelCase). Every field is
//! defaulted so a record with missing or `null` attributes still decodes;
//! the engine treats zero values as "unknown".

use serde::{Deserialize, Deserializer, Serialize};

/// Attribute title carrying the product version.
pub const VERSION_TITLE: &str = "version";
/// Attribute title carrying the deployment architecture.
pub const DEPLOY_ARCH_TITLE: &str = "form1prop11";

/// Decodes an explicit `null` as the type's zero value.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SalesUser {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Customer {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub abbreviated_name: String,
}

/// Subscription window of a customer. Dates are epoch values as sent by the portal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Subscription {
    #[serde(deserialize_with = "null_as_default")]
    pub amount: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub deployment_time: i64,
    #[serde(rename = "serviceTypeName", deserialize_with = "null_as_default")]
    pub service_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub start_date: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub end_date: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub support_end_date: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub expired: bool,
    #[serde(rename = "client", deserialize_with = "null_as_default")]
    pub customer: Customer,
    #[serde(deserialize_with = "null_as_default")]
    pub sales_user: SalesUser,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContentMap {
    #[serde(deserialize_with = "null_as_default")]
    pub value1: String,
}

/// One free-form `title -> value` attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Element {
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub content_map: ContentMap,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OtherInfo {
    #[serde(deserialize_with = "null_as_default")]
    pub elements: Vec<Element>,
}

/// A company/subscription record from `/maintenances`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Maintenance {
    #[serde(deserialize_with = "null_as_default")]
    pub id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub creator_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub subscription: Subscription,
    #[serde(rename = "content", deserialize_with = "null_as_default")]
    pub other_info: OtherInfo,
}

impl Maintenance {
    /// The business key.
    pub fn company_name(&self) -> &str {
        &self.subscription.customer.name
    }

    pub fn short_name(&self) -> &str {
        &self.subscription.customer.abbreviated_name
    }

    /// Value of the attribute with exactly this title. When the title repeats
    /// the last occurrence wins.
    pub fn attribute(&self, title: &str) -> Option<&str> {
        self.other_info
            .elements
            .iter()
            .rev()
            .find(|e| e.title == title)
            .map(|e| e.content_map.value1.as_str())
    }

    pub fn version(&self) -> String {
        self.attribute(VERSION_TITLE).unwrap_or_default().to_string()
    }

    pub fn deploy_arch(&self) -> String {
        self.attribute(DEPLOY_ARCH_TITLE).unwrap_or_default().to_string()
    }
}

/// One maintenance history entry from `/maintenance-records`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MaintenanceRecord {
    #[serde(deserialize_with = "null_as_default")]
    pub id: i64,
    #[serde(rename = "clientName", deserialize_with = "null_as_default")]
    pub company_name: String,
    /// Milliseconds since the epoch.
    #[serde(deserialize_with = "null_as_default")]
    pub maintenance_time: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub maintenance_types: String,
    #[serde(deserialize_with = "null_as_default")]
    pub maintenance_context: String,
    #[serde(deserialize_with = "null_as_default")]
    pub modified_by_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_maintenance_and_derive_fields() {
        let raw = json!({
            "id": 11,
            "creatorName": "Li Lei",
            "subscription": {
                "amount": 200,
                "serviceTypeName": "Enterprise",
                "startDate": 1700000000000i64,
                "endDate": 1731536000000i64,
                "supportEndDate": 1731536000000i64,
                "client": { "name": "Acme Ltd", "abbreviatedName": "Acme" },
                "salesUser": { "name": "Han Meimei" }
            },
            "content": {
                "elements": [
                    { "title": "version", "contentMap": { "value1": "v3.10" } },
                    { "title": "form1prop11", "contentMap": { "value1": "HA" } }
                ]
            }
        });
        let m: Maintenance = serde_json::from_value(raw).unwrap();

        assert_eq!(m.company_name(), "Acme Ltd");
        assert_eq!(m.short_name(), "Acme");
        assert_eq!(m.subscription.service_type, "Enterprise");
        assert_eq!(m.subscription.sales_user.name, "Han Meimei");
        assert_eq!(m.version(), "v3.10");
        assert_eq!(m.deploy_arch(), "HA");
    }

    #[test]
    fn test_missing_attribute_leaves_zero_value() {
        let m: Maintenance = serde_json::from_value(json!({ "id": 1 })).unwrap();
        assert_eq!(m.version(), "");
        assert_eq!(m.deploy_arch(), "");
        assert_eq!(m.company_name(), "");
    }

    #[test]
    fn test_attribute_title_must_match_exactly() {
        let m: Maintenance = serde_json::from_value(json!({
            "content": { "elements": [ { "title": "Version", "contentMap": { "value1": "x" } } ] }
        }))
        .unwrap();
        assert_eq!(m.attribute("version"), None);
    }

    #[test]
    fn test_decode_maintenance_record() {
        let r: MaintenanceRecord = serde_json::from_value(json!({
            "id": 3,
            "clientName": "Acme Ltd",
            "maintenanceTime": 1700000000000i64,
            "maintenanceTypes": "upgrade",
            "maintenanceContext": "v3.9 -> v3.10",
            "modifiedByName": "Li Lei"
        }))
        .unwrap();
        assert_eq!(r.company_name, "Acme Ltd");
        assert_eq!(r.maintenance_types, "upgrade");
    }

    #[test]
    fn test_null_fields_decode_as_zero_values() {
        let m: Maintenance = serde_json::from_value(json!({
            "id": 4,
            "creatorName": null,
            "subscription": {
                "amount": null,
                "client": { "name": "Null Co", "abbreviatedName": null },
                "salesUser": null
            },
            "content": null
        }))
        .unwrap();

        assert_eq!(m.company_name(), "Null Co");
        assert_eq!(m.short_name(), "");
        assert_eq!(m.creator_name, "");
        assert_eq!(m.subscription.amount, 0);
        assert_eq!(m.subscription.sales_user, SalesUser::default());
        assert_eq!(m.version(), "");
    }

    #[test]
    fn test_null_nested_object_decodes_as_default() {
        let m: Maintenance = serde_json::from_value(json!({ "id": 5, "subscription": null })).unwrap();
        assert_eq!(m.subscription, Subscription::default());

        let r: MaintenanceRecord = serde_json::from_value(json!({
            "id": 6,
            "clientName": "Acme Ltd",
            "maintenanceTime": null,
            "modifiedByName": null
        }))
        .unwrap();
        assert_eq!(r.maintenance_time, 0);
        assert_eq!(r.modified_by_name, "");
    }
}
