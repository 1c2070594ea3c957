//! # Record Reconciler
//!
//! Decides, for one company record from the portal, whether the customer
//! table needs a new row, an update of the existing row, or nothing.
//!
//! ## Key Design Principles
//! - **Idempotent**: a record whose tracked fields already match the row is
//!   skipped, so a second pass over unchanged data performs no write.
//! - **Full rewrites**: an update re-sends every written column rebuilt from
//!   the remote record, never a partial patch.
//! - **Per-record failures**: every error is returned to the caller, which
//!   logs it with the company name and moves on. Nothing is retried here.

use std::sync::Arc;

use serde_json::Value;

use crate::errors::SyncError;
use crate::sheet::columns::{self, DestinationRow};
use crate::sheet::feishu::Fields;
use crate::sheet::locator::{CreateOutcome, CustomerSheet};
use crate::support::model::Maintenance;

/// The columns compared to decide whether a row is stale.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackedFields {
    pub creator_name: String,
    pub version: String,
    pub amount: i64,
    pub start_date: i64,
    pub end_date: i64,
    pub sales_name: String,
    pub company_name: String,
    pub short_name: String,
    pub support_end_date: i64,
}

impl TrackedFields {
    pub fn from_remote(remote: &Maintenance) -> Self {
        let sub = &remote.subscription;
        Self {
            creator_name: remote.creator_name.clone(),
            version: remote.version(),
            amount: sub.amount,
            start_date: sub.start_date,
            end_date: sub.end_date,
            sales_name: sub.sales_user.name.clone(),
            company_name: remote.company_name().to_string(),
            short_name: remote.short_name().to_string(),
            support_end_date: sub.support_end_date,
        }
    }

    pub fn from_row(row: &DestinationRow) -> Self {
        Self {
            creator_name: row.creator_name.clone(),
            version: row.version.clone(),
            amount: row.amount,
            start_date: row.start_date,
            end_date: row.end_date,
            sales_name: row.sales_name.clone(),
            company_name: row.company_name.clone(),
            short_name: row.short_name.clone(),
            support_end_date: row.support_end_date,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    EmptyCompany,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Skip(SkipReason),
    /// No row yet; the serial is assigned when the row is written.
    Create,
    Update { record_id: String, fields: Fields },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Created { serial: i64, final_name: String },
    Updated { record_id: String },
    Unchanged,
    Skipped,
}

/// `"<serial>-<short name>"`, the full name standing in for a missing short name.
pub fn final_name(serial: i64, remote: &Maintenance) -> String {
    let name = if remote.short_name().is_empty() {
        remote.company_name()
    } else {
        remote.short_name()
    };
    format!("{}-{}", serial, name)
}

/// Every column written for `remote`. The final name is set only when a
/// serial is known.
pub fn row_fields(remote: &Maintenance, serial: Option<i64>) -> Fields {
    let sub = &remote.subscription;
    let mut fields = Fields::new();
    let mut put = |name: &str, value: Value| {
        fields.insert(name.to_string(), value);
    };

    if let Some(serial) = serial.filter(|s| *s > 0) {
        put(columns::FINAL_NAME, Value::from(final_name(serial, remote)));
    }
    put(columns::FULL_NAME, Value::from(remote.company_name()));
    put(columns::SHORT_NAME, Value::from(remote.short_name()));
    put(columns::SALES, Value::from(sub.sales_user.name.as_str()));
    put(columns::CREATOR, Value::from(remote.creator_name.as_str()));
    put(columns::VERSION, Value::from(remote.version()));
    put(columns::DEPLOY_ARCH, Value::from(remote.deploy_arch()));
    put(columns::SERVICE_TYPE, Value::from(sub.service_type.as_str()));
    put(columns::AMOUNT, Value::from(sub.amount.to_string()));
    put(columns::START_DATE, Value::from(sub.start_date));
    put(columns::END_DATE, Value::from(sub.end_date));
    put(columns::SUPPORT_END_DATE, Value::from(sub.support_end_date));
    fields
}

pub struct Reconciler {
    sheet: Arc<CustomerSheet>,
}

impl Reconciler {
    pub fn new(sheet: Arc<CustomerSheet>) -> Self {
        Self { sheet }
    }

    /// Looks up the row of `remote` and decides what to do with it.
    pub async fn plan(&self, remote: &Maintenance) -> Result<Action, SyncError> {
        let company = remote.company_name();
        if company.is_empty() {
            return Ok(Action::Skip(SkipReason::EmptyCompany));
        }

        let row = self.sheet.find_by_company(company).await?;
        Ok(Self::decide(remote, &row))
    }

    /// The decision for `remote` against an already located row.
    pub fn decide(remote: &Maintenance, row: &DestinationRow) -> Action {
        match &row.record_id {
            Some(record_id) if row.exists() => {
                if TrackedFields::from_remote(remote) == TrackedFields::from_row(row) {
                    Action::Skip(SkipReason::Unchanged)
                } else {
                    Action::Update {
                        record_id: record_id.clone(),
                        fields: row_fields(remote, Some(row.serial)),
                    }
                }
            }
            _ => Action::Create,
        }
    }

    /// Writes the decided action.
    pub async fn apply(&self, remote: &Maintenance, action: Action) -> Result<Outcome, SyncError> {
        match action {
            Action::Skip(SkipReason::EmptyCompany) => Ok(Outcome::Skipped),
            Action::Skip(SkipReason::Unchanged) => Ok(Outcome::Unchanged),
            Action::Update { record_id, fields } => {
                self.sheet.update(&record_id, &fields).await?;
                Ok(Outcome::Updated { record_id })
            }
            Action::Create => {
                let outcome = self
                    .sheet
                    .create_with_next_serial(remote.company_name(), |serial| {
                        row_fields(remote, Some(serial))
                    })
                    .await?;
                match outcome {
                    CreateOutcome::Created(created) => Ok(Outcome::Created {
                        serial: created.serial,
                        final_name: final_name(created.serial, remote),
                    }),
                    // Created by someone else since `plan`; reconcile against it.
                    CreateOutcome::AlreadyExists(row) => match Self::decide(remote, &row) {
                        Action::Update { record_id, fields } => {
                            self.sheet.update(&record_id, &fields).await?;
                            Ok(Outcome::Updated { record_id })
                        }
                        _ => Ok(Outcome::Unchanged),
                    },
                }
            }
        }
    }

    pub async fn reconcile(&self, remote: &Maintenance) -> Result<Outcome, SyncError> {
        let action = self.plan(remote).await?;
        self.apply(remote, action).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::MemorySheet;
    use serde_json::json;

    fn acme() -> Maintenance {
        serde_json::from_value(json!({
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
            "content": { "elements": [ { "title": "version", "contentMap": { "value1": "v3.10" } } ] }
        }))
        .unwrap()
    }

    fn reconciler(api: Arc<MemorySheet>) -> Reconciler {
        Reconciler::new(Arc::new(CustomerSheet::new(api, 10)))
    }

    #[tokio::test]
    async fn test_placeholder_row_means_create() {
        let api = Arc::new(MemorySheet::default());
        let reconciler = reconciler(api);
        assert_eq!(reconciler.plan(&acme()).await.unwrap(), Action::Create);
    }

    #[tokio::test]
    async fn test_empty_company_is_skipped_without_lookup() {
        let api = Arc::new(MemorySheet::default());
        api.fail_search(true);
        let reconciler = reconciler(api);
        let outcome = reconciler.reconcile(&Maintenance::default()).await.unwrap();
        assert_eq!(outcome, Outcome::Skipped);
    }

    #[tokio::test]
    async fn test_create_then_unchanged() {
        let api = Arc::new(MemorySheet::default());
        api.insert(json!({ "编号": 4, "客户全称": "Other Co" }));
        let reconciler = reconciler(api.clone());

        let first = reconciler.reconcile(&acme()).await.unwrap();
        assert_eq!(
            first,
            Outcome::Created {
                serial: 5,
                final_name: "5-Acme".into()
            }
        );
        let second = reconciler.reconcile(&acme()).await.unwrap();
        assert_eq!(second, Outcome::Unchanged);
        assert_eq!(api.creates(), 1);
        assert_eq!(api.updates(), 0);
    }

    #[tokio::test]
    async fn test_stale_row_updates_once_then_skips() {
        let api = Arc::new(MemorySheet::default());
        api.insert(json!({ "编号": 2, "客户全称": "Acme Ltd", "简称": "Acme", "规格": "100" }));
        let reconciler = reconciler(api.clone());

        let first = reconciler.reconcile(&acme()).await.unwrap();
        assert!(matches!(first, Outcome::Updated { .. }));
        let second = reconciler.reconcile(&acme()).await.unwrap();
        assert_eq!(second, Outcome::Unchanged);
        assert_eq!(api.updates(), 1);

        let row = api.row_by_company("Acme Ltd").unwrap();
        assert_eq!(row.fields["最终客户名称"], json!("2-Acme"));
        assert_eq!(row.fields["规格"], json!("200"));
    }

    #[tokio::test]
    async fn test_changed_field_updates_until_mirrored() {
        let api = Arc::new(MemorySheet::default());
        let reconciler = reconciler(api.clone());
        reconciler.reconcile(&acme()).await.unwrap();

        let mut renewed = acme();
        renewed.subscription.end_date += 86_400_000;

        api.fail_writes(true);
        assert!(reconciler.reconcile(&renewed).await.is_err());
        api.fail_writes(false);

        assert!(matches!(
            reconciler.reconcile(&renewed).await.unwrap(),
            Outcome::Updated { .. }
        ));
        assert_eq!(reconciler.reconcile(&renewed).await.unwrap(), Outcome::Unchanged);
    }

    #[test]
    fn test_update_carries_every_written_column() {
        let row = DestinationRow {
            record_id: Some("rec1".into()),
            serial: 3,
            company_name: "Acme Ltd".into(),
            ..Default::default()
        };
        match Reconciler::decide(&acme(), &row) {
            Action::Update { record_id, fields } => {
                assert_eq!(record_id, "rec1");
                assert_eq!(fields.len(), 12);
                assert!(!fields.contains_key(columns::SERIAL));
            }
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn test_final_name_falls_back_to_full_name() {
        let mut remote = acme();
        remote.subscription.customer.abbreviated_name.clear();
        assert_eq!(final_name(8, &remote), "8-Acme Ltd");
    }
}
