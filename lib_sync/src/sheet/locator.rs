//! Business-level view of the customer table.
//!
//! Rows are matched by the customer's full name. New rows get the next
//! serial (`1 + max` of the serials visible in the table). Reading the
//! maximum and inserting the new row are two separate remote calls, so every
//! create in this process goes through one async gate. Two processes writing
//! the same table can still race and produce a duplicate serial.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;

use crate::errors::SyncError;
use crate::sheet::columns::{self, DestinationRow};
use crate::sheet::feishu::{Fields, SearchQuery, SheetApi};

/// A row created under the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedRow {
    pub serial: i64,
    pub row: DestinationRow,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// Another writer created the row between lookup and create.
    AlreadyExists(DestinationRow),
    Created(CreatedRow),
}

pub struct CustomerSheet {
    api: Arc<dyn SheetApi>,
    serial_page_size: u32,
    create_gate: Mutex<()>,
}

impl CustomerSheet {
    pub fn new(api: Arc<dyn SheetApi>, serial_page_size: u32) -> Self {
        Self {
            api,
            serial_page_size: serial_page_size.max(1),
            create_gate: Mutex::new(()),
        }
    }

    /// The row of `company`, or a placeholder when the table has none.
    ///
    /// A failing search is an error, never a placeholder.
    pub async fn find_by_company(&self, company: &str) -> Result<DestinationRow, SyncError> {
        let rows = self
            .api
            .search(&SearchQuery::exact(columns::FULL_NAME, company))
            .await?;
        if rows.len() > 1 {
            log::warn!(
                "{} rows match company '{}', using the first one",
                rows.len(),
                company
            );
        }
        Ok(rows
            .first()
            .map(DestinationRow::from_sheet_row)
            .unwrap_or_else(|| DestinationRow::placeholder(company)))
    }

    /// Highest serial in the table, `0` when it is empty.
    pub async fn max_serial(&self) -> Result<i64, SyncError> {
        let rows = self
            .api
            .search(&SearchQuery::top_by(columns::SERIAL, self.serial_page_size))
            .await?;
        Ok(rows
            .iter()
            .map(|row| columns::number(row.fields.get(columns::SERIAL).unwrap_or(&Value::Null)))
            .max()
            .unwrap_or(0))
    }

    /// Creates the row of `company` with the next serial.
    ///
    /// `build` receives the serial and returns the cells to write; the serial
    /// column itself is set here. The company is looked up again inside the
    /// gate so two callers racing for the same new customer create one row.
    pub async fn create_with_next_serial<F>(
        &self,
        company: &str,
        build: F,
    ) -> Result<CreateOutcome, SyncError>
    where
        F: FnOnce(i64) -> Fields + Send,
    {
        let _guard = self.create_gate.lock().await;

        let existing = self.find_by_company(company).await?;
        if existing.exists() {
            return Ok(CreateOutcome::AlreadyExists(existing));
        }

        let serial = self.max_serial().await? + 1;
        let mut fields = build(serial);
        fields.insert(columns::SERIAL.to_string(), Value::from(serial));

        let created = self.api.create(&fields).await?;
        log::info!("Created row {} for '{}' with serial {}", created.record_id, company, serial);
        Ok(CreateOutcome::Created(CreatedRow {
            serial,
            row: DestinationRow::from_sheet_row(&created),
        }))
    }

    pub async fn update(&self, record_id: &str, fields: &Fields) -> Result<(), SyncError> {
        self.api.update(record_id, fields).await?;
        Ok(())
    }
}
