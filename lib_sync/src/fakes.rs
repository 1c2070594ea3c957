//! In-memory stand-ins for the remote seams, used by the unit tests.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::errors::SyncError;
use crate::sheet::columns;
use crate::sheet::feishu::{Fields, SearchQuery, SheetApi, SheetRow};
use crate::support::client::{PageRequest, RawPage, SourceApi};
use crate::workflow::notify::{NotifyError, Notifier};

pub type ScriptedPage = Result<(Vec<Value>, i64), SyncError>;

/// Answers page requests from a fixed script and records every request.
pub struct ScriptedSource {
    script: Mutex<VecDeque<ScriptedPage>>,
    requests: Mutex<Vec<PageRequest>>,
}

impl ScriptedSource {
    pub fn new(script: Vec<ScriptedPage>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, page: ScriptedPage) {
        self.script.lock().push_back(page);
    }

    pub fn requests(&self) -> Vec<PageRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl SourceApi for ScriptedSource {
    async fn fetch_page(&self, request: &PageRequest) -> Result<RawPage, SyncError> {
        self.requests.lock().push(request.clone());
        match self.script.lock().pop_front() {
            Some(Ok((data, marker))) => Ok(RawPage::new(data, marker)),
            Some(Err(e)) => Err(e),
            None => Err(SyncError::Transport("script exhausted".into())),
        }
    }
}

#[derive(Default)]
struct SheetState {
    rows: Vec<SheetRow>,
    next_id: u32,
    creates: u32,
    updates: u32,
    fail_search: bool,
    fail_writes: bool,
}

/// A table held in memory with the search semantics of the real one.
#[derive(Default)]
pub struct MemorySheet {
    state: Mutex<SheetState>,
}

impl MemorySheet {
    /// Adds a row without counting it as a create.
    pub fn insert(&self, fields: Value) -> String {
        let mut state = self.state.lock();
        state.next_id += 1;
        let record_id = format!("rec{}", state.next_id);
        state.rows.push(SheetRow {
            record_id: record_id.clone(),
            fields: fields.as_object().cloned().unwrap_or_default(),
        });
        record_id
    }

    pub fn fail_search(&self, fail: bool) {
        self.state.lock().fail_search = fail;
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }

    pub fn creates(&self) -> u32 {
        self.state.lock().creates
    }

    pub fn updates(&self) -> u32 {
        self.state.lock().updates
    }

    pub fn rows(&self) -> Vec<SheetRow> {
        self.state.lock().rows.clone()
    }

    pub fn row_by_company(&self, company: &str) -> Option<SheetRow> {
        self.rows()
            .into_iter()
            .find(|row| cell_text(row, columns::FULL_NAME) == company)
    }
}

fn cell_text(row: &SheetRow, name: &str) -> String {
    columns::text(row.fields.get(name).unwrap_or(&Value::Null))
}

fn rejected() -> SyncError {
    SyncError::Application {
        status: 200,
        code: 1254000,
        message: "rejected by fake".into(),
    }
}

#[async_trait]
impl SheetApi for MemorySheet {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SheetRow>, SyncError> {
        let state = self.state.lock();
        if state.fail_search {
            return Err(SyncError::Transport("search unavailable".into()));
        }
        let mut rows: Vec<SheetRow> = state
            .rows
            .iter()
            .filter(|row| match &query.filter {
                Some(cond) => cell_text(row, &cond.field_name) == cond.value,
                None => true,
            })
            .cloned()
            .collect();
        if let Some(field) = &query.sort_desc {
            rows.sort_by_key(|row| {
                std::cmp::Reverse(columns::number(row.fields.get(field).unwrap_or(&Value::Null)))
            });
        }
        if let Some(size) = query.page_size {
            rows.truncate(size as usize);
        }
        Ok(rows)
    }

    async fn create(&self, fields: &Fields) -> Result<SheetRow, SyncError> {
        let mut state = self.state.lock();
        if state.fail_writes {
            return Err(rejected());
        }
        state.next_id += 1;
        state.creates += 1;
        let row = SheetRow {
            record_id: format!("rec{}", state.next_id),
            fields: fields.clone(),
        };
        state.rows.push(row.clone());
        Ok(row)
    }

    async fn update(&self, record_id: &str, fields: &Fields) -> Result<SheetRow, SyncError> {
        let mut state = self.state.lock();
        if state.fail_writes {
            return Err(rejected());
        }
        let row = state
            .rows
            .iter_mut()
            .find(|row| row.record_id == record_id)
            .ok_or_else(|| SyncError::Application {
                status: 200,
                code: 1254043,
                message: format!("record {} not found", record_id),
            })?;
        for (name, value) in fields {
            row.fields.insert(name.clone(), value.clone());
        }
        let updated = row.clone();
        state.updates += 1;
        Ok(updated)
    }
}

/// Keeps every message; can be told to fail.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, Vec<String>)>>,
    fail: Mutex<bool>,
}

impl RecordingNotifier {
    pub fn fail(&self, fail: bool) {
        *self.fail.lock() = fail;
    }

    pub fn messages(&self) -> Vec<(String, Vec<String>)> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_text(&self, content: &str, mentions: &[String]) -> Result<u32, NotifyError> {
        if *self.fail.lock() {
            return Err(NotifyError::Exhausted {
                attempts: 5,
                last: "HTTP 500".into(),
            });
        }
        self.sent.lock().push((content.to_string(), mentions.to_vec()));
        Ok(1)
    }
}
