//! In-memory stand-ins for the remote services.

use super::asana::TaskApi;
use super::harvest::{TimeEntryPage, TimeEntrySource};
use crate::error::{RemoteError, SyncError};
use crate::models::{CustomField, DateWindow};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};

pub struct FakeHarvest {
    results: RefCell<VecDeque<Result<TimeEntryPage, SyncError>>>,
    requests: RefCell<Vec<u32>>,
}

impl FakeHarvest {
    pub fn with_pages(pages: Vec<TimeEntryPage>) -> Self {
        Self::with_results(pages.into_iter().map(Ok).collect())
    }

    pub fn with_results(results: Vec<Result<TimeEntryPage, SyncError>>) -> Self {
        Self {
            results: RefCell::new(results.into()),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn requested_pages(&self) -> Vec<u32> {
        self.requests.borrow().clone()
    }
}

impl TimeEntrySource for FakeHarvest {
    fn fetch_page(&self, _window: &DateWindow, page: u32) -> Result<TimeEntryPage, SyncError> {
        self.requests.borrow_mut().push(page);
        self.results
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(SyncError::Retrieval(format!("no page {page} scripted"))))
    }
}

/// Tasks keyed by id, each with its custom fields and their current values.
#[derive(Default)]
pub struct FakeAsana {
    fields: HashMap<String, Vec<CustomField>>,
    pub values: RefCell<HashMap<(String, String), f64>>,
    pub writes: RefCell<Vec<(String, String, f64)>>,
    lookups: RefCell<Vec<String>>,
    lookup_failures: HashSet<String>,
    write_failures: HashMap<String, RemoteError>,
}

impl FakeAsana {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task(mut self, task_id: &str, fields: &[(&str, &str)]) -> Self {
        self.fields.insert(
            task_id.to_string(),
            fields
                .iter()
                .map(|(gid, name)| CustomField {
                    gid: gid.to_string(),
                    name: Some(name.to_string()),
                })
                .collect(),
        );
        self
    }

    pub fn failing_lookup(mut self, task_id: &str) -> Self {
        self.lookup_failures.insert(task_id.to_string());
        self
    }

    pub fn failing_write(mut self, task_id: &str, error: RemoteError) -> Self {
        self.write_failures.insert(task_id.to_string(), error);
        self
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lookups.borrow().clone()
    }

    pub fn value(&self, task_id: &str, field_id: &str) -> Option<f64> {
        self.values
            .borrow()
            .get(&(task_id.to_string(), field_id.to_string()))
            .copied()
    }
}

impl TaskApi for FakeAsana {
    fn custom_fields(&self, task_id: &str) -> Result<Vec<CustomField>, RemoteError> {
        self.lookups.borrow_mut().push(task_id.to_string());
        if self.lookup_failures.contains(task_id) {
            return Err(RemoteError::transport("timed out"));
        }
        self.fields
            .get(task_id)
            .cloned()
            .ok_or_else(|| RemoteError::http(404, r#"{"errors":[{"message":"Not Found"}]}"#))
    }

    fn set_custom_field(
        &self,
        task_id: &str,
        field_id: &str,
        hours: f64,
    ) -> Result<(), RemoteError> {
        if let Some(err) = self.write_failures.get(task_id) {
            return Err(err.clone());
        }
        self.writes
            .borrow_mut()
            .push((task_id.to_string(), field_id.to_string(), hours));
        self.values
            .borrow_mut()
            .insert((task_id.to_string(), field_id.to_string()), hours);
        Ok(())
    }
}
