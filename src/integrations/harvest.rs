use crate::config::HarvestConfig;
use crate::error::{SyncError, truncate_error};
use crate::models::{DateWindow, TimeEntry};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// One page of time entries as the source returned it, unfiltered.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimeEntryPage {
    pub entries: Vec<TimeEntry>,
    pub next_page: Option<u32>,
}

pub trait TimeEntrySource {
    fn fetch_page(&self, window: &DateWindow, page: u32) -> Result<TimeEntryPage, SyncError>;
}

#[derive(Deserialize)]
struct TimeEntriesResponse {
    time_entries: Option<Vec<RemoteTimeEntry>>,
    #[serde(default)]
    next_page: Option<u32>,
}

#[derive(Deserialize)]
struct RemoteTimeEntry {
    #[serde(default)]
    hours: Option<f64>,
    #[serde(default)]
    external_reference: Option<ExternalReference>,
}

#[derive(Deserialize)]
struct ExternalReference {
    #[serde(default)]
    id: Option<Value>,
}

pub struct HarvestClient {
    client: Client,
    base_url: String,
    access_token: String,
    account_id: String,
    user_agent: String,
}

impl HarvestClient {
    pub fn new(config: &HarvestConfig, timeout: Duration) -> Result<Self, SyncError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Config(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
            account_id: config.account_id.clone(),
            user_agent: config.user_agent.clone(),
        })
    }
}

impl TimeEntrySource for HarvestClient {
    fn fetch_page(&self, window: &DateWindow, page: u32) -> Result<TimeEntryPage, SyncError> {
        let url = format!("{}/time_entries", self.base_url);
        let from = window.from.to_string();
        let to = window.to.to_string();
        let page_param = page.to_string();
        let resp = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .header("Harvest-Account-Id", &self.account_id)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .query(&[
                ("from", from.as_str()),
                ("to", to.as_str()),
                ("page", page_param.as_str()),
            ])
            .send()
            .map_err(|e| SyncError::Retrieval(format!("page {page}: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .map_err(|e| SyncError::Retrieval(format!("page {page}: {e}")))?;
        if !status.is_success() {
            return Err(SyncError::Retrieval(format!(
                "page {page}: HTTP {}: {}",
                status.as_u16(),
                truncate_error(&body)
            )));
        }

        parse_page(&body).map_err(|err| match err {
            SyncError::Retrieval(msg) => SyncError::Retrieval(format!("page {page}: {msg}")),
            other => other,
        })
    }
}

/// Decodes a `/time_entries` response. A body without a `time_entries` list
/// is structurally invalid.
pub fn parse_page(body: &str) -> Result<TimeEntryPage, SyncError> {
    let response: TimeEntriesResponse = serde_json::from_str(body)
        .map_err(|e| SyncError::Retrieval(format!("invalid response: {e}")))?;
    let Some(items) = response.time_entries else {
        return Err(SyncError::Retrieval(
            "response has no time_entries list".to_string(),
        ));
    };

    let entries = items
        .into_iter()
        .map(|item| TimeEntry {
            hours: item.hours,
            external_reference_id: item
                .external_reference
                .and_then(|reference| reference.id)
                .and_then(reference_id),
        })
        .collect();

    Ok(TimeEntryPage {
        entries,
        next_page: response.next_page,
    })
}

fn reference_id(value: Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Walks every page of the window and keeps only entries that point at a task.
pub fn fetch_time_entries<S: TimeEntrySource + ?Sized>(
    source: &S,
    window: &DateWindow,
) -> Result<Vec<TimeEntry>, SyncError> {
    let mut entries = Vec::new();
    let mut page = 1;

    loop {
        let batch = source.fetch_page(window, page)?;
        let received = batch.entries.len();
        let before = entries.len();
        entries.extend(
            batch
                .entries
                .into_iter()
                .filter(|entry| entry.external_reference_id.is_some()),
        );
        tracing::debug!(
            page,
            received,
            kept = entries.len() - before,
            next_page = ?batch.next_page,
            "time entries page"
        );

        match batch.next_page {
            None => break,
            Some(next) if next <= page => {
                return Err(SyncError::Retrieval(format!(
                    "pagination did not advance (page {page} -> {next})"
                )));
            }
            Some(next) => page = next,
        }
    }

    Ok(entries)
}
