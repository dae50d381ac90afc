use crate::config::AsanaConfig;
use crate::error::{RemoteError, SyncError};
use crate::models::CustomField;
use reqwest::Url;
use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;

/// The two task-system calls the dispatch phase needs.
pub trait TaskApi {
    fn custom_fields(&self, task_id: &str) -> Result<Vec<CustomField>, RemoteError>;
    fn set_custom_field(&self, task_id: &str, field_id: &str, hours: f64)
    -> Result<(), RemoteError>;
}

#[derive(Deserialize)]
struct TaskEnvelope {
    data: TaskDetail,
}

#[derive(Deserialize)]
struct TaskDetail {
    #[serde(default)]
    custom_fields: Vec<RemoteCustomField>,
}

#[derive(Deserialize)]
struct RemoteCustomField {
    gid: String,
    #[serde(default)]
    name: Option<String>,
}

pub struct AsanaClient {
    client: Client,
    base_url: Url,
    access_token: String,
}

impl AsanaClient {
    pub fn new(config: &AsanaConfig, timeout: Duration) -> Result<Self, SyncError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Config(format!("failed to create HTTP client: {e}")))?;
        let base_url = Url::parse(config.base_url.trim_end_matches('/'))
            .map_err(|e| SyncError::Config(format!("invalid asana.base_url: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(SyncError::Config(format!(
                "invalid asana.base_url: {}",
                config.base_url
            )));
        }
        Ok(Self {
            client,
            base_url,
            access_token: config.access_token.clone(),
        })
    }

    fn task_url(&self, task_id: &str) -> Result<Url, RemoteError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteError::transport("asana base url cannot take a path"))?
            .pop_if_empty()
            .push("tasks")
            .push(task_id);
        Ok(url)
    }
}

const TASK_FIELDS_QUERY: [(&str, &str); 1] = [("opt_fields", "custom_fields")];

/// `{"data": {"custom_fields": {<field_id>: <hours>}}}`
fn field_update_body(field_id: &str, hours: f64) -> Value {
    json!({ "data": { "custom_fields": { field_id: hours } } })
}

fn check_status(resp: Response) -> Result<Response, RemoteError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().unwrap_or_default();
    Err(RemoteError::http(status.as_u16(), body))
}

impl TaskApi for AsanaClient {
    fn custom_fields(&self, task_id: &str) -> Result<Vec<CustomField>, RemoteError> {
        let resp = self
            .client
            .get(self.task_url(task_id)?)
            .bearer_auth(&self.access_token)
            .query(&TASK_FIELDS_QUERY)
            .send()
            .map_err(|e| RemoteError::transport(e.to_string()))?;
        let envelope: TaskEnvelope = check_status(resp)?
            .json()
            .map_err(|e| RemoteError::transport(format!("invalid task response: {e}")))?;
        Ok(envelope
            .data
            .custom_fields
            .into_iter()
            .map(|field| CustomField {
                gid: field.gid,
                name: field.name,
            })
            .collect())
    }

    fn set_custom_field(
        &self,
        task_id: &str,
        field_id: &str,
        hours: f64,
    ) -> Result<(), RemoteError> {
        let body = field_update_body(field_id, hours);
        let resp = self
            .client
            .put(self.task_url(task_id)?)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .map_err(|e| RemoteError::transport(e.to_string()))?;
        check_status(resp)?;
        Ok(())
    }
}
