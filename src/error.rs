use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use thiserror::Error;

/// Failures that end the current invocation.
///
/// Per-task problems during dispatch are not represented here; they travel as
/// [`DispatchError`] values inside the batch report.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("time entry retrieval failed: {0}")]
    Retrieval(String),

    #[error("no referenced time entries between {from} and {to}; refusing to overwrite snapshot")]
    EmptyInput { from: NaiveDate, to: NaiveDate },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Lock(#[from] LockError),
}

/// Custom-field resolution failed for one task; the task is skipped.
#[derive(Debug, Error)]
#[error("custom field lookup failed for task {task_id}: {cause}")]
pub struct LookupError {
    pub task_id: String,
    #[source]
    pub cause: RemoteError,
}

/// Snapshot persistence failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("snapshot io at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("snapshot at {} is corrupt: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(
        "snapshot at {} has unsupported version {found} (expected <= {supported})",
        .path.display()
    )]
    UnsupportedVersion {
        path: PathBuf,
        found: u32,
        supported: u32,
    },
}

#[derive(Debug, Error)]
pub enum LockError {
    #[error("another run holds {} (waited {waited:?})", .path.display())]
    Timeout { path: PathBuf, waited: Duration },

    #[error("lock io: {0}")]
    Io(#[from] io::Error),
}

/// Transport-level failure talking to a remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    pub status: Option<u16>,
    pub body: Option<String>,
    pub message: String,
}

impl RemoteError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            body: None,
            message: message.into(),
        }
    }

    pub fn http(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        Self {
            status: Some(status),
            message: format!("HTTP {status}"),
            body: (!body.trim().is_empty()).then_some(body),
        }
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.body {
            Some(body) => write!(f, "{}: {}", self.message, truncate_error(body)),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for RemoteError {}

/// A single field write that did not land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchError {
    pub task_id: String,
    pub cause: RemoteError,
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "update of task {} failed: {}", self.task_id, self.cause)
    }
}

impl std::error::Error for DispatchError {}

pub fn truncate_error(message: &str) -> String {
    let mut out = message.replace(['\n', '\r'], " ");
    if out.len() > 240 {
        let mut cut = 240;
        while !out.is_char_boundary(cut) {
            cut -= 1;
        }
        out.truncate(cut);
        out.push_str("...");
    }
    out
}
