//! Append-only run records: one success log, one error log per day.

use crate::error::{DispatchError, RemoteError, truncate_error};
use chrono::{DateTime, Local, NaiveDate, SecondsFormat};
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub const SUCCESS_LOG: &str = "success.log";

#[derive(Serialize)]
struct SuccessRecord<'a> {
    task_id: &'a str,
    hours: f64,
    at: String,
}

#[derive(Serialize)]
struct ErrorRecord<'a> {
    task_id: &'a str,
    kind: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<String>,
    error: &'a str,
    at: String,
}

#[derive(Clone, Debug)]
pub struct RunJournal {
    dir: PathBuf,
}

impl RunJournal {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn success_path(&self) -> PathBuf {
        self.dir.join(SUCCESS_LOG)
    }

    pub fn error_path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("errors-{}.log", date.format("%Y-%m-%d")))
    }

    pub fn record_success(&self, task_id: &str, hours: f64) -> io::Result<()> {
        let now = Local::now();
        let record = SuccessRecord {
            task_id,
            hours,
            at: now.to_rfc3339_opts(SecondsFormat::Secs, false),
        };
        append_json_line(&self.success_path(), &record)
    }

    pub fn record_dispatch_failure(&self, failure: &DispatchError) -> io::Result<()> {
        self.record_error_at(&failure.task_id, "dispatch", &failure.cause, Local::now())
    }

    pub fn record_lookup_failure(&self, task_id: &str, cause: &RemoteError) -> io::Result<()> {
        self.record_error_at(task_id, "lookup", cause, Local::now())
    }

    fn record_error_at(
        &self,
        task_id: &str,
        kind: &str,
        cause: &RemoteError,
        at: DateTime<Local>,
    ) -> io::Result<()> {
        let record = ErrorRecord {
            task_id,
            kind,
            status: cause.status,
            body: cause.body.as_deref().map(truncate_error),
            error: &cause.message,
            at: at.to_rfc3339_opts(SecondsFormat::Secs, false),
        };
        append_json_line(&self.error_path_for(at.date_naive()), &record)
    }
}

fn append_json_line<T: Serialize>(path: &Path, record: &T) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut line = serde_json::to_string(record).map_err(io::Error::other)?;
    line.push('\n');
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())
}
