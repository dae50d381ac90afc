use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Task reference id → hours.
pub type HourAggregate = BTreeMap<String, f64>;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Clone, Debug, PartialEq)]
pub struct TimeEntry {
    pub hours: Option<f64>,
    pub external_reference_id: Option<String>,
}

#[cfg(test)]
impl TimeEntry {
    pub fn new(reference: &str, hours: f64) -> Self {
        Self {
            hours: Some(hours),
            external_reference_id: Some(reference.to_string()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateWindow {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateWindow {
    /// `None` when the start would fall before the earliest representable date.
    pub fn trailing(today: NaiveDate, days: u32) -> Option<Self> {
        let from = today.checked_sub_days(Days::new(u64::from(days)))?;
        Some(Self { from, to: today })
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.from, self.to)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Fetch,
    Dispatch,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Fetch => "fetch",
            Phase::Dispatch => "dispatch",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PendingDiff {
    #[serde(rename = "updateData")]
    pub update_data: bool,
    #[serde(default)]
    pub hours: HourAggregate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staged_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchSummary {
    pub attempted_at: Option<DateTime<Utc>>,
    pub applied: usize,
    pub skipped: usize,
    pub lookup_failed: usize,
    #[serde(default)]
    pub failed: Vec<String>,
}

/// The only state carried between invocations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub all_hours: HourAggregate,
    #[serde(default)]
    pub pending_diff: Option<PendingDiff>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_dispatch: Option<DispatchSummary>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            all_hours: HourAggregate::new(),
            pending_diff: None,
            last_dispatch: None,
        }
    }
}

impl Snapshot {
    pub fn phase(&self) -> Phase {
        match &self.pending_diff {
            Some(diff) if diff.update_data => Phase::Dispatch,
            _ => Phase::Fetch,
        }
    }

    pub fn staged_count(&self) -> usize {
        self.pending_diff
            .as_ref()
            .filter(|diff| diff.update_data)
            .map(|diff| diff.hours.len())
            .unwrap_or(0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CustomField {
    pub gid: String,
    pub name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CustomFieldBinding {
    pub task_id: String,
    pub field_id: String,
}
