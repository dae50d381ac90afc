//! One invocation of the two-phase sync.
//!
//! Each run looks at the stored snapshot and does exactly one of:
//!
//! - **fetch**: pull the window's time entries, roll them up, diff against the
//!   stored totals and stage the changed ones (`updateData = true`);
//! - **dispatch**: push every staged total to its task, then clear
//!   `updateData` so the next run fetches again.
//!
//! A fetch never dispatches and a dispatch never fetches. Phase-fatal errors
//! return before the snapshot is written, so the stored record is always the
//! previous one or the complete new one.

use crate::aggregate::{Reconciliation, aggregate, reconcile};
use crate::dispatch::{TaskFieldResolver, TaskUpdateDispatcher};
use crate::error::SyncError;
use crate::integrations::asana::TaskApi;
use crate::integrations::harvest::{TimeEntrySource, fetch_time_entries};
use crate::journal::RunJournal;
use crate::models::{DateWindow, DispatchSummary, PendingDiff, Phase, Snapshot};
use crate::storage::SnapshotStore;
use chrono::Utc;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub applied: usize,
    pub missing_field: Vec<String>,
    pub lookup_failed: Vec<String>,
    pub failed: Vec<String>,
}

impl DispatchReport {
    pub fn attempted(&self) -> usize {
        self.applied + self.missing_field.len() + self.lookup_failed.len() + self.failed.len()
    }

    pub fn summary(&self) -> String {
        format!(
            "Applied {} | No field {} | Lookup failed {} | Write failed {}",
            self.applied,
            self.missing_field.len(),
            self.lookup_failed.len(),
            self.failed.len()
        )
    }

    fn to_record(&self) -> DispatchSummary {
        DispatchSummary {
            attempted_at: Some(Utc::now()),
            applied: self.applied,
            skipped: self.missing_field.len(),
            lookup_failed: self.lookup_failed.len(),
            failed: self.failed.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Staged {
        window: DateWindow,
        entries: usize,
        tracked: usize,
        changed: usize,
    },
    Dispatched(DispatchReport),
}

impl RunOutcome {
    pub fn phase(&self) -> Phase {
        match self {
            RunOutcome::Staged { .. } => Phase::Fetch,
            RunOutcome::Dispatched(_) => Phase::Dispatch,
        }
    }

    pub fn summary(&self) -> String {
        match self {
            RunOutcome::Staged {
                window,
                entries,
                tracked,
                changed,
            } => format!(
                "Fetch {window}: {entries} entries | {tracked} tasks tracked | {changed} staged"
            ),
            RunOutcome::Dispatched(report) => format!("Dispatch: {}", report.summary()),
        }
    }
}

pub struct SyncOrchestrator<'a, H: ?Sized, A: ?Sized, S: ?Sized> {
    harvest: &'a H,
    asana: &'a A,
    store: &'a S,
    journal: &'a RunJournal,
    field_name: &'a str,
}

impl<'a, H, A, S> SyncOrchestrator<'a, H, A, S>
where
    H: TimeEntrySource + ?Sized,
    A: TaskApi + ?Sized,
    S: SnapshotStore + ?Sized,
{
    pub fn new(
        harvest: &'a H,
        asana: &'a A,
        store: &'a S,
        journal: &'a RunJournal,
        field_name: &'a str,
    ) -> Self {
        Self {
            harvest,
            asana,
            store,
            journal,
            field_name,
        }
    }

    pub fn run(&self, window: DateWindow) -> Result<RunOutcome, SyncError> {
        let snapshot = self.store.load()?;
        let phase = snapshot.phase();
        tracing::info!(phase = phase.as_str(), "sync invocation");
        match phase {
            Phase::Fetch => self.fetch_phase(snapshot, window),
            Phase::Dispatch => self.dispatch_phase(snapshot),
        }
    }

    fn fetch_phase(&self, mut snapshot: Snapshot, window: DateWindow) -> Result<RunOutcome, SyncError> {
        let entries = fetch_time_entries(self.harvest, &window)?;
        let fresh = aggregate(&entries).ok_or(SyncError::EmptyInput {
            from: window.from,
            to: window.to,
        })?;

        let Reconciliation { all_hours, diff } = reconcile(&fresh, &snapshot.all_hours);
        let changed = diff.len();
        tracing::info!(
            %window,
            entries = entries.len(),
            tasks = fresh.len(),
            changed,
            "time entries reconciled"
        );

        snapshot.all_hours = all_hours;
        snapshot.pending_diff = Some(PendingDiff {
            update_data: !diff.is_empty(),
            hours: diff,
            staged_at: Some(Utc::now()),
        });
        self.store.save(&snapshot)?;

        Ok(RunOutcome::Staged {
            window,
            entries: entries.len(),
            tracked: snapshot.all_hours.len(),
            changed,
        })
    }

    fn dispatch_phase(&self, mut snapshot: Snapshot) -> Result<RunOutcome, SyncError> {
        let mut pending = snapshot.pending_diff.take().unwrap_or_default();
        let resolver = TaskFieldResolver::new(self.asana, self.field_name);
        let dispatcher = TaskUpdateDispatcher::new(self.asana, self.journal);
        let mut report = DispatchReport::default();

        for (task_id, &hours) in &pending.hours {
            let binding = match resolver.resolve(task_id) {
                Ok(Some(binding)) => binding,
                Ok(None) => {
                    tracing::warn!(%task_id, field = self.field_name, "task has no hours field, skipped");
                    report.missing_field.push(task_id.clone());
                    continue;
                }
                Err(err) => {
                    tracing::warn!(%task_id, error = %err, "custom field lookup failed, skipped");
                    if let Err(io_err) = self.journal.record_lookup_failure(task_id, &err.cause) {
                        tracing::warn!(%task_id, error = %io_err, "error log write failed");
                    }
                    report.lookup_failed.push(task_id.clone());
                    continue;
                }
            };

            match dispatcher.apply_hours(&binding, hours) {
                Ok(()) => report.applied += 1,
                Err(failure) => report.failed.push(failure.task_id),
            }
        }

        // The staged hours stay as a record of what was attempted.
        pending.update_data = false;
        snapshot.pending_diff = Some(pending);
        snapshot.last_dispatch = Some(report.to_record());
        self.store.save(&snapshot)?;

        tracing::info!(
            attempted = report.attempted(),
            applied = report.applied,
            failed = report.failed.len(),
            "dispatch pass complete"
        );
        Ok(RunOutcome::Dispatched(report))
    }
}
