//! Hour roll-up and the diff against the stored snapshot.

use crate::models::{HourAggregate, TimeEntry};

/// Result of [`reconcile`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Reconciliation {
    /// Previous totals with every new or changed value written over them.
    pub all_hours: HourAggregate,
    /// Only the references whose total is new or different.
    pub diff: HourAggregate,
}

/// Sums hours per external reference. Entries without a reference are dropped
/// and a missing `hours` value counts as zero.
///
/// Returns `None` for an empty input; callers treat that as an outage rather
/// than "everything went to zero".
pub fn aggregate(entries: &[TimeEntry]) -> Option<HourAggregate> {
    if entries.is_empty() {
        return None;
    }

    let mut totals = HourAggregate::new();
    for entry in entries {
        let Some(reference) = entry.external_reference_id.as_deref() else {
            continue;
        };
        *totals.entry(reference.to_string()).or_insert(0.0) += entry.hours.unwrap_or(0.0);
    }
    Some(totals)
}

/// Merges a fresh aggregate over the previous totals.
///
/// References missing from `fresh` keep their stored value; nothing is ever
/// removed.
pub fn reconcile(fresh: &HourAggregate, previous: &HourAggregate) -> Reconciliation {
    let mut all_hours = previous.clone();
    let mut diff = HourAggregate::new();

    for (reference, &hours) in fresh {
        let changed = match previous.get(reference) {
            Some(&stored) => stored != hours,
            None => true,
        };
        if changed {
            diff.insert(reference.clone(), hours);
            all_hours.insert(reference.clone(), hours);
        }
    }

    Reconciliation { all_hours, diff }
}
