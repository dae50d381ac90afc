use crate::error::{DispatchError, LookupError};
use crate::integrations::asana::TaskApi;
use crate::journal::RunJournal;
use crate::models::CustomFieldBinding;

/// Finds the custom field that holds the hour total on a task. Looked up on
/// every dispatch since field configuration can change remotely.
pub struct TaskFieldResolver<'a, A: TaskApi + ?Sized> {
    api: &'a A,
    field_name: &'a str,
}

impl<'a, A: TaskApi + ?Sized> TaskFieldResolver<'a, A> {
    pub fn new(api: &'a A, field_name: &'a str) -> Self {
        Self { api, field_name }
    }

    pub fn resolve(&self, task_id: &str) -> Result<Option<CustomFieldBinding>, LookupError> {
        let fields = self.api.custom_fields(task_id).map_err(|cause| LookupError {
            task_id: task_id.to_string(),
            cause,
        })?;
        Ok(fields
            .into_iter()
            .find(|field| field.name.as_deref() == Some(self.field_name))
            .map(|field| CustomFieldBinding {
                task_id: task_id.to_string(),
                field_id: field.gid,
            }))
    }
}

/// Writes one value per call and journals the outcome. A failed write is
/// returned, never raised past the caller's loop.
pub struct TaskUpdateDispatcher<'a, A: TaskApi + ?Sized> {
    api: &'a A,
    journal: &'a RunJournal,
}

impl<'a, A: TaskApi + ?Sized> TaskUpdateDispatcher<'a, A> {
    pub fn new(api: &'a A, journal: &'a RunJournal) -> Self {
        Self { api, journal }
    }

    pub fn apply_hours(&self, binding: &CustomFieldBinding, hours: f64) -> Result<(), DispatchError> {
        match self
            .api
            .set_custom_field(&binding.task_id, &binding.field_id, hours)
        {
            Ok(()) => {
                tracing::info!(task_id = %binding.task_id, hours, "task updated");
                if let Err(err) = self.journal.record_success(&binding.task_id, hours) {
                    tracing::warn!(task_id = %binding.task_id, error = %err, "success log write failed");
                }
                Ok(())
            }
            Err(cause) => {
                let failure = DispatchError {
                    task_id: binding.task_id.clone(),
                    cause,
                };
                tracing::warn!(
                    task_id = %failure.task_id,
                    status = ?failure.cause.status,
                    error = %failure.cause,
                    "task update failed"
                );
                if let Err(err) = self.journal.record_dispatch_failure(&failure) {
                    tracing::warn!(task_id = %failure.task_id, error = %err, "error log write failed");
                }
                Err(failure)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteError;
    use crate::integrations::fake::FakeAsana;
    use chrono::Local;
    use std::fs;
    use tempfile::TempDir;

    fn binding(task_id: &str, field_id: &str) -> CustomFieldBinding {
        CustomFieldBinding {
            task_id: task_id.to_string(),
            field_id: field_id.to_string(),
        }
    }

    #[test]
    fn resolver_matches_exact_field_name() {
        let asana = FakeAsana::new().task(
            "1201",
            &[("1", "Harvest hours"), ("2", "Harvest Hours"), ("3", "Estimate")],
        );
        let resolver = TaskFieldResolver::new(&asana, "Harvest Hours");
        assert_eq!(
            resolver.resolve("1201").expect("lookup"),
            Some(binding("1201", "2"))
        );
    }

    #[test]
    fn resolver_reports_absent_field_as_none() {
        let asana = FakeAsana::new().task("1201", &[("3", "Estimate")]);
        let resolver = TaskFieldResolver::new(&asana, "Harvest Hours");
        assert_eq!(resolver.resolve("1201").expect("lookup"), None);
    }

    #[test]
    fn resolver_surfaces_transport_failure() {
        let asana = FakeAsana::new().failing_lookup("1201");
        let resolver = TaskFieldResolver::new(&asana, "Harvest Hours");
        let err = resolver.resolve("1201").expect_err("lookup failure");
        assert_eq!(err.task_id, "1201");
        assert_eq!(err.cause.status, None);
    }

    #[test]
    fn applying_same_value_twice_is_harmless() {
        let dir = TempDir::new().expect("temp dir");
        let journal = RunJournal::new(dir.path());
        let asana = FakeAsana::new().task("1201", &[("2", "Harvest Hours")]);
        let dispatcher = TaskUpdateDispatcher::new(&asana, &journal);

        dispatcher.apply_hours(&binding("1201", "2"), 3.5).expect("first");
        dispatcher.apply_hours(&binding("1201", "2"), 3.5).expect("second");

        assert_eq!(asana.value("1201", "2"), Some(3.5));
        let successes = fs::read_to_string(journal.success_path()).expect("success log");
        assert_eq!(successes.lines().count(), 2);
    }

    #[test]
    fn failed_write_is_returned_and_journaled() {
        let dir = TempDir::new().expect("temp dir");
        let journal = RunJournal::new(dir.path());
        let asana = FakeAsana::new().failing_write("1201", RemoteError::http(403, "forbidden"));
        let dispatcher = TaskUpdateDispatcher::new(&asana, &journal);

        let err = dispatcher
            .apply_hours(&binding("1201", "2"), 3.5)
            .expect_err("write failure");
        assert_eq!(err.task_id, "1201");
        assert_eq!(err.cause.status, Some(403));

        let log = fs::read_to_string(journal.error_path_for(Local::now().date_naive()))
            .expect("error log");
        assert!(log.contains("\"status\":403"));
        assert!(log.contains("\"body\":\"forbidden\""));
        assert!(!journal.success_path().exists());
    }
}
