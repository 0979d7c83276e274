use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::catalog::Catalog;
use crate::clock::Clock;
use crate::db::KeyValueStore;
use crate::error::BoardError;
use crate::models::{ApplicationDraft, ApplicationStatus, Job, JobApplication};
use crate::similar;

pub const SAVED_JOBS_KEY: &str = "savedJobs";
pub const APPLIED_JOBS_KEY: &str = "appliedJobs";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DashboardStats {
    pub applied: usize,
    pub saved: usize,
    pub interviews: usize,
    /// Interviews as a rounded percentage of applications.
    pub response_rate: u32,
}

/// Catalog plus the user's saved jobs and applications.
///
/// Every mutation writes the affected collection back to storage before
/// returning. If storage fails, the store logs it and keeps working from
/// memory for the rest of the session.
pub struct JobStore {
    catalog: Catalog,
    saved: Vec<String>,
    applications: Vec<JobApplication>,
    storage: Box<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    persistent: bool,
}

impl JobStore {
    pub fn load(catalog: Catalog, storage: Box<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        let mut persistent = true;

        let saved = match read_array::<String>(storage.as_ref(), SAVED_JOBS_KEY) {
            Ok(saved) => saved,
            Err(e) => {
                warn!("Could not read saved jobs, continuing without persistence: {e:#}");
                persistent = false;
                Vec::new()
            }
        };

        let applications = if persistent {
            match read_array::<JobApplication>(storage.as_ref(), APPLIED_JOBS_KEY) {
                Ok(apps) => apps,
                Err(e) => {
                    warn!("Could not read applications, continuing without persistence: {e:#}");
                    persistent = false;
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        debug!(
            jobs = catalog.len(),
            saved = saved.len(),
            applications = applications.len(),
            "Job store loaded"
        );

        Self {
            catalog,
            saved,
            applications,
            storage,
            clock,
            persistent,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    // --- Catalog queries ---

    pub fn list_jobs(&self) -> &[Job] {
        self.catalog.jobs()
    }

    pub fn get_job_by_id(&self, id: &str) -> Option<&Job> {
        self.catalog.get(id)
    }

    pub fn similar_jobs(&self, id: &str, limit: usize) -> Vec<&Job> {
        similar::similar_jobs(&self.catalog, id, limit)
    }

    // --- Saved jobs ---

    /// Adds the id if absent, removes it if present. The id is not checked
    /// against the catalog.
    pub fn toggle_save_job(&mut self, id: &str) -> bool {
        let now_saved = if let Some(pos) = self.saved.iter().position(|s| s == id) {
            self.saved.remove(pos);
            false
        } else {
            self.saved.push(id.to_string());
            true
        };
        debug!(job_id = id, saved = now_saved, "Toggled saved job");
        self.persist_saved();
        now_saved
    }

    pub fn is_job_saved(&self, id: &str) -> bool {
        self.saved.iter().any(|s| s == id)
    }

    pub fn saved_ids(&self) -> &[String] {
        &self.saved
    }

    /// Saved jobs that exist in the catalog, in catalog order.
    pub fn saved_jobs(&self) -> Vec<&Job> {
        self.catalog
            .jobs()
            .iter()
            .filter(|job| self.is_job_saved(&job.id))
            .collect()
    }

    // --- Applications ---

    /// Records a new application with status Applied, stamped with the
    /// current time.
    ///
    /// This does not reject a second application for the same job; callers
    /// check `is_job_applied` first (the apply workflow does).
    pub fn apply_to_job(&mut self, id: &str, draft: ApplicationDraft) -> &JobApplication {
        let application = JobApplication {
            job_id: id.to_string(),
            status: ApplicationStatus::Applied,
            applied_date: self.clock.now(),
            personal_details: draft.personal_details,
            resume_url: draft.resume_url,
            cover_letter: draft.cover_letter,
        };
        self.applications.push(application);
        debug!(job_id = id, total = self.applications.len(), "Recorded application");
        self.persist_applications();
        &self.applications[self.applications.len() - 1]
    }

    pub fn is_job_applied(&self, id: &str) -> bool {
        self.applications.iter().any(|app| app.job_id == id)
    }

    pub fn applications(&self) -> &[JobApplication] {
        &self.applications
    }

    /// Applications paired with their job, skipping any whose job has left
    /// the catalog.
    pub fn applied_jobs(&self) -> Vec<(&JobApplication, &Job)> {
        self.applications
            .iter()
            .filter_map(|app| self.catalog.get(&app.job_id).map(|job| (app, job)))
            .collect()
    }

    /// Manual status change; nothing in the application flow advances status.
    pub fn set_application_status(
        &mut self,
        id: &str,
        status: ApplicationStatus,
    ) -> Result<usize, BoardError> {
        let mut updated = 0;
        for app in self.applications.iter_mut().filter(|app| app.job_id == id) {
            app.status = status;
            updated += 1;
        }
        if updated == 0 {
            return Err(BoardError::NotFound(id.to_string()));
        }
        self.persist_applications();
        Ok(updated)
    }

    pub fn stats(&self) -> DashboardStats {
        let applied = self.applications.len();
        let interviews = self
            .applications
            .iter()
            .filter(|app| app.status == ApplicationStatus::Interview)
            .count();
        let response_rate = if applied > 0 {
            ((interviews as f64 / applied as f64) * 100.0).round() as u32
        } else {
            0
        };
        DashboardStats {
            applied,
            saved: self.saved.len(),
            interviews,
            response_rate,
        }
    }

    // --- Persistence ---

    fn persist_saved(&mut self) {
        if !self.persistent {
            return;
        }
        let result = write_array(self.storage.as_mut(), SAVED_JOBS_KEY, &self.saved);
        self.handle_write(SAVED_JOBS_KEY, result);
    }

    fn persist_applications(&mut self) {
        if !self.persistent {
            return;
        }
        let result = write_array(self.storage.as_mut(), APPLIED_JOBS_KEY, &self.applications);
        self.handle_write(APPLIED_JOBS_KEY, result);
    }

    fn handle_write(&mut self, key: &str, result: Result<()>) {
        if let Err(e) = result {
            warn!(key, "Storage write failed, keeping changes for this session only: {e:#}");
            self.persistent = false;
        }
    }

    #[cfg(test)]
    pub(crate) fn storage(&self) -> &dyn KeyValueStore {
        self.storage.as_ref()
    }
}

/// Absent or unparseable values read as empty; only a failing read is an error.
fn read_array<T: DeserializeOwned>(storage: &dyn KeyValueStore, key: &str) -> Result<Vec<T>> {
    let Some(raw) = storage.get(key)? else {
        return Ok(Vec::new());
    };
    match serde_json::from_str(&raw) {
        Ok(values) => Ok(values),
        Err(e) => {
            warn!(key, "Ignoring unparseable stored value: {e}");
            Ok(Vec::new())
        }
    }
}

fn write_array<T: Serialize>(storage: &mut dyn KeyValueStore, key: &str, values: &[T]) -> Result<()> {
    let json = serde_json::to_string(values).context("Failed to serialize stored value")?;
    storage.set(key, &json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::test_job;
    use crate::clock::FixedClock;
    use crate::db::{open_storage, MemoryStorage};
    use crate::models::{JobType, PersonalDetails};
    use anyhow::anyhow;

    struct FailingStorage {
        fail_reads: bool,
    }

    impl KeyValueStore for FailingStorage {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            if self.fail_reads {
                Err(anyhow!("storage disabled"))
            } else {
                Ok(None)
            }
        }

        fn set(&mut self, _key: &str, _value: &str) -> Result<()> {
            Err(anyhow!("quota exceeded"))
        }
    }

    fn clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock::new("2026-10-19T12:00:00Z".parse().unwrap()))
    }

    fn catalog() -> Catalog {
        Catalog::new(vec![
            test_job("1", "Engineering", JobType::FullTime),
            test_job("2", "Design", JobType::Internship),
            test_job("3", "Engineering", JobType::FullTime),
        ])
        .unwrap()
    }

    fn store_with(storage: MemoryStorage) -> JobStore {
        JobStore::load(catalog(), Box::new(storage), clock())
    }

    fn draft() -> ApplicationDraft {
        ApplicationDraft {
            personal_details: PersonalDetails {
                name: "Ada Lovelace".to_string(),
                email: "ada@example.com".to_string(),
                phone: "+44 20 7946 0000".to_string(),
            },
            resume_url: Some("file:///tmp/cv.pdf".to_string()),
            cover_letter: Some("Dear hiring team".to_string()),
        }
    }

    #[test]
    fn test_list_and_get_jobs() {
        let store = store_with(MemoryStorage::new());
        let ids: Vec<&str> = store.list_jobs().iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(store.get_job_by_id("2").unwrap().category, "Design");
        assert!(store.get_job_by_id("404").is_none());
    }

    #[test]
    fn test_toggle_save_is_its_own_inverse() {
        let mut store = store_with(MemoryStorage::new());
        assert!(!store.is_job_saved("1"));
        assert!(store.toggle_save_job("1"));
        assert!(store.is_job_saved("1"));
        assert!(!store.toggle_save_job("1"));
        assert!(!store.is_job_saved("1"));
    }

    #[test]
    fn test_toggle_save_accepts_unknown_ids() {
        let mut store = store_with(MemoryStorage::new());
        store.toggle_save_job("ghost");
        assert!(store.is_job_saved("ghost"));
        assert!(store.saved_jobs().is_empty());
        assert_eq!(store.stats().saved, 1);
    }

    #[test]
    fn test_saved_jobs_follow_catalog_order() {
        let mut store = store_with(MemoryStorage::new());
        store.toggle_save_job("3");
        store.toggle_save_job("1");
        let ids: Vec<&str> = store.saved_jobs().iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
        assert_eq!(store.saved_ids(), &["3".to_string(), "1".to_string()]);
    }

    #[test]
    fn test_mutations_are_written_to_storage() {
        let mut store = store_with(MemoryStorage::new());
        store.toggle_save_job("2");
        store.apply_to_job("1", draft());

        let saved = store.storage().get(SAVED_JOBS_KEY).unwrap().unwrap();
        assert_eq!(saved, "[\"2\"]");

        let applied = store.storage().get(APPLIED_JOBS_KEY).unwrap().unwrap();
        let apps: Vec<JobApplication> = serde_json::from_str(&applied).unwrap();
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].job_id, "1");
        assert!(store.is_persistent());
    }

    #[test]
    fn test_state_reloads_from_storage() {
        let mut storage = MemoryStorage::new();
        storage.set(SAVED_JOBS_KEY, "[\"1\",\"3\"]").unwrap();
        let app = JobApplication {
            job_id: "2".to_string(),
            status: ApplicationStatus::Interview,
            applied_date: "2026-10-01T08:00:00Z".parse().unwrap(),
            personal_details: draft().personal_details,
            resume_url: None,
            cover_letter: None,
        };
        storage
            .set(APPLIED_JOBS_KEY, &serde_json::to_string(&vec![app]).unwrap())
            .unwrap();

        let store = store_with(storage);
        assert!(store.is_job_saved("1"));
        assert!(store.is_job_saved("3"));
        assert!(store.is_job_applied("2"));
        assert_eq!(store.applications()[0].status, ApplicationStatus::Interview);
    }

    #[test]
    fn test_unparseable_storage_reads_as_empty() {
        let mut storage = MemoryStorage::new();
        storage.set(SAVED_JOBS_KEY, "not json").unwrap();
        storage.set(APPLIED_JOBS_KEY, "{\"oops\":1}").unwrap();

        let store = store_with(storage);
        assert!(store.saved_ids().is_empty());
        assert!(store.applications().is_empty());
        assert!(store.is_persistent());
    }

    #[test]
    fn test_apply_stamps_status_and_date() {
        let mut store = store_with(MemoryStorage::new());
        assert!(!store.is_job_applied("1"));
        let app = store.apply_to_job("1", draft()).clone();
        assert!(store.is_job_applied("1"));
        assert_eq!(app.status, ApplicationStatus::Applied);
        assert_eq!(app.applied_date, "2026-10-19T12:00:00Z".parse::<chrono::DateTime<chrono::Utc>>().unwrap());
        assert_eq!(app.personal_details.name, "Ada Lovelace");
    }

    #[test]
    fn test_fresh_database_loads_empty_and_keeps_saves() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.db");

        let mut store = JobStore::load(catalog(), open_storage(Some(path.as_path())), clock());
        assert!(store.saved_ids().is_empty());
        assert!(store.applications().is_empty());
        assert!(store.toggle_save_job("3"));
        assert!(store.is_persistent());
        drop(store);

        let store = JobStore::load(catalog(), open_storage(Some(path.as_path())), clock());
        assert!(store.is_job_saved("3"));
    }

    #[test]
    fn test_new_application_starts_as_applied() {
        let mut store = store_with(MemoryStorage::new());
        store.apply_to_job("1", draft());
        store.set_application_status("1", ApplicationStatus::Rejected).unwrap();

        let second = store.apply_to_job("1", draft()).clone();
        assert_eq!(second.status, ApplicationStatus::Applied);
        assert_eq!(store.applications()[0].status, ApplicationStatus::Rejected);
    }

    #[test]
    fn test_apply_does_not_guard_against_duplicates() {
        let mut store = store_with(MemoryStorage::new());
        store.apply_to_job("1", draft());
        store.apply_to_job("1", draft());
        assert_eq!(store.applications().len(), 2);
    }

    #[test]
    fn test_missing_job_stays_absent_after_applies() {
        let mut store = store_with(MemoryStorage::new());
        for _ in 0..5 {
            store.apply_to_job("missing", draft());
        }
        assert!(store.is_job_applied("missing"));
        assert!(store.get_job_by_id("missing").is_none());
        assert!(store.applied_jobs().is_empty());
    }

    #[test]
    fn test_status_change_and_stats() {
        let mut store = store_with(MemoryStorage::new());
        assert_eq!(store.stats().response_rate, 0);

        store.apply_to_job("1", draft());
        store.apply_to_job("2", draft());
        store.apply_to_job("3", draft());
        store.toggle_save_job("1");

        assert_eq!(store.set_application_status("2", ApplicationStatus::Interview).unwrap(), 1);
        let stats = store.stats();
        assert_eq!(stats.applied, 3);
        assert_eq!(stats.saved, 1);
        assert_eq!(stats.interviews, 1);
        assert_eq!(stats.response_rate, 33);

        assert!(matches!(
            store.set_application_status("404", ApplicationStatus::Rejected),
            Err(BoardError::NotFound(id)) if id == "404"
        ));
    }

    #[test]
    fn test_write_failure_degrades_to_session_only() {
        let mut store = JobStore::load(
            catalog(),
            Box::new(FailingStorage { fail_reads: false }),
            clock(),
        );
        assert!(store.is_persistent());

        store.toggle_save_job("1");
        assert!(!store.is_persistent());
        assert!(store.is_job_saved("1"));

        store.apply_to_job("2", draft());
        assert!(store.is_job_applied("2"));
    }

    #[test]
    fn test_read_failure_starts_session_only() {
        let store = JobStore::load(
            catalog(),
            Box::new(FailingStorage { fail_reads: true }),
            clock(),
        );
        assert!(!store.is_persistent());
        assert!(store.saved_ids().is_empty());
        assert_eq!(store.list_jobs().len(), 3);
    }
}
