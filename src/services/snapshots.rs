use jiff::Timestamp;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use crate::{
    api::TaskSource,
    config::SnapshotSettings,
    models::{
        snapshot::{ActiveSession, PomodoroStatus, TimedSnapshot},
        task::Task,
    },
    services::task_cache::seconds_since,
    storage::{Storage, StorageError},
};

pub const ACTIVE_SESSION_FILE: &str = "time_active_cache.json";
pub const TASK_DETAIL_FILE: &str = "task_detail_cache.json";
pub const POMODORO_FILE: &str = "pomodoro_status_cache.json";

/// Short-lived single-entry caches in front of the TaskNotes lookups that
/// run on every keystroke. Lookup failures become `None`.
pub struct Snapshots<'a, S: Storage> {
    storage: &'a S,
    settings: SnapshotSettings,
}

impl<'a, S: Storage> Snapshots<'a, S> {
    pub fn new(storage: &'a S, settings: SnapshotSettings) -> Self {
        Self { storage, settings }
    }

    fn read_within<T: DeserializeOwned>(
        &self,
        file: &str,
        window: f64,
        now: Timestamp,
    ) -> Option<TimedSnapshot<T>> {
        self.storage
            .read::<TimedSnapshot<T>>(file)
            .filter(|snapshot| seconds_since(snapshot.timestamp, now) <= window.max(0.0))
    }

    fn save<T: Serialize>(
        &self,
        file: &str,
        id: Option<&str>,
        payload: Option<T>,
        now: Timestamp,
    ) -> Result<Option<T>, StorageError> {
        let snapshot = TimedSnapshot {
            timestamp: now,
            id: id.map(str::to_string),
            payload,
        };
        self.storage.write(file, &snapshot)?;
        Ok(snapshot.payload)
    }

    /// `Some(None)` is a fresh "nothing is being tracked".
    pub fn cached_session(&self, now: Timestamp) -> Option<Option<ActiveSession>> {
        self.read_within::<ActiveSession>(
            ACTIVE_SESSION_FILE,
            self.settings.active_session_ttl,
            now,
        )
        .map(|snapshot| snapshot.payload)
    }

    pub async fn active_session(
        &self,
        source: &impl TaskSource,
        now: Timestamp,
    ) -> Result<Option<ActiveSession>, StorageError> {
        if let Some(hit) = self.cached_session(now) {
            debug!("active session cache hit");
            return Ok(hit);
        }

        match source.active_session().await {
            Ok(session) => self.save(ACTIVE_SESSION_FILE, None, session, now),
            Err(e) => {
                warn!(error = %e, "active session lookup failed");
                Ok(None)
            }
        }
    }

    pub fn cached_task(&self, path: &str, now: Timestamp) -> Option<Task> {
        if path.is_empty() {
            return None;
        }
        self.read_within::<Task>(TASK_DETAIL_FILE, self.settings.task_detail_ttl, now)
            .filter(|snapshot| snapshot.id.as_deref() == Some(path))
            .and_then(|snapshot| snapshot.payload)
    }

    pub async fn task_detail(
        &self,
        source: &impl TaskSource,
        path: &str,
        now: Timestamp,
    ) -> Result<Option<Task>, StorageError> {
        if path.is_empty() {
            return Ok(None);
        }
        if let Some(task) = self.cached_task(path, now) {
            debug!(path, "task detail cache hit");
            return Ok(Some(task));
        }

        match source.task_detail(path).await {
            Ok(Some(task)) if !task.path.trim().is_empty() => {
                self.save(TASK_DETAIL_FILE, Some(path), Some(task), now)
            }
            Ok(_) => Ok(None),
            Err(e) => {
                warn!(path, error = %e, "task detail lookup failed");
                Ok(None)
            }
        }
    }

    pub fn fresh_pomodoro(&self, now: Timestamp) -> Option<PomodoroStatus> {
        self.read_within::<PomodoroStatus>(POMODORO_FILE, self.settings.pomodoro_ttl, now)
            .and_then(|snapshot| snapshot.payload)
    }

    pub fn stale_pomodoro(&self, now: Timestamp) -> Option<PomodoroStatus> {
        self.read_within::<PomodoroStatus>(POMODORO_FILE, self.settings.pomodoro_max_stale, now)
            .and_then(|snapshot| snapshot.payload)
    }

    /// Fresh cache, then the API, then anything within the stale window.
    pub async fn pomodoro_status(
        &self,
        source: &impl TaskSource,
        now: Timestamp,
    ) -> Result<Option<PomodoroStatus>, StorageError> {
        if let Some(status) = self.fresh_pomodoro(now) {
            return Ok(Some(status));
        }

        match source.pomodoro_status().await {
            Ok(Some(status)) => self.save(POMODORO_FILE, None, Some(status), now),
            Ok(None) => Ok(self.stale_pomodoro(now)),
            Err(e) => {
                warn!(error = %e, "pomodoro status lookup failed");
                Ok(self.stale_pomodoro(now))
            }
        }
    }
}
