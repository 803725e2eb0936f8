use jiff::Timestamp;
use tracing::{debug, warn};

use crate::{
    api::{ListTasksQuery, TaskSource},
    config::TaskCacheSettings,
    models::{
        snapshot::{RefreshState, TASK_SNAPSHOT_VERSION, TaskSnapshot},
        task::Task,
    },
    storage::{Storage, StorageError},
};

pub const TASKS_CACHE_FILE: &str = "tasks_cache.json";
pub const REFRESH_STATE_FILE: &str = "tasks_refresh_state.json";

/// Cache state as seen by one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStatus {
    pub tasks: Vec<Task>,
    /// Seconds since the snapshot was written
    pub age: Option<f64>,
    pub is_fresh: bool,
    pub is_usable: bool,
    pub refresh_requested: bool,
    pub should_fetch: bool,
}

/// Tasks to show plus, when set, how soon Alfred should re-invoke us.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CachedTasks {
    pub tasks: Vec<Task>,
    pub rerun: Option<f64>,
}

impl CachedTasks {
    fn ready(tasks: Vec<Task>) -> Self {
        Self { tasks, rerun: None }
    }

    /// No data and nothing pending: the API is down and nothing is cached.
    pub fn is_not_ready(&self) -> bool {
        self.tasks.is_empty() && self.rerun.is_none()
    }
}

/// Stale-while-revalidate cache over the task list.
///
/// There is no long-running process: every Alfred keystroke starts a new
/// invocation that re-evaluates the snapshot and refresh-state files. A stale
/// snapshot is served immediately with a short `rerun`, and the re-invocation
/// that follows performs the fetch.
pub struct TaskCache<'a, S: Storage> {
    storage: &'a S,
    settings: TaskCacheSettings,
}

impl<'a, S: Storage> TaskCache<'a, S> {
    pub fn new(storage: &'a S, settings: TaskCacheSettings) -> Self {
        Self { storage, settings }
    }

    /// The saved snapshot; other schema versions count as absent.
    pub fn snapshot(&self) -> Option<TaskSnapshot> {
        self.storage
            .read::<TaskSnapshot>(TASKS_CACHE_FILE)
            .filter(|snapshot| snapshot.version == TASK_SNAPSHOT_VERSION)
    }

    pub fn refresh_state(&self) -> RefreshState {
        self.storage.read(REFRESH_STATE_FILE).unwrap_or_default()
    }

    pub fn status(&self, now: Timestamp) -> CacheStatus {
        let state = self.refresh_state();
        let (tasks, age) = match self.snapshot() {
            Some(snapshot) => (snapshot.tasks, Some(seconds_since(snapshot.timestamp, now))),
            None => (Vec::new(), None),
        };

        let is_usable = !tasks.is_empty() && age.is_some_and(|age| age <= self.settings.max_stale);
        let is_fresh = is_usable && age.is_some_and(|age| age <= self.settings.ttl);
        let backoff_elapsed = state
            .last_attempt
            .is_none_or(|at| seconds_since(at, now) >= self.settings.refresh_backoff);

        CacheStatus {
            tasks,
            age,
            is_fresh,
            is_usable,
            refresh_requested: state.refresh_requested,
            should_fetch: !(state.refresh_requested && !backoff_elapsed && is_usable),
        }
    }

    // The three mark_* helpers are independent read-modify-writes of the
    // refresh-state file with no lock. Two invocations interleaving here can
    // lose one update; that costs at most one extra fetch. Rename-on-write
    // keeps the file itself whole.

    pub fn mark_refresh_requested(&self, now: Timestamp) -> Result<(), StorageError> {
        self.update_state(|state| {
            state.refresh_requested = true;
            state.requested_at = Some(now);
        })
    }

    pub fn mark_fetch_attempt(&self, now: Timestamp) -> Result<(), StorageError> {
        self.update_state(|state| state.last_attempt = Some(now))
    }

    /// Replace the snapshot, then clear the pending request.
    pub fn mark_fetch_success(&self, tasks: &[Task], now: Timestamp) -> Result<(), StorageError> {
        self.storage
            .write(TASKS_CACHE_FILE, &TaskSnapshot::new(tasks.to_vec(), now))?;
        self.update_state(|state| {
            state.refresh_requested = false;
            state.last_success = Some(now);
        })
    }

    fn update_state(&self, apply: impl FnOnce(&mut RefreshState)) -> Result<(), StorageError> {
        let mut state = self.refresh_state();
        apply(&mut state);
        self.storage.write(REFRESH_STATE_FILE, &state)
    }

    /// Tasks for this invocation. API failures degrade to stale or empty
    /// results; only storage write failures are returned as errors.
    pub async fn load(
        &self,
        source: &impl TaskSource,
        query: &ListTasksQuery,
        now: Timestamp,
    ) -> Result<CachedTasks, StorageError> {
        let status = self.status(now);
        debug!(
            age = ?status.age,
            fresh = status.is_fresh,
            usable = status.is_usable,
            refresh_requested = status.refresh_requested,
            should_fetch = status.should_fetch,
            "task cache status"
        );

        if status.is_fresh {
            return Ok(CachedTasks::ready(status.tasks));
        }

        if status.is_usable && !status.refresh_requested {
            self.mark_refresh_requested(now)?;
            return Ok(CachedTasks {
                tasks: status.tasks,
                rerun: Some(self.settings.rerun),
            });
        }

        if status.is_usable && !status.should_fetch {
            return Ok(CachedTasks::ready(status.tasks));
        }

        self.mark_fetch_attempt(now)?;
        match source.list_tasks(query).await {
            Ok(tasks) => {
                debug!(count = tasks.len(), "task cache refreshed");
                self.mark_fetch_success(&tasks, now)?;
                Ok(CachedTasks::ready(tasks))
            }
            Err(e) if status.is_usable => {
                warn!(error = %e, "task fetch failed, serving stale cache");
                Ok(CachedTasks {
                    tasks: status.tasks,
                    rerun: Some(self.settings.rerun),
                })
            }
            Err(e) => {
                warn!(error = %e, "task fetch failed and nothing is cached");
                Ok(CachedTasks::default())
            }
        }
    }
}

pub(crate) fn seconds_since(earlier: Timestamp, now: Timestamp) -> f64 {
    now.duration_since(earlier).as_secs_f64()
}
