use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::models::task::Task;

/// Current task snapshot schema version. A snapshot with any other version is
/// treated as absent.
pub const TASK_SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TaskSnapshot {
    pub version: u32,
    pub timestamp: Timestamp,
    pub tasks: Vec<Task>,
}

impl TaskSnapshot {
    pub fn new(tasks: Vec<Task>, timestamp: Timestamp) -> Self {
        Self {
            version: TASK_SNAPSHOT_VERSION,
            timestamp,
            tasks,
        }
    }
}

/// Shared across process invocations through a plain file. Each field is
/// updated by its own read-modify-write; see `TaskCache` for the race window.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct RefreshState {
    pub refresh_requested: bool,
    pub requested_at: Option<Timestamp>,
    pub last_attempt: Option<Timestamp>,
    pub last_success: Option<Timestamp>,
}

/// Single-entry snapshot, overwritten wholesale on every save. `id` is only
/// set for snapshots keyed by a task.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TimedSnapshot<T> {
    pub timestamp: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub payload: Option<T>,
}

/// The task currently being time-tracked in TaskNotes.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ActiveSession {
    /// Path of the tracked task
    pub id: String,
    pub title: String,
    pub elapsed_minutes: Option<i64>,
    pub tags: Vec<String>,
    pub projects: Vec<String>,
    pub priority: String,
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct PomodoroStatus {
    /// A session exists, running or paused
    pub has_session: bool,
    pub is_running: bool,
    pub is_paused: bool,
    /// Seconds left in the current session
    pub time_remaining: i64,
    /// "work" or "break"
    pub session_type: String,
    pub task_id: Option<String>,
    pub task_title: Option<String>,
    pub total_pomodoros: i64,
    pub current_streak: i64,
}
