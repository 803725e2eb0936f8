use jiff::Timestamp;
use tracing::{debug, warn};

use crate::{
    api::{ListTasksQuery, TaskSource},
    config::Settings,
    models::{
        snapshot::PomodoroStatus,
        task::{Task, title_from_path},
    },
    services::{snapshots::Snapshots, task_cache::TaskCache},
    storage::{Storage, StorageError},
};

const TITLE_SEARCH_LIMIT: usize = 500;

/// What the action menu needs to know about one task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskOverview {
    /// Where the task lives now; differs from the requested path when the
    /// note moved (e.g. into an archive folder)
    pub path: String,
    pub title: String,
    pub task: Task,
    pub is_tracking: bool,
    pub pomodoro: Option<PomodoroStatus>,
}

/// Look up a task for the action menu. The task detail, the active time
/// tracking session and the pomodoro status are fetched concurrently; any of
/// them failing only removes that piece of information.
///
/// When the detail lookup fails the task is searched by the title implied by
/// its file name (active tasks, then archived ones), and finally in the
/// cached task list. `None` means all of those came up empty.
pub async fn task_overview<S: Storage>(
    source: &impl TaskSource,
    storage: &S,
    settings: &Settings,
    path: &str,
    now: Timestamp,
) -> Result<Option<TaskOverview>, StorageError> {
    let snapshots = Snapshots::new(storage, settings.snapshots);

    let (detail, session, pomodoro) = tokio::join!(
        source.task_detail(path),
        source.active_session(),
        snapshots.pomodoro_status(source, now),
    );
    let pomodoro = pomodoro?;

    let detail = detail.unwrap_or_else(|e| {
        warn!(path, error = %e, "task detail lookup failed");
        None
    });
    let active_id = match session {
        Ok(session) => session.map(|s| s.id).unwrap_or_default(),
        Err(e) => {
            warn!(error = %e, "active session lookup failed");
            String::new()
        }
    };

    let (task, path) = match detail {
        Some(task) => (task, path.to_string()),
        None => match find_by_title(source, &title_from_path(path)).await {
            Some(task) => {
                debug!(from = path, to = %task.path, "task found by title");
                let moved = task.path.clone();
                (task, moved)
            }
            None => match find_in_cache(storage, settings, path) {
                Some(task) => (task, path.to_string()),
                None => return Ok(None),
            },
        },
    };

    let title = task.display_title();

    Ok(Some(TaskOverview {
        is_tracking: !active_id.is_empty() && active_id == path,
        path,
        title,
        task,
        pomodoro,
    }))
}

async fn find_by_title(source: &impl TaskSource, title: &str) -> Option<Task> {
    for archived in [false, true] {
        let query = ListTasksQuery {
            archived: Some(archived),
            ..ListTasksQuery::new(TITLE_SEARCH_LIMIT)
        };
        match source.list_tasks(&query).await {
            Ok(tasks) => {
                if let Some(task) = tasks
                    .into_iter()
                    .find(|task| task.title == title && !task.path.is_empty())
                {
                    return Some(task);
                }
            }
            Err(e) => {
                warn!(title, error = %e, "title search failed");
                return None;
            }
        }
    }
    None
}

fn find_in_cache<S: Storage>(storage: &S, settings: &Settings, path: &str) -> Option<Task> {
    TaskCache::new(storage, settings.task_cache)
        .snapshot()?
        .tasks
        .into_iter()
        .find(|task| task.path == path)
}
