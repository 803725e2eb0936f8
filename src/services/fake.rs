use std::cell::{Cell, RefCell};

use crate::{
    api::{ApiError, ListTasksQuery, TaskSource},
    models::{
        snapshot::{ActiveSession, PomodoroStatus},
        task::Task,
    },
};

/// In-memory TaskNotes. `offline` makes every call fail.
#[derive(Default)]
pub struct FakeSource {
    pub tasks: Vec<Task>,
    pub active: Option<ActiveSession>,
    pub pomodoro: Option<PomodoroStatus>,
    pub offline: bool,
    pub list_calls: Cell<usize>,
    pub detail_calls: Cell<usize>,
    pub session_calls: Cell<usize>,
    pub pomodoro_calls: Cell<usize>,
    pub queries: RefCell<Vec<ListTasksQuery>>,
}

impl FakeSource {
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        Self {
            tasks,
            ..Self::default()
        }
    }

    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Self::default()
        }
    }

    fn check_online(&self, path: &str) -> Result<(), ApiError> {
        if self.offline {
            return Err(ApiError::Status {
                path: path.to_string(),
                status: 503,
                message: "offline".to_string(),
            });
        }
        Ok(())
    }
}

fn bump(counter: &Cell<usize>) {
    counter.set(counter.get() + 1);
}

pub fn task(path: &str, title: &str) -> Task {
    Task {
        path: path.to_string(),
        title: title.to_string(),
        ..Task::default()
    }
}

impl TaskSource for FakeSource {
    async fn list_tasks(&self, query: &ListTasksQuery) -> Result<Vec<Task>, ApiError> {
        bump(&self.list_calls);
        self.queries.borrow_mut().push(query.clone());
        self.check_online("/tasks")?;

        Ok(self
            .tasks
            .iter()
            .filter(|t| query.archived.is_none_or(|archived| t.archived == archived))
            .take(query.limit)
            .cloned()
            .collect())
    }

    async fn task_detail(&self, path: &str) -> Result<Option<Task>, ApiError> {
        bump(&self.detail_calls);
        self.check_online("/tasks/{path}")?;
        Ok(self.tasks.iter().find(|t| t.path == path).cloned())
    }

    async fn active_session(&self) -> Result<Option<ActiveSession>, ApiError> {
        bump(&self.session_calls);
        self.check_online("/time/active")?;
        Ok(self.active.clone())
    }

    async fn pomodoro_status(&self) -> Result<Option<PomodoroStatus>, ApiError> {
        bump(&self.pomodoro_calls);
        self.check_online("/pomodoro/status")?;
        Ok(self.pomodoro.clone())
    }
}
