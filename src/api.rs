use std::time::Duration;

use reqwest::{Client, header::ACCEPT};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::{
    config::Settings,
    models::{
        snapshot::{ActiveSession, PomodoroStatus},
        task::Task,
    },
};

const LIST_TIMEOUT: Duration = Duration::from_secs(10);
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);
const ERROR_BODY_PREVIEW: usize = 200;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Request to '{path}' failed: {source}")]
    Request {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} calling '{path}': {message}")]
    Status {
        path: String,
        status: u16,
        message: String,
    },

    #[error("TaskNotes rejected '{path}': {message}")]
    Rejected { path: String, message: String },

    #[error("Unexpected response from '{path}': {message}")]
    Decode { path: String, message: String },
}

/// Server-side filters for `GET /tasks`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListTasksQuery {
    pub limit: usize,
    pub completed: Option<bool>,
    pub archived: Option<bool>,
    pub sort: Option<String>,
}

impl ListTasksQuery {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    /// Most recently modified first, hiding completed and archived tasks
    /// unless asked for.
    pub fn recent(limit: usize, completed: bool, archived: bool) -> Self {
        Self {
            limit,
            completed: Some(completed),
            archived: Some(archived),
            sort: Some("date_modified:desc".to_string()),
        }
    }

    pub fn path(&self) -> String {
        let mut params = vec![format!("limit={}", self.limit)];
        if let Some(completed) = self.completed {
            params.push(format!("completed={}", completed));
        }
        if let Some(archived) = self.archived {
            params.push(format!("archived={}", archived));
        }
        if let Some(sort) = self.sort.as_deref().filter(|s| !s.is_empty()) {
            params.push(format!("sort={}", urlencoding::encode(sort)));
        }
        format!("/tasks?{}", params.join("&"))
    }
}

/// Read side of the TaskNotes API, as seen by the caches and search flow.
#[allow(async_fn_in_trait)]
pub trait TaskSource {
    async fn list_tasks(&self, query: &ListTasksQuery) -> Result<Vec<Task>, ApiError>;
    async fn task_detail(&self, path: &str) -> Result<Option<Task>, ApiError>;
    async fn active_session(&self) -> Result<Option<ActiveSession>, ApiError>;
    async fn pomodoro_status(&self) -> Result<Option<PomodoroStatus>, ApiError>;
}

#[derive(Debug, Clone)]
pub struct TaskNotesClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl TaskNotesClient {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, ApiError> {
        let client = Client::builder().build().map_err(ApiError::Client)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, ApiError> {
        Self::new(&settings.api_base, settings.token.clone())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET `path` and unwrap the `{success, data, error}` envelope check.
    async fn get_json(&self, path: &str, timeout: Duration) -> Result<Value, ApiError> {
        let mut request = self
            .client
            .get(self.url(path))
            .timeout(timeout)
            .header(ACCEPT, "application/json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let resp = request.send().await.map_err(|e| ApiError::Request {
            path: path.to_string(),
            source: e,
        })?;
        let status = resp.status();
        let body = resp.text().await.map_err(|e| ApiError::Request {
            path: path.to_string(),
            source: e,
        })?;

        if !status.is_success() {
            return Err(ApiError::Status {
                path: path.to_string(),
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let payload = if body.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(&body).map_err(|_| ApiError::Decode {
                path: path.to_string(),
                message: format!("non-JSON response: {}", preview(&body)),
            })?
        };

        if payload.get("success") == Some(&Value::Bool(false)) {
            return Err(ApiError::Rejected {
                path: path.to_string(),
                message: error_message(&payload.to_string()),
            });
        }

        Ok(payload)
    }
}

impl TaskSource for TaskNotesClient {
    async fn list_tasks(&self, query: &ListTasksQuery) -> Result<Vec<Task>, ApiError> {
        let payload = match self.get_json(&query.path(), LIST_TIMEOUT).await {
            Ok(payload) => payload,
            Err(e) => {
                // Older TaskNotes versions reject the filter parameters.
                debug!(error = %e, "filtered task listing failed, retrying with limit only");
                self.get_json(&ListTasksQuery::new(query.limit).path(), LIST_TIMEOUT)
                    .await?
            }
        };
        Ok(tasks_from_payload(&payload))
    }

    async fn task_detail(&self, path: &str) -> Result<Option<Task>, ApiError> {
        let endpoint = format!("/tasks/{}", urlencoding::encode(path));
        let payload = self.get_json(&endpoint, LOOKUP_TIMEOUT).await?;
        Ok(task_from_detail_payload(&payload))
    }

    async fn active_session(&self) -> Result<Option<ActiveSession>, ApiError> {
        let payload = self.get_json("/time/active", LOOKUP_TIMEOUT).await?;
        Ok(active_session_from_payload(&payload))
    }

    async fn pomodoro_status(&self) -> Result<Option<PomodoroStatus>, ApiError> {
        let payload = self.get_json("/pomodoro/status", LOOKUP_TIMEOUT).await?;
        Ok(pomodoro_from_payload(&payload))
    }
}

fn preview(body: &str) -> String {
    body.chars().take(ERROR_BODY_PREVIEW).collect()
}

/// The `error` or `message` field of a JSON error body, else the body itself.
fn error_message(body: &str) -> String {
    let parsed = serde_json::from_str::<Value>(body).ok();
    let field = parsed.as_ref().and_then(|payload| {
        ["error", "message"]
            .iter()
            .find_map(|key| payload.get(*key).and_then(Value::as_str))
            .filter(|message| !message.is_empty())
            .map(str::to_string)
    });
    match field {
        Some(message) => message,
        None if body.trim().is_empty() => "empty response".to_string(),
        None => preview(body),
    }
}

pub fn tasks_from_payload(payload: &Value) -> Vec<Task> {
    payload
        .get("data")
        .and_then(|data| data.get("tasks"))
        .and_then(Value::as_array)
        .map(|tasks| tasks.iter().filter_map(Task::from_api).collect())
        .unwrap_or_default()
}

/// `{data: {...}}`, or a bare task object carrying both `title` and `path`.
pub fn task_from_detail_payload(payload: &Value) -> Option<Task> {
    match payload.get("data") {
        Some(data) if data.is_object() => Task::from_api(data),
        _ if payload.get("title").is_some() && payload.get("path").is_some() => {
            Task::from_api(payload)
        }
        _ => None,
    }
}

/// First entry of `data.activeSessions`, if any.
pub fn active_session_from_payload(payload: &Value) -> Option<ActiveSession> {
    let first = payload
        .get("data")?
        .get("activeSessions")?
        .as_array()?
        .first()?;

    let empty = Value::Null;
    let task = first.get("task").filter(|t| t.is_object()).unwrap_or(&empty);
    let elapsed_minutes = first
        .get("elapsedMinutes")
        .filter(|v| !v.is_null())
        .or_else(|| first.get("session").and_then(|s| s.get("elapsedMinutes")))
        .and_then(whole_number);

    Some(ActiveSession {
        id: text(task.get("id")),
        title: text(task.get("title")),
        elapsed_minutes,
        tags: text_list(task.get("tags")),
        projects: text_list(task.get("projects")),
        priority: text(task.get("priority")),
        status: text(task.get("status")),
    })
}

pub fn pomodoro_from_payload(payload: &Value) -> Option<PomodoroStatus> {
    let data = payload.get("data").filter(|d| d.is_object())?;

    let session = data
        .get("currentSession")
        .filter(|s| s.as_object().is_some_and(|o| !o.is_empty()));
    let has_session = session.is_some();
    let is_running = data.get("isRunning").and_then(Value::as_bool).unwrap_or(false);

    let session_text = |key: &str| {
        session
            .and_then(|s| s.get(key))
            .and_then(Value::as_str)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    Some(PomodoroStatus {
        has_session,
        is_running,
        is_paused: has_session && !is_running,
        time_remaining: data.get("timeRemaining").and_then(whole_number).unwrap_or(0),
        session_type: session_text("type").unwrap_or_else(|| "work".to_string()),
        task_id: session_text("taskId"),
        task_title: session_text("taskTitle"),
        total_pomodoros: data.get("totalPomodoros").and_then(whole_number).unwrap_or(0),
        current_streak: data.get("currentStreak").and_then(whole_number).unwrap_or(0),
    })
}

fn whole_number(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
}

fn text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn text_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
