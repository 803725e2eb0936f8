use serde::Serialize;

/// Action payloads carried in Alfred item args for existing tasks. The
/// workflow's action script dispatches on `action`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TaskAction {
    Open { path: String },
    ToggleComplete { path: String },
    ScheduleToday { path: String },
    ToggleSchedule { path: String },
    ToggleTracking { path: String },
    ToggleArchive { path: String },
    Delete { path: String, title: String },
    GoBack,
}

impl TaskAction {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
