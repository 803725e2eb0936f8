use jiff::civil::Date;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const COMPLETED_STATUSES: [&str; 3] = ["done", "completed", "complete"];
const ARCHIVED_STATUSES: [&str; 1] = ["archived"];

/// The one task shape used past the API boundary. Cached snapshots store this
/// record as-is, so cached and freshly fetched tasks are indistinguishable.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Task {
    /// Vault-relative note path; TaskNotes uses it as the task identifier
    pub path: String,
    pub title: String,
    pub status: String,
    pub priority: String,
    /// Due date as sent by TaskNotes (a date, sometimes with a time part)
    pub due: String,
    pub scheduled: String,
    pub tags: Vec<String>,
    pub projects: Vec<String>,
    pub contexts: Vec<String>,
    pub date_created: String,
    pub date_modified: String,
    pub details: String,
    pub completed: bool,
    pub archived: bool,
}

impl Task {
    /// Normalize a raw API payload. Anything that is not a JSON object is
    /// rejected; every other malformed field degrades to its empty value.
    pub fn from_api(raw: &Value) -> Option<Self> {
        let obj = raw.as_object()?;

        let status = string_field(raw, "status");
        let lowered_status = status.to_lowercase();

        let completed = match obj.get("completed") {
            Some(v) => truthy(v),
            None => COMPLETED_STATUSES.contains(&lowered_status.as_str()),
        };
        let archived = match obj.get("archived") {
            Some(v) => truthy(v),
            None => ARCHIVED_STATUSES.contains(&lowered_status.as_str()),
        };

        Some(Task {
            path: string_field(raw, "path"),
            title: string_field(raw, "title"),
            priority: string_field(raw, "priority"),
            due: string_field(raw, "due"),
            scheduled: string_field(raw, "scheduled"),
            tags: string_list(raw, "tags"),
            projects: string_list(raw, "projects"),
            contexts: string_list(raw, "contexts"),
            date_created: string_field(raw, "date_created"),
            date_modified: string_field(raw, "date_modified"),
            details: string_field(raw, "details"),
            status,
            completed,
            archived,
        })
    }

    pub fn due_date(&self) -> Option<Date> {
        leading_date(&self.due)
    }

    pub fn scheduled_date(&self) -> Option<Date> {
        leading_date(&self.scheduled)
    }

    /// Most recent of modified/created, used as a ranking tie-breaker.
    pub fn last_touched(&self) -> &str {
        if self.date_modified.is_empty() {
            &self.date_created
        } else {
            &self.date_modified
        }
    }

    /// Display title: the API title, or the note file name without `.md`.
    pub fn display_title(&self) -> String {
        let title = self.title.trim();
        if !title.is_empty() {
            return title.to_string();
        }
        title_from_path(&self.path)
    }
}

/// "Tasks/Buy milk.md" -> "Buy milk"
pub fn title_from_path(path: &str) -> String {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    let stem = match file_name.len().checked_sub(3) {
        Some(cut) if file_name.is_char_boundary(cut) && file_name[cut..].eq_ignore_ascii_case(".md") => {
            &file_name[..cut]
        }
        _ => file_name,
    };
    let stem = stem.trim();
    if stem.is_empty() {
        "Untitled Task".to_string()
    } else {
        stem.to_string()
    }
}

fn leading_date(value: &str) -> Option<Date> {
    value.trim().get(..10)?.parse().ok()
}

fn string_field(raw: &Value, key: &str) -> String {
    match raw.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn string_list(raw: &Value, key: &str) -> Vec<String> {
    match raw.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::Null => None,
                Value::String(s) => Some(s.clone()),
                other => Some(other.to_string()),
            })
            .collect(),
        _ => vec![],
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::civil::date;
    use serde_json::json;

    #[test]
    fn test_from_api_normalizes_missing_and_wrong_types() {
        let task = Task::from_api(&json!({
            "path": "Tasks/Report.md",
            "title": "Report",
            "status": "open",
            "due": null,
            "tags": "not-a-list",
            "projects": ["[[Budget]]", null],
        }))
        .unwrap();

        assert_eq!(task.path, "Tasks/Report.md");
        assert_eq!(task.due, "");
        assert!(task.tags.is_empty());
        assert_eq!(task.projects, vec!["[[Budget]]".to_string()]);
        assert!(!task.completed);
        assert!(!task.archived);
    }

    #[test]
    fn test_from_api_infers_flags_from_status() {
        let done = Task::from_api(&json!({"path": "a.md", "status": "Done"})).unwrap();
        assert!(done.completed);

        let archived = Task::from_api(&json!({"path": "b.md", "status": "archived"})).unwrap();
        assert!(archived.archived);

        let explicit = Task::from_api(&json!({"path": "c.md", "status": "done", "completed": false}))
            .unwrap();
        assert!(!explicit.completed);
    }

    #[test]
    fn test_from_api_rejects_non_objects() {
        assert!(Task::from_api(&json!("Tasks/x.md")).is_none());
        assert!(Task::from_api(&json!(null)).is_none());
    }

    #[test]
    fn test_due_date_ignores_time_part() {
        let task = Task {
            due: "2026-03-01T09:00".to_string(),
            scheduled: "soon".to_string(),
            ..Task::default()
        };
        assert_eq!(task.due_date(), Some(date(2026, 3, 1)));
        assert_eq!(task.scheduled_date(), None);
    }

    #[test]
    fn test_display_title_falls_back_to_file_name() {
        let named = Task {
            path: "Tasks/Buy milk.md".to_string(),
            title: "  Buy oat milk ".to_string(),
            ..Task::default()
        };
        let unnamed = Task {
            title: "   ".to_string(),
            ..named.clone()
        };

        assert_eq!(named.display_title(), "Buy oat milk");
        assert_eq!(unnamed.display_title(), "Buy milk");
    }

    #[test]
    fn test_title_from_path() {
        assert_eq!(title_from_path("Tasks/Buy milk.md"), "Buy milk");
        assert_eq!(title_from_path("Plain"), "Plain");
        assert_eq!(title_from_path("Tasks/.md"), "Untitled Task");
    }
}
