use std::fmt;

use jiff::civil::Date;
use serde::{Deserialize, Serialize};

/// Result of parsing one quick-add string. Built once per input, never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedCreate {
    /// The input exactly as typed
    pub raw: String,
    /// Remaining words after metadata extraction; empty means "no title yet"
    pub title: String,
    /// Free text after `//`, with newline markers turned into line breaks
    pub details: Option<String>,
    pub scheduled: Option<Date>,
    pub due: Option<Date>,
    pub priority: Option<Priority>,
    /// Unique, in first-seen order
    pub tags: Vec<String>,
    /// Unique, in first-seen order; names may contain spaces
    pub projects: Vec<String>,
    /// Recognized but ignored input (currently `@context` tokens)
    pub warnings: Vec<String>,
}

impl ParsedCreate {
    pub fn has_title(&self) -> bool {
        !self.title.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    /// Quick-add markers: `p1`/`!!!`, `p2`/`!!`, `p3`/`!`. Expects a cleaned,
    /// lower-cased token.
    pub fn from_marker(token: &str) -> Option<Self> {
        match token {
            "p1" | "!!!" => Some(Priority::High),
            "p2" | "!!" => Some(Priority::Medium),
            "p3" | "!" => Some(Priority::Low),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "High",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CreateMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled: Option<Date>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due: Option<Date>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub projects: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Payload handed to the action executor when the user confirms a create item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename = "create")]
pub struct CreateAction {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<CreateMeta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub verbatim: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub open: bool,
}

impl CreateAction {
    pub fn from_parsed(parsed: &ParsedCreate) -> Self {
        Self {
            text: parsed.title.clone(),
            meta: Some(CreateMeta {
                scheduled: parsed.scheduled,
                due: parsed.due,
                priority: parsed.priority,
                tags: parsed.tags.clone(),
                projects: parsed.projects.clone(),
                details: parsed.details.clone().filter(|d| !d.is_empty()),
            }),
            raw: Some(parsed.raw.clone()),
            verbatim: false,
            open: false,
        }
    }

    /// Create the task from the raw text, skipping metadata extraction.
    pub fn verbatim(raw: &str) -> Self {
        Self {
            text: raw.trim().to_string(),
            meta: None,
            raw: None,
            verbatim: true,
            open: false,
        }
    }

    pub fn and_open(mut self) -> Self {
        self.open = true;
        self
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::civil::date;

    #[test]
    fn test_priority_markers() {
        assert_eq!(Priority::from_marker("p1"), Some(Priority::High));
        assert_eq!(Priority::from_marker("!!"), Some(Priority::Medium));
        assert_eq!(Priority::from_marker("!"), Some(Priority::Low));
        assert_eq!(Priority::from_marker("p4"), None);
        assert_eq!(Priority::from_marker("!!!!"), None);
    }

    #[test]
    fn test_create_action_payload_drops_empty_meta() {
        let parsed = ParsedCreate {
            raw: "Pay rent due 1/5".to_string(),
            title: "Pay rent".to_string(),
            due: Some(date(2026, 1, 5)),
            ..ParsedCreate::default()
        };

        let value: serde_json::Value =
            serde_json::from_str(&CreateAction::from_parsed(&parsed).to_json()).unwrap();

        assert_eq!(
            value,
            serde_json::json!({
                "action": "create",
                "text": "Pay rent",
                "meta": { "due": "2026-01-05" },
                "raw": "Pay rent due 1/5",
            })
        );
    }

    #[test]
    fn test_verbatim_action_with_open() {
        let value: serde_json::Value =
            serde_json::from_str(&CreateAction::verbatim(" Buy milk tomorrow ").and_open().to_json())
                .unwrap();

        assert_eq!(
            value,
            serde_json::json!({
                "action": "create",
                "text": "Buy milk tomorrow",
                "verbatim": true,
                "open": true,
            })
        );
    }
}
