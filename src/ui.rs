use std::collections::BTreeMap;

use colored::*;
use jiff::civil::Date;
use serde::Serialize;

use crate::{
    models::{
        action::TaskAction,
        create::{CreateAction, ParsedCreate},
        snapshot::{ActiveSession, PomodoroStatus},
        task::{Task, title_from_path},
    },
    quickadd::{build_preview, parse_create_input},
    services::{
        search::{QuickFilter, SearchResults, UNTITLED},
        tracking::TaskOverview,
    },
};

const MIN_RERUN: f64 = 0.1;
const MAX_RERUN: f64 = 5.0;
const NOT_READY_RERUN: f64 = 1.0;
const SUBTITLE_TAGS: usize = 4;
const SUBTITLE_PROJECTS: usize = 3;
const TRACKING_MARK: &str = "⏱ ";

/// One row of a Script Filter response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Item {
    pub title: String,
    pub subtitle: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arg: Option<String>,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autocomplete: Option<String>,
    /// Text Alfred filters on instead of the title
    #[serde(rename = "match", skip_serializing_if = "Option::is_none")]
    pub match_text: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub mods: BTreeMap<&'static str, Modifier>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Modifier {
    pub subtitle: String,
    pub arg: String,
    pub valid: bool,
}

impl Item {
    /// A row that does nothing when actioned.
    pub fn info(title: impl Into<String>, subtitle: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            subtitle: subtitle.into(),
            arg: None,
            valid: false,
            autocomplete: None,
            match_text: None,
            mods: BTreeMap::new(),
        }
    }

    pub fn action(title: impl Into<String>, subtitle: impl Into<String>, arg: String) -> Self {
        Self {
            arg: Some(arg),
            valid: true,
            ..Self::info(title, subtitle)
        }
    }

    pub fn with_mod(mut self, key: &'static str, subtitle: impl Into<String>, arg: String, valid: bool) -> Self {
        self.mods.insert(
            key,
            Modifier {
                subtitle: subtitle.into(),
                arg,
                valid,
            },
        );
        self
    }
}

/// A complete Script Filter response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScriptFilter {
    pub items: Vec<Item>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerun: Option<f64>,
}

impl ScriptFilter {
    pub fn new(items: Vec<Item>) -> Self {
        Self { items, rerun: None }
    }

    /// Ask Alfred to run the script again after `seconds`, clamped to the
    /// range Alfred accepts.
    pub fn with_rerun(mut self, seconds: Option<f64>) -> Self {
        self.rerun = seconds.map(|s| s.clamp(MIN_RERUN, MAX_RERUN));
        self
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"items":[]}"#.to_string())
    }
}

/// Human-friendly form of a `YYYY-MM-DD` value relative to `today`. Anything
/// else is returned as-is.
pub fn relative_date(value: &str, today: Date) -> String {
    let value = value.trim();
    let Some(date) = (value.len() == 10)
        .then(|| value.parse::<Date>().ok())
        .flatten()
    else {
        return value.to_string();
    };
    let Ok(span) = today.until(date) else {
        return value.to_string();
    };

    match span.get_days() {
        0 => "Today".to_string(),
        1 => "Tomorrow".to_string(),
        -1 => "Yesterday".to_string(),
        days if days < -1 => format!("{}d ago", -days),
        2..=6 => date.strftime("%a").to_string(),
        7 => "Next week".to_string(),
        _ => date.strftime("%b %d").to_string(),
    }
}

fn truncated(values: &[String], limit: usize, clean: impl Fn(&str) -> &str) -> String {
    let shown: Vec<&str> = values.iter().take(limit).map(|v| clean(v)).collect();
    let ellipsis = if values.len() > limit { "…" } else { "" };
    format!("{}{}", shown.join(", "), ellipsis)
}

fn capitalize(field: &str) -> String {
    let mut chars = field.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn scalar_field<'t>(task: &'t Task, field: &str) -> &'t str {
    match field {
        "title" => &task.title,
        "path" => &task.path,
        "status" => &task.status,
        "priority" => &task.priority,
        "due" => &task.due,
        "scheduled" => &task.scheduled,
        "date_created" => &task.date_created,
        "date_modified" => &task.date_modified,
        "details" => &task.details,
        _ => "",
    }
}

/// Subtitle built from the configured field list, in order.
pub fn task_subtitle(task: &Task, fields: &[String], today: Date) -> String {
    let mut bits = Vec::new();

    for field in fields {
        match field.as_str() {
            "tags" => {
                if !task.tags.is_empty() {
                    bits.push(format!("Tags: {}", truncated(&task.tags, SUBTITLE_TAGS, |t| t)));
                }
            }
            "projects" => {
                if !task.projects.is_empty() {
                    let projects = truncated(&task.projects, SUBTITLE_PROJECTS, |p| {
                        p.trim_matches(|c| c == '[' || c == ']')
                    });
                    bits.push(format!("Projects: {}", projects));
                }
            }
            "contexts" => {
                if !task.contexts.is_empty() {
                    bits.push(format!("Contexts: {}", task.contexts.join(", ")));
                }
            }
            name => {
                let value = scalar_field(task, name).trim();
                if value.is_empty() {
                    continue;
                }
                let value = match name {
                    "due" | "scheduled" => relative_date(value, today),
                    _ => value.to_string(),
                };
                bits.push(format!("{}: {}", capitalize(name), value));
            }
        }
    }

    bits.join(" • ")
}

/// Search rows. Enter opens the action menu for the task path; modifiers
/// run the common actions directly.
pub fn task_items(
    rows: &[Task],
    active: Option<&ActiveSession>,
    fields: &[String],
    today: Date,
) -> Vec<Item> {
    let active_id = active.map(|s| s.id.as_str()).unwrap_or_default();

    rows.iter()
        .map(|task| {
            let path = task.path.trim().to_string();
            let title = match task.title.trim() {
                "" => UNTITLED.to_string(),
                title => title.to_string(),
            };
            let mut subtitle = task_subtitle(task, fields, today);

            let is_tracked = !active_id.is_empty() && path == active_id;
            let shown_title = if is_tracked {
                let elapsed = active
                    .and_then(|s| s.elapsed_minutes)
                    .map(|m| format!("{}m", m))
                    .unwrap_or_else(|| "active".to_string());
                subtitle = if subtitle.is_empty() {
                    format!("Tracking: {}", elapsed)
                } else {
                    format!("Tracking: {} • {}", elapsed, subtitle)
                };
                format!("{}{}", TRACKING_MARK, title)
            } else {
                title.clone()
            };

            let tracking_label = if is_tracked {
                "⌃↩ Stop tracking"
            } else {
                "⌃↩ Start tracking"
            };
            let with_path = |make: fn(String) -> TaskAction| make(path.clone()).to_json();

            Item::action(shown_title, subtitle, path.clone())
                .with_mod(
                    "cmd",
                    "⌘↩ Open in Obsidian",
                    with_path(|path| TaskAction::Open { path }),
                    true,
                )
                .with_mod(
                    "shift",
                    "⇧↩ Toggle complete",
                    with_path(|path| TaskAction::ToggleComplete { path }),
                    true,
                )
                .with_mod(
                    "alt",
                    "⌥↩ Schedule for today",
                    with_path(|path| TaskAction::ScheduleToday { path }),
                    true,
                )
                .with_mod(
                    "ctrl",
                    tracking_label,
                    with_path(|path| TaskAction::ToggleTracking { path }),
                    true,
                )
                .with_mod(
                    "cmd+alt",
                    "⌥⌘↩ Delete task",
                    TaskAction::Delete {
                        path: path.clone(),
                        title,
                    }
                    .to_json(),
                    true,
                )
        })
        .collect()
}

/// The "Create" row for a parsed quick-add string.
pub fn create_item(parsed: &ParsedCreate) -> Item {
    let has_title = parsed.has_title();
    let has_raw = !parsed.raw.trim().is_empty();
    let preview = build_preview(parsed);

    let (title, subtitle) = if has_title {
        (
            format!("Create: \"{}\"", parsed.title),
            format!("Enter to create + notify • {}", preview),
        )
    } else {
        (
            "Create task (add a title)".to_string(),
            format!("Type a title, then press Enter • {}", preview),
        )
    };

    let mut item = Item::info(title, subtitle);
    if has_title {
        item.arg = Some(CreateAction::from_parsed(parsed).to_json());
        item.valid = true;
    }

    let open_subtitle = if has_title {
        format!("⌘↩ Create + open • {}", preview)
    } else {
        "⌘↩ Create + open".to_string()
    };

    item.with_mod(
        "cmd",
        open_subtitle,
        CreateAction::from_parsed(parsed).and_open().to_json(),
        has_title,
    )
    .with_mod(
        "shift",
        "⇧↩ Create verbatim (no NLP)",
        CreateAction::verbatim(&parsed.raw).to_json(),
        has_raw,
    )
    .with_mod(
        "cmd+shift",
        "⇧⌘↩ Create verbatim + open",
        CreateAction::verbatim(&parsed.raw).and_open().to_json(),
        has_raw,
    )
}

pub fn create_prompt_item() -> Item {
    Item::info(
        "Create task",
        "Type a title (use \"//\" for details). ↩=create • ⌘↩=open • ⇧↩=verbatim • Delete \">\" to search",
    )
}

pub fn create_only_output(query: &str, today: Date) -> ScriptFilter {
    let query = query.trim();
    if query.is_empty() {
        return ScriptFilter::new(vec![create_prompt_item()]);
    }
    ScriptFilter::new(vec![create_item(&parse_create_input(query, today))])
}

/// Tab-completable rows for a partially typed `!filter`.
pub fn filter_suggestion_items(filters: &[QuickFilter]) -> Vec<Item> {
    filters
        .iter()
        .map(|filter| Item {
            autocomplete: Some(format!("{} ", filter.prefix())),
            match_text: Some(format!(
                "{} {} {}",
                filter.prefix(),
                filter.display_name(),
                filter.description()
            )),
            ..Item::info(filter.display_name(), filter.description())
        })
        .collect()
}

pub fn not_ready_output() -> ScriptFilter {
    ScriptFilter::new(vec![Item::info(
        "TaskNotes API isn't ready",
        "Open Obsidian and keep Alfred open. Results refresh automatically.",
    )])
    .with_rerun(Some(NOT_READY_RERUN))
}

/// Task rows first and the create row last; when nothing matched the create
/// row (or an empty-state row) stands alone.
pub fn search_output(results: &SearchResults, fields: &[String], today: Date) -> ScriptFilter {
    let rows = task_items(&results.rows, results.active.as_ref(), fields, today);
    let create = results.create.as_ref().map(create_item);

    let items = match (rows.is_empty(), create) {
        (false, create) => rows.into_iter().chain(create).collect(),
        (true, Some(create)) => vec![create],
        (true, None) => vec![empty_state(results)],
    };

    ScriptFilter::new(items).with_rerun(results.rerun)
}

fn empty_state(results: &SearchResults) -> Item {
    if results.query.is_empty() {
        return Item::info(
            "No tasks yet",
            "Type to search or create a new task • ⌥J for Quick Create",
        );
    }
    if let Some(filter) = results.filter
        && results.search_query.is_empty()
    {
        return Item::info(
            format!("No {} tasks", filter.empty_label()),
            "Try a different filter or create a new task",
        );
    }
    let shown = if results.search_query.is_empty() {
        &results.query
    } else {
        &results.search_query
    };
    Item::info(
        format!("No tasks matching \"{}\"", shown),
        "Try a different search or create a new task",
    )
}

fn go_back_item() -> Item {
    Item::action("Go Back", "Return to task list", TaskAction::GoBack.to_json())
}

fn pomodoro_item(status: &PomodoroStatus) -> Item {
    let state = if status.is_running { "running" } else { "paused" };
    let remaining = status.time_remaining.max(0);
    let title = format!(
        "Pomodoro {}: {:02}:{:02} left",
        state,
        remaining / 60,
        remaining % 60
    );

    let mut details = vec![capitalize(&status.session_type)];
    if let Some(task_title) = status.task_title.as_deref().filter(|t| !t.is_empty()) {
        details.push(task_title.to_string());
    }
    details.push(format!("{} today", status.total_pomodoros));
    Item::info(title, details.join(" • "))
}

/// The per-task action menu.
pub fn actions_output(overview: Option<&TaskOverview>, requested_path: &str) -> ScriptFilter {
    if requested_path.trim().is_empty() {
        return ScriptFilter::new(vec![
            Item::info("No task selected", "Go back and select a task"),
            go_back_item(),
        ]);
    }
    let Some(overview) = overview else {
        return ScriptFilter::new(vec![
            Item::info(
                "Task not found",
                format!(
                    "Could not find \"{}\" - it may have been deleted",
                    title_from_path(requested_path)
                ),
            ),
            go_back_item(),
        ]);
    };

    let path = overview.path.clone();
    let task = &overview.task;
    let mut items = vec![Item::action(
        overview.title.clone(),
        "Open in Obsidian",
        TaskAction::Open { path: path.clone() }.to_json(),
    )];

    if let Some(status) = overview.pomodoro.as_ref().filter(|s| s.has_session) {
        items.push(pomodoro_item(status));
    }

    let tracking = TaskAction::ToggleTracking { path: path.clone() }.to_json();
    items.push(if overview.is_tracking {
        Item::action("Stop Time Tracking", "Stop the current tracking session", tracking)
    } else {
        Item::action("Start Time Tracking", "Begin tracking time on this task", tracking)
    });

    let schedule = TaskAction::ToggleSchedule { path: path.clone() }.to_json();
    items.push(if task.scheduled.trim().is_empty() {
        Item::action("Schedule for Today", "Set scheduled date to today", schedule)
    } else {
        Item::action("Clear Schedule", "Remove scheduled date", schedule)
    });

    let complete = TaskAction::ToggleComplete { path: path.clone() }.to_json();
    items.push(if task.completed {
        Item::action("Reopen Task", "Mark as incomplete", complete)
    } else {
        Item::action("Complete Task", "Mark as done", complete)
    });

    let archive = TaskAction::ToggleArchive { path: path.clone() }.to_json();
    items.push(if task.archived {
        Item::action("Unarchive Task", "Restore from archive", archive)
    } else {
        Item::action("Archive Task", "Move to archive", archive)
    });

    items.push(Item::action(
        "Delete Task",
        "Move to trash",
        TaskAction::Delete {
            path,
            title: overview.title.clone(),
        }
        .to_json(),
    ));
    items.push(go_back_item());

    ScriptFilter::new(items)
}

pub fn error_output(message: &str) -> ScriptFilter {
    ScriptFilter::new(vec![Item::info("TaskNotes workflow error", message)])
}

/// Print a parse result for a terminal.
pub fn print_parse(parsed: &ParsedCreate) {
    let title = if parsed.has_title() {
        parsed.title.bold()
    } else {
        "(no title)".dimmed()
    };
    println!("{} {}", "Title:".cyan(), title);

    if let Some(scheduled) = parsed.scheduled {
        println!("{} {}", "Scheduled:".cyan(), scheduled.strftime("%a %b %d %Y"));
    }
    if let Some(due) = parsed.due {
        println!("{} {}", "Due:".cyan(), due.strftime("%a %b %d %Y").to_string().red());
    }
    if let Some(priority) = parsed.priority {
        println!("{} {}", "Priority:".cyan(), priority);
    }
    if !parsed.tags.is_empty() {
        let tags: Vec<String> = parsed.tags.iter().map(|t| format!("#{}", t)).collect();
        println!("{} {}", "Tags:".cyan(), tags.join(" ").blue());
    }
    if !parsed.projects.is_empty() {
        println!("{} {}", "Projects:".cyan(), parsed.projects.join(", ").blue());
    }
    if let Some(details) = parsed.details.as_deref() {
        println!("{}", "Details:".cyan());
        for line in details.lines() {
            println!("    {}", line.dimmed());
        }
    }
    for warning in &parsed.warnings {
        println!("{} {}", "Warning:".yellow(), warning);
    }

    println!("\n{}", build_preview(parsed).dimmed());
}
