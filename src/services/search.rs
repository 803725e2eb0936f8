use std::cmp::Reverse;

use jiff::{Timestamp, civil::Date};

use crate::{
    api::{ListTasksQuery, TaskSource},
    calendar::add_days,
    config::Settings,
    models::{create::ParsedCreate, snapshot::ActiveSession, task::Task},
    quickadd::parse_create_input,
    services::{snapshots::Snapshots, task_cache::TaskCache},
    storage::{Storage, StorageError},
};

const NO_DUE_SORT_KEY: &str = "9999-99-99";
pub const UNTITLED: &str = "(Untitled task)";

/// `!`-prefixed shortcuts that narrow the task list before text search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuickFilter {
    Today,
    Tomorrow,
    Overdue,
    Complete,
    Archived,
    P1,
    P2,
    P3,
}

impl QuickFilter {
    pub const ALL: [QuickFilter; 8] = [
        QuickFilter::Today,
        QuickFilter::Tomorrow,
        QuickFilter::Overdue,
        QuickFilter::Complete,
        QuickFilter::Archived,
        QuickFilter::P1,
        QuickFilter::P2,
        QuickFilter::P3,
    ];

    pub fn prefix(self) -> &'static str {
        match self {
            QuickFilter::Today => "!today",
            QuickFilter::Tomorrow => "!tomorrow",
            QuickFilter::Overdue => "!overdue",
            QuickFilter::Complete => "!complete",
            QuickFilter::Archived => "!archived",
            QuickFilter::P1 => "!p1",
            QuickFilter::P2 => "!p2",
            QuickFilter::P3 => "!p3",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            QuickFilter::Today => "Today",
            QuickFilter::Tomorrow => "Tomorrow",
            QuickFilter::Overdue => "Overdue",
            QuickFilter::Complete => "Complete",
            QuickFilter::Archived => "Archived",
            QuickFilter::P1 => "P1",
            QuickFilter::P2 => "P2",
            QuickFilter::P3 => "P3",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            QuickFilter::Today => "Tasks due or scheduled for today",
            QuickFilter::Tomorrow => "Tasks due or scheduled for tomorrow",
            QuickFilter::Overdue => "Tasks past their due or scheduled date",
            QuickFilter::Complete => "Completed tasks",
            QuickFilter::Archived => "Archived tasks",
            QuickFilter::P1 => "High priority tasks",
            QuickFilter::P2 => "Medium priority tasks",
            QuickFilter::P3 => "Low priority tasks",
        }
    }

    /// Used in "No {label} tasks".
    pub fn empty_label(self) -> &'static str {
        match self {
            QuickFilter::Today => "today",
            QuickFilter::Tomorrow => "tomorrow",
            QuickFilter::Overdue => "overdue",
            QuickFilter::Complete => "completed",
            QuickFilter::Archived => "archived",
            QuickFilter::P1 => "high priority",
            QuickFilter::P2 => "medium priority",
            QuickFilter::P3 => "low priority",
        }
    }

    pub fn includes_completed(self) -> bool {
        self == QuickFilter::Complete
    }

    pub fn includes_archived(self) -> bool {
        self == QuickFilter::Archived
    }

    pub fn matches(self, task: &Task, today: Date) -> bool {
        let due = task.due_date();
        let scheduled = task.scheduled_date();
        let on = |day: Option<Date>| day.is_some() && (due == day || scheduled == day);
        let priority = task.priority.trim().to_lowercase();

        match self {
            QuickFilter::Today => on(Some(today)),
            QuickFilter::Tomorrow => on(add_days(today, 1)),
            QuickFilter::Overdue => {
                due.is_some_and(|d| d < today) || scheduled.is_some_and(|d| d < today)
            }
            QuickFilter::Complete => task.completed,
            QuickFilter::Archived => task.archived,
            QuickFilter::P1 => matches!(priority.as_str(), "high" | "1" | "p1" | "highest"),
            QuickFilter::P2 => matches!(priority.as_str(), "medium" | "2" | "p2" | "normal"),
            QuickFilter::P3 => matches!(priority.as_str(), "low" | "3" | "p3" | "lowest"),
        }
    }
}

/// Split `!today buy` into the filter and the remaining search text. A
/// filter must be the whole query or be followed by a space.
pub fn parse_quick_filter(query: &str) -> (Option<QuickFilter>, String) {
    let trimmed = query.trim();
    let lowered = trimmed.to_lowercase();

    for filter in QuickFilter::ALL {
        let prefix = filter.prefix();
        if lowered == prefix {
            return (Some(filter), String::new());
        }
        if lowered.starts_with(prefix) && lowered[prefix.len()..].starts_with(' ') {
            let rest = trimmed.get(prefix.len()..).unwrap_or_default();
            return (Some(filter), rest.trim().to_string());
        }
    }

    (None, trimmed.to_string())
}

/// `!`, `!to`, `!ov`: a bang query that is not yet a complete filter.
pub fn is_partial_filter(query: &str) -> bool {
    let lowered = query.trim().to_lowercase();
    lowered.starts_with('!') && parse_quick_filter(&lowered).0.is_none()
}

pub fn matching_filters(partial: &str) -> Vec<QuickFilter> {
    let partial = partial.trim().to_lowercase();
    QuickFilter::ALL
        .into_iter()
        .filter(|filter| filter.prefix().starts_with(&partial))
        .collect()
}

/// Lower-case with whitespace runs collapsed.
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn haystack(task: &Task) -> String {
    let scalars = [
        &task.title,
        &task.path,
        &task.priority,
        &task.status,
        &task.due,
        &task.scheduled,
    ];
    let parts: Vec<&str> = scalars
        .into_iter()
        .chain(task.tags.iter())
        .chain(task.projects.iter())
        .map(String::as_str)
        .filter(|part| !part.is_empty())
        .collect();
    normalize(&parts.join(" "))
}

fn is_visible(task: &Task, filter: Option<QuickFilter>) -> bool {
    match filter {
        Some(QuickFilter::Archived) => !task.completed,
        Some(QuickFilter::Complete) => !task.archived,
        _ => !task.completed && !task.archived,
    }
}

struct Ranked {
    task: Task,
    relevance: (bool, bool, bool, usize),
    touched: String,
    due_key: String,
    title_key: String,
}

impl Ranked {
    fn new(task: Task, query: &str, tokens: &[String], haystack: &str) -> Self {
        let title_key = normalize(task.title.trim());
        let has_query = !query.is_empty();
        let relevance = (
            has_query && title_key == query,
            has_query && title_key.starts_with(query),
            has_query && title_key.contains(query),
            tokens.iter().filter(|tok| haystack.contains(tok.as_str())).count(),
        );
        let due = task.due.trim();
        let due_key = if due.is_empty() { NO_DUE_SORT_KEY } else { due }.to_string();

        Self {
            touched: task.last_touched().to_string(),
            task,
            relevance,
            due_key,
            title_key,
        }
    }
}

/// Drop hidden tasks, keep those containing every query token, best first.
pub fn filter_and_rank(tasks: Vec<Task>, query: &str, filter: Option<QuickFilter>) -> Vec<Task> {
    let visible = tasks.into_iter().filter(|task| is_visible(task, filter));

    let query = normalize(query);
    if query.is_empty() {
        return visible.collect();
    }
    let tokens: Vec<String> = query.split(' ').map(str::to_string).collect();

    let mut ranked: Vec<Ranked> = visible
        .filter_map(|task| {
            let haystack = haystack(&task);
            tokens
                .iter()
                .all(|tok| haystack.contains(tok.as_str()))
                .then(|| Ranked::new(task, &query, &tokens, &haystack))
        })
        .collect();

    ranked.sort_by(|a, b| {
        (Reverse(a.relevance), Reverse(&a.touched), &a.due_key, &a.title_key).cmp(&(
            Reverse(b.relevance),
            Reverse(&b.touched),
            &b.due_key,
            &b.title_key,
        ))
    });

    ranked.into_iter().map(|r| r.task).collect()
}

/// Move the task with `path` to the front. False when it is not in `rows`.
pub fn pin_to_top(rows: &mut Vec<Task>, path: &str) -> bool {
    match rows.iter().position(|task| task.path.trim() == path) {
        Some(index) => {
            let task = rows.remove(index);
            rows.insert(0, task);
            true
        }
        None => false,
    }
}

/// Stand-in row built from the session when the task itself can't be fetched.
fn session_row(active: &ActiveSession) -> Task {
    let title = if active.title.is_empty() {
        UNTITLED.to_string()
    } else {
        active.title.clone()
    };
    Task {
        path: active.id.clone(),
        title,
        tags: active.tags.clone(),
        projects: active.projects.clone(),
        priority: active.priority.clone(),
        status: active.status.clone(),
        ..Task::default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResults {
    pub query: String,
    /// Text left after the quick filter prefix
    pub search_query: String,
    pub filter: Option<QuickFilter>,
    pub rows: Vec<Task>,
    /// Parsed create item, offered unless a visible task already has this title
    pub create: Option<ParsedCreate>,
    pub active: Option<ActiveSession>,
    pub rerun: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    FilterSuggestions(Vec<QuickFilter>),
    /// Nothing cached and TaskNotes unreachable
    NotReady,
    Results(SearchResults),
}

pub async fn search<S: Storage>(
    source: &impl TaskSource,
    storage: &S,
    settings: &Settings,
    query: &str,
    now: Timestamp,
    today: Date,
) -> Result<SearchOutcome, StorageError> {
    let query = query.trim();

    if is_partial_filter(query) {
        let suggestions = matching_filters(query);
        if !suggestions.is_empty() {
            return Ok(SearchOutcome::FilterSuggestions(suggestions));
        }
    }

    let (filter, search_query) = parse_quick_filter(query);
    let list_query = ListTasksQuery::recent(
        settings.fetch_limit,
        filter.is_some_and(QuickFilter::includes_completed),
        filter.is_some_and(QuickFilter::includes_archived),
    );

    let cached = TaskCache::new(storage, settings.task_cache)
        .load(source, &list_query, now)
        .await?;
    if cached.is_not_ready() {
        return Ok(SearchOutcome::NotReady);
    }

    let mut tasks = cached.tasks;
    if let Some(filter) = filter {
        tasks.retain(|task| filter.matches(task, today));
    }

    let wanted_title = normalize(&search_query);
    let has_exact_title = !wanted_title.is_empty()
        && tasks
            .iter()
            .any(|task| !task.title.is_empty() && normalize(&task.title) == wanted_title);

    let mut rows = filter_and_rank(tasks, &search_query, filter);

    let snapshots = Snapshots::new(storage, settings.snapshots);
    let active = snapshots.active_session(source, now).await?;

    if search_query.is_empty()
        && let Some(session) = active.as_ref().filter(|s| !s.id.is_empty())
        && !pin_to_top(&mut rows, &session.id)
    {
        let row = snapshots
            .task_detail(source, &session.id, now)
            .await?
            .unwrap_or_else(|| session_row(session));
        rows.insert(0, row);
    }

    let create = (!search_query.is_empty() && !has_exact_title)
        .then(|| parse_create_input(&search_query, today));

    let max_rows = settings
        .return_limit
        .saturating_sub(usize::from(create.is_some()));
    rows.truncate(max_rows);

    Ok(SearchOutcome::Results(SearchResults {
        query: query.to_string(),
        search_query,
        filter,
        rows,
        create,
        active,
        rerun: cached.rerun,
    }))
}
