//! Quick-add parsing: one free-text line in, title plus task metadata out.
//!
//! Runs on every keystroke, so it is a single greedy left-to-right pass over
//! whitespace tokens with no backtracking. Nothing here fails: input that does
//! not form a recognized phrase stays in the title.

use std::sync::LazyLock;

use jiff::civil::Date;
use regex::Regex;

use crate::models::create::{ParsedCreate, Priority};
use crate::quickadd::lexicon::{clean, strip_trailing_marks};
use crate::quickadd::matchers::{PastPolicy, match_date_phrase};

pub mod lexicon;
pub mod matchers;

const DETAILS_DELIMITER: &str = "//";
const DUE_KEYWORDS: [&str; 2] = ["due", "by"];
const SCHEDULED_KEYWORDS: [&str; 5] = ["do", "sch", "on", "start", "scheduled"];
const PROJECT_STOP_KEYWORDS: [&str; 4] = ["due", "by", "do", "sch"];

const PREVIEW_TAGS: usize = 5;
const PREVIEW_PROJECTS: usize = 3;
const PREVIEW_WARNINGS: usize = 2;

static ESCAPED_NEWLINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" *\\n *").expect("valid escaped newline regex"));
static SPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" {2,}").expect("valid space run regex"));

/// Accumulates fields during one parse; consumed by `finish`.
#[derive(Default)]
struct CreateBuilder<'a> {
    title: Vec<&'a str>,
    scheduled: Option<Date>,
    due: Option<Date>,
    priority: Option<Priority>,
    tags: Vec<String>,
    projects: Vec<String>,
    warnings: Vec<String>,
}

impl<'a> CreateBuilder<'a> {
    fn finish(self, raw: &str, details: Option<String>) -> ParsedCreate {
        ParsedCreate {
            raw: raw.to_string(),
            title: self.title.join(" ").trim().to_string(),
            details,
            scheduled: self.scheduled,
            due: self.due,
            priority: self.priority,
            tags: unique(self.tags),
            projects: unique(self.projects),
            warnings: self.warnings,
        }
    }

    /// Handle the token at `at`, returning how many tokens were used.
    fn consume(&mut self, tokens: &[&'a str], at: usize, today: Date) -> usize {
        let token = tokens[at];
        let low = clean(token);

        if let Some(priority) = Priority::from_marker(&low) {
            self.priority = Some(priority);
            return 1;
        }

        if let Some(name) = token.strip_prefix('#').filter(|rest| !rest.is_empty()) {
            let tag = strip_trailing_marks(name);
            if !tag.is_empty() {
                self.tags.push(tag.to_string());
            }
            return 1;
        }

        if let Some(first) = token.strip_prefix('+').filter(|rest| !rest.is_empty()) {
            return self.consume_project(tokens, at, first, today);
        }

        if token.starts_with('@') && token.len() > 1 {
            self.warnings
                .push(format!("Ignored {} (contexts disabled)", token));
            return 1;
        }

        if low.starts_with("due:")
            && let Some(date) = inline_date(token, today)
        {
            self.due = Some(date);
            return 1;
        }

        if DUE_KEYWORDS.contains(&low.as_str())
            && let Some(m) = match_date_phrase(tokens, at + 1, today, PastPolicy::Allow)
        {
            self.due = Some(m.date);
            return 1 + m.consumed;
        }

        if low.starts_with("sch:")
            && let Some(date) = inline_date(token, today)
        {
            self.scheduled = Some(date);
            return 1;
        }

        if SCHEDULED_KEYWORDS.contains(&low.as_str())
            && let Some(m) = match_date_phrase(tokens, at + 1, today, PastPolicy::Allow)
        {
            self.scheduled = Some(m.date);
            return 1 + m.consumed;
        }

        if let Some(m) = match_date_phrase(tokens, at, today, PastPolicy::RollForward) {
            self.scheduled = Some(m.date);
            return m.consumed;
        }

        self.title.push(token);
        1
    }

    /// `+2025 Wardrobe Upgrade`: the `+` token plus following plain words, up
    /// to the next metadata token or date phrase.
    fn consume_project(&mut self, tokens: &[&'a str], at: usize, first: &str, today: Date) -> usize {
        let first = strip_trailing_marks(first);
        if first.is_empty() {
            return 1;
        }

        let mut parts = vec![first];
        let mut next = at + 1;
        while next < tokens.len() && !is_project_boundary(tokens, next, today) {
            let part = strip_trailing_marks(tokens[next]);
            if !part.is_empty() {
                parts.push(part);
            }
            next += 1;
        }

        self.projects.push(parts.join(" ").trim().to_string());
        next - at
    }
}

fn is_project_boundary(tokens: &[&str], at: usize, today: Date) -> bool {
    let token = tokens[at];
    let low = clean(token);

    token.starts_with(['#', '+', '@'])
        || PROJECT_STOP_KEYWORDS.contains(&low.as_str())
        || Priority::from_marker(&low).is_some()
        || low.starts_with("due:")
        || low.starts_with("sch:")
        || match_date_phrase(tokens, at, today, PastPolicy::Allow).is_some()
}

/// The date in a `due:<date>` / `sch:<date>` token; the date must be a single
/// token.
fn inline_date(token: &str, today: Date) -> Option<Date> {
    let rest = token.get(4..)?.trim();
    if rest.is_empty() {
        return None;
    }
    match_date_phrase(&[rest], 0, today, PastPolicy::Allow).map(|m| m.date)
}

fn unique(values: Vec<String>) -> Vec<String> {
    let mut seen = Vec::with_capacity(values.len());
    for value in values {
        if !seen.contains(&value) {
            seen.push(value);
        }
    }
    seen
}

fn normalize_details(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let text = ESCAPED_NEWLINE.replace_all(text, "\n");
    Some(SPACE_RUN.replace_all(&text, "\n").into_owned())
}

/// Parse a quick-add line relative to `today`. Same input and same `today`
/// always give the same result.
pub fn parse_create_input(raw: &str, today: Date) -> ParsedCreate {
    let input = raw.trim();
    if input.is_empty() {
        return ParsedCreate {
            raw: raw.to_string(),
            ..ParsedCreate::default()
        };
    }

    // Everything right of the first `//` is details and never tokenized.
    let (left, details) = match input.split_once(DETAILS_DELIMITER) {
        Some((left, right)) => (left.trim(), normalize_details(right)),
        None => (input, None),
    };

    let tokens: Vec<&str> = left.split_whitespace().collect();
    let mut builder = CreateBuilder::default();
    let mut at = 0;
    while at < tokens.len() {
        at += builder.consume(&tokens, at, today);
    }

    builder.finish(raw, details)
}

/// One-line summary of the extracted metadata, shown while typing.
pub fn build_preview(parsed: &ParsedCreate) -> String {
    let mut pieces = Vec::new();

    if let Some(scheduled) = parsed.scheduled {
        pieces.push(format!("Scheduled: {}", scheduled));
    }
    if let Some(due) = parsed.due {
        pieces.push(format!("Due: {}", due));
    }
    if let Some(priority) = parsed.priority {
        pieces.push(format!("Priority: {}", priority));
    }
    if let Some(details) = &parsed.details {
        let lines = details
            .lines()
            .filter(|line| !line.trim().is_empty())
            .count()
            .max(1);
        pieces.push(format!(
            "Details: {} line{}",
            lines,
            if lines == 1 { "" } else { "s" }
        ));
    }
    if !parsed.tags.is_empty() {
        pieces.push(format!("Tags: {}", truncated(&parsed.tags, PREVIEW_TAGS, ", ")));
    }
    if !parsed.projects.is_empty() {
        pieces.push(format!(
            "Projects: {}",
            truncated(&parsed.projects, PREVIEW_PROJECTS, ", ")
        ));
    }

    let mut preview = if pieces.is_empty() {
        "No metadata detected".to_string()
    } else {
        pieces.join(" • ")
    };

    if !parsed.warnings.is_empty() {
        preview.push_str("  ⚠️ ");
        preview.push_str(&truncated(&parsed.warnings, PREVIEW_WARNINGS, " · "));
    }

    preview
}

fn truncated(values: &[String], limit: usize, separator: &str) -> String {
    let mut shown = values
        .iter()
        .take(limit)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(separator);
    if values.len() > limit {
        shown.push('…');
    }
    shown
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::civil::date;

    // A Saturday.
    const TODAY: Date = date(2026, 1, 10);

    fn parse(input: &str) -> ParsedCreate {
        parse_create_input(input, TODAY)
    }

    #[test]
    fn test_bare_keyword_date_is_scheduled() {
        let parsed = parse("Buy milk tomorrow");
        assert_eq!(parsed.title, "Buy milk");
        assert_eq!(parsed.scheduled, Some(date(2026, 1, 11)));
        assert_eq!(parsed.due, None);
    }

    #[test]
    fn test_keyworded_due_keeps_past_date() {
        let parsed = parse("Pay rent due 1/5");
        assert_eq!(parsed.title, "Pay rent");
        assert_eq!(parsed.due, Some(date(2026, 1, 5)));
        assert_eq!(parsed.scheduled, None);
    }

    #[test]
    fn test_bare_past_date_rolls_to_next_year() {
        let parsed = parse("Pay rent 1/5");
        assert_eq!(parsed.scheduled, Some(date(2027, 1, 5)));
        assert_eq!(parsed.due, None);
    }

    #[test]
    fn test_full_metadata_line() {
        let parsed = parse("Report +2025 Budget Review due:2026-03-01 #urgent p1");
        assert_eq!(parsed.title, "Report");
        assert_eq!(parsed.projects, vec!["2025 Budget Review".to_string()]);
        assert_eq!(parsed.due, Some(date(2026, 3, 1)));
        assert_eq!(parsed.tags, vec!["urgent".to_string()]);
        assert_eq!(parsed.priority, Some(Priority::High));
    }

    #[test]
    fn test_details_normalize_both_newline_markers() {
        let parsed = parse("Trip in two weeks // pack  sunscreen\\nbook flights");
        assert_eq!(parsed.title, "Trip");
        assert_eq!(parsed.scheduled, Some(date(2026, 1, 24)));
        assert_eq!(
            parsed.details.as_deref(),
            Some("pack\nsunscreen\nbook flights")
        );
    }

    #[test]
    fn test_empty_details_are_absent() {
        let parsed = parse("Write report //   ");
        assert_eq!(parsed.title, "Write report");
        assert_eq!(parsed.details, None);
    }

    #[test]
    fn test_details_are_not_tokenized() {
        let parsed = parse("Call mom // tomorrow #family p1");
        assert_eq!(parsed.title, "Call mom");
        assert_eq!(parsed.scheduled, None);
        assert!(parsed.tags.is_empty());
        assert_eq!(parsed.priority, None);
        assert_eq!(parsed.details.as_deref(), Some("tomorrow #family p1"));
    }

    #[test]
    fn test_reparsing_raw_is_identical() {
        for input in [
            "Report +2025 Budget Review due:2026-03-01 #urgent p1",
            "Trip in two weeks // pack  sunscreen\\nbook flights",
            "  padded @home next friday !! ",
            "",
        ] {
            let parsed = parse(input);
            assert_eq!(parse(&parsed.raw), parsed);
        }
    }

    #[test]
    fn test_project_stops_at_date_phrase() {
        let parsed = parse("Fix bike +Home Repairs tomorrow");
        assert_eq!(parsed.title, "Fix bike");
        assert_eq!(parsed.projects, vec!["Home Repairs".to_string()]);
        assert_eq!(parsed.scheduled, Some(date(2026, 1, 11)));
    }

    #[test]
    fn test_project_stops_at_keywords_and_priority() {
        let parsed = parse("+Garden by friday");
        assert_eq!(parsed.projects, vec!["Garden".to_string()]);
        assert_eq!(parsed.due, Some(date(2026, 1, 16)));

        let parsed = parse("+Garden Shed p2 paint");
        assert_eq!(parsed.projects, vec!["Garden Shed".to_string()]);
        assert_eq!(parsed.priority, Some(Priority::Medium));
        assert_eq!(parsed.title, "paint");
    }

    #[test]
    fn test_tags_projects_dedupe_and_contexts_warn() {
        let parsed = parse("+Work, #Urgent. #urgent #Urgent @home +Work");
        assert_eq!(parsed.projects, vec!["Work".to_string()]);
        assert_eq!(parsed.tags, vec!["Urgent".to_string(), "urgent".to_string()]);
        assert_eq!(
            parsed.warnings,
            vec!["Ignored @home (contexts disabled)".to_string()]
        );
        assert_eq!(parsed.title, "");
        assert!(!parsed.has_title());
    }

    #[test]
    fn test_lone_markers_stay_in_title() {
        let parsed = parse("Use # and + and @ signs");
        assert_eq!(parsed.title, "Use # and + and @ signs");
        assert!(parsed.tags.is_empty());
        assert!(parsed.projects.is_empty());
        assert!(parsed.warnings.is_empty());
    }

    #[test]
    fn test_later_date_of_same_kind_wins() {
        let parsed = parse("Plan trip tomorrow sch fri due 2026-02-01 by 2026-03-01");
        assert_eq!(parsed.title, "Plan trip");
        assert_eq!(parsed.scheduled, Some(date(2026, 1, 16)));
        assert_eq!(parsed.due, Some(date(2026, 3, 1)));
    }

    #[test]
    fn test_keyword_without_date_is_title_text() {
        let parsed = parse("Meet on the roof");
        assert_eq!(parsed.title, "Meet on the roof");
        assert_eq!(parsed.scheduled, None);

        let parsed = parse("Pay due:soon");
        assert_eq!(parsed.title, "Pay due:soon");
        assert_eq!(parsed.due, None);
    }

    #[test]
    fn test_inline_scheduled_keyword() {
        let parsed = parse("Dentist sch:2025-12-01");
        assert_eq!(parsed.title, "Dentist");
        assert_eq!(parsed.scheduled, Some(date(2025, 12, 1)));
    }

    #[test]
    fn test_keyworded_nth_weekday_keeps_this_year() {
        let parsed = parse("Review on 1st monday of jan");
        assert_eq!(parsed.scheduled, Some(date(2026, 1, 5)));

        let parsed = parse("Review 1st monday of jan");
        assert_eq!(parsed.scheduled, Some(date(2027, 1, 4)));
    }

    #[test]
    fn test_missing_fifth_weekday_is_title_text() {
        // February has no fifth Monday, so only "monday" is read as a date.
        let parsed = parse("Party fifth monday of feb");
        assert_eq!(parsed.title, "Party fifth of feb");
        assert_eq!(parsed.scheduled, Some(date(2026, 1, 12)));
    }

    #[test]
    fn test_empty_input() {
        let parsed = parse("   ");
        assert_eq!(parsed.raw, "   ");
        assert_eq!(parsed.title, "");
        assert_eq!(parsed.details, None);
    }

    #[test]
    fn test_preview_orders_and_truncates() {
        let parsed = ParsedCreate {
            raw: String::new(),
            title: "x".to_string(),
            details: Some("one\n\ntwo".to_string()),
            scheduled: Some(date(2026, 1, 11)),
            due: Some(date(2026, 1, 12)),
            priority: Some(Priority::High),
            tags: ["a", "b", "c", "d", "e", "f"].map(String::from).to_vec(),
            projects: vec!["Home".to_string()],
            warnings: ["w1", "w2", "w3"].map(String::from).to_vec(),
        };

        assert_eq!(
            build_preview(&parsed),
            "Scheduled: 2026-01-11 • Due: 2026-01-12 • Priority: High • Details: 2 lines \
             • Tags: a, b, c, d, e… • Projects: Home  ⚠️ w1 · w2…"
        );
    }

    #[test]
    fn test_preview_truncates_projects_after_three() {
        let projects = |names: &[&str]| ParsedCreate {
            title: "x".to_string(),
            projects: names.iter().map(|n| n.to_string()).collect(),
            ..ParsedCreate::default()
        };

        assert_eq!(
            build_preview(&projects(&["Home", "Work", "Garden", "Car"])),
            "Projects: Home, Work, Garden…"
        );
        assert_eq!(
            build_preview(&projects(&["Home", "Work", "Garden"])),
            "Projects: Home, Work, Garden"
        );
    }

    #[test]
    fn test_preview_without_metadata() {
        assert_eq!(build_preview(&parse("Just a title")), "No metadata detected");
        assert_eq!(
            build_preview(&parse("Call @bob")),
            "No metadata detected  ⚠️ Ignored @bob (contexts disabled)"
        );
    }
}
