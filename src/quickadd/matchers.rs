use std::sync::LazyLock;

use jiff::civil::Date;
use regex::Regex;

use crate::calendar::{
    add_days, add_months, add_years, next_weekday, nth_weekday_of_month, prev_weekday,
};
use crate::quickadd::lexicon::{self, OffsetUnit, clean, is_digits, strip_punctuation};

static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})$").expect("valid ISO date regex"));
static US_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2})/(\d{1,2})(?:/(\d{2,4}))?$").expect("valid US date regex")
});
static DAY_OF_MONTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2})(?:st|nd|rd|th)?,?$").expect("valid day-of-month regex")
});

/// How to treat a yearless date that already passed this year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PastPolicy {
    /// Keep it as written (keyworded dates: `due`, `by`, `sch`, ...).
    Allow,
    /// Move it to next year (bare dates).
    RollForward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateMatch {
    pub date: Date,
    /// Tokens used by the phrase, starting at the cursor
    pub consumed: usize,
}

impl DateMatch {
    fn new(date: Date, consumed: usize) -> Self {
        Self { date, consumed }
    }
}

/// The date phrase shapes, tried in `DateMatcher::ORDER` at every cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateMatcher {
    /// `in 3 days`, `after two weeks`, `a month from today`
    RelativeOffset,
    /// `2nd tuesday of march [2027]`, `last friday of nov`
    NthWeekday,
    /// `today`, `yesterday`, `tomorrow` and their short forms
    LiteralKeyword,
    /// `next friday`, `next week`, `next month`
    NextWeekday,
    /// `last friday`
    LastWeekday,
    /// `friday`
    BareWeekday,
    /// `2026-03-01`
    IsoDate,
    /// `3/1`, `3/1/26`, `3/1/2026`
    UsDate,
    /// `mar 1`, `march 1st 2026`
    MonthName,
}

impl DateMatcher {
    pub const ORDER: [DateMatcher; 9] = [
        DateMatcher::RelativeOffset,
        DateMatcher::NthWeekday,
        DateMatcher::LiteralKeyword,
        DateMatcher::NextWeekday,
        DateMatcher::LastWeekday,
        DateMatcher::BareWeekday,
        DateMatcher::IsoDate,
        DateMatcher::UsDate,
        DateMatcher::MonthName,
    ];

    pub fn try_match(
        self,
        tokens: &[&str],
        at: usize,
        today: Date,
        policy: PastPolicy,
    ) -> Option<DateMatch> {
        match self {
            DateMatcher::RelativeOffset => relative_offset(tokens, at, today),
            DateMatcher::NthWeekday => nth_weekday(tokens, at, today, policy),
            DateMatcher::LiteralKeyword => literal_keyword(tokens, at, today),
            DateMatcher::NextWeekday => next_phrase(tokens, at, today),
            DateMatcher::LastWeekday => last_weekday(tokens, at, today),
            DateMatcher::BareWeekday => bare_weekday(tokens, at, today),
            DateMatcher::IsoDate => iso_date(tokens, at),
            DateMatcher::UsDate => us_date(tokens, at, today, policy),
            DateMatcher::MonthName => month_name(tokens, at, today, policy),
        }
    }
}

/// First matching date phrase starting at `tokens[at]`, if any.
pub fn match_date_phrase(
    tokens: &[&str],
    at: usize,
    today: Date,
    policy: PastPolicy,
) -> Option<DateMatch> {
    if at >= tokens.len() {
        return None;
    }
    DateMatcher::ORDER
        .iter()
        .find_map(|matcher| matcher.try_match(tokens, at, today, policy))
}

fn cleaned_at(tokens: &[&str], at: usize) -> Option<String> {
    tokens.get(at).map(|t| clean(t))
}

fn apply_offset(today: Date, n: i64, unit: OffsetUnit) -> Option<Date> {
    match unit {
        OffsetUnit::Days => add_days(today, n),
        OffsetUnit::Weeks => add_days(today, n.checked_mul(7)?),
        OffsetUnit::Months => add_months(today, n),
        OffsetUnit::Years => add_years(today, n),
    }
}

fn relative_offset(tokens: &[&str], at: usize, today: Date) -> Option<DateMatch> {
    let first = cleaned_at(tokens, at)?;

    if (first == "in" || first == "after") && at + 2 < tokens.len() {
        let n = lexicon::count(&clean(tokens[at + 1]));
        let unit = OffsetUnit::parse(&clean(tokens[at + 2]));
        if let (Some(n), Some(unit)) = (n, unit)
            && let Some(date) = apply_offset(today, n, unit)
        {
            return Some(DateMatch::new(date, 3));
        }
    }

    if at + 3 < tokens.len() {
        let n = lexicon::count(&first)?;
        let unit = OffsetUnit::parse(&clean(tokens[at + 1]))?;
        let from = clean(tokens[at + 2]);
        let anchor = clean(tokens[at + 3]);
        if from == "from" && (anchor == "today" || anchor == "now") {
            return apply_offset(today, n, unit).map(|date| DateMatch::new(date, 4));
        }
    }

    None
}

fn nth_weekday(tokens: &[&str], at: usize, today: Date, policy: PastPolicy) -> Option<DateMatch> {
    if at + 3 >= tokens.len() {
        return None;
    }

    let ordinal = lexicon::ordinal(&clean(tokens[at]))?;
    let weekday = lexicon::weekday(&clean(tokens[at + 1]))?;
    if clean(tokens[at + 2]) != "of" {
        return None;
    }
    let month = lexicon::month(&clean(tokens[at + 3]))?;

    let explicit_year = tokens
        .get(at + 4)
        .map(|t| strip_punctuation(t))
        .filter(|t| t.len() == 4 && is_digits(t))
        .and_then(|t| t.parse::<i16>().ok());
    let consumed = if explicit_year.is_some() { 5 } else { 4 };

    let year = explicit_year.unwrap_or(today.year());
    // A missing occurrence (5th weekday) fails the phrase rather than trying
    // another year.
    let mut date = nth_weekday_of_month(year, month, weekday, ordinal)?;

    if explicit_year.is_none()
        && date < today
        && policy == PastPolicy::RollForward
        && let Some(next) = today
            .year()
            .checked_add(1)
            .and_then(|y| nth_weekday_of_month(y, month, weekday, ordinal))
    {
        date = next;
    }

    Some(DateMatch::new(date, consumed))
}

fn literal_keyword(tokens: &[&str], at: usize, today: Date) -> Option<DateMatch> {
    let offset = match cleaned_at(tokens, at)?.as_str() {
        "today" | "tod" => 0,
        "yesterday" | "yest" => -1,
        "tomorrow" | "tmr" | "tom" => 1,
        _ => return None,
    };
    add_days(today, offset).map(|date| DateMatch::new(date, 1))
}

fn next_phrase(tokens: &[&str], at: usize, today: Date) -> Option<DateMatch> {
    if cleaned_at(tokens, at)? != "next" {
        return None;
    }
    let word = cleaned_at(tokens, at + 1)?;

    let date = match lexicon::weekday(&word) {
        Some(weekday) => next_weekday(today, weekday, true),
        None if word == "week" => add_days(today, 7),
        None if word == "month" => add_months(today, 1),
        None => None,
    }?;

    Some(DateMatch::new(date, 2))
}

fn last_weekday(tokens: &[&str], at: usize, today: Date) -> Option<DateMatch> {
    if cleaned_at(tokens, at)? != "last" {
        return None;
    }
    let weekday = lexicon::weekday(&cleaned_at(tokens, at + 1)?)?;
    prev_weekday(today, weekday).map(|date| DateMatch::new(date, 2))
}

fn bare_weekday(tokens: &[&str], at: usize, today: Date) -> Option<DateMatch> {
    let weekday = lexicon::weekday(&cleaned_at(tokens, at)?)?;
    next_weekday(today, weekday, false).map(|date| DateMatch::new(date, 1))
}

fn iso_date(tokens: &[&str], at: usize) -> Option<DateMatch> {
    let token = strip_punctuation(tokens.get(at)?);
    let caps = ISO_DATE.captures(token)?;
    let year = caps[1].parse().ok()?;
    let month = caps[2].parse().ok()?;
    let day = caps[3].parse().ok()?;
    Date::new(year, month, day)
        .ok()
        .map(|date| DateMatch::new(date, 1))
}

fn us_date(tokens: &[&str], at: usize, today: Date, policy: PastPolicy) -> Option<DateMatch> {
    let token = strip_punctuation(tokens.get(at)?);
    let caps = US_DATE.captures(token)?;
    let month: i8 = caps[1].parse().ok()?;
    let day: i8 = caps[2].parse().ok()?;

    let explicit_year = match caps.get(3) {
        Some(y) => Some(normalize_year(y.as_str().parse().ok()?)),
        None => None,
    };

    let date = Date::new(explicit_year.unwrap_or(today.year()), month, day).ok()?;
    let date = roll_forward_if_past(date, explicit_year.is_some(), today, policy);
    Some(DateMatch::new(date, 1))
}

fn month_name(tokens: &[&str], at: usize, today: Date, policy: PastPolicy) -> Option<DateMatch> {
    let month = lexicon::month(&cleaned_at(tokens, at)?)?;
    let day_token = cleaned_at(tokens, at + 1)?;
    let caps = DAY_OF_MONTH.captures(&day_token)?;
    let day: i8 = caps[1].parse().ok()?;

    let explicit_year = tokens
        .get(at + 2)
        .map(|t| strip_punctuation(t).trim_end_matches(','))
        .filter(|t| (t.len() == 2 || t.len() == 4) && is_digits(t))
        .and_then(|t| t.parse::<i16>().ok())
        .map(normalize_year);
    let consumed = if explicit_year.is_some() { 3 } else { 2 };

    let date = Date::new(explicit_year.unwrap_or(today.year()), month, day).ok()?;
    let date = roll_forward_if_past(date, explicit_year.is_some(), today, policy);
    Some(DateMatch::new(date, consumed))
}

/// Two-digit years are 20xx.
fn normalize_year(year: i16) -> i16 {
    if year < 100 { year + 2000 } else { year }
}

/// A yearless date already behind us under `RollForward` moves to the same
/// month/day next year, once. If that day does not exist next year (Feb 29)
/// the original date stands.
fn roll_forward_if_past(date: Date, explicit_year: bool, today: Date, policy: PastPolicy) -> Date {
    if explicit_year || date >= today || policy == PastPolicy::Allow {
        return date;
    }
    today
        .year()
        .checked_add(1)
        .and_then(|y| Date::new(y, date.month(), date.day()).ok())
        .unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::civil::date;

    // A Saturday.
    const TODAY: Date = date(2026, 1, 10);

    fn matched(input: &str, policy: PastPolicy) -> Option<(Date, usize)> {
        let tokens: Vec<&str> = input.split_whitespace().collect();
        match_date_phrase(&tokens, 0, TODAY, policy).map(|m| (m.date, m.consumed))
    }

    fn bare(input: &str) -> Option<(Date, usize)> {
        matched(input, PastPolicy::RollForward)
    }

    #[test]
    fn test_relative_offsets() {
        assert_eq!(bare("in two weeks"), Some((date(2026, 1, 24), 3)));
        assert_eq!(bare("after 14 days"), Some((date(2026, 1, 24), 3)));
        assert_eq!(bare("in a year"), Some((date(2027, 1, 10), 3)));
        assert_eq!(bare("in 3 Months"), Some((date(2026, 4, 10), 3)));
        assert_eq!(bare("two weeks from today"), Some((date(2026, 1, 24), 4)));
        assert_eq!(bare("1 day from now"), Some((date(2026, 1, 11), 4)));
    }

    #[test]
    fn test_relative_offset_needs_every_part() {
        assert_eq!(bare("in two"), None);
        assert_eq!(bare("in many weeks"), None);
        assert_eq!(bare("two weeks from"), None);
        assert_eq!(bare("two weeks from monday"), None);
    }

    #[test]
    fn test_nth_weekday_rolls_forward_when_bare() {
        assert_eq!(bare("1st monday of jan"), Some((date(2027, 1, 4), 4)));
        assert_eq!(
            matched("1st monday of jan", PastPolicy::Allow),
            Some((date(2026, 1, 5), 4))
        );
        assert_eq!(bare("first monday of january 2026"), Some((date(2026, 1, 5), 5)));
        assert_eq!(bare("last friday of nov 2026"), Some((date(2026, 11, 27), 5)));
    }

    #[test]
    fn test_nth_weekday_missing_occurrence_falls_through() {
        // February 2026 has four Mondays; "fifth" is not a date.
        assert_eq!(bare("fifth monday of feb"), None);
        assert_eq!(bare("2nd monday in feb"), None);
    }

    #[test]
    fn test_literal_keywords() {
        assert_eq!(bare("tod"), Some((TODAY, 1)));
        assert_eq!(bare("Yesterday"), Some((date(2026, 1, 9), 1)));
        assert_eq!(bare("tmr"), Some((date(2026, 1, 11), 1)));
        assert_eq!(bare("tomorrow,"), Some((date(2026, 1, 11), 1)));
    }

    #[test]
    fn test_next_and_last_phrases() {
        assert_eq!(bare("next saturday"), Some((date(2026, 1, 17), 2)));
        assert_eq!(bare("next mon"), Some((date(2026, 1, 12), 2)));
        assert_eq!(bare("next week"), Some((date(2026, 1, 17), 2)));
        assert_eq!(bare("next month"), Some((date(2026, 2, 10), 2)));
        assert_eq!(bare("last saturday"), Some((date(2026, 1, 3), 2)));
        assert_eq!(bare("next time"), None);
    }

    #[test]
    fn test_bare_weekday_includes_today() {
        assert_eq!(bare("saturday"), Some((TODAY, 1)));
        assert_eq!(bare("fri"), Some((date(2026, 1, 16), 1)));
    }

    #[test]
    fn test_iso_dates_are_validated() {
        assert_eq!(bare("2026-03-01"), Some((date(2026, 3, 1), 1)));
        assert_eq!(bare("2025-03-01"), Some((date(2025, 3, 1), 1)));
        assert_eq!(bare("2026-02-30"), None);
        assert_eq!(bare("2026-3-1"), None);
    }

    #[test]
    fn test_us_dates_roll_forward_once() {
        assert_eq!(bare("1/5"), Some((date(2027, 1, 5), 1)));
        assert_eq!(matched("1/5", PastPolicy::Allow), Some((date(2026, 1, 5), 1)));
        assert_eq!(bare("3/1"), Some((date(2026, 3, 1), 1)));
        assert_eq!(bare("1/5/26"), Some((date(2026, 1, 5), 1)));
        assert_eq!(bare("1/5/2025"), Some((date(2025, 1, 5), 1)));
        assert_eq!(bare("2/30"), None);
        assert_eq!(bare("13/1"), None);
    }

    #[test]
    fn test_month_name_dates() {
        assert_eq!(bare("jan 2"), Some((date(2027, 1, 2), 2)));
        assert_eq!(bare("March 3rd"), Some((date(2026, 3, 3), 2)));
        assert_eq!(bare("dec 25, 2026"), Some((date(2026, 12, 25), 3)));
        assert_eq!(bare("jan 2 26"), Some((date(2026, 1, 2), 3)));
        assert_eq!(matched("jan 2", PastPolicy::Allow), Some((date(2026, 1, 2), 2)));
        assert_eq!(bare("feb 30"), None);
        assert_eq!(bare("may be"), None);
    }

    #[test]
    fn test_leap_day_rollover_keeps_original_when_next_year_lacks_it() {
        let today = date(2028, 3, 1);
        let tokens = ["2/29"];
        let m = match_date_phrase(&tokens, 0, today, PastPolicy::RollForward).unwrap();
        assert_eq!(m.date, date(2028, 2, 29));
    }

    #[test]
    fn test_matcher_order_prefers_nth_weekday_over_last_weekday() {
        assert_eq!(bare("last friday of nov"), Some((date(2026, 11, 27), 4)));
        assert_eq!(bare("last friday"), Some((date(2026, 1, 9), 2)));
    }

    #[test]
    fn test_out_of_range_cursor() {
        let tokens = ["today"];
        assert_eq!(match_date_phrase(&tokens, 1, TODAY, PastPolicy::Allow), None);
    }
}
