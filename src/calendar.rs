use jiff::Span;
use jiff::civil::{Date, Weekday};

/// Number of days in `month` of `year`, or `None` when the month is out of
/// range or the year is outside the supported calendar.
pub fn days_in_month(year: i16, month: i8) -> Option<i8> {
    Date::new(year, month, 1).ok().map(|d| d.days_in_month())
}

pub fn add_days(date: Date, days: i64) -> Option<Date> {
    let span = Span::new().try_days(days).ok()?;
    date.checked_add(span).ok()
}

/// Shift by whole months, clamping the day to the destination month's length
/// (Jan 31 + 1 month is the last day of February, never a date in March).
pub fn add_months(date: Date, months: i64) -> Option<Date> {
    let total = (i64::from(date.year()) * 12 + i64::from(date.month() - 1)).checked_add(months)?;
    let year = i16::try_from(total.div_euclid(12)).ok()?;
    let month = i8::try_from(total.rem_euclid(12) + 1).ok()?;
    let day = date.day().min(days_in_month(year, month)?);
    Date::new(year, month, day).ok()
}

/// Shift by whole years. Feb 29 becomes Feb 28 when the target year is not a
/// leap year.
pub fn add_years(date: Date, years: i64) -> Option<Date> {
    let year = i16::try_from(i64::from(date.year()).checked_add(years)?).ok()?;
    let day = date.day().min(days_in_month(year, date.month())?);
    Date::new(year, date.month(), day).ok()
}

/// The `ordinal`-th `weekday` of a month. `ordinal` is 1..=5, or -1 for the
/// last occurrence. Returns `None` when the occurrence does not exist (a 5th
/// Monday in a short month) or the ordinal is unsupported.
pub fn nth_weekday_of_month(year: i16, month: i8, weekday: Weekday, ordinal: i8) -> Option<Date> {
    if ordinal != -1 && !(1..=5).contains(&ordinal) {
        return None;
    }
    let first = Date::new(year, month, 1).ok()?;
    first.nth_weekday_of_month(ordinal, weekday).ok()
}

/// Nearest occurrence of `weekday` on or after `today`. With
/// `force_next_week`, a `today` that already is `weekday` resolves to the
/// following week instead.
pub fn next_weekday(today: Date, weekday: Weekday, force_next_week: bool) -> Option<Date> {
    let mut delta = i64::from(
        (weekday.to_monday_zero_offset() - today.weekday().to_monday_zero_offset()).rem_euclid(7),
    );
    if force_next_week && delta == 0 {
        delta = 7;
    }
    add_days(today, delta)
}

/// Most recent occurrence of `weekday` strictly before `today`.
pub fn prev_weekday(today: Date, weekday: Weekday) -> Option<Date> {
    let mut delta = i64::from(
        (today.weekday().to_monday_zero_offset() - weekday.to_monday_zero_offset()).rem_euclid(7),
    );
    if delta == 0 {
        delta = 7;
    }
    add_days(today, -delta)
}
