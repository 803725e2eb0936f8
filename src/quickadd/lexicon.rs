use jiff::civil::Weekday;

/// Trim whitespace and surrounding `,` `.` `;` then lower-case. Phrase
/// matching always compares cleaned tokens.
pub fn clean(token: &str) -> String {
    strip_punctuation(token).to_lowercase()
}

pub fn strip_punctuation(token: &str) -> &str {
    token.trim().trim_matches(|c| matches!(c, ',' | '.' | ';'))
}

/// Drop trailing `.,;:` from a tag or project fragment.
pub fn strip_trailing_marks(token: &str) -> &str {
    token
        .trim()
        .trim_end_matches(|c| matches!(c, '.' | ',' | ';' | ':'))
}

pub fn is_digits(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit())
}

pub fn weekday(word: &str) -> Option<Weekday> {
    let weekday = match word {
        "mon" | "monday" => Weekday::Monday,
        "tue" | "tues" | "tuesday" => Weekday::Tuesday,
        "wed" | "wednesday" => Weekday::Wednesday,
        "thu" | "thur" | "thurs" | "thursday" => Weekday::Thursday,
        "fri" | "friday" => Weekday::Friday,
        "sat" | "saturday" => Weekday::Saturday,
        "sun" | "sunday" => Weekday::Sunday,
        _ => return None,
    };
    Some(weekday)
}

pub fn month(word: &str) -> Option<i8> {
    let month = match word {
        "jan" | "january" => 1,
        "feb" | "february" => 2,
        "mar" | "march" => 3,
        "apr" | "april" => 4,
        "may" => 5,
        "jun" | "june" => 6,
        "jul" | "july" => 7,
        "aug" | "august" => 8,
        "sep" | "sept" | "september" => 9,
        "oct" | "october" => 10,
        "nov" | "november" => 11,
        "dec" | "december" => 12,
        _ => return None,
    };
    Some(month)
}

/// Occurrence within a month; -1 is "last".
pub fn ordinal(word: &str) -> Option<i8> {
    let ordinal = match word {
        "1st" | "first" => 1,
        "2nd" | "second" => 2,
        "3rd" | "third" => 3,
        "4th" | "fourth" => 4,
        "5th" | "fifth" => 5,
        "last" => -1,
        _ => return None,
    };
    Some(ordinal)
}

/// A count for relative offsets: a digit string, or one of a/an/one..twelve.
pub fn count(word: &str) -> Option<i64> {
    if is_digits(word) {
        return word.parse().ok();
    }
    let n = match word {
        "a" | "an" | "one" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        "eleven" => 11,
        "twelve" => 12,
        _ => return None,
    };
    Some(n)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetUnit {
    Days,
    Weeks,
    Months,
    Years,
}

impl OffsetUnit {
    pub fn parse(word: &str) -> Option<Self> {
        match word {
            "day" | "days" => Some(OffsetUnit::Days),
            "week" | "weeks" => Some(OffsetUnit::Weeks),
            "month" | "months" => Some(OffsetUnit::Months),
            "year" | "years" => Some(OffsetUnit::Years),
            _ => None,
        }
    }
}
