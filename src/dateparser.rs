//! Extracts a recognition period from free-text line item descriptions, e.g.
//! "Njord Player, SailGP, valid Jun 1st 2021 - Apr 30th 2022". Used as a
//! fallback when a document carries no structured service period.
//!
//! Years, month names and ordinal day numbers are scanned independently as
//! tokens; ambiguous combinations fail hard (`None`) rather than guess.

use chrono::{Datelike, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::schema::Period;
use crate::utils::last_day_of_month;

const MONTHS_SHORT: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];
const MONTHS_LONG: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

// Supported year window. Documents outside it have no parsable period.
static YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new("(2019|2020|2021|2022|2023|2024|2025|2026)").unwrap());
static DAY_RE: Lazy<Regex> = Lazy::new(|| Regex::new("([0-9]{1,2})(?:st|nd|rd|th)").unwrap());
static MONTH_LONG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(&MONTHS_LONG.join("|")).unwrap());
static MONTH_SHORT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(&MONTHS_SHORT.join("|")).unwrap());

fn char_before(text: &str, idx: usize) -> Option<char> {
    text[..idx].chars().next_back()
}

fn char_after(text: &str, idx: usize) -> Option<char> {
    text[idx..].chars().next()
}

// Start/end of string count as boundaries.
fn digit_boundary(c: Option<char>) -> bool {
    c.map_or(true, |c| !c.is_ascii_digit())
}

fn word_boundary(c: Option<char>) -> bool {
    c.map_or(true, |c| !(c.is_alphanumeric() || c == '_'))
}

fn find_years(text: &str) -> Vec<i32> {
    YEAR_RE
        .find_iter(text)
        .filter(|m| digit_boundary(char_before(text, m.start())) && digit_boundary(char_after(text, m.end())))
        .map(|m| m.as_str().parse().unwrap())
        .collect()
}

fn find_days(text: &str) -> Vec<u32> {
    DAY_RE
        .captures_iter(text)
        .filter(|c| {
            let m = c.get(0).unwrap();
            digit_boundary(char_before(text, m.start())) && word_boundary(char_after(text, m.end()))
        })
        .map(|c| c[1].parse().unwrap())
        .collect()
}

/// Month tokens in text order. Full names claim their span first so that
/// "June" is never also counted as "Jun"; names are matched case-sensitively
/// as whole word tokens.
fn find_months(text: &str) -> Vec<u32> {
    let mut found: Vec<(usize, usize, u32)> = Vec::new();

    for m in MONTH_LONG_RE.find_iter(text) {
        if word_boundary(char_before(text, m.start())) && word_boundary(char_after(text, m.end())) {
            let number = MONTHS_LONG.iter().position(|n| *n == m.as_str()).unwrap() as u32 + 1;
            found.push((m.start(), m.end(), number));
        }
    }

    for m in MONTH_SHORT_RE.find_iter(text) {
        if !word_boundary(char_before(text, m.start())) || !word_boundary(char_after(text, m.end())) {
            continue;
        }
        if found.iter().any(|(s, e, _)| m.start() >= *s && m.start() < *e) {
            continue;
        }
        let number = MONTHS_SHORT.iter().position(|n| *n == m.as_str()).unwrap() as u32 + 1;
        found.push((m.start(), m.end(), number));
    }

    found.sort_by_key(|(start, _, _)| *start);
    found.into_iter().map(|(_, _, number)| number).collect()
}

/// Resolves a `[start, end]` period from free text, using the first and last
/// occurrence of each token class. `reference` supplies the year when the
/// text names none. Returns `None` whenever the tokens are insufficient:
/// no year and no reference, or a bare day number without any month.
pub fn find_date_range(text: &str, reference: Option<NaiveDateTime>) -> Option<Period> {
    let years = find_years(text);
    let months = find_months(text);
    let days = find_days(text);

    let (year1, year2, year_in_text) = match years.as_slice() {
        [] => {
            let year = reference?.year();
            (year, year, false)
        }
        [year] => (*year, *year, true),
        all => (all[0], *all.last().unwrap(), true),
    };

    let (month1, month2) = match months.as_slice() {
        [] => {
            if !year_in_text || !days.is_empty() {
                return None;
            }
            (1, 12)
        }
        [month] => (*month, *month),
        all => (all[0], *all.last().unwrap()),
    };

    let (day1, day2) = match days.as_slice() {
        [] => (1, last_day_of_month(year2, month2).day()),
        [day] => (*day, *day),
        all => (all[0], *all.last().unwrap()),
    };

    let start = chrono::NaiveDate::from_ymd_opt(year1, month1, day1)?.and_hms_opt(0, 0, 0)?;
    let end = chrono::NaiveDate::from_ymd_opt(year2, month2, day2)?.and_hms_opt(23, 59, 59)?;
    Period::new(start, end).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn reference() -> Option<NaiveDateTime> {
        Some(
            NaiveDate::from_ymd_opt(2021, 5, 10)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        )
    }

    fn assert_range(text: &str, start: (i32, u32, u32), end: (i32, u32, u32)) {
        let period = find_date_range(text, reference())
            .unwrap_or_else(|| panic!("no range parsed from '{}'", text));
        assert_eq!(
            period.start,
            NaiveDate::from_ymd_opt(start.0, start.1, start.2)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            "start of range does not match: '{}'",
            text
        );
        assert_eq!(
            period.end,
            NaiveDate::from_ymd_opt(end.0, end.1, end.2)
                .unwrap()
                .and_hms_opt(23, 59, 59)
                .unwrap(),
            "end of range does not match: '{}'",
            text
        );
    }

    #[test]
    fn test_single_day() {
        assert_range(
            "Njord Analytics and Player; (Cape31); Fri May 7th 2021",
            (2021, 5, 7),
            (2021, 5, 7),
        );
        assert_range(
            "Njord Analytics and Player; (ClubSwan 36); Tue Jun 22nd 2021",
            (2021, 6, 22),
            (2021, 6, 22),
        );
    }

    #[test]
    fn test_month_range() {
        assert_range(
            "Njord Analytics & Njord Player, RC44, valid Jan-Nov 2021",
            (2021, 1, 1),
            (2021, 11, 30),
        );
    }

    #[test]
    fn test_day_range_without_year_uses_reference() {
        assert_range(
            "Njord Player & Fleet Race reports, per day, May 20th-23rd",
            (2021, 5, 20),
            (2021, 5, 23),
        );
    }

    #[test]
    fn test_range_across_years() {
        assert_range(
            "Njord Player, SailGP, valid Jun 1st 2021 \u{2013} Apr 30th 2022",
            (2021, 6, 1),
            (2022, 4, 30),
        );
        assert_range(
            "Njord Analytics & Njord Player; 2x Laser Radial; valid November 1st 2021 to December 31st 2024 (price per year)",
            (2021, 11, 1),
            (2024, 12, 31),
        );
    }

    #[test]
    fn test_year_only_is_full_year() {
        assert_range("Maintenance plan 2021", (2021, 1, 1), (2021, 12, 31));
    }

    #[test]
    fn test_days_without_month_are_rejected() {
        assert_eq!(find_date_range("Sat 25th - 30th 2021", reference()), None);
    }

    #[test]
    fn test_no_tokens_without_reference() {
        assert_eq!(find_date_range("Some product name", None), None);
        assert_eq!(find_date_range("Some product name", reference()), None);
    }

    #[test]
    fn test_long_name_not_double_counted_as_abbreviation() {
        // "June" must resolve as one month token, not June + Jun.
        assert_range("valid June 2021", (2021, 6, 1), (2021, 6, 30));
    }

    #[test]
    fn test_token_boundaries() {
        // "Decade" is not December, "12021" contains no valid year.
        assert_eq!(find_date_range("Decade plan 12021", reference()), None);
    }

    #[test]
    fn test_invalid_calendar_combination() {
        assert_eq!(find_date_range("Feb 30th 2021", reference()), None);
    }

    #[test]
    fn test_reversed_month_order_is_rejected() {
        assert_eq!(find_date_range("valid Nov-Feb 2021", reference()), None);
    }
}
