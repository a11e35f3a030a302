//! Due-date phrases as they appear in coalition agreements and trackers
//!
//! Spreadsheet cells hold anything from `2023-05-01` to `Ende 2024` or
//! `Q3 2025`. Vague phrases resolve to the last day of the period they name.

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

static ISO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})$").expect("valid regex"));
static GERMAN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})\.\s*(\d{1,2})\.\s*(\d{4})$").expect("valid regex"));
static MONTH_YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})\s*[./]\s*(\d{4})$").expect("valid regex"));
static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4})$").expect("valid regex"));
static QUARTER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:q\s*([1-4])|([1-4])\.\s*quartal)\s*(\d{4})$").expect("valid regex")
});
static HALF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:h\s*([12])|([12])\.\s*(?:halbjahr|hälfte))\s*(\d{4})$").expect("valid regex")
});
static WORD_YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\p{L}+)\.?\s+(\d{4})$").expect("valid regex"));
static TERM_END_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:ende der\s+)?(?:legislatur(?:periode)?|wahlperiode|end of term)$")
        .expect("valid regex")
});

const PREFIXES: [&str; 6] = ["bis spätestens ", "spätestens ", "bis zum ", "bis ", "by ", "until "];

/// Parse a due-date phrase. `term_end` answers "end of the legislative term".
pub fn parse_date_phrase(input: &str, term_end: Option<NaiveDate>) -> Option<NaiveDate> {
    let mut phrase = input.trim().to_lowercase();
    for prefix in PREFIXES {
        if let Some(rest) = phrase.strip_prefix(prefix) {
            phrase = rest.trim().to_string();
            break;
        }
    }
    if phrase.is_empty() {
        return None;
    }

    if let Some(caps) = ISO_RE.captures(&phrase) {
        return NaiveDate::from_ymd_opt(num(&caps[1])?, num(&caps[2])?, num(&caps[3])?);
    }
    if let Some(caps) = GERMAN_RE.captures(&phrase) {
        return NaiveDate::from_ymd_opt(num(&caps[3])?, num(&caps[2])?, num(&caps[1])?);
    }
    if let Some(caps) = MONTH_YEAR_RE.captures(&phrase) {
        return last_day_of_month(num(&caps[2])?, num(&caps[1])?);
    }
    if let Some(caps) = YEAR_RE.captures(&phrase) {
        return NaiveDate::from_ymd_opt(num(&caps[1])?, 12, 31);
    }
    if let Some(caps) = QUARTER_RE.captures(&phrase) {
        let quarter: u32 = num(caps.get(1).or_else(|| caps.get(2))?.as_str())?;
        return last_day_of_month(num(&caps[3])?, quarter * 3);
    }
    if let Some(caps) = HALF_RE.captures(&phrase) {
        let half: u32 = num(caps.get(1).or_else(|| caps.get(2))?.as_str())?;
        return last_day_of_month(num(&caps[3])?, half * 6);
    }
    if let Some(caps) = WORD_YEAR_RE.captures(&phrase) {
        let year = num(&caps[2])?;
        let month = period_end_month(&caps[1]).or_else(|| month_number(&caps[1]))?;
        return last_day_of_month(year, month);
    }
    if TERM_END_RE.is_match(&phrase) {
        return term_end;
    }
    None
}

fn num<T: std::str::FromStr>(digits: &str) -> Option<T> {
    digits.parse().ok()
}

pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    first_of_next.pred_opt().filter(|d| d.month() == month)
}

/// Month a vague period ends in
fn period_end_month(word: &str) -> Option<u32> {
    match word {
        "anfang" | "beginn" | "early" | "start" => Some(3),
        "frühjahr" | "fruehjahr" | "frühling" | "spring" => Some(5),
        "mitte" | "mid" => Some(6),
        "sommer" | "summer" => Some(8),
        "herbst" | "autumn" | "fall" => Some(11),
        "ende" | "end" | "winter" | "jahresende" => Some(12),
        _ => None,
    }
}

fn month_number(word: &str) -> Option<u32> {
    let month = match word {
        "januar" | "jänner" | "january" | "jan" => 1,
        "februar" | "february" | "feb" => 2,
        "märz" | "maerz" | "march" | "mär" | "mar" => 3,
        "april" | "apr" => 4,
        "mai" | "may" => 5,
        "juni" | "june" | "jun" => 6,
        "juli" | "july" | "jul" => 7,
        "august" | "aug" => 8,
        "september" | "sept" | "sep" => 9,
        "oktober" | "october" | "okt" | "oct" => 10,
        "november" | "nov" => 11,
        "dezember" | "december" | "dez" | "dec" => 12,
        _ => return None,
    };
    Some(month)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, day)
    }

    #[test]
    fn test_exact_dates() {
        assert_eq!(parse_date_phrase("2023-05-01", None), d(2023, 5, 1));
        assert_eq!(parse_date_phrase("01.05.2023", None), d(2023, 5, 1));
        assert_eq!(parse_date_phrase(" 1. 5. 2023 ", None), d(2023, 5, 1));
        assert_eq!(parse_date_phrase("2023-02-30", None), None);
    }

    #[test]
    fn test_month_and_year() {
        assert_eq!(parse_date_phrase("02/2024", None), d(2024, 2, 29));
        assert_eq!(parse_date_phrase("11.2023", None), d(2023, 11, 30));
        assert_eq!(parse_date_phrase("2025", None), d(2025, 12, 31));
        assert_eq!(parse_date_phrase("März 2023", None), d(2023, 3, 31));
        assert_eq!(parse_date_phrase("Sept. 2022", None), d(2022, 9, 30));
    }

    #[test]
    fn test_periods() {
        assert_eq!(parse_date_phrase("Q1 2023", None), d(2023, 3, 31));
        assert_eq!(parse_date_phrase("3. Quartal 2024", None), d(2024, 9, 30));
        assert_eq!(parse_date_phrase("H1 2023", None), d(2023, 6, 30));
        assert_eq!(parse_date_phrase("2. Halbjahr 2023", None), d(2023, 12, 31));
        assert_eq!(parse_date_phrase("Ende 2022", None), d(2022, 12, 31));
        assert_eq!(parse_date_phrase("bis Mitte 2024", None), d(2024, 6, 30));
        assert_eq!(parse_date_phrase("Anfang 2023", None), d(2023, 3, 31));
        assert_eq!(parse_date_phrase("Herbst 2023", None), d(2023, 11, 30));
    }

    #[test]
    fn test_end_of_term() {
        let term_end = d(2025, 10, 26);
        assert_eq!(parse_date_phrase("Ende der Legislaturperiode", term_end), term_end);
        assert_eq!(parse_date_phrase("Legislatur", None), None);
    }

    #[test]
    fn test_unparseable() {
        assert_eq!(parse_date_phrase("", None), None);
        assert_eq!(parse_date_phrase("laufend", None), None);
        assert_eq!(parse_date_phrase("Ende", None), None);
    }
}
