//! Date parsing for `date` parameters.
//!
//! Accepts absolute forms (RFC 3339 / ISO 8601 with or without offset,
//! `YYYY`, `YYYY-MM`, `YYYY-MM-DD`, `YYYY/MM/DD`), human forms such as
//! `January 1st 2018` or `1 Jan 2018`, and relative phrases (`now`,
//! `yesterday`, `10 days ago`, `in 2 weeks`, `last year`, `last monday`)
//! resolved against a reference time. Inputs without an offset take the
//! reference time's offset.

use chrono::{
    DateTime, Datelike, Days, FixedOffset, Local, Months, NaiveDate, NaiveDateTime, TimeDelta,
    TimeZone, Weekday,
};

use crate::error::StrataError;

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%:z",
];

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

const NAIVE_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"];

/// Parse `input` relative to the current local time.
pub fn parse_date(input: &str) -> Result<DateTime<FixedOffset>, StrataError> {
    DateParser::now().parse(input)
}

/// Date parser bound to a reference time for relative phrases.
#[derive(Debug, Clone, Copy)]
pub struct DateParser {
    reference: DateTime<FixedOffset>,
}

impl DateParser {
    pub fn new(reference: DateTime<FixedOffset>) -> Self {
        Self { reference }
    }

    pub fn now() -> Self {
        Self::new(Local::now().fixed_offset())
    }

    pub fn reference(&self) -> DateTime<FixedOffset> {
        self.reference
    }

    pub fn parse(&self, input: &str) -> Result<DateTime<FixedOffset>, StrataError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(invalid(input));
        }
        self.parse_absolute(trimmed)
            .or_else(|| self.parse_human(trimmed))
            .or_else(|| self.parse_relative(trimmed))
            .ok_or_else(|| invalid(input))
    }

    fn offset(&self) -> FixedOffset {
        *self.reference.offset()
    }

    fn localize(&self, naive: NaiveDateTime) -> Option<DateTime<FixedOffset>> {
        self.offset().from_local_datetime(&naive).single()
    }

    fn midnight(&self, date: NaiveDate) -> Option<DateTime<FixedOffset>> {
        self.localize(date.and_hms_opt(0, 0, 0)?)
    }

    fn parse_absolute(&self, s: &str) -> Option<DateTime<FixedOffset>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt);
        }
        for fmt in OFFSET_FORMATS {
            if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
                return Some(dt);
            }
        }
        for fmt in NAIVE_DATETIME_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
                return self.localize(naive);
            }
        }
        for fmt in NAIVE_DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
                return self.midnight(date);
            }
        }
        // YYYY-MM and bare YYYY
        if let Some((y, m)) = s.split_once('-')
            && y.len() == 4
            && (1..=2).contains(&m.len())
        {
            let date = NaiveDate::from_ymd_opt(y.parse().ok()?, m.parse().ok()?, 1)?;
            return self.midnight(date);
        }
        if s.len() == 4 && s.chars().all(|c| c.is_ascii_digit()) {
            let date = NaiveDate::from_ymd_opt(s.parse().ok()?, 1, 1)?;
            return self.midnight(date);
        }
        None
    }

    /// `January 1st 2018`, `Jan 1, 2018`, `1 January 2018`, `March 2020`,
    /// `march 3` (current year).
    fn parse_human(&self, s: &str) -> Option<DateTime<FixedOffset>> {
        let tokens = tokenize(s);
        let words: Vec<&str> = tokens.iter().map(String::as_str).collect();

        let (month, day, year) = match words.as_slice() {
            [m, d, y] if month_number(m).is_some() => {
                (month_number(m)?, parse_day(d)?, y.parse::<i32>().ok()?)
            }
            [d, m, y] if month_number(m).is_some() => {
                (month_number(m)?, parse_day(d)?, y.parse::<i32>().ok()?)
            }
            [m, y] if month_number(m).is_some() && y.len() == 4 => {
                (month_number(m)?, 1, y.parse::<i32>().ok()?)
            }
            [m, d] if month_number(m).is_some() => {
                (month_number(m)?, parse_day(d)?, self.reference.year())
            }
            [d, m] if month_number(m).is_some() => {
                (month_number(m)?, parse_day(d)?, self.reference.year())
            }
            _ => return None,
        };
        self.midnight(NaiveDate::from_ymd_opt(year, month, day)?)
    }

    fn parse_relative(&self, s: &str) -> Option<DateTime<FixedOffset>> {
        let tokens = tokenize(s);
        let words: Vec<&str> = tokens.iter().map(String::as_str).collect();
        let reference = self.reference;

        match words.as_slice() {
            ["now"] => Some(reference),
            ["today"] => self.midnight(reference.date_naive()),
            ["yesterday"] => self.midnight(reference.date_naive().pred_opt()?),
            ["tomorrow"] => self.midnight(reference.date_naive().succ_opt()?),
            [n, unit, "ago"] => shift(reference, unit, parse_count(n)?.checked_neg()?),
            ["in", n, unit] => shift(reference, unit, parse_count(n)?),
            [n, unit, "from", "now"] => shift(reference, unit, parse_count(n)?),
            ["last", word] | ["previous", word] => match weekday(word) {
                Some(day) => self.weekday_relative(day, -1),
                None => shift(reference, word, -1),
            },
            ["next", word] => match weekday(word) {
                Some(day) => self.weekday_relative(day, 1),
                None => shift(reference, word, 1),
            },
            ["this", word] => match weekday(word) {
                Some(day) => self.weekday_relative(day, 0),
                None => shift(reference, word, 0),
            },
            [word] => weekday(word).and_then(|day| self.weekday_relative(day, 0)),
            _ => None,
        }
    }

    /// Resolve a weekday: `-1` is the most recent one strictly before the
    /// reference date, `1` the first strictly after, `0` the one within the
    /// reference week (Monday-based).
    fn weekday_relative(&self, day: Weekday, direction: i8) -> Option<DateTime<FixedOffset>> {
        let today = self.reference.date_naive();
        let current = today.weekday().num_days_from_monday() as i64;
        let target = day.num_days_from_monday() as i64;
        let date = match direction {
            d if d < 0 => {
                let mut back = (current - target).rem_euclid(7);
                if back == 0 {
                    back = 7;
                }
                today.checked_sub_days(Days::new(back as u64))?
            }
            d if d > 0 => {
                let mut fwd = (target - current).rem_euclid(7);
                if fwd == 0 {
                    fwd = 7;
                }
                today.checked_add_days(Days::new(fwd as u64))?
            }
            _ => {
                let delta = target - current;
                if delta >= 0 {
                    today.checked_add_days(Days::new(delta as u64))?
                } else {
                    today.checked_sub_days(Days::new((-delta) as u64))?
                }
            }
        };
        self.midnight(date)
    }
}

fn invalid(input: &str) -> StrataError {
    StrataError::InvalidDate {
        input: input.to_string(),
    }
}

fn tokenize(s: &str) -> Vec<String> {
    s.to_lowercase()
        .replace(',', " ")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

fn parse_count(word: &str) -> Option<i64> {
    match word {
        "a" | "an" | "one" => Some(1),
        "two" => Some(2),
        "three" => Some(3),
        other => other.parse().ok(),
    }
}

fn parse_day(word: &str) -> Option<u32> {
    let digits = word
        .strip_suffix("st")
        .or_else(|| word.strip_suffix("nd"))
        .or_else(|| word.strip_suffix("rd"))
        .or_else(|| word.strip_suffix("th"))
        .unwrap_or(word);
    let day: u32 = digits.parse().ok()?;
    (1..=31).contains(&day).then_some(day)
}

fn month_number(word: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "january",
        "february",
        "march",
        "april",
        "may",
        "june",
        "july",
        "august",
        "september",
        "october",
        "november",
        "december",
    ];
    let word = word.trim_end_matches('.');
    if word.len() < 3 {
        return None;
    }
    MONTHS
        .iter()
        .position(|m| m.starts_with(word))
        .map(|i| i as u32 + 1)
}

fn weekday(word: &str) -> Option<Weekday> {
    match word {
        "monday" | "mon" => Some(Weekday::Mon),
        "tuesday" | "tue" | "tues" => Some(Weekday::Tue),
        "wednesday" | "wed" => Some(Weekday::Wed),
        "thursday" | "thu" | "thurs" => Some(Weekday::Thu),
        "friday" | "fri" => Some(Weekday::Fri),
        "saturday" | "sat" => Some(Weekday::Sat),
        "sunday" | "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

/// Move `reference` by `count` units. Calendar units (month, year) use
/// calendar arithmetic; smaller units are exact durations. `None` when the
/// result falls outside the representable range.
fn shift(
    reference: DateTime<FixedOffset>,
    unit: &str,
    count: i64,
) -> Option<DateTime<FixedOffset>> {
    let unit = unit.trim_end_matches('s');
    let delta = match unit {
        "second" | "sec" => TimeDelta::try_seconds(count)?,
        "minute" | "min" => TimeDelta::try_minutes(count)?,
        "hour" => TimeDelta::try_hours(count)?,
        "day" => TimeDelta::try_days(count)?,
        "week" => TimeDelta::try_weeks(count)?,
        "month" => return shift_months(reference, count),
        "year" => return shift_months(reference, count.checked_mul(12)?),
        _ => return None,
    };
    reference.checked_add_signed(delta)
}

fn shift_months(reference: DateTime<FixedOffset>, months: i64) -> Option<DateTime<FixedOffset>> {
    let magnitude = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
    if months >= 0 {
        reference.checked_add_months(magnitude)
    } else {
        reference.checked_sub_months(magnitude)
    }
}
