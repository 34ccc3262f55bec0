//! # Date Expressions
//!
//! Turns user-supplied date expressions into UTC timestamps and validates
//! `(start, end)` pairs into a [`DateRange`].
//!
//! Accepted forms:
//!
//! - `now`
//! - `<N><unit>`: `N` units before now, with `d` = 1 day, `w` = 7 days,
//!   `m` = 28 days and `y` = 364 days. Months and years are whole weeks on
//!   purpose; relative math never looks at the calendar.
//! - `YYYY-MM-DD`: midnight UTC
//! - `YYYY-MM-DD HH:MM` or `YYYY-MM-DD HH:MM:SS`: that instant in UTC
//!
//! Timestamps are always naive. Anything carrying an offset, `Z`, or a zone
//! name is rejected rather than converted.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{DateError, DateParseError, DateRangeError, ParseFailure};
use crate::types::DateRange;

const MIN_YEAR: i32 = 2000;
const MAX_YEAR: i32 = 2100;

static TIMEZONE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\d{4}-\d{2}-\d{2}(?:[T ]\d{2}:\d{2}(?::\d{2}(?:\.\d+)?)?)?(?:\s*(?:z|utc|gmt|[+-]\d{2}(?::?\d{2})?)|\s+[a-z][a-z_/+-]*)$",
    )
    .expect("timezone pattern is valid")
});

static RELATIVE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([+-]?\d+(?:\.\d+)?)\s*([A-Za-z]+)$").expect("relative pattern is valid")
});

static ABSOLUTE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})-(\d{2})-(\d{2})(?: (\d{2}):(\d{2})(?::(\d{2}))?)?$")
        .expect("absolute pattern is valid")
});

/// One endpoint of a range, as handed to [`DateParser::validate_date_range`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateInput {
    Timestamp(DateTime<Utc>),
    Expression(String),
}

impl DateInput {
    fn describe(&self) -> String {
        match self {
            DateInput::Timestamp(ts) => ts.to_rfc3339(),
            DateInput::Expression(expr) => expr.clone(),
        }
    }

    fn is_now(&self) -> bool {
        matches!(self, DateInput::Expression(expr) if expr.trim().eq_ignore_ascii_case("now"))
    }
}

impl From<DateTime<Utc>> for DateInput {
    fn from(ts: DateTime<Utc>) -> Self {
        DateInput::Timestamp(ts)
    }
}

impl From<&str> for DateInput {
    fn from(expr: &str) -> Self {
        DateInput::Expression(expr.to_string())
    }
}

impl From<String> for DateInput {
    fn from(expr: String) -> Self {
        DateInput::Expression(expr)
    }
}

/// Parses date expressions relative to a reference "now".
///
/// [`DateParser::new`] reads the wall clock on every call; [`DateParser::at`]
/// pins "now" to a fixed instant.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateParser {
    fixed_now: Option<DateTime<Utc>>,
}

impl DateParser {
    pub fn new() -> Self {
        Self { fixed_now: None }
    }

    pub fn at(now: DateTime<Utc>) -> Self {
        Self { fixed_now: Some(now) }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.fixed_now.unwrap_or_else(Utc::now)
    }

    /// Resolve a single expression to a UTC timestamp.
    pub fn parse(&self, expr: &str) -> Result<DateTime<Utc>, DateParseError> {
        parse_at(expr, self.now())
    }

    /// Resolve both endpoints and build a normalized, ordered range.
    ///
    /// A missing start is the Unix epoch; a missing end is today. Unless the
    /// end is given explicitly as "now" it is moved to the last microsecond of
    /// its day. The ordering check runs on the normalized values.
    pub fn validate_date_range(
        &self,
        start: Option<DateInput>,
        end: Option<DateInput>,
    ) -> Result<DateRange, DateError> {
        let now = self.now();

        let raw_start = start
            .as_ref()
            .map(DateInput::describe)
            .unwrap_or_else(|| "<unbounded>".to_string());
        let raw_end = end
            .as_ref()
            .map(DateInput::describe)
            .unwrap_or_else(|| "today".to_string());

        let resolved_start = match &start {
            Some(input) => resolve(input, now)?,
            // DateTime::default() is the Unix epoch
            None => DateTime::<Utc>::default(),
        };

        let resolved_end = match &end {
            Some(input) if input.is_now() => now,
            Some(input) => end_of_day(resolve(input, now)?),
            None => end_of_day(now),
        };

        DateRange::new(resolved_start, resolved_end).ok_or_else(|| {
            DateError::Range(DateRangeError {
                start: raw_start,
                end: raw_end,
                resolved_start,
                resolved_end,
            })
        })
    }
}

/// Format a timestamp as its UTC calendar day, `YYYY-MM-DD`.
pub fn format_day(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d").to_string()
}

/// The last representable microsecond of the timestamp's UTC day.
pub fn end_of_day(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.date_naive()
        .and_hms_micro_opt(23, 59, 59, 999_999)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .unwrap_or(ts)
}

/// Midnight UTC of the timestamp's day.
pub fn start_of_day(ts: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(&ts.date_naive().and_time(chrono::NaiveTime::MIN))
}

fn resolve(input: &DateInput, now: DateTime<Utc>) -> Result<DateTime<Utc>, DateParseError> {
    match input {
        DateInput::Timestamp(ts) => Ok(*ts),
        DateInput::Expression(expr) => parse_at(expr, now),
    }
}

fn parse_at(expr: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, DateParseError> {
    let trimmed = expr.trim();
    if trimmed.is_empty() {
        return Err(DateParseError::new(expr, ParseFailure::Empty));
    }
    if trimmed.eq_ignore_ascii_case("now") {
        return Ok(now);
    }
    if TIMEZONE_PATTERN.is_match(trimmed) {
        return Err(DateParseError::new(expr, ParseFailure::TimezoneNotAllowed));
    }
    if let Some(caps) = RELATIVE_PATTERN.captures(trimmed) {
        return parse_relative(&caps[1], &caps[2], now).map_err(|reason| DateParseError::new(expr, reason));
    }
    if let Some(caps) = ABSOLUTE_PATTERN.captures(trimmed) {
        let field = |i: usize| caps.get(i).map(|m| m.as_str());
        return parse_absolute(
            &caps[1],
            &caps[2],
            &caps[3],
            field(4),
            field(5),
            field(6),
        )
        .map_err(|reason| DateParseError::new(expr, reason));
    }
    Err(DateParseError::new(expr, ParseFailure::UnrecognizedFormat))
}

fn parse_relative(magnitude: &str, unit: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, ParseFailure> {
    if magnitude.contains('.') {
        return Err(ParseFailure::InvalidMagnitude);
    }
    let n: i64 = magnitude.parse().map_err(|_| ParseFailure::OutOfRange)?;
    if n <= 0 {
        return Err(ParseFailure::InvalidMagnitude);
    }

    let days_per_unit = match unit {
        "d" => 1,
        "w" => 7,
        "m" => 28,
        "y" => 364,
        other => return Err(ParseFailure::InvalidUnit(other.to_string())),
    };

    n.checked_mul(days_per_unit)
        .and_then(Duration::try_days)
        .and_then(|delta| now.checked_sub_signed(delta))
        .ok_or(ParseFailure::OutOfRange)
}

fn parse_absolute(
    year: &str,
    month: &str,
    day: &str,
    hour: Option<&str>,
    minute: Option<&str>,
    second: Option<&str>,
) -> Result<DateTime<Utc>, ParseFailure> {
    let number = |s: &str| s.parse::<u32>().map_err(|_| ParseFailure::InvalidCalendarDate);

    let year: i32 = year.parse().map_err(|_| ParseFailure::InvalidCalendarDate)?;
    let date = NaiveDate::from_ymd_opt(year, number(month)?, number(day)?)
        .ok_or(ParseFailure::InvalidCalendarDate)?;
    if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return Err(ParseFailure::YearOutOfRange(year));
    }

    let naive: NaiveDateTime = match (hour, minute) {
        (Some(h), Some(m)) => {
            let s = second.map(number).transpose()?.unwrap_or(0);
            date.and_hms_opt(number(h)?, number(m)?, s)
                .ok_or(ParseFailure::InvalidCalendarDate)?
        }
        _ => date.and_time(chrono::NaiveTime::MIN),
    };

    Ok(Utc.from_utc_datetime(&naive))
}
