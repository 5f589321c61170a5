//! Meeting schedule extraction from issue bodies.
//!
//! Call requests are free text written by humans, so the start time and
//! duration have to be pulled out of surrounding markdown. The supported
//! shape is a (usually bracketed) UTC date/time such as
//! `[Jan 16, 2025, 14:00 UTC](https://savvytime.com/...)`, either with an
//! explicit end time (`14:00-15:30 UTC`) or followed by a
//! `Duration in minutes` declaration.
//!
//! Parsing is pure and all-or-nothing: either a full [`ParsedSchedule`] is
//! returned or a [`ScheduleError`] describing which part was missing.

mod template;

pub use template::converter_link;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::Serialize;
use thiserror::Error;

lazy_static! {
    /// Date/time expression, e.g. `[Thu, Jan 16, 2025, 14:00-15:30 UTC]`.
    static ref DATE_TIME_RE: Regex = Regex::new(
        r"(?ix)
        \[?\s*
        (?:\b(?:monday|tuesday|wednesday|thursday|friday|saturday|sunday
               |mon|tues|tue|wed|thurs|thu|fri|sat|sun),?\s+)?
        \b(?P<month>january|february|march|april|may|june|july|august|september
                   |october|november|december
                   |jan|feb|mar|apr|jun|jul|aug|sept|sep|oct|nov|dec)\b
        \s+(?P<day>[0-9]{1,2}),?
        \s+(?P<year>[0-9]{4}),?
        \s+(?P<start_hour>[0-9]{1,2}):(?P<start_minute>[0-9]{2})
        (?:\s*-\s*(?P<end_hour>[0-9]{1,2}):(?P<end_minute>[0-9]{2}))?
        \s*UTC\b
        (?:[\ \t]*(?P<offset>[+-][0-9]{1,2}(?::?[0-9]{2})?))?
        \]?",
    )
    .expect("date/time pattern is valid");

    /// Duration declaration: a labelled value or a bare number on its own line.
    static ref DURATION_RE: Regex = Regex::new(
        r"(?imx)
        (?:duration\s+in\s+minutes\s*:?[\s\-*]*(?P<labeled>[0-9]+))
        |
        (?:^[\ \t]*(?:[-*][\ \t]*)*(?P<bare>[0-9]+)[\ \t]*\r?$)",
    )
    .expect("duration pattern is valid");
}

/// Errors produced while extracting a schedule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("Missing or invalid date/time: {0}")]
    MissingDateTime(String),

    #[error("Invalid calendar date/time: {0}")]
    InvalidDateTime(String),

    #[error("Duration must be positive: {0}")]
    NonPositiveDuration(String),

    #[error("Missing or invalid duration: {0}")]
    MissingDuration(String),
}

/// Tag for each [`ScheduleError`] variant, for callers that only care
/// about which step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleErrorKind {
    MissingDateTime,
    InvalidDateTime,
    NonPositiveDuration,
    MissingDuration,
}

impl ScheduleError {
    pub fn kind(&self) -> ScheduleErrorKind {
        match self {
            ScheduleError::MissingDateTime(_) => ScheduleErrorKind::MissingDateTime,
            ScheduleError::InvalidDateTime(_) => ScheduleErrorKind::InvalidDateTime,
            ScheduleError::NonPositiveDuration(_) => ScheduleErrorKind::NonPositiveDuration,
            ScheduleError::MissingDuration(_) => ScheduleErrorKind::MissingDuration,
        }
    }

    /// Human-readable detail without the kind prefix.
    pub fn detail(&self) -> &str {
        match self {
            ScheduleError::MissingDateTime(d)
            | ScheduleError::InvalidDateTime(d)
            | ScheduleError::NonPositiveDuration(d)
            | ScheduleError::MissingDuration(d) => d,
        }
    }
}

/// A meeting start time (UTC, whole minutes) and its duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ParsedSchedule {
    #[serde(rename = "start_time_utc", serialize_with = "serialize_utc")]
    start_time: DateTime<Utc>,
    duration_minutes: u32,
}

fn serialize_utc<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&format_utc(value))
}

fn format_utc(value: &DateTime<Utc>) -> String {
    value.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

impl ParsedSchedule {
    /// Build a schedule, rejecting a zero duration.
    pub fn new(start_time: DateTime<Utc>, duration_minutes: u32) -> Result<Self, ScheduleError> {
        if duration_minutes == 0 {
            return Err(ScheduleError::NonPositiveDuration(
                "duration of 0 minutes".to_string(),
            ));
        }
        Ok(Self {
            start_time,
            duration_minutes,
        })
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    /// Start time as `YYYY-MM-DDTHH:MM:SSZ`.
    pub fn start_time_utc(&self) -> String {
        format_utc(&self.start_time)
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.start_time + Duration::minutes(i64::from(self.duration_minutes))
    }
}

/// Extract the meeting start time and duration from an issue body.
///
/// The first date/time expression in the text wins. An explicit end time
/// must fall on the same day and after the start; without one, the first
/// duration declaration following the date is used.
pub fn parse_schedule(text: &str) -> Result<ParsedSchedule, ScheduleError> {
    let caps = DATE_TIME_RE
        .captures_iter(text)
        .find(|c| c.name("offset").is_none())
        .ok_or_else(|| {
            ScheduleError::MissingDateTime(
                "expected a UTC date/time like `[Jan 16, 2025, 14:00 UTC]`".to_string(),
            )
        })?;

    let matched = caps.get(0).map(|m| (m.as_str(), m.end())).unwrap_or_default();
    let (expression, expression_end) = matched;

    let month_token = &caps["month"];
    let month = month_number(month_token).ok_or_else(|| {
        ScheduleError::InvalidDateTime(format!("unknown month `{}`", month_token))
    })?;
    let year: i32 = number(&caps, "year")?;
    let day: u32 = number(&caps, "day")?;

    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
        ScheduleError::InvalidDateTime(format!("`{}` is not a valid date", expression.trim()))
    })?;
    let start = utc_on(date, number(&caps, "start_hour")?, number(&caps, "start_minute")?)
        .ok_or_else(|| {
            ScheduleError::InvalidDateTime(format!(
                "`{}` has an invalid start time",
                expression.trim()
            ))
        })?;

    if let (Some(_), Some(_)) = (caps.name("end_hour"), caps.name("end_minute")) {
        let end = utc_on(date, number(&caps, "end_hour")?, number(&caps, "end_minute")?)
            .ok_or_else(|| {
                ScheduleError::InvalidDateTime(format!(
                    "`{}` has an invalid end time",
                    expression.trim()
                ))
            })?;
        if end <= start {
            return Err(ScheduleError::NonPositiveDuration(format!(
                "end time {} is not after start time {}",
                end.format("%H:%M"),
                start.format("%H:%M")
            )));
        }
        let minutes = (end - start).num_seconds() / 60;
        let minutes = u32::try_from(minutes).map_err(|_| {
            ScheduleError::NonPositiveDuration(format!("{} minutes is out of range", minutes))
        })?;
        return ParsedSchedule::new(start, minutes);
    }

    let duration = declared_duration(&text[expression_end..])?;
    ParsedSchedule::new(start, duration)
}

/// Find the first duration declaration in `rest`.
fn declared_duration(rest: &str) -> Result<u32, ScheduleError> {
    let caps = DURATION_RE.captures(rest).ok_or_else(|| {
        ScheduleError::MissingDuration(
            "expected an end time or a `Duration in minutes` value after the date".to_string(),
        )
    })?;
    let raw = caps
        .name("labeled")
        .or_else(|| caps.name("bare"))
        .map(|m| m.as_str())
        .unwrap_or_default();
    let minutes: u32 = raw.parse().map_err(|_| {
        ScheduleError::MissingDuration(format!("`{}` is not a usable number of minutes", raw))
    })?;
    if minutes == 0 {
        return Err(ScheduleError::NonPositiveDuration(
            "declared duration is 0 minutes".to_string(),
        ));
    }
    Ok(minutes)
}

fn utc_on(date: NaiveDate, hour: u32, minute: u32) -> Option<DateTime<Utc>> {
    let naive = date.and_hms_opt(hour, minute, 0)?;
    Some(Utc.from_utc_datetime(&naive))
}

fn number<T: std::str::FromStr>(caps: &Captures<'_>, name: &str) -> Result<T, ScheduleError> {
    let raw = caps.name(name).map(|m| m.as_str()).unwrap_or_default();
    raw.parse()
        .map_err(|_| ScheduleError::InvalidDateTime(format!("`{}` is not a valid {}", raw, name)))
}

/// Month number for an abbreviated or full month name, in any case.
fn month_number(token: &str) -> Option<u32> {
    let lower = token.to_ascii_lowercase();
    let month = match lower.get(..3)? {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}
