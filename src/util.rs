//! Extra utilities for use elsewhere in the console.

use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

use crate::error::{ConsoleError, ConsoleResult};

/// The host's local offset, falling back to UTC when it can't be determined.
pub fn local_offset() -> UtcOffset {
    UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)
}

pub fn current_time() -> OffsetDateTime {
    OffsetDateTime::now_utc().to_offset(local_offset())
}

/// "Monday, January 1, 2024"
pub fn format_long_date(time: OffsetDateTime) -> String {
    let format = format_description!("[weekday], [month repr:long] [day padding:none], [year]");
    time.to_offset(local_offset())
        .format(&format)
        .unwrap_or_default()
}

/// "January 1, 2024"
pub fn format_date(time: OffsetDateTime) -> String {
    let format = format_description!("[month repr:long] [day padding:none], [year]");
    time.to_offset(local_offset())
        .format(&format)
        .unwrap_or_default()
}

/// "09:30 AM"
pub fn format_clock(time: OffsetDateTime) -> String {
    let format = format_description!("[hour repr:12]:[minute] [period]");
    time.format(&format).unwrap_or_default()
}

/// "2024-01-01", as used by date pickers and the calendar.
pub fn format_iso_date(date: Date) -> String {
    let format = format_description!("[year]-[month]-[day]");
    date.format(&format).unwrap_or_default()
}

pub fn parse_iso_date(input: &str) -> ConsoleResult<Date> {
    let format = format_description!("[year]-[month]-[day]");
    Date::parse(input.trim(), &format)
        .map_err(|err| ConsoleError::InvalidTimestamp(format!("{}: {}", input, err)))
}

/// Parses the value of a date or datetime form input.
///
/// Accepts `YYYY-MM-DD` (midnight), `YYYY-MM-DDTHH:MM[:SS]` in the host's
/// local offset, or a full RFC 3339 timestamp.
pub fn parse_form_datetime(input: &str) -> ConsoleResult<OffsetDateTime> {
    let input = input.trim();
    let invalid = || ConsoleError::InvalidTimestamp(input.to_owned());

    if let Ok(time) = OffsetDateTime::parse(input, &Rfc3339) {
        return Ok(time);
    }

    let with_seconds = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
    let without_seconds = format_description!("[year]-[month]-[day]T[hour]:[minute]");
    let local = PrimitiveDateTime::parse(input, &with_seconds)
        .or_else(|_| PrimitiveDateTime::parse(input, &without_seconds))
        .or_else(|_| parse_iso_date(input).map(|date| date.with_time(Time::MIDNIGHT)))
        .map_err(|_| invalid())?;

    Ok(local.assume_offset(local_offset()))
}

/// The staff greeting for a given hour of the day.
pub fn greeting_for_hour(hour: u8) -> &'static str {
    if hour < 12 {
        "Good Morning"
    } else if hour < 18 {
        "Good Afternoon"
    } else {
        "Good Evening"
    }
}
