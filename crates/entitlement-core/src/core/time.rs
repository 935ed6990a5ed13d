// crates/entitlement-core/src/core/time.rs
// ============================================================================
// Module: Entitlement Time Model
// Description: Calendar date parsing, formatting, and temporal built-ins.
// Purpose: Keep reference-date handling deterministic and caller supplied.
// Dependencies: serde, serde_json, time
// ============================================================================

//! ## Overview
//! Every evaluation runs "as of" a caller-supplied reference date. The engine
//! never reads the wall clock. Dates travel through rules and traces as ISO
//! `YYYY-MM-DD` strings, and a small set of temporal symbols derived from the
//! reference date is always resolvable.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Deserializer;
use serde::de::Error as _;
use serde_json::Value;
use time::Date;
use time::Month;

// ============================================================================
// SECTION: Temporal Built-ins
// ============================================================================

/// Symbol for the reference date itself.
pub const CALCULATION_DATE: &str = "calculation_date";
/// Symbol for January 1st of the reference year.
pub const JANUARY_FIRST: &str = "january_first";
/// Symbol for January 1st of the year before the reference year.
pub const PREV_JANUARY_FIRST: &str = "prev_january_first";
/// Symbol for the reference year as an integer.
pub const YEAR: &str = "year";

/// Resolves a temporal built-in symbol against the reference date.
///
/// Returns `None` when `name` is not a temporal built-in.
#[must_use]
pub fn temporal_builtin(name: &str, reference_date: Date) -> Option<Value> {
    let year = reference_date.year();
    match name {
        CALCULATION_DATE => Some(Value::String(format_iso_date(reference_date))),
        JANUARY_FIRST => january_first(year).map(|date| Value::String(format_iso_date(date))),
        PREV_JANUARY_FIRST => {
            january_first(year - 1).map(|date| Value::String(format_iso_date(date)))
        }
        YEAR => Some(Value::from(year)),
        _ => None,
    }
}

/// Returns January 1st of `year`, if representable.
fn january_first(year: i32) -> Option<Date> {
    Date::from_calendar_date(year, Month::January, 1).ok()
}

// ============================================================================
// SECTION: Parsing and Formatting
// ============================================================================

/// Parses an ISO `YYYY-MM-DD` calendar date.
///
/// The year must have four digits and month and day two, so codes such as
/// `1-2-3` are not mistaken for dates. A trailing time component
/// (`YYYY-MM-DDThh:mm:ss...`) is ignored so that timestamps supplied by
/// attribute sources compare by their date.
#[must_use]
pub fn parse_iso_date(value: &str) -> Option<Date> {
    let date_part = value.split_once('T').map_or(value, |(date, _)| date);
    let mut parts = date_part.split('-');
    let year: i32 = fixed_digits(parts.next()?, 4)?;
    let month: u8 = fixed_digits(parts.next()?, 2)?;
    let day: u8 = fixed_digits(parts.next()?, 2)?;
    if parts.next().is_some() {
        return None;
    }
    let month = Month::try_from(month).ok()?;
    Date::from_calendar_date(year, month, day).ok()
}

/// Parses a date component of exactly `width` ASCII digits.
fn fixed_digits<T: std::str::FromStr>(part: &str, width: usize) -> Option<T> {
    if part.len() != width || !part.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}

/// Formats a date as ISO `YYYY-MM-DD`.
#[must_use]
pub fn format_iso_date(date: Date) -> String {
    format!("{:04}-{:02}-{:02}", date.year(), u8::from(date.month()), date.day())
}

// ============================================================================
// SECTION: Serde Adapters
// ============================================================================

/// Deserializes an ISO date string into a [`Date`].
///
/// # Errors
///
/// Returns a deserialization error when the string is not a valid calendar date.
pub fn deserialize_date<'de, D>(deserializer: D) -> Result<Date, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    parse_iso_date(&text).ok_or_else(|| D::Error::custom(format!("invalid date: {text}")))
}
