//! Randomized coach availability.
//!
//! Slots are generated fresh for every request and never stored, so two calls for the same
//! coach will disagree. Working hours are interpreted in UTC.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeDelta, Utc, Weekday};
use serde::Serialize;

use mock_apis_common::FaultInjector;
use mock_apis_common::utils::serialize_timestamp;

pub const DEFAULT_DAYS: u32 = 7;
pub const MAX_DAYS: u32 = 365;

pub const WORKDAY_START_HOUR: u32 = 9;
pub const WORKDAY_END_HOUR: u32 = 17;
pub const SLOT_STEP_MINUTES: u32 = 15;
pub const SLOT_DURATION_MINUTES: i64 = 30;

/// Probability that any given candidate slot is free.
pub const SLOT_AVAILABILITY: f64 = 0.7;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AvailabilitySlot {
    #[serde(serialize_with = "serialize_timestamp")]
    pub start_time: DateTime<Utc>,
    #[serde(serialize_with = "serialize_timestamp")]
    pub end_time: DateTime<Utc>,
    pub available: bool,
}

/// Interprets the raw `days` query parameter.
///
/// Only the leading integer counts: after optional whitespace and a sign, digits are read
/// until the first non-digit, so `"3x"` is 3 and `"2.5"` is 2. No digits or a zero value
/// falls back to [`DEFAULT_DAYS`], a negative value yields an empty window and anything
/// above [`MAX_DAYS`] is clamped.
pub fn resolve_days(raw: Option<&str>) -> u32 {
    let Some(raw) = raw else {
        return DEFAULT_DAYS;
    };
    let raw = raw.trim_start();
    let (negative, unsigned) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw.strip_prefix('+').unwrap_or(raw)),
    };
    let digits = match unsigned.find(|c: char| !c.is_ascii_digit()) {
        Some(end) => unsigned.split_at(end).0,
        None => unsigned,
    };
    if digits.is_empty() {
        return DEFAULT_DAYS;
    }
    // Only overflow can fail here
    let magnitude = digits.parse::<u32>().unwrap_or(u32::MAX);
    match magnitude {
        0 => DEFAULT_DAYS,
        _ if negative => 0,
        days => days.min(MAX_DAYS),
    }
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Every 15-minute-aligned slot start between 09:00 and 17:00 on `date`.
fn candidate_starts(date: NaiveDate) -> impl Iterator<Item = DateTime<Utc>> {
    (WORKDAY_START_HOUR..WORKDAY_END_HOUR)
        .flat_map(|hour| {
            (0..60)
                .step_by(SLOT_STEP_MINUTES as usize)
                .map(move |minute| (hour, minute))
        })
        .filter_map(move |(hour, minute)| {
            NaiveTime::from_hms_opt(hour, minute, 0).map(|time| date.and_time(time).and_utc())
        })
}

/// Generates the free slots for the `days` calendar days starting at `today`, skipping
/// weekends. Each candidate is kept with probability [`SLOT_AVAILABILITY`].
pub fn generate_slots(
    today: NaiveDate,
    days: u32,
    faults: &FaultInjector,
) -> Vec<AvailabilitySlot> {
    today
        .iter_days()
        .take(days as usize)
        .filter(|date| !is_weekend(*date))
        .flat_map(candidate_starts)
        .filter(|_| faults.chance(SLOT_AVAILABILITY))
        .map(|start_time| AvailabilitySlot {
            start_time,
            end_time: start_time + TimeDelta::minutes(SLOT_DURATION_MINUTES),
            available: true,
        })
        .collect()
}
