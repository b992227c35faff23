use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::listing::config::SortKind;
use crate::models::entity::scalar_text;

const NAIVE_DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Milliseconds since the epoch for date-like strings. Offsets are honored;
/// naive values are read as UTC.
pub fn timestamp(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_millis());
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
}

/// Numeric reading of a JSON number or a numeric string.
pub fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

/// Case-folded comparison with the raw text as tie-break, so the order stays
/// total while "ahmed" and "Ahmed" sit next to each other.
pub fn text_cmp(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Precomputed sort key for one value. Variants order as numbers, then
/// timestamps, then text, which keeps mixed columns totally ordered.
#[derive(Debug, Clone, PartialEq)]
pub enum SortKey {
    Number(f64),
    Time(i64),
    Text(String),
}

impl SortKey {
    pub fn of(value: &Value, kind: Option<SortKind>) -> Self {
        let text = || scalar_text(value).unwrap_or_else(|| value.to_string());
        match kind {
            Some(SortKind::Number) => number(value)
                .map(Self::Number)
                .unwrap_or_else(|| Self::Text(text())),
            Some(SortKind::Date) => value
                .as_str()
                .and_then(timestamp)
                .map(Self::Time)
                .unwrap_or_else(|| Self::Text(text())),
            Some(SortKind::Text) => Self::Text(text()),
            None => match value {
                Value::Number(n) => n
                    .as_f64()
                    .map(Self::Number)
                    .unwrap_or_else(|| Self::Text(text())),
                Value::String(s) => timestamp(s)
                    .map(Self::Time)
                    .unwrap_or_else(|| Self::Text(s.clone())),
                _ => Self::Text(text()),
            },
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Number(_) => 0,
            Self::Time(_) => 1,
            Self::Text(_) => 2,
        }
    }

    pub fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            (Self::Time(a), Self::Time(b)) => a.cmp(b),
            (Self::Text(a), Self::Text(b)) => text_cmp(a, b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// Which end of an inclusive range a bound sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundSide {
    Min,
    Max,
}

/// Compares a field value against a range bound. Numbers compare numerically,
/// date-like strings as timestamps, anything else lexically. A date-only max
/// covers its whole day. `None` when the value is not a scalar.
pub fn cmp_to_bound(value: &Value, bound: &str, side: BoundSide) -> Option<Ordering> {
    if let (Some(a), Ok(b)) = (number(value), bound.trim().parse::<f64>()) {
        return Some(a.total_cmp(&b));
    }
    let text = scalar_text(value)?;
    let limit = match side {
        BoundSide::Max => day_end(bound).or_else(|| timestamp(bound)),
        BoundSide::Min => timestamp(bound),
    };
    if let (Some(a), Some(b)) = (timestamp(&text), limit) {
        return Some(a.cmp(&b));
    }
    Some(text.as_str().cmp(bound))
}

/// Last millisecond of a bare `YYYY-MM-DD` day.
fn day_end(raw: &str) -> Option<i64> {
    let day = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()?;
    let next = day.succ_opt()?.and_hms_opt(0, 0, 0)?;
    Some(next.and_utc().timestamp_millis() - 1)
}
