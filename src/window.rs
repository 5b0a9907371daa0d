use chrono::{Duration, Months, NaiveDateTime};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;
use tracing::debug;

use crate::config::Config;
use crate::errors::{AnalyzerError, Result};

/// Reporting window. Both bounds are inclusive and `end` is the moment of the
/// request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

fn range_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d+)(\w+)$").expect("range pattern is valid"))
}

/// Turns relative range specifiers ("4w", "2m", "1y") into absolute windows.
#[derive(Debug, Clone)]
pub struct DateWindowResolver {
    default_range: String,
}

impl DateWindowResolver {
    pub fn new(config: &Config) -> Self {
        Self {
            default_range: config.default_range.clone(),
        }
    }

    /// `None` selects the configured default range.
    pub fn resolve(&self, range: Option<&str>, now: NaiveDateTime) -> Result<DateWindow> {
        let range = range.unwrap_or(&self.default_range).trim();
        let start = start_date(range, now)?;
        debug!(
            action = "resolve",
            component = "date_window",
            range,
            start = %start,
            "Resolved date range"
        );
        Ok(DateWindow { start, end: now })
    }
}

/// Subtracts `<n><unit>` from `now`. Units other than w/m/y leave `now`
/// untouched.
pub fn start_date(range: &str, now: NaiveDateTime) -> Result<NaiveDateTime> {
    let captures = range_pattern()
        .captures(range)
        .ok_or_else(|| AnalyzerError::InvalidRange {
            range: range.to_string(),
        })?;

    let out_of_bounds = || AnalyzerError::RangeOutOfBounds {
        range: range.to_string(),
    };
    let amount: u32 = captures[1].parse().map_err(|_| out_of_bounds())?;

    let start = match &captures[2] {
        "w" => Duration::try_weeks(i64::from(amount)).and_then(|d| now.checked_sub_signed(d)),
        "m" => now.checked_sub_months(Months::new(amount)),
        "y" => amount
            .checked_mul(12)
            .and_then(|months| now.checked_sub_months(Months::new(months))),
        _ => Some(now),
    };

    start.ok_or_else(out_of_bounds)
}
