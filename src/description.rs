//! Parser for the fixed-format descriptions Upwork puts on hourly
//! invoices.
//!
//! The grammar is
//! `(<activity>) <task> - <H>:<MM> hrs @ $<rate>/hr - <MM/DD/YYYY> - <MM/DD/YYYY>`.
//! Anything that does not fit yields `None`; callers fall back to a
//! single-unit line item.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::dates::{self, DESCRIPTION_DATE_FORMAT};

/// Compiled description grammar.
#[allow(clippy::expect_used, reason = "the pattern is a constant")]
static DESCRIPTION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\((.+)\) (.+?) - (\d{1,2}):(\d{2})\s*hrs @ \$([^/]*)/hr - ([\d/-]+) - ([\d/-]+)$",
    )
    .expect("description pattern compiles")
});

/// Structured fields extracted from a description.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDescription {
    /// Activity in parentheses, e.g. `Design`.
    pub activity: String,
    /// Task label.
    pub task: String,
    /// Whole hours worked.
    pub hours: u32,
    /// Remaining minutes worked.
    pub minutes: u32,
    /// Hourly rate.
    pub unit_price: f64,
    /// First day of the billed period.
    pub range_start: NaiveDate,
    /// Last day of the billed period.
    pub range_end: NaiveDate,
}

impl ParsedDescription {
    /// Fractional hours worked, `hours + minutes / 60`.
    #[inline]
    #[must_use]
    pub fn quantity(&self) -> f64 {
        f64::from(self.hours) + f64::from(self.minutes) / 60.0
    }

    /// Invoice title for the billed period.
    #[must_use]
    pub fn title(&self) -> String {
        format!(
            "Week of {} to {}",
            dates::human(self.range_start),
            dates::human(self.range_end)
        )
    }

    /// Line item description, `<activity> - <task>`.
    #[must_use]
    pub fn line_description(&self) -> String {
        format!("{} - {}", self.activity, self.task)
    }
}

/// Parses `description`, returning `None` when it does not follow the
/// grammar, the minutes are 60 or more, or a number or date in it does
/// not convert.
#[must_use]
pub fn parse(description: &str) -> Option<ParsedDescription> {
    let caps = DESCRIPTION_PATTERN.captures(description.trim())?;
    let text = |idx: usize| caps.get(idx).map(|m| m.as_str());

    let minutes = text(4)?.parse::<u32>().ok().filter(|mins| *mins < 60)?;
    let unit_price = text(5)?.trim().replace(',', "").parse::<f64>().ok()?;
    Some(ParsedDescription {
        activity: text(1)?.to_owned(),
        task: text(2)?.to_owned(),
        hours: text(3)?.parse().ok()?,
        minutes,
        unit_price,
        range_start: NaiveDate::parse_from_str(text(6)?, DESCRIPTION_DATE_FORMAT).ok()?,
        range_end: NaiveDate::parse_from_str(text(7)?, DESCRIPTION_DATE_FORMAT).ok()?,
    })
}
