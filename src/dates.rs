//! Date formats and splitting of sync ranges into query windows.
//!
//! Upwork's report endpoints return oversized result sets for long
//! ranges, so a sync run walks the requested range one window at a time.

use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// Format used in invoice titles (`Jan 08, 2024`).
pub const HUMAN_DATE_FORMAT: &str = "%b %d, %Y";

/// Format of the dates embedded in Upwork descriptions (`01/08/2024`).
pub const DESCRIPTION_DATE_FORMAT: &str = "%m/%d/%Y";

/// ISO format used for queries and configuration (`2024-01-08`).
pub const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

/// An inclusive range of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    /// First day (inclusive).
    pub start: NaiveDate,
    /// Last day (inclusive).
    pub end: NaiveDate,
}

impl DateRange {
    /// Creates a range; callers are expected to pass `start <= end`.
    #[inline]
    #[must_use]
    pub const fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Resolves optional boundaries against `today`.
    ///
    /// `end` defaults to `today` and `start` to the first day of
    /// `today`'s month. Reversed boundaries are swapped with a warning.
    #[must_use]
    pub fn resolve(start: Option<NaiveDate>, end: Option<NaiveDate>, today: NaiveDate) -> Self {
        let end = end.unwrap_or(today);
        let start = start.unwrap_or_else(|| first_of_month(today));
        if start > end {
            tracing::warn!(
                start = %start,
                end = %end,
                "sync start is after sync end, swapping them"
            );
            Self::new(end, start)
        } else {
            Self::new(start, end)
        }
    }

    /// Returns `true` if `date` falls inside the range.
    #[inline]
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

impl core::fmt::Display for DateRange {
    #[inline]
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Maximum size of a single query window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowSpan {
    /// A fixed number of days.
    Days(u32),
    /// A number of calendar months, aligned to month boundaries.
    Months(u32),
}

impl Default for WindowSpan {
    #[inline]
    fn default() -> Self {
        Self::Months(1)
    }
}

impl WindowSpan {
    /// Last day of the window that begins on `start`.
    ///
    /// A span of zero is treated as one unit.
    fn window_end(self, start: NaiveDate) -> NaiveDate {
        let end = match self {
            Self::Days(days) => {
                start.checked_add_days(Days::new(u64::from(days.max(1).saturating_sub(1))))
            }
            Self::Months(months) => first_of_month(start)
                .checked_add_months(Months::new(months.max(1)))
                .and_then(|next| next.pred_opt()),
        };
        end.unwrap_or(NaiveDate::MAX)
    }
}

/// Splits `range` into contiguous, non-overlapping windows.
///
/// The first window starts at `range.start` and the last ends exactly at
/// `range.end`. A single-day range yields one window.
#[must_use]
pub fn split(range: DateRange, span: WindowSpan) -> Vec<DateRange> {
    let mut windows = Vec::new();
    let mut cursor = range.start;
    loop {
        let end = span.window_end(cursor).min(range.end);
        windows.push(DateRange::new(cursor, end));
        if end >= range.end {
            break;
        }
        match end.succ_opt() {
            Some(next) => cursor = next,
            None => break,
        }
    }
    windows
}

/// First day of the month containing `date`.
#[must_use]
pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Formats a date for invoice titles.
#[inline]
#[must_use]
pub fn human(date: NaiveDate) -> String {
    date.format(HUMAN_DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn assert_contiguous(range: DateRange, windows: &[DateRange]) {
        assert!(!windows.is_empty());
        assert_eq!(windows.first().unwrap().start, range.start);
        assert_eq!(windows.last().unwrap().end, range.end);
        for pair in windows.windows(2) {
            let (prev, next) = (pair[0], pair[1]);
            assert!(prev.start <= prev.end);
            assert_eq!(prev.end.succ_opt().unwrap(), next.start);
        }
    }

    #[test]
    fn splits_by_calendar_month() {
        let range = DateRange::new(date(2024, 1, 5), date(2024, 3, 10));
        let windows = split(range, WindowSpan::Months(1));
        assert_eq!(
            windows,
            vec![
                DateRange::new(date(2024, 1, 5), date(2024, 1, 31)),
                DateRange::new(date(2024, 2, 1), date(2024, 2, 29)),
                DateRange::new(date(2024, 3, 1), date(2024, 3, 10)),
            ]
        );
        assert_contiguous(range, &windows);
    }

    #[test]
    fn splits_by_days() {
        let range = DateRange::new(date(2024, 1, 1), date(2024, 1, 10));
        let windows = split(range, WindowSpan::Days(4));
        assert_eq!(
            windows,
            vec![
                DateRange::new(date(2024, 1, 1), date(2024, 1, 4)),
                DateRange::new(date(2024, 1, 5), date(2024, 1, 8)),
                DateRange::new(date(2024, 1, 9), date(2024, 1, 10)),
            ]
        );
    }

    #[test]
    fn multi_month_windows() {
        let range = DateRange::new(date(2023, 11, 15), date(2024, 4, 2));
        let windows = split(range, WindowSpan::Months(3));
        assert_eq!(
            windows,
            vec![
                DateRange::new(date(2023, 11, 15), date(2024, 1, 31)),
                DateRange::new(date(2024, 2, 1), date(2024, 4, 2)),
            ]
        );
    }

    #[test]
    fn single_day_yields_one_window() {
        let day = date(2024, 5, 17);
        let windows = split(DateRange::new(day, day), WindowSpan::Months(1));
        assert_eq!(windows, vec![DateRange::new(day, day)]);
    }

    #[test]
    fn zero_span_is_one_unit() {
        let range = DateRange::new(date(2024, 1, 1), date(2024, 1, 3));
        assert_eq!(split(range, WindowSpan::Days(0)).len(), 3);
    }

    #[test]
    fn resolve_defaults_to_current_month() {
        let today = date(2024, 6, 18);
        let range = DateRange::resolve(None, None, today);
        assert_eq!(range, DateRange::new(date(2024, 6, 1), today));
    }

    #[test]
    fn resolve_keeps_explicit_bounds() {
        let range = DateRange::resolve(
            Some(date(2024, 1, 5)),
            Some(date(2024, 3, 10)),
            date(2024, 6, 18),
        );
        assert_eq!(range, DateRange::new(date(2024, 1, 5), date(2024, 3, 10)));
    }

    #[test]
    fn resolve_swaps_reversed_bounds() {
        let (range, warnings) = crate::testing::count_warnings(|| {
            DateRange::resolve(
                Some(date(2024, 3, 10)),
                Some(date(2024, 1, 5)),
                date(2024, 6, 18),
            )
        });
        assert_eq!(range, DateRange::new(date(2024, 1, 5), date(2024, 3, 10)));
        assert_eq!(warnings, 1);
    }

    #[test]
    fn resolve_in_order_does_not_warn() {
        let (_range, warnings) = crate::testing::count_warnings(|| {
            DateRange::resolve(Some(date(2024, 1, 5)), None, date(2024, 6, 18))
        });
        assert_eq!(warnings, 0);
    }

    #[test]
    fn human_format() {
        assert_eq!(human(date(2024, 1, 8)), "Jan 08, 2024");
    }

    #[test]
    fn window_span_from_toml_style_json() {
        let span: WindowSpan = serde_json::from_str(r#"{"months": 2}"#).unwrap();
        assert_eq!(span, WindowSpan::Months(2));
        let span: WindowSpan = serde_json::from_str(r#"{"days": 7}"#).unwrap();
        assert_eq!(span, WindowSpan::Days(7));
    }
}
