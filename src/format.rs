use std::cmp::Ordering;

use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};

use crate::record::TaskState;

pub const UNKNOWN: &str = "unknown";
pub const EMPTY_SENTINEL: &str = "-";

pub const DATE_FORMAT: &str = "%-m/%-d/%Y";
pub const TIME_FORMAT: &str = "%H:%M:%S";
const DATE_TIME_FORMAT: &str = "%-m/%-d/%Y %H:%M:%S";

/// Time zone used to turn epoch milliseconds into wall clock values.
///
/// `Local` resolves the offset per instant, so timestamps on either side of a
/// daylight saving change each get their own offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    Local,
    Fixed(FixedOffset),
}

impl Locale {
    pub fn local() -> Self {
        Locale::Local
    }

    pub fn utc() -> Self {
        Locale::Fixed(Utc.fix())
    }

    pub fn with_offset_minutes(minutes: i32) -> Option<Self> {
        FixedOffset::east_opt(minutes.checked_mul(60)?).map(Locale::Fixed)
    }

    pub fn wall_clock(&self, millis: i64) -> Option<NaiveDateTime> {
        match self {
            Locale::Local => wall_clock_in(&Local, millis),
            Locale::Fixed(offset) => wall_clock_in(offset, millis),
        }
    }
}

fn wall_clock_in<Tz: TimeZone>(tz: &Tz, millis: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(millis).map(|dt| dt.with_timezone(tz).naive_local())
}

/// The raw value of one cell, before display formatting. Filters and sorting
/// operate on this, never on the rendered string.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Timestamp(NaiveDateTime),
}

impl CellValue {
    pub fn text(s: impl Into<String>) -> Self {
        CellValue::Text(s.into())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Total order used for column sorting: empty cells first, then
    /// timestamps chronologically, then text lexically.
    pub fn sort_cmp(&self, other: &CellValue) -> Ordering {
        fn rank(v: &CellValue) -> u8 {
            match v {
                CellValue::Empty => 0,
                CellValue::Timestamp(_) => 1,
                CellValue::Text(_) => 2,
            }
        }
        match (self, other) {
            (CellValue::Timestamp(a), CellValue::Timestamp(b)) => a.cmp(b),
            (CellValue::Text(a), CellValue::Text(b)) => a.cmp(b),
            _ => rank(self).cmp(&rank(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayFormat {
    Verbatim,
    Date,
    Time,
}

pub fn display(value: &CellValue, format: DisplayFormat) -> String {
    match value {
        CellValue::Empty => String::new(),
        CellValue::Text(s) => s.clone(),
        CellValue::Timestamp(ts) => match format {
            DisplayFormat::Date => format_date(ts),
            DisplayFormat::Time => format_time(ts),
            DisplayFormat::Verbatim => ts.format(DATE_TIME_FORMAT).to_string(),
        },
    }
}

pub fn format_date(ts: &NaiveDateTime) -> String {
    ts.format(DATE_FORMAT).to_string()
}

pub fn format_time(ts: &NaiveDateTime) -> String {
    ts.format(TIME_FORMAT).to_string()
}

/// Parse a date rendered by [`format_date`] back into midnight of that day.
pub fn parse_date(s: &str) -> Option<NaiveDateTime> {
    NaiveDate::parse_from_str(s.trim(), "%m/%d/%Y")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Accessor signature shared by every column.
pub type Accessor = fn(&TaskState, &Locale) -> CellValue;

pub fn task_id(task: &TaskState, _locale: &Locale) -> CellValue {
    CellValue::text(task.booking.id.as_str())
}

pub fn category(task: &TaskState, _locale: &Locale) -> CellValue {
    match &task.category {
        Some(c) => CellValue::text(c.as_str()),
        None => CellValue::Empty,
    }
}

pub fn assignee(task: &TaskState, _locale: &Locale) -> CellValue {
    match &task.assigned_to {
        Some(a) => CellValue::text(a.name.as_str()),
        None => CellValue::text(UNKNOWN),
    }
}

pub fn start_time(task: &TaskState, locale: &Locale) -> CellValue {
    timestamp_or(task.unix_millis_start_time, locale, UNKNOWN)
}

pub fn finish_time(task: &TaskState, locale: &Locale) -> CellValue {
    timestamp_or(task.unix_millis_finish_time, locale, EMPTY_SENTINEL)
}

pub fn status(task: &TaskState, _locale: &Locale) -> CellValue {
    match task.status.as_deref() {
        Some(s) if !s.is_empty() => CellValue::text(s),
        _ => CellValue::text(UNKNOWN),
    }
}

// A zero timestamp counts as missing, the backend uses it for "not set".
fn timestamp_or(millis: Option<i64>, locale: &Locale, default: &str) -> CellValue {
    millis
        .filter(|&ms| ms != 0)
        .and_then(|ms| locale.wall_clock(ms))
        .map(CellValue::Timestamp)
        .unwrap_or_else(|| CellValue::text(default))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Assignee;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    #[test]
    fn missing_fields_fall_back_to_sentinels() {
        let task = TaskState::new("booking-1");
        let locale = Locale::utc();

        assert_eq!(assignee(&task, &locale), CellValue::text("unknown"));
        assert_eq!(start_time(&task, &locale), CellValue::text("unknown"));
        assert_eq!(finish_time(&task, &locale), CellValue::text("-"));
        assert_eq!(status(&task, &locale), CellValue::text("unknown"));
        assert_eq!(category(&task, &locale), CellValue::Empty);
        assert_eq!(task_id(&task, &locale), CellValue::text("booking-1"));
    }

    #[test]
    fn present_fields_are_resolved() {
        let task = TaskState {
            category: Some("clean".into()),
            assigned_to: Some(Assignee {
                name: "tinyRobot1".into(),
            }),
            // 2024-03-05 14:07:09 UTC
            unix_millis_start_time: Some(1_709_647_629_000),
            unix_millis_finish_time: Some(1_709_647_629_000),
            status: Some("underway".into()),
            ..TaskState::new("b")
        };
        let locale = Locale::utc();

        assert_eq!(category(&task, &locale), CellValue::text("clean"));
        assert_eq!(assignee(&task, &locale), CellValue::text("tinyRobot1"));
        assert_eq!(
            start_time(&task, &locale),
            CellValue::Timestamp(at(2024, 3, 5, 14, 7, 9))
        );
        assert_eq!(
            display(&finish_time(&task, &locale), DisplayFormat::Time),
            "14:07:09"
        );
        assert_eq!(
            display(&start_time(&task, &locale), DisplayFormat::Date),
            "3/5/2024"
        );
    }

    #[test]
    fn zero_timestamp_counts_as_missing() {
        let mut task = TaskState::new("b");
        task.unix_millis_finish_time = Some(0);
        assert_eq!(finish_time(&task, &Locale::utc()), CellValue::text("-"));
    }

    #[test]
    fn locale_offset_shifts_wall_clock() {
        let plus_two = Locale::with_offset_minutes(120).unwrap();
        assert_eq!(plus_two.wall_clock(0), Some(at(1970, 1, 1, 2, 0, 0)));
        assert!(Locale::with_offset_minutes(24 * 60).is_none());
    }

    #[test]
    fn local_wall_clock_follows_daylight_saving() {
        // SAFETY: no other test reads TZ, every other locale in the tests is fixed.
        unsafe { std::env::set_var("TZ", "Europe/Berlin") };
        let local = Locale::local();

        // 2024-01-01 22:30 UTC is CET (+01:00), still the first of January.
        let winter = 1_704_148_200_000;
        assert_eq!(local.wall_clock(winter), Some(at(2024, 1, 1, 23, 30, 0)));
        // 2024-07-01 22:30 UTC is CEST (+02:00), already the second of July.
        let summer = 1_719_873_000_000;
        assert_eq!(local.wall_clock(summer), Some(at(2024, 7, 2, 0, 30, 0)));

        let task = TaskState {
            unix_millis_start_time: Some(winter),
            ..TaskState::new("b")
        };
        assert_eq!(display(&start_time(&task, &local), DisplayFormat::Date), "1/1/2024");
    }

    #[test]
    fn empty_cells_display_as_blank() {
        assert_eq!(display(&CellValue::Empty, DisplayFormat::Date), "");
        assert_eq!(display(&CellValue::text("-"), DisplayFormat::Time), "-");
    }

    #[test]
    fn parse_date_reads_display_format() {
        assert_eq!(parse_date("3/5/2024"), Some(at(2024, 3, 5, 0, 0, 0)));
        assert_eq!(parse_date("unknown"), None);
    }

    #[test]
    fn sort_order_puts_empty_first() {
        let mut values = vec![
            CellValue::text("b"),
            CellValue::Timestamp(at(2024, 1, 2, 0, 0, 0)),
            CellValue::Empty,
            CellValue::text("a"),
            CellValue::Timestamp(at(2024, 1, 1, 0, 0, 0)),
        ];
        values.sort_by(|a, b| a.sort_cmp(b));
        assert_eq!(
            values,
            vec![
                CellValue::Empty,
                CellValue::Timestamp(at(2024, 1, 1, 0, 0, 0)),
                CellValue::Timestamp(at(2024, 1, 2, 0, 0, 0)),
                CellValue::text("a"),
                CellValue::text("b"),
            ]
        );
    }
}
