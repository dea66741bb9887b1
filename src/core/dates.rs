use chrono::{NaiveDate, NaiveTime};
use std::fmt::Write;

use crate::core::error::{Result, UsageError};

pub const DEFAULT_ENCODING: &str = "%Y-%m-%d";

/// Parse a date string with a strftime-style `encoding`.
///
/// Time fields in the encoding are accepted and discarded.
pub fn parse_date(input: &str, encoding: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input, encoding).map_err(|_| UsageError::DateFormat {
        input: input.to_string(),
        encoding: encoding.to_string(),
    })
}

/// Format a date with `encoding`, treating any time fields as midnight.
pub fn format_date(date: NaiveDate, encoding: &str) -> Result<String> {
    let mut out = String::new();
    write!(out, "{}", date.and_time(NaiveTime::MIN).format(encoding)).map_err(|_| {
        UsageError::DateFormat {
            input: date.to_string(),
            encoding: encoding.to_string(),
        }
    })?;
    Ok(out)
}

/// Parse both bounds of a range with the same encoding.
pub fn parse_range(start: &str, end: &str, encoding: &str) -> Result<DateRange> {
    Ok(DateRange::new(
        parse_date(start, encoding)?,
        parse_date(end, encoding)?,
    ))
}

/// Inclusive range of calendar days. Empty when `end < start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn len(&self) -> usize {
        if self.end < self.start {
            0
        } else {
            (self.end - self.start).num_days() as usize + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> DateIter {
        DateIter {
            next: (self.start <= self.end).then_some(self.start),
            end: self.end,
        }
    }
}

impl IntoIterator for &DateRange {
    type Item = NaiveDate;
    type IntoIter = DateIter;

    fn into_iter(self) -> DateIter {
        self.iter()
    }
}

#[derive(Debug, Clone)]
pub struct DateIter {
    next: Option<NaiveDate>,
    end: NaiveDate,
}

impl Iterator for DateIter {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        let current = self.next?;
        self.next = current.succ_opt().filter(|d| *d <= self.end);
        Some(current)
    }
}
