use std::borrow::Cow;
use std::path::{Path, PathBuf};

use crate::core::aggregate::DailyTotals;
use crate::core::dates::DateRange;
use crate::core::error::{Result, UsageError};

/// `tokens_usage_<start>_<end>.csv`, dates always as `%Y-%m-%d`.
pub fn csv_filename(range: &DateRange) -> String {
    format!(
        "tokens_usage_{}_{}.csv",
        range.start().format("%Y-%m-%d"),
        range.end().format("%Y-%m-%d")
    )
}

/// One row per day: the day label, each snapshot's prompt and completion
/// for that day, then the day's own totals.
pub fn render_csv(daily: &DailyTotals) -> String {
    let ids: Vec<&str> = daily.snapshot_ids().collect();

    let mut header: Vec<Cow<str>> = vec![Cow::Borrowed("day")];
    for id in &ids {
        header.push(Cow::Owned(format!("{}_prompt", id)));
        header.push(Cow::Owned(format!("{}_completion", id)));
    }
    header.push(Cow::Borrowed("total_prompt"));
    header.push(Cow::Borrowed("total_completion"));

    let mut out = String::new();
    push_row(&mut out, header.iter().map(|h| &**h));

    for day in daily.days() {
        let mut row: Vec<String> = Vec::with_capacity(ids.len() * 2 + 3);
        row.push(day.label.clone());
        for id in &ids {
            let tokens = day.buckets.get(id);
            row.push(tokens.prompt.to_string());
            row.push(tokens.completion.to_string());
        }
        let total = daily.day_total(day);
        row.push(total.prompt.to_string());
        row.push(total.completion.to_string());
        push_row(&mut out, row.iter().map(String::as_str));
    }
    out
}

/// Write the CSV into `dir`, returning the full path.
pub fn write_csv(daily: &DailyTotals, range: &DateRange, dir: &Path) -> Result<PathBuf> {
    let path = dir.join(csv_filename(range));
    std::fs::write(&path, render_csv(daily)).map_err(|source| UsageError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(path)
}

fn push_row<'a>(out: &mut String, fields: impl Iterator<Item = &'a str>) {
    for (i, field) in fields.enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&escape_field(field));
    }
    out.push_str("\r\n");
}

fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}
