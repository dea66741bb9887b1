use colored::{control, Colorize};

use crate::core::aggregate::ModelTotals;
use crate::core::formatter::format_count;
use crate::core::models::report::UsageReport;

const HEADERS: [&str; 3] = ["Snapshot ID", "Prompt Tokens", "Completion Tokens"];

/// Render per-snapshot totals as a box-drawn table.
///
/// Layout:
/// ```text
/// ┌─────────────┬───────────────┬───────────────────┐
/// │ Snapshot ID │ Prompt Tokens │ Completion Tokens │
/// ├─────────────┼───────────────┼───────────────────┤
/// │ gpt-4-0314  │        15,000 │             3,100 │
/// ├─────────────┼───────────────┼───────────────────┤
/// │ Total       │        15,000 │             3,100 │
/// └─────────────┴───────────────┴───────────────────┘
/// ```
pub fn render_table(totals: &ModelTotals, use_color: bool) -> String {
    control::set_override(use_color);

    let rows: Vec<[String; 3]> = totals
        .rows()
        .map(|(id, tokens)| {
            [
                id.to_string(),
                format_count(tokens.prompt),
                format_count(tokens.completion),
            ]
        })
        .collect();
    let total = totals.total();
    let footer = [
        "Total".to_string(),
        format_count(total.prompt),
        format_count(total.completion),
    ];

    let mut widths: [usize; 3] = HEADERS.map(|h| h.chars().count());
    for row in rows.iter().chain(std::iter::once(&footer)) {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let mut lines: Vec<String> = Vec::with_capacity(rows.len() + 6);
    lines.push(border(&widths, '┌', '┬', '┐'));
    lines.push(row_line(&widths, &HEADERS.map(String::from), |s| {
        s.bold().cyan().to_string()
    }));
    lines.push(border(&widths, '├', '┼', '┤'));
    for row in &rows {
        lines.push(row_line(&widths, row, |s| s.to_string()));
    }
    if !rows.is_empty() {
        lines.push(border(&widths, '├', '┼', '┤'));
    }
    lines.push(row_line(&widths, &footer, |s| s.bold().to_string()));
    lines.push(border(&widths, '└', '┴', '┘'));

    lines.join("\n")
}

fn border(widths: &[usize; 3], left: char, mid: char, right: char) -> String {
    let segments: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
    format!("{}{}{}", left, segments.join(mid.to_string().as_str()), right)
}

/// The first column is left-aligned, numeric columns right-aligned.
/// Padding happens before styling so ANSI codes never skew widths.
fn row_line(widths: &[usize; 3], cells: &[String; 3], style: impl Fn(&str) -> String) -> String {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .enumerate()
        .map(|(i, (cell, w))| {
            let text = if i == 0 {
                format!("{:<width$}", cell, width = *w)
            } else {
                format!("{:>width$}", cell, width = *w)
            };
            format!(" {} ", style(&text))
        })
        .collect();
    format!("│{}│", padded.join("│"))
}

pub fn render_json(report: &UsageReport, pretty: bool) -> serde_json::Result<String> {
    if pretty {
        serde_json::to_string_pretty(report)
    } else {
        serde_json::to_string(report)
    }
}
