use std::time::Duration;

/// Returns the count with comma thousands separators, e.g. "1,234,567".
pub fn format_count(count: u64) -> String {
    let digits = count.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Returns "1.2M", "3.4K" or the plain count below a thousand.
pub fn format_compact(count: u64) -> String {
    if count >= 1_000_000 {
        format!("{:.1}M", count as f64 / 1_000_000.0)
    } else if count >= 1_000 {
        format!("{:.1}K", count as f64 / 1_000.0)
    } else {
        format!("{}", count)
    }
}

/// Returns "2.5s".
pub fn format_secs(duration: Duration) -> String {
    format!("{:.1}s", duration.as_secs_f64())
}
