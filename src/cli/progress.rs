use std::io::{IsTerminal, StderrLock, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing_subscriber::fmt::MakeWriter;

const CLEAR_LINE: &str = "\r\x1b[2K";

/// Set while a progress line sits on stderr without a trailing newline.
static LINE_PENDING: AtomicBool = AtomicBool::new(false);

/// Single-line `[i/n] Fetching <day>` indicator on stderr.
///
/// Does nothing unless stderr is a terminal, so piped runs and JSON output
/// stay clean.
pub struct Progress {
    total: usize,
    enabled: bool,
}

impl Progress {
    pub fn new(total: usize, wanted: bool) -> Self {
        Self {
            total,
            enabled: wanted && std::io::stderr().is_terminal(),
        }
    }

    pub fn update(&self, position: usize, label: &str) {
        if !self.enabled {
            return;
        }
        let mut stderr = std::io::stderr().lock();
        let _ = write!(stderr, "{}{}", CLEAR_LINE, line(position, self.total, label));
        let _ = stderr.flush();
        LINE_PENDING.store(true, Ordering::SeqCst);
    }

    pub fn finish(&self) {
        if self.enabled {
            let mut stderr = std::io::stderr().lock();
            let _ = stderr.write_all(take_pending_clear().as_bytes());
            let _ = stderr.flush();
        }
    }
}

/// Log writer for the tracing subscriber. Wipes a pending progress line
/// before each event so log output starts at column 0.
pub struct LogWriter;

impl<'a> MakeWriter<'a> for LogWriter {
    type Writer = StderrLock<'static>;

    fn make_writer(&'a self) -> Self::Writer {
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(take_pending_clear().as_bytes());
        stderr
    }
}

fn take_pending_clear() -> &'static str {
    if LINE_PENDING.swap(false, Ordering::SeqCst) {
        CLEAR_LINE
    } else {
        ""
    }
}

fn line(position: usize, total: usize, label: &str) -> String {
    let width = total.to_string().len();
    format!("[{:>width$}/{}] Fetching {}", position, total, label, width = width)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_pads_position_to_total_width() {
        assert_eq!(line(3, 120, "2023-04-03"), "[  3/120] Fetching 2023-04-03");
        assert_eq!(line(1, 1, "2023-04-01"), "[1/1] Fetching 2023-04-01");
    }

    #[test]
    fn pending_line_is_cleared_once_before_logging() {
        LINE_PENDING.store(true, Ordering::SeqCst);
        assert_eq!(take_pending_clear(), "\r\x1b[2K");
        assert_eq!(take_pending_clear(), "");
    }
}
