// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Progress lines end in CRLF so they render correctly in raw mode.

use std::io::Write;

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Progress messages for each connection step
    Normal,
    /// Only warnings and errors
    Quiet,
}

/// Handles CLI output based on the configured mode.
///
/// Everything goes to stderr; stdout belongs to the remote shell.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    mode: OutputMode,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self { mode }
    }

    /// Print a progress message (suppressed in quiet mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            emit(&mut std::io::stderr(), "", message);
        }
    }

    /// Print a warning message.
    pub fn warning(&self, message: &str) {
        emit(&mut std::io::stderr(), "Warning: ", message);
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        emit(&mut std::io::stderr(), "Error: ", message);
    }
}

fn emit<W: Write>(out: &mut W, prefix: &str, message: &str) {
    // Nothing sensible to do if stderr is gone
    let _ = write!(out, "{prefix}{message}\r\n");
    let _ = out.flush();
}
