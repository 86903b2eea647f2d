// ABOUTME: Diagnostics accumulator for non-fatal cleanup failures.
// ABOUTME: Teardown problems are recorded and reported, never turned into errors.

/// Collects non-fatal warnings during session teardown.
#[derive(Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning. Only logged at debug level; the caller prints it.
    pub fn warn(&mut self, warning: Warning) {
        tracing::debug!(kind = ?warning.kind, "{}", warning.message);
        self.warnings.push(warning);
    }

    /// Get all collected warnings.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }
}

/// A non-fatal warning collected during teardown.
#[derive(Debug, Clone)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    /// Create a terminal restore warning.
    pub fn terminal_restore(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::TerminalRestore,
            message: message.into(),
        }
    }

    /// Create a channel close warning.
    pub fn channel_close(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::ChannelClose,
            message: message.into(),
        }
    }

    /// Create an SSH disconnect warning.
    pub fn ssh_disconnect(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::SshDisconnect,
            message: message.into(),
        }
    }
}

/// Categories of warnings that can occur during teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// Local terminal could not leave raw mode.
    TerminalRestore,
    /// Session channel could not be closed.
    ChannelClose,
    /// Failed to cleanly disconnect SSH session.
    SshDisconnect,
}
