// ABOUTME: Local terminal handling: raw mode, size, stdin and resize events.
// ABOUTME: Raw mode is restored on drop; failures there are logged, never fatal.

use crossterm::terminal;
use std::io::{self, IsTerminal, Read};
use tokio::sync::mpsc;

/// Size used when the local terminal size cannot be determined.
pub const FALLBACK_SIZE: (u16, u16) = (80, 24);

const STDIN_CHUNK: usize = 1024;
const CHANNEL_CAPACITY: usize = 64;

/// Whether stdin is attached to a terminal.
pub fn is_interactive() -> bool {
    io::stdin().is_terminal()
}

/// Current terminal size as `(cols, rows)`.
pub fn size() -> (u16, u16) {
    match terminal::size() {
        Ok((cols, rows)) if cols > 0 && rows > 0 => (cols, rows),
        Ok(_) => FALLBACK_SIZE,
        Err(e) => {
            tracing::debug!("terminal size unavailable, using {:?}: {}", FALLBACK_SIZE, e);
            FALLBACK_SIZE
        }
    }
}

/// Keeps the local terminal in raw mode while alive.
#[derive(Debug)]
pub struct RawModeGuard {
    active: bool,
}

impl RawModeGuard {
    pub fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        tracing::debug!("terminal switched to raw mode");
        Ok(Self { active: true })
    }

    /// Leave raw mode, reporting any failure to the caller.
    pub fn restore(mut self) -> io::Result<()> {
        self.active = false;
        terminal::disable_raw_mode()
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if self.active {
            if let Err(e) = terminal::disable_raw_mode() {
                tracing::warn!("failed to restore terminal mode: {}", e);
            }
        }
    }
}

/// Read stdin on a dedicated thread and forward chunks.
///
/// A blocking read cannot be cancelled, so this runs on a plain OS thread
/// rather than the runtime's blocking pool. The receiver closes on EOF or
/// read error.
pub fn spawn_stdin_reader() -> io::Result<mpsc::Receiver<Vec<u8>>> {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    std::thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || read_into(io::stdin().lock(), tx))?;
    Ok(rx)
}

fn read_into<R: Read>(mut reader: R, tx: mpsc::Sender<Vec<u8>>) {
    let mut buf = [0u8; STDIN_CHUNK];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if tx.blocking_send(buf[..n].to_vec()).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::debug!("stdin read failed: {}", e);
                break;
            }
        }
    }
}

/// Report terminal size changes as `(cols, rows)`.
///
/// Returns an already closed receiver when `enabled` is false or the signal
/// handler cannot be installed.
pub fn spawn_resize_watcher(enabled: bool) -> mpsc::Receiver<(u16, u16)> {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    if enabled {
        watch_window_changes(tx);
    }
    rx
}

#[cfg(unix)]
fn watch_window_changes(tx: mpsc::Sender<(u16, u16)>) {
    use tokio::signal::unix::{SignalKind, signal};

    let mut winch = match signal(SignalKind::window_change()) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!("cannot watch terminal resizes: {}", e);
            return;
        }
    };

    tokio::spawn(async move {
        while winch.recv().await.is_some() {
            if tx.send(size()).await.is_err() {
                break;
            }
        }
    });
}

#[cfg(not(unix))]
fn watch_window_changes(_tx: mpsc::Sender<(u16, u16)>) {}
