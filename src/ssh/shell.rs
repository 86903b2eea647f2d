// ABOUTME: Interactive shell channel with PTY support.
// ABOUTME: Requests the PTY and shell, then relays terminal I/O until the remote side closes.

use super::error::{Error, Result};
use russh::client::Msg;
use russh::{Channel, ChannelMsg, Pty, Sig};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

/// Extended data type code for stderr (RFC 4254 section 5.2).
const EXTENDED_DATA_STDERR: u32 = 1;

/// Terminal modes sent with every PTY request: echo on, 14400 baud both ways.
pub fn default_terminal_modes() -> Vec<(Pty, u32)> {
    vec![
        (Pty::ECHO, 1),
        (Pty::TTY_OP_ISPEED, 14400),
        (Pty::TTY_OP_OSPEED, 14400),
    ]
}

/// PTY parameters: terminal type, size in characters and terminal modes.
#[derive(Debug, Clone)]
pub struct PtyRequest {
    pub term: String,
    pub cols: u32,
    pub rows: u32,
    pub modes: Vec<(Pty, u32)>,
}

impl PtyRequest {
    pub const DEFAULT_TERM: &'static str = "xterm-256color";

    pub fn new(term: impl Into<String>, cols: u16, rows: u16) -> Self {
        Self {
            term: term.into(),
            cols: u32::from(cols),
            rows: u32::from(rows),
            modes: default_terminal_modes(),
        }
    }
}

impl Default for PtyRequest {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TERM, 80, 24)
    }
}

/// How the remote shell ended.
#[derive(Debug, Clone, Default)]
pub struct ShellExit {
    pub status: Option<u32>,
    pub signal: Option<Sig>,
}

impl ShellExit {
    /// Local process exit code for this outcome.
    ///
    /// The remote exit status when reported (255 if it does not fit a process
    /// exit code), `128 + n` for a known signal `n`, otherwise 255.
    pub fn code(&self) -> i32 {
        if let Some(status) = self.status {
            return u8::try_from(status).map(i32::from).unwrap_or(255);
        }
        self.signal
            .as_ref()
            .and_then(signal_number)
            .map(|n| 128 + n)
            .unwrap_or(255)
    }
}

fn signal_number(sig: &Sig) -> Option<i32> {
    let n = match sig {
        Sig::HUP => 1,
        Sig::INT => 2,
        Sig::QUIT => 3,
        Sig::ILL => 4,
        Sig::ABRT => 6,
        Sig::FPE => 8,
        Sig::KILL => 9,
        Sig::USR1 => 10,
        Sig::SEGV => 11,
        Sig::PIPE => 13,
        Sig::ALRM => 14,
        Sig::TERM => 15,
        _ => return None,
    };
    Some(n)
}

/// A session channel driving an interactive shell.
pub struct ShellChannel {
    channel: Channel<Msg>,
    closed: bool,
}

impl ShellChannel {
    pub(crate) fn new(channel: Channel<Msg>) -> Self {
        Self {
            channel,
            closed: false,
        }
    }

    /// Request a pseudo-terminal and wait for the server's answer.
    pub async fn request_pty(&mut self, pty: &PtyRequest) -> Result<()> {
        tracing::debug!(term = %pty.term, cols = pty.cols, rows = pty.rows, "requesting PTY");
        self.channel
            .request_pty(true, &pty.term, pty.cols, pty.rows, 0, 0, &pty.modes)
            .await?;
        self.wait_reply("pty-req").await
    }

    /// Start the user's login shell and wait for the server's answer.
    pub async fn request_shell(&mut self) -> Result<()> {
        tracing::debug!("starting shell");
        self.channel.request_shell(true).await?;
        self.wait_reply("shell").await
    }

    async fn wait_reply(&mut self, request: &'static str) -> Result<()> {
        loop {
            match self.channel.wait().await {
                Some(ChannelMsg::Success) => return Ok(()),
                Some(ChannelMsg::Failure) => return Err(Error::RequestRejected(request)),
                Some(ChannelMsg::Close) | None => {
                    self.closed = true;
                    return Err(Error::ChannelClosed(request));
                }
                Some(msg) => tracing::debug!(?msg, "message while waiting for {} reply", request),
            }
        }
    }

    /// Relay I/O between the local terminal and the remote shell.
    ///
    /// `input` carries raw stdin chunks; when it closes, EOF is sent to the server
    /// once. `resize` carries new `(cols, rows)` sizes. Returns when the server
    /// closes the channel.
    pub async fn relay<O, E>(
        &mut self,
        mut input: mpsc::Receiver<Vec<u8>>,
        mut resize: mpsc::Receiver<(u16, u16)>,
        mut stdout: O,
        mut stderr: E,
    ) -> Result<ShellExit>
    where
        O: AsyncWrite + Unpin,
        E: AsyncWrite + Unpin,
    {
        let mut exit = ShellExit::default();
        let mut input_open = true;
        let mut resize_open = true;

        loop {
            tokio::select! {
                msg = self.channel.wait() => {
                    match msg {
                        Some(ChannelMsg::Data { ref data }) => {
                            stdout.write_all(data).await?;
                            stdout.flush().await?;
                        }
                        Some(ChannelMsg::ExtendedData { ref data, ext }) => {
                            if ext == EXTENDED_DATA_STDERR {
                                stderr.write_all(data).await?;
                                stderr.flush().await?;
                            } else {
                                tracing::debug!(ext, len = data.len(), "ignoring extended data");
                            }
                        }
                        Some(ChannelMsg::ExitStatus { exit_status }) => {
                            tracing::debug!(exit_status, "remote shell exited");
                            exit.status = Some(exit_status);
                        }
                        Some(ChannelMsg::ExitSignal { signal_name, error_message, .. }) => {
                            tracing::debug!(signal = ?signal_name, %error_message, "remote shell killed by signal");
                            exit.signal = Some(signal_name);
                        }
                        Some(ChannelMsg::Eof) => {
                            tracing::debug!("remote sent EOF");
                        }
                        Some(ChannelMsg::Close) | None => {
                            self.closed = true;
                            break;
                        }
                        Some(_) => {}
                    }
                }

                chunk = input.recv(), if input_open => {
                    match chunk {
                        Some(bytes) => self.channel.data(&bytes[..]).await?,
                        None => {
                            input_open = false;
                            tracing::debug!("local input closed, sending EOF");
                            self.channel.eof().await?;
                        }
                    }
                }

                size = resize.recv(), if resize_open => {
                    match size {
                        Some((cols, rows)) => {
                            tracing::debug!(cols, rows, "window changed");
                            self.channel
                                .window_change(u32::from(cols), u32::from(rows), 0, 0)
                                .await?;
                        }
                        None => resize_open = false,
                    }
                }
            }
        }

        Ok(exit)
    }

    /// Close the channel unless the server already did.
    pub async fn close(self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.channel.close().await?;
        Ok(())
    }
}
