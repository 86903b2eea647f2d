// ABOUTME: SSH-specific error types.
// ABOUTME: Covers connection, authentication, host key and channel failures.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("connection timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("host key for {host}:{port} was rejected")]
    HostKeyRejected { host: String, port: u16 },

    #[error("authentication failed for user {user}: no method accepted")]
    AuthenticationFailed { user: String },

    #[error("failed to load key from {path}: {reason}")]
    KeyLoadFailed { path: PathBuf, reason: String },

    #[error("failed to open session channel: {0}")]
    ChannelOpen(String),

    #[error("server rejected {0} request")]
    RequestRejected(&'static str),

    #[error("channel closed before {0} was answered")]
    ChannelClosed(&'static str),

    #[error("SSH protocol error: {0}")]
    Protocol(#[from] russh::Error),

    #[error("SSH key error: {0}")]
    Key(#[from] russh::keys::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
