// ABOUTME: SSH client module for interactive remote shells.
// ABOUTME: Password, key file and agent authentication with configurable host key checking.

mod auth;
mod client;
mod error;
mod shell;

pub use auth::Password;
pub use client::{HostKeyPolicy, Session, SessionConfig};
pub use error::{Error, Result};
pub use shell::{PtyRequest, ShellChannel, ShellExit, default_terminal_modes};
