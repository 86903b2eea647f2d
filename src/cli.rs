// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: One positional host plus connection, authentication and output flags.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tacoshell::config::Overrides;
use tacoshell::ssh::HostKeyPolicy;

#[derive(Parser, Debug)]
#[command(name = "tacoshell")]
#[command(about = "A simple SSH client")]
#[command(version)]
pub struct Cli {
    /// SSH host, optionally as [user@]host[:port] or a configured alias
    pub host: String,

    /// SSH username [default: root]
    #[arg(short = 'u', long)]
    pub username: Option<String>,

    /// SSH password [default: empty]
    #[arg(
        short = 'p',
        long = "pass",
        env = "TACOSHELL_PASSWORD",
        hide_env_values = true
    )]
    pub password: Option<String>,

    /// SSH port [default: 22]
    #[arg(short = 'P', long)]
    pub port: Option<u16>,

    /// Private key file for public key authentication
    #[arg(short = 'i', long, value_name = "PATH")]
    pub identity: Option<PathBuf>,

    /// Passphrase for an encrypted identity file
    #[arg(long, env = "TACOSHELL_KEY_PASSPHRASE", hide_env_values = true)]
    pub key_passphrase: Option<String>,

    /// Try keys from the SSH agent
    #[arg(short = 'A', long)]
    pub agent: bool,

    /// How to verify the server's host key [default: accept]
    #[arg(long, value_enum)]
    pub host_key_policy: Option<HostKeyPolicy>,

    /// known_hosts file to check and update
    #[arg(long, value_name = "PATH")]
    pub known_hosts: Option<PathBuf>,

    /// Terminal type for the remote PTY [default: xterm-256color]
    #[arg(short = 't', long)]
    pub term: Option<String>,

    /// Give up connecting after this long, e.g. "10s" [default: 15s]
    #[arg(long, value_name = "DURATION", value_parser = humantime_serde::re::humantime::parse_duration)]
    pub connect_timeout: Option<Duration>,

    /// Configuration file with defaults and host profiles
    #[arg(short = 'F', long, value_name = "PATH", env = "TACOSHELL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Suppress progress messages
    #[arg(short, long)]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            user: self.username.clone(),
            password: self.password.clone(),
            port: self.port,
            identity_file: self.identity.clone(),
            key_passphrase: self.key_passphrase.clone(),
            agent: self.agent,
            host_key_policy: self.host_key_policy,
            known_hosts: self.known_hosts.clone(),
            term: self.term.clone(),
            connect_timeout: self.connect_timeout,
        }
    }
}
