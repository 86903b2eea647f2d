// ABOUTME: SSH session management using russh.
// ABOUTME: Handles connection, host key checking, authentication and disconnect.

use super::auth::{self, Password};
use super::error::{Error, Result};
use super::shell::ShellChannel;
use russh::Disconnect;
use russh::client::{self, Config, Handle};
use russh::keys::known_hosts::{
    check_known_hosts, check_known_hosts_path, learn_known_hosts, learn_known_hosts_path,
};
use russh::keys::ssh_key;
use russh::keys::ssh_key::HashAlg;
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// How the server's host key is verified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum HostKeyPolicy {
    /// Accept any host key without consulting known_hosts.
    #[default]
    Accept,
    /// Trust On First Use: learn unknown keys, reject changed ones.
    AcceptNew,
    /// Only accept keys already in known_hosts.
    Strict,
}

impl fmt::Display for HostKeyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HostKeyPolicy::Accept => "accept",
            HostKeyPolicy::AcceptNew => "accept-new",
            HostKeyPolicy::Strict => "strict",
        };
        f.write_str(name)
    }
}

/// Configuration for establishing an SSH session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Remote host to connect to.
    pub host: String,
    /// SSH port (default: 22).
    pub port: u16,
    /// Username for authentication.
    pub user: String,
    /// Password, tried after any key based method.
    pub password: Password,
    /// Optional path to a private key file.
    pub identity_file: Option<PathBuf>,
    /// Passphrase for an encrypted identity file.
    pub key_passphrase: Option<Password>,
    /// Whether to try keys from the SSH agent.
    pub agent: bool,
    pub host_key_policy: HostKeyPolicy,
    /// Optional path to known_hosts file.
    /// If None, uses the default ~/.ssh/known_hosts.
    pub known_hosts_path: Option<PathBuf>,
    /// Upper bound for TCP connect plus handshake (default: 15 seconds).
    pub connect_timeout: Duration,
    /// Interval between keepalive requests. None disables them.
    pub keepalive_interval: Option<Duration>,
}

impl SessionConfig {
    pub const DEFAULT_PORT: u16 = 22;
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: Self::DEFAULT_PORT,
            user: user.into(),
            password: Password::default(),
            identity_file: None,
            key_passphrase: None,
            agent: false,
            host_key_policy: HostKeyPolicy::default(),
            known_hosts_path: None,
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
            keepalive_interval: None,
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Password::new(password);
        self
    }

    pub fn identity_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.identity_file = Some(path.into());
        self
    }

    pub fn key_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.key_passphrase = Some(Password::new(passphrase));
        self
    }

    pub fn agent(mut self, agent: bool) -> Self {
        self.agent = agent;
        self
    }

    pub fn host_key_policy(mut self, policy: HostKeyPolicy) -> Self {
        self.host_key_policy = policy;
        self
    }

    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn keepalive_interval(mut self, interval: Option<Duration>) -> Self {
        self.keepalive_interval = interval;
        self
    }

    /// `host:port` as used in messages.
    pub fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// SSH client handler for russh.
pub(crate) struct SshHandler {
    host: String,
    port: u16,
    policy: HostKeyPolicy,
    known_hosts_path: Option<PathBuf>,
}

impl SshHandler {
    fn new(host: String, port: u16, policy: HostKeyPolicy, known_hosts_path: Option<PathBuf>) -> Self {
        Self {
            host,
            port,
            policy,
            known_hosts_path,
        }
    }

    fn learn(&self, key: &ssh_key::PublicKey) {
        let learn_result = match &self.known_hosts_path {
            Some(path) => learn_known_hosts_path(&self.host, self.port, key, path),
            None => learn_known_hosts(&self.host, self.port, key),
        };
        if let Err(e) = learn_result {
            tracing::warn!("Failed to save host key to known_hosts: {}", e);
        }
    }
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        tracing::debug!(
            host = %self.host,
            port = self.port,
            fingerprint = %server_public_key.fingerprint(HashAlg::Sha256),
            "server host key"
        );

        if self.policy == HostKeyPolicy::Accept {
            return Ok(true);
        }

        let check_result = match &self.known_hosts_path {
            Some(path) => check_known_hosts_path(&self.host, self.port, server_public_key, path),
            None => check_known_hosts(&self.host, self.port, server_public_key),
        };

        match check_result {
            Ok(true) => Ok(true),
            Ok(false) if self.policy == HostKeyPolicy::AcceptNew => {
                tracing::warn!(
                    "Trust-On-First-Use: accepting unknown host key for {}:{}",
                    self.host,
                    self.port
                );
                self.learn(server_public_key);
                Ok(true)
            }
            Ok(false) => Ok(false),
            Err(russh::keys::Error::KeyChanged { line }) => {
                tracing::warn!(
                    "host key for {}:{} differs from known_hosts line {}",
                    self.host,
                    self.port,
                    line
                );
                Ok(false)
            }
            Err(e) => {
                // Unreadable known_hosts counts as unknown host
                tracing::debug!("known_hosts check failed: {}", e);
                Ok(self.policy == HostKeyPolicy::AcceptNew)
            }
        }
    }
}

/// An established, authenticated SSH session.
pub struct Session {
    config: SessionConfig,
    handle: Handle<SshHandler>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("handle", &"<russh::Handle>")
            .finish()
    }
}

impl Session {
    /// Connect to the remote host and authenticate.
    pub async fn connect(config: SessionConfig) -> Result<Self> {
        let methods = auth::resolve_methods(&config).await?;

        let russh_config = Config {
            // Interactive sessions may sit idle indefinitely
            inactivity_timeout: None,
            keepalive_interval: config.keepalive_interval,
            ..Default::default()
        };

        let handler = SshHandler::new(
            config.host.clone(),
            config.port,
            config.host_key_policy,
            config.known_hosts_path.clone(),
        );

        tracing::info!(address = %config.address(), user = %config.user, "connecting");

        let connect = client::connect(
            Arc::new(russh_config),
            (config.host.as_str(), config.port),
            handler,
        );
        let mut handle = tokio::time::timeout(config.connect_timeout, connect)
            .await
            .map_err(|_| Error::ConnectTimeout(config.connect_timeout))?
            .map_err(|e| Self::connect_error(&config, e))?;

        auth::authenticate(&mut handle, &config.user, methods).await?;

        tracing::info!(address = %config.address(), "authenticated");

        Ok(Self { config, handle })
    }

    fn connect_error(config: &SessionConfig, e: russh::Error) -> Error {
        match e {
            russh::Error::UnknownKey => Error::HostKeyRejected {
                host: config.host.clone(),
                port: config.port,
            },
            russh::Error::IO(ref io) if io.kind() == std::io::ErrorKind::ConnectionRefused => {
                Error::Connection(format!("connection refused to {}", config.address()))
            }
            e => Error::Connection(e.to_string()),
        }
    }

    /// Open a session channel for an interactive shell.
    pub async fn open_shell(&self) -> Result<ShellChannel> {
        let channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| Error::ChannelOpen(e.to_string()))?;
        tracing::debug!(channel = ?channel.id(), "session channel opened");
        Ok(ShellChannel::new(channel))
    }

    /// Disconnect the session.
    pub async fn disconnect(self) -> Result<()> {
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
            .map_err(Error::Protocol)?;
        Ok(())
    }
}
