// ABOUTME: Configuration file parsing and connection parameter resolution.
// ABOUTME: Merges command-line flags, the host argument, host profiles and defaults.

mod target;

pub use target::Target;

use crate::error::{Error, Result};
use crate::ssh::{HostKeyPolicy, PtyRequest, SessionConfig};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_DIR: &str = "tacoshell";
pub const CONFIG_FILENAME: &str = "config.yml";
pub const CONFIG_FILENAME_ALT: &str = "config.yaml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub defaults: Defaults,

    /// Host profiles keyed by alias.
    #[serde(default)]
    pub hosts: HashMap<String, HostProfile>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Defaults {
    #[serde(default = "default_user")]
    pub user: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_term")]
    pub term: String,

    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,

    #[serde(default, with = "humantime_serde")]
    pub keepalive_interval: Option<Duration>,

    #[serde(default)]
    pub host_key_policy: HostKeyPolicy,

    #[serde(default)]
    pub agent: bool,

    #[serde(default)]
    pub known_hosts: Option<PathBuf>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            user: default_user(),
            port: default_port(),
            term: default_term(),
            connect_timeout: default_connect_timeout(),
            keepalive_interval: None,
            host_key_policy: HostKeyPolicy::default(),
            agent: false,
            known_hosts: None,
        }
    }
}

fn default_user() -> String {
    "root".to_string()
}

fn default_port() -> u16 {
    SessionConfig::DEFAULT_PORT
}

fn default_term() -> String {
    PtyRequest::DEFAULT_TERM.to_string()
}

fn default_connect_timeout() -> Duration {
    SessionConfig::DEFAULT_CONNECT_TIMEOUT
}

/// Per-host settings. Every field falls back to [`Defaults`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostProfile {
    /// Real host name; the alias is used when absent.
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub identity_file: Option<PathBuf>,
    #[serde(default)]
    pub agent: Option<bool>,
    #[serde(default)]
    pub host_key_policy: Option<HostKeyPolicy>,
    #[serde(default)]
    pub known_hosts: Option<PathBuf>,
    #[serde(default)]
    pub term: Option<String>,
}

/// Values given explicitly on the command line. They win over everything.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub user: Option<String>,
    pub password: Option<String>,
    pub port: Option<u16>,
    pub identity_file: Option<PathBuf>,
    /// Decrypts the identity file, wherever it was configured.
    pub key_passphrase: Option<String>,
    /// Only forces the agent on; absence keeps the configured value.
    pub agent: bool,
    pub host_key_policy: Option<HostKeyPolicy>,
    pub known_hosts: Option<PathBuf>,
    pub term: Option<String>,
    pub connect_timeout: Option<Duration>,
}

/// Fully resolved connection parameters.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub session: SessionConfig,
    pub term: String,
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load the explicit file if given, otherwise search the user config dir.
    ///
    /// An explicit path must exist. Finding nothing in the config dir yields defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(Error::ConfigNotFound(path.to_path_buf()));
            }
            tracing::debug!(path = %path.display(), "loading configuration");
            return Self::load(path);
        }

        match dirs::config_dir() {
            Some(dir) => Self::discover_in(&dir.join(CONFIG_DIR)),
            None => Ok(Self::default()),
        }
    }

    pub fn discover_in(dir: &Path) -> Result<Self> {
        let candidates = [dir.join(CONFIG_FILENAME), dir.join(CONFIG_FILENAME_ALT)];

        for path in &candidates {
            if path.exists() {
                tracing::debug!(path = %path.display(), "loading configuration");
                return Self::load(path);
            }
        }

        Ok(Self::default())
    }

    fn validate(&self) -> Result<()> {
        if self.defaults.term.trim().is_empty() {
            return Err(Error::InvalidConfig("defaults.term cannot be empty".to_string()));
        }
        if self.defaults.connect_timeout.is_zero() {
            return Err(Error::InvalidConfig(
                "defaults.connect_timeout must be greater than zero".to_string(),
            ));
        }
        for (alias, profile) in &self.hosts {
            if profile.hostname.as_deref().is_some_and(|h| h.trim().is_empty()) {
                return Err(Error::InvalidConfig(format!(
                    "hosts.{}.hostname cannot be empty",
                    alias
                )));
            }
        }
        Ok(())
    }

    /// Merge flags, the host argument, the matching profile and defaults.
    pub fn resolve(&self, target: &Target, overrides: Overrides) -> Result<Resolved> {
        let profile = self.hosts.get(&target.host);
        if profile.is_some() {
            tracing::debug!(alias = %target.host, "using host profile");
        }
        let profile = profile.cloned().unwrap_or_default();
        let defaults = &self.defaults;

        let host = profile.hostname.unwrap_or_else(|| target.host.clone());
        let user = overrides
            .user
            .or_else(|| target.user.clone())
            .or(profile.user)
            .unwrap_or_else(|| defaults.user.clone());
        if user.is_empty() {
            return Err(Error::InvalidConfig("username cannot be empty".to_string()));
        }
        let port = overrides
            .port
            .or(target.port)
            .or(profile.port)
            .unwrap_or(defaults.port);
        let term = overrides
            .term
            .or(profile.term)
            .unwrap_or_else(|| defaults.term.clone());
        let policy = overrides
            .host_key_policy
            .or(profile.host_key_policy)
            .unwrap_or(defaults.host_key_policy);
        let agent = overrides.agent || profile.agent.unwrap_or(defaults.agent);

        let mut session = SessionConfig::new(host, user)
            .port(port)
            .password(overrides.password.unwrap_or_default())
            .agent(agent)
            .host_key_policy(policy)
            .connect_timeout(overrides.connect_timeout.unwrap_or(defaults.connect_timeout))
            .keepalive_interval(defaults.keepalive_interval);

        if let Some(key) = overrides.identity_file.or(profile.identity_file) {
            session = session.identity_file(expand_home(&key));
        }
        if let Some(passphrase) = overrides.key_passphrase {
            session = session.key_passphrase(passphrase);
        }
        if let Some(path) = overrides
            .known_hosts
            .or(profile.known_hosts)
            .or_else(|| defaults.known_hosts.clone())
        {
            session = session.known_hosts_path(expand_home(&path));
        }

        Ok(Resolved { session, term })
    }
}

/// Expand a leading `~/` to the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}
