// ABOUTME: Authentication methods for SSH sessions.
// ABOUTME: Resolves key file, agent and password credentials and tries them in order.

use super::client::{SessionConfig, SshHandler};
use super::error::{Error, Result};
use russh::client::Handle;
use russh::keys::agent::client::AgentClient;
use russh::keys::{PrivateKeyWithHashAlg, load_secret_key, ssh_key};
use std::fmt;
use std::sync::Arc;
use tokio::net::UnixStream;

/// Password credential. Never printed by `Debug`.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    pub fn new(password: impl Into<String>) -> Self {
        Self(password.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("Password(<empty>)")
        } else {
            f.write_str("Password(***)")
        }
    }
}

/// A single way of proving identity to the server.
pub(crate) enum AuthMethod {
    KeyFile(Arc<ssh_key::PrivateKey>),
    Agent(AgentClient<UnixStream>),
    Password(Password),
}

impl AuthMethod {
    fn name(&self) -> &'static str {
        match self {
            AuthMethod::KeyFile(_) => "publickey",
            AuthMethod::Agent(_) => "agent",
            AuthMethod::Password(_) => "password",
        }
    }
}

/// Build the ordered list of methods to try: key file, agent, then password.
///
/// Key files are loaded here, before any network traffic, so a bad path fails fast.
/// Password is always last and always present, even when empty.
pub(crate) async fn resolve_methods(config: &SessionConfig) -> Result<Vec<AuthMethod>> {
    let mut methods = Vec::new();

    if let Some(key_path) = &config.identity_file {
        let passphrase = config.key_passphrase.as_ref().map(Password::expose);
        let key = load_secret_key(key_path, passphrase).map_err(|e| Error::KeyLoadFailed {
            path: key_path.clone(),
            reason: e.to_string(),
        })?;
        methods.push(AuthMethod::KeyFile(Arc::new(key)));
    }

    if config.agent {
        match AgentClient::connect_env().await {
            Ok(agent) => methods.push(AuthMethod::Agent(agent)),
            Err(e) => tracing::warn!("ssh-agent requested but not reachable: {}", e),
        }
    }

    methods.push(AuthMethod::Password(config.password.clone()));
    Ok(methods)
}

/// Try each method until the server accepts one.
pub(crate) async fn authenticate(
    session: &mut Handle<SshHandler>,
    user: &str,
    methods: Vec<AuthMethod>,
) -> Result<()> {
    for method in methods {
        let name = method.name();
        tracing::debug!(method = name, user, "trying authentication method");

        let accepted = match method {
            AuthMethod::KeyFile(key) => {
                let hash_alg = session.best_supported_rsa_hash().await?.flatten();
                session
                    .authenticate_publickey(user, PrivateKeyWithHashAlg::new(key, hash_alg))
                    .await?
                    .success()
            }
            AuthMethod::Agent(agent) => authenticate_with_agent(session, user, agent).await?,
            AuthMethod::Password(password) => session
                .authenticate_password(user, password.expose())
                .await?
                .success(),
        };

        if accepted {
            tracing::debug!(method = name, "authentication succeeded");
            return Ok(());
        }
        tracing::debug!(method = name, "authentication rejected");
    }

    Err(Error::AuthenticationFailed {
        user: user.to_string(),
    })
}

async fn authenticate_with_agent(
    session: &mut Handle<SshHandler>,
    user: &str,
    mut agent: AgentClient<UnixStream>,
) -> Result<bool> {
    // A broken agent must not stop the chain before password auth
    let keys = match agent.request_identities().await {
        Ok(keys) => keys,
        Err(e) => {
            tracing::warn!("failed to list SSH agent keys: {}", e);
            return Ok(false);
        }
    };

    if keys.is_empty() {
        tracing::debug!("no keys in SSH agent");
        return Ok(false);
    }

    for key in &keys {
        match session
            .authenticate_publickey_with(user, key.clone(), None, &mut agent)
            .await
        {
            Ok(result) if result.success() => return Ok(true),
            _ => continue,
        }
    }
    Ok(false)
}
