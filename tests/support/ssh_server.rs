// ABOUTME: In-process SSH server helper for integration tests.
// ABOUTME: Runs a russh server on a local port with a scripted login shell.

use russh::keys::ssh_key::rand_core::OsRng;
use russh::keys::{Algorithm, PrivateKey, PublicKey};
use russh::server::{self, Auth, Msg, Session};
use russh::{Channel, ChannelId, CryptoVec, Pty};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tacoshell::ssh::SessionConfig;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const TEST_USER: &str = "tester";
pub const TEST_PASSWORD: &str = "hunter2";

/// Sent on stdout as soon as the shell starts.
pub const GREETING: &[u8] = b"welcome to the test shell\r\n";
/// Sent as extended data (stderr) right after the greeting.
pub const STDERR_NOTICE: &[u8] = b"notice on stderr\r\n";

/// What the server accepts and how its shell behaves.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub password: Option<String>,
    pub authorized_key: Option<PublicKey>,
    pub reject_shell: bool,
    /// Reported when the client sends EOF, just before the channel closes.
    pub exit_status: u32,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            password: Some(TEST_PASSWORD.to_string()),
            authorized_key: None,
            reject_shell: false,
            exit_status: 0,
        }
    }
}

impl ServerOptions {
    /// Accept only the given public key, no password.
    pub fn key_only(key: PublicKey) -> Self {
        Self {
            password: None,
            authorized_key: Some(key),
            ..Self::default()
        }
    }

    pub fn exit_status(mut self, status: u32) -> Self {
        self.exit_status = status;
        self
    }

    pub fn reject_shell(mut self) -> Self {
        self.reject_shell = true;
        self
    }
}

/// Everything the server saw from its clients.
#[derive(Debug, Clone, Default)]
pub struct Recorded {
    pub auth_attempts: Vec<&'static str>,
    pub pty: Option<PtyRecord>,
    pub input: Vec<u8>,
    pub eof_count: usize,
    pub window_changes: Vec<(u32, u32)>,
}

#[derive(Debug, Clone)]
pub struct PtyRecord {
    pub term: String,
    pub cols: u32,
    pub rows: u32,
    pub modes: Vec<(Pty, u32)>,
}

/// Running server listening on 127.0.0.1. Stops accepting when dropped.
pub struct TestServer {
    port: u16,
    host_key: PublicKey,
    recorded: Arc<Mutex<Recorded>>,
    task: JoinHandle<()>,
}

impl TestServer {
    pub async fn start(options: ServerOptions) -> Self {
        let host_key =
            PrivateKey::random(&mut OsRng, Algorithm::Ed25519).expect("failed to generate host key");
        let public_host_key = host_key.public_key().clone();

        let config = Arc::new(server::Config {
            auth_rejection_time: Duration::from_millis(10),
            auth_rejection_time_initial: Some(Duration::ZERO),
            inactivity_timeout: Some(Duration::from_secs(30)),
            keys: vec![host_key],
            ..Default::default()
        });

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind test server");
        let port = listener.local_addr().unwrap().port();
        let recorded = Arc::new(Mutex::new(Recorded::default()));

        let state = recorded.clone();
        let task = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let handler = ShellHandler {
                    options: options.clone(),
                    recorded: state.clone(),
                };
                let config = config.clone();
                tokio::spawn(async move {
                    if let Ok(session) = server::run_stream(config, socket, handler).await {
                        let _ = session.await;
                    }
                });
            }
        });

        Self {
            port,
            host_key: public_host_key,
            recorded,
            task,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn host_key(&self) -> &PublicKey {
        &self.host_key
    }

    /// Snapshot of what the server has seen so far.
    pub fn recorded(&self) -> Recorded {
        self.recorded.lock().unwrap().clone()
    }

    /// Poll the recorded state until `condition` holds (5 second limit).
    pub async fn wait_for(&self, condition: impl Fn(&Recorded) -> bool) -> Recorded {
        for _ in 0..100 {
            let recorded = self.recorded();
            if condition(&recorded) {
                return recorded;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!(
            "server never reached the expected state: {:?}",
            self.recorded()
        );
    }

    /// Session config for this server with no credentials set.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::new("127.0.0.1", TEST_USER)
            .port(self.port)
            .connect_timeout(Duration::from_secs(10))
    }

    /// known_hosts entry for `key` at this server's address.
    pub fn known_hosts_line(&self, key: &PublicKey) -> String {
        format!(
            "[127.0.0.1]:{} {}\n",
            self.port,
            key.to_openssh().expect("failed to encode key")
        )
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct ShellHandler {
    options: ServerOptions,
    recorded: Arc<Mutex<Recorded>>,
}

impl ShellHandler {
    fn record(&self, update: impl FnOnce(&mut Recorded)) {
        update(&mut self.recorded.lock().unwrap());
    }
}

impl server::Handler for ShellHandler {
    type Error = russh::Error;

    async fn auth_password(&mut self, user: &str, password: &str) -> Result<Auth, Self::Error> {
        self.record(|r| r.auth_attempts.push("password"));
        let accepted = user == TEST_USER && self.options.password.as_deref() == Some(password);
        Ok(if accepted { Auth::Accept } else { Auth::reject() })
    }

    async fn auth_publickey(&mut self, user: &str, key: &PublicKey) -> Result<Auth, Self::Error> {
        self.record(|r| r.auth_attempts.push("publickey"));
        let accepted = user == TEST_USER
            && self
                .options
                .authorized_key
                .as_ref()
                .is_some_and(|authorized| authorized.key_data() == key.key_data());
        Ok(if accepted { Auth::Accept } else { Auth::reject() })
    }

    async fn channel_open_session(
        &mut self,
        _channel: Channel<Msg>,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }

    async fn pty_request(
        &mut self,
        channel: ChannelId,
        term: &str,
        col_width: u32,
        row_height: u32,
        _pix_width: u32,
        _pix_height: u32,
        modes: &[(Pty, u32)],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        self.record(|r| {
            r.pty = Some(PtyRecord {
                term: term.to_string(),
                cols: col_width,
                rows: row_height,
                modes: modes.to_vec(),
            })
        });
        session.channel_success(channel)?;
        Ok(())
    }

    async fn shell_request(
        &mut self,
        channel: ChannelId,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        if self.options.reject_shell {
            session.channel_failure(channel)?;
            return Ok(());
        }
        session.channel_success(channel)?;
        session.data(channel, CryptoVec::from_slice(GREETING))?;
        session.extended_data(channel, 1, CryptoVec::from_slice(STDERR_NOTICE))?;
        Ok(())
    }

    // Echo, like a terminal with ECHO set
    async fn data(
        &mut self,
        channel: ChannelId,
        data: &[u8],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        self.record(|r| r.input.extend_from_slice(data));
        session.data(channel, CryptoVec::from_slice(data))?;
        Ok(())
    }

    async fn window_change_request(
        &mut self,
        _channel: ChannelId,
        col_width: u32,
        row_height: u32,
        _pix_width: u32,
        _pix_height: u32,
        _session: &mut Session,
    ) -> Result<(), Self::Error> {
        self.record(|r| r.window_changes.push((col_width, row_height)));
        Ok(())
    }

    // End of input ends the shell
    async fn channel_eof(
        &mut self,
        channel: ChannelId,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        self.record(|r| r.eof_count += 1);
        session.exit_status_request(channel, self.options.exit_status)?;
        session.eof(channel)?;
        session.close(channel)?;
        Ok(())
    }
}
