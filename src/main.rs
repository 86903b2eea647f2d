// ABOUTME: Entry point for the tacoshell CLI application.
// ABOUTME: Connects, opens a PTY shell and relays the local terminal until the shell exits.

mod cli;

use clap::Parser;
use cli::Cli;
use tacoshell::config::{Config, Target};
use tacoshell::diagnostics::{Diagnostics, Warning};
use tacoshell::error::{Error, Result};
use tacoshell::output::{Output, OutputMode};
use tacoshell::ssh::{PtyRequest, Session};
use tacoshell::terminal::{self, RawModeGuard};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let output = Output::new(if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    });

    match run(cli, output).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            output.error(&e.to_string());
            std::process::exit(1);
        }
    }
}

/// Run one interactive session; returns the process exit code.
async fn run(cli: Cli, output: Output) -> Result<i32> {
    let config = Config::discover(cli.config.as_deref())?;
    let target = Target::parse(&cli.host)?;
    let resolved = config.resolve(&target, cli.overrides())?;

    output.progress(&format!("Connecting to {}", resolved.session.address()));
    let session = Session::connect(resolved.session).await?;
    output.progress("Connected to server");

    let mut channel = session.open_shell().await?;
    output.progress("Session created");

    let interactive = terminal::is_interactive();
    let (cols, rows) = terminal::size();
    channel
        .request_pty(&PtyRequest::new(resolved.term, cols, rows))
        .await?;
    output.progress("PTY requested");

    let input = terminal::spawn_stdin_reader()?;
    let resize = terminal::spawn_resize_watcher(interactive);

    let raw_mode = if interactive {
        let guard = RawModeGuard::enable().map_err(Error::Terminal)?;
        output.progress("Terminal mode set to raw");
        Some(guard)
    } else {
        output.progress("Not a terminal, skipping raw mode");
        None
    };

    channel.request_shell().await?;
    output.progress("Shell started");

    let relayed = channel
        .relay(input, resize, tokio::io::stdout(), tokio::io::stderr())
        .await;

    // Teardown is best effort: failures are reported but never change the outcome
    let mut diag = Diagnostics::default();
    if let Some(guard) = raw_mode {
        if let Err(e) = guard.restore() {
            diag.warn(Warning::terminal_restore(format!(
                "failed to restore terminal mode: {}",
                e
            )));
        }
    }
    if let Err(e) = channel.close().await {
        diag.warn(Warning::channel_close(format!("failed to close session: {}", e)));
    }
    if let Err(e) = session.disconnect().await {
        diag.warn(Warning::ssh_disconnect(format!("failed to close client: {}", e)));
    }
    for warning in diag.warnings() {
        output.warning(&warning.message);
    }

    let exit = relayed?;
    tracing::debug!(?exit, "session ended");
    Ok(exit.code())
}
