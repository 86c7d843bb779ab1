use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use relay_gateway::gateway::Gateway;
use relay_gateway::{config, diag, logging, network};

/// Written to the working directory at startup, removed on clean exit
const PID_FILE: &str = "gateway.pid";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Optional TOML configuration file; GW_* environment variables
    /// override its values
    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// Drop guard that removes the PID file on every exit path out of main
struct PidFile;

impl PidFile {
    fn write() -> Result<Self> {
        std::fs::write(PID_FILE, std::process::id().to_string())
            .with_context(|| format!("can't write pid file '{PID_FILE}'"))?;
        Ok(Self)
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if let Err(error) = std::fs::remove_file(PID_FILE) {
            error!(%error, "failed to remove pid file");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let args = Args::parse();
    let _pid_file = PidFile::write()?;

    let config = config::load_config(args.config.as_deref())?;
    let listener = network::bind_listener(&config.listen_addr, config.reuse_port)?;
    info!(addr = %listener.local_addr()?, "gateway listening");

    let gateway = Arc::new(Gateway::new(&config));

    if let Some(addr) = &config.diag_addr {
        let diag_listener = diag::bind(addr).await?;
        info!(addr = %diag_listener.local_addr()?, "diagnostics endpoint up");
        tokio::spawn(diag::serve(diag_listener, Arc::clone(&gateway)));
    }

    info!(pid = std::process::id(), "gateway running");

    tokio::select! {
        // run only returns on a fatal accept error
        result = Arc::clone(&gateway).run(listener) => result,
        _ = shutdown_signal() => {
            info!("gateway killed");
            Ok(())
        }
    }
}

/// Resolves when the process is told to stop: SIGTERM from a supervisor
/// or Ctrl+C at a terminal.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = tokio::signal::ctrl_c() => {}
                }
            }
            Err(error) => {
                // No SIGTERM stream; a supervisor kill still works, it
                // just skips the log line. Fall back to Ctrl+C alone.
                error!(%error, "cannot listen for SIGTERM");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    let _ = tokio::signal::ctrl_c().await;
}
