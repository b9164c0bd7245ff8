//! tabmuxd - terminal session daemon
//!
//! Serves terminal sessions to UI hosts over a Unix domain socket until
//! interrupted, then kills every session it still owns.

use std::env;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::sync::watch;
use tracing::{debug, error, info};

use tabmux::host::server;
use tabmux::TerminalService;

/// Daemon command line
#[derive(Debug, Default)]
struct DaemonArgs {
    /// Configuration file path
    config_path: Option<PathBuf>,
    /// Socket path override
    socket_path: Option<PathBuf>,
    /// Enable debug logging
    debug: bool,
}

impl DaemonArgs {
    /// Parse command line arguments
    fn parse() -> Result<Self> {
        let args: Vec<String> = env::args().skip(1).collect();
        Self::parse_from(&args)
    }

    fn parse_from(args: &[String]) -> Result<Self> {
        let mut daemon_args = DaemonArgs::default();

        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "--config" | "-c" => {
                    let Some(path) = args.get(i + 1) else {
                        bail!("Missing config file path");
                    };
                    daemon_args.config_path = Some(PathBuf::from(path));
                    i += 1;
                }
                "--socket" | "-s" => {
                    let Some(path) = args.get(i + 1) else {
                        bail!("Missing socket path");
                    };
                    daemon_args.socket_path = Some(PathBuf::from(path));
                    i += 1;
                }
                "--debug" | "-d" => {
                    daemon_args.debug = true;
                }
                "--help" | "-h" => {
                    print_help();
                    process::exit(0);
                }
                "--version" | "-v" => {
                    println!("tabmuxd v{}", tabmux::VERSION);
                    process::exit(0);
                }
                arg => bail!("Unknown option: {}", arg),
            }
            i += 1;
        }

        Ok(daemon_args)
    }
}

/// Print help information
fn print_help() {
    println!("tabmuxd - {}", tabmux::DESCRIPTION);
    println!();
    println!("USAGE:");
    println!("    tabmuxd [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -c, --config <PATH>    Path to configuration file");
    println!("    -s, --socket <PATH>    Unix socket to listen on");
    println!("    -d, --debug            Enable debug logging");
    println!("    -h, --help             Print this help message");
    println!("    -v, --version          Print version information");
    println!();
    println!("CONFIGURATION:");
    println!("    tabmuxd looks for configuration files in the following order:");
    println!("    1. Path specified with --config");
    println!("    2. $TABMUX_CONFIG");
    println!("    3. <config dir>/tabmux/config.toml (or config.json)");
    println!("    4. ~/.tabmux/config.toml (or config.json)");
    println!("    5. Built-in defaults");
    println!();
    println!("ENVIRONMENT:");
    println!("    RUST_LOG               Set logging level (error, warn, info, debug, trace)");
}

fn init_logging(debug: bool) {
    let default_filter = if debug { "tabmux=debug" } else { "tabmux=info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = DaemonArgs::parse().unwrap_or_else(|e| {
        eprintln!("{}", e);
        print_help();
        process::exit(1);
    });

    init_logging(args.debug);
    info!("Starting tabmuxd v{}", tabmux::VERSION);
    debug!("Arguments: {:?}", args);

    let config = match tabmux::load_config(args.config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", tabmux::handle_startup_error(&e));
            process::exit(1);
        }
    };
    let socket_path = args
        .socket_path
        .clone()
        .unwrap_or_else(|| config.server.resolved_socket_path());

    let service = Arc::new(TerminalService::native(config).context("Failed to start service")?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut listener = tokio::spawn(server::serve(
        Arc::clone(&service),
        socket_path.clone(),
        shutdown_rx,
    ));

    let finished = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
            None
        }
        finished = &mut listener => Some(finished),
    };
    let outcome = match finished {
        Some(finished) => finished,
        None => {
            info!("Interrupted, shutting down");
            let _ = shutdown_tx.send(true);
            listener.await
        }
    };

    let killed = service.shutdown();
    info!("tabmuxd stopped ({} sessions killed)", killed);

    match outcome {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            let error = tabmux::Error::from(e);
            error!("{}", tabmux::handle_startup_error(&error));
            Err(anyhow::anyhow!("Server on {} failed", socket_path.display()))
        }
        Err(e) => Err(e).context("Server task failed"),
    }
}
