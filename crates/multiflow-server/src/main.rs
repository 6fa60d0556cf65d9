use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use multiflow_config::{apply_overrides, load_config, validate_config, CliOverrides, Config};
use multiflow_server::{raise_fd_limit, run_with_shutdown, CancellationToken};

#[derive(Parser, Debug)]
#[command(name = "multiflow", version, about = "Multi-protocol TCP tunneling proxy")]
struct Args {
    /// Optional config file (json/yaml/toml); flags override it
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[command(flatten)]
    overrides: CliOverrides,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    let mut config = match &args.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("failed to load {}: {}", path.display(), e);
                return ExitCode::from(1);
            }
        },
        None => Config::default(),
    };
    apply_overrides(&mut config, &args.overrides);
    if let Err(e) = validate_config(&mut config) {
        eprintln!("configuration error: {}", e);
        return ExitCode::from(1);
    }

    let level = config.logging.level.as_deref().unwrap_or("info");
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if args.overrides.validate {
        return validate_entry(&config);
    }

    raise_fd_limit(config.server.fd_limit);
    print_startup_banner(&config);

    // Graceful shutdown on SIGINT/SIGTERM.
    let shutdown = CancellationToken::new();
    let shutdown_signal = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal_handler().await;
        info!("shutdown signal received");
        shutdown_signal.cancel();
    });

    match run_with_shutdown(config, shutdown).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(kind = e.error_kind(), error = %e, "fatal server error");
            ExitCode::from(1)
        }
    }
}

/// Validation entry point: check the frozen configuration and exit without
/// starting the proxy. The remote token endpoint is an external boundary,
/// so only the presence of a token is enforced here.
fn validate_entry(config: &Config) -> ExitCode {
    match config.token.as_deref() {
        Some(token) if !token.trim().is_empty() => {
            info!("configuration valid");
            ExitCode::SUCCESS
        }
        _ => {
            error!("--validate requires a non-empty --token");
            ExitCode::from(1)
        }
    }
}

fn print_startup_banner(config: &Config) {
    info!(
        version = multiflow_core::VERSION,
        port = config.server.port,
        mode = if config.tls.enabled { "https" } else { "http" },
        workers = config.server.workers,
        buffer_size = config.server.buffer_size,
        "starting multiflow"
    );
    if config.server.ssh_only {
        info!(ssh_port = config.server.ssh_port, "mode: SSH only");
    } else {
        info!(
            remote_host = %config.server.remote_host,
            ssh_port = config.server.ssh_port,
            openvpn_port = config.server.openvpn_port,
            v2ray_port = config.server.v2ray_port,
            "backends"
        );
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT).
async fn shutdown_signal_handler() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
