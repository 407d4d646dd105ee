#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use exitgate_core::shutdown::ShutdownSignal;
use exitgate_core::{load_from_path, telemetry};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Exitgate multi-exit forwarding proxy tunnel server")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "exitgate.toml")]
    config: PathBuf,

    /// Build the Prometheus metrics registry even if `[telemetry]` in the
    /// config file omits `metrics_port`. Exposing it over HTTP is left to
    /// the admin/HTTP collaborator layer; the core only builds the
    /// registry.
    #[arg(long)]
    metrics: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let cfg = match load_from_path(&cli.config) {
        Ok(cfg) => cfg,
        Err(err) => {
            let _ = telemetry::init_tracing_with_otel("info".to_string(), false, "warn".to_string());
            error!(%err, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = telemetry::init_tracing_with_otel(
        cfg.logging.level.clone(),
        cfg.logging.show_target,
        cfg.telemetry.otel_log_level.clone(),
    ) {
        eprintln!("failed to initialize tracing: {err}");
        return ExitCode::FAILURE;
    }

    let metrics = if cli.metrics || cfg.telemetry.metrics_port.is_some() {
        match telemetry::init_metrics() {
            Ok((metrics, _registry)) => Some(metrics),
            Err(err) => {
                error!(%err, "failed to initialize metrics, continuing without them");
                None
            }
        }
    } else {
        None
    };

    info!(listen = %cfg.listen, exits = cfg.exits.len(), "configuration loaded");

    let (handle, signal) = ShutdownSignal::new();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received ctrl-c, beginning graceful shutdown");
            handle.fire();
        }
    });

    let result = exitgate_core::run(cfg, signal, metrics).await;
    ctrl_c.abort();

    let code = match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "exitgate exited with error");
            ExitCode::FAILURE
        }
    };
    telemetry::shutdown_tracing();
    code
}
