mod config;
mod telemetry;

use clap::{Args, Parser, Subcommand};
use config::{Config, ConfigError};
use std::path::PathBuf;
use std::process::ExitCode;
use upsert_relay::errors::RelayError;

#[derive(Parser)]
#[command(version, about = "Relays widget field saves into a data extension")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Serve the save endpoint and the admin probes
    Run(ConfigArgs),
    /// Validate the config file and report what is still missing
    CheckConfig(ConfigArgs),
}

#[derive(Args)]
struct ConfigArgs {
    #[arg(long, short, default_value = "fieldsync.yaml")]
    config: PathBuf,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Telemetry(#[from] telemetry::TelemetryError),
    #[error("could not start runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error(transparent)]
    Relay(#[from] RelayError),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        CliCommand::Run(args) => run(&args),
        CliCommand::CheckConfig(args) => check_config(&args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("fieldsync: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &ConfigArgs) -> Result<(), CliError> {
    let config = Config::load(&args.config)?;

    let _sentry = telemetry::init_logging(config.common.logging.as_ref());
    if let Some(metrics) = &config.common.metrics {
        telemetry::init_metrics(metrics)?;
    }

    tracing::info!(config = %args.config.display(), "Starting fieldsync");

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    rt.block_on(upsert_relay::run(config.relay))?;

    Ok(())
}

fn check_config(args: &ConfigArgs) -> Result<(), CliError> {
    let config = Config::load(&args.config)?;
    let relay = &config.relay;

    println!("{}: ok", args.config.display());
    println!(
        "save endpoint: {}:{}{}",
        relay.listener.host, relay.listener.port, relay.save_path
    );
    println!(
        "admin endpoint: {}:{}",
        relay.admin_listener.host, relay.admin_listener.port
    );

    match relay.credentials.client_credentials() {
        Ok(_) => println!("credentials: complete"),
        Err(e) => println!("credentials: {e}"),
    }
    match relay.data_extension.external_key() {
        Ok(key) => println!("data extension: {key}"),
        Err(e) => println!("data extension: {e}"),
    }

    Ok(())
}
