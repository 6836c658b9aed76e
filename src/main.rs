use bar_replay::cli::{CleanTarget, Cli, Commands, Runtime, WatchArgs};
use bar_replay::config::Config;
use clap::Parser;
use std::process::ExitCode;

/// Exit code for a failed run
const EXIT_RUN_ERROR: u8 = 1;
/// Exit code for a failure before any command ran
const EXIT_STARTUP_ERROR: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load configuration, falling back to the bundled defaults when absent
    let config = if std::path::Path::new(&cli.config).exists() {
        Config::load(&cli.config)
    } else {
        eprintln!("Warning: {} not found, using bundled configuration", cli.config);
        Config::bundled()
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration {}: {:#}", cli.config, e);
            return ExitCode::from(EXIT_STARTUP_ERROR);
        }
    };

    let _telemetry = match bar_replay::telemetry::init_telemetry(&config.telemetry) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize telemetry: {:#}", e);
            return ExitCode::from(EXIT_STARTUP_ERROR);
        }
    };

    let runtime = match Runtime::start(config).await {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Startup failed: {:#}", e);
            return ExitCode::from(EXIT_STARTUP_ERROR);
        }
    };

    let result = match cli.command.unwrap_or(Commands::Watch(WatchArgs::default())) {
        Commands::Watch(args) => {
            tracing::info!("Starting watch mode");
            args.execute(&runtime).await
        }
        Commands::Simulate(args) => {
            tracing::info!("Starting simulation");
            args.execute(&runtime).await
        }
        Commands::CleanSims => CleanTarget::Simulations.execute(&runtime).await,
        Commands::CleanHistory => CleanTarget::History.execute(&runtime).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::from(EXIT_RUN_ERROR)
        }
    }
}
