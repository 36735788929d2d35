mod cli;
mod simulate;
mod wiring;

use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use huddle_common::CallKey;
use huddle_config::HuddleConfig;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::filter::{Directive, LevelFilter};
use tracing_subscriber::EnvFilter;

use cli::Command;

fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        eprintln!("\n--- huddle crashed ---");
        eprintln!("Please report this issue at: https://github.com/huddle-rs/huddle/issues");
        eprintln!("----------------------\n");
        default_hook(info);
    }));
}

fn init_logging(directive: &str, log_spans: bool) {
    let directive: Directive = directive
        .parse()
        .unwrap_or_else(|_| LevelFilter::INFO.into());
    let span_events = if log_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive))
        .with_span_events(span_events)
        .init();
}

fn main() -> ExitCode {
    install_panic_hook();

    let args = cli::parse();

    // Config comes first so its log level can seed the subscriber.
    let loaded = match args.config.as_deref() {
        Some(path) => huddle_config::load_config_from(Path::new(path)),
        None => huddle_config::load_config(),
    };
    let (config, load_error) = match loaded {
        Ok(config) => (config, None),
        Err(e) => (HuddleConfig::default(), Some(e)),
    };

    let directive = match args.log_level.as_deref() {
        Some(level) => cli::log_directive(level),
        None => config.logging.level.directive().to_string(),
    };
    init_logging(&directive, config.logging.log_spans);

    tracing::info!("huddle v{} starting...", env!("CARGO_PKG_VERSION"));
    if let Some(ref path) = args.config {
        tracing::info!("Using config override: {path}");
    }

    match args.command.unwrap_or(Command::CheckConfig) {
        Command::CheckConfig => {
            if let Some(e) = load_error {
                tracing::error!("Config invalid: {e}");
                return ExitCode::FAILURE;
            }
            let connection = wiring::connection_config(&config.connection);
            tracing::info!(
                ice_servers = connection.ice_servers.len(),
                fallback_relays = connection.fallback_relays.len(),
                max_reconnect_attempts = connection.max_reconnect_attempts,
                "Config valid"
            );
            println!("{}", huddle_config::config_to_json(&config));
            ExitCode::SUCCESS
        }
        Command::Simulate {
            participants,
            seconds,
            call,
        } => {
            if let Some(e) = load_error {
                tracing::warn!("Config load failed, using defaults: {e}");
            }
            let options = simulate::SimulationOptions {
                participants,
                duration: Duration::from_secs(seconds),
                call: CallKey::new(call),
                speaking: wiring::speaking_config(&config.speaking),
                presence: wiring::presence_config(&config.presence),
            };

            let runtime = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    tracing::error!("Failed to start runtime: {e}");
                    return ExitCode::FAILURE;
                }
            };
            match runtime.block_on(simulate::run(options)) {
                Ok(_) => {
                    tracing::info!("Shutdown complete");
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    tracing::error!("Simulation failed: {e}");
                    ExitCode::FAILURE
                }
            }
        }
    }
}
