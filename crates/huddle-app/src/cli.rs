use clap::{Parser, Subcommand};

/// Huddle: real-time call session engine.
#[derive(Parser, Debug)]
#[command(name = "huddle", version, about)]
pub struct Args {
    /// Config file path override.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Log level override (trace, debug, info, warn, error) or a full
    /// filter directive.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Load and validate the config, then print it as JSON.
    CheckConfig,

    /// Run an in-process call with synthetic participants.
    Simulate {
        /// Number of participants to join.
        #[arg(short = 'n', long, default_value_t = 3)]
        participants: usize,

        /// How long to run, in seconds.
        #[arg(short = 's', long, default_value_t = 20)]
        seconds: u64,

        /// Call to join.
        #[arg(long, default_value = "demo")]
        call: String,
    },
}

pub fn parse() -> Args {
    Args::parse()
}

/// Expand a bare level name into a directive scoped to the huddle crates.
pub fn log_directive(level: &str) -> String {
    match level {
        "trace" | "debug" | "info" | "warn" | "error" => format!("huddle={level}"),
        other => other.to_string(),
    }
}
