//! Command-line configuration.

use clap::Parser;

/// Authoritative Fivefold game server
#[derive(Parser, Debug, Clone)]
#[command(name = "fivefold-api")]
#[command(about = "Seats two players and serves the authoritative Fivefold game")]
#[command(version)]
pub struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:3000")]
    pub bind: String,

    /// Log level (trace, debug, info, warn, error), overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Events buffered per WebSocket subscriber before it starts skipping
    #[arg(long, default_value_t = 64)]
    pub event_buffer: usize,
}
