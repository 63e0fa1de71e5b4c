//! # Tomy Log Monitor
//!
//! Owner of the shared log ring buffer. Creates the segment, its lock and
//! its semaphore, then writes every record posted by the daemons to stdout
//! until SIGINT or SIGTERM.
//!
//! # Usage
//!
//! ```bash
//! tomy_logmonitor --config /usr/local/etc/tomygateway/config/param.conf
//!
//! # Verbose framework diagnostics as JSON on stderr
//! tomy_logmonitor -v --json > gateway.log
//! ```

#![deny(warnings)]

use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use tomy::consts::DEFAULT_CONFIG_FILE;
use tomy::prelude::{FrameConfig, LogLevel};
use tomy_frame::{ProcessArgs, ProcessContext, SegmentRole, install_signal_handlers};
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;

/// Tomy Log Monitor - drains the shared log ring buffer
#[derive(Parser, Debug)]
#[command(name = "tomy_logmonitor")]
#[command(author = "tomy-tech")]
#[command(version)]
#[command(about = "Drains the shared log ring buffer to stdout")]
#[command(long_about = None)]
struct Args {
    /// Path to the framework configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output diagnostics in JSON format
    #[arg(long)]
    json: bool,
}

fn main() {
    if let Err(e) = run() {
        error!("Log monitor failed: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = FrameConfig::load_validated(&args.config);
    let level = config
        .as_ref()
        .map(|config| config.shared.log_level)
        .unwrap_or_default();
    setup_tracing(&args, level);

    info!("Tomy Log Monitor v{} starting...", env!("CARGO_PKG_VERSION"));
    let config = config?;
    info!(
        service = %config.shared.service_name,
        "Configuration loaded from {}",
        args.config.display()
    );

    install_signal_handlers()?;
    let ctx = ProcessContext::new(ProcessArgs::from_env(config), SegmentRole::Owner)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut written: u64 = 0;
    while let Some(record) = ctx.get_log()? {
        writeln!(out, "{}", record.as_str())?;
        ctx.release_log(record);
        out.flush()?;
        written += 1;
    }

    info!(written, "Log monitor shutdown complete");
    Ok(())
}

/// Setup tracing subscriber from CLI arguments and the configured level.
fn setup_tracing(args: &Args, configured: LogLevel) {
    let directive: Directive = if args.verbose {
        Level::DEBUG.into()
    } else {
        configured
            .as_directive()
            .parse()
            .unwrap_or_else(|_| Level::INFO.into())
    };

    let filter = EnvFilter::from_default_env().add_directive(directive);

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}
