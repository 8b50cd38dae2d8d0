//! Logging initialization shared by FleetGo binaries
//!
//! Filter resolution order:
//! 1. CLI flags (`-v/-q`)
//! 2. `RUST_LOG`
//! 3. The binary's default filter

use anyhow::Result;
use clap_verbosity_flag::{LogLevel, Verbosity};
use serde::{Deserialize, Serialize};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format for the fmt layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

fn resolve_filter<L: LogLevel>(
    verbosity: &Verbosity<L>,
    default_filter: &str,
) -> Result<EnvFilter> {
    if let Some(level) = verbosity.log_level() {
        return Ok(EnvFilter::try_new(level.to_string())?);
    }
    Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
}

/// Install the global tracing subscriber. Output goes to stderr so that
/// command output on stdout stays machine-readable.
///
/// ```no_run
/// use clap::Parser;
/// use clap_verbosity_flag::{InfoLevel, Verbosity};
/// use fleetgo_common::logging::{self, LogFormat};
///
/// #[derive(Parser)]
/// struct Args {
///     #[clap(flatten)]
///     verbosity: Verbosity<InfoLevel>,
/// }
///
/// let args = Args::parse();
/// logging::init_logging(&args.verbosity, "fleetgo_rental=info", LogFormat::Compact).unwrap();
/// ```
pub fn init_logging<L: LogLevel>(
    verbosity: &Verbosity<L>,
    default_filter: &str,
    format: LogFormat,
) -> Result<()> {
    let filter = resolve_filter(verbosity, default_filter)?;
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Compact => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .compact(),
            )
            .try_init()?,
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .json()
                    .with_current_span(false),
            )
            .try_init()?,
    }

    Ok(())
}
