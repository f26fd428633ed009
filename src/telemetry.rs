//! Log subscriber installation for the command-line front end.
//!
//! The library only emits `tracing` events; whoever embeds it decides where
//! they go. `comby-client` calls [`initialise`] once at startup.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::{Subscriber, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

use crate::config::{LogFormat, LoggingSettings};

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
	#[error("invalid log filter: {0}")]
	Filter(String),

	#[error("failed to install log subscriber: {0}")]
	Subscriber(SetGlobalDefaultError),
}

/// Install the global subscriber on the first call; later calls are no-ops.
///
/// `RUST_LOG`, when set, replaces the configured filter.
pub fn initialise(settings: &LoggingSettings) -> Result<(), TelemetryError> {
	TELEMETRY_GUARD
		.get_or_try_init(|| install_subscriber(settings))
		.map(|_| ())
}

fn filter_for(settings: &LoggingSettings) -> Result<EnvFilter, TelemetryError> {
	let directives = match std::env::var(EnvFilter::DEFAULT_ENV) {
		Ok(value) if !value.trim().is_empty() => value,
		_ => settings.filter.clone(),
	};
	EnvFilter::try_new(&directives).map_err(|error| TelemetryError::Filter(error.to_string()))
}

fn install_subscriber(settings: &LoggingSettings) -> Result<(), TelemetryError> {
	let filter = filter_for(settings)?;

	let builder = |filter: EnvFilter| {
		fmt::Subscriber::builder()
			.with_env_filter(filter)
			.with_target(true)
			.with_level(true)
			.with_writer(io::stderr)
			.with_ansi(io::stderr().is_terminal())
			.with_timer(fmt::time::UtcTime::rfc_3339())
	};

	let subscriber: Box<dyn Subscriber + Send + Sync> = match settings.format {
		LogFormat::Json => Box::new(builder(filter).json().flatten_event(true).finish()),
		LogFormat::Compact => Box::new(builder(filter).compact().finish()),
	};

	tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}
