use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{CombyError, Result};

/// Top-level configuration from a `.comby-client.toml` file.
///
/// Every setting is optional so that files in the cascade can be layered
/// field by field; [`Settings::resolve`] fills the gaps with defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
	/// If true, stop the directory walk here and go straight to the user config.
	#[serde(default)]
	pub root: bool,

	/// Environment variable name that, if truthy, skips ~/.comby-client.toml.
	/// Useful for CI environments.
	#[serde(default)]
	pub user_config_disable_env_var: Option<String>,

	#[serde(default)]
	pub engine: EngineSection,

	#[serde(default)]
	pub server: ServerSection,

	#[serde(default)]
	pub logging: LoggingSection,
}

/// `[engine]`: the binary transport.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct EngineSection {
	/// Command that starts the engine; may include leading words.
	pub binary: Option<String>,
	/// Default matcher, as a file extension such as `.py`.
	pub language: Option<String>,
}

/// `[server]`: the HTTP transport and ephemeral servers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ServerSection {
	pub command: Option<String>,
	pub port: Option<u16>,
	/// An already running server to use instead of launching one.
	pub url: Option<String>,
	pub timeout_secs: Option<u64>,
	pub connection_timeout_secs: Option<u64>,
	pub probe_interval_ms: Option<u64>,
	pub verbose: Option<bool>,
}

/// `[logging]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct LoggingSection {
	/// `tracing` filter directive, e.g. `comby_client=debug`.
	pub filter: Option<String>,
	pub format: Option<LogFormat>,
}

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
	#[default]
	Compact,
	Json,
}

/// A loaded configuration with its source path for debugging/display.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
	/// The parsed configuration.
	pub config: FileConfig,

	/// The path this config was loaded from.
	pub path: PathBuf,
}

impl FileConfig {
	/// Fill every setting still unset here from `farther`.
	pub fn layer_under(&mut self, farther: &FileConfig) {
		fill(&mut self.user_config_disable_env_var, &farther.user_config_disable_env_var);

		fill(&mut self.engine.binary, &farther.engine.binary);
		fill(&mut self.engine.language, &farther.engine.language);

		let server = &mut self.server;
		fill(&mut server.command, &farther.server.command);
		fill(&mut server.port, &farther.server.port);
		fill(&mut server.url, &farther.server.url);
		fill(&mut server.timeout_secs, &farther.server.timeout_secs);
		fill(&mut server.connection_timeout_secs, &farther.server.connection_timeout_secs);
		fill(&mut server.probe_interval_ms, &farther.server.probe_interval_ms);
		fill(&mut server.verbose, &farther.server.verbose);

		fill(&mut self.logging.filter, &farther.logging.filter);
		fill(&mut self.logging.format, &farther.logging.format);
	}
}

fn fill<T: Clone>(slot: &mut Option<T>, fallback: &Option<T>) {
	if slot.is_none() {
		slot.clone_from(fallback);
	}
}

/// Effective engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct EngineSettings {
	pub binary: String,
	pub language: String,
}

/// Effective server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ServerSettings {
	pub command: String,
	pub port: u16,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub url: Option<String>,
	pub timeout_secs: u64,
	pub connection_timeout_secs: u64,
	pub probe_interval_ms: u64,
	pub verbose: bool,
}

/// Effective logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct LoggingSettings {
	pub filter: String,
	pub format: LogFormat,
}

/// Fully resolved configuration: merged cascade, defaults, and overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
	pub engine: EngineSettings,
	pub server: ServerSettings,
	pub logging: LoggingSettings,

	/// Config files that contributed, nearest first.
	#[serde(skip)]
	pub sources: Vec<PathBuf>,
}

impl Default for Settings {
	fn default() -> Self {
		Settings::resolve(FileConfig::default())
	}
}

/// Environment variable that overrides `engine.binary`.
pub const BINARY_ENV_VAR: &str = "COMBY_BIN";

impl Settings {
	/// Apply defaults to whatever the merged config leaves unset.
	pub fn resolve(merged: FileConfig) -> Self {
		let server = merged.server;
		Settings {
			engine: EngineSettings {
				binary: merged
					.engine
					.binary
					.unwrap_or_else(|| crate::engine::binary::DEFAULT_LOCATION.to_string()),
				language: merged
					.engine
					.language
					.unwrap_or_else(|| crate::engine::binary::DEFAULT_LANGUAGE.to_string()),
			},
			server: ServerSettings {
				command: server
					.command
					.unwrap_or_else(|| crate::engine::server::DEFAULT_SERVER_COMMAND.to_string()),
				port: server.port.unwrap_or(crate::engine::server::DEFAULT_PORT),
				url: server.url,
				timeout_secs: server.timeout_secs.unwrap_or(30),
				connection_timeout_secs: server.connection_timeout_secs.unwrap_or(30),
				probe_interval_ms: server.probe_interval_ms.unwrap_or(50),
				verbose: server.verbose.unwrap_or(false),
			},
			logging: LoggingSettings {
				filter: merged
					.logging
					.filter
					.unwrap_or_else(|| "comby_client=info".to_string()),
				format: merged.logging.format.unwrap_or_default(),
			},
			sources: Vec::new(),
		}
	}

	/// Apply environment overrides; `lookup` reads a variable by name.
	pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
		if let Some(binary) = lookup(BINARY_ENV_VAR).filter(|value| !value.trim().is_empty()) {
			self.engine.binary = binary;
		}
	}

	/// Check the constraints a usable configuration must meet.
	pub fn validate(&self) -> Result<()> {
		if self.engine.binary.trim().is_empty() {
			return Err(invalid("engine.binary", "must not be empty"));
		}
		if !self.engine.language.starts_with('.') || self.engine.language.len() < 2 {
			return Err(invalid(
				"engine.language",
				format!("expected a file extension such as `.c`, got `{}`", self.engine.language),
			));
		}
		if self.server.command.trim().is_empty() {
			return Err(invalid("server.command", "must not be empty"));
		}
		if self.server.port == 0 {
			return Err(invalid("server.port", "must be between 1 and 65535"));
		}
		if let Some(ref url) = self.server.url
			&& let Err(err) = url::Url::parse(url)
		{
			return Err(invalid("server.url", format!("`{url}` is not a URL: {err}")));
		}
		for (key, value) in [
			("server.timeout-secs", self.server.timeout_secs),
			("server.connection-timeout-secs", self.server.connection_timeout_secs),
			("server.probe-interval-ms", self.server.probe_interval_ms),
		] {
			if value == 0 {
				return Err(invalid(key, "must be greater than zero"));
			}
		}
		if self.logging.filter.trim().is_empty() {
			return Err(invalid("logging.filter", "must not be empty"));
		}
		Ok(())
	}
}

fn invalid(key: &str, message: impl Into<String>) -> CombyError {
	CombyError::InvalidConfig {
		key: key.to_string(),
		message: message.into(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults() {
		let settings = Settings::default();
		assert_eq!(settings.engine.binary, "comby");
		assert_eq!(settings.engine.language, ".c");
		assert_eq!(settings.server.command, "comby-server");
		assert_eq!(settings.server.port, 8888);
		assert!(settings.server.url.is_none());
		assert_eq!(settings.server.timeout_secs, 30);
		assert_eq!(settings.server.connection_timeout_secs, 30);
		assert_eq!(settings.server.probe_interval_ms, 50);
		assert_eq!(settings.logging.filter, "comby_client=info");
		assert_eq!(settings.logging.format, LogFormat::Compact);
		assert!(settings.validate().is_ok());
	}

	#[test]
	fn test_layer_under_keeps_nearest_values() {
		let mut near = FileConfig::default();
		near.engine.language = Some(".py".to_string());

		let mut far = FileConfig::default();
		far.engine.language = Some(".go".to_string());
		far.engine.binary = Some("/opt/comby".to_string());
		far.server.port = Some(9999);

		near.layer_under(&far);
		assert_eq!(near.engine.language.as_deref(), Some(".py"));
		assert_eq!(near.engine.binary.as_deref(), Some("/opt/comby"));
		assert_eq!(near.server.port, Some(9999));
	}

	#[test]
	fn test_env_overrides_binary() {
		let mut settings = Settings::default();
		settings.apply_env(|name| (name == "COMBY_BIN").then(|| "docker run comby".to_string()));
		assert_eq!(settings.engine.binary, "docker run comby");

		settings.apply_env(|_| Some("  ".to_string()));
		assert_eq!(settings.engine.binary, "docker run comby");
	}

	#[test]
	fn test_validate_rejects_language_without_dot() {
		let mut settings = Settings::default();
		settings.engine.language = "python".to_string();
		match settings.validate().unwrap_err() {
			CombyError::InvalidConfig { key, .. } => assert_eq!(key, "engine.language"),
			other => panic!("Expected InvalidConfig, got {other:?}"),
		}
	}

	#[test]
	fn test_validate_rejects_zero_values() {
		let mut settings = Settings::default();
		settings.server.port = 0;
		assert!(settings.validate().is_err());

		let mut settings = Settings::default();
		settings.server.probe_interval_ms = 0;
		match settings.validate().unwrap_err() {
			CombyError::InvalidConfig { key, .. } => assert_eq!(key, "server.probe-interval-ms"),
			other => panic!("Expected InvalidConfig, got {other:?}"),
		}
	}

	#[test]
	fn test_validate_rejects_bad_url() {
		let mut settings = Settings::default();
		settings.server.url = Some("localhost without scheme".to_string());
		match settings.validate().unwrap_err() {
			CombyError::InvalidConfig { key, .. } => assert_eq!(key, "server.url"),
			other => panic!("Expected InvalidConfig, got {other:?}"),
		}
	}
}
