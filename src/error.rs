use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Library-level structured errors for the Comby client.
///
/// Use `thiserror` for structured errors that library consumers can match on.
/// The CLI binary wraps these with `anyhow` for rich context chains.
#[derive(Debug, thiserror::Error)]
pub enum CombyError {
	#[error("Failed to connect to the engine at {url} within {timeout:?}")]
	ConnectionFailure { url: String, timeout: Duration },

	#[error("Engine exited with non-zero exit code {code}: {stderr}")]
	EngineInvocation { code: i32, stderr: String },

	#[error("Malformed engine response ({kind}) at `{field}`: {message}")]
	MalformedResponse {
		field: String,
		kind: DecodeErrorKind,
		message: String,
	},

	#[error("Unsupported operation: {operation} ({reason})")]
	UnsupportedOperation {
		operation: &'static str,
		reason: &'static str,
	},

	#[error("Engine rejected the request with HTTP status {status}: {body}")]
	EngineRejected { status: u16, body: String },

	#[error("Client is closed; the engine is no longer available")]
	Closed,

	#[error("Invalid engine URL: {url}")]
	InvalidUrl {
		url: String,
		#[source]
		source: url::ParseError,
	},

	#[error("Failed to start the engine: {command}")]
	Spawn {
		command: String,
		#[source]
		source: std::io::Error,
	},

	#[error("I/O error while talking to the engine")]
	Io(#[source] std::io::Error),

	#[error("HTTP request to the engine failed")]
	Http(#[source] reqwest::Error),

	#[error("Failed to encode engine request")]
	Encode(#[source] serde_json::Error),

	#[error("Failed to read config file: {path}")]
	ConfigRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("Failed to parse config file: {path}")]
	ConfigParse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	#[error("Invalid configuration value for {key}: {message}")]
	InvalidConfig { key: String, message: String },

	#[error("Failed to resolve home directory")]
	HomeDirectoryNotFound,
}

/// Why an engine response could not be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErrorKind {
	/// A required key was absent.
	MissingField,
	/// A key was present with the wrong JSON type.
	TypeMismatch,
	/// A value had the right type but broke an invariant.
	InvalidValue,
	/// The payload was not valid JSON at all.
	Syntax,
}

impl fmt::Display for DecodeErrorKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			DecodeErrorKind::MissingField => "missing field",
			DecodeErrorKind::TypeMismatch => "type mismatch",
			DecodeErrorKind::InvalidValue => "invalid value",
			DecodeErrorKind::Syntax => "syntax error",
		};
		f.write_str(name)
	}
}

impl CombyError {
	pub(crate) fn malformed(
		field: impl Into<String>,
		kind: DecodeErrorKind,
		message: impl Into<String>,
	) -> Self {
		CombyError::MalformedResponse {
			field: field.into(),
			kind,
			message: message.into(),
		}
	}

	/// The engine's exit code, if this error came from a failed invocation.
	pub fn exit_code(&self) -> Option<i32> {
		match self {
			CombyError::EngineInvocation { code, .. } => Some(*code),
			_ => None,
		}
	}
}

/// Result type alias using CombyError.
pub type Result<T> = std::result::Result<T, CombyError>;
