//! Engine access through a local executable.
//!
//! Each request builds an argument vector, shell-quotes it onto the
//! configured engine command, and runs it with the source text on stdin.

use serde::Serialize;
use tracing::{debug, info};

use crate::config::EngineSettings;
use crate::engine::{Engine, Rewrite, strip_line_separator};
use crate::error::{CombyError, Result};
use crate::exec::{run_shell, shell};
use crate::model::{Arguments, Matches};

/// Tracing target for binary invocations.
const BINARY_TARGET: &str = "comby_client::binary";

/// Default command used to start the engine.
pub const DEFAULT_LOCATION: &str = "comby";

/// Matcher used when a request does not name a language.
pub const DEFAULT_LANGUAGE: &str = ".c";

/// Provides access to the engine executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombyBinary {
	location: String,
	language: String,
}

impl Default for CombyBinary {
	fn default() -> Self {
		CombyBinary::new(DEFAULT_LOCATION, DEFAULT_LANGUAGE)
	}
}

/// One `{variable, value}` entry of `-substitute-only`.
#[derive(Debug, Serialize)]
struct Substitution<'a> {
	variable: &'a str,
	value: &'a str,
}

impl CombyBinary {
	/// `location` is the command that starts the engine and may include
	/// leading words of its own; `language` is the default matcher.
	pub fn new(location: impl Into<String>, language: impl Into<String>) -> Self {
		CombyBinary {
			location: location.into(),
			language: language.into(),
		}
	}

	pub fn from_settings(settings: &EngineSettings) -> Self {
		CombyBinary::new(&settings.binary, &settings.language)
	}

	pub fn location(&self) -> &str {
		&self.location
	}

	pub fn language(&self) -> &str {
		&self.language
	}

	fn pick_language<'a>(&'a self, language: Option<&'a str>) -> &'a str {
		match language {
			Some(language) => {
				info!(target: BINARY_TARGET, language, "using language override");
				language
			}
			None => {
				info!(target: BINARY_TARGET, language = %self.language, "using default language");
				&self.language
			}
		}
	}

	/// Run the engine with `args`, piping `input` to stdin when given.
	///
	/// Fails with [`CombyError::EngineInvocation`] on a non-zero exit.
	pub fn call<S: AsRef<str>>(&self, args: &[S], input: Option<&str>) -> Result<String> {
		let command_line = shell::command_line(&self.location, args);
		debug!(target: BINARY_TARGET, command = %command_line, "calling engine");
		if let Some(text) = input {
			debug!(target: BINARY_TARGET, input_bytes = text.len(), "supplying input text");
		}

		let output = run_shell(&command_line, input)?;
		debug!(target: BINARY_TARGET, code = output.code, stderr = %output.stderr, "engine exited");

		if !output.success() {
			return Err(CombyError::EngineInvocation {
				code: output.code,
				stderr: output.stderr,
			});
		}
		let stdout = output.stdout_text()?;
		debug!(target: BINARY_TARGET, stdout = %stdout, "engine output");
		Ok(stdout)
	}
}

/// Argument vector for a match-only request.
pub(crate) fn match_args<'a>(template: &'a str, language: &'a str) -> Vec<&'a str> {
	// The trailing rewrite template is required by the engine and ignored
	// under -match-only.
	vec![
		"-stdin",
		"-json-lines",
		"-match-only",
		"-matcher",
		language,
		template,
		"foo",
	]
}

/// Argument vector for a rewrite request.
pub(crate) fn rewrite_args<'a>(request: &Rewrite<'a>, language: &'a str) -> Vec<&'a str> {
	let mut args = vec![
		"-stdin",
		request.match_template(),
		request.rewrite_template(),
		"-matcher",
		language,
		if request.wants_diff() { "-diff" } else { "-stdout" },
	];
	if request.matches_newline_at_toplevel() {
		args.push("-match-newline-at-toplevel");
	}
	args
}

/// Argument vector for a substitute-only request.
pub(crate) fn substitute_args(template: &str, args: &Arguments, language: &str) -> Result<Vec<String>> {
	let substitutions: Vec<Substitution<'_>> = args
		.iter()
		.map(|(variable, value)| Substitution { variable, value })
		.collect();
	let encoded = serde_json::to_string(&substitutions).map_err(CombyError::Encode)?;
	debug!(target: BINARY_TARGET, substitutions = %encoded, "encoded substitutions");

	Ok(vec![
		"IGNORE_MATCHED_TEMPLATE".to_string(),
		template.to_string(),
		"-matcher".to_string(),
		language.to_string(),
		"-substitute-only".to_string(),
		encoded,
	])
}

impl Engine for CombyBinary {
	fn version(&self) -> Result<String> {
		Ok(self.call(&["-version"], None)?.trim().to_string())
	}

	fn find_matches(&self, source: &str, template: &str, language: Option<&str>) -> Result<Matches> {
		info!(target: BINARY_TARGET, template, source_bytes = source.len(), "finding matches");
		let language = self.pick_language(language);
		let output = self.call(&match_args(template, language), Some(source))?;
		let matches = Matches::from_json_lines(&output, source)?;
		info!(target: BINARY_TARGET, template, count = matches.len(), "found matches");
		Ok(matches)
	}

	fn rewrite(&self, request: &Rewrite<'_>) -> Result<String> {
		info!(
			target: BINARY_TARGET,
			match_template = request.match_template(),
			rewrite_template = request.rewrite_template(),
			arguments = ?request.arguments(),
			"performing rewrite"
		);
		if !request.arguments().is_empty() {
			return Err(CombyError::UnsupportedOperation {
				operation: "rewrite",
				reason: "rewrite arguments are not supported by the binary interface",
			});
		}
		let language = self.pick_language(request.language_override());
		self.call(&rewrite_args(request, language), Some(request.source()))
	}

	fn substitute(&self, template: &str, args: &Arguments, language: Option<&str>) -> Result<String> {
		info!(target: BINARY_TARGET, template, arguments = ?args, "performing substitution");
		let language = self.pick_language(language);
		let output = self.call(&substitute_args(template, args, language)?, None)?;
		Ok(strip_line_separator(output))
	}
}
