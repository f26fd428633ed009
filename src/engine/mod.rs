//! The engine capability set and its transports.
//!
//! Callers depend on the [`Engine`] trait only. Three transports implement
//! it:
//! - [`CombyBinary`] runs a local engine executable per request
//! - [`CombyHttp`] talks to a long-running engine server
//! - [`EphemeralServer`] launches a private server and owns its lifetime

pub mod binary;
pub mod http;
pub mod server;

pub use binary::CombyBinary;
pub use http::{ClientState, CombyHttp, HttpOptions};
pub use server::{EphemeralServer, ServerOptions};

use crate::error::Result;
use crate::model::{Arguments, Matches};

/// Matching, rewriting and substitution through the external engine.
pub trait Engine {
	/// Version string reported by the engine.
	fn version(&self) -> Result<String>;

	/// Find every match of `template` in `source`, in engine order.
	///
	/// No match yields an empty sequence rather than an error. `language`
	/// selects the matcher by file extension (e.g. `.py`); `None` uses the
	/// transport's default.
	fn find_matches(&self, source: &str, template: &str, language: Option<&str>) -> Result<Matches>;

	/// Rewrite every match in the source; returns engine output verbatim.
	fn rewrite(&self, request: &Rewrite<'_>) -> Result<String>;

	/// Fill the holes of `template` with `args`, without a matching phase.
	///
	/// One trailing line separator added by the engine is removed.
	fn substitute(&self, template: &str, args: &Arguments, language: Option<&str>) -> Result<String>;
}

impl<E: Engine + ?Sized> Engine for &E {
	fn version(&self) -> Result<String> {
		(**self).version()
	}

	fn find_matches(&self, source: &str, template: &str, language: Option<&str>) -> Result<Matches> {
		(**self).find_matches(source, template, language)
	}

	fn rewrite(&self, request: &Rewrite<'_>) -> Result<String> {
		(**self).rewrite(request)
	}

	fn substitute(&self, template: &str, args: &Arguments, language: Option<&str>) -> Result<String> {
		(**self).substitute(template, args, language)
	}
}

impl<E: Engine + ?Sized> Engine for Box<E> {
	fn version(&self) -> Result<String> {
		(**self).version()
	}

	fn find_matches(&self, source: &str, template: &str, language: Option<&str>) -> Result<Matches> {
		(**self).find_matches(source, template, language)
	}

	fn rewrite(&self, request: &Rewrite<'_>) -> Result<String> {
		(**self).rewrite(request)
	}

	fn substitute(&self, template: &str, args: &Arguments, language: Option<&str>) -> Result<String> {
		(**self).substitute(template, args, language)
	}
}

/// A rewrite request.
///
/// ```
/// use comby_client::Rewrite;
///
/// let request = Rewrite::new("print('hi')", "print(:[1])", "println(:[1])")
///     .language(".py")
///     .diff(true);
/// assert!(request.wants_diff());
/// ```
#[derive(Debug, Clone)]
pub struct Rewrite<'a> {
	source: &'a str,
	match_template: &'a str,
	rewrite_template: &'a str,
	args: Arguments,
	diff: bool,
	language: Option<&'a str>,
	match_newline_at_toplevel: bool,
}

impl<'a> Rewrite<'a> {
	pub fn new(source: &'a str, match_template: &'a str, rewrite_template: &'a str) -> Self {
		Rewrite {
			source,
			match_template,
			rewrite_template,
			args: Arguments::new(),
			diff: false,
			language: None,
			match_newline_at_toplevel: false,
		}
	}

	/// Named substitutions applied to the rewrite template.
	pub fn args(mut self, args: Arguments) -> Self {
		self.args = args;
		self
	}

	/// Ask for a unified diff instead of the rewritten text.
	pub fn diff(mut self, diff: bool) -> Self {
		self.diff = diff;
		self
	}

	pub fn language(mut self, language: &'a str) -> Self {
		self.language = Some(language);
		self
	}

	pub fn match_newline_at_toplevel(mut self, enabled: bool) -> Self {
		self.match_newline_at_toplevel = enabled;
		self
	}

	pub fn source(&self) -> &'a str {
		self.source
	}

	pub fn match_template(&self) -> &'a str {
		self.match_template
	}

	pub fn rewrite_template(&self) -> &'a str {
		self.rewrite_template
	}

	pub fn arguments(&self) -> &Arguments {
		&self.args
	}

	pub fn wants_diff(&self) -> bool {
		self.diff
	}

	pub fn language_override(&self) -> Option<&'a str> {
		self.language
	}

	pub fn matches_newline_at_toplevel(&self) -> bool {
		self.match_newline_at_toplevel
	}
}

#[cfg(windows)]
const LINE_SEPARATOR: &str = "\r\n";
#[cfg(not(windows))]
const LINE_SEPARATOR: &str = "\n";

/// Remove exactly one trailing platform line separator, if present.
pub(crate) fn strip_line_separator(mut output: String) -> String {
	if output.ends_with(LINE_SEPARATOR) {
		output.truncate(output.len() - LINE_SEPARATOR.len());
	}
	output
}
