//! Engine access over HTTP.
//!
//! The server exposes `GET /status` (204 once ready), `POST /matches`,
//! `POST /substitute` and `POST /rewrite`. A client is only handed out after
//! the status probe succeeds.

use std::cell::Cell;
use std::thread;
use std::time::{Duration, Instant};

use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::Serialize;
use tracing::{debug, info};
use url::{Host, Url};

use crate::config::ServerSettings;
use crate::engine::{Engine, Rewrite, strip_line_separator};
use crate::error::{CombyError, Result};
use crate::model::{Arguments, Matches};

/// Tracing target for HTTP operations.
const HTTP_TARGET: &str = "comby_client::http";

/// Timeouts governing an HTTP client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpOptions {
	/// Upper bound on a single request.
	pub timeout: Duration,
	/// How long to keep probing `/status` before giving up.
	pub connection_timeout: Duration,
	/// Pause between status probes.
	pub probe_interval: Duration,
}

impl Default for HttpOptions {
	fn default() -> Self {
		HttpOptions {
			timeout: Duration::from_secs(30),
			connection_timeout: Duration::from_secs(30),
			probe_interval: Duration::from_millis(50),
		}
	}
}

impl HttpOptions {
	pub fn from_settings(settings: &ServerSettings) -> Self {
		HttpOptions {
			timeout: Duration::from_secs(settings.timeout_secs),
			connection_timeout: Duration::from_secs(settings.connection_timeout_secs),
			probe_interval: Duration::from_millis(settings.probe_interval_ms),
		}
	}
}

/// Lifecycle of an HTTP client.
///
/// `Connecting` moves to `Ready` once the status probe succeeds, or to
/// `Failed` when the connection timeout elapses. Each request moves `Ready`
/// to `Busy` and back. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
	Connecting,
	Ready,
	Busy,
	Failed,
	Closed,
}

#[derive(Debug, Serialize)]
struct MatchesBody<'a> {
	source: &'a str,
	template: &'a str,
}

#[derive(Debug, Serialize)]
struct SubstituteBody<'a> {
	template: &'a str,
	arguments: &'a Arguments,
}

#[derive(Debug, Serialize)]
struct RewriteBody<'a> {
	source: &'a str,
	#[serde(rename = "match")]
	match_template: &'a str,
	rewrite: &'a str,
	arguments: &'a Arguments,
}

/// A client attached to a running engine server.
///
/// One caller thread per client: the client is `Send` but not `Sync`.
#[derive(Debug)]
pub struct CombyHttp {
	base_url: Url,
	client: Client,
	options: HttpOptions,
	state: Cell<ClientState>,
}

impl CombyHttp {
	/// Attach to the server at `base_url`, waiting until it reports ready.
	///
	/// Fails with [`CombyError::ConnectionFailure`] if `/status` does not
	/// answer 204 within `options.connection_timeout`.
	pub fn connect(base_url: &str, options: HttpOptions) -> Result<Self> {
		CombyHttp::connect_while(base_url, options, || Ok(()))
	}

	/// Like [`CombyHttp::connect`], but `alive` runs before every probe and
	/// aborts the wait by returning an error.
	pub(crate) fn connect_while(
		base_url: &str,
		options: HttpOptions,
		alive: impl FnMut() -> Result<()>,
	) -> Result<Self> {
		let parsed = Url::parse(base_url).map_err(|source| CombyError::InvalidUrl {
			url: base_url.to_string(),
			source,
		})?;
		let mut builder = Client::builder().timeout(options.timeout);
		if is_loopback(&parsed) {
			builder = builder.no_proxy();
		}
		let client = builder.build().map_err(CombyError::Http)?;

		let http = CombyHttp {
			base_url: parsed,
			client,
			options,
			state: Cell::new(ClientState::Connecting),
		};

		match http.wait_until_ready(alive) {
			Ok(()) => {
				http.state.set(ClientState::Ready);
				info!(target: HTTP_TARGET, url = %http.base_url, "connected to engine server");
				Ok(http)
			}
			Err(err) => {
				http.state.set(ClientState::Failed);
				Err(err)
			}
		}
	}

	fn wait_until_ready(&self, mut alive: impl FnMut() -> Result<()>) -> Result<()> {
		let url = self.endpoint("status")?;
		let deadline = Instant::now() + self.options.connection_timeout;
		let mut attempt = 0u32;

		loop {
			let remaining = deadline.saturating_duration_since(Instant::now());
			if remaining.is_zero() {
				break;
			}
			alive()?;
			attempt += 1;

			match self.client.get(url.clone()).timeout(remaining).send() {
				Ok(response) if response.status() == StatusCode::NO_CONTENT => return Ok(()),
				Ok(response) => {
					debug!(target: HTTP_TARGET, attempt, status = %response.status(), "engine not ready yet")
				}
				Err(err) => {
					debug!(target: HTTP_TARGET, attempt, error = %err, "status probe failed")
				}
			}

			let remaining = deadline.saturating_duration_since(Instant::now());
			thread::sleep(self.options.probe_interval.min(remaining));
		}

		Err(CombyError::ConnectionFailure {
			url: self.base_url.to_string(),
			timeout: self.options.connection_timeout,
		})
	}

	/// The base URL of the server this client is attached to.
	pub fn base_url(&self) -> &Url {
		&self.base_url
	}

	pub fn state(&self) -> ClientState {
		self.state.get()
	}

	/// Refuse all further requests.
	pub fn close(&self) {
		if self.state.get() != ClientState::Closed {
			debug!(target: HTTP_TARGET, url = %self.base_url, "closing client");
			self.state.set(ClientState::Closed);
		}
	}

	fn endpoint(&self, path: &str) -> Result<Url> {
		self.base_url
			.join(path)
			.map_err(|source| CombyError::InvalidUrl {
				url: format!("{}{path}", self.base_url),
				source,
			})
	}

	fn ensure_open(&self) -> Result<()> {
		match self.state.get() {
			ClientState::Closed => Err(CombyError::Closed),
			_ => Ok(()),
		}
	}

	/// Run one round trip: `Ready -> Busy -> Ready`, whatever the outcome,
	/// including a panic inside `send`.
	fn round_trip<T>(&self, send: impl FnOnce() -> Result<T>) -> Result<T> {
		self.ensure_open()?;
		let _busy = BusyGuard::enter(&self.state);
		send()
	}

	fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<String> {
		let url = self.endpoint(path)?;
		debug!(target: HTTP_TARGET, %url, "posting request");
		let response = self
			.client
			.post(url)
			.json(body)
			.send()
			.map_err(CombyError::Http)?;

		let status = response.status();
		let text = response.text().map_err(CombyError::Http)?;
		debug!(target: HTTP_TARGET, %status, response_bytes = text.len(), "engine responded");

		if !status.is_success() {
			return Err(CombyError::EngineRejected {
				status: status.as_u16(),
				body: text,
			});
		}
		Ok(text)
	}
}

/// Holds a client in `Busy` and hands it back as `Ready` when dropped,
/// unless it was closed meanwhile.
struct BusyGuard<'a> {
	state: &'a Cell<ClientState>,
}

impl<'a> BusyGuard<'a> {
	fn enter(state: &'a Cell<ClientState>) -> Self {
		state.set(ClientState::Busy);
		BusyGuard { state }
	}
}

impl Drop for BusyGuard<'_> {
	fn drop(&mut self) {
		if self.state.get() == ClientState::Busy {
			self.state.set(ClientState::Ready);
		}
	}
}

/// Local servers are never reached through a proxy.
fn is_loopback(url: &Url) -> bool {
	match url.host() {
		Some(Host::Ipv4(ip)) => ip.is_loopback(),
		Some(Host::Ipv6(ip)) => ip.is_loopback(),
		Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
		None => false,
	}
}

impl Engine for CombyHttp {
	fn version(&self) -> Result<String> {
		self.ensure_open()?;
		Err(CombyError::UnsupportedOperation {
			operation: "version",
			reason: "the server protocol has no version endpoint",
		})
	}

	fn find_matches(&self, source: &str, template: &str, language: Option<&str>) -> Result<Matches> {
		info!(target: HTTP_TARGET, template, source_bytes = source.len(), "finding matches");
		if let Some(language) = language {
			debug!(target: HTTP_TARGET, language, "server picks its own matcher, ignoring language");
		}
		self.round_trip(|| {
			let body = self.post("matches", &MatchesBody { source, template })?;
			let matches = Matches::from_json_array(&body, source)?;
			info!(target: HTTP_TARGET, template, count = matches.len(), "found matches");
			Ok(matches)
		})
	}

	fn rewrite(&self, request: &Rewrite<'_>) -> Result<String> {
		info!(
			target: HTTP_TARGET,
			match_template = request.match_template(),
			rewrite_template = request.rewrite_template(),
			arguments = ?request.arguments(),
			"performing rewrite"
		);
		if request.wants_diff() {
			return Err(CombyError::UnsupportedOperation {
				operation: "rewrite",
				reason: "the server protocol cannot return a diff",
			});
		}
		if request.matches_newline_at_toplevel() {
			return Err(CombyError::UnsupportedOperation {
				operation: "rewrite",
				reason: "the server protocol has no match-newline-at-toplevel option",
			});
		}
		if let Some(language) = request.language_override() {
			debug!(target: HTTP_TARGET, language, "server picks its own matcher, ignoring language");
		}
		self.round_trip(|| {
			self.post(
				"rewrite",
				&RewriteBody {
					source: request.source(),
					match_template: request.match_template(),
					rewrite: request.rewrite_template(),
					arguments: request.arguments(),
				},
			)
		})
	}

	fn substitute(&self, template: &str, args: &Arguments, language: Option<&str>) -> Result<String> {
		info!(target: HTTP_TARGET, template, arguments = ?args, "performing substitution");
		if let Some(language) = language {
			debug!(target: HTTP_TARGET, language, "server picks its own matcher, ignoring language");
		}
		self.round_trip(|| {
			let text = self.post(
				"substitute",
				&SubstituteBody {
					template,
					arguments: args,
				},
			)?;
			Ok(strip_line_separator(text))
		})
	}
}
