//! A private engine server whose lifetime is bound to a handle.

use std::process::{Command, Stdio};

use tracing::{info, warn};

use crate::config::ServerSettings;
use crate::engine::http::{CombyHttp, HttpOptions};
use crate::engine::{Engine, Rewrite};
use crate::error::{CombyError, Result};
use crate::exec::ProcessGroupGuard;
use crate::model::{Arguments, Matches};

/// Tracing target for ephemeral server lifecycle.
const SERVER_TARGET: &str = "comby_client::server";

/// Default command that starts the engine server.
pub const DEFAULT_SERVER_COMMAND: &str = "comby-server";

/// Default local port for an ephemeral server.
pub const DEFAULT_PORT: u16 = 8888;

/// How to launch an ephemeral server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerOptions {
	/// Executable started as `<command> -p <port>`.
	pub command: String,
	pub port: u16,
	/// Let the server write to this process's stdout and stderr.
	pub verbose: bool,
	pub http: HttpOptions,
}

impl Default for ServerOptions {
	fn default() -> Self {
		ServerOptions {
			command: DEFAULT_SERVER_COMMAND.to_string(),
			port: DEFAULT_PORT,
			verbose: false,
			http: HttpOptions::default(),
		}
	}
}

impl ServerOptions {
	pub fn from_settings(settings: &ServerSettings) -> Self {
		ServerOptions {
			command: settings.command.clone(),
			port: settings.port,
			verbose: settings.verbose,
			http: HttpOptions::from_settings(settings),
		}
	}

	fn local_url(&self) -> String {
		format!("http://127.0.0.1:{}", self.port)
	}
}

/// An engine server started for this handle alone.
///
/// The server runs in its own process group. The group is terminated
/// exactly once: by [`EphemeralServer::shutdown`] or when the handle is
/// dropped, whichever comes first. Requests after shutdown fail with
/// [`CombyError::Closed`].
#[derive(Debug)]
pub struct EphemeralServer {
	client: CombyHttp,
	process: ProcessGroupGuard,
}

impl EphemeralServer {
	/// Start the server and wait until it answers status probes.
	///
	/// If the server exits or never becomes ready, the process group is torn
	/// down before the error is returned.
	pub fn launch(options: &ServerOptions) -> Result<Self> {
		let mut command = Command::new(&options.command);
		command.arg("-p").arg(options.port.to_string()).stdin(Stdio::null());
		if !options.verbose {
			command.stdout(Stdio::null()).stderr(Stdio::null());
		}

		info!(
			target: SERVER_TARGET,
			command = %options.command,
			port = options.port,
			"launching ephemeral engine server"
		);
		let mut process = ProcessGroupGuard::spawn(command, options.command.clone())?;

		let connected = CombyHttp::connect_while(&options.local_url(), options.http, || {
			match process.exited() {
				Some(code) => Err(CombyError::EngineInvocation {
					code,
					stderr: format!("{} exited before becoming ready", options.command),
				}),
				None => Ok(()),
			}
		});

		match connected {
			Ok(client) => {
				info!(target: SERVER_TARGET, pid = ?process.id(), url = %client.base_url(), "ephemeral server ready");
				Ok(EphemeralServer { client, process })
			}
			Err(err) => {
				warn!(target: SERVER_TARGET, command = %options.command, error = %err, "ephemeral server failed to start");
				Err(launch_failure(err, process.terminate()))
			}
		}
	}

	/// The client attached to this server.
	pub fn client(&self) -> &CombyHttp {
		&self.client
	}

	/// Process id of the server, while it is running.
	pub fn pid(&self) -> Option<u32> {
		self.process.id()
	}

	/// Close the client and terminate the server's process group.
	///
	/// Returns `true` on the call that stopped the server, `false` after.
	pub fn shutdown(&mut self) -> Result<bool> {
		self.client.close();
		let stopped = self.process.terminate()?;
		if stopped {
			info!(target: SERVER_TARGET, url = %self.client.base_url(), "ephemeral server stopped");
		}
		Ok(stopped)
	}
}

/// The launch error is what the caller sees; a failed teardown is only logged.
fn launch_failure(err: CombyError, teardown: Result<bool>) -> CombyError {
	if let Err(teardown_err) = teardown {
		warn!(target: SERVER_TARGET, error = %teardown_err, "failed to stop server after failed launch");
	}
	err
}

impl Drop for EphemeralServer {
	fn drop(&mut self) {
		if let Err(err) = self.shutdown() {
			warn!(target: SERVER_TARGET, error = %err, "failed to stop ephemeral server");
		}
	}
}

impl Engine for EphemeralServer {
	fn version(&self) -> Result<String> {
		self.client.version()
	}

	fn find_matches(&self, source: &str, template: &str, language: Option<&str>) -> Result<Matches> {
		self.client.find_matches(source, template, language)
	}

	fn rewrite(&self, request: &Rewrite<'_>) -> Result<String> {
		self.client.rewrite(request)
	}

	fn substitute(&self, template: &str, args: &Arguments, language: Option<&str>) -> Result<String> {
		self.client.substitute(template, args, language)
	}
}
