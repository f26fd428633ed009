//! Process execution for the engine.
//!
//! This module handles:
//! - Running a shell command line with piped stdin and captured output
//! - Shell quoting of engine arguments
//! - Owning long-lived engine processes and their process groups

pub mod process_group;
pub mod shell;

pub use process_group::ProcessGroupGuard;

use crate::error::{CombyError, DecodeErrorKind, Result};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::thread;

/// Captured result of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
	/// Exit code, or -1 when the process was killed by a signal.
	pub code: i32,
	/// Raw stdout; see [`CommandOutput::stdout_text`].
	pub stdout: Vec<u8>,
	pub stderr: String,
}

impl CommandOutput {
	pub fn success(&self) -> bool {
		self.code == 0
	}

	/// Stdout as UTF-8 text.
	pub fn stdout_text(self) -> Result<String> {
		String::from_utf8(self.stdout).map_err(|err| {
			CombyError::malformed("stdout", DecodeErrorKind::InvalidValue, err.to_string())
		})
	}
}

/// Command lines are quoted by [`shell::quote`], which only a POSIX shell
/// understands.
#[cfg(unix)]
fn shell_command(command_line: &str) -> Result<Command> {
	let mut cmd = Command::new("sh");
	cmd.arg("-c").arg(command_line);
	Ok(cmd)
}

#[cfg(not(unix))]
fn shell_command(_command_line: &str) -> Result<Command> {
	Err(CombyError::UnsupportedOperation {
		operation: "run_shell",
		reason: "engine command lines need a POSIX shell",
	})
}

/// Run a command line through the shell and capture its output.
///
/// When `input` is given it is written to the child's stdin from a separate
/// thread while stdout and stderr are drained, so neither side can stall on
/// a full pipe. A child that exits without reading all of its input is not
/// an error here; its exit status decides.
///
/// Unix only; on other platforms this fails with
/// [`CombyError::UnsupportedOperation`].
pub fn run_shell(command_line: &str, input: Option<&str>) -> Result<CommandOutput> {
	let mut cmd = shell_command(command_line)?;
	cmd.stdin(if input.is_some() {
		Stdio::piped()
	} else {
		Stdio::null()
	})
	.stdout(Stdio::piped())
	.stderr(Stdio::piped());

	let mut child = cmd.spawn().map_err(|source| CombyError::Spawn {
		command: command_line.to_string(),
		source,
	})?;

	let output = thread::scope(|scope| -> io::Result<Output> {
		let writer = match (child.stdin.take(), input) {
			(Some(mut pipe), Some(text)) => {
				Some(scope.spawn(move || pipe.write_all(text.as_bytes())))
			}
			_ => None,
		};

		let output = child.wait_with_output()?;

		if let Some(handle) = writer {
			match handle.join() {
				Ok(Ok(())) => {}
				Ok(Err(err)) if err.kind() == ErrorKind::BrokenPipe => {}
				Ok(Err(err)) => return Err(err),
				Err(_) => return Err(io::Error::other("stdin writer thread panicked")),
			}
		}
		Ok(output)
	})
	.map_err(CombyError::Io)?;

	Ok(CommandOutput {
		code: output.status.code().unwrap_or(-1),
		stdout: output.stdout,
		stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
	})
}

/// Resolve a command name to its full path.
///
/// If the command is already an absolute path, returns it as-is.
/// Otherwise, searches PATH for the command.
pub fn resolve_command(command: &str) -> Option<PathBuf> {
	let path = Path::new(command);

	if path.is_absolute() {
		return path.exists().then(|| path.to_path_buf());
	}

	if let Ok(path_var) = std::env::var("PATH") {
		for dir in std::env::split_paths(&path_var) {
			let full_path = dir.join(command);
			if full_path.exists() {
				return Some(full_path);
			}
		}
	}

	None
}
