use std::process::{Child, Command};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{CombyError, Result};

/// Tracing target for process lifecycle operations.
const PROCESS_TARGET: &str = "comby_client::process";

/// How long a signalled group gets to exit before it is killed outright.
const TERMINATE_GRACE: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Exclusive owner of a child process running in its own process group.
///
/// The whole group is sent `SIGTERM` and the child reaped exactly once,
/// either through [`ProcessGroupGuard::terminate`] or when the guard is
/// dropped. Nothing else may signal or wait on the child.
#[derive(Debug)]
pub struct ProcessGroupGuard {
	child: Option<Child>,
	label: String,
}

impl ProcessGroupGuard {
	/// Spawn `command` as the leader of a new process group.
	pub fn spawn(mut command: Command, label: impl Into<String>) -> Result<Self> {
		let label = label.into();

		#[cfg(unix)]
		{
			use std::os::unix::process::CommandExt;
			command.process_group(0);
		}

		let child = command.spawn().map_err(|source| CombyError::Spawn {
			command: label.clone(),
			source,
		})?;

		debug!(target: PROCESS_TARGET, pid = child.id(), command = %label, "spawned process group");

		Ok(ProcessGroupGuard {
			child: Some(child),
			label,
		})
	}

	/// Process id of the group leader, until it has been reaped.
	pub fn id(&self) -> Option<u32> {
		self.child.as_ref().map(Child::id)
	}

	/// Whether the child is still alive.
	pub fn is_running(&mut self) -> bool {
		match self.child.as_mut() {
			Some(child) => matches!(child.try_wait(), Ok(None)),
			None => false,
		}
	}

	/// Exit code of the child if it has already exited on its own (-1 for a
	/// signal), without reaping the guard.
	pub fn exited(&mut self) -> Option<i32> {
		let child = self.child.as_mut()?;
		match child.try_wait() {
			Ok(Some(status)) => Some(status.code().unwrap_or(-1)),
			_ => None,
		}
	}

	/// Signal the group and reap the child.
	///
	/// Returns `true` on the call that tore the process down and `false` on
	/// every later call.
	pub fn terminate(&mut self) -> Result<bool> {
		let Some(mut child) = self.child.take() else {
			return Ok(false);
		};

		let pid = child.id();
		signal_group(pid, &mut child);

		let deadline = Instant::now() + TERMINATE_GRACE;
		loop {
			match child.try_wait().map_err(CombyError::Io)? {
				Some(status) => {
					debug!(target: PROCESS_TARGET, pid, ?status, command = %self.label, "process group exited");
					return Ok(true);
				}
				None if Instant::now() >= deadline => {
					warn!(
						target: PROCESS_TARGET,
						pid,
						command = %self.label,
						"process group ignored SIGTERM, killing"
					);
					kill_group(pid, &mut child);
					child.wait().map_err(CombyError::Io)?;
					return Ok(true);
				}
				None => thread::sleep(POLL_INTERVAL),
			}
		}
	}
}

impl Drop for ProcessGroupGuard {
	fn drop(&mut self) {
		if let Err(err) = self.terminate() {
			warn!(target: PROCESS_TARGET, command = %self.label, error = %err, "failed to tear down process group");
		}
	}
}

#[cfg(unix)]
fn send_to_group(pid: u32, signal: libc::c_int) -> std::io::Result<()> {
	// SAFETY: `killpg(2)` is memory-safe for any argument; an unknown group
	// makes the kernel return ESRCH.
	let result = unsafe { libc::killpg(pid as libc::pid_t, signal) };
	if result == 0 {
		Ok(())
	} else {
		Err(std::io::Error::last_os_error())
	}
}

#[cfg(unix)]
fn signal_group(pid: u32, child: &mut Child) {
	if let Err(err) = send_to_group(pid, libc::SIGTERM) {
		// ESRCH: the group is already gone and only needs reaping.
		if err.raw_os_error() != Some(libc::ESRCH) {
			warn!(target: PROCESS_TARGET, pid, error = %err, "failed to signal process group");
			drop(child.kill());
		}
	}
}

#[cfg(unix)]
fn kill_group(pid: u32, child: &mut Child) {
	if send_to_group(pid, libc::SIGKILL).is_err() {
		drop(child.kill());
	}
}

#[cfg(not(unix))]
fn signal_group(_pid: u32, child: &mut Child) {
	drop(child.kill());
}

#[cfg(not(unix))]
fn kill_group(_pid: u32, child: &mut Child) {
	drop(child.kill());
}
