//! Host process handles.
//!
//! A [`HostProcess`] is the launched side of a host session: something with
//! a process id that can be asked to exit and, failing that, terminated.

use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Child;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};

/// Handle to a launched host.
///
/// Implementations must terminate the host when dropped, so a launch that is
/// cancelled halfway never leaks a process.
#[async_trait]
pub trait HostProcess: Send {
	/// OS process id, when the host is a separate process.
	fn pid(&self) -> Option<u32>;

	/// Returns `true` once the host has exited.
	fn has_exited(&mut self) -> bool;

	/// Asks the host to exit and waits up to `grace` for it to do so.
	async fn shutdown(&mut self, grace: Duration) -> Result<()>;

	/// Terminates the host. Succeeds if it has already exited.
	async fn kill(&mut self) -> Result<()>;
}

/// A host running as a child process of the coordinator.
///
/// Graceful shutdown closes the host's stdin; hosts are expected to exit
/// when stdin reaches end of file.
#[derive(Debug)]
pub struct ChildHost {
	child: Child,
	pid: Option<u32>,
	output: Option<JoinHandle<()>>,
}

impl ChildHost {
	/// Wraps a spawned child. `output` is the task draining its stdout, if any.
	pub fn new(child: Child, output: Option<JoinHandle<()>>) -> Self {
		let pid = child.id();
		Self { child, pid, output }
	}
}

#[async_trait]
impl HostProcess for ChildHost {
	fn pid(&self) -> Option<u32> {
		self.pid
	}

	fn has_exited(&mut self) -> bool {
		!matches!(self.child.try_wait(), Ok(None))
	}

	async fn shutdown(&mut self, grace: Duration) -> Result<()> {
		drop(self.child.stdin.take());

		match tokio::time::timeout(grace, self.child.wait()).await {
			Ok(Ok(status)) => {
				tracing::debug!(target = "hostrun.runtime", pid = ?self.pid, %status, "host exited");
				Ok(())
			}
			Ok(Err(err)) => Err(Error::Io(err)),
			Err(_) => Err(Error::ShutdownTimeout(grace)),
		}
	}

	async fn kill(&mut self) -> Result<()> {
		if self.has_exited() {
			return Ok(());
		}

		#[cfg(windows)]
		{
			drop(self.child.stdout.take());
			drop(self.child.stderr.take());
		}

		self.child.kill().await?;
		Ok(())
	}
}

impl Drop for ChildHost {
	fn drop(&mut self) {
		if let Some(output) = self.output.take() {
			output.abort();
		}
		let _ = self.child.start_kill();
	}
}
