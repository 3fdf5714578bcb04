//! Debugger attachment to launched hosts.

use async_trait::async_trait;

use crate::error::Result;

/// Attaches a debugger to a freshly launched host.
///
/// Called after the call channel is up, only when the run is being debugged.
/// A failure is terminal for the call that triggered the launch.
#[async_trait]
pub trait DebuggerAttach: Send + Sync {
	/// `mixed_mode` requests native and managed debugging together.
	async fn attach(&self, pid: u32, mixed_mode: bool) -> Result<()>;
}

/// Debugger hook that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDebugger;

#[async_trait]
impl DebuggerAttach for NoDebugger {
	async fn attach(&self, pid: u32, mixed_mode: bool) -> Result<()> {
		tracing::debug!(target = "hostrun.session", pid, mixed_mode, "no debugger configured; skipping attach");
		Ok(())
	}
}
