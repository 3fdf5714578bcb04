//! In-process stand-in host.
//!
//! Selected by the `mock` application kind. No process is launched; calls
//! are answered in the coordinator's own process, which lets the whole
//! pipeline run without a real host.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use hostrun_protocol::{Method, RunContext, RunParams, RunReply, TestOutcome};
use hostrun_runtime::{Error, HostProcess, RemoteProxy, Result};
use parking_lot::Mutex;
use serde_json::Value;

/// Test setting selecting the outcome the stand-in reports for a test.
pub const MOCK_OUTCOME: &str = "mock.outcome";

/// [`RemoteProxy`] answered in-process.
///
/// Every test passes unless its `mock.outcome` setting names another outcome.
#[derive(Debug, Default)]
pub struct MockProxy {
	initialized: AtomicBool,
	closed: AtomicBool,
	calls: Mutex<Vec<Method>>,
}

impl MockProxy {
	pub fn new() -> Self {
		Self::default()
	}

	/// Methods received so far, in order.
	pub fn calls(&self) -> Vec<Method> {
		self.calls.lock().clone()
	}

	fn record(&self, method: Method) -> Result<()> {
		if self.closed.load(Ordering::SeqCst) {
			return Err(Error::ChannelClosed);
		}
		tracing::debug!(target = "hostrun.session", call = %method, "stand-in host call");
		self.calls.lock().push(method);
		Ok(())
	}
}

#[async_trait]
impl RemoteProxy for MockProxy {
	async fn ping(&self) -> Result<()> {
		self.record(Method::Ping)
	}

	async fn is_initialized(&self) -> Result<bool> {
		self.record(Method::IsInitialized)?;
		Ok(self.initialized.load(Ordering::SeqCst))
	}

	async fn initialize(&self, _run: &RunContext) -> Result<()> {
		self.record(Method::Initialize)?;
		self.initialized.store(true, Ordering::SeqCst);
		Ok(())
	}

	async fn run(&self, params: &RunParams) -> Result<RunReply> {
		self.record(Method::Run)?;
		let outcome = match params.test.settings.get(MOCK_OUTCOME) {
			Some(raw) => raw.parse::<TestOutcome>().map_err(|message| Error::Remote {
				name: Some("MockHost".into()),
				message,
				stack: None,
			})?,
			None => TestOutcome::Passed,
		};
		Ok(RunReply {
			outcome,
			message: Some(format!("{} {outcome} on stand-in host", params.test.name)),
		})
	}

	async fn abort(&self) -> Result<()> {
		self.record(Method::Abort)
	}

	async fn pause(&self) -> Result<()> {
		self.record(Method::Pause)
	}

	async fn resume(&self) -> Result<()> {
		self.record(Method::Resume)
	}

	async fn stop(&self) -> Result<()> {
		self.record(Method::Stop)
	}

	async fn cleanup(&self) -> Result<()> {
		self.record(Method::Cleanup)?;
		self.initialized.store(false, Ordering::SeqCst);
		Ok(())
	}

	async fn receive_message(&self, _payload: &Value) -> Result<()> {
		self.record(Method::ReceiveMessage)
	}

	async fn pre_test_run_finished(&self, _run: &RunContext) -> Result<()> {
		self.record(Method::PreTestRunFinished)
	}

	fn close(&self) {
		self.closed.store(true, Ordering::SeqCst);
	}
}

/// Process handle for the stand-in: the coordinator's own process.
#[derive(Debug, Default)]
pub struct InProcessHost {
	released: bool,
}

impl InProcessHost {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl HostProcess for InProcessHost {
	fn pid(&self) -> Option<u32> {
		Some(std::process::id())
	}

	fn has_exited(&mut self) -> bool {
		self.released
	}

	async fn shutdown(&mut self, _grace: Duration) -> Result<()> {
		self.released = true;
		Ok(())
	}

	async fn kill(&mut self) -> Result<()> {
		self.released = true;
		Ok(())
	}
}
