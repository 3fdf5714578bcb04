//! Retry and reconnect around remote calls.
//!
//! Every lifecycle call goes through [`CallDispatcher::dispatch`], which
//! brings a session up when the call belongs to a test, invokes the action
//! against the session's proxy, and retries channel failures up to the
//! [`RetryPolicy`] limit. Sessions are launched or relaunched only when the
//! policy allows restarts and the call carries a test to launch for; other
//! calls work with whatever session is already up.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use hostrun_protocol::{Method, RunContext, TestElement};
use hostrun_runtime::RemoteProxy;

use crate::config;
use crate::debugger::{DebuggerAttach, NoDebugger};
use crate::error::Error;
use crate::manager::{Liveness, SessionManager, SessionSource};
use crate::report::{ProgressSink, Reporter, RunSink};

/// Attempt limit and relaunch permission for one kind of call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
	max_attempts: u32,
	restart_session_on_failure: bool,
}

impl RetryPolicy {
	/// Two attempts, relaunching a dead host in between.
	pub const RESTART: Self = Self::new(2, true);
	/// Two attempts, never relaunching.
	pub const NO_RESTART: Self = Self::new(2, false);

	/// `max_attempts` below one is raised to one.
	pub const fn new(max_attempts: u32, restart_session_on_failure: bool) -> Self {
		Self {
			max_attempts: if max_attempts == 0 { 1 } else { max_attempts },
			restart_session_on_failure,
		}
	}

	pub const fn max_attempts(&self) -> u32 {
		self.max_attempts
	}

	pub const fn restart_session_on_failure(&self) -> bool {
		self.restart_session_on_failure
	}
}

/// What a dispatched call belongs to.
#[derive(Debug, Clone, Copy)]
pub struct CallContext<'a> {
	pub method: Method,
	pub run: &'a RunContext,
	pub test: Option<&'a TestElement>,
	/// Set for the call that drives a test run; fatal setup failures then
	/// ask the driver to stop the run.
	pub top_level: bool,
}

impl<'a> CallContext<'a> {
	pub fn new(method: Method, run: &'a RunContext) -> Self {
		Self {
			method,
			run,
			test: None,
			top_level: false,
		}
	}

	pub fn with_test(mut self, test: Option<&'a TestElement>) -> Self {
		self.test = test;
		self
	}

	pub fn top_level(mut self) -> Self {
		self.top_level = true;
		self
	}

	/// Name used in progress messages: the test if any, else the method.
	pub fn name(&self) -> String {
		match self.test {
			Some(test) => format!("test '{}'", test.name),
			None => format!("'{}'", self.method),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
	InvalidConfiguration,
	LaunchTimeout,
	LaunchFailed,
	ConnectionFailed,
	/// The call channel broke while the call was in flight.
	Channel,
	/// The host answered the call with an error.
	Remote,
	NoClientAvailable,
	Debugger,
}

/// Why a dispatched call did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallFailure {
	pub kind: FailureKind,
	pub call: String,
	pub message: String,
	/// Whether another attempt on a fresh channel could succeed.
	pub retryable: bool,
	/// Whether a failure result was already delivered to the sink.
	pub reported: bool,
}

impl CallFailure {
	fn no_client(call: &str) -> Self {
		Self {
			kind: FailureKind::NoClientAvailable,
			call: call.to_string(),
			message: Error::NoClientAvailable { call: call.to_string() }.to_string(),
			retryable: false,
			reported: false,
		}
	}

	fn from_runtime(call: &str, err: &hostrun_runtime::Error) -> Self {
		let retryable = err.is_channel_error();
		Self {
			kind: if retryable { FailureKind::Channel } else { FailureKind::Remote },
			call: call.to_string(),
			message: err.to_string(),
			retryable,
			reported: false,
		}
	}

	fn from_setup(call: &str, err: &Error) -> Self {
		let kind = match err {
			Error::InvalidConfiguration { .. } => FailureKind::InvalidConfiguration,
			Error::LaunchTimeout { .. } => FailureKind::LaunchTimeout,
			Error::Launch { .. } => FailureKind::LaunchFailed,
			Error::ConnectionFailed { .. } => FailureKind::ConnectionFailed,
			Error::DebuggerAttach { .. } => FailureKind::Debugger,
			Error::Channel(err) if !err.is_channel_error() => FailureKind::Remote,
			Error::Channel(_) => FailureKind::Channel,
			_ => FailureKind::NoClientAvailable,
		};
		Self {
			kind,
			call: call.to_string(),
			message: err.to_string(),
			retryable: false,
			reported: false,
		}
	}
}

impl fmt::Display for CallFailure {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.message)
	}
}

impl std::error::Error for CallFailure {}

/// Runs remote calls against the managed session.
pub struct CallDispatcher {
	sessions: SessionManager,
	sink: Arc<dyn RunSink>,
	debugger: Arc<dyn DebuggerAttach>,
}

impl CallDispatcher {
	pub fn new(sessions: SessionManager, sink: Arc<dyn RunSink>) -> Self {
		Self {
			sessions,
			sink,
			debugger: Arc::new(NoDebugger),
		}
	}

	pub fn with_debugger(mut self, debugger: Arc<dyn DebuggerAttach>) -> Self {
		self.debugger = debugger;
		self
	}

	pub fn sessions(&self) -> &SessionManager {
		&self.sessions
	}

	pub fn sink(&self) -> &dyn RunSink {
		&*self.sink
	}

	/// Invokes `action` against the current session's proxy.
	///
	/// With a restarting policy and a test in `ctx`, the session is first
	/// brought up and initialized for that test.
	///
	/// Channel failures are reported as progress, the broken proxy is
	/// dropped, and the call is retried up to `policy.max_attempts()` times.
	/// Host-side errors end the call at once.
	pub async fn dispatch<T, F, Fut>(&self, ctx: &CallContext<'_>, policy: RetryPolicy, action: F) -> Result<T, CallFailure>
	where
		F: Fn(Arc<dyn RemoteProxy>) -> Fut,
		Fut: Future<Output = hostrun_runtime::Result<T>>,
	{
		let reporter = Reporter::new(&*self.sink, ctx.run, ctx.test);
		let call = ctx.name();
		let max_attempts = policy.max_attempts();

		let may_launch = policy.restart_session_on_failure() && ctx.test.is_some();
		if may_launch {
			self.ensure_initialized(ctx, &reporter).await?;
		}

		for attempt in 1..=max_attempts {
			if attempt > 1 {
				reporter.progress(&format!("Retrying {call} (attempt {attempt} of {max_attempts})"));
				tracing::info!(target = "hostrun.dispatch", call = %call, attempt, "retrying call");
			}

			let liveness = self.sessions.probe().await;
			if liveness != Liveness::Alive {
				tracing::debug!(target = "hostrun.dispatch", call = %call, ?liveness, "session not usable");
				self.sessions.close().await;
				if may_launch {
					self.ensure_initialized(ctx, &reporter).await?;
				} else {
					reporter.progress(&format!("No host client available for {call}"));
					return Err(CallFailure::no_client(&call));
				}
			}

			let Some(proxy) = self.sessions.current().and_then(|session| session.proxy()) else {
				return Err(CallFailure::no_client(&call));
			};

			let err = match action(proxy).await {
				Ok(value) => return Ok(value),
				Err(err) => err,
			};

			let failure = CallFailure::from_runtime(&call, &err);
			if !failure.retryable {
				tracing::debug!(target = "hostrun.dispatch", call = %call, error = %err, "host rejected call");
				return Err(failure);
			}

			reporter.progress(&channel_failure_message(&call, attempt, max_attempts, &err));
			tracing::warn!(target = "hostrun.dispatch", call = %call, attempt, error = %err, "call channel failed");
			if let Some(session) = self.sessions.current() {
				session.drop_proxy();
			}
		}

		Err(CallFailure::no_client(&call))
	}

	/// Brings up and initializes the session for the call's test.
	///
	/// A failure here is terminal for the call: it is reported, and for a
	/// top-level call the run is asked to stop.
	async fn ensure_initialized(&self, ctx: &CallContext<'_>, reporter: &Reporter<'_>) -> Result<(), CallFailure> {
		let Err(err) = self.initialize_session(ctx, reporter).await else {
			return Ok(());
		};

		let call = ctx.name();
		let mut failure = CallFailure::from_setup(&call, &err);
		tracing::error!(target = "hostrun.dispatch", call = %call, run_id = %ctx.run.run_id, error = %err, "failed to prepare host session");
		reporter.result(
			hostrun_protocol::TestOutcome::Error,
			format!("Failed to prepare host for {call}: {err}"),
			Some(&err as &dyn fmt::Debug),
		);
		if ctx.top_level {
			reporter.request_stop();
		}
		failure.reported = true;
		Err(failure)
	}

	async fn initialize_session(&self, ctx: &CallContext<'_>, progress: &dyn ProgressSink) -> crate::Result<()> {
		let config = config::resolve(ctx.test.map(|test| &test.settings), &ctx.run.settings)?;
		let connected = self.sessions.connect(&config.key, config.launch_timeout, progress).await?;

		if ctx.run.debugging && connected.source == SessionSource::Launched {
			if let Some(pid) = connected.session.pid() {
				if let Err(err) = self.debugger.attach(pid, config.debug_mixed_mode).await {
					// Reuse skips the attach, so a host without the debugger is closed here.
					tracing::warn!(target = "hostrun.dispatch", pid, error = %err, "closing host the debugger could not attach to");
					self.sessions.close().await;
					return Err(err);
				}
			}
		}

		let proxy = connected.session.proxy().ok_or(hostrun_runtime::Error::ChannelClosed)?;
		if !proxy.is_initialized().await? {
			proxy.initialize(ctx.run).await?;
		}
		Ok(())
	}
}

/// Progress text for a channel failure. Debug builds include the full error.
fn channel_failure_message(call: &str, attempt: u32, max_attempts: u32, err: &hostrun_runtime::Error) -> String {
	if cfg!(debug_assertions) {
		format!("Call to {call} failed (attempt {attempt} of {max_attempts}): {err:?}")
	} else {
		format!("Call to {call} failed (attempt {attempt} of {max_attempts}): {err}")
	}
}
