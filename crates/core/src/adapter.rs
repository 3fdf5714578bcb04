//! Lifecycle surface consumed by the test-execution driver.
//!
//! [`TestAdapter`] maps each lifecycle event onto one dispatched call with a
//! fixed [`RetryPolicy`]:
//!
//! | Call | Attempts | Relaunch |
//! |---|---|---|
//! | `run` | 2 | yes |
//! | `abort`, `pause`, `stop` | 2 | no |
//! | `resume` | 2 | no |
//! | `cleanup` | 2 | yes |
//! | `receive_message` | 2 | yes |
//! | `pre_test_run_finished` | 2 | no |
//!
//! Failures become reported results, except for `resume`, which has no safe
//! degraded state and returns [`Error::ResumeFailed`].

use std::future::Future;
use std::sync::Arc;

use hostrun_protocol::{Method, RunContext, RunParams, TestContext, TestElement, TestOutcome};
use hostrun_runtime::RemoteProxy;
use parking_lot::Mutex;
use serde_json::Value;

use crate::dispatch::{CallContext, CallDispatcher, CallFailure, FailureKind, RetryPolicy};
use crate::error::{Error, Result};
use crate::report::Reporter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
	Uninitialized,
	Initialized,
	Connected,
	Disconnected,
	/// Entered by `cleanup`; terminal.
	Closed,
}

pub struct TestAdapter {
	dispatcher: CallDispatcher,
	state: Mutex<AdapterState>,
	run: Mutex<Option<RunContext>>,
	last_test: Mutex<Option<TestElement>>,
}

impl TestAdapter {
	pub fn new(dispatcher: CallDispatcher) -> Self {
		Self {
			dispatcher,
			state: Mutex::new(AdapterState::Uninitialized),
			run: Mutex::new(None),
			last_test: Mutex::new(None),
		}
	}

	pub fn state(&self) -> AdapterState {
		*self.state.lock()
	}

	pub fn dispatcher(&self) -> &CallDispatcher {
		&self.dispatcher
	}

	/// Stores the run context. No host is contacted until the first test runs.
	pub fn initialize(&self, run: RunContext) -> Result<()> {
		let mut state = self.state.lock();
		match *state {
			AdapterState::Uninitialized => {}
			AdapterState::Closed => return Err(Error::Closed),
			_ => return Err(Error::AlreadyInitialized),
		}
		tracing::info!(target = "hostrun.adapter", run_id = %run.run_id, debugging = run.debugging, "test run initialized");
		*self.run.lock() = Some(run);
		*state = AdapterState::Initialized;
		Ok(())
	}

	/// Runs one test and reports its outcome.
	///
	/// A test that cannot reach any host is reported `NotRunnable` instead of
	/// failing the run.
	pub async fn run(&self, test: &TestElement, context: &TestContext) -> Result<TestOutcome> {
		let run = self.active_run()?;
		*self.last_test.lock() = Some(test.clone());

		let params = RunParams {
			run_id: run.run_id.clone(),
			test: test.clone(),
			context: context.clone(),
		};
		let ctx = CallContext::new(Method::Run, &run).with_test(Some(test)).top_level();
		let params = &params;
		let result = self
			.dispatch(&ctx, RetryPolicy::RESTART, move |proxy| async move { proxy.run(params).await })
			.await;

		let reporter = Reporter::new(self.dispatcher.sink(), &run, Some(test));
		let outcome = match result {
			Ok(reply) => {
				let message = reply.message.unwrap_or_else(|| format!("{} {}", test.name, reply.outcome));
				reporter.result(reply.outcome, message, None);
				reply.outcome
			}
			Err(failure) if failure.reported => TestOutcome::Error,
			Err(failure) => {
				let outcome = match failure.kind {
					FailureKind::NoClientAvailable => TestOutcome::NotRunnable,
					_ => TestOutcome::Error,
				};
				reporter.result(outcome, failure.message.clone(), Some(&failure as &dyn std::fmt::Debug));
				outcome
			}
		};

		tracing::info!(target = "hostrun.adapter", run_id = %run.run_id, test = %test.name, %outcome, "test finished");
		Ok(outcome)
	}

	pub async fn abort(&self) -> Result<()> {
		self.fire_and_report(Method::Abort, |proxy| async move { proxy.abort().await }).await
	}

	pub async fn pause(&self) -> Result<()> {
		self.fire_and_report(Method::Pause, |proxy| async move { proxy.pause().await }).await
	}

	pub async fn stop(&self) -> Result<()> {
		self.fire_and_report(Method::Stop, |proxy| async move { proxy.stop().await }).await
	}

	/// # Errors
	///
	/// Returns [`Error::ResumeFailed`] when the host could not be resumed.
	pub async fn resume(&self) -> Result<()> {
		let run = self.active_run()?;
		let ctx = CallContext::new(Method::Resume, &run);
		self.dispatch(&ctx, RetryPolicy::NO_RESTART, |proxy| async move { proxy.resume().await })
			.await
			.map_err(|failure| {
				tracing::error!(target = "hostrun.adapter", run_id = %run.run_id, error = %failure, "resume failed");
				Error::ResumeFailed { reason: failure.message }
			})
	}

	/// Cleans up the host, then closes the session and the adapter.
	///
	/// The session is closed even when the cleanup call fails.
	pub async fn cleanup(&self) -> Result<()> {
		let run = self.active_run()?;
		let last_test = self.last_test.lock().clone();
		let ctx = CallContext::new(Method::Cleanup, &run).with_test(last_test.as_ref());

		if last_test.is_none() && self.dispatcher.sessions().current().is_none() {
			tracing::debug!(target = "hostrun.adapter", run_id = %run.run_id, "no host was used; skipping cleanup call");
		} else {
			let result = self
				.dispatch(&ctx, RetryPolicy::RESTART, |proxy| async move { proxy.cleanup().await })
				.await;
			if let Err(failure) = result {
				report_failure(&Reporter::new(self.dispatcher.sink(), &run, None), &failure);
			}
		}

		self.dispatcher.sessions().close().await;
		*self.state.lock() = AdapterState::Closed;
		tracing::info!(target = "hostrun.adapter", run_id = %run.run_id, "test run cleaned up");
		Ok(())
	}

	/// Forwards an opaque payload to the host.
	pub async fn receive_message(&self, payload: &Value) -> Result<()> {
		let run = self.active_run()?;
		let last_test = self.last_test.lock().clone();
		let ctx = CallContext::new(Method::ReceiveMessage, &run).with_test(last_test.as_ref());

		let result = self
			.dispatch(&ctx, RetryPolicy::RESTART, move |proxy| async move { proxy.receive_message(payload).await })
			.await;
		if let Err(failure) = result {
			report_failure(&Reporter::new(self.dispatcher.sink(), &run, None), &failure);
		}
		Ok(())
	}

	pub async fn pre_test_run_finished(&self, run_context: &RunContext) -> Result<()> {
		let run = self.active_run()?;
		let ctx = CallContext::new(Method::PreTestRunFinished, &run);

		let result = self
			.dispatch(&ctx, RetryPolicy::NO_RESTART, move |proxy| async move {
				proxy.pre_test_run_finished(run_context).await
			})
			.await;
		if let Err(failure) = result {
			report_failure(&Reporter::new(self.dispatcher.sink(), &run, None), &failure);
		}
		Ok(())
	}

	async fn fire_and_report<F, Fut>(&self, method: Method, action: F) -> Result<()>
	where
		F: Fn(Arc<dyn RemoteProxy>) -> Fut,
		Fut: Future<Output = hostrun_runtime::Result<()>>,
	{
		let run = self.active_run()?;
		let ctx = CallContext::new(method, &run);
		if let Err(failure) = self.dispatch(&ctx, RetryPolicy::NO_RESTART, action).await {
			report_failure(&Reporter::new(self.dispatcher.sink(), &run, None), &failure);
		}
		Ok(())
	}

	async fn dispatch<T, F, Fut>(&self, ctx: &CallContext<'_>, policy: RetryPolicy, action: F) -> std::result::Result<T, CallFailure>
	where
		F: Fn(Arc<dyn RemoteProxy>) -> Fut,
		Fut: Future<Output = hostrun_runtime::Result<T>>,
	{
		let result = self.dispatcher.dispatch(ctx, policy, action).await;
		self.refresh_state();
		result
	}

	fn active_run(&self) -> Result<RunContext> {
		match self.state() {
			AdapterState::Uninitialized => Err(Error::NotInitialized),
			AdapterState::Closed => Err(Error::Closed),
			_ => self.run.lock().clone().ok_or(Error::NotInitialized),
		}
	}

	fn refresh_state(&self) {
		let connected = self.dispatcher.sessions().current().is_some_and(|session| session.proxy().is_some());
		let mut state = self.state.lock();
		if *state != AdapterState::Closed {
			*state = if connected {
				AdapterState::Connected
			} else {
				AdapterState::Disconnected
			};
		}
	}
}

fn report_failure(reporter: &Reporter<'_>, failure: &CallFailure) {
	tracing::warn!(target = "hostrun.adapter", call = %failure.call, kind = ?failure.kind, "{}", failure.message);
	if !failure.reported {
		reporter.result(TestOutcome::Error, failure.message.clone(), Some(failure as &dyn std::fmt::Debug));
	}
}
