mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use common::{FakeLauncher, key, progress_log, run_context, test_element};
use hostrun::protocol::{Method, RunContext};
use hostrun::runtime::{Error as RuntimeError, HostLauncher};
use hostrun::{CallContext, CallDispatcher, DebuggerAttach, Error, FailureKind, RecordingSink, RetryPolicy, SessionManager};
use parking_lot::Mutex;

fn dispatcher(launcher: &Arc<FakeLauncher>) -> (CallDispatcher, Arc<RecordingSink>) {
	let sink = Arc::new(RecordingSink::new());
	let sessions = SessionManager::new(Arc::clone(launcher) as Arc<dyn HostLauncher>);
	(CallDispatcher::new(sessions, sink.clone()), sink)
}

#[tokio::test]
async fn persistent_channel_failure_stops_at_max_attempts() {
	let launcher = FakeLauncher::new();
	let (dispatcher, sink) = dispatcher(&launcher);
	let run = run_context();
	let test = test_element("opens-solution");
	let ctx = CallContext::new(Method::Run, &run).with_test(Some(&test));
	let invocations = AtomicUsize::new(0);

	let result: Result<(), _> = dispatcher
		.dispatch(&ctx, RetryPolicy::new(2, true), |_proxy| {
			invocations.fetch_add(1, Ordering::SeqCst);
			async { Err(RuntimeError::ChannelClosed) }
		})
		.await;

	let failure = result.unwrap_err();
	assert_eq!(failure.kind, FailureKind::NoClientAvailable);
	assert_eq!(invocations.load(Ordering::SeqCst), 2);
	assert_eq!(sink.messages().iter().filter(|m| m.starts_with("Retrying")).count(), 1);
}

#[tokio::test]
async fn no_restart_policy_never_launches() {
	let launcher = FakeLauncher::new();
	let (dispatcher, sink) = dispatcher(&launcher);
	let (_, progress) = progress_log();
	dispatcher
		.sessions()
		.connect(&key("devenv"), Duration::from_secs(5), &progress)
		.await
		.unwrap();
	launcher.crash_latest();

	let run = run_context();
	let test = test_element("t");
	for ctx in [
		CallContext::new(Method::Abort, &run),
		CallContext::new(Method::Stop, &run).with_test(Some(&test)),
	] {
		let result = dispatcher
			.dispatch(&ctx, RetryPolicy::NO_RESTART, |proxy| async move { proxy.abort().await })
			.await;
		assert_eq!(result.unwrap_err().kind, FailureKind::NoClientAvailable);
	}

	assert_eq!(launcher.launches(), 1);
	assert!(sink.messages().iter().any(|m| m.starts_with("No host client available")));
}

#[tokio::test]
async fn call_without_session_and_test_reports_no_client() {
	let launcher = FakeLauncher::new();
	let (dispatcher, _sink) = dispatcher(&launcher);
	let run = run_context();

	let result = dispatcher
		.dispatch(&CallContext::new(Method::Pause, &run), RetryPolicy::RESTART, |proxy| async move {
			proxy.pause().await
		})
		.await;

	assert_eq!(result.unwrap_err().kind, FailureKind::NoClientAvailable);
	assert_eq!(launcher.launches(), 0);
}

#[tokio::test]
async fn host_rejection_is_not_retried() {
	let launcher = FakeLauncher::new();
	launcher.script.remote_failures.store(1, Ordering::SeqCst);
	let (dispatcher, sink) = dispatcher(&launcher);
	let run = run_context();
	let test = test_element("t");
	let ctx = CallContext::new(Method::Run, &run).with_test(Some(&test));

	let failure = dispatcher
		.dispatch(&ctx, RetryPolicy::RESTART, |proxy| async move { proxy.stop().await })
		.await
		.unwrap_err();

	assert_eq!(failure.kind, FailureKind::Remote);
	assert!(!failure.retryable);
	assert_eq!(launcher.script.calls.load(Ordering::SeqCst), 1);
	assert!(sink.messages().iter().all(|m| !m.starts_with("Retrying")));
	// The session survives a host-side rejection.
	assert!(dispatcher.sessions().is_alive().await);
}

#[tokio::test]
async fn setup_failure_is_reported_once_and_stops_top_level_run() {
	let launcher = FakeLauncher::new();
	let (dispatcher, sink) = dispatcher(&launcher);
	let run = RunContext::new("run-1");
	let test = test_element("t");
	let ctx = CallContext::new(Method::Run, &run).with_test(Some(&test)).top_level();

	let failure = dispatcher
		.dispatch(&ctx, RetryPolicy::RESTART, |proxy| async move { proxy.stop().await })
		.await
		.unwrap_err();

	assert_eq!(failure.kind, FailureKind::InvalidConfiguration);
	assert!(failure.reported);
	assert!(sink.stop_requested());
	assert_eq!(sink.results().len(), 1);
	assert_eq!(launcher.launches(), 0);
}

#[tokio::test]
async fn nested_setup_failure_does_not_stop_run() {
	let launcher = FakeLauncher::new();
	let (dispatcher, sink) = dispatcher(&launcher);
	let run = RunContext::new("run-1");
	let test = test_element("t");
	let ctx = CallContext::new(Method::Cleanup, &run).with_test(Some(&test));

	let failure = dispatcher
		.dispatch(&ctx, RetryPolicy::RESTART, |proxy| async move { proxy.cleanup().await })
		.await
		.unwrap_err();

	assert!(failure.reported);
	assert!(!sink.stop_requested());
}

#[derive(Default)]
struct RecordingDebugger {
	attached: Mutex<Vec<(u32, bool)>>,
	fail: bool,
}

#[async_trait]
impl DebuggerAttach for RecordingDebugger {
	async fn attach(&self, pid: u32, mixed_mode: bool) -> hostrun::Result<()> {
		self.attached.lock().push((pid, mixed_mode));
		if self.fail {
			return Err(Error::DebuggerAttach {
				pid,
				reason: "access denied".into(),
			});
		}
		Ok(())
	}
}

#[tokio::test]
async fn debugger_attaches_once_per_launched_host() {
	let launcher = FakeLauncher::new();
	let debugger = Arc::new(RecordingDebugger::default());
	let (dispatcher, _sink) = dispatcher(&launcher);
	let dispatcher = dispatcher.with_debugger(debugger.clone());

	let mut run = run_context().with_setting("host.debug_mixed_mode", "true");
	run.debugging = true;
	let test = test_element("t");
	let ctx = CallContext::new(Method::Run, &run).with_test(Some(&test));

	for _ in 0..2 {
		dispatcher
			.dispatch(&ctx, RetryPolicy::RESTART, |proxy| async move { proxy.stop().await })
			.await
			.unwrap();
	}

	let pid = dispatcher.sessions().current().unwrap().pid().unwrap();
	assert_eq!(debugger.attached.lock().clone(), vec![(pid, true)]);
}

#[tokio::test]
async fn debugger_failure_is_terminal_for_the_call() {
	let launcher = FakeLauncher::new();
	let debugger = Arc::new(RecordingDebugger {
		fail: true,
		..Default::default()
	});
	let (dispatcher, _sink) = dispatcher(&launcher);
	let dispatcher = dispatcher.with_debugger(debugger);

	let mut run = run_context();
	run.debugging = true;
	let test = test_element("t");
	let ctx = CallContext::new(Method::Run, &run).with_test(Some(&test));

	let failure = dispatcher
		.dispatch(&ctx, RetryPolicy::RESTART, |proxy| async move { proxy.stop().await })
		.await
		.unwrap_err();

	assert_eq!(failure.kind, FailureKind::Debugger);
	assert_eq!(launcher.script.calls.load(Ordering::SeqCst), 0);
	assert!(dispatcher.sessions().current().is_none());
	assert_eq!(launcher.count("kill:1"), 1);
}

#[tokio::test]
async fn host_without_debugger_is_never_reused() {
	let launcher = FakeLauncher::new();
	let debugger = Arc::new(RecordingDebugger {
		fail: true,
		..Default::default()
	});
	let (dispatcher, _sink) = dispatcher(&launcher);
	let dispatcher = dispatcher.with_debugger(debugger.clone());

	let mut run = run_context();
	run.debugging = true;
	let test = test_element("t");
	let ctx = CallContext::new(Method::Run, &run).with_test(Some(&test));

	for _ in 0..2 {
		let failure = dispatcher
			.dispatch(&ctx, RetryPolicy::RESTART, |proxy| async move { proxy.stop().await })
			.await
			.unwrap_err();
		assert_eq!(failure.kind, FailureKind::Debugger);
	}

	assert_eq!(debugger.attached.lock().len(), 2);
	assert_eq!(launcher.launches(), 2);
	assert_eq!(launcher.script.calls.load(Ordering::SeqCst), 0);
	assert!(launcher.position("kill:1") < launcher.position("launch:devenv#2"));
}

#[tokio::test]
async fn session_is_initialized_once() {
	let launcher = FakeLauncher::new();
	let (dispatcher, _sink) = dispatcher(&launcher);
	let run = run_context();
	let test = test_element("t");
	let ctx = CallContext::new(Method::Run, &run).with_test(Some(&test));

	for _ in 0..3 {
		dispatcher
			.dispatch(&ctx, RetryPolicy::RESTART, |proxy| async move { proxy.stop().await })
			.await
			.unwrap();
	}

	assert_eq!(launcher.count("initialize"), 1);
}
