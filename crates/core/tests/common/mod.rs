#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use hostrun::protocol::{Method, RunContext, RunParams, RunReply, TestElement, TestOutcome};
use hostrun::runtime::{Endpoint, Error, HostLauncher, HostProcess, LaunchSpec, LaunchedHost, RemoteProxy, Result};
use hostrun::{CallDispatcher, RecordingSink, SessionKey, SessionManager, TestAdapter};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

pub type Events = Arc<Mutex<Vec<String>>>;

/// Behavior shared by every proxy the fake launcher hands out.
#[derive(Default)]
pub struct Script {
	/// Number of upcoming calls that fail with a channel error.
	pub channel_failures: AtomicUsize,
	/// Every call fails with a channel error.
	pub always_fail: AtomicBool,
	/// Number of upcoming calls the host rejects.
	pub remote_failures: AtomicUsize,
	/// Pings are answered with a host error.
	pub ping_rejected: AtomicBool,
	pub calls: AtomicUsize,
	pub pings: AtomicUsize,
	/// Pings signal `ping_started` and wait for `ping_release`.
	pub hold_pings: AtomicBool,
	pub ping_started: Notify,
	pub ping_release: Notify,
}

fn take_one(counter: &AtomicUsize) -> bool {
	counter.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok()
}

pub struct FakeLauncher {
	pub events: Events,
	pub script: Arc<Script>,
	pub launches: AtomicUsize,
	pub connect_fails: AtomicBool,
	pub launch_delay: Mutex<Option<Duration>>,
	exited: Mutex<Vec<Arc<AtomicBool>>>,
}

impl FakeLauncher {
	pub fn new() -> Arc<Self> {
		Arc::new(Self {
			events: Events::default(),
			script: Arc::new(Script::default()),
			launches: AtomicUsize::new(0),
			connect_fails: AtomicBool::new(false),
			launch_delay: Mutex::new(None),
			exited: Mutex::new(Vec::new()),
		})
	}

	pub fn launches(&self) -> usize {
		self.launches.load(Ordering::SeqCst)
	}

	pub fn events(&self) -> Vec<String> {
		self.events.lock().clone()
	}

	pub fn position(&self, event: &str) -> usize {
		self.events()
			.iter()
			.position(|e| e == event)
			.unwrap_or_else(|| panic!("event {event} not recorded in {:?}", self.events()))
	}

	pub fn count(&self, event: &str) -> usize {
		self.events().iter().filter(|e| *e == event).count()
	}

	/// Simulates the most recently launched host crashing.
	pub fn crash_latest(&self) {
		if let Some(flag) = self.exited.lock().last() {
			flag.store(true, Ordering::SeqCst);
		}
	}
}

#[async_trait]
impl HostLauncher for FakeLauncher {
	async fn launch(&self, spec: &LaunchSpec, cancel: CancellationToken) -> Result<LaunchedHost> {
		let id = self.launches.fetch_add(1, Ordering::SeqCst) + 1;
		self.events.lock().push(format!("launch:{}#{id}", spec.application));

		let delay = *self.launch_delay.lock();
		if let Some(delay) = delay {
			tokio::select! {
				_ = cancel.cancelled() => return Err(Error::LaunchCancelled),
				_ = tokio::time::sleep(delay) => {}
			}
		}

		let exited = Arc::new(AtomicBool::new(false));
		self.exited.lock().push(Arc::clone(&exited));
		Ok(LaunchedHost {
			process: Box::new(FakeProcess {
				id,
				events: Arc::clone(&self.events),
				exited,
			}),
			endpoint: Endpoint::Tcp(format!("fake-host:{id}")),
		})
	}

	async fn connect_proxy(&self, endpoint: &Endpoint) -> Result<Arc<dyn RemoteProxy>> {
		if self.connect_fails.load(Ordering::SeqCst) {
			return Err(Error::ConnectionFailed {
				endpoint: endpoint.to_string(),
				reason: "connection refused".into(),
			});
		}
		Ok(Arc::new(FakeProxy {
			script: Arc::clone(&self.script),
			events: Arc::clone(&self.events),
			initialized: AtomicBool::new(false),
			closed: AtomicBool::new(false),
		}))
	}
}

pub struct FakeProcess {
	id: usize,
	events: Events,
	exited: Arc<AtomicBool>,
}

#[async_trait]
impl HostProcess for FakeProcess {
	fn pid(&self) -> Option<u32> {
		Some(10_000 + self.id as u32)
	}

	fn has_exited(&mut self) -> bool {
		self.exited.load(Ordering::SeqCst)
	}

	async fn shutdown(&mut self, _grace: Duration) -> Result<()> {
		self.events.lock().push(format!("shutdown:{}", self.id));
		self.exited.store(true, Ordering::SeqCst);
		Ok(())
	}

	async fn kill(&mut self) -> Result<()> {
		self.events.lock().push(format!("kill:{}", self.id));
		self.exited.store(true, Ordering::SeqCst);
		Ok(())
	}
}

pub struct FakeProxy {
	script: Arc<Script>,
	events: Events,
	initialized: AtomicBool,
	closed: AtomicBool,
}

impl FakeProxy {
	fn call(&self, method: Method) -> Result<()> {
		if self.closed.load(Ordering::SeqCst) {
			return Err(Error::ChannelClosed);
		}
		self.script.calls.fetch_add(1, Ordering::SeqCst);
		self.events.lock().push(format!("call:{method}"));

		if self.script.always_fail.load(Ordering::SeqCst) || take_one(&self.script.channel_failures) {
			return Err(Error::TransportError("pipe broken".into()));
		}
		if take_one(&self.script.remote_failures) {
			return Err(Error::Remote {
				name: Some("HostError".into()),
				message: format!("{method} rejected"),
				stack: None,
			});
		}
		Ok(())
	}
}

#[async_trait]
impl RemoteProxy for FakeProxy {
	async fn ping(&self) -> Result<()> {
		if self.closed.load(Ordering::SeqCst) {
			return Err(Error::ChannelClosed);
		}
		self.script.pings.fetch_add(1, Ordering::SeqCst);
		if self.script.hold_pings.load(Ordering::SeqCst) {
			self.script.ping_started.notify_one();
			self.script.ping_release.notified().await;
			// A closed channel fails calls still in flight.
			if self.closed.load(Ordering::SeqCst) {
				return Err(Error::ChannelClosed);
			}
		}
		if self.script.ping_rejected.load(Ordering::SeqCst) {
			return Err(Error::Remote {
				name: None,
				message: "busy".into(),
				stack: None,
			});
		}
		Ok(())
	}

	async fn is_initialized(&self) -> Result<bool> {
		if self.closed.load(Ordering::SeqCst) {
			return Err(Error::ChannelClosed);
		}
		Ok(self.initialized.load(Ordering::SeqCst))
	}

	async fn initialize(&self, _run: &RunContext) -> Result<()> {
		if self.closed.load(Ordering::SeqCst) {
			return Err(Error::ChannelClosed);
		}
		self.events.lock().push("initialize".into());
		self.initialized.store(true, Ordering::SeqCst);
		Ok(())
	}

	async fn run(&self, params: &RunParams) -> Result<RunReply> {
		self.call(Method::Run)?;
		Ok(RunReply {
			outcome: TestOutcome::Passed,
			message: Some(format!("{} passed", params.test.name)),
		})
	}

	async fn abort(&self) -> Result<()> {
		self.call(Method::Abort)
	}

	async fn pause(&self) -> Result<()> {
		self.call(Method::Pause)
	}

	async fn resume(&self) -> Result<()> {
		self.call(Method::Resume)
	}

	async fn stop(&self) -> Result<()> {
		self.call(Method::Stop)
	}

	async fn cleanup(&self) -> Result<()> {
		self.call(Method::Cleanup)
	}

	async fn receive_message(&self, _payload: &Value) -> Result<()> {
		self.call(Method::ReceiveMessage)
	}

	async fn pre_test_run_finished(&self, _run: &RunContext) -> Result<()> {
		self.call(Method::PreTestRunFinished)
	}

	fn close(&self) {
		if !self.closed.swap(true, Ordering::SeqCst) {
			self.events.lock().push("proxy-closed".into());
		}
	}
}

pub fn key(application: &str) -> SessionKey {
	SessionKey::new(application, format!("{application}.exe"))
}

/// Run context whose settings resolve to the fake `devenv` host.
pub fn run_context() -> RunContext {
	RunContext::new("run-1")
		.with_setting("host.application", "devenv")
		.with_setting("host.executable", "devenv")
}

pub fn mock_run_context() -> RunContext {
	RunContext::new("run-1").with_setting("host.application", "mock")
}

pub fn test_element(name: &str) -> TestElement {
	TestElement::new(name, name)
}

pub fn adapter(launcher: &Arc<FakeLauncher>) -> (TestAdapter, Arc<RecordingSink>) {
	let sink = Arc::new(RecordingSink::new());
	let sessions = SessionManager::new(Arc::clone(launcher) as Arc<dyn HostLauncher>);
	(TestAdapter::new(CallDispatcher::new(sessions, sink.clone())), sink)
}

/// Progress sink that records every message.
pub fn progress_log() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) + Send + Sync) {
	let log = Arc::new(Mutex::new(Vec::new()));
	let sink = {
		let log = Arc::clone(&log);
		move |text: &str| log.lock().push(text.to_string())
	};
	(log, sink)
}
