//! Ownership of the single live host session.
//!
//! [`SessionManager`] holds at most one [`HostSession`]. `connect` either
//! keeps the current session (same key, channel attached) or closes it and
//! brings up a new one; `close` detaches and disposes; `probe` reports
//! whether the current session can still take calls.
//!
//! The session slot is only ever read-and-cleared or swapped under its lock,
//! so a probe racing a close sees either the whole session or none.

use std::sync::Arc;
use std::time::Duration;

use hostrun_runtime::{HostLauncher, LaunchedHost, RemoteProxy};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::key::SessionKey;
use crate::mock::{InProcessHost, MockProxy};
use crate::report::ProgressSink;
use crate::session::HostSession;

/// Builds the in-process proxy used for the mock application kind.
pub type StandInFactory = Arc<dyn Fn(&SessionKey) -> Arc<dyn RemoteProxy> + Send + Sync>;

/// How long a host is given to exit after its stdin closes.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Where the session returned by [`SessionManager::connect`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSource {
	Reused,
	Launched,
	/// In-process stand-in; nothing was launched.
	StandIn,
}

#[derive(Debug, Clone)]
pub struct Connected {
	pub session: Arc<HostSession>,
	pub source: SessionSource,
}

/// Result of a liveness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
	NoSession,
	Alive,
	/// The host process is gone; no call was attempted.
	ProcessExited,
	/// The process may be running but its channel failed.
	ChannelBroken,
}

pub struct SessionManager {
	launcher: Arc<dyn HostLauncher>,
	stand_in: StandInFactory,
	current: Mutex<Option<Arc<HostSession>>>,
	shutdown_grace: Duration,
}

impl SessionManager {
	pub fn new(launcher: Arc<dyn HostLauncher>) -> Self {
		Self {
			launcher,
			stand_in: Arc::new(|_: &SessionKey| Arc::new(MockProxy::new()) as Arc<dyn RemoteProxy>),
			current: Mutex::new(None),
			shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
		}
	}

	/// Replaces the proxy factory used for the mock application kind.
	pub fn with_stand_in(mut self, factory: StandInFactory) -> Self {
		self.stand_in = factory;
		self
	}

	pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
		self.shutdown_grace = grace;
		self
	}

	/// The current session, if any.
	pub fn current(&self) -> Option<Arc<HostSession>> {
		self.current.lock().clone()
	}

	/// Ensures a connected session for `key`.
	///
	/// A current session with the same key and an attached channel is
	/// reused. Otherwise the current session is closed first and a new one is
	/// launched; it is adopted only once its channel is connected.
	///
	/// # Errors
	///
	/// - [`Error::LaunchTimeout`] if the host is not connected within `launch_timeout`
	/// - [`Error::Launch`] if the host cannot be started
	/// - [`Error::ConnectionFailed`] if the host started but the channel could not be opened
	pub async fn connect(&self, key: &SessionKey, launch_timeout: Duration, progress: &dyn ProgressSink) -> Result<Connected> {
		if let Some(session) = self.current() {
			if session.key() == key && session.proxy().is_some() {
				progress.progress(&format!("Reusing existing host session for {key}"));
				tracing::debug!(target = "hostrun.session", pid = ?session.pid(), %key, "reusing host session");
				return Ok(Connected {
					session,
					source: SessionSource::Reused,
				});
			}
		}

		progress.progress(&format!("Launching host {key}"));
		self.close().await;

		let (session, source) = if key.is_mock() {
			let proxy = (self.stand_in)(key);
			(HostSession::new(key.clone(), Box::new(InProcessHost::new()), proxy), SessionSource::StandIn)
		} else {
			(self.launch(key, launch_timeout).await?, SessionSource::Launched)
		};
		let session = Arc::new(session);

		let displaced = self.current.lock().replace(Arc::clone(&session));
		if let Some(displaced) = displaced {
			tracing::warn!(target = "hostrun.session", key = %displaced.key(), "disposing session adopted during launch");
			displaced.dispose(self.shutdown_grace).await;
		}

		tracing::info!(target = "hostrun.session", pid = ?session.pid(), %key, ?source, "host session established");
		Ok(Connected { session, source })
	}

	async fn launch(&self, key: &SessionKey, launch_timeout: Duration) -> Result<HostSession> {
		let cancel = CancellationToken::new();

		match tokio::time::timeout(launch_timeout, self.launch_and_connect(key, cancel.clone())).await {
			Ok(result) => result,
			Err(_) => {
				cancel.cancel();
				tracing::warn!(target = "hostrun.session", %key, timeout_secs = launch_timeout.as_secs(), "host launch timed out");
				Err(Error::LaunchTimeout {
					key: key.to_string(),
					seconds: launch_timeout.as_secs(),
				})
			}
		}
	}

	async fn launch_and_connect(&self, key: &SessionKey, cancel: CancellationToken) -> Result<HostSession> {
		let LaunchedHost { mut process, endpoint } =
			self.launcher
				.launch(&key.to_launch_spec(), cancel)
				.await
				.map_err(|source| Error::Launch {
					key: key.to_string(),
					source,
				})?;
		tracing::debug!(target = "hostrun.session", pid = ?process.pid(), %endpoint, "host announced endpoint");

		match self.launcher.connect_proxy(&endpoint).await {
			Ok(proxy) => Ok(HostSession::new(key.clone(), process, proxy)),
			Err(source) => {
				if let Err(err) = process.kill().await {
					tracing::warn!(target = "hostrun.session", pid = ?process.pid(), error = %err, "failed to terminate unconnected host");
				}
				Err(Error::ConnectionFailed {
					endpoint: endpoint.to_string(),
					source,
				})
			}
		}
	}

	/// Detaches and disposes the current session. No-op without one.
	pub async fn close(&self) {
		let session = self.current.lock().take();
		if let Some(session) = session {
			tracing::debug!(target = "hostrun.session", pid = ?session.pid(), key = %session.key(), "closing host session");
			session.dispose(self.shutdown_grace).await;
		}
	}

	/// Checks whether the current session can take calls.
	///
	/// An exited host is detected without a remote call. A ping answered with
	/// a host-side error still counts as alive: only channel failures do not.
	pub async fn probe(&self) -> Liveness {
		let Some(session) = self.current() else {
			return Liveness::NoSession;
		};
		if session.process_exited() {
			tracing::debug!(target = "hostrun.session", pid = ?session.pid(), "host process has exited");
			return Liveness::ProcessExited;
		}
		let Some(proxy) = session.proxy() else {
			return Liveness::ChannelBroken;
		};

		match proxy.ping().await {
			Ok(()) => Liveness::Alive,
			Err(err) if err.is_channel_error() => {
				tracing::debug!(target = "hostrun.session", pid = ?session.pid(), error = %err, "liveness probe failed");
				Liveness::ChannelBroken
			}
			Err(err) => {
				tracing::debug!(target = "hostrun.session", pid = ?session.pid(), error = %err, "host answered probe with an error");
				Liveness::Alive
			}
		}
	}

	pub async fn is_alive(&self) -> bool {
		self.probe().await == Liveness::Alive
	}
}

impl std::fmt::Debug for SessionManager {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SessionManager")
			.field("current", &self.current())
			.field("shutdown_grace", &self.shutdown_grace)
			.finish_non_exhaustive()
	}
}
