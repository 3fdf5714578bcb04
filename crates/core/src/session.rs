//! A launched host plus its call channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use hostrun_runtime::{HostProcess, RemoteProxy};
use parking_lot::Mutex;

use crate::key::SessionKey;

/// One host process and the proxy connected to it.
///
/// Owned by [`SessionManager`](crate::SessionManager). Once disposed it is
/// never reused.
pub struct HostSession {
	key: SessionKey,
	pid: Option<u32>,
	process: Mutex<Option<Box<dyn HostProcess>>>,
	proxy: Mutex<Option<Arc<dyn RemoteProxy>>>,
	disposed: AtomicBool,
}

impl HostSession {
	pub(crate) fn new(key: SessionKey, process: Box<dyn HostProcess>, proxy: Arc<dyn RemoteProxy>) -> Self {
		Self {
			key,
			pid: process.pid(),
			process: Mutex::new(Some(process)),
			proxy: Mutex::new(Some(proxy)),
			disposed: AtomicBool::new(false),
		}
	}

	pub fn key(&self) -> &SessionKey {
		&self.key
	}

	pub fn pid(&self) -> Option<u32> {
		self.pid
	}

	/// The connected proxy, or `None` once it was dropped as broken.
	pub fn proxy(&self) -> Option<Arc<dyn RemoteProxy>> {
		self.proxy.lock().clone()
	}

	/// Detaches and closes a proxy whose channel failed.
	///
	/// The host process is left alone; the next liveness probe sees a
	/// session without a channel and replaces it.
	pub fn drop_proxy(&self) {
		let proxy = self.proxy.lock().take();
		if let Some(proxy) = proxy {
			tracing::debug!(target = "hostrun.session", pid = ?self.pid, key = %self.key, "dropping broken proxy");
			proxy.close();
		}
	}

	/// Returns `true` once the host process has exited or was released.
	pub fn process_exited(&self) -> bool {
		self.process.lock().as_mut().is_none_or(|process| process.has_exited())
	}

	pub fn is_disposed(&self) -> bool {
		self.disposed.load(Ordering::SeqCst)
	}

	/// Releases the session: closes the proxy, asks the host to exit within
	/// `grace`, then terminates it regardless.
	///
	/// Idempotent. Failures at each step are logged and never returned.
	pub async fn dispose(&self, grace: Duration) {
		if self.disposed.swap(true, Ordering::SeqCst) {
			return;
		}

		let proxy = self.proxy.lock().take();
		if let Some(proxy) = proxy {
			proxy.close();
		}

		let process = self.process.lock().take();
		let Some(mut process) = process else {
			return;
		};

		if let Err(err) = process.shutdown(grace).await {
			tracing::warn!(target = "hostrun.session", pid = ?self.pid, error = %err, "graceful host shutdown failed");
		}
		if let Err(err) = process.kill().await {
			tracing::warn!(target = "hostrun.session", pid = ?self.pid, error = %err, "failed to terminate host");
		}

		tracing::debug!(target = "hostrun.session", pid = ?self.pid, key = %self.key, "host session disposed");
	}
}

impl std::fmt::Debug for HostSession {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("HostSession")
			.field("key", &self.key)
			.field("pid", &self.pid)
			.field("connected", &self.proxy.lock().is_some())
			.field("disposed", &self.is_disposed())
			.finish()
	}
}
