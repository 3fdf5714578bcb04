//! Host launching.
//!
//! A [`HostLauncher`] turns a [`LaunchSpec`] into a running host and a
//! [`RemoteProxy`] connected to it. [`ProcessLauncher`] is the production
//! implementation: it spawns the host executable, waits for the
//! `HOSTRUN_LISTEN <endpoint>` line on its stdout, and connects to that
//! endpoint.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::connection::Connection;
use crate::endpoint::{Endpoint, await_listen_line};
use crate::error::{Error, Result};
use crate::locate::locate_executable;
use crate::process::{ChildHost, HostProcess};
use crate::proxy::{ConnectionProxy, RemoteProxy};

/// What to launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
	pub application: String,
	pub executable: PathBuf,
	pub version: String,
	pub variant: Option<String>,
}

/// A host that has started and announced where to reach it.
pub struct LaunchedHost {
	pub process: Box<dyn HostProcess>,
	pub endpoint: Endpoint,
}

impl std::fmt::Debug for LaunchedHost {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("LaunchedHost")
			.field("pid", &self.process.pid())
			.field("endpoint", &self.endpoint)
			.finish()
	}
}

/// Starts hosts and connects to them.
#[async_trait]
pub trait HostLauncher: Send + Sync {
	/// Starts a host. Must return [`Error::LaunchCancelled`] promptly once
	/// `cancel` fires, without leaving the host running.
	async fn launch(&self, spec: &LaunchSpec, cancel: CancellationToken) -> Result<LaunchedHost>;

	/// Opens the call channel to a launched host.
	async fn connect_proxy(&self, endpoint: &Endpoint) -> Result<Arc<dyn RemoteProxy>> {
		let (transport, message_rx) = endpoint.connect().await?;
		let connection = Connection::start(transport, message_rx);
		Ok(Arc::new(ConnectionProxy::new(connection)))
	}
}

/// Launches hosts as child processes.
///
/// The host receives `HOSTRUN_APPLICATION`, `HOSTRUN_VERSION` and, when set,
/// `HOSTRUN_VARIANT` in its environment. Its stderr is inherited.
#[derive(Debug, Clone, Default)]
pub struct ProcessLauncher {
	args: Vec<String>,
}

impl ProcessLauncher {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a command-line argument passed to every launched host.
	pub fn arg(mut self, arg: impl Into<String>) -> Self {
		self.args.push(arg.into());
		self
	}
}

#[async_trait]
impl HostLauncher for ProcessLauncher {
	async fn launch(&self, spec: &LaunchSpec, cancel: CancellationToken) -> Result<LaunchedHost> {
		let executable = locate_executable(&spec.executable)?;

		let mut cmd = Command::new(&executable);
		cmd.args(&self.args)
			.env("HOSTRUN_APPLICATION", &spec.application)
			.env("HOSTRUN_VERSION", &spec.version)
			.stdin(Stdio::piped())
			.stdout(Stdio::piped())
			.stderr(Stdio::inherit())
			.kill_on_drop(true);
		if let Some(variant) = &spec.variant {
			cmd.env("HOSTRUN_VARIANT", variant);
		}

		let mut child = cmd
			.spawn()
			.map_err(|err| Error::LaunchFailed(format!("failed to spawn {}: {err}", executable.display())))?;
		tracing::debug!(
			target = "hostrun.runtime",
			pid = ?child.id(),
			executable = %executable.display(),
			"spawned host"
		);

		let stdout = child
			.stdout
			.take()
			.ok_or_else(|| Error::LaunchFailed("host stdout was not captured".to_string()))?;
		let mut reader = BufReader::new(stdout);
		let endpoint = await_listen_line(&mut reader, &cancel).await?;

		let pid = child.id();
		let output = tokio::spawn(async move {
			let mut lines = reader.lines();
			while let Ok(Some(line)) = lines.next_line().await {
				tracing::debug!(target = "hostrun.runtime", pid = ?pid, line = %line, "host output");
			}
		});

		Ok(LaunchedHost {
			process: Box::new(ChildHost::new(child, Some(output))),
			endpoint,
		})
	}
}
