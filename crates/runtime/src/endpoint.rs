//! Host endpoint addresses and the stdout listen handshake.
//!
//! A launched host announces where it accepts the call channel by printing
//! a single line on stdout:
//!
//! ```text
//! HOSTRUN_LISTEN tcp://127.0.0.1:49152
//! HOSTRUN_LISTEN unix:/run/user/1000/hostrun-4242.sock
//! ```

use std::fmt;
#[cfg(unix)]
use std::path::PathBuf;
use std::str::FromStr;

use hostrun_protocol::LISTEN_PREFIX;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::transport::PipeTransport;

/// Address of a host's call channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
	/// `host:port` TCP address.
	Tcp(String),
	/// Unix domain socket path.
	#[cfg(unix)]
	Unix(PathBuf),
}

impl Endpoint {
	/// Opens a stream to the endpoint and wraps it in a transport.
	pub async fn connect(&self) -> Result<(PipeTransport, mpsc::UnboundedReceiver<Value>)> {
		let failed = |err: std::io::Error| Error::ConnectionFailed {
			endpoint: self.to_string(),
			reason: err.to_string(),
		};

		match self {
			Endpoint::Tcp(addr) => {
				let stream = tokio::net::TcpStream::connect(addr.as_str()).await.map_err(failed)?;
				stream.set_nodelay(true).map_err(failed)?;
				Ok(PipeTransport::from_stream(stream))
			}
			#[cfg(unix)]
			Endpoint::Unix(path) => {
				let stream = tokio::net::UnixStream::connect(path).await.map_err(failed)?;
				Ok(PipeTransport::from_stream(stream))
			}
		}
	}

	/// The announcement line a host prints for this endpoint.
	pub fn listen_line(&self) -> String {
		format!("{LISTEN_PREFIX} {self}")
	}
}

impl fmt::Display for Endpoint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Endpoint::Tcp(addr) => write!(f, "tcp://{addr}"),
			#[cfg(unix)]
			Endpoint::Unix(path) => write!(f, "unix:{}", path.display()),
		}
	}
}

impl FromStr for Endpoint {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		let s = s.trim();
		if let Some(addr) = s.strip_prefix("tcp://") {
			let valid = addr.rsplit_once(':').is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
			if valid {
				return Ok(Endpoint::Tcp(addr.to_string()));
			}
		}
		#[cfg(unix)]
		{
			if let Some(path) = s.strip_prefix("unix:").filter(|path| !path.is_empty()) {
				return Ok(Endpoint::Unix(PathBuf::from(path)));
			}
		}
		Err(Error::InvalidEndpoint(s.to_string()))
	}
}

/// Parses a listen announcement; `None` when the line is ordinary host output.
pub fn parse_listen_line(line: &str) -> Option<Result<Endpoint>> {
	let rest = line.trim().strip_prefix(LISTEN_PREFIX)?;
	if !rest.starts_with(char::is_whitespace) {
		return None;
	}
	Some(rest.parse())
}

/// Reads host output until the listen announcement, end of output, or cancellation.
pub async fn await_listen_line<R>(reader: &mut R, cancel: &CancellationToken) -> Result<Endpoint>
where
	R: AsyncBufRead + Unpin,
{
	let mut line = String::new();
	loop {
		line.clear();
		let read = tokio::select! {
			_ = cancel.cancelled() => return Err(Error::LaunchCancelled),
			read = reader.read_line(&mut line) => read?,
		};
		if read == 0 {
			return Err(Error::LaunchFailed("host exited before announcing its endpoint".to_string()));
		}
		match parse_listen_line(&line) {
			Some(endpoint) => return endpoint,
			None => tracing::debug!(target = "hostrun.runtime", line = line.trim_end(), "host output"),
		}
	}
}
