//! Error types for the hostrun runtime.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while launching a host or talking to it.
#[derive(Debug, Error)]
pub enum Error {
	/// Host executable could not be located.
	#[error("host executable not found: {0}")]
	HostNotFound(PathBuf),

	/// Failed to spawn the host process.
	#[error("failed to launch host: {0}")]
	LaunchFailed(String),

	/// The launch was cancelled before the host announced its endpoint.
	#[error("host launch cancelled")]
	LaunchCancelled,

	/// Host did not exit within the graceful shutdown window.
	#[error("host did not exit within {0:?}")]
	ShutdownTimeout(std::time::Duration),

	/// Malformed endpoint address.
	#[error("invalid endpoint '{0}'")]
	InvalidEndpoint(String),

	/// Failed to establish the call channel with a launched host.
	#[error("failed to connect to host at {endpoint}: {reason}")]
	ConnectionFailed { endpoint: String, reason: String },

	/// Transport-level error (framing, pipe or socket I/O).
	#[error("transport error: {0}")]
	TransportError(String),

	/// Protocol-level error (unexpected or unparsable frame).
	#[error("protocol error: {0}")]
	ProtocolError(String),

	/// The host answered the call with an error.
	#[error("{}{message}", name.as_deref().map(|n| format!("{n}: ")).unwrap_or_default())]
	Remote {
		/// Host-side error type name, if reported.
		name: Option<String>,
		message: String,
		/// Host-side stack trace, if reported.
		stack: Option<String>,
	},

	/// Channel closed while a call was pending or before it was sent.
	#[error("channel closed unexpectedly")]
	ChannelClosed,

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

impl Error {
	/// Returns `true` when the error comes from the call channel itself
	/// rather than from the host answering with a failure.
	///
	/// Channel errors mean the proxy can no longer be trusted; the caller
	/// should drop it and reconnect.
	pub fn is_channel_error(&self) -> bool {
		matches!(
			self,
			Error::ChannelClosed | Error::TransportError(_) | Error::ConnectionFailed { .. } | Error::Io(_) | Error::ProtocolError(_)
		)
	}

	/// Returns the host-side stack trace, if this is a remote error carrying one.
	pub fn stack_trace(&self) -> Option<&str> {
		match self {
			Error::Remote { stack, .. } => stack.as_deref(),
			_ => None,
		}
	}
}
