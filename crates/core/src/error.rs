//! Error types for the hostrun coordinator.

use thiserror::Error;

/// Result type alias for coordinator operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by configuration, session management and the adapter.
#[derive(Debug, Error)]
pub enum Error {
	/// Required launch parameters are missing. Lists every missing field.
	#[error("invalid host configuration: missing {}", missing.join(", "))]
	InvalidConfiguration { missing: Vec<&'static str> },

	/// The host did not announce and accept a connection in time.
	#[error("host {key} did not come up within {seconds}s")]
	LaunchTimeout { key: String, seconds: u64 },

	/// The host could not be started.
	#[error("failed to launch host {key}: {source}")]
	Launch {
		key: String,
		#[source]
		source: hostrun_runtime::Error,
	},

	/// The host started but its call channel could not be established.
	#[error("failed to connect to host at {endpoint}: {source}")]
	ConnectionFailed {
		endpoint: String,
		#[source]
		source: hostrun_runtime::Error,
	},

	/// A call made while bringing a session up failed.
	#[error(transparent)]
	Channel(#[from] hostrun_runtime::Error),

	/// Retries were exhausted or relaunching was not allowed.
	#[error("no host client available for {call}")]
	NoClientAvailable { call: String },

	/// `resume` failed; a run cannot continue in a half-paused state.
	#[error("failed to resume test run: {reason}")]
	ResumeFailed { reason: String },

	#[error("failed to attach debugger to process {pid}: {reason}")]
	DebuggerAttach { pid: u32, reason: String },

	#[error("test adapter is not initialized")]
	NotInitialized,

	#[error("test adapter is already initialized")]
	AlreadyInitialized,

	/// The adapter was cleaned up; no further calls are accepted.
	#[error("test adapter has been cleaned up")]
	Closed,
}
