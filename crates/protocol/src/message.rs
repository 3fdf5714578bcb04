//! Request/response frames and the fixed method surface of a test host.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Line written on a host's stdout announcing where it accepts connections.
pub const LISTEN_PREFIX: &str = "HOSTRUN_LISTEN";

/// Methods a test host answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Method {
	/// Lightweight liveness probe.
	Ping,
	IsInitialized,
	Initialize,
	Run,
	Abort,
	Pause,
	Resume,
	Stop,
	Cleanup,
	ReceiveMessage,
	PreTestRunFinished,
}

impl Method {
	/// Wire name of the method.
	pub fn as_str(self) -> &'static str {
		match self {
			Method::Ping => "ping",
			Method::IsInitialized => "isInitialized",
			Method::Initialize => "initialize",
			Method::Run => "run",
			Method::Abort => "abort",
			Method::Pause => "pause",
			Method::Resume => "resume",
			Method::Stop => "stop",
			Method::Cleanup => "cleanup",
			Method::ReceiveMessage => "receiveMessage",
			Method::PreTestRunFinished => "preTestRunFinished",
		}
	}
}

impl std::fmt::Display for Method {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Request sent from the coordinator to the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
	/// Correlation id, unique per connection.
	pub id: u32,
	pub method: Method,
	#[serde(default)]
	pub params: Value,
}

/// Error details returned by the host for a failed call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
	pub message: String,
	/// Host-side error type name, if the host reports one.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub stack: Option<String>,
}

/// Response sent from the host, correlated by `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
	pub id: u32,
	/// Success result (mutually exclusive with `error`).
	#[serde(skip_serializing_if = "Option::is_none")]
	pub result: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<ErrorPayload>,
}

impl Response {
	/// Builds a success response.
	pub fn ok(id: u32, result: Value) -> Self {
		Self {
			id,
			result: Some(result),
			error: None,
		}
	}

	/// Builds an error response.
	pub fn err(id: u32, error: ErrorPayload) -> Self {
		Self {
			id,
			result: None,
			error: Some(error),
		}
	}
}
