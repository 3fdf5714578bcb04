//! The fixed call surface of a test host.

use std::sync::Arc;

use async_trait::async_trait;
use hostrun_protocol::{Method, RunContext, RunParams, RunReply};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::connection::Connection;
use crate::error::Result;

/// Local handle through which calls reach a host.
///
/// Channel failures surface as errors for which
/// [`Error::is_channel_error`](crate::Error::is_channel_error) is `true`.
#[async_trait]
pub trait RemoteProxy: Send + Sync {
	/// Lightweight liveness probe.
	async fn ping(&self) -> Result<()>;

	async fn is_initialized(&self) -> Result<bool>;

	async fn initialize(&self, run: &RunContext) -> Result<()>;

	async fn run(&self, params: &RunParams) -> Result<RunReply>;

	async fn abort(&self) -> Result<()>;

	async fn pause(&self) -> Result<()>;

	async fn resume(&self) -> Result<()>;

	async fn stop(&self) -> Result<()>;

	async fn cleanup(&self) -> Result<()>;

	/// Forwards an opaque payload to the host.
	async fn receive_message(&self, payload: &Value) -> Result<()>;

	async fn pre_test_run_finished(&self, run: &RunContext) -> Result<()>;

	/// Closes the channel. Idempotent and infallible.
	fn close(&self);
}

/// [`RemoteProxy`] speaking the wire protocol over a [`Connection`].
pub struct ConnectionProxy {
	connection: Arc<Connection>,
}

impl ConnectionProxy {
	pub fn new(connection: Arc<Connection>) -> Self {
		Self { connection }
	}

	async fn call<T: DeserializeOwned>(&self, method: Method, params: Value) -> Result<T> {
		let value = self.connection.send_message(method, params).await?;
		Ok(serde_json::from_value(value)?)
	}

	async fn call_unit(&self, method: Method, params: Value) -> Result<()> {
		self.connection.send_message(method, params).await.map(drop)
	}
}

#[async_trait]
impl RemoteProxy for ConnectionProxy {
	async fn ping(&self) -> Result<()> {
		self.call_unit(Method::Ping, Value::Null).await
	}

	async fn is_initialized(&self) -> Result<bool> {
		self.call(Method::IsInitialized, Value::Null).await
	}

	async fn initialize(&self, run: &RunContext) -> Result<()> {
		self.call_unit(Method::Initialize, serde_json::to_value(run)?).await
	}

	async fn run(&self, params: &RunParams) -> Result<RunReply> {
		self.call(Method::Run, serde_json::to_value(params)?).await
	}

	async fn abort(&self) -> Result<()> {
		self.call_unit(Method::Abort, Value::Null).await
	}

	async fn pause(&self) -> Result<()> {
		self.call_unit(Method::Pause, Value::Null).await
	}

	async fn resume(&self) -> Result<()> {
		self.call_unit(Method::Resume, Value::Null).await
	}

	async fn stop(&self) -> Result<()> {
		self.call_unit(Method::Stop, Value::Null).await
	}

	async fn cleanup(&self) -> Result<()> {
		self.call_unit(Method::Cleanup, Value::Null).await
	}

	async fn receive_message(&self, payload: &Value) -> Result<()> {
		self.call_unit(Method::ReceiveMessage, payload.clone()).await
	}

	async fn pre_test_run_finished(&self, run: &RunContext) -> Result<()> {
		self.call_unit(Method::PreTestRunFinished, serde_json::to_value(run)?).await
	}

	fn close(&self) {
		self.connection.close();
	}
}
