//! Request/response correlation on top of a [`PipeTransport`].
//!
//! # Message flow
//!
//! 1. Caller invokes [`Connection::send_message`] with a method and params
//! 2. Connection allocates an id and parks a oneshot sender under it
//! 3. The writer task frames the request onto the transport
//! 4. The dispatch loop reads the matching response and completes the oneshot
//!
//! When the read side ends, every pending call fails with
//! [`Error::ChannelClosed`] and the connection refuses new calls.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::task::{Context, Poll};

use hostrun_protocol::{ErrorPayload, Method, Request, Response};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::transport::PipeTransport;

/// Pending request callbacks keyed by request id.
type CallbackMap = Arc<Mutex<HashMap<u32, oneshot::Sender<Result<Value>>>>>;

/// Removes the parked callback if the caller stops waiting.
struct CancelGuard {
	id: u32,
	callbacks: CallbackMap,
	completed: bool,
}

impl Drop for CancelGuard {
	fn drop(&mut self) {
		if !self.completed && self.callbacks.lock().remove(&self.id).is_some() {
			tracing::debug!(target = "hostrun.runtime", id = self.id, "removed orphaned callback");
		}
	}
}

/// Future returned by [`Connection::send_message`].
struct ResponseFuture {
	rx: oneshot::Receiver<Result<Value>>,
	guard: CancelGuard,
}

impl Future for ResponseFuture {
	type Output = Result<Value>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		match Pin::new(&mut self.rx).poll(cx) {
			Poll::Ready(result) => {
				self.guard.completed = true;
				Poll::Ready(result.map_err(|_| Error::ChannelClosed).and_then(|r| r))
			}
			Poll::Pending => Poll::Pending,
		}
	}
}

/// Call channel to one host.
pub struct Connection {
	last_id: AtomicU32,
	callbacks: CallbackMap,
	outbound_tx: mpsc::UnboundedSender<Value>,
	closed: Arc<AtomicBool>,
	tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Connection {
	/// Starts reader, writer, and dispatch tasks for `transport`.
	///
	/// Must be called from within a tokio runtime.
	pub fn start(transport: PipeTransport, message_rx: mpsc::UnboundedReceiver<Value>) -> Arc<Self> {
		let (mut sender, mut receiver) = transport.into_parts();
		let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Value>();
		let callbacks: CallbackMap = Arc::new(Mutex::new(HashMap::new()));
		let closed = Arc::new(AtomicBool::new(false));

		let reader = tokio::spawn(async move {
			if let Err(err) = receiver.run().await {
				tracing::debug!(target = "hostrun.runtime", error = %err, "transport read ended with error");
			}
		});

		let writer = tokio::spawn(async move {
			while let Some(message) = outbound_rx.recv().await {
				if let Err(err) = sender.send(message).await {
					tracing::debug!(target = "hostrun.runtime", error = %err, "transport write failed");
					break;
				}
			}
			let _ = sender.shutdown().await;
		});

		let dispatch = tokio::spawn(dispatch_loop(message_rx, Arc::clone(&callbacks), Arc::clone(&closed)));

		Arc::new(Self {
			last_id: AtomicU32::new(0),
			callbacks,
			outbound_tx,
			closed,
			tasks: Mutex::new(vec![reader, writer, dispatch]),
		})
	}

	/// Sends a request and awaits the correlated response.
	pub async fn send_message(&self, method: Method, params: Value) -> Result<Value> {
		if self.is_closed() {
			return Err(Error::ChannelClosed);
		}

		let id = self.last_id.fetch_add(1, Ordering::SeqCst);
		let (tx, rx) = oneshot::channel();
		self.callbacks.lock().insert(id, tx);
		let guard = CancelGuard {
			id,
			callbacks: Arc::clone(&self.callbacks),
			completed: false,
		};

		// The dispatch loop may have drained callbacks between the check above and the insert.
		if self.is_closed() {
			return Err(Error::ChannelClosed);
		}

		let request = serde_json::to_value(Request { id, method, params })?;
		tracing::trace!(target = "hostrun.runtime", id, %method, "sending request");
		if self.outbound_tx.send(request).is_err() {
			return Err(Error::ChannelClosed);
		}

		ResponseFuture { rx, guard }.await
	}

	/// Returns `true` once the peer hung up or [`close`](Self::close) was called.
	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}

	/// Closes the channel and fails all pending calls. Idempotent.
	pub fn close(&self) {
		if self.closed.swap(true, Ordering::SeqCst) {
			return;
		}
		for task in self.tasks.lock().drain(..) {
			task.abort();
		}
		fail_pending(&self.callbacks);
	}

	#[cfg(test)]
	pub(crate) fn pending_calls(&self) -> usize {
		self.callbacks.lock().len()
	}
}

impl Drop for Connection {
	fn drop(&mut self) {
		self.close();
	}
}

async fn dispatch_loop(mut message_rx: mpsc::UnboundedReceiver<Value>, callbacks: CallbackMap, closed: Arc<AtomicBool>) {
	while let Some(value) = message_rx.recv().await {
		let response: Response = match serde_json::from_value(value) {
			Ok(response) => response,
			Err(err) => {
				tracing::warn!(target = "hostrun.runtime", error = %err, "ignoring unparsable frame");
				continue;
			}
		};

		let Some(callback) = callbacks.lock().remove(&response.id) else {
			tracing::debug!(target = "hostrun.runtime", id = response.id, "response for unknown request");
			continue;
		};

		let result = match response.error {
			Some(error) => Err(remote_error(error)),
			None => Ok(response.result.unwrap_or(Value::Null)),
		};
		let _ = callback.send(result);
	}

	closed.store(true, Ordering::SeqCst);
	fail_pending(&callbacks);
}

fn fail_pending(callbacks: &CallbackMap) {
	let pending: Vec<_> = callbacks.lock().drain().collect();
	for (_, callback) in pending {
		let _ = callback.send(Err(Error::ChannelClosed));
	}
}

fn remote_error(payload: ErrorPayload) -> Error {
	Error::Remote {
		name: payload.name,
		message: payload.message,
		stack: payload.stack,
	}
}
