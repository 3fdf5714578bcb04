//! Host-side call loop.
//!
//! Hosts written in Rust answer the coordinator by handing a stream and a
//! [`HostHandler`] to [`serve`]. Requests are handled one at a time in
//! arrival order; `ping` is answered without consulting the handler.

use std::sync::Arc;

use async_trait::async_trait;
use hostrun_protocol::{ErrorPayload, Method, Request, Response};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Result;
use crate::transport::{read_frame, write_frame};

/// Host-side implementation of the call surface.
#[async_trait]
pub trait HostHandler: Send + Sync {
	async fn handle(&self, method: Method, params: Value) -> std::result::Result<Value, ErrorPayload>;
}

/// Serves requests from `stream` until the coordinator hangs up.
pub async fn serve<S>(stream: S, handler: Arc<dyn HostHandler>) -> Result<()>
where
	S: AsyncRead + AsyncWrite,
{
	let (mut reader, mut writer) = tokio::io::split(stream);

	while let Some(frame) = read_frame(&mut reader).await? {
		let request: Request = match serde_json::from_value(frame) {
			Ok(request) => request,
			Err(err) => {
				tracing::warn!(target = "hostrun.runtime", error = %err, "dropping malformed request");
				continue;
			}
		};

		let response = match request.method {
			Method::Ping => Response::ok(request.id, Value::Null),
			method => match handler.handle(method, request.params).await {
				Ok(result) => Response::ok(request.id, result),
				Err(error) => Response::err(request.id, error),
			},
		};
		write_frame(&mut writer, &serde_json::to_value(response)?).await?;
	}

	Ok(())
}
