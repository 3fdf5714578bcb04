//! `hostrun host`: a host process built on the stand-in call surface.

use std::sync::Arc;

use async_trait::async_trait;
use hostrun::MockProxy;
use hostrun::protocol::{ErrorPayload, Method, RunContext, RunParams};
use hostrun::runtime::{Endpoint, HostHandler, RemoteProxy, serve};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;

use crate::cli::HostArgs;
use crate::error::Result;

pub async fn execute(args: HostArgs) -> Result<()> {
	let listener = TcpListener::bind(&args.listen).await?;
	let endpoint = Endpoint::Tcp(listener.local_addr()?.to_string());
	let application = std::env::var("HOSTRUN_APPLICATION").ok();
	let version = std::env::var("HOSTRUN_VERSION").ok();
	tracing::info!(
		target = "hostrun.runtime",
		%endpoint,
		application = application.as_deref(),
		version = version.as_deref(),
		"host listening"
	);
	println!("{}", endpoint.listen_line());

	let handler: Arc<dyn HostHandler> = Arc::new(StandInHost::default());
	tokio::select! {
		accepted = listener.accept() => {
			let (stream, peer) = accepted?;
			stream.set_nodelay(true)?;
			tracing::debug!(target = "hostrun.runtime", %peer, "coordinator connected");
			tokio::select! {
				served = serve(stream, handler) => served?,
				closed = stdin_closed() => closed?,
			}
		}
		closed = stdin_closed() => closed?,
	}

	tracing::info!(target = "hostrun.runtime", "host exiting");
	Ok(())
}

/// Resolves once the coordinator closes our stdin.
async fn stdin_closed() -> Result<()> {
	let mut stdin = tokio::io::stdin();
	let mut buf = [0u8; 256];
	while stdin.read(&mut buf).await? > 0 {}
	Ok(())
}

/// Answers every call through an in-process [`MockProxy`].
#[derive(Default)]
struct StandInHost {
	proxy: MockProxy,
}

#[async_trait]
impl HostHandler for StandInHost {
	async fn handle(&self, method: Method, params: Value) -> std::result::Result<Value, ErrorPayload> {
		let proxy = &self.proxy;
		let result = match method {
			Method::Ping => proxy.ping().await.map(|()| Value::Null),
			Method::IsInitialized => proxy.is_initialized().await.map(Value::Bool),
			Method::Initialize => proxy.initialize(&decode::<RunContext>(params)?).await.map(|()| Value::Null),
			Method::Run => {
				let reply = proxy.run(&decode::<RunParams>(params)?).await;
				reply.and_then(|reply| Ok(serde_json::to_value(reply)?))
			}
			Method::Abort => proxy.abort().await.map(|()| Value::Null),
			Method::Pause => proxy.pause().await.map(|()| Value::Null),
			Method::Resume => proxy.resume().await.map(|()| Value::Null),
			Method::Stop => proxy.stop().await.map(|()| Value::Null),
			Method::Cleanup => proxy.cleanup().await.map(|()| Value::Null),
			Method::ReceiveMessage => proxy.receive_message(&params).await.map(|()| Value::Null),
			Method::PreTestRunFinished => proxy
				.pre_test_run_finished(&decode::<RunContext>(params)?)
				.await
				.map(|()| Value::Null),
		};

		result.map_err(|err| ErrorPayload {
			message: err.to_string(),
			name: Some("HostError".into()),
			stack: err.stack_trace().map(str::to_string),
		})
	}
}

fn decode<T: DeserializeOwned>(params: Value) -> std::result::Result<T, ErrorPayload> {
	serde_json::from_value(params).map_err(|err| ErrorPayload {
		message: format!("invalid params: {err}"),
		name: Some("InvalidParams".into()),
		stack: None,
	})
}
