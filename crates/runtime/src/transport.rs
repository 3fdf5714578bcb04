//! Length-prefixed JSON framing over any byte stream.
//!
//! Every frame is a 4-byte little-endian length followed by that many bytes
//! of JSON. The same framing is used over child-process pipes, TCP and Unix
//! sockets, and in-memory duplex streams in tests.

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::error::{Error, Result};

/// Upper bound on a single frame; anything larger is treated as corruption.
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Writes one frame and flushes.
pub async fn write_frame<W>(writer: &mut W, message: &Value) -> Result<()>
where
	W: AsyncWrite + Unpin + ?Sized,
{
	let bytes = serde_json::to_vec(message)?;
	let length = u32::try_from(bytes.len()).map_err(|_| Error::TransportError(format!("frame of {} bytes is too large", bytes.len())))?;

	writer.write_all(&length.to_le_bytes()).await.map_err(transport_err)?;
	writer.write_all(&bytes).await.map_err(transport_err)?;
	writer.flush().await.map_err(transport_err)?;
	Ok(())
}

/// Reads one frame; `Ok(None)` on a clean end of stream between frames.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Value>>
where
	R: AsyncRead + Unpin + ?Sized,
{
	let mut len_buf = [0u8; 4];
	match reader.read_exact(&mut len_buf).await {
		Ok(_) => {}
		Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
		Err(err) => return Err(transport_err(err)),
	}

	let length = u32::from_le_bytes(len_buf) as usize;
	if length > MAX_FRAME_LEN {
		return Err(Error::ProtocolError(format!("frame length {length} exceeds limit {MAX_FRAME_LEN}")));
	}

	let mut body = vec![0u8; length];
	reader.read_exact(&mut body).await.map_err(transport_err)?;
	Ok(Some(serde_json::from_slice(&body)?))
}

fn transport_err(err: std::io::Error) -> Error {
	Error::TransportError(err.to_string())
}

/// Bidirectional frame transport over a split reader/writer pair.
pub struct PipeTransport {
	sender: PipeTransportSender,
	receiver: PipeTransportReceiver,
}

impl PipeTransport {
	/// Creates a transport and the channel incoming frames are forwarded to.
	pub fn new<W, R>(writer: W, reader: R) -> (Self, mpsc::UnboundedReceiver<Value>)
	where
		W: AsyncWrite + Send + Unpin + 'static,
		R: AsyncRead + Send + Unpin + 'static,
	{
		let (message_tx, message_rx) = mpsc::unbounded_channel();
		let transport = Self {
			sender: PipeTransportSender { writer: Box::new(writer) },
			receiver: PipeTransportReceiver {
				reader: Box::new(reader),
				message_tx,
			},
		};
		(transport, message_rx)
	}

	/// Splits a single duplex stream (socket, in-memory pipe) into a transport.
	pub fn from_stream<S>(stream: S) -> (Self, mpsc::UnboundedReceiver<Value>)
	where
		S: AsyncRead + AsyncWrite + Send + 'static,
	{
		let (reader, writer) = tokio::io::split(stream);
		Self::new(writer, reader)
	}

	/// Runs the read loop until the peer closes the stream.
	pub async fn run(&mut self) -> Result<()> {
		self.receiver.run().await
	}

	/// Splits into independently owned halves.
	pub fn into_parts(self) -> (PipeTransportSender, PipeTransportReceiver) {
		(self.sender, self.receiver)
	}
}

/// Write half of a [`PipeTransport`].
pub struct PipeTransportSender {
	writer: BoxedWriter,
}

impl PipeTransportSender {
	pub async fn send(&mut self, message: Value) -> Result<()> {
		write_frame(&mut self.writer, &message).await
	}

	/// Shuts the write side down so the peer observes end of stream.
	pub async fn shutdown(&mut self) -> Result<()> {
		self.writer.shutdown().await.map_err(transport_err)
	}
}

/// Read half of a [`PipeTransport`].
pub struct PipeTransportReceiver {
	reader: BoxedReader,
	message_tx: mpsc::UnboundedSender<Value>,
}

impl PipeTransportReceiver {
	/// Forwards frames until end of stream, a read error, or the consumer
	/// dropping its receiver.
	pub async fn run(&mut self) -> Result<()> {
		while let Some(message) = read_frame(&mut self.reader).await? {
			if self.message_tx.send(message).is_err() {
				tracing::debug!(target = "hostrun.runtime", "frame consumer dropped; stopping reader");
				break;
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests;
