use tokio::io::{AsyncReadExt, AsyncWriteExt};

use super::*;

#[tokio::test]
async fn send_writes_little_endian_length_prefix() {
	let (mut host_side, coordinator_side) = tokio::io::duplex(1024);
	let (transport, _rx) = PipeTransport::from_stream(coordinator_side);
	let (mut sender, _receiver) = transport.into_parts();

	let message = serde_json::json!({"id": 1, "method": "ping", "params": null});
	sender.send(message.clone()).await.unwrap();

	let mut len_buf = [0u8; 4];
	host_side.read_exact(&mut len_buf).await.unwrap();
	let length = u32::from_le_bytes(len_buf) as usize;
	let mut body = vec![0u8; length];
	host_side.read_exact(&mut body).await.unwrap();

	let received: Value = serde_json::from_slice(&body).unwrap();
	assert_eq!(received, message);
}

#[tokio::test]
async fn receiver_forwards_frames_in_order() {
	let (_unused_read, writer) = tokio::io::duplex(4096);
	let (reader, mut host_write) = tokio::io::duplex(4096);
	let (mut transport, mut rx) = PipeTransport::new(writer, reader);

	let read_task = tokio::spawn(async move { transport.run().await });

	let messages = vec![
		serde_json::json!({"id": 0, "result": true}),
		serde_json::json!({"id": 1, "result": null}),
		serde_json::json!({"id": 2, "error": {"message": "nope"}}),
	];
	for message in &messages {
		write_frame(&mut host_write, message).await.unwrap();
	}

	for expected in &messages {
		assert_eq!(&rx.recv().await.unwrap(), expected);
	}

	drop(host_write);
	assert!(read_task.await.unwrap().is_ok());
}

#[tokio::test]
async fn read_frame_reports_clean_eof_as_none() {
	let (mut reader, writer) = tokio::io::duplex(64);
	drop(writer);
	assert!(read_frame(&mut reader).await.unwrap().is_none());
}

#[tokio::test]
async fn truncated_frame_is_a_channel_error() {
	let (mut reader, mut writer) = tokio::io::duplex(64);
	writer.write_all(&10u32.to_le_bytes()).await.unwrap();
	writer.write_all(b"{\"a\"").await.unwrap();
	drop(writer);

	let err = read_frame(&mut reader).await.unwrap_err();
	assert!(err.is_channel_error(), "unexpected error: {err}");
}

#[tokio::test]
async fn oversized_frame_is_rejected() {
	let (mut reader, mut writer) = tokio::io::duplex(64);
	writer.write_all(&u32::MAX.to_le_bytes()).await.unwrap();

	let err = read_frame(&mut reader).await.unwrap_err();
	assert!(matches!(err, Error::ProtocolError(_)), "unexpected error: {err}");
}
