mod protocol;
mod server;

#[cfg(test)]
mod tests;

use anyhow::{Context, Result, anyhow};
pub use protocol::{DaemonRequest, DaemonResponse, SessionInfo};
pub use server::Daemon;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

/// Sends one request to the server at `addr` and reads its reply.
pub async fn send_request(addr: &str, request: DaemonRequest) -> Result<DaemonResponse> {
	debug!(target = "webrc.daemon", addr, ?request, "sending request");
	let stream = TcpStream::connect(addr)
		.await
		.with_context(|| format!("Failed to connect to server at {addr}"))?;
	send_request_stream(stream, request).await
}

/// Like [`send_request`], but turns a [`DaemonResponse::Error`] into `Err`.
pub async fn expect_ok(addr: &str, request: DaemonRequest) -> Result<DaemonResponse> {
	match send_request(addr, request).await? {
		DaemonResponse::Error { code, message } => Err(anyhow!("server error {code}: {message}")),
		other => Ok(other),
	}
}

async fn send_request_stream<S>(mut stream: S, request: DaemonRequest) -> Result<DaemonResponse>
where
	S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
	let payload = serde_json::to_string(&request).context("Failed to serialize request")?;
	stream
		.write_all(format!("{payload}\n").as_bytes())
		.await
		.context("Failed writing request")?;
	stream.flush().await.context("Failed flushing request")?;

	let mut reader = BufReader::new(stream);
	let mut line = String::new();
	reader
		.read_line(&mut line)
		.await
		.context("Failed reading response")?;
	let response = serde_json::from_str(&line).context("Failed parsing response")?;
	Ok(response)
}
