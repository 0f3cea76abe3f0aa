use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use webrc::protocol::{Response, SessionId, StatusCode};
use webrc::runtime::{self, QueueState, RemoteControlConfig, SessionRegistry};

use super::protocol::{DaemonRequest, DaemonResponse, SessionInfo};

/// Sweep period when no idle timeout is configured; the tick is ignored.
const IDLE_SWEEP_DISABLED_PERIOD: Duration = Duration::from_secs(3600);
const MIN_IDLE_SWEEP_PERIOD: Duration = Duration::from_millis(100);

/// Line-oriented JSON front end over a [`SessionRegistry`].
pub struct Daemon {
	registry: Arc<SessionRegistry>,
	shutdown_tx: watch::Sender<bool>,
	shutdown_rx: watch::Receiver<bool>,
	listener: TcpListener,
}

impl Daemon {
	/// Binds `127.0.0.1:<config.port>`. Port 0 picks a free port.
	pub async fn bind(config: RemoteControlConfig) -> Result<Self> {
		let addr = format!("127.0.0.1:{}", config.port);
		let listener = TcpListener::bind(&addr)
			.await
			.with_context(|| format!("Failed to bind server socket: {addr}"))?;
		let local = listener.local_addr().context("Failed to read bound address")?;
		info!(target = "webrc.daemon", addr = %local, "server listening");

		let (shutdown_tx, shutdown_rx) = watch::channel(false);
		Ok(Self {
			registry: Arc::new(SessionRegistry::new(config)),
			shutdown_tx,
			shutdown_rx,
			listener,
		})
	}

	pub fn local_addr(&self) -> Result<SocketAddr> {
		self.listener.local_addr().context("Failed to read bound address")
	}

	pub fn registry(&self) -> &Arc<SessionRegistry> {
		&self.registry
	}

	/// Serves connections until a shutdown request or signal, then closes
	/// every session.
	pub async fn run(mut self) -> Result<()> {
		let idle_timeout = self.registry.config().idle_session_timeout();
		let period = idle_timeout.map_or(IDLE_SWEEP_DISABLED_PERIOD, |timeout| {
			(timeout / 2).max(MIN_IDLE_SWEEP_PERIOD)
		});
		let mut sweep = tokio::time::interval(period);
		sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

		let signals = shutdown_signal();
		tokio::pin!(signals);

		loop {
			tokio::select! {
				_ = self.shutdown_rx.changed() => {
					if *self.shutdown_rx.borrow() {
						info!(target = "webrc.daemon", "shutdown requested via message");
						break;
					}
				}
				signal = &mut signals => {
					match signal {
						Ok(name) => info!(target = "webrc.daemon", signal = name, "received signal, shutting down"),
						Err(err) => warn!(target = "webrc.daemon", error = %err, "signal handler failed, shutting down"),
					}
					break;
				}
				_ = sweep.tick(), if idle_timeout.is_some() => {
					if let Some(max_idle) = idle_timeout {
						let swept = self.registry.sweep_idle(max_idle);
						if !swept.is_empty() {
							info!(target = "webrc.daemon", count = swept.len(), "closed idle sessions");
						}
					}
				}
				accept = self.listener.accept() => {
					let (stream, peer) = accept.context("Server accept failed")?;
					debug!(target = "webrc.daemon", %peer, "connection accepted");
					let registry = Arc::clone(&self.registry);
					let shutdown_tx = self.shutdown_tx.clone();
					tokio::spawn(async move {
						if let Err(err) = handle_client(stream, registry, shutdown_tx).await {
							warn!(target = "webrc.daemon", error = %err, "connection error");
						}
					});
				}
			}
		}

		self.registry.shutdown();
		Ok(())
	}
}

#[cfg(unix)]
async fn shutdown_signal() -> Result<&'static str> {
	use tokio::signal::unix::{SignalKind, signal};

	let mut sigterm = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
	let mut sigint = signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;
	tokio::select! {
		_ = sigterm.recv() => Ok("SIGTERM"),
		_ = sigint.recv() => Ok("SIGINT"),
	}
}

#[cfg(not(unix))]
async fn shutdown_signal() -> Result<&'static str> {
	tokio::signal::ctrl_c()
		.await
		.context("Failed to install Ctrl+C handler")?;
	Ok("Ctrl+C")
}

async fn handle_client<S>(stream: S, registry: Arc<SessionRegistry>, shutdown_tx: watch::Sender<bool>) -> Result<()>
where
	S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
	let (read_half, mut write_half) = tokio::io::split(stream);
	let mut reader = BufReader::new(read_half);
	let mut line = String::new();

	loop {
		line.clear();
		let bytes = reader
			.read_line(&mut line)
			.await
			.context("Failed reading request")?;
		if bytes == 0 {
			break;
		}
		if line.trim().is_empty() {
			continue;
		}

		let request = match serde_json::from_str::<DaemonRequest>(line.trim_end()) {
			Ok(req) => req,
			Err(err) => {
				let response = DaemonResponse::Error {
					code: "invalid_request".to_string(),
					message: err.to_string(),
				};
				write_response(&mut write_half, &response).await?;
				continue;
			}
		};

		let response = handle_request(&registry, &shutdown_tx, request).await;
		write_response(&mut write_half, &response).await?;
	}

	Ok(())
}

async fn write_response<W>(writer: &mut W, response: &DaemonResponse) -> Result<()>
where
	W: tokio::io::AsyncWrite + Unpin,
{
	let payload = serde_json::to_string(response).context("Failed to serialize response")?;
	writer
		.write_all(format!("{payload}\n").as_bytes())
		.await
		.context("Failed writing response")?;
	writer.flush().await.context("Failed flushing response")?;
	Ok(())
}

/// Executes one request against the registry.
pub(crate) async fn handle_request(
	registry: &SessionRegistry,
	shutdown_tx: &watch::Sender<bool>,
	request: DaemonRequest,
) -> DaemonResponse {
	match request {
		DaemonRequest::Ping => DaemonResponse::Pong,
		DaemonRequest::NewSession { capabilities } => {
			let session = registry.new_session(capabilities);
			DaemonResponse::Session {
				session_id: session.id().clone(),
			}
		}
		DaemonRequest::Command { session_id, verb, args } => {
			let session = match registry.get(&session_id) {
				Ok(session) => session,
				Err(err) => return runtime_error(err),
			};
			match session.queue().do_command(&verb, args).await {
				Ok(response) => DaemonResponse::Response { response },
				Err(err) => runtime_error(err),
			}
		}
		DaemonRequest::Poll {
			session_id,
			result,
			status,
		} => {
			let session = match registry.get(&session_id) {
				Ok(session) => session,
				Err(err) => return runtime_error(err),
			};
			let queue = session.queue();
			if let Some(value) = result {
				if let Err(err) = queue.put_response(agent_response(session_id, status, value)) {
					return runtime_error(err);
				}
			}
			DaemonResponse::Command {
				command: queue.get_next_command().await,
			}
		}
		DaemonRequest::Post {
			session_id,
			result,
			status,
		} => {
			let session = match registry.get(&session_id) {
				Ok(session) => session,
				Err(err) => return runtime_error(err),
			};
			match session.queue().put_response(agent_response(session_id, status, result)) {
				Ok(()) => DaemonResponse::Ok,
				Err(err) => runtime_error(err),
			}
		}
		DaemonRequest::EndSession { session_id } => match registry.end_session(&session_id) {
			Ok(()) => DaemonResponse::Ok,
			Err(err) => runtime_error(err),
		},
		DaemonRequest::ListSessions => {
			let list = registry
				.list()
				.into_iter()
				.filter_map(|id| registry.try_get(&id))
				.map(|session| SessionInfo {
					session_id: session.id().clone(),
					capabilities: session.capabilities().clone(),
					state: state_name(session.queue().state()).to_string(),
					idle_ms: u64::try_from(session.idle_for().as_millis()).unwrap_or(u64::MAX),
				})
				.collect();
			DaemonResponse::Sessions { list }
		}
		DaemonRequest::SetSpeed { session_id, speed_ms } => {
			let speed = Duration::from_millis(speed_ms);
			match session_id {
				Some(id) => match registry.get(&id) {
					Ok(session) => {
						session.queue().set_queue_delay(speed);
						DaemonResponse::Ok
					}
					Err(err) => runtime_error(err),
				},
				None => {
					registry.set_default_speed(speed);
					DaemonResponse::Ok
				}
			}
		}
		DaemonRequest::Shutdown => {
			let _ = shutdown_tx.send(true);
			DaemonResponse::Ok
		}
	}
}

/// Response for a result posted by the agent; no status means success.
fn agent_response(session_id: SessionId, status: Option<i32>, value: Value) -> Response {
	Response {
		session_id: Some(session_id),
		status: status.unwrap_or(StatusCode::Success.code()),
		value,
	}
}

fn state_name(state: QueueState) -> &'static str {
	match state {
		QueueState::Idle => "idle",
		QueueState::CommandPending => "command_pending",
		QueueState::ResultPending => "result_pending",
		QueueState::Closed => "closed",
	}
}

fn runtime_error(err: runtime::Error) -> DaemonResponse {
	let code = match &err {
		runtime::Error::IllegalState(_) => "illegal_state",
		runtime::Error::SessionClosed { .. } => "session_closed",
		runtime::Error::SessionNotFound(_) => "session_not_found",
		runtime::Error::NoSuchElement { .. } => "no_such_element",
		runtime::Error::StaleElementReference { .. } => "stale_element_reference",
		runtime::Error::Config { .. } => "config",
	};
	debug!(target = "webrc.daemon", code, error = %err, "request failed");
	DaemonResponse::Error {
		code: code.to_string(),
		message: err.to_string(),
	}
}
