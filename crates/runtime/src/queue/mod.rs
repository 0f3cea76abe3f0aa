//! Per-session command queue bridging blocking callers to a polling agent.
//!
//! A [`CommandQueue`] is two [`CommandSlot`]s: one holding the command
//! waiting for the agent, one holding the result waiting for the caller.
//!
//! # Message Flow
//!
//! 1. Caller calls [`do_command`](CommandQueue::do_command); the command is
//!    offered into the command slot
//! 2. Agent polls [`get_next_command`](CommandQueue::get_next_command) and
//!    receives it (or the retry no-op if nothing arrives in time)
//! 3. Agent posts its result via
//!    [`handle_command_result`](CommandQueue::handle_command_result), which
//!    also fetches the next command in the same round trip
//! 4. Caller's wait on the result slot completes with the response
//!
//! At most one command is outstanding per queue. Routine conditions
//! (result timeout, empty poll) become sentinel values; closing the queue
//! poisons both slots so every waiter returns at once.


use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info, warn};
use webrc_protocol::{RemoteCommand, Response, SessionId};

use crate::config::QueueConfig;
use crate::error::{Error, Result};
use crate::slot::CommandSlot;

/// What the result slot carries: a posted response, or the closed marker.
#[derive(Debug, Clone, PartialEq)]
enum Delivery {
	Result(Response),
	Closed,
}

/// Observable position in the command/result cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
	/// Nothing pending
	Idle,
	/// A command waits for the agent to fetch it
	CommandPending,
	/// The agent has the command; the caller waits for its result
	ResultPending,
	/// Terminal; the session was closed
	Closed,
}

/// Command/result hand-off for one browser session.
pub struct CommandQueue {
	session_id: SessionId,
	command_slot: CommandSlot<RemoteCommand>,
	result_slot: CommandSlot<Delivery>,
	config: QueueConfig,
	queue_delay_ms: AtomicU64,
	outstanding: AtomicBool,
	/// Set when the caller gave up on a command the agent already fetched;
	/// the agent's late answer to it must not reach the next caller.
	discard_late_result: Mutex<bool>,
	closed: AtomicBool,
}

impl CommandQueue {
	/// Creates a queue; its delay starts at `config.speed`.
	pub fn new(session_id: SessionId, config: QueueConfig) -> Self {
		Self {
			command_slot: CommandSlot::new("command", RemoteCommand::close(session_id.clone())),
			result_slot: CommandSlot::new("result", Delivery::Closed),
			queue_delay_ms: AtomicU64::new(duration_ms(config.speed)),
			outstanding: AtomicBool::new(false),
			discard_late_result: Mutex::new(false),
			closed: AtomicBool::new(false),
			session_id,
			config,
		}
	}

	pub fn session_id(&self) -> &SessionId {
		&self.session_id
	}

	pub fn config(&self) -> &QueueConfig {
		&self.config
	}

	/// Delay applied before each submitted command.
	pub fn queue_delay(&self) -> Duration {
		Duration::from_millis(self.queue_delay_ms.load(Ordering::SeqCst))
	}

	/// Overrides the delay for this queue only.
	pub fn set_queue_delay(&self, delay: Duration) {
		self.queue_delay_ms.store(duration_ms(delay), Ordering::SeqCst);
	}

	/// Submits a command and waits for its result.
	///
	/// Returns [`Response::timed_out`] if nothing arrives within the
	/// command timeout, and [`Error::SessionClosed`] if the queue is closed
	/// while waiting.
	pub async fn do_command(&self, verb: &str, args: Vec<Value>) -> Result<Response> {
		self.do_command_without_waiting_for_a_response(verb, args).await?;
		self.get_result().await
	}

	/// Submits a command without waiting for its result.
	///
	/// In proxy-injection mode a result already sitting in the result slot
	/// is taken as this command's answer and the command is not queued.
	/// Otherwise an unread result, or a command still outstanding, is
	/// [`Error::IllegalState`].
	pub async fn do_command_without_waiting_for_a_response(&self, verb: &str, args: Vec<Value>) -> Result<()> {
		self.ensure_open()?;

		let delay = self.queue_delay();
		if !delay.is_zero() {
			tokio::time::sleep(delay).await;
		}

		if self
			.outstanding
			.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
			.is_err()
		{
			warn!(target = "webrc.queue", session = %self.session_id, verb, "command rejected, previous command still outstanding");
			return Err(Error::IllegalState(format!(
				"Session {} already has a command outstanding; cannot submit '{verb}'",
				self.session_id
			)));
		}

		match self.result_slot.peek() {
			Some(Delivery::Result(waiting)) if self.config.proxy_injection_mode => {
				debug!(target = "webrc.queue", session = %self.session_id, verb, result = ?waiting.value, "result already waiting, treating it as the answer");
				return Ok(());
			}
			Some(Delivery::Result(waiting)) => {
				self.outstanding.store(false, Ordering::SeqCst);
				return Err(Error::IllegalState(format!(
					"Session {} has an unread result {}; cannot submit '{verb}'",
					self.session_id, waiting.value
				)));
			}
			Some(Delivery::Closed) => {
				self.outstanding.store(false, Ordering::SeqCst);
				return Err(self.closed_error());
			}
			None => {}
		}

		let command = RemoteCommand::new(self.session_id.clone(), verb, args);
		debug!(target = "webrc.queue", session = %self.session_id, verb, "queueing command");
		if !self.command_slot.offer(command) {
			self.outstanding.store(false, Ordering::SeqCst);
			self.ensure_open()?;
			return Err(Error::IllegalState(format!(
				"Session {} already has a command pending; cannot submit '{verb}'",
				self.session_id
			)));
		}
		Ok(())
	}

	/// Waits for the result of the outstanding command.
	pub async fn get_result(&self) -> Result<Response> {
		let delivery = self.result_slot.poll_with_timeout(self.config.command_timeout).await;
		match delivery {
			Some(Delivery::Result(response)) => {
				self.outstanding.store(false, Ordering::SeqCst);
				Ok(response)
			}
			Some(Delivery::Closed) => {
				self.outstanding.store(false, Ordering::SeqCst);
				Err(self.closed_error())
			}
			None => {
				match self.command_slot.try_take() {
					Some(_) if self.command_slot.is_poisoned() => return Err(self.closed_error()),
					Some(withdrawn) => {
						debug!(target = "webrc.queue", session = %self.session_id, verb = %withdrawn.verb, "withdrawing command the agent never fetched");
					}
					None if self.outstanding.load(Ordering::SeqCst) => self.abandon_fetched_command(),
					None => {}
				}
				self.outstanding.store(false, Ordering::SeqCst);
				warn!(target = "webrc.queue", session = %self.session_id, timeout = ?self.config.command_timeout, "timed out waiting for result");
				Ok(Response::timed_out(self.session_id.clone()))
			}
		}
	}

	/// Agent side: waits up to the retry timeout for the next command.
	///
	/// Returns [`RemoteCommand::retry`] when nothing arrives in time, and
	/// [`RemoteCommand::close`] once the queue is closed.
	pub async fn get_next_command(&self) -> RemoteCommand {
		match self.command_slot.poll_with_timeout(self.config.retry_timeout).await {
			Some(command) => {
				if self.command_slot.is_poisoned() {
					debug!(target = "webrc.queue", session = %self.session_id, "agent told to stop polling");
				} else {
					// the agent has moved on, so no answer to an abandoned command is coming
					*self.discard_late_result.lock() = false;
					debug!(target = "webrc.queue", session = %self.session_id, verb = %command.verb, "command handed to agent");
				}
				command
			}
			None => RemoteCommand::retry(self.session_id.clone()),
		}
	}

	/// Agent side: posts `result` (if any) and fetches the next command.
	pub async fn handle_command_result(&self, result: Option<Value>) -> Result<RemoteCommand> {
		if let Some(result) = result {
			self.put_result(result)?;
		}
		Ok(self.get_next_command().await)
	}

	/// Agent side: posts `result` without fetching another command.
	pub fn handle_command_result_without_waiting_for_a_command(&self, result: Value) -> Result<()> {
		self.put_result(result)
	}

	/// Places a successful result for the waiting caller.
	pub fn put_result(&self, result: Value) -> Result<()> {
		self.put_response(Response::success(self.session_id.clone(), result))
	}

	/// Places a response, which may carry a failure status.
	///
	/// Posts after closure are dropped, as is the late answer to a command
	/// whose caller already timed out. A second unread result is an
	/// [`Error::IllegalState`] unless the queue runs in proxy-injection mode,
	/// where it is dropped.
	pub fn put_response(&self, response: Response) -> Result<()> {
		let mut discard = self.discard_late_result.lock();
		if *discard && !self.is_closed() {
			*discard = false;
			debug!(target = "webrc.queue", session = %self.session_id, value = %response.value, "dropping result for a timed-out command");
			return Ok(());
		}
		let offered = self.result_slot.offer(Delivery::Result(response.clone()));
		drop(discard);

		if offered {
			debug!(target = "webrc.queue", session = %self.session_id, status = response.status, "result posted");
			return Ok(());
		}
		if self.is_closed() {
			debug!(target = "webrc.queue", session = %self.session_id, value = %response.value, "dropping result posted after close");
			return Ok(());
		}
		if self.config.proxy_injection_mode {
			debug!(target = "webrc.queue", session = %self.session_id, value = %response.value, "dropping extra result in proxy-injection mode");
			return Ok(());
		}
		Err(Error::IllegalState(format!(
			"Session {} already has an unread result; dropping {}",
			self.session_id, response.value
		)))
	}

	/// Command waiting for the agent, without consuming it.
	pub fn peek_at_command(&self) -> Option<RemoteCommand> {
		if self.command_slot.is_poisoned() {
			return None;
		}
		self.command_slot.peek()
	}

	/// Result waiting for the caller, without consuming it.
	pub fn peek_at_result(&self) -> Option<Response> {
		match self.result_slot.peek() {
			Some(Delivery::Result(response)) => Some(response),
			_ => None,
		}
	}

	pub fn state(&self) -> QueueState {
		if self.is_closed() {
			QueueState::Closed
		} else if !self.command_slot.is_empty() {
			QueueState::CommandPending
		} else if self.outstanding.load(Ordering::SeqCst) || !self.result_slot.is_empty() {
			QueueState::ResultPending
		} else {
			QueueState::Idle
		}
	}

	/// Closes the queue, releasing every waiter on either side.
	pub fn declare_closed(&self) {
		if self.closed.swap(true, Ordering::SeqCst) {
			return;
		}
		info!(target = "webrc.queue", session = %self.session_id, "closing command queue");
		self.command_slot.clear_and_inject_poison();
		self.result_slot.clear_and_inject_poison();
	}

	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}

	/// Marks the command the agent fetched as abandoned by its caller.
	///
	/// A result that slipped in after the caller's wait expired is consumed
	/// here; otherwise the next post is dropped when it arrives.
	fn abandon_fetched_command(&self) {
		let mut discard = self.discard_late_result.lock();
		match self.result_slot.try_take() {
			Some(Delivery::Result(late)) => {
				*discard = false;
				debug!(target = "webrc.queue", session = %self.session_id, value = %late.value, "dropping result that raced the timeout");
			}
			// poison is sticky, so taking it leaves the slot closed
			Some(Delivery::Closed) => {}
			None => *discard = true,
		}
	}

	fn ensure_open(&self) -> Result<()> {
		if self.is_closed() {
			return Err(self.closed_error());
		}
		Ok(())
	}

	fn closed_error(&self) -> Error {
		Error::SessionClosed {
			session: self.session_id.clone(),
		}
	}
}

impl std::fmt::Debug for CommandQueue {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CommandQueue")
			.field("session_id", &self.session_id)
			.field("state", &self.state())
			.field("queue_delay", &self.queue_delay())
			.finish()
	}
}

fn duration_ms(duration: Duration) -> u64 {
	u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
