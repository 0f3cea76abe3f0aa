//! Caller-side view of one browser session.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;
use webrc_protocol::{Capabilities, ElementRef, Response, SessionId};
use webrc_runtime::{KnownElement, RemoteObject, Session, SessionRegistry};

use crate::codec::{self, Decode, Native};
use crate::error::Result;
use crate::error_handler::ErrorHandler;

/// Sends commands to one session and turns responses into typed values.
///
/// Arguments are encoded with the configured depth bound, failures are
/// translated by the [`ErrorHandler`], and results are decoded into the
/// requested type.
#[derive(Debug, Clone)]
pub struct RemoteSession {
	session: Arc<Session>,
	errors: Arc<ErrorHandler>,
	max_depth: usize,
}

impl RemoteSession {
	pub fn new(session: Arc<Session>, errors: ErrorHandler, max_depth: usize) -> Self {
		Self {
			session,
			errors: Arc::new(errors),
			max_depth,
		}
	}

	/// Creates a session in `registry`, configured from the registry's config.
	pub fn start(registry: &SessionRegistry, capabilities: Capabilities) -> Self {
		let config = registry.config();
		let errors = ErrorHandler::new(config.include_server_errors);
		let max_depth = config.max_encode_depth;
		Self::new(registry.new_session(capabilities), errors, max_depth)
	}

	/// Attaches to an existing session.
	pub fn attach(registry: &SessionRegistry, id: &SessionId) -> Result<Self> {
		let config = registry.config();
		let session = registry.get(id)?;
		Ok(Self::new(
			session,
			ErrorHandler::new(config.include_server_errors),
			config.max_encode_depth,
		))
	}

	pub fn id(&self) -> &SessionId {
		self.session.id()
	}

	pub fn session(&self) -> &Arc<Session> {
		&self.session
	}

	pub fn error_handler(&self) -> &ErrorHandler {
		&self.errors
	}

	/// Sends a command and returns the raw response, without translating
	/// failures. A timed-out wait yields [`Response::timed_out`].
	pub async fn send(&self, verb: &str, args: &[Native]) -> Result<Response> {
		let encoded = args
			.iter()
			.map(|arg| codec::encode(arg, self.max_depth))
			.collect::<std::result::Result<Vec<_>, _>>()?;

		self.session.touch();
		debug!(target = "webrc.session", session = %self.id(), verb, "sending command");
		Ok(self.session.queue().do_command(verb, encoded).await?)
	}

	/// Sends a command and returns its result tree, translating failures
	/// (including the timed-out sentinel) into [`Error::Command`](crate::Error::Command).
	pub async fn execute(&self, verb: &str, args: &[Native]) -> Result<Value> {
		let response = self.send(verb, args).await?;
		self.errors.check_response(&response)?;
		Ok(response.value)
	}

	/// Like [`execute`](Self::execute), decoding the result into `T`.
	pub async fn execute_as<T: Decode>(&self, verb: &str, args: &[Native]) -> Result<T> {
		let value = self.execute(verb, args).await?;
		Ok(codec::decode(&value)?)
	}

	/// Registers a live object and returns its handle.
	pub fn register_element(&self, object: Arc<dyn RemoteObject>) -> ElementRef {
		self.session.elements().add(object)
	}

	pub fn resolve_element(&self, element: &ElementRef) -> Result<KnownElement> {
		Ok(self.session.elements().resolve(element)?)
	}

	/// Invalidates a handle.
	pub fn release_element(&self, element: &ElementRef) -> bool {
		self.session.elements().remove(&element.id).is_some()
	}

	pub fn elements_equal(&self, one: &ElementRef, two: &ElementRef) -> Result<bool> {
		Ok(self.session.elements().elements_equal(&one.id, &two.id)?)
	}

	/// Closes the session's queue, releasing any waiter on either side.
	pub fn close(&self) {
		self.session.queue().declare_closed();
	}
}
