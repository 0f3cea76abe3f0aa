//! Error types for the webrc runtime.

use thiserror::Error;
use webrc_protocol::SessionId;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the webrc runtime.
#[derive(Debug, Error)]
pub enum Error {
	/// A call violated the single-outstanding-command contract.
	///
	/// Fatal to the call, not to the session.
	#[error("Illegal state: {0}")]
	IllegalState(String),

	/// The session was closed while the call was pending or before it began.
	#[error("Session {session} was closed")]
	SessionClosed { session: SessionId },

	/// No session is registered under this id.
	#[error("Session not found: {0}")]
	SessionNotFound(SessionId),

	/// Handle id never issued by this session, or already invalidated.
	#[error("No such element: {id}")]
	NoSuchElement { id: String },

	/// Handle exists but its backing object is no longer valid.
	#[error("Stale element reference: {id}")]
	StaleElementReference { id: String },

	/// Configuration could not be loaded.
	#[error("Config error: {path}: {message}")]
	Config { path: String, message: String },
}

impl Error {
	/// Returns true if this error reports a closed session.
	pub fn is_closed(&self) -> bool {
		matches!(self, Error::SessionClosed { .. })
	}

	/// Returns true if this error reports an invalidated element.
	pub fn is_stale(&self) -> bool {
		matches!(self, Error::StaleElementReference { .. })
	}
}
