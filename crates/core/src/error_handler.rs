//! Translation between flat status-code responses and typed failures.
//!
//! [`ErrorHandler::check_response`] turns a failed [`Response`] into a
//! [`CommandError`] whose kind comes from the status code. When the value
//! is a structured [`ErrorPayload`], the remote error is rebuilt as an
//! [`ErrorCause`] chain: locally known classes become
//! [`ErrorCause::Known`], anything else [`ErrorCause::UnknownRemote`], each
//! keeping the frames the agent reported. A screenshot always surfaces as
//! an [`ErrorCause::Screenshot`] wrapper, even when server causes are
//! suppressed.

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use webrc_protocol::{ErrorPayload, Response, SessionId, StackFrame, StatusCode};

use crate::codec::{self, Native};

/// Typed failure categories, one per non-success status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
	NoSuchElement,
	NoSuchWindow,
	NoSuchFrame,
	StaleElementReference,
	ElementNotVisible,
	InvalidElementState,
	UnknownCommand,
	MethodNotAllowed,
	XPathLookupError,
	Timeout,
	Unhandled,
}

impl ErrorKind {
	pub const ALL: [ErrorKind; 11] = [
		ErrorKind::NoSuchElement,
		ErrorKind::NoSuchWindow,
		ErrorKind::NoSuchFrame,
		ErrorKind::StaleElementReference,
		ErrorKind::ElementNotVisible,
		ErrorKind::InvalidElementState,
		ErrorKind::UnknownCommand,
		ErrorKind::MethodNotAllowed,
		ErrorKind::XPathLookupError,
		ErrorKind::Timeout,
		ErrorKind::Unhandled,
	];

	/// Kind for a status; `None` for success.
	pub fn from_status(status: StatusCode) -> Option<ErrorKind> {
		let kind = match status {
			StatusCode::Success => return None,
			StatusCode::NoSuchElement => ErrorKind::NoSuchElement,
			StatusCode::NoSuchFrame => ErrorKind::NoSuchFrame,
			StatusCode::UnknownCommand => ErrorKind::UnknownCommand,
			StatusCode::StaleElementReference => ErrorKind::StaleElementReference,
			StatusCode::ElementNotVisible => ErrorKind::ElementNotVisible,
			StatusCode::InvalidElementState => ErrorKind::InvalidElementState,
			StatusCode::UnhandledError => ErrorKind::Unhandled,
			StatusCode::XPathLookupError => ErrorKind::XPathLookupError,
			StatusCode::Timeout => ErrorKind::Timeout,
			StatusCode::NoSuchWindow => ErrorKind::NoSuchWindow,
			StatusCode::MethodNotAllowed => ErrorKind::MethodNotAllowed,
		};
		Some(kind)
	}

	pub fn status(self) -> StatusCode {
		match self {
			ErrorKind::NoSuchElement => StatusCode::NoSuchElement,
			ErrorKind::NoSuchWindow => StatusCode::NoSuchWindow,
			ErrorKind::NoSuchFrame => StatusCode::NoSuchFrame,
			ErrorKind::StaleElementReference => StatusCode::StaleElementReference,
			ErrorKind::ElementNotVisible => StatusCode::ElementNotVisible,
			ErrorKind::InvalidElementState => StatusCode::InvalidElementState,
			ErrorKind::UnknownCommand => StatusCode::UnknownCommand,
			ErrorKind::MethodNotAllowed => StatusCode::MethodNotAllowed,
			ErrorKind::XPathLookupError => StatusCode::XPathLookupError,
			ErrorKind::Timeout => StatusCode::Timeout,
			ErrorKind::Unhandled => StatusCode::UnhandledError,
		}
	}

	/// Class name this kind is known by on the wire.
	pub fn class_name(self) -> &'static str {
		match self {
			ErrorKind::NoSuchElement => "webrc.NoSuchElementError",
			ErrorKind::NoSuchWindow => "webrc.NoSuchWindowError",
			ErrorKind::NoSuchFrame => "webrc.NoSuchFrameError",
			ErrorKind::StaleElementReference => "webrc.StaleElementReferenceError",
			ErrorKind::ElementNotVisible => "webrc.ElementNotVisibleError",
			ErrorKind::InvalidElementState => "webrc.InvalidElementStateError",
			ErrorKind::UnknownCommand => "webrc.UnknownCommandError",
			ErrorKind::MethodNotAllowed => "webrc.MethodNotAllowedError",
			ErrorKind::XPathLookupError => "webrc.XPathLookupError",
			ErrorKind::Timeout => "webrc.TimeoutError",
			ErrorKind::Unhandled => "webrc.UnhandledError",
		}
	}

	/// Message used when the response carries none.
	pub fn default_message(self) -> &'static str {
		match self {
			ErrorKind::NoSuchElement => "Unable to locate element",
			ErrorKind::NoSuchWindow => "Unable to locate window",
			ErrorKind::NoSuchFrame => "Unable to locate frame",
			ErrorKind::StaleElementReference => "Element is no longer attached to the page",
			ErrorKind::ElementNotVisible => "Element is not currently visible",
			ErrorKind::InvalidElementState => "Element is in an invalid state for this command",
			ErrorKind::UnknownCommand => "Command is not supported",
			ErrorKind::MethodNotAllowed => "Method is not allowed for this resource",
			ErrorKind::XPathLookupError => "XPath expression could not be evaluated",
			ErrorKind::Timeout => "Timed out",
			ErrorKind::Unhandled => "Unhandled remote error",
		}
	}
}

impl fmt::Display for ErrorKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.class_name())
	}
}

/// A failure reported by the agent.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct CommandError {
	pub kind: ErrorKind,
	pub message: String,
	#[source]
	pub cause: Option<Box<ErrorCause>>,
}

impl CommandError {
	pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
		Self {
			kind,
			message: message.into(),
			cause: None,
		}
	}

	pub fn with_cause(mut self, cause: ErrorCause) -> Self {
		self.cause = Some(Box::new(cause));
		self
	}

	pub fn cause(&self) -> Option<&ErrorCause> {
		self.cause.as_deref()
	}

	/// Base64 screenshot attached anywhere in the cause chain.
	pub fn screenshot(&self) -> Option<&str> {
		let mut next = self.cause();
		while let Some(cause) = next {
			if let ErrorCause::Screenshot { screen, .. } = cause {
				return Some(screen);
			}
			next = cause.cause();
		}
		None
	}
}

/// One link of a reconstructed remote cause chain.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorCause {
	/// The remote class resolved to a local kind
	Known {
		kind: ErrorKind,
		class: String,
		message: Option<String>,
		stack_trace: Vec<StackFrame>,
		cause: Option<Box<ErrorCause>>,
	},
	/// The remote class is unknown or absent
	UnknownRemote {
		class: Option<String>,
		message: Option<String>,
		stack_trace: Vec<StackFrame>,
		cause: Option<Box<ErrorCause>>,
	},
	/// Screenshot taken at failure time, wrapping the real cause if kept
	Screenshot {
		screen: String,
		cause: Option<Box<ErrorCause>>,
	},
}

impl ErrorCause {
	pub fn message(&self) -> Option<&str> {
		match self {
			ErrorCause::Known { message, .. } | ErrorCause::UnknownRemote { message, .. } => message.as_deref(),
			ErrorCause::Screenshot { .. } => None,
		}
	}

	pub fn class(&self) -> Option<&str> {
		match self {
			ErrorCause::Known { class, .. } => Some(class),
			ErrorCause::UnknownRemote { class, .. } => class.as_deref(),
			ErrorCause::Screenshot { .. } => None,
		}
	}

	pub fn stack_trace(&self) -> &[StackFrame] {
		match self {
			ErrorCause::Known { stack_trace, .. } | ErrorCause::UnknownRemote { stack_trace, .. } => stack_trace,
			ErrorCause::Screenshot { .. } => &[],
		}
	}

	pub fn cause(&self) -> Option<&ErrorCause> {
		match self {
			ErrorCause::Known { cause, .. }
			| ErrorCause::UnknownRemote { cause, .. }
			| ErrorCause::Screenshot { cause, .. } => cause.as_deref(),
		}
	}

	/// Raw screenshot bytes, for the screenshot wrapper.
	pub fn decode_screenshot(&self) -> Option<Result<Vec<u8>, base64::DecodeError>> {
		match self {
			ErrorCause::Screenshot { screen, .. } => Some(webrc_protocol::decode_screenshot(screen)),
			_ => None,
		}
	}

	fn to_payload(&self) -> ErrorPayload {
		match self {
			ErrorCause::Known {
				class,
				message,
				stack_trace,
				cause,
				..
			} => ErrorPayload {
				message: message.clone(),
				class: Some(class.clone()),
				stack_trace: stack_trace.clone(),
				cause: cause.as_ref().map(|c| Box::new(c.to_payload())),
				screen: None,
			},
			ErrorCause::UnknownRemote {
				class,
				message,
				stack_trace,
				cause,
			} => ErrorPayload {
				message: message.clone(),
				class: class.clone(),
				stack_trace: stack_trace.clone(),
				cause: cause.as_ref().map(|c| Box::new(c.to_payload())),
				screen: None,
			},
			ErrorCause::Screenshot { screen, cause } => {
				let mut payload = cause.as_ref().map(|c| c.to_payload()).unwrap_or_default();
				payload.screen = Some(screen.clone());
				payload
			}
		}
	}
}

impl fmt::Display for ErrorCause {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ErrorCause::Screenshot { .. } => f.write_str("Screenshot captured at failure"),
			other => {
				let class = other.class().unwrap_or("unknown remote error");
				match other.message() {
					Some(message) => write!(f, "{class}: {message}"),
					None => f.write_str(class),
				}
			}
		}
	}
}

impl std::error::Error for ErrorCause {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		self.cause().map(|c| c as &(dyn std::error::Error + 'static))
	}
}

/// Status-code translator with a registry of locally known error classes.
#[derive(Debug, Clone)]
pub struct ErrorHandler {
	include_server_errors: bool,
	known_classes: HashMap<String, ErrorKind>,
}

impl Default for ErrorHandler {
	fn default() -> Self {
		Self::new(true)
	}
}

impl ErrorHandler {
	/// Handler that knows every [`ErrorKind::class_name`].
	pub fn new(include_server_errors: bool) -> Self {
		let known_classes = ErrorKind::ALL
			.into_iter()
			.map(|kind| (kind.class_name().to_string(), kind))
			.collect();
		Self {
			include_server_errors,
			known_classes,
		}
	}

	pub fn include_server_errors(&self) -> bool {
		self.include_server_errors
	}

	pub fn set_include_server_errors(&mut self, include: bool) {
		self.include_server_errors = include;
	}

	/// Makes `class` resolve locally to `kind`.
	pub fn register_class(&mut self, class: impl Into<String>, kind: ErrorKind) {
		self.known_classes.insert(class.into(), kind);
	}

	pub fn resolve_class(&self, class: &str) -> Option<ErrorKind> {
		self.known_classes.get(class).copied()
	}

	/// Returns the typed failure a response describes, or `Ok` on success.
	pub fn check_response(&self, response: &Response) -> Result<(), CommandError> {
		let Some(kind) = ErrorKind::from_status(response.status_code()) else {
			return Ok(());
		};
		debug!(target = "webrc.errors", status = response.status, %kind, "translating failed response");

		let error = match &response.value {
			Value::Null => CommandError::new(kind, kind.default_message()),
			Value::String(message) => CommandError::new(kind, message.clone()),
			Value::Object(_) => match codec::decode::<ErrorPayload>(&response.value) {
				Ok(payload) => self.from_payload(kind, payload),
				Err(err) => {
					debug!(target = "webrc.errors", error = %err, "failure value is not an error payload");
					CommandError::new(kind, response.value.to_string())
				}
			},
			other => CommandError::new(kind, other.to_string()),
		};
		Err(error)
	}

	fn from_payload(&self, kind: ErrorKind, payload: ErrorPayload) -> CommandError {
		let message = payload
			.message
			.clone()
			.unwrap_or_else(|| kind.default_message().to_string());
		let screen = payload.screen.clone();

		let mut cause = self.include_server_errors.then(|| self.rebuild_cause(payload));
		if let Some(screen) = screen {
			cause = Some(ErrorCause::Screenshot {
				screen,
				cause: cause.map(Box::new),
			});
		}

		CommandError {
			kind,
			message,
			cause: cause.map(Box::new),
		}
	}

	fn rebuild_cause(&self, payload: ErrorPayload) -> ErrorCause {
		let cause = payload.cause.map(|nested| Box::new(self.rebuild_cause(*nested)));
		match payload.class.as_deref().and_then(|class| self.resolve_class(class)) {
			Some(kind) => ErrorCause::Known {
				kind,
				class: payload.class.unwrap_or_default(),
				message: payload.message,
				stack_trace: payload.stack_trace,
				cause,
			},
			None => ErrorCause::UnknownRemote {
				class: payload.class,
				message: payload.message,
				stack_trace: payload.stack_trace,
				cause,
			},
		}
	}

	/// Turns a typed failure back into a response carrying its payload.
	pub fn to_response(&self, session_id: Option<SessionId>, error: &CommandError) -> Response {
		let mut payload = ErrorPayload::new(error.message.clone()).with_class(error.kind.class_name());
		if let Some(cause) = error.cause() {
			let rebuilt = cause.to_payload();
			payload.screen = rebuilt.screen.clone();
			let has_cause = rebuilt.class.is_some() || rebuilt.message.is_some() || !rebuilt.stack_trace.is_empty();
			if has_cause {
				payload.cause = Some(Box::new(ErrorPayload { screen: None, ..rebuilt }));
			}
		}

		let value = codec::encode(&Native::Error(payload), 1)
			.unwrap_or_else(|_| Value::String(error.message.clone()));
		Response::failure(session_id, error.kind.status(), value)
	}
}
