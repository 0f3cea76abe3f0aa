//! Error types for the webrc caller API.

use thiserror::Error;

use crate::error_handler::CommandError;

/// Result type alias for caller-side operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to callers of [`RemoteSession`](crate::RemoteSession).
#[derive(Debug, Error)]
pub enum Error {
	/// Queue, registry, or handle failure.
	#[error(transparent)]
	Runtime(#[from] webrc_runtime::Error),

	#[error(transparent)]
	Codec(#[from] CodecError),

	/// The agent reported a failure, translated from its status code.
	#[error(transparent)]
	Command(#[from] CommandError),
}

impl Error {
	/// Returns true if the session was closed underneath the call.
	pub fn is_closed(&self) -> bool {
		matches!(self, Error::Runtime(err) if err.is_closed())
	}

	/// The translated remote failure, if this is one.
	pub fn as_command_error(&self) -> Option<&CommandError> {
		match self {
			Error::Command(err) => Some(err),
			_ => None,
		}
	}
}

/// Structural codec failures.
#[derive(Debug, Error)]
pub enum CodecError {
	/// The tree did not have the shape the target type needs.
	#[error("Cannot decode {expected} from {fragment}")]
	Decode {
		expected: &'static str,
		/// Offending part of the input, truncated
		fragment: String,
	},

	#[error("Cannot encode {type_name}: {message}")]
	Encode { type_name: &'static str, message: String },
}

const FRAGMENT_LIMIT: usize = 200;

impl CodecError {
	pub(crate) fn decode(expected: &'static str, tree: &serde_json::Value) -> Self {
		let mut fragment = tree.to_string();
		if fragment.len() > FRAGMENT_LIMIT {
			let mut cut = FRAGMENT_LIMIT;
			while !fragment.is_char_boundary(cut) {
				cut -= 1;
			}
			fragment.truncate(cut);
			fragment.push_str("...");
		}
		CodecError::Decode { expected, fragment }
	}
}
