//! Responses and the status-code table.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::session::SessionId;

/// Message carried by the timed-out sentinel response.
pub const TIMED_OUT_MESSAGE: &str = "Timed out waiting for a command result";

/// Protocol status codes.
///
/// Any code not listed here is treated as [`StatusCode::UnhandledError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
	Success,
	NoSuchElement,
	NoSuchFrame,
	UnknownCommand,
	StaleElementReference,
	ElementNotVisible,
	InvalidElementState,
	UnhandledError,
	XPathLookupError,
	Timeout,
	NoSuchWindow,
	MethodNotAllowed,
}

impl StatusCode {
	pub const ALL: [StatusCode; 12] = [
		StatusCode::Success,
		StatusCode::NoSuchElement,
		StatusCode::NoSuchFrame,
		StatusCode::UnknownCommand,
		StatusCode::StaleElementReference,
		StatusCode::ElementNotVisible,
		StatusCode::InvalidElementState,
		StatusCode::UnhandledError,
		StatusCode::XPathLookupError,
		StatusCode::Timeout,
		StatusCode::NoSuchWindow,
		StatusCode::MethodNotAllowed,
	];

	pub fn code(self) -> i32 {
		match self {
			StatusCode::Success => 0,
			StatusCode::NoSuchElement => 7,
			StatusCode::NoSuchFrame => 8,
			StatusCode::UnknownCommand => 9,
			StatusCode::StaleElementReference => 10,
			StatusCode::ElementNotVisible => 11,
			StatusCode::InvalidElementState => 12,
			StatusCode::UnhandledError => 13,
			StatusCode::XPathLookupError => 19,
			StatusCode::Timeout => 21,
			StatusCode::NoSuchWindow => 23,
			StatusCode::MethodNotAllowed => 405,
		}
	}

	pub fn from_code(code: i32) -> StatusCode {
		StatusCode::ALL
			.into_iter()
			.find(|status| status.code() == code)
			.unwrap_or(StatusCode::UnhandledError)
	}

	pub fn is_success(self) -> bool {
		self == StatusCode::Success
	}
}

/// Result of one command: `{sessionId, status, value}`.
///
/// `value` is an arbitrary encoded tree: a scalar, sequence, mapping,
/// element reference, or error payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_id: Option<SessionId>,
	#[serde(default)]
	pub status: i32,
	#[serde(default)]
	pub value: Value,
}

impl Response {
	pub fn success(session_id: SessionId, value: Value) -> Self {
		Self {
			session_id: Some(session_id),
			status: StatusCode::Success.code(),
			value,
		}
	}

	pub fn failure(session_id: Option<SessionId>, status: StatusCode, value: Value) -> Self {
		Self {
			session_id,
			status: status.code(),
			value,
		}
	}

	/// Sentinel returned when no result arrived within the session timeout.
	pub fn timed_out(session_id: SessionId) -> Self {
		Self::failure(
			Some(session_id),
			StatusCode::Timeout,
			Value::String(TIMED_OUT_MESSAGE.to_string()),
		)
	}

	pub fn status_code(&self) -> StatusCode {
		StatusCode::from_code(self.status)
	}

	pub fn is_success(&self) -> bool {
		self.status == StatusCode::Success.code()
	}

	pub fn is_timed_out(&self) -> bool {
		self.status == StatusCode::Timeout.code() && self.value.as_str() == Some(TIMED_OUT_MESSAGE)
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn test_status_code_table() {
		for status in StatusCode::ALL {
			assert_eq!(StatusCode::from_code(status.code()), status);
		}
		assert_eq!(StatusCode::from_code(7), StatusCode::NoSuchElement);
		assert_eq!(StatusCode::from_code(10), StatusCode::StaleElementReference);
		assert_eq!(StatusCode::from_code(1512), StatusCode::UnhandledError);
	}

	#[test]
	fn test_response_with_element_value_and_extra_fields() {
		let json = r#"{"value":{"value":"","text":"","selected":false,"enabled":true,"id":"three"},"context":"con","sessionId":"sess","error":false}"#;
		let response: Response = serde_json::from_str(json).unwrap();
		assert_eq!(response.session_id, Some(SessionId::new("sess")));
		assert_eq!(response.value["id"], "three");
		assert!(response.is_success());
	}

	#[test]
	fn test_response_keeps_boolean_looking_strings() {
		let json = r#"{"value":"false","context":"foo","sessionId":"1210083863107","error":false}"#;
		let response: Response = serde_json::from_str(json).unwrap();
		assert_eq!(response.value, json!("false"));

		let json = r#"{"value":true,"context":"foo","sessionId":"1210084658750","error":false}"#;
		let response: Response = serde_json::from_str(json).unwrap();
		assert_eq!(response.value, json!(true));
	}

	#[test]
	fn test_timed_out_sentinel() {
		let response = Response::timed_out(SessionId::new("1"));
		assert!(response.is_timed_out());
		assert!(!response.is_success());

		let lookalike = Response::failure(None, StatusCode::Timeout, json!("page load"));
		assert!(!lookalike.is_timed_out());
	}
}
