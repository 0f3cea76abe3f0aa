//! Structured failure payloads carried in a failed response's `value`.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

/// One frame of a remote call stack.
///
/// Frames are free-form: they may come from any language or runtime, so
/// nothing beyond the four fields is assumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackFrame {
	/// Declaring type or module name
	#[serde(default)]
	pub class_name: String,
	/// Call-site (method or function) name
	#[serde(default)]
	pub method_name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub file_name: Option<String>,
	/// Line number; negative when unknown
	#[serde(default = "unknown_line")]
	pub line_number: i64,
}

fn unknown_line() -> i64 {
	-1
}

impl StackFrame {
	pub fn new(
		class_name: impl Into<String>,
		method_name: impl Into<String>,
		file_name: Option<String>,
		line_number: i64,
	) -> Self {
		Self {
			class_name: class_name.into(),
			method_name: method_name.into(),
			file_name,
			line_number,
		}
	}
}

/// Failure description: `(message, class, cause chain, stack, screenshot)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
	/// Fully-qualified name of the remote error type
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub class: Option<String>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub stack_trace: Vec<StackFrame>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub cause: Option<Box<ErrorPayload>>,
	/// Base64-encoded screenshot taken when the failure happened
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub screen: Option<String>,
}

impl ErrorPayload {
	pub fn new(message: impl Into<String>) -> Self {
		Self {
			message: Some(message.into()),
			..Default::default()
		}
	}

	pub fn with_class(mut self, class: impl Into<String>) -> Self {
		self.class = Some(class.into());
		self
	}

	pub fn with_frame(mut self, frame: StackFrame) -> Self {
		self.stack_trace.push(frame);
		self
	}

	pub fn with_cause(mut self, cause: ErrorPayload) -> Self {
		self.cause = Some(Box::new(cause));
		self
	}

	pub fn with_screen(mut self, screen: impl Into<String>) -> Self {
		self.screen = Some(screen.into());
		self
	}

	/// Decodes the attached screenshot, if any.
	pub fn decode_screenshot(&self) -> Option<Result<Vec<u8>, base64::DecodeError>> {
		self.screen.as_deref().map(decode_screenshot)
	}
}

/// Decodes base64 screenshot text into raw image bytes.
pub fn decode_screenshot(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
	STANDARD.decode(encoded.trim())
}

/// Encodes raw image bytes as screenshot text.
pub fn encode_screenshot(bytes: &[u8]) -> String {
	STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn test_payload_wire_shape() {
		let payload = ErrorPayload::new("boom")
			.with_class("java.lang.NullPointerException")
			.with_frame(StackFrame::new("MyClass", "someMethod", Some("Resource.m".into()), 1224));

		let wire = serde_json::to_value(&payload).unwrap();
		assert_eq!(
			wire,
			json!({
				"message": "boom",
				"class": "java.lang.NullPointerException",
				"stackTrace": [{
					"className": "MyClass",
					"methodName": "someMethod",
					"fileName": "Resource.m",
					"lineNumber": 1224
				}]
			})
		);
	}

	#[test]
	fn test_frame_without_line_defaults_unknown() {
		let frame: StackFrame = serde_json::from_str(r#"{"className":"a","methodName":"b"}"#).unwrap();
		assert_eq!(frame.line_number, -1);
		assert_eq!(frame.file_name, None);
	}

	#[test]
	fn test_screenshot_round_trip() {
		let payload = ErrorPayload::new("x").with_screen(encode_screenshot(b"\x89PNG"));
		let bytes = payload.decode_screenshot().unwrap().unwrap();
		assert_eq!(bytes, b"\x89PNG");
	}
}
