use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;

use serde::de::DeserializeOwned;
use serde_json::Value;
use webrc_protocol::{
	AgentPost, Capabilities, ElementRef, ErrorPayload, Platform, RemoteCommand, Response, SessionId, StackFrame,
};

use super::Native;
use crate::error::CodecError;

/// A type that can be raised from a tree.
///
/// Decoding is weakly typed in the ways the wire protocol relies on:
/// unknown object fields are ignored and `"true"`/`"false"` text reads as
/// a boolean. Anything the target cannot hold is a [`CodecError::Decode`],
/// never a silent default.
pub trait Decode: Sized {
	fn decode(tree: &Value) -> Result<Self, CodecError>;
}

pub fn decode<T: Decode>(tree: &Value) -> Result<T, CodecError> {
	T::decode(tree)
}

/// Decodes JSON text. Blank text, or text that is not JSON, is treated as
/// a bare text value.
///
/// Only targets that can hold text get that text back: [`Native`] yields
/// [`Native::Text`], [`Value`] a string, and [`String`] the text itself.
/// Any other target reports [`CodecError::Decode`] for it. Decode into
/// [`Native`] when the reply may be blank.
pub fn from_text<T: Decode>(text: &str) -> Result<T, CodecError> {
	if text.trim().is_empty() {
		return T::decode(&Value::String(text.to_string()));
	}
	match serde_json::from_str::<Value>(text) {
		Ok(tree) => T::decode(&tree),
		Err(_) => T::decode(&Value::String(text.to_string())),
	}
}

impl Decode for Value {
	fn decode(tree: &Value) -> Result<Self, CodecError> {
		Ok(tree.clone())
	}
}

/// The generic-object target: objects become mappings and arrays become
/// sequences, with no further type knowledge.
impl Decode for Native {
	fn decode(tree: &Value) -> Result<Self, CodecError> {
		let native = match tree {
			Value::Null => Native::Null,
			Value::Bool(b) => Native::Bool(*b),
			Value::Number(n) => Native::Number(n.clone()),
			Value::String(s) => Native::Text(s.clone()),
			Value::Array(items) => Native::Sequence(items.iter().map(Native::decode).collect::<Result<_, _>>()?),
			Value::Object(entries) => Native::Mapping(
				entries
					.iter()
					.map(|(key, value)| Ok((key.clone(), Native::decode(value)?)))
					.collect::<Result<_, CodecError>>()?,
			),
		};
		Ok(native)
	}
}

impl Decode for bool {
	fn decode(tree: &Value) -> Result<Self, CodecError> {
		match tree {
			Value::Bool(b) => Ok(*b),
			Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(true),
			Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(false),
			_ => Err(CodecError::decode("boolean", tree)),
		}
	}
}

impl Decode for String {
	fn decode(tree: &Value) -> Result<Self, CodecError> {
		match tree {
			Value::String(s) => Ok(s.clone()),
			Value::Bool(b) => Ok(b.to_string()),
			Value::Number(n) => Ok(n.to_string()),
			_ => Err(CodecError::decode("text", tree)),
		}
	}
}

impl Decode for i64 {
	fn decode(tree: &Value) -> Result<Self, CodecError> {
		tree.as_i64().ok_or_else(|| CodecError::decode("integer", tree))
	}
}

impl Decode for i32 {
	fn decode(tree: &Value) -> Result<Self, CodecError> {
		tree.as_i64()
			.and_then(|n| i32::try_from(n).ok())
			.ok_or_else(|| CodecError::decode("32-bit integer", tree))
	}
}

impl Decode for u64 {
	fn decode(tree: &Value) -> Result<Self, CodecError> {
		tree.as_u64().ok_or_else(|| CodecError::decode("unsigned integer", tree))
	}
}

impl Decode for f64 {
	fn decode(tree: &Value) -> Result<Self, CodecError> {
		tree.as_f64().ok_or_else(|| CodecError::decode("number", tree))
	}
}

impl<T: Decode> Decode for Option<T> {
	fn decode(tree: &Value) -> Result<Self, CodecError> {
		match tree {
			Value::Null => Ok(None),
			other => T::decode(other).map(Some),
		}
	}
}

impl<T: Decode> Decode for Vec<T> {
	fn decode(tree: &Value) -> Result<Self, CodecError> {
		tree.as_array()
			.ok_or_else(|| CodecError::decode("sequence", tree))?
			.iter()
			.map(T::decode)
			.collect()
	}
}

impl<T: Decode> Decode for BTreeMap<String, T> {
	fn decode(tree: &Value) -> Result<Self, CodecError> {
		tree.as_object()
			.ok_or_else(|| CodecError::decode("mapping", tree))?
			.iter()
			.map(|(key, value)| Ok((key.clone(), T::decode(value)?)))
			.collect()
	}
}

impl<T: Decode, S: BuildHasher + Default> Decode for HashMap<String, T, S> {
	fn decode(tree: &Value) -> Result<Self, CodecError> {
		tree.as_object()
			.ok_or_else(|| CodecError::decode("mapping", tree))?
			.iter()
			.map(|(key, value)| Ok((key.clone(), T::decode(value)?)))
			.collect()
	}
}

/// Accepts the `{"value": id}` shape or a bare id.
impl Decode for SessionId {
	fn decode(tree: &Value) -> Result<Self, CodecError> {
		let id = match tree {
			Value::String(id) => Some(id.as_str()),
			Value::Object(shape) => shape.get("value").and_then(Value::as_str),
			_ => None,
		};
		id.map(SessionId::new)
			.ok_or_else(|| CodecError::decode("session id", tree))
	}
}

impl Decode for Platform {
	fn decode(tree: &Value) -> Result<Self, CodecError> {
		tree.as_str()
			.and_then(|name| name.parse().ok())
			.ok_or_else(|| CodecError::decode("platform", tree))
	}
}

macro_rules! decode_object_via_serde {
	($($ty:ty => $expected:literal),* $(,)?) => {
		$(
			impl Decode for $ty {
				fn decode(tree: &Value) -> Result<Self, CodecError> {
					from_object($expected, tree)
				}
			}
		)*
	};
}

decode_object_via_serde! {
	Capabilities => "capabilities",
	ElementRef => "element reference",
	ErrorPayload => "error payload",
	StackFrame => "stack frame",
	Response => "response",
	RemoteCommand => "command",
	AgentPost => "agent post",
}

fn from_object<T: DeserializeOwned>(expected: &'static str, tree: &Value) -> Result<T, CodecError> {
	if !tree.is_object() {
		return Err(CodecError::decode(expected, tree));
	}
	T::deserialize(tree).map_err(|_| CodecError::decode(expected, tree))
}
