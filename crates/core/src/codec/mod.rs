//! Depth-bounded conversion between native values and portable trees.
//!
//! [`Native`] is the closed set of shapes a command argument or result can
//! take on the caller side. [`encode`] lowers it to a [`serde_json::Value`]
//! tree for the wire; [`Decode`] raises a tree back into a target type.
//!
//! Domain value objects opt in through [`Structured`], which exposes their
//! properties explicitly. They encode as an object with a reserved `class`
//! key and are cut off (encoded as null) once the depth budget runs out.

mod decode;

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Number, Value};
use webrc_protocol::{Capabilities, ElementRef, ErrorPayload, Platform, SessionId};

pub use self::decode::{Decode, decode, from_text};
use crate::error::CodecError;

/// Reserved key carrying a structured value's type name.
pub const CLASS_KEY: &str = "class";

/// A caller-side value before it is lowered to a tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Native {
	Null,
	Bool(bool),
	Number(Number),
	Text(String),
	/// Enumeration member; encodes as its name
	Enum { type_name: String, name: String },
	Sequence(Vec<Native>),
	Mapping(BTreeMap<String, Native>),
	/// Already a tree node; passed through untouched
	Tree(Value),
	SessionId(SessionId),
	Capabilities(Capabilities),
	Handle(ElementRef),
	Error(ErrorPayload),
	/// Domain value object: its properties plus its type name
	Structured {
		class: String,
		properties: BTreeMap<String, Native>,
	},
}

/// A domain value object that can be encoded property by property.
pub trait Structured {
	/// Fully-qualified type name written under [`CLASS_KEY`].
	fn class_name(&self) -> &str;

	/// Readable properties, by name.
	fn properties(&self) -> Vec<(String, Native)>;
}

impl Native {
	pub fn text(value: impl Into<String>) -> Self {
		Native::Text(value.into())
	}

	pub fn enumeration(type_name: impl Into<String>, name: impl Into<String>) -> Self {
		Native::Enum {
			type_name: type_name.into(),
			name: name.into(),
		}
	}

	pub fn mapping<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
	where
		K: Into<String>,
		V: Into<Native>,
	{
		Native::Mapping(entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
	}

	pub fn structured<K, V>(class: impl Into<String>, properties: impl IntoIterator<Item = (K, V)>) -> Self
	where
		K: Into<String>,
		V: Into<Native>,
	{
		Native::Structured {
			class: class.into(),
			properties: properties.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
		}
	}

	/// Captures a [`Structured`] value.
	pub fn of(value: &dyn Structured) -> Self {
		Native::structured(value.class_name(), value.properties())
	}

	pub fn is_null(&self) -> bool {
		matches!(self, Native::Null)
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Native::Text(s) => Some(s),
			Native::Enum { name, .. } => Some(name),
			_ => None,
		}
	}
}

/// Lowers `value` to a tree, recursing at most `max_depth` levels into
/// structured values.
///
/// Mappings and sequences always encode, passing `max_depth - 1` to their
/// entries; a [`Native::Structured`] reached with no depth left encodes as
/// null.
pub fn encode(value: &Native, max_depth: usize) -> Result<Value, CodecError> {
	let child_depth = max_depth.saturating_sub(1);
	let tree = match value {
		Native::Null => Value::Null,
		Native::Bool(b) => Value::Bool(*b),
		Native::Number(n) => Value::Number(n.clone()),
		Native::Text(s) => Value::String(s.clone()),
		Native::Enum { name, .. } => Value::String(name.clone()),
		Native::Mapping(entries) => Value::Object(encode_entries(entries, child_depth)?),
		Native::Tree(tree) => tree.clone(),
		Native::Sequence(items) => Value::Array(
			items
				.iter()
				.map(|item| encode(item, child_depth))
				.collect::<Result<_, _>>()?,
		),
		Native::SessionId(id) => {
			let mut shape = Map::new();
			shape.insert("value".to_string(), Value::String(id.as_str().to_string()));
			Value::Object(shape)
		}
		Native::Capabilities(capabilities) => to_tree("capabilities", capabilities)?,
		Native::Handle(element) => to_tree("element reference", element)?,
		Native::Error(payload) => to_tree("error payload", payload)?,
		Native::Structured { class, properties } => {
			if max_depth == 0 {
				return Ok(Value::Null);
			}
			let mut shape = encode_entries(properties, child_depth)?;
			shape.insert(CLASS_KEY.to_string(), Value::String(class.clone()));
			Value::Object(shape)
		}
	};
	Ok(tree)
}

fn encode_entries(entries: &BTreeMap<String, Native>, depth: usize) -> Result<Map<String, Value>, CodecError> {
	entries
		.iter()
		.map(|(key, value)| Ok((key.clone(), encode(value, depth)?)))
		.collect()
}

fn to_tree<T: Serialize>(type_name: &'static str, value: &T) -> Result<Value, CodecError> {
	serde_json::to_value(value).map_err(|e| CodecError::Encode {
		type_name,
		message: e.to_string(),
	})
}

impl From<bool> for Native {
	fn from(value: bool) -> Self {
		Native::Bool(value)
	}
}

impl From<i64> for Native {
	fn from(value: i64) -> Self {
		Native::Number(value.into())
	}
}

impl From<i32> for Native {
	fn from(value: i32) -> Self {
		Native::Number(value.into())
	}
}

impl From<u64> for Native {
	fn from(value: u64) -> Self {
		Native::Number(value.into())
	}
}

/// Non-finite floats have no tree form and become null.
impl From<f64> for Native {
	fn from(value: f64) -> Self {
		Number::from_f64(value).map_or(Native::Null, Native::Number)
	}
}

impl From<&str> for Native {
	fn from(value: &str) -> Self {
		Native::Text(value.to_string())
	}
}

impl From<String> for Native {
	fn from(value: String) -> Self {
		Native::Text(value)
	}
}

impl From<Platform> for Native {
	fn from(value: Platform) -> Self {
		Native::enumeration("Platform", value.as_str())
	}
}

impl From<SessionId> for Native {
	fn from(value: SessionId) -> Self {
		Native::SessionId(value)
	}
}

impl From<Capabilities> for Native {
	fn from(value: Capabilities) -> Self {
		Native::Capabilities(value)
	}
}

impl From<ElementRef> for Native {
	fn from(value: ElementRef) -> Self {
		Native::Handle(value)
	}
}

impl From<ErrorPayload> for Native {
	fn from(value: ErrorPayload) -> Self {
		Native::Error(value)
	}
}

impl From<Value> for Native {
	fn from(value: Value) -> Self {
		Native::Tree(value)
	}
}

impl<T: Into<Native>> From<Vec<T>> for Native {
	fn from(value: Vec<T>) -> Self {
		Native::Sequence(value.into_iter().map(Into::into).collect())
	}
}

impl<T: Into<Native>> From<Option<T>> for Native {
	fn from(value: Option<T>) -> Self {
		value.map_or(Native::Null, Into::into)
	}
}
