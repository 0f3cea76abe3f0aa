//! Element references as they appear on the wire.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Reference to a live, browser-resident element.
///
/// Serializes as `{"value": "<id>"}` wherever it is nested in command
/// arguments or results. Ids are only unique within one session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementRef {
	#[serde(rename = "value")]
	pub id: String,
}

impl ElementRef {
	pub fn new(id: impl Into<String>) -> Self {
		Self { id: id.into() }
	}
}

impl fmt::Display for ElementRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.id)
	}
}
