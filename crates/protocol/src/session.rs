//! Session identity and capability types.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Capability key for the browser name.
pub const BROWSER_NAME: &str = "browserName";
/// Capability key for the browser version.
pub const VERSION: &str = "version";
/// Capability key for the platform.
pub const PLATFORM: &str = "platform";
/// Capability key for javascript support.
pub const SUPPORTS_JAVASCRIPT: &str = "javascriptEnabled";

/// Opaque identifier of a browser session.
///
/// Appears as a plain string inside commands and responses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Arc<str>);

impl SessionId {
	pub fn new(id: impl AsRef<str>) -> Self {
		Self(Arc::from(id.as_ref()))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for SessionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for SessionId {
	fn from(value: &str) -> Self {
		Self::new(value)
	}
}

impl From<String> for SessionId {
	fn from(value: String) -> Self {
		Self(Arc::from(value))
	}
}

/// Operating system family a session runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Platform {
	Windows,
	Xp,
	Vista,
	Mac,
	Unix,
	Linux,
	/// Matches every platform
	Any,
}

impl Platform {
	pub const ALL: [Platform; 7] = [
		Platform::Windows,
		Platform::Xp,
		Platform::Vista,
		Platform::Mac,
		Platform::Unix,
		Platform::Linux,
		Platform::Any,
	];

	/// Wire name of this platform.
	pub fn as_str(self) -> &'static str {
		match self {
			Platform::Windows => "WINDOWS",
			Platform::Xp => "XP",
			Platform::Vista => "VISTA",
			Platform::Mac => "MAC",
			Platform::Unix => "UNIX",
			Platform::Linux => "LINUX",
			Platform::Any => "ANY",
		}
	}

	/// Returns true if `self` satisfies a request for `other`.
	///
	/// `Any` on either side always matches; XP and Vista are Windows and
	/// Linux is Unix.
	pub fn is(self, other: Platform) -> bool {
		if self == other || self == Platform::Any || other == Platform::Any {
			return true;
		}
		matches!(
			(self, other),
			(Platform::Xp | Platform::Vista, Platform::Windows) | (Platform::Linux, Platform::Unix)
		)
	}

	/// Platform of the running process.
	pub fn current() -> Platform {
		if cfg!(target_os = "windows") {
			Platform::Windows
		} else if cfg!(target_os = "macos") {
			Platform::Mac
		} else if cfg!(target_os = "linux") {
			Platform::Linux
		} else if cfg!(unix) {
			Platform::Unix
		} else {
			Platform::Any
		}
	}
}

impl fmt::Display for Platform {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Platform {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Platform::ALL
			.into_iter()
			.find(|p| p.as_str().eq_ignore_ascii_case(s))
			.ok_or_else(|| format!("unknown platform: {s}"))
	}
}

/// Named option bag describing the browser a session wants.
///
/// Serializes as a flat object of string keys to scalar values. Typed
/// accessors are weakly typed: a `javascriptEnabled` of `"false"` reads as
/// `false`, a `platform` of `"linux"` reads as [`Platform::Linux`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capabilities {
	entries: BTreeMap<String, Value>,
}

impl Capabilities {
	pub fn new(browser: impl Into<String>, version: impl Into<String>, platform: Platform) -> Self {
		let mut caps = Self::default();
		caps.set_browser_name(browser);
		caps.set_version(version);
		caps.set_platform(platform);
		caps
	}

	pub fn firefox() -> Self {
		Self::new("firefox", "", Platform::Any)
	}

	pub fn chrome() -> Self {
		Self::new("chrome", "", Platform::Any)
	}

	pub fn internet_explorer() -> Self {
		Self::new("internet explorer", "", Platform::Windows)
	}

	pub fn html_unit() -> Self {
		Self::new("htmlunit", "", Platform::Any)
	}

	pub fn iphone() -> Self {
		Self::new("iphone", "", Platform::Mac)
	}

	pub fn browser_name(&self) -> Option<&str> {
		self.entries.get(BROWSER_NAME).and_then(Value::as_str)
	}

	pub fn set_browser_name(&mut self, name: impl Into<String>) {
		self.set(BROWSER_NAME, Value::String(name.into()));
	}

	pub fn version(&self) -> Option<&str> {
		self.entries.get(VERSION).and_then(Value::as_str)
	}

	pub fn set_version(&mut self, version: impl Into<String>) {
		self.set(VERSION, Value::String(version.into()));
	}

	pub fn platform(&self) -> Option<Platform> {
		self.entries
			.get(PLATFORM)
			.and_then(Value::as_str)
			.and_then(|raw| raw.parse().ok())
	}

	pub fn set_platform(&mut self, platform: Platform) {
		self.set(PLATFORM, Value::String(platform.as_str().to_string()));
	}

	/// Javascript support; absent means enabled.
	pub fn is_javascript_enabled(&self) -> bool {
		match self.entries.get(SUPPORTS_JAVASCRIPT) {
			Some(Value::Bool(enabled)) => *enabled,
			Some(Value::String(raw)) => raw.eq_ignore_ascii_case("true"),
			_ => true,
		}
	}

	pub fn set_javascript_enabled(&mut self, enabled: bool) {
		self.set(SUPPORTS_JAVASCRIPT, Value::Bool(enabled));
	}

	pub fn get(&self, key: &str) -> Option<&Value> {
		self.entries.get(key)
	}

	pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
		self.entries.insert(key.into(), value.into());
	}

	pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
		self.entries.iter()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

impl From<BTreeMap<String, Value>> for Capabilities {
	fn from(entries: BTreeMap<String, Value>) -> Self {
		Self { entries }
	}
}

impl fmt::Display for Capabilities {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Capabilities [")?;
		for (i, (key, value)) in self.entries.iter().enumerate() {
			if i > 0 {
				write!(f, ", ")?;
			}
			write!(f, "{key}={value}")?;
		}
		write!(f, "]")
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_capabilities_serialize_flat() {
		let mut caps = Capabilities::firefox();
		caps.set_javascript_enabled(false);
		caps.set("furrfu", "fishy");

		let json = serde_json::to_value(&caps).unwrap();
		assert_eq!(json["browserName"], "firefox");
		assert_eq!(json["platform"], "ANY");
		assert_eq!(json["javascriptEnabled"], false);
		assert_eq!(json["furrfu"], "fishy");
	}

	#[test]
	fn test_javascript_enabled_is_weakly_typed() {
		let caps: Capabilities = serde_json::from_str(r#"{"javascriptEnabled":"false"}"#).unwrap();
		assert!(!caps.is_javascript_enabled());

		let caps: Capabilities = serde_json::from_str(r#"{"javascriptEnabled":"TRUE"}"#).unwrap();
		assert!(caps.is_javascript_enabled());

		assert!(Capabilities::default().is_javascript_enabled());
	}

	#[test]
	fn test_platform_from_text() {
		let caps: Capabilities = serde_json::from_str(r#"{"platform":"linux"}"#).unwrap();
		assert_eq!(caps.platform(), Some(Platform::Linux));
		assert_eq!("xp".parse::<Platform>().unwrap(), Platform::Xp);
		assert!("amiga".parse::<Platform>().is_err());
	}

	#[test]
	fn test_platform_family_matching() {
		assert!(Platform::Xp.is(Platform::Windows));
		assert!(Platform::Linux.is(Platform::Unix));
		assert!(Platform::Mac.is(Platform::Any));
		assert!(!Platform::Windows.is(Platform::Xp));
		assert!(!Platform::Mac.is(Platform::Linux));
	}

	#[test]
	fn test_session_id_is_plain_string_on_the_wire() {
		let id = SessionId::new("1210083863107");
		assert_eq!(serde_json::to_string(&id).unwrap(), r#""1210083863107""#);
	}
}
