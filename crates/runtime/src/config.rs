//! Server and per-queue configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_PORT: u16 = 4444;
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 30 * 60 * 1000;
pub const DEFAULT_RETRY_TIMEOUT_MS: u64 = 10 * 1000;
pub const DEFAULT_MAX_ENCODE_DEPTH: usize = 5;

/// Remote-control server configuration.
///
/// Every field has a default, so a partial JSON file is valid. Unknown keys
/// are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteControlConfig {
	pub port: u16,
	/// How long a caller waits for a result before the timed-out sentinel
	pub command_timeout_ms: u64,
	/// How long an agent poll waits before receiving the retry no-op
	pub retry_timeout_ms: u64,
	/// Initial default inter-command delay for new queues
	pub speed_ms: u64,
	pub proxy_injection_mode: bool,
	/// When set, sessions idle longer than this are closed
	#[serde(skip_serializing_if = "Option::is_none")]
	pub idle_session_timeout_ms: Option<u64>,
	pub max_encode_depth: usize,
	pub include_server_errors: bool,
}

impl Default for RemoteControlConfig {
	fn default() -> Self {
		Self {
			port: DEFAULT_PORT,
			command_timeout_ms: DEFAULT_COMMAND_TIMEOUT_MS,
			retry_timeout_ms: DEFAULT_RETRY_TIMEOUT_MS,
			speed_ms: 0,
			proxy_injection_mode: false,
			idle_session_timeout_ms: None,
			max_encode_depth: DEFAULT_MAX_ENCODE_DEPTH,
			include_server_errors: true,
		}
	}
}

impl RemoteControlConfig {
	/// Loads configuration from a JSON file.
	pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let config_error = |message: String| Error::Config {
			path: path.display().to_string(),
			message,
		};
		let raw = std::fs::read_to_string(path).map_err(|e| config_error(e.to_string()))?;
		serde_json::from_str(&raw).map_err(|e| config_error(e.to_string()))
	}

	pub fn idle_session_timeout(&self) -> Option<Duration> {
		self.idle_session_timeout_ms.map(Duration::from_millis)
	}

	/// Queue settings for a new session, using `speed` as its delay.
	pub fn queue_config(&self, speed: Duration) -> QueueConfig {
		QueueConfig {
			command_timeout: Duration::from_millis(self.command_timeout_ms),
			retry_timeout: Duration::from_millis(self.retry_timeout_ms),
			proxy_injection_mode: self.proxy_injection_mode,
			speed,
		}
	}
}

/// Settings captured by one [`CommandQueue`](crate::CommandQueue) at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
	pub command_timeout: Duration,
	pub retry_timeout: Duration,
	pub proxy_injection_mode: bool,
	/// Delay applied before each submitted command
	pub speed: Duration,
}

impl Default for QueueConfig {
	fn default() -> Self {
		RemoteControlConfig::default().queue_config(Duration::ZERO)
	}
}

#[cfg(test)]
mod tests {
	use std::io::Write;

	use super::*;

	#[test]
	fn test_defaults() {
		let config = RemoteControlConfig::default();
		assert_eq!(config.port, 4444);
		assert!(!config.proxy_injection_mode);
		assert_eq!(config.max_encode_depth, 5);
		assert!(config.include_server_errors);
		assert_eq!(config.idle_session_timeout(), None);
	}

	#[test]
	fn test_partial_file_keeps_defaults() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(file, r#"{{"retryTimeoutMs": 5000, "proxyInjectionMode": true, "futureKey": 1}}"#).unwrap();

		let config = RemoteControlConfig::from_file(file.path()).unwrap();
		assert_eq!(config.retry_timeout_ms, 5000);
		assert!(config.proxy_injection_mode);
		assert_eq!(config.command_timeout_ms, DEFAULT_COMMAND_TIMEOUT_MS);

		let queue = config.queue_config(Duration::from_millis(42));
		assert_eq!(queue.retry_timeout, Duration::from_secs(5));
		assert_eq!(queue.speed, Duration::from_millis(42));
		assert!(queue.proxy_injection_mode);
	}

	#[test]
	fn test_invalid_file_reports_path() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(file, "not json").unwrap();

		let err = RemoteControlConfig::from_file(file.path()).unwrap_err();
		assert!(matches!(err, Error::Config { .. }));
		assert!(err.to_string().contains(&file.path().display().to_string()));
	}
}
