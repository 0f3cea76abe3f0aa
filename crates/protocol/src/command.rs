//! Commands flowing from callers to the polling agent.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::form_urlencoded;

use crate::session::SessionId;

/// Verb of the no-op returned to an agent when nothing is pending.
pub const RETRY_VERB: &str = "retryLast";

/// Verb delivered to an agent once its session has been closed.
pub const CLOSE_VERB: &str = "testComplete";

/// A command addressed to one session's agent.
///
/// Immutable once constructed; consumed at most once by the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCommand {
	pub session_id: SessionId,
	pub verb: String,
	#[serde(default)]
	pub args: Vec<Value>,
}

impl RemoteCommand {
	pub fn new(session_id: SessionId, verb: impl Into<String>, args: Vec<Value>) -> Self {
		Self {
			session_id,
			verb: verb.into(),
			args,
		}
	}

	/// The "poll again" no-op.
	pub fn retry(session_id: SessionId) -> Self {
		Self::new(session_id, RETRY_VERB, Vec::new())
	}

	/// The terminal command an agent receives after its session closed.
	pub fn close(session_id: SessionId) -> Self {
		Self::new(session_id, CLOSE_VERB, Vec::new())
	}

	pub fn is_retry(&self) -> bool {
		self.verb == RETRY_VERB
	}

	pub fn is_close(&self) -> bool {
		self.verb == CLOSE_VERB
	}

	/// Renders the agent-facing query form `cmd=<verb>&1=<arg>&2=<arg>`.
	///
	/// Text arguments are used verbatim, everything else as JSON text.
	pub fn to_query_string(&self) -> String {
		let mut out = String::from("cmd=");
		out.extend(form_urlencoded::byte_serialize(self.verb.as_bytes()));
		for (i, arg) in self.args.iter().enumerate() {
			let text = match arg {
				Value::String(s) => s.clone(),
				other => other.to_string(),
			};
			out.push('&');
			out.push_str(&(i + 1).to_string());
			out.push('=');
			out.extend(form_urlencoded::byte_serialize(text.as_bytes()));
		}
		out
	}

	/// Parses a table row of the form `|verb|target|value|`.
	pub fn parse_wiki_line(session_id: SessionId, line: &str) -> Result<Self, String> {
		let trimmed = line.trim();
		let inner = trimmed
			.strip_prefix('|')
			.and_then(|rest| rest.strip_suffix('|'))
			.ok_or_else(|| format!("Cannot parse invalid line: {line}"))?;

		let cells: Vec<&str> = inner.split('|').collect();
		if cells.len() != 3 {
			return Err(format!("Cannot parse invalid line: {line} ({} cells)", cells.len()));
		}

		Ok(Self::new(
			session_id,
			cells[0],
			vec![Value::String(cells[1].to_string()), Value::String(cells[2].to_string())],
		))
	}
}

impl fmt::Display for RemoteCommand {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "[{}]: {}", self.session_id, self.to_query_string())
	}
}

/// Agent request for the next command of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPoll {
	pub session_id: SessionId,
}

/// Agent post carrying the result of the command it last received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPost {
	pub session_id: SessionId,
	#[serde(default)]
	pub result: Value,
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn test_command_wire_shape() {
		let cmd = RemoteCommand::new(SessionId::new("S1"), "click", vec![json!("id=42")]);
		let wire = serde_json::to_value(&cmd).unwrap();
		assert_eq!(wire, json!({"sessionId": "S1", "verb": "click", "args": ["id=42"]}));
	}

	#[test]
	fn test_command_ignores_unknown_fields() {
		let cmd: RemoteCommand =
			serde_json::from_str(r#"{"sessionId":"S1","verb":"open","context":"foo"}"#).unwrap();
		assert_eq!(cmd.verb, "open");
		assert!(cmd.args.is_empty());
	}

	#[test]
	fn test_query_string_encodes_args() {
		let cmd = RemoteCommand::new(
			SessionId::new("1"),
			"type",
			vec![json!("name=q"), json!("hello world&more"), json!(3)],
		);
		assert_eq!(cmd.to_query_string(), "cmd=type&1=name%3Dq&2=hello+world%26more&3=3");
	}

	#[test]
	fn test_parse_wiki_line() {
		let cmd = RemoteCommand::parse_wiki_line(SessionId::new("1"), "|open|blah.html||").unwrap();
		assert_eq!(cmd.verb, "open");
		assert_eq!(cmd.args, vec![json!("blah.html"), json!("")]);

		assert!(RemoteCommand::parse_wiki_line(SessionId::new("1"), "|open|a|").is_err());
		assert!(RemoteCommand::parse_wiki_line(SessionId::new("1"), "open|a|b").is_err());
	}

	#[test]
	fn test_sentinels_are_distinguishable() {
		let id = SessionId::new("1");
		assert!(RemoteCommand::retry(id.clone()).is_retry());
		assert!(RemoteCommand::close(id.clone()).is_close());
		assert!(!RemoteCommand::new(id, "click", vec![]).is_retry());
	}
}
