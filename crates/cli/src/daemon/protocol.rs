use serde::{Deserialize, Serialize};
use serde_json::Value;
use webrc::protocol::{Capabilities, RemoteCommand, Response, SessionId};

/// One request line sent to the server.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DaemonRequest {
	Ping,
	NewSession {
		#[serde(default)]
		capabilities: Capabilities,
	},
	/// Caller side: run a command and block for its response.
	Command {
		session_id: SessionId,
		verb: String,
		#[serde(default)]
		args: Vec<Value>,
	},
	/// Agent side: post the previous result (if any) and fetch the next command.
	///
	/// `status` defaults to success; a failure code carries an error payload
	/// or message in `result`.
	Poll {
		session_id: SessionId,
		#[serde(default)]
		result: Option<Value>,
		#[serde(default)]
		status: Option<i32>,
	},
	/// Agent side: post a result without fetching another command.
	Post {
		session_id: SessionId,
		result: Value,
		#[serde(default)]
		status: Option<i32>,
	},
	EndSession { session_id: SessionId },
	ListSessions,
	/// Without a session, changes the default for sessions created later.
	SetSpeed {
		#[serde(default)]
		session_id: Option<SessionId>,
		speed_ms: u64,
	},
	Shutdown,
}

/// One response line sent back by the server.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DaemonResponse {
	Pong,
	Session { session_id: SessionId },
	Response { response: Response },
	Command { command: RemoteCommand },
	Sessions { list: Vec<SessionInfo> },
	Ok,
	Error { code: String, message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
	pub session_id: SessionId,
	pub capabilities: Capabilities,
	/// Queue state: idle, command_pending, result_pending, or closed.
	pub state: String,
	/// Milliseconds since the session was last used.
	#[serde(default)]
	pub idle_ms: u64,
}
