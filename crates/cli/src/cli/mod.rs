#[cfg(test)]
mod tests;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use webrc::runtime::RemoteControlConfig;
use webrc::runtime::config::DEFAULT_PORT;

/// Root CLI for webrc.
#[derive(Parser, Debug)]
#[command(name = "webrc")]
#[command(about = "Remote-control command server for browser test automation")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Run the command server in the foreground.
	Serve(ServeArgs),
	/// Check that a server is answering.
	Ping(ClientArgs),
	/// List live sessions.
	Sessions(ClientArgs),
	/// End one session, releasing its caller and agent.
	End(EndArgs),
	/// Change the default inter-command delay for new sessions.
	Speed(SpeedArgs),
	/// Stop a running server.
	Stop(ClientArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
	/// JSON configuration file.
	#[arg(long, value_name = "FILE")]
	pub config: Option<PathBuf>,

	/// Port to listen on (overrides the config file).
	#[arg(long)]
	pub port: Option<u16>,

	/// How long a caller waits for a result, in milliseconds.
	#[arg(long, value_name = "MS")]
	pub timeout_ms: Option<u64>,

	/// How long an agent poll waits before being told to retry, in milliseconds.
	#[arg(long, value_name = "MS")]
	pub retry_timeout_ms: Option<u64>,

	/// Accept results posted before their command was requested.
	#[arg(long)]
	pub proxy_injection: bool,

	/// Close sessions idle for longer than this, in milliseconds.
	#[arg(long, value_name = "MS")]
	pub idle_timeout_ms: Option<u64>,
}

impl ServeArgs {
	/// Loads the config file (if any) and applies flag overrides.
	pub fn load_config(&self) -> Result<RemoteControlConfig> {
		let mut config = match &self.config {
			Some(path) => RemoteControlConfig::from_file(path)
				.with_context(|| format!("Failed to load config {}", path.display()))?,
			None => RemoteControlConfig::default(),
		};

		if let Some(port) = self.port {
			config.port = port;
		}
		if let Some(ms) = self.timeout_ms {
			config.command_timeout_ms = ms;
		}
		if let Some(ms) = self.retry_timeout_ms {
			config.retry_timeout_ms = ms;
		}
		if self.proxy_injection {
			config.proxy_injection_mode = true;
		}
		if let Some(ms) = self.idle_timeout_ms {
			config.idle_session_timeout_ms = Some(ms);
		}
		Ok(config)
	}
}

#[derive(Args, Debug, Clone)]
pub struct ClientArgs {
	/// Server host.
	#[arg(long, default_value = "127.0.0.1")]
	pub host: String,

	/// Server port.
	#[arg(long, default_value_t = DEFAULT_PORT)]
	pub port: u16,
}

impl ClientArgs {
	pub fn addr(&self) -> String {
		format!("{}:{}", self.host, self.port)
	}
}

#[derive(Args, Debug, Clone)]
pub struct EndArgs {
	/// Session to end.
	#[arg(value_name = "SESSION")]
	pub session_id: String,

	#[command(flatten)]
	pub client: ClientArgs,
}

#[derive(Args, Debug, Clone)]
pub struct SpeedArgs {
	/// Delay before each command, in milliseconds.
	#[arg(value_name = "MS")]
	pub speed_ms: u64,

	/// Apply to this session only instead of the default for new sessions.
	#[arg(long, value_name = "SESSION")]
	pub session: Option<String>,

	#[command(flatten)]
	pub client: ClientArgs,
}
