use anyhow::{Result, anyhow};
use tracing::info;
use webrc::protocol::SessionId;

use crate::cli::{Cli, ClientArgs, Commands, EndArgs, ServeArgs, SpeedArgs};
use crate::daemon::{self, Daemon, DaemonRequest, DaemonResponse, SessionInfo};

pub async fn dispatch(cli: Cli) -> Result<()> {
	match cli.command {
		Commands::Serve(args) => serve(args).await,
		Commands::Ping(client) => ping(&client).await,
		Commands::Sessions(client) => sessions(&client).await,
		Commands::End(args) => end(args).await,
		Commands::Speed(args) => speed(args).await,
		Commands::Stop(client) => stop(&client).await,
	}
}

async fn serve(args: ServeArgs) -> Result<()> {
	let config = args.load_config()?;
	let daemon = Daemon::bind(config).await?;
	println!("webrc listening on {}", daemon.local_addr()?);
	daemon.run().await?;
	info!(target = "webrc.daemon", "server stopped");
	Ok(())
}

async fn ping(client: &ClientArgs) -> Result<()> {
	match daemon::expect_ok(&client.addr(), DaemonRequest::Ping).await? {
		DaemonResponse::Pong => {
			println!("pong from {}", client.addr());
			Ok(())
		}
		other => Err(unexpected(other)),
	}
}

async fn sessions(client: &ClientArgs) -> Result<()> {
	match daemon::expect_ok(&client.addr(), DaemonRequest::ListSessions).await? {
		DaemonResponse::Sessions { list } => {
			if list.is_empty() {
				println!("no sessions");
			}
			for info in &list {
				println!("{}", format_session(info));
			}
			Ok(())
		}
		other => Err(unexpected(other)),
	}
}

async fn end(args: EndArgs) -> Result<()> {
	let request = DaemonRequest::EndSession {
		session_id: SessionId::from(args.session_id.clone()),
	};
	match daemon::expect_ok(&args.client.addr(), request).await? {
		DaemonResponse::Ok => {
			println!("ended session {}", args.session_id);
			Ok(())
		}
		other => Err(unexpected(other)),
	}
}

async fn speed(args: SpeedArgs) -> Result<()> {
	let request = DaemonRequest::SetSpeed {
		session_id: args.session.clone().map(SessionId::from),
		speed_ms: args.speed_ms,
	};
	match daemon::expect_ok(&args.client.addr(), request).await? {
		DaemonResponse::Ok => {
			match &args.session {
				Some(session) => println!("session {session} speed set to {}ms", args.speed_ms),
				None => println!("default speed set to {}ms", args.speed_ms),
			}
			Ok(())
		}
		other => Err(unexpected(other)),
	}
}

async fn stop(client: &ClientArgs) -> Result<()> {
	match daemon::expect_ok(&client.addr(), DaemonRequest::Shutdown).await? {
		DaemonResponse::Ok => {
			println!("server at {} stopping", client.addr());
			Ok(())
		}
		other => Err(unexpected(other)),
	}
}

fn format_session(info: &SessionInfo) -> String {
	format!(
		"{}\t{}\t{}\tidle {}ms",
		info.session_id, info.state, info.capabilities, info.idle_ms
	)
}

fn unexpected(response: DaemonResponse) -> anyhow::Error {
	anyhow!("unexpected server response: {response:?}")
}
