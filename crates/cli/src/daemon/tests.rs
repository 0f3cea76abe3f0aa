use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::watch;
use webrc::protocol::{Capabilities, SessionId, StatusCode};
use webrc::runtime::{RemoteControlConfig, SessionRegistry};

use super::server::handle_request;
use super::*;

fn registry() -> Arc<SessionRegistry> {
	Arc::new(SessionRegistry::new(RemoteControlConfig {
		command_timeout_ms: 2_000,
		retry_timeout_ms: 200,
		..RemoteControlConfig::default()
	}))
}

async fn new_session(registry: &SessionRegistry, tx: &watch::Sender<bool>) -> SessionId {
	match handle_request(
		registry,
		tx,
		DaemonRequest::NewSession {
			capabilities: Capabilities::firefox(),
		},
	)
	.await
	{
		DaemonResponse::Session { session_id } => session_id,
		other => panic!("Expected Session, got {other:?}"),
	}
}

#[test]
fn test_request_wire_format() {
	let request: DaemonRequest =
		serde_json::from_str(r#"{"type":"command","session_id":"abc","verb":"open","args":["/"]}"#).unwrap();
	match request {
		DaemonRequest::Command { session_id, verb, args } => {
			assert_eq!(session_id.as_str(), "abc");
			assert_eq!(verb, "open");
			assert_eq!(args, vec![json!("/")]);
		}
		other => panic!("Expected Command, got {other:?}"),
	}

	let request: DaemonRequest = serde_json::from_str(r#"{"type":"poll","session_id":"abc"}"#).unwrap();
	assert!(matches!(request, DaemonRequest::Poll { result: None, .. }));

	let encoded = serde_json::to_value(DaemonResponse::Pong).unwrap();
	assert_eq!(encoded, json!({"type": "pong"}));
}

#[tokio::test]
async fn test_ping_answers_pong() {
	let registry = registry();
	let (tx, _rx) = watch::channel(false);
	let response = handle_request(&registry, &tx, DaemonRequest::Ping).await;
	assert!(matches!(response, DaemonResponse::Pong));
}

#[tokio::test]
async fn test_click_round_trip_through_requests() {
	let registry = registry();
	let (tx, _rx) = watch::channel(false);
	let session_id = new_session(&registry, &tx).await;

	let caller = {
		let registry = Arc::clone(&registry);
		let tx = tx.clone();
		let session_id = session_id.clone();
		tokio::spawn(async move {
			handle_request(
				&registry,
				&tx,
				DaemonRequest::Command {
					session_id,
					verb: "click".to_string(),
					args: vec![json!("foo")],
				},
			)
			.await
		})
	};

	let command = loop {
		let polled = handle_request(
			&registry,
			&tx,
			DaemonRequest::Poll {
				session_id: session_id.clone(),
				result: None,
				status: None,
			},
		)
		.await;
		match polled {
			DaemonResponse::Command { command } if command.is_retry() => continue,
			DaemonResponse::Command { command } => break command,
			other => panic!("Expected Command, got {other:?}"),
		}
	};
	assert_eq!(command.verb, "click");
	assert_eq!(command.args, vec![json!("foo")]);

	let posted = handle_request(
		&registry,
		&tx,
		DaemonRequest::Post {
			session_id: session_id.clone(),
			result: json!("OK"),
			status: None,
		},
	)
	.await;
	assert!(matches!(posted, DaemonResponse::Ok));

	match caller.await.unwrap() {
		DaemonResponse::Response { response } => {
			assert_eq!(response.status, 0);
			assert_eq!(response.value, json!("OK"));
		}
		other => panic!("Expected Response, got {other:?}"),
	}
}

#[tokio::test]
async fn test_agent_failure_status_reaches_caller() {
	let registry = registry();
	let (tx, _rx) = watch::channel(false);
	let session_id = new_session(&registry, &tx).await;

	let caller = {
		let registry = Arc::clone(&registry);
		let tx = tx.clone();
		let session_id = session_id.clone();
		tokio::spawn(async move {
			handle_request(
				&registry,
				&tx,
				DaemonRequest::Command {
					session_id,
					verb: "click".to_string(),
					args: vec![json!("id=missing")],
				},
			)
			.await
		})
	};

	loop {
		let polled = handle_request(
			&registry,
			&tx,
			DaemonRequest::Poll {
				session_id: session_id.clone(),
				result: None,
				status: None,
			},
		)
		.await;
		match polled {
			DaemonResponse::Command { command } if command.is_retry() => continue,
			DaemonResponse::Command { command } => {
				assert_eq!(command.verb, "click");
				break;
			}
			other => panic!("Expected Command, got {other:?}"),
		}
	}

	// post the failure and fetch again in one round trip
	let polled = handle_request(
		&registry,
		&tx,
		DaemonRequest::Poll {
			session_id: session_id.clone(),
			result: Some(json!({"message": "Element id=missing not found"})),
			status: Some(7),
		},
	)
	.await;
	assert!(matches!(polled, DaemonResponse::Command { .. }));

	match caller.await.unwrap() {
		DaemonResponse::Response { response } => {
			assert_eq!(response.status, 7);
			assert_eq!(response.status_code(), StatusCode::NoSuchElement);
			assert_eq!(response.value["message"], json!("Element id=missing not found"));
		}
		other => panic!("Expected Response, got {other:?}"),
	}
}

#[test]
fn test_post_status_defaults_to_success() {
	let request: DaemonRequest =
		serde_json::from_str(r#"{"type":"post","session_id":"abc","result":"OK"}"#).unwrap();
	assert!(matches!(request, DaemonRequest::Post { status: None, .. }));

	let request: DaemonRequest =
		serde_json::from_str(r#"{"type":"post","session_id":"abc","result":"gone","status":10}"#).unwrap();
	assert!(matches!(request, DaemonRequest::Post { status: Some(10), .. }));
}

#[tokio::test]
async fn test_idle_poll_is_told_to_retry() {
	let registry = registry();
	let (tx, _rx) = watch::channel(false);
	let session_id = new_session(&registry, &tx).await;

	let response = handle_request(
		&registry,
		&tx,
		DaemonRequest::Poll {
			session_id,
			result: None,
			status: None,
		},
	)
	.await;
	match response {
		DaemonResponse::Command { command } => assert!(command.is_retry()),
		other => panic!("Expected Command, got {other:?}"),
	}
}

#[tokio::test]
async fn test_ended_session_is_not_found() {
	let registry = registry();
	let (tx, _rx) = watch::channel(false);
	let session_id = new_session(&registry, &tx).await;

	let ended = handle_request(
		&registry,
		&tx,
		DaemonRequest::EndSession {
			session_id: session_id.clone(),
		},
	)
	.await;
	assert!(matches!(ended, DaemonResponse::Ok));

	let response = handle_request(
		&registry,
		&tx,
		DaemonRequest::Command {
			session_id,
			verb: "open".to_string(),
			args: Vec::new(),
		},
	)
	.await;
	match response {
		DaemonResponse::Error { code, .. } => assert_eq!(code, "session_not_found"),
		other => panic!("Expected Error, got {other:?}"),
	}
}

#[tokio::test]
async fn test_list_sessions_reports_state() {
	let registry = registry();
	let (tx, _rx) = watch::channel(false);
	let first = new_session(&registry, &tx).await;
	let second = new_session(&registry, &tx).await;

	let response = handle_request(&registry, &tx, DaemonRequest::ListSessions).await;
	let DaemonResponse::Sessions { list } = response else {
		panic!("Expected Sessions");
	};
	assert_eq!(list.len(), 2);
	let mut ids: Vec<_> = list.iter().map(|info| info.session_id.clone()).collect();
	ids.sort();
	let mut expected = vec![first, second];
	expected.sort();
	assert_eq!(ids, expected);
	assert!(list.iter().all(|info| info.state == "idle"));
	assert!(list.iter().all(|info| info.capabilities.browser_name() == Some("firefox")));
}

#[tokio::test]
async fn test_set_speed_default_and_per_session() {
	let registry = registry();
	let (tx, _rx) = watch::channel(false);
	let existing = new_session(&registry, &tx).await;

	let response = handle_request(
		&registry,
		&tx,
		DaemonRequest::SetSpeed {
			session_id: None,
			speed_ms: 50,
		},
	)
	.await;
	assert!(matches!(response, DaemonResponse::Ok));
	assert_eq!(registry.default_speed(), Duration::from_millis(50));
	assert_eq!(
		registry.get(&existing).unwrap().queue().queue_delay(),
		Duration::ZERO
	);

	let later = new_session(&registry, &tx).await;
	assert_eq!(
		registry.get(&later).unwrap().queue().queue_delay(),
		Duration::from_millis(50)
	);

	let response = handle_request(
		&registry,
		&tx,
		DaemonRequest::SetSpeed {
			session_id: Some(existing.clone()),
			speed_ms: 10,
		},
	)
	.await;
	assert!(matches!(response, DaemonResponse::Ok));
	assert_eq!(
		registry.get(&existing).unwrap().queue().queue_delay(),
		Duration::from_millis(10)
	);
	assert_eq!(registry.default_speed(), Duration::from_millis(50));

	let response = handle_request(
		&registry,
		&tx,
		DaemonRequest::SetSpeed {
			session_id: Some(SessionId::new("missing")),
			speed_ms: 10,
		},
	)
	.await;
	assert!(matches!(response, DaemonResponse::Error { .. }));
}

#[tokio::test]
async fn test_shutdown_request_signals_watch() {
	let registry = registry();
	let (tx, rx) = watch::channel(false);
	let response = handle_request(&registry, &tx, DaemonRequest::Shutdown).await;
	assert!(matches!(response, DaemonResponse::Ok));
	assert!(*rx.borrow());
}

fn loopback_config() -> RemoteControlConfig {
	RemoteControlConfig {
		port: 0,
		retry_timeout_ms: 200,
		..RemoteControlConfig::default()
	}
}

#[tokio::test]
async fn test_serves_requests_over_tcp_until_shutdown() {
	let daemon = Daemon::bind(loopback_config()).await.unwrap();
	let addr = daemon.local_addr().unwrap().to_string();
	let registry = Arc::clone(daemon.registry());
	let server = tokio::spawn(daemon.run());

	let response = send_request(&addr, DaemonRequest::Ping).await.unwrap();
	assert!(matches!(response, DaemonResponse::Pong));

	let response = expect_ok(&addr, DaemonRequest::NewSession {
		capabilities: Capabilities::chrome(),
	})
	.await
	.unwrap();
	let DaemonResponse::Session { session_id } = response else {
		panic!("Expected Session");
	};

	let response = send_request(&addr, DaemonRequest::Shutdown).await.unwrap();
	assert!(matches!(response, DaemonResponse::Ok));

	tokio::time::timeout(Duration::from_secs(5), server)
		.await
		.expect("server did not stop")
		.unwrap()
		.unwrap();
	assert!(registry.try_get(&session_id).is_none());
}

#[tokio::test]
async fn test_invalid_request_line_gets_error_reply() {
	let daemon = Daemon::bind(loopback_config()).await.unwrap();
	let addr = daemon.local_addr().unwrap();
	let server = tokio::spawn(daemon.run());

	let stream = TcpStream::connect(addr).await.unwrap();
	let (read_half, mut write_half) = tokio::io::split(stream);
	let mut reader = BufReader::new(read_half);

	write_half.write_all(b"not json\n").await.unwrap();
	let mut line = String::new();
	reader.read_line(&mut line).await.unwrap();
	let response: DaemonResponse = serde_json::from_str(&line).unwrap();
	match response {
		DaemonResponse::Error { code, .. } => assert_eq!(code, "invalid_request"),
		other => panic!("Expected Error, got {other:?}"),
	}

	// The connection stays usable after a bad line.
	write_half.write_all(b"{\"type\":\"ping\"}\n").await.unwrap();
	line.clear();
	reader.read_line(&mut line).await.unwrap();
	let response: DaemonResponse = serde_json::from_str(&line).unwrap();
	assert!(matches!(response, DaemonResponse::Pong));

	let response = expect_ok(&addr.to_string(), DaemonRequest::Shutdown).await.unwrap();
	assert!(matches!(response, DaemonResponse::Ok));
	server.await.unwrap().unwrap();
}
