use std::io::Write;

use clap::Parser;

use super::*;

#[test]
fn test_parse_serve_defaults() {
	let cli = Cli::try_parse_from(["webrc", "serve"]).unwrap();

	match cli.command {
		Commands::Serve(args) => {
			let config = args.load_config().unwrap();
			assert_eq!(config, RemoteControlConfig::default());
		}
		_ => panic!("Expected Serve command"),
	}
}

#[test]
fn test_parse_serve_flags_override_config_file() {
	let mut file = tempfile::NamedTempFile::new().unwrap();
	write!(file, r#"{{"port": 5555, "retryTimeoutMs": 2000, "speedMs": 100}}"#).unwrap();
	let path = file.path().to_str().unwrap().to_string();

	let cli = Cli::try_parse_from([
		"webrc",
		"-vv",
		"serve",
		"--config",
		&path,
		"--port",
		"6000",
		"--timeout-ms",
		"1000",
		"--proxy-injection",
		"--idle-timeout-ms",
		"60000",
	])
	.unwrap();
	assert_eq!(cli.verbose, 2);

	let Commands::Serve(args) = cli.command else {
		panic!("Expected Serve command");
	};
	let config = args.load_config().unwrap();
	assert_eq!(config.port, 6000);
	assert_eq!(config.command_timeout_ms, 1000);
	assert_eq!(config.retry_timeout_ms, 2000);
	assert_eq!(config.speed_ms, 100);
	assert!(config.proxy_injection_mode);
	assert_eq!(config.idle_session_timeout_ms, Some(60_000));
}

#[test]
fn test_serve_with_missing_config_fails() {
	let cli = Cli::try_parse_from(["webrc", "serve", "--config", "/nonexistent/webrc.json"]).unwrap();
	let Commands::Serve(args) = cli.command else {
		panic!("Expected Serve command");
	};
	let err = args.load_config().unwrap_err();
	assert!(err.to_string().contains("Failed to load config"));
}

#[test]
fn test_parse_client_commands() {
	let cli = Cli::try_parse_from(["webrc", "sessions", "--port", "4545"]).unwrap();
	match cli.command {
		Commands::Sessions(args) => assert_eq!(args.addr(), "127.0.0.1:4545"),
		_ => panic!("Expected Sessions command"),
	}

	let cli = Cli::try_parse_from(["webrc", "end", "abc123", "--host", "10.0.0.2"]).unwrap();
	match cli.command {
		Commands::End(args) => {
			assert_eq!(args.session_id, "abc123");
			assert_eq!(args.client.addr(), "10.0.0.2:4444");
		}
		_ => panic!("Expected End command"),
	}
}

#[test]
fn test_parse_speed_command() {
	let cli = Cli::try_parse_from(["webrc", "speed", "250", "--session", "s1"]).unwrap();
	match cli.command {
		Commands::Speed(args) => {
			assert_eq!(args.speed_ms, 250);
			assert_eq!(args.session.as_deref(), Some("s1"));
		}
		_ => panic!("Expected Speed command"),
	}
}
