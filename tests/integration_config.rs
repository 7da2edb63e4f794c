//! Configuration loading and override tests

use awaybot::cli::Cli;
use awaybot::config::Config;
use serial_test::serial;
use std::fs;
use tempfile::TempDir;

fn temp_config_file(contents: &str) -> (TempDir, String) {
    let dir = TempDir::new().expect("failed to create tempdir");
    let config_path = dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    let path = config_path.display().to_string();
    (dir, path)
}

#[test]
#[serial]
fn loads_yaml_and_applies_defaults() {
    let (_dir, path) = temp_config_file(
        r#"
transport:
  homeserver: https://matrix.example.org
  access_token: syt_secret
"#,
    );

    let config = Config::load(&path, &Cli::default()).unwrap();
    assert_eq!(config.transport.homeserver, "https://matrix.example.org");
    assert_eq!(config.send.max_attempts, 3);
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn env_token_overrides_file() {
    let (_dir, path) = temp_config_file(
        r#"
transport:
  homeserver: https://matrix.example.org
  access_token: from_file
"#,
    );

    std::env::set_var("AWAYBOT_ACCESS_TOKEN", "from_env");
    let config = Config::load(&path, &Cli::default()).unwrap();
    std::env::remove_var("AWAYBOT_ACCESS_TOKEN");

    assert_eq!(config.transport.access_token, "from_env");
}

#[test]
#[serial]
fn cli_storage_path_overrides_config() {
    let (_dir, path) = temp_config_file(
        r#"
transport:
  homeserver: https://matrix.example.org
storage:
  path: /var/lib/awaybot/state.db
"#,
    );

    let cli = Cli {
        storage_path: Some("/tmp/other.db".to_string()),
        ..Cli::default()
    };
    let config = Config::load(&path, &cli).unwrap();
    assert_eq!(config.storage.path.as_deref(), Some("/tmp/other.db"));
}

#[test]
#[serial]
fn missing_file_falls_back_to_defaults() {
    let config = Config::load("/nonexistent/config.yaml", &Cli::default()).unwrap();
    assert!(config.transport.homeserver.is_empty());
    assert!(config.validate().is_err());
}
