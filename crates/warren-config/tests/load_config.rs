use std::io::Write;

use warren_config::{ClientConfiguration, ConfigError};

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
hostnames = ["rabbit.internal"]
port = 5673
client_provided_name = "billing"

[queue]
exclusive = true
"#
    )
    .unwrap();

    let config = ClientConfiguration::load(file.path()).unwrap();
    assert_eq!(config.hostnames, vec!["rabbit.internal"]);
    assert_eq!(config.port, 5673);
    assert_eq!(config.client_provided_name.as_deref(), Some("billing"));
    assert!(config.queue.exclusive);
    assert!(config.queue.durable);
}

#[test]
fn test_load_missing_file_is_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = ClientConfiguration::load(&dir.path().join("missing.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::ReadFile { .. }));
}

#[test]
fn test_load_or_default_without_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("warren.toml");
    let config = ClientConfiguration::load_or_default(Some(&path)).unwrap();
    assert_eq!(config, ClientConfiguration::default());
    assert_eq!(
        ClientConfiguration::load_or_default(None).unwrap(),
        ClientConfiguration::default()
    );
}

#[test]
fn test_load_invalid_toml() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "port = \"not a number\"").unwrap();
    let err = ClientConfiguration::load(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}
