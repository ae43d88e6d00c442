//! Config module tests

use std::io::Write;

use pretty_assertions::assert_eq;

use super::*;

#[test]
fn test_substitute_env_vars_simple() {
    std::env::set_var("WIRE_TEST_SIMPLE", "hello");
    let result = substitute_env_vars("value = \"${WIRE_TEST_SIMPLE}\"").unwrap();
    assert_eq!(result, "value = \"hello\"");
    std::env::remove_var("WIRE_TEST_SIMPLE");
}

#[test]
fn test_substitute_env_vars_with_default() {
    std::env::remove_var("WIRE_TEST_UNSET");
    let result = substitute_env_vars("value = \"${WIRE_TEST_UNSET:-fallback}\"").unwrap();
    assert_eq!(result, "value = \"fallback\"");

    std::env::set_var("WIRE_TEST_SET", "env_value");
    let result = substitute_env_vars("value = \"${WIRE_TEST_SET:-fallback}\"").unwrap();
    assert_eq!(result, "value = \"env_value\"");
    std::env::remove_var("WIRE_TEST_SET");
}

#[test]
fn test_substitute_env_vars_missing_no_default() {
    std::env::remove_var("WIRE_TEST_MISSING");
    let result = substitute_env_vars("value = \"${WIRE_TEST_MISSING}\"").unwrap();
    assert_eq!(result, "value = \"\"");
}

#[test]
fn test_default_config() {
    let config = Config::default();
    assert_eq!(config.log.level, "info");
    assert_eq!(config.parser.max_remaining_length, 1024 * 1024);
    assert_eq!(config.listen.bind.to_string(), "0.0.0.0:1883");
    assert!(config.validate().is_ok());
}

#[test]
fn test_parse_full_config() {
    let toml = r#"
[log]
level = "debug"

[parser]
max_remaining_length = 4096

[listen]
bind = "127.0.0.1:11883"
"#;

    let config = Config::parse(toml).unwrap();
    assert_eq!(config.log.level, "debug");
    assert_eq!(config.parser.max_remaining_length, 4096);
    assert_eq!(config.listen.bind.port(), 11883);
}

#[test]
fn test_parse_partial_config_keeps_defaults() {
    let config = Config::parse("[listen]\nbind = \"127.0.0.1:1884\"\n").unwrap();
    assert_eq!(config.log.level, "info");
    assert_eq!(config.parser.max_remaining_length, DEFAULT_MAX_REMAINING_LENGTH);
}

#[test]
fn test_validate_log_level() {
    let err = Config::parse("[log]\nlevel = \"verbose\"\n").unwrap_err();
    assert!(matches!(err, ConfigError::Validation(_)));
    assert!(err.to_string().contains("verbose"));
}

#[test]
fn test_validate_max_remaining_length() {
    let err = Config::parse("[parser]\nmax_remaining_length = 268435456\n").unwrap_err();
    assert!(matches!(err, ConfigError::Validation(_)));

    assert!(Config::parse("[parser]\nmax_remaining_length = 268435455\n").is_ok());
}

#[test]
fn test_parse_invalid_toml() {
    let err = Config::parse("[listen\nbind = 1").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn test_load_with_env_substitution() {
    std::env::set_var("WIRE_TEST_PORT", "1885");

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[parser]
max_remaining_length = ${{WIRE_TEST_LIMIT:-2048}}

[listen]
bind = "127.0.0.1:${{WIRE_TEST_PORT}}"
"#
    )
    .unwrap();

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.listen.bind.to_string(), "127.0.0.1:1885");
    assert_eq!(config.parser.max_remaining_length, 2048);

    std::env::remove_var("WIRE_TEST_PORT");
}

#[test]
fn test_load_missing_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load(dir.path().join("absent.toml")).unwrap();
    assert_eq!(config.listen.bind.port(), 1883);
    assert_eq!(config.parser.max_remaining_length, DEFAULT_MAX_REMAINING_LENGTH);
}

#[test]
fn test_parser_from_config() {
    let config = Config::parse("[parser]\nmax_remaining_length = 64\n").unwrap();
    let parser = config.parser.parser(Role::Client);
    assert_eq!(parser.role(), Role::Client);
    assert_eq!(parser.max_remaining_length(), 64);
}
