use std::collections::HashMap;

use super::*;

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn defaults_apply_without_file_or_env() {
    let settings = load_settings_from(None, env_from(&[])).expect("settings");
    assert_eq!(settings.api_url.as_str(), "http://localhost:8000/");
    assert_eq!(settings.read_timeout_secs, 10);
    assert_eq!(settings.write_timeout_secs, 300);
}

#[test]
fn file_values_override_defaults() {
    let file = r#"
        api_url = "http://chat.internal:9000/api"
        read_timeout_secs = 5
    "#;
    let settings = load_settings_from(Some(file), env_from(&[])).expect("settings");
    assert_eq!(settings.api_url.as_str(), "http://chat.internal:9000/api");
    assert_eq!(settings.read_timeout_secs, 5);
    assert_eq!(settings.write_timeout_secs, 300);
}

#[test]
fn env_overrides_file_and_app_prefix_wins() {
    let file = r#"api_url = "http://from-file:1""#;
    let settings = load_settings_from(
        Some(file),
        env_from(&[
            ("API_URL", "http://plain-env:2"),
            ("APP__API_URL", "http://prefixed-env:3"),
            ("APP__WRITE_TIMEOUT_SECS", " 600 "),
        ]),
    )
    .expect("settings");
    assert_eq!(settings.api_url.host_str(), Some("prefixed-env"));
    assert_eq!(settings.write_timeout_secs, 600);
}

#[test]
fn unparsable_timeouts_keep_previous_layer() {
    let settings = load_settings_from(
        Some("read_timeout_secs = 7"),
        env_from(&[("APP__READ_TIMEOUT_SECS", "soon")]),
    )
    .expect("settings");
    assert_eq!(settings.read_timeout_secs, 7);
}

#[test]
fn malformed_file_is_ignored() {
    let settings = load_settings_from(Some("api_url = [1, 2"), env_from(&[])).expect("settings");
    assert_eq!(settings.api_url.as_str(), "http://localhost:8000/");
}

#[test]
fn invalid_urls_are_rejected() {
    let err = load_settings_from(None, env_from(&[("API_URL", "not a url")]))
        .expect_err("invalid url");
    assert!(err.to_string().contains("invalid api url"));

    assert!(parse_api_url("ftp://example.com").is_err());
    assert!(parse_api_url("https://example.com").is_ok());
}

#[test]
fn backend_config_carries_timeouts_and_trailing_slash() {
    let settings = load_settings_from(
        Some("api_url = \"http://localhost:8000/api\"\nread_timeout_secs = 3"),
        env_from(&[]),
    )
    .expect("settings");
    let config = settings.backend_config();
    assert_eq!(config.base_url.as_str(), "http://localhost:8000/api/");
    assert_eq!(config.read_timeout, Duration::from_secs(3));
    assert_eq!(config.write_timeout, Duration::from_secs(300));
}

#[test]
fn explicit_missing_config_file_is_an_error() {
    let err = load_settings(Some(Path::new("/definitely/not/here/chat_client.toml")))
        .expect_err("missing file");
    assert!(err.to_string().contains("failed to read"));
}
