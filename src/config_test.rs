use super::*;
use std::collections::HashMap;

fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn from_vars_defaults() {
    let cfg = ClientConfig::from_vars(vars(&[("HOME", "/home/op")])).unwrap();
    assert_eq!(cfg.api_url, DEFAULT_API_URL);
    assert_eq!(cfg.storage_path, PathBuf::from("/home/op/.config/bitacora/storage.json"));
    assert_eq!(cfg.auth, AuthTimeouts::default());
    assert_eq!(cfg.auth.init, Duration::from_millis(3_000));
    assert_eq!(cfg.auth.login, Duration::from_millis(10_000));
    assert_eq!(cfg.http, HttpTimeouts::default());
}

#[test]
fn from_vars_prefers_xdg_config_home() {
    let cfg = ClientConfig::from_vars(vars(&[("HOME", "/home/op"), ("XDG_CONFIG_HOME", "/xdg")])).unwrap();
    assert_eq!(cfg.storage_path, PathBuf::from("/xdg/bitacora/storage.json"));
}

#[test]
fn from_vars_parses_overrides() {
    let cfg = ClientConfig::from_vars(vars(&[
        ("BITACORA_API_URL", "https://planta.example.test/"),
        ("BITACORA_STORAGE_PATH", "/tmp/bitacora.json"),
        ("BITACORA_INIT_TIMEOUT_MS", "500"),
        ("BITACORA_LOGIN_TIMEOUT_MS", "2500"),
        ("BITACORA_CONNECT_TIMEOUT_SECS", "3"),
        ("BITACORA_REQUEST_TIMEOUT_SECS", "60"),
    ]))
    .unwrap();
    assert_eq!(cfg.api_url, "https://planta.example.test");
    assert_eq!(cfg.storage_path, PathBuf::from("/tmp/bitacora.json"));
    assert_eq!(cfg.auth.init, Duration::from_millis(500));
    assert_eq!(cfg.auth.login, Duration::from_millis(2_500));
    assert_eq!(cfg.http, HttpTimeouts { connect_secs: 3, request_secs: 60 });
}

#[test]
fn unparseable_timeout_falls_back_to_default() {
    let cfg = ClientConfig::from_vars(vars(&[("HOME", "/h"), ("BITACORA_INIT_TIMEOUT_MS", "soon")])).unwrap();
    assert_eq!(cfg.auth.init, Duration::from_millis(DEFAULT_INIT_TIMEOUT_MS));
}

#[test]
fn invalid_api_url_errors() {
    let err = ClientConfig::from_vars(vars(&[("HOME", "/h"), ("BITACORA_API_URL", "ftp://planta")])).unwrap_err();
    assert_eq!(err, ConfigError::InvalidApiUrl("ftp://planta".to_owned()));
}

#[test]
fn bare_scheme_is_not_a_url() {
    assert!(parse_api_url(Some("http://")).is_err());
}

#[test]
fn missing_home_and_storage_path_errors() {
    let err = ClientConfig::from_vars(vars(&[])).unwrap_err();
    assert_eq!(err, ConfigError::NoStoragePath);
}
