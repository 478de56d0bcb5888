//! Tests for [`remote_client::RemoteConfig`] env loading, validation and token masking.

use remote_client::{mask_token, RemoteConfig};
use serial_test::serial;
use std::env;

#[test]
#[serial]
fn test_from_env_defaults() {
    env::set_var("CHAT_API_URL", "https://chat.example.com/api");
    env::remove_var("CHAT_API_TOKEN");
    env::remove_var("CHAT_API_TIMEOUT_SECS");

    let config = RemoteConfig::from_env(None).unwrap();
    assert_eq!(config.base_url, "https://chat.example.com/api");
    assert!(config.api_token.is_none());
    assert_eq!(config.timeout_secs, 30);
    config.validate().unwrap();
}

#[test]
#[serial]
fn test_from_env_custom_and_override() {
    env::set_var("CHAT_API_URL", "https://ignored.example.com");
    env::set_var("CHAT_API_TOKEN", "tok-1234567890");
    env::set_var("CHAT_API_TIMEOUT_SECS", "7");

    let config = RemoteConfig::from_env(Some("http://localhost:8080".to_string())).unwrap();
    assert_eq!(config.base_url, "http://localhost:8080");
    assert_eq!(config.api_token.as_deref(), Some("tok-1234567890"));
    assert_eq!(config.timeout_secs, 7);

    env::remove_var("CHAT_API_TOKEN");
    env::remove_var("CHAT_API_TIMEOUT_SECS");
}

#[test]
#[serial]
fn test_from_env_missing_url() {
    env::remove_var("CHAT_API_URL");
    assert!(RemoteConfig::from_env(None).is_err());
}

#[test]
fn test_validate_rejects_bad_urls() {
    assert!(RemoteConfig::new("not a url").validate().is_err());
    assert!(RemoteConfig::new("ftp://example.com").validate().is_err());
}

#[test]
fn test_mask_token() {
    assert_eq!(mask_token("short"), "***");
    assert_eq!(mask_token("sk-abcdefghijklmnop"), "sk-abcd***mnop");
}
