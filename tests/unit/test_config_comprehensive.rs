use biotask::core::config::{ConfigValidator, PlatformConfig};
use std::path::PathBuf;

#[test]
fn test_default_directory_layout() {
    let config = PlatformConfig::default();
    assert_eq!(
        config.directories.programs,
        PathBuf::from("/var/lib/biotask/filesystem/programs")
    );
    assert_eq!(
        config.directories.data_read,
        PathBuf::from("/var/lib/biotask/filesystem/data")
    );
    assert_eq!(
        config.directories.data_write,
        PathBuf::from("/var/lib/biotask/filesystem/write_data")
    );
    assert_eq!(
        config.directories.storage,
        PathBuf::from("/var/lib/biotask/storage")
    );
}

#[test]
fn test_partial_file_keeps_other_defaults() {
    let toml = r#"
[directories]
programs = "/srv/programs"
"#;
    let config: PlatformConfig = toml::from_str(toml).unwrap();
    assert_eq!(config.directories.programs, PathBuf::from("/srv/programs"));
    assert_eq!(
        config.directories.storage,
        PathBuf::from("/var/lib/biotask/storage")
    );
    assert_eq!(config.bridge.token_var, "BIOTASK_TOKEN");
}

#[test]
fn test_unknown_keys_are_ignored() {
    let toml = r#"
[bridge]
proxy_url = "http://127.0.0.1:8888"
extra = "ignored"
"#;
    let config: PlatformConfig = toml::from_str(toml).unwrap();
    assert_eq!(config.bridge.proxy_url, "http://127.0.0.1:8888");
}

#[test]
fn test_validator_accepts_defaults() {
    assert!(ConfigValidator::validate(&PlatformConfig::default()).is_ok());
}

#[test]
fn test_validator_rejects_empty_token_var() {
    let mut config = PlatformConfig::default();
    config.bridge.token_var = "  ".to_string();
    assert!(ConfigValidator::validate(&config).is_err());
}

#[test]
fn test_validator_rejects_invalid_proxy_url() {
    let mut config = PlatformConfig::default();
    config.bridge.proxy_url = "nope nope".to_string();
    assert!(ConfigValidator::validate(&config).is_err());
}

#[test]
fn test_validator_rejects_empty_directory() {
    let mut config = PlatformConfig::default();
    config.directories.data_write = PathBuf::new();
    assert!(ConfigValidator::validate(&config).is_err());
}
