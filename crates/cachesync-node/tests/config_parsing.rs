use std::{env, fs};

use cachesync_node::NodeConfig;
use cachesync_node::config::loader::load_config;

#[test]
fn config_parsing_and_env_overrides_and_validation() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("cachesync.toml");

    let toml_content = r#"
[sync]
channel_prefix = "prod:"
compress_messages = true

[local]
ttl_secs = 60
max_entries = 500

[redis]
enabled = true
url = "redis://cache.internal:6379"
ttl_secs = 900

[logging]
level = "debug"
"#;
    fs::write(&path, toml_content).expect("write toml");

    // 1) Valid config parses, unspecified fields keep their defaults
    let cfg = load_config(path.to_str()).expect("should parse config");
    assert_eq!(cfg.sync.channel_prefix, "prod:");
    assert_eq!(cfg.sync.channel, "cache-invalidation");
    assert!(cfg.sync.compress_messages);
    assert_eq!(cfg.local.max_entries, 500);
    assert_eq!(cfg.redis.pool_size, 10);
    assert_eq!(cfg.redis.ttl_secs, 900);
    assert_eq!(cfg.logging.level, "debug");
    assert_eq!(cfg.sync_settings().channel_name(), "prod:cache-invalidation");

    // 2) Env override should win over file
    unsafe {
        env::set_var("CACHESYNC__LOCAL__MAX_ENTRIES", "42");
    }
    let cfg_env = load_config(path.to_str()).expect("should parse config with env overrides");
    assert_eq!(cfg_env.local.max_entries, 42);
    unsafe {
        env::remove_var("CACHESYNC__LOCAL__MAX_ENTRIES");
    }

    // 3) Invalid values are rejected
    fs::write(&path, "[local]\nmax_entries = 0\n").expect("write toml");
    let err = load_config(path.to_str()).expect_err("max_entries = 0 must fail");
    assert!(err.contains("local.max_entries"));
}

#[test]
fn missing_file_yields_defaults() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("absent.toml");

    let cfg = load_config(path.to_str()).expect("defaults are valid");
    assert!(cfg.sync.enabled);
    assert!(!cfg.redis.enabled);
    assert_eq!(cfg.local.ttl_secs, 300);
}

#[test]
fn serialized_defaults_load_back() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("cachesync.toml");

    let rendered = toml::to_string(&NodeConfig::default()).expect("render toml");
    fs::write(&path, rendered).expect("write toml");

    let cfg = load_config(path.to_str()).expect("should parse rendered defaults");
    assert_eq!(cfg.redis.url, "redis://localhost:6379");
    assert_eq!(cfg.sync.channel_prefix, "");
}
