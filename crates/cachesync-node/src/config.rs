use cachesync_core::{DEFAULT_CHANNEL, LocalTierSettings, SyncSettings};
use cachesync_redis::RedisPoolSettings;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NodeConfig {
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub local: LocalConfig,
    /// Shared L2 and pub/sub transport
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl NodeConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.sync.channel.trim().is_empty() {
            return Err("sync.channel must not be blank".into());
        }
        if self.local.max_entries == 0 {
            return Err("local.max_entries must be >= 1".into());
        }
        if self.local.ttl_secs == 0 {
            return Err("local.ttl_secs must be > 0".into());
        }
        if self.redis.enabled {
            if self.redis.url.trim().is_empty() {
                return Err("redis.url must be set when redis is enabled".into());
            }
            if self.redis.pool_size == 0 {
                return Err("redis.pool_size must be > 0".into());
            }
            if self.redis.timeout_ms == 0 {
                return Err("redis.timeout_ms must be > 0".into());
            }
            if self.redis.ttl_secs == 0 {
                return Err("redis.ttl_secs must be > 0".into());
            }
        }
        Ok(())
    }

    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            enabled: self.sync.enabled,
            channel_prefix: self.sync.channel_prefix.clone(),
            channel: self.sync.channel.clone(),
            compress_messages: self.sync.compress_messages,
        }
    }

    pub fn local_settings(&self) -> LocalTierSettings {
        LocalTierSettings {
            ttl: Duration::from_secs(self.local.ttl_secs),
            max_entries: self.local.max_entries,
        }
    }

    pub fn redis_pool_settings(&self) -> RedisPoolSettings {
        RedisPoolSettings {
            url: self.redis.url.clone(),
            pool_size: self.redis.pool_size,
            timeout: Duration::from_millis(self.redis.timeout_ms),
        }
    }
}

/// Invalidation channel settings. Every instance of a deployment must use
/// the same values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_sync_enabled")]
    pub enabled: bool,

    /// Prepended to `channel`, e.g. "prod:"
    #[serde(default)]
    pub channel_prefix: String,

    #[serde(default = "default_channel")]
    pub channel: String,

    /// Gzip + base64 the message body
    #[serde(default)]
    pub compress_messages: bool,
}

fn default_sync_enabled() -> bool {
    true
}

fn default_channel() -> String {
    DEFAULT_CHANNEL.to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: default_sync_enabled(),
            channel_prefix: String::new(),
            channel: default_channel(),
            compress_messages: false,
        }
    }
}

/// Local (L1) cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalConfig {
    #[serde(default = "default_local_ttl_secs")]
    pub ttl_secs: u64,

    #[serde(default = "default_local_max_entries")]
    pub max_entries: u64,
}

fn default_local_ttl_secs() -> u64 {
    300 // 5 minutes
}

fn default_local_max_entries() -> u64 {
    1000
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_local_ttl_secs(),
            max_entries: default_local_max_entries(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Enable Redis (falls back to a single-instance setup without it)
    #[serde(default = "default_redis_enabled")]
    pub enabled: bool,

    /// Redis connection URL (e.g., "redis://localhost:6379")
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Connection pool size
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Connection timeout in milliseconds
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,

    /// TTL of L2 entries in seconds
    #[serde(default = "default_redis_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_redis_enabled() -> bool {
    false
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_redis_pool_size() -> usize {
    10
}

fn default_redis_timeout_ms() -> u64 {
    5000
}

fn default_redis_ttl_secs() -> u64 {
    1800 // 30 minutes
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: default_redis_enabled(),
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            timeout_ms: default_redis_timeout_ms(),
            ttl_secs: default_redis_ttl_secs(),
        }
    }
}

/// Log output settings. `RUST_LOG`, when set, replaces `level`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. "info" or "cachesync_core=debug,info"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Colored output
    #[serde(default = "default_log_ansi")]
    pub ansi: bool,

    /// Include the module path of each event
    #[serde(default = "default_log_target")]
    pub target: bool,
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_ansi() -> bool {
    true
}

fn default_log_target() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            ansi: default_log_ansi(),
            target: default_log_target(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MetricsConfig {
    /// Install the Prometheus recorder and report sync counters to it
    #[serde(default)]
    pub prometheus: bool,
}

pub mod loader {
    use super::NodeConfig;
    use config::{Config, Environment, File};
    use std::fmt;
    use std::path::PathBuf;

    pub const DEFAULT_CONFIG_PATH: &str = "cachesync.toml";

    /// Environment variable naming the config file.
    pub const CONFIG_PATH_ENV: &str = "CACHESYNC_CONFIG";

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum PathOrigin {
        Flag,
        Env,
        Default,
    }

    impl fmt::Display for PathOrigin {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                PathOrigin::Flag => f.write_str("--config"),
                PathOrigin::Env => f.write_str(CONFIG_PATH_ENV),
                PathOrigin::Default => f.write_str("default"),
            }
        }
    }

    /// Pick the config file: `--config <path>` or `--config=<path>` in
    /// `args`, then `env_path` if non-empty, then [`DEFAULT_CONFIG_PATH`].
    pub fn config_path<I>(args: I, env_path: Option<String>) -> (String, PathOrigin)
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            if let Some(path) = arg.strip_prefix("--config=") {
                return (path.to_string(), PathOrigin::Flag);
            }
            if arg == "--config" {
                if let Some(path) = args.next() {
                    return (path, PathOrigin::Flag);
                }
            }
        }

        match env_path {
            Some(path) if !path.trim().is_empty() => (path, PathOrigin::Env),
            _ => (DEFAULT_CONFIG_PATH.to_string(), PathOrigin::Default),
        }
    }

    pub fn load_config(path: Option<&str>) -> Result<NodeConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_PATH));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., CACHESYNC__SYNC__CHANNEL_PREFIX=prod:
        builder = builder.add_source(
            Environment::with_prefix("CACHESYNC")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: NodeConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = NodeConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.sync.channel, "cache-invalidation");
        assert_eq!(cfg.local.ttl_secs, 300);
        assert_eq!(cfg.local.max_entries, 1000);
        assert_eq!(cfg.redis.ttl_secs, 1800);
        assert!(!cfg.redis.enabled);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut cfg = NodeConfig::default();
        cfg.sync.channel = "  ".into();
        assert!(cfg.validate().unwrap_err().contains("sync.channel"));

        let mut cfg = NodeConfig::default();
        cfg.local.max_entries = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = NodeConfig::default();
        cfg.redis.pool_size = 0;
        assert!(cfg.validate().is_ok(), "redis settings ignored while disabled");
        cfg.redis.enabled = true;
        assert!(cfg.validate().unwrap_err().contains("pool_size"));
    }

    #[test]
    fn test_config_path_precedence() {
        use loader::{PathOrigin, config_path};

        let args = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        assert_eq!(
            config_path(args(&["--config", "a.toml"]), Some("b.toml".into())),
            ("a.toml".to_string(), PathOrigin::Flag)
        );
        assert_eq!(
            config_path(args(&["--config=c.toml"]), None),
            ("c.toml".to_string(), PathOrigin::Flag)
        );
        assert_eq!(
            config_path(args(&["--config"]), Some("b.toml".into())),
            ("b.toml".to_string(), PathOrigin::Env)
        );
        assert_eq!(
            config_path(args(&[]), Some(" ".into())),
            ("cachesync.toml".to_string(), PathOrigin::Default)
        );
    }

    #[test]
    fn test_sync_settings_mapping() {
        let mut cfg = NodeConfig::default();
        cfg.sync.channel_prefix = "prod:".into();
        cfg.sync.compress_messages = true;

        let settings = cfg.sync_settings();
        assert_eq!(settings.channel_name(), "prod:cache-invalidation");
        assert!(settings.compress_messages);
        assert_eq!(cfg.local_settings().ttl, Duration::from_secs(300));
        assert_eq!(cfg.redis_pool_settings().timeout, Duration::from_millis(5000));
    }
}
