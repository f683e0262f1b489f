use std::time::Duration as StdDuration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::auth::{JwtSettings, SessionSettings};

use super::{defaults, envconfig::EnvConfig, validate};

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub logging: LoggingConfig,
    pub database: Option<DatabaseConfig>,
    pub auth: Option<AuthConfig>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        <Self as EnvConfig>::from_env()
    }
}

impl EnvConfig for AppConfig {
    fn validate(&self) -> Result<()> {
        validate::validate(self)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneralConfig {
    pub host: String,
    pub port: u16,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            host: defaults::DEFAULT_HOST.to_string(),
            port: defaults::DEFAULT_PORT as u16,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub rust_log: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            rust_log: defaults::DEFAULT_RUST_LOG.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_db_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_db_min_idle")]
    pub min_idle: u32,
    /// Create missing tables and indexes at startup.
    #[serde(default = "default_db_sync_schema")]
    pub sync_schema: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    pub jwt_secret: String,
    #[serde(default = "default_access_ttl_secs")]
    pub access_ttl_secs: i64,
    #[serde(default = "default_refresh_ttl_secs")]
    pub refresh_ttl_secs: i64,
    #[serde(default = "default_leeway_secs")]
    pub leeway_secs: i64,
    /// Per persistence call; 0 disables the deadline.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
    /// 0 disables the expired refresh token sweeper.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl AuthConfig {
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            access_ttl_secs: default_access_ttl_secs(),
            refresh_ttl_secs: default_refresh_ttl_secs(),
            leeway_secs: default_leeway_secs(),
            call_timeout_ms: default_call_timeout_ms(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }

    pub fn jwt_settings(&self) -> JwtSettings {
        JwtSettings::new(self.jwt_secret.as_bytes(), self.leeway_secs)
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            access_ttl: ttl(self.access_ttl_secs),
            refresh_ttl: ttl(self.refresh_ttl_secs),
            call_timeout: (self.call_timeout_ms > 0)
                .then(|| StdDuration::from_millis(self.call_timeout_ms)),
        }
    }

    pub fn sweep_interval(&self) -> Option<StdDuration> {
        (self.sweep_interval_secs > 0).then(|| StdDuration::from_secs(self.sweep_interval_secs))
    }
}

// Out-of-range values are rejected by `validate`; anything that slips past
// surfaces as `AuthError::TtlOutOfRange` at issue time.
fn ttl(secs: i64) -> chrono::Duration {
    chrono::Duration::try_seconds(secs).unwrap_or(chrono::Duration::MAX)
}

fn default_db_max_connections() -> u32 {
    defaults::DEFAULT_DB_MAX_CONNECTIONS as u32
}

fn default_db_min_idle() -> u32 {
    defaults::DEFAULT_DB_MIN_IDLE as u32
}

fn default_db_sync_schema() -> bool {
    defaults::DEFAULT_DB_SYNC_SCHEMA
}

fn default_access_ttl_secs() -> i64 {
    defaults::DEFAULT_ACCESS_TTL_SECS
}

fn default_refresh_ttl_secs() -> i64 {
    defaults::DEFAULT_REFRESH_TTL_SECS
}

fn default_leeway_secs() -> i64 {
    defaults::DEFAULT_LEEWAY_SECS
}

fn default_call_timeout_ms() -> u64 {
    defaults::DEFAULT_CALL_TIMEOUT_MS
}

fn default_sweep_interval_secs() -> u64 {
    defaults::DEFAULT_SWEEP_INTERVAL_SECS
}

#[cfg(test)]
mod tests {
    use ::config as config_rs;

    use super::{AppConfig, AuthConfig};
    use crate::config::EnvConfig;

    fn env(vars: &[(&str, &str)]) -> config_rs::Environment {
        let source = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        config_rs::Environment::with_prefix("APP")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .source(Some(source))
    }

    #[test]
    fn nested_env_vars_fill_sections_with_defaults() {
        let cfg = AppConfig::from_source(env(&[
            ("APP_GENERAL__PORT", "8080"),
            ("APP_DATABASE__URL", "sqlite::memory:"),
            ("APP_AUTH__JWT_SECRET", "s3cret"),
            ("APP_AUTH__ACCESS_TTL_SECS", "60"),
        ]))
        .expect("config should load");

        assert_eq!(cfg.general.port, 8080);
        assert_eq!(cfg.general.host, "127.0.0.1");
        let database = cfg.database.expect("database section");
        assert_eq!(database.max_connections, 10);
        assert!(database.sync_schema);
        let auth = cfg.auth.expect("auth section");
        assert_eq!(auth.access_ttl_secs, 60);
        assert_eq!(auth.refresh_ttl_secs, 7 * 24 * 60 * 60);
        assert_eq!(auth.leeway_secs, 5);
    }

    #[test]
    fn invalid_values_are_reported_together() {
        let err = AppConfig::from_source(env(&[
            ("APP_AUTH__JWT_SECRET", " "),
            ("APP_AUTH__ACCESS_TTL_SECS", "0"),
        ]))
        .expect_err("config should be rejected");

        let message = err.to_string();
        assert!(message.contains("auth.jwt_secret"));
        assert!(message.contains("auth.access_ttl_secs"));
    }

    #[test]
    fn zero_durations_disable_timeout_and_sweeper() {
        let mut auth = AuthConfig::new("secret");
        auth.call_timeout_ms = 0;
        auth.sweep_interval_secs = 0;

        assert!(auth.session_settings().call_timeout.is_none());
        assert!(auth.sweep_interval().is_none());

        let defaults = AuthConfig::new("secret");
        assert_eq!(defaults.session_settings().access_ttl.num_seconds(), 900);
        assert!(defaults.sweep_interval().is_some());
    }
}
