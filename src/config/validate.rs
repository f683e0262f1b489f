use anyhow::{Result, bail};

use super::{AppConfig, defaults::MAX_TTL_SECS};

pub fn validate(cfg: &AppConfig) -> Result<()> {
    let mut errors: Vec<String> = Vec::new();

    if cfg.general.host.trim().is_empty() {
        errors.push("general.host must not be empty".to_string());
    }

    if let Some(database) = cfg.database.as_ref() {
        if database.url.trim().is_empty() {
            errors.push("database.url must not be empty".to_string());
        }

        if database.min_idle > database.max_connections {
            errors.push(format!(
                "database.min_idle ({}) must be <= database.max_connections ({})",
                database.min_idle, database.max_connections
            ));
        }
    }

    if let Some(auth) = cfg.auth.as_ref() {
        if auth.jwt_secret.trim().is_empty() {
            errors.push("auth.jwt_secret must not be empty".to_string());
        }

        if auth.access_ttl_secs <= 0 {
            errors.push("auth.access_ttl_secs must be > 0".to_string());
        }

        if auth.refresh_ttl_secs <= 0 {
            errors.push("auth.refresh_ttl_secs must be > 0".to_string());
        }

        if auth.refresh_ttl_secs <= auth.access_ttl_secs {
            errors.push(format!(
                "auth.refresh_ttl_secs ({}) must be greater than auth.access_ttl_secs ({})",
                auth.refresh_ttl_secs, auth.access_ttl_secs
            ));
        }

        if auth.leeway_secs < 0 {
            errors.push("auth.leeway_secs must be >= 0".to_string());
        }

        for (name, secs) in [
            ("auth.access_ttl_secs", auth.access_ttl_secs),
            ("auth.refresh_ttl_secs", auth.refresh_ttl_secs),
            ("auth.leeway_secs", auth.leeway_secs),
        ] {
            if secs > MAX_TTL_SECS {
                errors.push(format!("{name} ({secs}) must be <= {MAX_TTL_SECS}"));
            }
        }

        if auth.sweep_interval_secs > MAX_TTL_SECS.unsigned_abs() {
            errors.push(format!(
                "auth.sweep_interval_secs ({}) must be <= {MAX_TTL_SECS}",
                auth.sweep_interval_secs
            ));
        }
    }

    if errors.is_empty() {
        return Ok(());
    }

    bail!("invalid app config:\n- {}", errors.join("\n- "))
}
