use std::backtrace::Backtrace;

use anyhow::{Context, anyhow};
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LoggingConfig;

/// Installs the global subscriber. `RUST_LOG` overrides `logging.rust_log`
/// when set and non-empty.
pub fn init_tracing(cfg: &LoggingConfig) -> anyhow::Result<()> {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| cfg.rust_log.clone());
    let filter = build_filter(&directives)?;

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))?;
    set_panic_hook();
    Ok(())
}

pub fn build_filter(directives: &str) -> anyhow::Result<EnvFilter> {
    EnvFilter::try_new(directives).with_context(|| format!("invalid log filter `{directives}`"))
}

fn set_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let message = if let Some(message) = info.payload().downcast_ref::<&str>() {
            *message
        } else if let Some(message) = info.payload().downcast_ref::<String>() {
            message.as_str()
        } else {
            "unknown panic"
        };
        let thread = std::thread::current();
        let thread = thread.name().unwrap_or("unnamed");
        let location = info
            .location()
            .map(ToString::to_string)
            .unwrap_or_else(|| "unknown".to_string());

        tracing::error!(
            target: "pos_auth::panic",
            panic = %message,
            thread,
            location = %location,
            backtrace = %Backtrace::capture(),
            "panic"
        );
    }));
}

#[cfg(test)]
mod tests {
    use super::build_filter;
    use crate::config::LoggingConfig;

    #[test]
    fn default_directives_parse() {
        build_filter(&LoggingConfig::default().rust_log).expect("default filter should parse");
    }

    #[test]
    fn bad_directive_is_reported() {
        let err = build_filter("pos_auth=shouty").expect_err("filter should be rejected");

        assert!(err.to_string().contains("pos_auth=shouty"));
    }
}
