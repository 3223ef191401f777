use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Worker pool is not empty
/// - Server port is not 0
/// - Proxy and Telegram toggles come with their required values
/// - Retry bounds are consistent
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.downloads.max_workers == 0 {
        return Err(ConfigError::ValidationError(
            "downloads.max_workers cannot be 0".to_string(),
        ));
    }

    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.browser.use_proxy && config.browser.proxy_server.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "browser.use_proxy is set but browser.proxy_server is empty".to_string(),
        ));
    }

    if config.telegram.telegram_enabled && config.telegram.bot_token.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "telegram.telegram_enabled is set but telegram.bot_token is empty".to_string(),
        ));
    }

    let retry = &config.retry;
    if retry.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "retry.max_attempts cannot be 0".to_string(),
        ));
    }
    for (name, value) in [
        ("multiplier_secs", retry.multiplier_secs),
        ("min_wait_secs", retry.min_wait_secs),
        ("max_wait_secs", retry.max_wait_secs),
    ] {
        if !value.is_finite() {
            return Err(ConfigError::ValidationError(format!(
                "retry.{} must be a finite number of seconds",
                name
            )));
        }
    }
    if retry.min_wait_secs < 0.0 || retry.multiplier_secs < 0.0 {
        return Err(ConfigError::ValidationError(
            "retry waits cannot be negative".to_string(),
        ));
    }
    if retry.min_wait_secs > retry.max_wait_secs {
        return Err(ConfigError::ValidationError(format!(
            "retry.min_wait_secs ({}) is greater than retry.max_wait_secs ({})",
            retry.min_wait_secs, retry.max_wait_secs
        )));
    }

    Ok(())
}
