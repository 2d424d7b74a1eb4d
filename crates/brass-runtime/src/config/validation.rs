//! Configuration validation utilities.

use std::collections::HashSet;

use super::error::{ConfigError, ConfigResult};
use super::schema::{BrassConfig, DispatchConfig, LogOutput, LoggingConfig};

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validates the entire configuration.
pub fn validate_config(config: &BrassConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    validate_dispatch_config(&config.dispatch)?;
    Ok(())
}

fn validate_log_level(level: &str) -> ConfigResult<()> {
    if !VALID_LOG_LEVELS.contains(&level.to_lowercase().as_str()) {
        return Err(ConfigError::validation(format!(
            "Invalid log level: {level}. Valid values are: {VALID_LOG_LEVELS:?}"
        )));
    }
    Ok(())
}

/// Validates logging settings.
fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    validate_log_level(&logging.level)?;

    for (target, level) in &logging.filters {
        if target.is_empty() {
            return Err(ConfigError::validation("Log filter target must not be empty"));
        }
        validate_log_level(level)?;
    }

    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::validation(
            "File log output requires logging.file_path",
        ));
    }

    Ok(())
}

/// Validates dispatcher settings.
fn validate_dispatch_config(dispatch: &DispatchConfig) -> ConfigResult<()> {
    if dispatch.prefixes.is_empty() {
        return Err(ConfigError::validation("At least one command prefix is required"));
    }

    let mut seen = HashSet::new();
    for prefix in &dispatch.prefixes {
        if prefix.trim().is_empty() {
            return Err(ConfigError::validation("Command prefixes must not be blank"));
        }
        if !seen.insert(prefix) {
            return Err(ConfigError::validation(format!(
                "Duplicate command prefix: {prefix}"
            )));
        }
    }

    if dispatch.chain_separator.trim().is_empty() {
        return Err(ConfigError::validation("Chain separator must not be blank"));
    }

    if dispatch.max_chained == 0 {
        return Err(ConfigError::validation("max_chained must be greater than 0"));
    }

    let positive = [
        ("same_command_limit", u64::from(dispatch.same_command_limit)),
        ("same_command_window_secs", dispatch.same_command_window_secs),
        ("volume_limit", u64::from(dispatch.volume_limit)),
        ("volume_window_secs", dispatch.volume_window_secs),
        ("ban_window_secs", dispatch.ban_window_secs),
        ("sweep_interval_secs", dispatch.sweep_interval_secs),
    ];
    for (field, value) in positive {
        if value == 0 {
            return Err(ConfigError::validation(format!(
                "{field} must be greater than 0"
            )));
        }
    }

    if let Some(url) = &dispatch.issue_url
        && !(url.starts_with("https://") || url.starts_with("http://"))
    {
        return Err(ConfigError::invalid_url(url, "expected an http(s) URL"));
    }

    Ok(())
}
