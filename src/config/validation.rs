use crate::config::types::{CrawlerOptions, ExportOptions};
use crate::ConfigError;

/// Validates the entire option set
///
/// Runs before any network activity so that bad values fail fast.
pub fn validate(options: &CrawlerOptions) -> Result<(), ConfigError> {
    validate_limits(options)?;
    validate_timing(options)?;
    validate_user_agent(&options.user_agent)?;
    validate_export(&options.export)?;
    Ok(())
}

/// Validates page, depth and concurrency limits
fn validate_limits(options: &CrawlerOptions) -> Result<(), ConfigError> {
    // max_depth >= 0 is always true for u32, so no check needed

    if options.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max_pages must be >= 1, got {}",
            options.max_pages
        )));
    }

    if options.max_concurrency < 1 || options.max_concurrency > 100 {
        return Err(ConfigError::Validation(format!(
            "max_concurrency must be between 1 and 100, got {}",
            options.max_concurrency
        )));
    }

    Ok(())
}

/// Validates delays and timeouts
fn validate_timing(options: &CrawlerOptions) -> Result<(), ConfigError> {
    if options.timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "timeout_ms must be greater than 0".to_string(),
        ));
    }

    if options.max_delay_ms < options.delay_ms {
        return Err(ConfigError::Validation(format!(
            "max_delay_ms ({}) must be >= delay_ms ({})",
            options.max_delay_ms, options.delay_ms
        )));
    }

    Ok(())
}

/// Validates the User-Agent string
fn validate_user_agent(user_agent: &str) -> Result<(), ConfigError> {
    if user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if user_agent.chars().any(|c| c.is_control()) {
        return Err(ConfigError::Validation(format!(
            "user_agent must not contain control characters, got {:?}",
            user_agent
        )));
    }

    Ok(())
}

/// Validates export settings
fn validate_export(export: &ExportOptions) -> Result<(), ConfigError> {
    if !export.enabled {
        return Ok(());
    }

    match &export.path {
        Some(path) if !path.as_os_str().is_empty() => Ok(()),
        _ => Err(ConfigError::Validation(
            "export.path is required when export is enabled".to_string(),
        )),
    }
}
