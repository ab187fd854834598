//! Configuration validation

use crate::{ConfigError, PipelineConfig, Result};

/// Validation error details
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate the entire pipeline configuration
pub fn validate_config(config: &PipelineConfig) -> Result<()> {
    let mut errors = Vec::new();

    if let Err(e) = validate_log_level(&config.logging.level) {
        errors.push(e);
    }

    if config.run.max_concurrency == Some(0) {
        errors.push(ValidationError::new(
            "run.max_concurrency",
            "must be greater than 0 when set",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        let error_messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        Err(ConfigError::ValidationError(error_messages.join("; ")))
    }
}

fn validate_log_level(level: &str) -> std::result::Result<(), ValidationError> {
    match level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ValidationError::new(
            "logging.level",
            format!(
                "invalid log level '{level}', must be one of: trace, debug, info, warn, error"
            ),
        )),
    }
}
