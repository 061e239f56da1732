//! Custom validation functions shared by the configuration sections.

use std::path::Path;

use validator::ValidationError;

pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate a tracing level name.
pub fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let re = regex::Regex::new("^(trace|debug|info|warn|error)$")
        .map_err(|_| ValidationError::new("invalid_regex"))?;
    if re.is_match(&level.to_ascii_lowercase()) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_log_level")
            .with_message(format!("expected one of {}", LOG_LEVELS.join(", ")).into()))
    }
}

/// Validate that the control socket lives at an absolute path.
pub fn validate_socket_path(path: &Path) -> Result<(), ValidationError> {
    if path.is_absolute() && path.file_name().is_some() {
        Ok(())
    } else {
        Err(ValidationError::new("relative_socket_path")
            .with_message("control socket path must be absolute".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_levels() {
        for level in LOG_LEVELS {
            assert!(validate_log_level(level).is_ok());
        }
        assert!(validate_log_level("WARN").is_ok());
        assert!(validate_log_level("verbose").is_err());
        assert!(validate_log_level("info,grindvakt=debug").is_err());
    }

    #[test]
    fn test_socket_path() {
        assert!(validate_socket_path(Path::new("/run/grindvakt/control.sock")).is_ok());
        assert!(validate_socket_path(Path::new("control.sock")).is_err());
        assert!(validate_socket_path(Path::new("/")).is_err());
    }
}
