use std::path::Path;

use crate::config::schema::PipelineConfig;
use crate::error::ConfigError;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PipelineConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<PipelineConfig, ConfigError> {
    let config: PipelineConfig = serde_json::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &PipelineConfig) -> Result<(), ConfigError> {
    let invalid = |message: &str| {
        Err(ConfigError::Validation {
            message: message.to_string(),
        })
    };

    if config.max_concurrency == 0 {
        return invalid("max_concurrency must be at least 1");
    }
    if config.item_timeout_secs == 0 {
        return invalid("item_timeout_secs must be at least 1");
    }
    if config.retry.max_attempts == 0 {
        return invalid("retry.max_attempts must be at least 1");
    }
    if config.limits.script_max_bytes == 0 || config.limits.audio_sample_max_bytes == 0 {
        return invalid("upload size ceilings must be positive");
    }
    if config.progress_channel_capacity == 0 {
        return invalid("progress_channel_capacity must be at least 1");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::CancelMode;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn test_empty_object_uses_defaults() {
        let config = load_config_from_str("{}").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.max_concurrency, 3);
        assert_eq!(config.retry.max_attempts, 1);
        assert_eq!(config.cancel_mode, CancelMode::FinishInFlight);
        assert_eq!(config.limits.script_max_bytes, 10 * 1024 * 1024);
        assert_eq!(config.limits.audio_sample_max_bytes, 50 * 1024 * 1024);
        assert_eq!(config.item_timeout(), Duration::from_secs(300));
    }

    #[test]
    fn test_partial_config() {
        let config = load_config_from_str(
            r#"{
                "max_concurrency": 2,
                "cancel_mode": "abandon_in_flight",
                "retry": { "max_attempts": 3 },
                "limits": { "script_max_bytes": 2048 }
            }"#,
        )
        .unwrap();
        assert_eq!(config.max_concurrency, 2);
        assert_eq!(config.cancel_mode, CancelMode::AbandonInFlight);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.initial_backoff_ms, 500);
        assert_eq!(config.limits.script_max_bytes, 2048);
        assert_eq!(config.limits.audio_sample_max_bytes, 50 * 1024 * 1024);
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let err = load_config_from_str(r#"{"max_concurrency": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
        assert!(err.to_string().contains("max_concurrency"));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let err = load_config_from_str(r#"{"retry": {"max_attempts": 0}}"#).unwrap_err();
        assert!(err.to_string().contains("max_attempts"));
    }

    #[test]
    fn test_invalid_json() {
        let err = load_config_from_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::ParseJson(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"download_prefix": "exports"}}"#).unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.download_prefix, "exports");
    }

    #[test]
    fn test_missing_file() {
        let err = load_config("/nonexistent/voiceforge.json").unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_backoff_doubles() {
        let config = load_config_from_str(r#"{"retry": {"max_attempts": 4, "initial_backoff_ms": 100}}"#)
            .unwrap();
        assert_eq!(config.retry.backoff_before(1), Duration::ZERO);
        assert_eq!(config.retry.backoff_before(2), Duration::from_millis(100));
        assert_eq!(config.retry.backoff_before(3), Duration::from_millis(200));
        assert_eq!(config.retry.backoff_before(4), Duration::from_millis(400));
    }
}
