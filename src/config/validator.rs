use crate::config::Config;
use crate::error::{Result, SleuthError, ValidationError};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_server(config, &mut errors);
        Self::validate_storage(config, &mut errors);
        Self::validate_slack(config, &mut errors);
        Self::validate_confluence(config, &mut errors);
        Self::validate_search(config, &mut errors);
        Self::validate_llm(config, &mut errors);
        Self::validate_pipeline(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SleuthError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != "1.0.0" {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_server(config: &Config, errors: &mut Vec<ValidationError>) {
        if config
            .server
            .bind_addr
            .parse::<std::net::SocketAddr>()
            .is_err()
        {
            errors.push(ValidationError::new(
                "server.bind_addr",
                format!("Invalid socket address: {}", config.server.bind_addr),
            ));
        }

        let env = &config.server.env;
        if env != "development" && env != "production" {
            errors.push(ValidationError::new(
                "server.env",
                format!("Env must be 'development' or 'production', got '{}'", env),
            ));
        }
    }

    fn validate_storage(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.storage.db_path.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.db_path",
                "Database path cannot be empty",
            ));
        }

        if config.storage.max_connections == 0 {
            errors.push(ValidationError::new(
                "storage.max_connections",
                "Connection pool size must be greater than 0",
            ));
        }
    }

    fn validate_slack(config: &Config, errors: &mut Vec<ValidationError>) {
        // Emoji names are used without surrounding colons
        let emoji = &config.slack.trigger_emoji;
        if emoji.is_empty() || emoji.contains(':') || emoji.contains(char::is_whitespace) {
            errors.push(ValidationError::new(
                "slack.trigger_emoji",
                format!("Invalid emoji name: '{}'", emoji),
            ));
        }

        if config.slack.signing_secret_env.is_empty() {
            errors.push(ValidationError::new(
                "slack.signing_secret_env",
                "Signing secret variable name cannot be empty",
            ));
        }

        if !config.slack.api_base.starts_with("http") {
            errors.push(ValidationError::new(
                "slack.api_base",
                format!("Not an HTTP URL: {}", config.slack.api_base),
            ));
        }
    }

    fn validate_confluence(config: &Config, errors: &mut Vec<ValidationError>) {
        // Empty base_url disables documentation search
        let base = &config.confluence.base_url;
        if !base.is_empty() && !base.starts_with("http") {
            errors.push(ValidationError::new(
                "confluence.base_url",
                format!("Not an HTTP URL: {}", base),
            ));
        }

        if config.confluence.space_key.is_empty() {
            errors.push(ValidationError::new(
                "confluence.space_key",
                "Space key cannot be empty",
            ));
        }
    }

    fn validate_search(config: &Config, errors: &mut Vec<ValidationError>) {
        let threshold = config.search.similarity_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            errors.push(ValidationError::new(
                "search.similarity_threshold",
                format!("Threshold must be between 0.0 and 1.0, got {}", threshold),
            ));
        }

        if config.search.max_results == 0 {
            errors.push(ValidationError::new(
                "search.max_results",
                "Max results must be greater than 0",
            ));
        }

        if config.search.source_timeout_secs == 0 {
            errors.push(ValidationError::new(
                "search.source_timeout_secs",
                "Source timeout must be greater than 0",
            ));
        }
    }

    fn validate_llm(config: &Config, errors: &mut Vec<ValidationError>) {
        let temp = config.llm.temperature;
        if !(0.0..=2.0).contains(&temp) {
            errors.push(ValidationError::new(
                "llm.temperature",
                format!("Temperature must be between 0.0 and 2.0, got {}", temp),
            ));
        }

        if config.llm.max_tokens == 0 {
            errors.push(ValidationError::new(
                "llm.max_tokens",
                "Max tokens must be greater than 0",
            ));
        }

        if config.llm.timeout_secs == 0 {
            errors.push(ValidationError::new(
                "llm.timeout_secs",
                "Timeout must be greater than 0",
            ));
        }
    }

    fn validate_pipeline(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.pipeline.queue_size == 0 {
            errors.push(ValidationError::new(
                "pipeline.queue_size",
                "Queue size must be greater than 0",
            ));
        }

        if config.pipeline.max_concurrent == 0 {
            errors.push(ValidationError::new(
                "pipeline.max_concurrent",
                "Concurrency limit must be greater than 0",
            ));
        }

        // A sub-second reply deadline cannot cover a real network round trip
        if config.pipeline.reply_timeout_secs == 0 {
            errors.push(ValidationError::new(
                "pipeline.reply_timeout_secs",
                "Reply timeout must be at least 1 second",
            ));
        }

        if config.pipeline.deadline_secs < config.llm.timeout_secs {
            errors.push(ValidationError::new(
                "pipeline.deadline_secs",
                format!(
                    "Pipeline deadline ({}s) is shorter than the LLM timeout ({}s)",
                    config.pipeline.deadline_secs, config.llm.timeout_secs
                ),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config() {
        let config = Config::default();
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_threshold_out_of_range() {
        let mut config = Config::default();
        config.search.similarity_threshold = 1.5;
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_emoji_with_colons() {
        let mut config = Config::default();
        config.slack.trigger_emoji = ":eyes:".to_string();
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = Config::default();
        config.search.max_results = 0;
        config.pipeline.max_concurrent = 0;
        config.server.env = "staging".to_string();

        match ConfigValidator::validate(&config) {
            Err(SleuthError::ConfigValidation { errors }) => assert_eq!(errors.len(), 3),
            other => panic!("expected validation failure, got {:?}", other),
        }
    }
}
